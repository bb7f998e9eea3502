//! In-memory `BrowserPage` over a static HTML document.
//!
//! Selectors are resolved with `scraper` against the parsed document, so a
//! reference that works here is valid CSS that works in a real browser. Every
//! interaction is recorded for assertions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::browser::{BrowserError, BrowserPage, ChoiceOption, SessionLauncher};

/// Document-order position of an element; stable across re-parses of the same source.
type ElementKey = usize;

#[derive(Debug, Default)]
struct MemoryState {
    values: HashMap<ElementKey, String>,
    change_events: HashMap<ElementKey, usize>,
    clicks: Vec<String>,
    navigations: Vec<String>,
    screenshots: Vec<PathBuf>,
    navigation_failures: usize,
    fail_screenshots: bool,
    closed: bool,
}

pub struct MemoryPage {
    source: String,
    state: Mutex<MemoryState>,
}

impl MemoryPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            source: html.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// The first `count` navigations fail.
    pub fn with_navigation_failures(self, count: usize) -> Self {
        self.state().navigation_failures = count;
        self
    }

    pub fn with_failing_screenshots(self) -> Self {
        self.state().fail_screenshots = true;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_element<T>(
        &self,
        selector: &str,
        f: impl FnOnce(ElementRef<'_>) -> T,
    ) -> Result<T, BrowserError> {
        self.with_keyed_element(selector, |_, el| f(el))
    }

    fn with_keyed_element<T>(
        &self,
        selector: &str,
        f: impl FnOnce(ElementKey, ElementRef<'_>) -> T,
    ) -> Result<T, BrowserError> {
        let css = Selector::parse(selector)
            .map_err(|_| BrowserError::InvalidSelector(selector.to_string()))?;
        let html = Html::parse_document(&self.source);
        let element = html
            .select(&css)
            .next()
            .ok_or_else(|| BrowserError::NotFound(selector.to_string()))?;
        let key = html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .position(|candidate| candidate.id() == element.id())
            .unwrap_or_default();
        Ok(f(key, element))
    }

    /// Current value of the first element matching `selector`.
    pub fn value_of(&self, selector: &str) -> Option<String> {
        let (id, initial) = self
            .with_keyed_element(selector, |key, el| (key, initial_value(el)))
            .ok()?;
        Some(self.state().values.get(&id).cloned().unwrap_or(initial))
    }

    pub fn change_events(&self, selector: &str) -> usize {
        self.with_keyed_element(selector, |key, _| key)
            .map(|id| self.state().change_events.get(&id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn clicks(&self) -> Vec<String> {
        self.state().clicks.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state().navigations.clone()
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state().screenshots.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

fn initial_value(el: ElementRef<'_>) -> String {
    match el.value().name() {
        "textarea" => el.text().collect(),
        "select" => options_of(el)
            .into_iter()
            .next()
            .map(|o| o.value)
            .unwrap_or_default(),
        _ => el.value().attr("value").unwrap_or_default().to_string(),
    }
}

fn options_of(el: ElementRef<'_>) -> Vec<ChoiceOption> {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "option")
        .map(|option| {
            let label: String = option.text().collect::<String>().trim().to_string();
            let value = option
                .value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| label.clone());
            ChoiceOption { value, label }
        })
        .collect()
}

fn is_rendered(el: ElementRef<'_>) -> bool {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .all(|node| {
            let hidden_attr = node.value().attr("hidden").is_some();
            let hidden_style = node
                .value()
                .attr("style")
                .map(|s| s.replace(' ', "").contains("display:none"))
                .unwrap_or(false);
            !hidden_attr && !hidden_style
        })
}

#[async_trait]
impl BrowserPage for MemoryPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        let mut state = self.state();
        if state.navigation_failures > 0 {
            state.navigation_failures -= 1;
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }
        state.navigations.push(url.to_string());
        Ok(())
    }

    async fn content(&self) -> Result<String, BrowserError> {
        Ok(self.source.clone())
    }

    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        match self.with_element(selector, is_rendered) {
            Ok(true) => Ok(()),
            Ok(false) | Err(BrowserError::NotFound(_)) => Err(BrowserError::timeout(
                format!("'{selector}' to become visible"),
                timeout,
            )),
            Err(e) => Err(e),
        }
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), BrowserError> {
        self.with_element(selector, |_| ())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.with_element(selector, |_| ())?;
        self.state().clicks.push(selector.to_string());
        Ok(())
    }

    async fn clear(&self, selector: &str) -> Result<(), BrowserError> {
        let id = self.with_keyed_element(selector, |key, _| key)?;
        self.state().values.insert(id, String::new());
        Ok(())
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        _delay: Duration,
    ) -> Result<(), BrowserError> {
        let (id, initial) = self.with_keyed_element(selector, |key, el| (key, initial_value(el)))?;
        self.state()
            .values
            .entry(id)
            .or_insert(initial)
            .push_str(text);
        Ok(())
    }

    async fn choice_options(&self, selector: &str) -> Result<Vec<ChoiceOption>, BrowserError> {
        let (is_select, options) = self.with_element(selector, |el| {
            (el.value().name() == "select", options_of(el))
        })?;
        if !is_select {
            return Err(BrowserError::WrongElement {
                selector: selector.to_string(),
                expected: "choice control".to_string(),
            });
        }
        Ok(options)
    }

    async fn select_choice(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let id = self.with_keyed_element(selector, |key, _| key)?;
        let mut state = self.state();
        state.values.insert(id, value.to_string());
        *state.change_events.entry(id).or_insert(0) += 1;
        Ok(())
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), BrowserError> {
        // Static documents never navigate; mirrors an XHR-only submission.
        Err(BrowserError::timeout("navigation", timeout))
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        if self.state().fail_screenshots {
            return Err(BrowserError::Screenshot("capture refused".to_string()));
        }
        std::fs::write(path, b"PNG").map_err(|e| BrowserError::Screenshot(e.to_string()))?;
        self.state().screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.state().closed = true;
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for Arc<MemoryPage> {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.as_ref().goto(url, timeout).await
    }
    async fn content(&self) -> Result<String, BrowserError> {
        self.as_ref().content().await
    }
    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.as_ref().wait_visible(selector, timeout).await
    }
    async fn scroll_into_view(&self, selector: &str) -> Result<(), BrowserError> {
        self.as_ref().scroll_into_view(selector).await
    }
    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.as_ref().click(selector).await
    }
    async fn clear(&self, selector: &str) -> Result<(), BrowserError> {
        self.as_ref().clear(selector).await
    }
    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), BrowserError> {
        self.as_ref().type_text(selector, text, delay).await
    }
    async fn choice_options(&self, selector: &str) -> Result<Vec<ChoiceOption>, BrowserError> {
        self.as_ref().choice_options(selector).await
    }
    async fn select_choice(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.as_ref().select_choice(selector, value).await
    }
    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), BrowserError> {
        self.as_ref().wait_for_navigation(timeout).await
    }
    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        self.as_ref().screenshot(path).await
    }
    async fn close(&self) -> Result<(), BrowserError> {
        self.as_ref().close().await
    }
}

/// Hands out the same shared page to every run, so tests keep a handle to
/// inspect it after the run closes it.
pub struct MemoryLauncher {
    pub page: Arc<MemoryPage>,
}

impl MemoryLauncher {
    pub fn new(page: MemoryPage) -> Self {
        Self {
            page: Arc::new(page),
        }
    }
}

#[async_trait]
impl SessionLauncher for MemoryLauncher {
    async fn open(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        Ok(Box::new(Arc::clone(&self.page)))
    }
}
