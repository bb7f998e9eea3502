//! Chrome DevTools implementation of the Document Access Port.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser::{BrowserError, BrowserPage, ChoiceOption, SessionLauncher};

/// How often visibility waits re-check the page.
const VISIBILITY_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ChromeSettings {
    pub headless: bool,
    pub executable_path: Option<PathBuf>,
    pub window_size: (u32, u32),
}

/// Launches one Chrome instance per `open()` call.
pub struct ChromeLauncher {
    settings: ChromeSettings,
}

impl ChromeLauncher {
    pub fn new(settings: ChromeSettings) -> Self {
        Self { settings }
    }

    fn browser_config(&self) -> Result<BrowserConfig, BrowserError> {
        let (width, height) = self.settings.window_size;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .window_size(width, height);

        if !self.settings.headless {
            builder = builder.with_head();
        }

        if let Some(path) = &self.settings.executable_path {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn open(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        let config = self.browser_config()?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!("Browser close after failed page open returned: {close_err}");
                }
                handler_task.abort();
                return Err(BrowserError::Launch(format!("failed to open page: {e}")));
            }
        };

        info!(
            "Browser launched (headless={}, window={}x{})",
            self.settings.headless, self.settings.window_size.0, self.settings.window_size.1
        );

        Ok(Box::new(ChromePage {
            page,
            browser: Mutex::new(Some(browser)),
            handler_task: Mutex::new(Some(handler_task)),
        }))
    }
}

/// A page plus the browser process behind it. Closing the page tears down both.
pub struct ChromePage {
    page: Page,
    browser: Mutex<Option<Browser>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Default, Deserialize)]
struct OptionsProbe {
    #[serde(default)]
    found: bool,
    #[serde(default)]
    is_choice: bool,
    #[serde(default)]
    options: Vec<ChoiceOption>,
}

impl ChromePage {
    async fn element(&self, selector: &str) -> Result<Element, BrowserError> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::NotFound(selector.to_string()))
    }

    async fn evaluate<T: serde::de::DeserializeOwned>(
        &self,
        script: String,
    ) -> Result<T, BrowserError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| BrowserError::Protocol(format!("unexpected evaluation result: {e}")))
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, BrowserError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const style = window.getComputedStyle(el);
                if (style.display === "none" || style.visibility === "hidden") return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 && rect.height > 0;
            }})()"#,
            sel = js_string(selector)
        );
        self.evaluate::<bool>(script).await
    }
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(BrowserError::timeout(format!("navigation to {url}"), timeout)),
        }
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }

    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError> {
        let poll = async {
            loop {
                // A transient evaluation error (mid-navigation) is retried until the deadline.
                match self.is_visible(selector).await {
                    Ok(true) => return,
                    Ok(false) => {}
                    Err(e) => debug!("Visibility probe for {selector} failed: {e}"),
                }
                tokio::time::sleep(VISIBILITY_POLL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| BrowserError::timeout(format!("'{selector}' to become visible"), timeout))
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), BrowserError> {
        self.element(selector)
            .await?
            .scroll_into_view()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.element(selector)
            .await?
            .click()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self, selector: &str) -> Result<(), BrowserError> {
        let element = self.element(selector).await?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        element
            .call_js_fn(
                "function() { if (typeof this.select === 'function') { this.select(); } }",
                false,
            )
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        element
            .press_key("Backspace")
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn type_text(
        &self,
        selector: &str,
        text: &str,
        delay: Duration,
    ) -> Result<(), BrowserError> {
        let element = self.element(selector).await?;
        element
            .focus()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;

        let mut buf = [0u8; 4];
        for ch in text.chars() {
            element
                .type_str(ch.encode_utf8(&mut buf))
                .await
                .map_err(|e| BrowserError::Protocol(e.to_string()))?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    async fn choice_options(&self, selector: &str) -> Result<Vec<ChoiceOption>, BrowserError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return {{ found: false }};
                if (!el.options) return {{ found: true, is_choice: false }};
                return {{
                    found: true,
                    is_choice: true,
                    options: Array.from(el.options).map((o) => ({{
                        value: o.value,
                        label: (o.textContent || "").trim(),
                    }})),
                }};
            }})()"#,
            sel = js_string(selector)
        );

        let probe: OptionsProbe = self.evaluate(script).await?;
        match probe {
            OptionsProbe { found: false, .. } => Err(BrowserError::NotFound(selector.to_string())),
            OptionsProbe {
                is_choice: false, ..
            } => Err(BrowserError::WrongElement {
                selector: selector.to_string(),
                expected: "choice control".to_string(),
            }),
            OptionsProbe { options, .. } => Ok(options),
        }
    }

    async fn select_choice(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.value = {val};
                el.dispatchEvent(new Event("change", {{ bubbles: true }}));
                return true;
            }})()"#,
            sel = js_string(selector),
            val = js_string(value)
        );

        if self.evaluate::<bool>(script).await? {
            Ok(())
        } else {
            Err(BrowserError::NotFound(selector.to_string()))
        }
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), BrowserError> {
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Protocol(e.to_string())),
            Err(_) => Err(BrowserError::timeout("navigation", timeout)),
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(|e| BrowserError::Screenshot(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let page_result = self.page.clone().close().await;

        let browser_result = match self.browser.lock().await.take() {
            Some(mut browser) => {
                let closed = browser.close().await.map(|_| ());
                if closed.is_ok() {
                    if let Err(e) = browser.wait().await {
                        warn!("Chrome process did not exit cleanly: {e}");
                    }
                }
                closed
            }
            None => Ok(()),
        };

        if let Some(task) = self.handler_task.lock().await.take() {
            task.abort();
        }

        page_result
            .and(browser_result)
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        info!("Browser closed");
        Ok(())
    }
}

/// Quotes a Rust string as a JavaScript string literal.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}
