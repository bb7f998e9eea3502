use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::evidence::{EvidenceDir, EvidenceTag};
use super::{RunError, RunFailure, RunPlan, RunResult, RunSettings, RunState};
use crate::browser::{BrowserError, BrowserPage, SessionLauncher};
use crate::form::applier::{apply, FillOptions};
use crate::form::extractor::{extract_document, truncate, QuestionRecord};
use crate::oracle::{normalize_answer, AnswerOracle};

/// Drives runs against pages handed out by a `SessionLauncher`.
///
/// A run owns its page from open to close. Every suspension point races the
/// caller's `CancellationToken`; a cancelled run goes through the same
/// failure path (evidence, close) as any other failed run.
pub struct ApplicationRunner {
    oracle: Arc<dyn AnswerOracle>,
    settings: RunSettings,
    evidence: EvidenceDir,
}

impl ApplicationRunner {
    pub fn new(oracle: Arc<dyn AnswerOracle>, settings: RunSettings) -> Self {
        let evidence = EvidenceDir::new(settings.evidence_dir.clone());
        Self {
            oracle,
            settings,
            evidence,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Navigate, extract, answer, then capture dry-run evidence or submit.
    pub async fn run(
        &self,
        launcher: &dyn SessionLauncher,
        plan: RunPlan,
        cancel: &CancellationToken,
    ) -> Result<RunResult, RunFailure> {
        let id = Uuid::new_v4();
        let span = info_span!("run", run_id = %id, dry_run = plan.dry_run);

        async move {
            let mut run = self.start(id, launcher, plan, cancel).await?;
            let outcome = run.complete().await;
            run.finish(outcome).await
        }
        .instrument(span)
        .await
    }

    /// Navigate and extract only. No oracle calls, no filling, no submission.
    pub async fn preview(
        &self,
        launcher: &dyn SessionLauncher,
        plan: RunPlan,
        cancel: &CancellationToken,
    ) -> Result<Vec<QuestionRecord>, RunFailure> {
        let id = Uuid::new_v4();
        let span = info_span!("preview", run_id = %id);

        async move {
            let mut run = self.start(id, launcher, plan, cancel).await?;
            let outcome = run.discover().await;
            run.finish(outcome).await
        }
        .instrument(span)
        .await
    }

    async fn start<'a>(
        &'a self,
        id: Uuid,
        launcher: &dyn SessionLauncher,
        plan: RunPlan,
        cancel: &'a CancellationToken,
    ) -> Result<Run<'a>, RunFailure> {
        info!("Opening browser session for {}", plan.job_url);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RunError::Cancelled),
            page = launcher.open() => page.map_err(RunError::Session),
        };

        match opened {
            Ok(page) => Ok(Run {
                id,
                page,
                plan,
                state: RunState::Idle,
                cancel,
                runner: self,
            }),
            Err(error) => {
                error!("Run failed before a page was opened: {error}");
                Err(RunFailure {
                    error,
                    state: RunState::Idle,
                    evidence_path: None,
                })
            }
        }
    }
}

struct Run<'a> {
    id: Uuid,
    page: Box<dyn BrowserPage>,
    plan: RunPlan,
    state: RunState,
    cancel: &'a CancellationToken,
    runner: &'a ApplicationRunner,
}

impl Run<'_> {
    fn settings(&self) -> &RunSettings {
        &self.runner.settings
    }

    fn advance(&mut self, next: RunState) {
        info!("{} -> {}", self.state, next);
        self.state = next;
    }

    async fn guard<T>(&self, fut: impl Future<Output = T>) -> Result<T, RunError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RunError::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Guarded and bounded by the plan's action timeout.
    async fn act<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, BrowserError>>,
    ) -> Result<Result<T, BrowserError>, RunError> {
        let timeout = self.plan.action_timeout;
        self.guard(async {
            tokio::time::timeout(timeout, fut)
                .await
                .unwrap_or_else(|_| Err(BrowserError::timeout(what, timeout)))
        })
        .await
    }

    async fn discover(&mut self) -> Result<Vec<QuestionRecord>, RunError> {
        self.navigate().await?;
        self.advance(RunState::Navigated);

        self.dismiss_interstitial().await?;
        self.advance(RunState::Cleared);

        self.wait_for_questions().await?;
        let questions = self.extract().await?;
        self.advance(RunState::Extracted);
        Ok(questions)
    }

    async fn complete(&mut self) -> Result<RunResult, RunError> {
        let questions = self.discover().await?;

        for question in &questions {
            self.answer(question).await?;
        }
        self.advance(RunState::Answered);

        if self.plan.dry_run {
            self.advance(RunState::DryRunComplete);
            let evidence = self.capture(EvidenceTag::DryRun).await;
            return Ok(RunResult::completed(true, questions.len(), evidence));
        }

        self.submit().await?;
        self.advance(RunState::Submitted);
        let evidence = self.capture(EvidenceTag::Submitted).await;
        Ok(RunResult::completed(false, questions.len(), evidence))
    }

    async fn navigate(&self) -> Result<(), RunError> {
        let url = self.plan.job_url.as_str();
        let attempts = self.settings().retries.max(1);
        let mut attempt = 1;

        loop {
            let result = self
                .guard(self.page.goto(url, self.plan.navigation_timeout))
                .await?;

            match result {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    let delay = backoff_delay(self.settings().backoff, attempt);
                    warn!(
                        "Navigation attempt {attempt}/{attempts} failed: {e}; retrying in {}ms",
                        delay.as_millis()
                    );
                    self.guard(tokio::time::sleep(delay)).await?;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(RunError::Navigation {
                        url: url.to_string(),
                        attempts,
                        source,
                    })
                }
            }
        }
    }

    async fn dismiss_interstitial(&self) -> Result<(), RunError> {
        let Some(accept) = self.plan.patterns.interstitial_accept.as_deref() else {
            return Ok(());
        };

        let visible = self
            .guard(
                self.page
                    .wait_visible(accept, self.settings().interstitial_timeout),
            )
            .await?;

        match visible {
            Ok(()) => match self.act("consent banner click", self.page.click(accept)).await? {
                Ok(()) => info!("Dismissed consent banner"),
                Err(e) => warn!("Could not dismiss consent banner: {e}"),
            },
            Err(e) => debug!("No consent banner: {e}"),
        }
        Ok(())
    }

    async fn wait_for_questions(&self) -> Result<(), RunError> {
        let pattern = self.plan.patterns.question_text.as_str();
        let rendered = self
            .guard(self.page.wait_visible(pattern, self.settings().question_wait))
            .await?;

        if let Err(e) = rendered {
            warn!("No question rendered yet, extracting anyway: {e}");
        }
        Ok(())
    }

    async fn extract(&self) -> Result<Vec<QuestionRecord>, RunError> {
        let html = self
            .act("page content", self.page.content())
            .await?
            .map_err(RunError::Snapshot)?;

        let questions = extract_document(&html, &self.plan.compiled);
        if questions.is_empty() {
            warn!("No questions found on {}", self.plan.job_url);
        } else {
            info!("Found {} question(s)", questions.len());
        }
        Ok(questions)
    }

    /// Failures here are logged and swallowed; only cancellation escapes.
    async fn answer(&self, record: &QuestionRecord) -> Result<(), RunError> {
        let question = truncate(&record.text);

        let Some(field) = record.field() else {
            warn!("No answer field for '{question}', skipping");
            return Ok(());
        };

        let resolved = self.guard(self.runner.oracle.resolve(&record.text)).await?;
        if let Err(e) = &resolved {
            warn!("Oracle failed for '{question}': {e}");
        }
        let Some(answer) = normalize_answer(resolved, self.settings().min_confidence) else {
            warn!("No usable answer for '{question}', skipping");
            return Ok(());
        };

        let options = FillOptions {
            visibility_timeout: self.settings().visibility_timeout,
            typing_delay: self.settings().typing_delay,
        };
        let typing = u32::try_from(answer.chars().count()).unwrap_or(u32::MAX);
        let budget = self.plan.action_timeout + options.typing_delay.saturating_mul(typing);

        let filled = self
            .guard(tokio::time::timeout(
                budget,
                apply(self.page.as_ref(), &field, &answer, &options),
            ))
            .await?;

        match filled {
            Ok(Ok(outcome)) => info!("Filled '{question}' ({outcome:?})"),
            Ok(Err(e)) => error!("Could not fill '{question}': {e}"),
            Err(_) => error!(
                "Filling '{question}' timed out after {}ms",
                budget.as_millis()
            ),
        }
        Ok(())
    }

    async fn submit(&self) -> Result<(), RunError> {
        let submit = self.plan.patterns.submit.as_str();

        self.guard(self.page.wait_visible(submit, self.settings().submit_timeout))
            .await?
            .map_err(RunError::Submission)?;
        self.act("submit click", self.page.click(submit))
            .await?
            .map_err(RunError::Submission)?;

        // Client-side submissions often never navigate.
        let settled = self
            .guard(
                self.page
                    .wait_for_navigation(self.settings().submit_settle_timeout),
            )
            .await?;
        match settled {
            Ok(()) => debug!("Page navigated after submission"),
            Err(e) => debug!("No navigation after submission: {e}"),
        }
        Ok(())
    }

    async fn capture(&self, tag: EvidenceTag) -> Option<PathBuf> {
        match self
            .runner
            .evidence
            .capture(self.page.as_ref(), tag, self.id)
            .await
        {
            Ok(path) => {
                info!("Saved {tag} evidence to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not capture {tag} evidence: {e}");
                None
            }
        }
    }

    /// Failure path plus the unconditional close.
    async fn finish<T>(mut self, outcome: Result<T, RunError>) -> Result<T, RunFailure> {
        let result = match outcome {
            Ok(value) => Ok(value),
            Err(error) => {
                let failed_in = self.state;
                error!("Run failed while {failed_in}: {error}");
                self.advance(RunState::Failed);
                let evidence_path = self.capture(EvidenceTag::Error).await;
                Err(RunFailure {
                    error,
                    state: failed_in,
                    evidence_path,
                })
            }
        };

        if let Err(e) = self.page.close().await {
            warn!("Failed to close browser session: {e}");
        }
        self.advance(RunState::Closed);
        result
    }
}

/// Base delay doubled per failed attempt, saturating instead of overflowing.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}
