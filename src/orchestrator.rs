//! Fan-out/fan-in over capabilities.
//!
//! Each capability gets its own task that opens a browser, runs the session
//! pipeline under a wall-clock budget, reports status to the dashboard and
//! closes the browser. Tasks hand their [`SessionResult`] back over a channel;
//! the orchestrator is the only writer of the results table.
//!
//! Session lifecycle: `Pending` → `Running` → `Finished(Passed | Failed)`.

use crate::analyzer::FrequencyReport;
use crate::browser::{Browser, BrowserFactory};
use crate::config::Timeouts;
use crate::error::Error;
use crate::models::{Capability, ConsolidatedReport, SessionResult, SessionStatus, translated_titles};
use crate::pipeline::SessionPipeline;
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio::time::{Duration, timeout, timeout_at};
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

/// Where a session stands, as seen by the single result writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Pending,
    Running,
    Finished(SessionStatus),
}

enum SessionEvent {
    Started(usize),
    Finished(usize, SessionResult),
}

/// Runs sessions across capabilities and assembles the consolidated report.
///
/// The factory and pipeline are shared read-only by every session task.
pub struct Orchestrator<F: BrowserFactory> {
    factory: Arc<F>,
    pipeline: Arc<SessionPipeline>,
    timeouts: Timeouts,
}

impl<F: BrowserFactory> Orchestrator<F> {
    pub fn new(factory: F, pipeline: SessionPipeline, timeouts: Timeouts) -> Self {
        Self {
            factory: Arc::new(factory),
            pipeline: Arc::new(pipeline),
            timeouts,
        }
    }

    /// Run one session per capability, at most `concurrency_limit` at a time
    /// (all at once when `None`), and merge what the passed sessions found.
    ///
    /// # Arguments
    ///
    /// * `capabilities` - One session each; session ids are 1-based positions
    /// * `concurrency_limit` - Sessions allowed to hold a browser at once
    ///
    /// # Returns
    ///
    /// A report listing sessions in capability order. The merged word table
    /// reads passed sessions' titles in the order the sessions started.
    /// Never fails: every session ends up in the report, passed or failed.
    #[instrument(level = "info", skip_all, fields(sessions = capabilities.len()))]
    pub async fn run_all(
        &self,
        capabilities: Vec<Capability>,
        concurrency_limit: Option<usize>,
    ) -> ConsolidatedReport {
        let total = capabilities.len();
        let limit = concurrency_limit.unwrap_or(total).clamp(1, total.max(1));
        info!(total, limit, "Launching sessions");

        let semaphore = Arc::new(Semaphore::new(limit));
        let (tx, mut rx) = mpsc::channel::<SessionEvent>(total.max(1) * 2);
        let mut tasks = JoinSet::new();
        let mut phases = vec![SessionPhase::Pending; total];
        let mut start_order = Vec::with_capacity(total);

        for (index, capability) in capabilities.iter().cloned().enumerate() {
            let id = index + 1;
            let semaphore = Arc::clone(&semaphore);
            let factory = Arc::clone(&self.factory);
            let pipeline = Arc::clone(&self.pipeline);
            let timeouts = self.timeouts.clone();
            let tx = tx.clone();
            let span = info_span!("session", id, label = %capability.label);

            tasks.spawn(
                async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return;
                    };
                    let _ = tx.send(SessionEvent::Started(index)).await;
                    let result = run_session(&*factory, &pipeline, capability, id, &timeouts).await;
                    let _ = tx.send(SessionEvent::Finished(index, result)).await;
                }
                .instrument(span),
            );
        }
        drop(tx);

        let mut slots: Vec<Option<SessionResult>> = vec![None; total];
        while let Some(event) = rx.recv().await {
            match event {
                SessionEvent::Started(index) => {
                    phases[index] = SessionPhase::Running;
                    start_order.push(index);
                    debug!(id = index + 1, "Session running");
                }
                SessionEvent::Finished(index, result) => {
                    if slots[index].is_some() {
                        warn!(id = index + 1, "Duplicate result ignored");
                        continue;
                    }
                    phases[index] = SessionPhase::Finished(result.status);
                    info!(
                        id = result.id,
                        label = %result.capability.label,
                        status = result.status.as_str(),
                        articles = result.articles.len(),
                        "Session finished"
                    );
                    slots[index] = Some(result);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Session task aborted");
            }
        }

        let sessions: Vec<SessionResult> = slots
            .into_iter()
            .zip(capabilities)
            .enumerate()
            .map(|(index, (slot, capability))| {
                slot.unwrap_or_else(|| {
                    warn!(id = index + 1, phase = ?phases[index], "Session never reported");
                    SessionResult::failed(
                        index + 1,
                        capability,
                        "session ended without reporting a result".to_string(),
                        0,
                    )
                })
            })
            .collect();

        let titles = merge_titles(&sessions, &start_order);
        let frequency: FrequencyReport = self.pipeline.analyzer().analyze(&titles);
        let report = ConsolidatedReport {
            generated_at: Utc::now().to_rfc3339(),
            sessions,
            frequency,
        };
        info!(
            passed = report.passed_count(),
            failed = report.failed_count(),
            titles = titles.len(),
            repeated_words = report.frequency.len(),
            "All sessions complete"
        );
        report
    }
}

/// Translated titles of passed sessions, in the order the sessions started.
///
/// A session that never started cannot have passed, so it adds nothing.
fn merge_titles(sessions: &[SessionResult], start_order: &[usize]) -> Vec<String> {
    translated_titles(start_order.iter().filter_map(|&i| sessions.get(i)))
}

/// One session, start to finish. Every failure ends up inside the result.
async fn run_session<F: BrowserFactory>(
    factory: &F,
    pipeline: &SessionPipeline,
    capability: Capability,
    id: usize,
    timeouts: &Timeouts,
) -> SessionResult {
    let started = Instant::now();
    let budget = timeouts.session_budget;
    let deadline = tokio::time::Instant::now() + budget;
    let elapsed = || started.elapsed().as_millis();

    let browser = match timeout_at(deadline, factory.open(&capability)).await {
        Ok(Ok(browser)) => browser,
        Ok(Err(e)) => {
            error!(error = %e, "Could not open browser");
            return SessionResult::failed(id, capability, e.to_string(), elapsed());
        }
        Err(_) => {
            error!(?budget, "Timed out opening browser");
            return SessionResult::failed(id, capability, Error::Timeout(budget).to_string(), elapsed());
        }
    };

    let run = AssertUnwindSafe(pipeline.run(&browser, id, &capability.label)).catch_unwind();
    let result = match timeout_at(deadline, run).await {
        Ok(Ok(Ok(output))) => SessionResult::passed(
            id,
            capability.clone(),
            output.articles,
            output.repeated_words,
            elapsed(),
        ),
        Ok(Ok(Err(e))) => {
            error!(error = %e, "Session failed");
            SessionResult::failed(id, capability.clone(), e.to_string(), elapsed())
        }
        Ok(Err(_panic)) => {
            error!("Session panicked");
            SessionResult::failed(id, capability.clone(), "session panicked".to_string(), elapsed())
        }
        Err(_) => {
            error!(?budget, "Session exceeded its budget; abandoning");
            SessionResult::failed(id, capability.clone(), Error::Timeout(budget).to_string(), elapsed())
        }
    };

    release(&browser, &capability, result.status, timeouts.cleanup).await;
    result
}

/// Best-effort: tell the dashboard how it went, then close the browser.
async fn release<B: Browser>(browser: &B, capability: &Capability, status: SessionStatus, budget: Duration) {
    if capability.report_status {
        let directive = session_status_directive(status);
        match timeout(budget, browser.execute(&directive)).await {
            Ok(Ok(())) => debug!("Dashboard status set"),
            Ok(Err(e)) => warn!(error = %e, "Could not set dashboard status"),
            Err(_) => warn!("Dashboard status call timed out"),
        }
    }
    match timeout(budget, browser.close()).await {
        Ok(Ok(())) => debug!("Browser closed"),
        Ok(Err(e)) => warn!(error = %e, "Browser close failed"),
        Err(_) => warn!("Browser close timed out"),
    }
}

/// The `browserstack_executor` directive that marks a remote session.
pub fn session_status_directive(status: SessionStatus) -> String {
    let reason = match status {
        SessionStatus::Passed => "Scrape complete",
        SessionStatus::Failed => "Scrape failed",
    };
    let payload = serde_json::json!({
        "action": "setSessionStatus",
        "arguments": {"status": status.as_str(), "reason": reason},
    });
    format!("browserstack_executor: {payload}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleRecord;
    use crate::testing::{FixtureFactory, fast_config, test_pipeline};
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn orchestrator(
        factory: FixtureFactory,
        budget: Duration,
        images: &TempDir,
    ) -> Orchestrator<FixtureFactory> {
        let mut config = fast_config(images.path());
        config.timeouts.session_budget = budget;
        let timeouts = config.timeouts.clone();
        let pipeline = test_pipeline(Arc::new(config));
        Orchestrator::new(factory, pipeline, timeouts)
    }

    fn caps(labels: &[&str]) -> Vec<Capability> {
        labels
            .iter()
            .map(|l| Capability {
                report_status: true,
                ..Capability::named(l)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_one_broken_session_is_isolated() {
        let factory = FixtureFactory::new().failing("Broken");
        let closed = Arc::clone(&factory.closed);
        let directives = Arc::clone(&factory.directives);
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(factory, Duration::from_secs(30), &tmp);

        let report = orch
            .run_all(caps(&["Chrome Win11", "Firefox Win10", "Broken", "Galaxy S23", "iPhone 14"]), None)
            .await;

        assert_eq!(report.sessions.len(), 5);
        assert_eq!(report.passed_count(), 4);
        assert_eq!(report.failed_count(), 1);
        let broken = &report.sessions[2];
        assert_eq!(broken.capability.label, "Broken");
        assert_eq!(broken.status, SessionStatus::Failed);
        assert!(broken.articles.is_empty());
        assert!(broken.error.is_some());

        // two matching titles per passed session, four passed sessions
        assert_eq!(report.frequency.count_of("crisis"), Some(8));
        assert_eq!(report.frequency.count_of("europe"), Some(8));

        let ids: Vec<usize> = report.sessions.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(closed.load(Ordering::SeqCst), 5);
        let directives = directives.lock().unwrap();
        assert_eq!(directives.len(), 5);
        assert_eq!(
            directives.iter().filter(|d| d.contains("\"failed\"")).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_session_over_budget_times_out_without_blocking_others() {
        let factory = FixtureFactory::new().slow("Stuck", Duration::from_secs(30));
        let closed = Arc::clone(&factory.closed);
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(factory, Duration::from_millis(300), &tmp);

        let started = Instant::now();
        let report = orch.run_all(caps(&["Fast", "Stuck"]), None).await;
        assert!(started.elapsed() < Duration::from_secs(10));

        assert_eq!(report.sessions[0].status, SessionStatus::Passed);
        assert_eq!(report.sessions[1].status, SessionStatus::Failed);
        assert!(report.sessions[1].error.as_deref().unwrap().contains("timed out"));
        // the stuck browser is still released
        assert_eq!(closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let factory = FixtureFactory::new().with_fetch_delay(Duration::from_millis(20));
        let peak = Arc::clone(&factory.peak_open);
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(factory, Duration::from_secs(30), &tmp);

        let report = orch.run_all(caps(&["a", "b", "c", "d"]), Some(2)).await;
        assert_eq!(report.passed_count(), 4);
        let peak = peak.load(Ordering::SeqCst);
        assert!((1..=2).contains(&peak), "peak concurrent sessions was {peak}");
    }

    #[tokio::test]
    async fn test_all_failed_still_reports() {
        let factory = FixtureFactory::new().failing("x").failing("y");
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(factory, Duration::from_secs(30), &tmp);
        let report = orch.run_all(caps(&["x", "y"]), None).await;
        assert!(report.all_failed());
        assert!(report.frequency.is_empty());
    }

    #[tokio::test]
    async fn test_no_capabilities() {
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(FixtureFactory::new(), Duration::from_secs(30), &tmp);
        let report = orch.run_all(Vec::new(), None).await;
        assert!(report.sessions.is_empty());
        assert!(!report.all_failed());
    }

    #[tokio::test]
    async fn test_panicking_session_is_isolated() {
        let factory = FixtureFactory::new().panicking("Boom");
        let closed = Arc::clone(&factory.closed);
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(factory, Duration::from_secs(30), &tmp);

        let report = orch.run_all(caps(&["Chrome Win11", "Boom", "iPhone 14"]), Some(2)).await;

        let statuses: Vec<SessionStatus> = report.sessions.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![SessionStatus::Passed, SessionStatus::Failed, SessionStatus::Passed]
        );
        assert_eq!(report.sessions[1].error.as_deref(), Some("session panicked"));
        assert!(report.sessions[1].articles.is_empty());
        assert_eq!(report.frequency.count_of("crisis"), Some(4));
        // the panicking session still gave its browser back
        assert_eq!(closed.load(Ordering::SeqCst), 3);
    }

    fn passed_with(id: usize, translated: &str) -> SessionResult {
        let article = ArticleRecord {
            title: translated.to_string(),
            title_translated: Some(translated.to_string()),
            body: "(Content not available)".to_string(),
            image_url: None,
            image_path: None,
            source_url: format!("https://elpais.com/opinion/{id}.html"),
        };
        SessionResult::passed(
            id,
            Capability::named(&format!("s{id}")),
            vec![article],
            FrequencyReport::default(),
            1,
        )
    }

    #[test]
    fn test_merge_titles_follows_start_order() {
        let sessions = vec![
            passed_with(1, "first"),
            SessionResult::failed(2, Capability::named("s2"), "x".into(), 1),
            passed_with(3, "third"),
        ];
        assert_eq!(merge_titles(&sessions, &[2, 1, 0]), vec!["third", "first"]);
        // a session that never started contributes nothing
        assert_eq!(merge_titles(&sessions, &[0]), vec!["first"]);
    }

    #[tokio::test]
    async fn test_open_failure_is_session_failure() {
        let factory = FixtureFactory::new().refuse_open("Gone");
        let tmp = TempDir::new().unwrap();
        let orch = orchestrator(factory, Duration::from_secs(30), &tmp);
        let report = orch.run_all(caps(&["Gone", "Here"]), Some(1)).await;
        assert_eq!(report.sessions[0].status, SessionStatus::Failed);
        assert!(report.sessions[0]
            .error
            .as_deref()
            .unwrap()
            .contains("could not open browser session"));
        assert_eq!(report.sessions[1].status, SessionStatus::Passed);
    }

    #[test]
    fn test_status_directive() {
        let d = session_status_directive(SessionStatus::Passed);
        assert!(d.starts_with("browserstack_executor: {"));
        let payload: serde_json::Value =
            serde_json::from_str(d.trim_start_matches("browserstack_executor: ")).unwrap();
        assert_eq!(payload["action"], "setSessionStatus");
        assert_eq!(payload["arguments"]["status"], "passed");
        assert_eq!(payload["arguments"]["reason"], "Scrape complete");
    }
}
