//! # Opinion Scout
//!
//! Scrapes the newest articles from a newspaper's opinion section in several
//! browser sessions at once, translates their titles, and reports the words
//! that keep coming back across all of them.
//!
//! ## Features
//!
//! - Parallel sessions on a remote WebDriver hub (five desktop and mobile
//!   capabilities by default), a local chromedriver, or plain HTTP
//! - Fallback chains for consent banners, titles, bodies and cover images
//! - Cover image download per session with bounded retry
//! - Title translation through Google Cloud Translation or MyMemory
//! - Console report plus an optional JSON copy
//!
//! ## Usage
//!
//! ```sh
//! BROWSERSTACK_USERNAME=.. BROWSERSTACK_ACCESS_KEY=.. opinion_scout -j ./reports
//! opinion_scout --lite --articles 3
//! ```
//!
//! ## Architecture
//!
//! 1. **Sessions**: one task per capability, bounded by `--concurrency`
//! 2. **Scraping**: section page, article discovery, per-article extraction
//! 3. **Translation**: titles translated one by one, original kept on failure
//! 4. **Aggregation**: translated titles of passed sessions counted together
//!
//! The process exits with status 1 only when every session failed.

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod analyzer;
mod browser;
mod cli;
mod config;
mod error;
mod fetch;
mod models;
mod orchestrator;
mod outputs;
mod pipeline;
mod retry;
mod scrapers;
#[cfg(test)]
mod testing;
mod translator;
mod utils;

use browser::BrowserFactory;
use browser::html::HtmlBrowserFactory;
use browser::webdriver::WebDriverFactory;
use cli::{Cli, Mode};
use config::{RunConfig, USER_AGENT, builtin_capabilities, hub_endpoint, load_capabilities, local_capability};
use fetch::AssetFetcher;
use models::{Capability, ConsolidatedReport};
use orchestrator::Orchestrator;
use outputs::{json, table};
use pipeline::SessionPipeline;
use translator::{Translator, select_providers};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("opinion_scout starting up");

    let args = Cli::parse();
    let mode = args.mode();
    debug!(?mode, images_dir = %args.images_dir.display(), ?args.json_output_dir, "Parsed CLI arguments");

    let config = RunConfig::from_cli(&args)?;

    // Early check: output directories must be writable before any session starts
    if let Err(e) = ensure_writable_dir(&config.images_dir).await {
        error!(
            path = %config.images_dir.display(),
            error = %e,
            "Images directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }
    if let Some(dir) = args.json_output_dir.as_deref() {
        if let Err(e) = ensure_writable_dir(Path::new(dir)).await {
            error!(path = %dir, error = %e, "JSON output directory is not writable");
            return Err(e.into());
        }
    }

    let capabilities = match (&args.capabilities, mode) {
        (_, Mode::Local) => vec![local_capability(&config.translation.source_lang)],
        (Some(path), _) => load_capabilities(path).await?,
        (None, Mode::Lite) => vec![Capability::named("HTTP lite")],
        (None, Mode::Hub) => builtin_capabilities(),
    };
    info!(sessions = capabilities.len(), ?mode, "Capabilities selected");

    // ---- Shared collaborators ----
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeouts.page_load)
        .build()?;
    let providers = select_providers(&config.translation, &client);
    let translator = Translator::new(providers, &config.translation);
    let fetcher = AssetFetcher::with_timeout(
        config.fetch.timeout,
        &config.fetch.user_agent,
        config.fetch.attempts,
        config.fetch.backoff,
    )?;

    let config = Arc::new(config);
    let pipeline = SessionPipeline::new(Arc::clone(&config), Arc::new(translator), Arc::new(fetcher));

    let report = match mode {
        Mode::Hub => {
            let (Some(user), Some(key)) = (args.hub_username.as_deref(), args.hub_access_key.as_deref())
            else {
                error!("BROWSERSTACK_USERNAME and BROWSERSTACK_ACCESS_KEY are required in hub mode");
                return Err("missing hub credentials (use --local or --lite to run without a hub)".into());
            };
            let endpoint = hub_endpoint(&args.hub_url, user, key)?;
            info!(hub = %args.hub_url, username = %user, "Using remote hub");
            let factory = WebDriverFactory::new(endpoint, config.timeouts.page_load);
            run_sessions(factory, pipeline, &config, capabilities).await
        }
        Mode::Local => {
            info!(endpoint = %args.webdriver_url, "Using local WebDriver");
            let factory = WebDriverFactory::new(args.webdriver_url.clone(), config.timeouts.page_load);
            run_sessions(factory, pipeline, &config, capabilities).await
        }
        Mode::Lite => {
            info!("Using plain HTTP sessions; consent clicks and scripts are skipped");
            run_sessions(HtmlBrowserFactory::new(client), pipeline, &config, capabilities).await
        }
    };

    println!("{}", table::render_report(&report));

    if let Some(dir) = args.json_output_dir.as_deref() {
        match json::write_report(&report, Path::new(dir)).await {
            Ok(path) => info!(path = %path.display(), "JSON report written"),
            Err(e) => error!(error = %e, "Failed to write JSON report"),
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs_f64(),
        passed = report.passed_count(),
        failed = report.failed_count(),
        "opinion_scout finished"
    );

    if report.all_failed() {
        warn!("Every session failed");
        std::process::exit(1);
    }
    Ok(())
}

async fn run_sessions<F: BrowserFactory>(
    factory: F,
    pipeline: SessionPipeline,
    config: &RunConfig,
    capabilities: Vec<Capability>,
) -> ConsolidatedReport {
    let orchestrator = Orchestrator::new(factory, pipeline, config.timeouts.clone());
    orchestrator.run_all(capabilities, config.concurrency).await
}
