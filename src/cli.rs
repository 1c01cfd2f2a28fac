//! Command-line interface definitions for Opinion Scout.
//!
//! Every option can also be supplied through an environment variable.

use crate::config::{DEFAULT_HUB_URL, DEFAULT_LOCAL_WEBDRIVER, OPINION_URL};
use clap::Parser;
use std::path::PathBuf;

/// Where sessions get their browsers from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Remote WebDriver hub, one session per capability.
    Hub,
    /// A single Chrome session through a local chromedriver.
    Local,
    /// Plain HTTP fetches parsed as HTML; no browser involved.
    Lite,
}

/// Command-line arguments for Opinion Scout.
///
/// # Examples
///
/// ```sh
/// # Five parallel BrowserStack sessions (credentials from the environment)
/// opinion_scout
///
/// # Local chromedriver, report JSON written under ./reports
/// opinion_scout --local -j ./reports
///
/// # No browser at all
/// opinion_scout --lite --articles 3
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// YAML file listing capabilities (defaults to the built-in five)
    #[arg(short, long, env = "OPINION_SCOUT_CAPABILITIES")]
    pub capabilities: Option<PathBuf>,

    /// Run one session against a local WebDriver instead of the hub
    #[arg(long, conflicts_with = "lite")]
    pub local: bool,

    /// Run sessions over plain HTTP without a browser
    #[arg(long)]
    pub lite: bool,

    /// Local WebDriver endpoint used with --local
    #[arg(long, env = "WEBDRIVER_URL", default_value = DEFAULT_LOCAL_WEBDRIVER)]
    pub webdriver_url: String,

    /// Remote WebDriver hub endpoint
    #[arg(long, env = "BROWSERSTACK_HUB_URL", default_value = DEFAULT_HUB_URL)]
    pub hub_url: String,

    /// Hub username
    #[arg(long, env = "BROWSERSTACK_USERNAME")]
    pub hub_username: Option<String>,

    /// Hub access key
    #[arg(long, env = "BROWSERSTACK_ACCESS_KEY", hide_env_values = true)]
    pub hub_access_key: Option<String>,

    /// Google Cloud Translation API key; preferred over MyMemory when set
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,

    /// Contact e-mail sent to MyMemory for a higher free quota
    #[arg(long, env = "MYMEMORY_EMAIL")]
    pub translation_email: Option<String>,

    /// Section front page to scrape
    #[arg(long, default_value = OPINION_URL)]
    pub section_url: String,

    /// Articles to scrape per session
    #[arg(short, long, default_value_t = 5)]
    pub articles: usize,

    /// Report words seen strictly more than this many times
    #[arg(short, long, default_value_t = 2)]
    pub threshold: usize,

    /// Maximum simultaneous sessions (defaults to all of them)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Wall-clock budget per session, in seconds
    #[arg(long, default_value_t = 600)]
    pub session_timeout_secs: u64,

    /// Directory for downloaded cover images
    #[arg(short, long, default_value = "images")]
    pub images_dir: PathBuf,

    /// Output directory for the JSON report (skipped when absent)
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Language of the scraped titles
    #[arg(long, default_value = "es")]
    pub source_lang: String,

    /// Language to translate titles into
    #[arg(long, default_value = "en")]
    pub target_lang: String,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.lite {
            Mode::Lite
        } else if self.local {
            Mode::Local
        } else {
            Mode::Hub
        }
    }
}
