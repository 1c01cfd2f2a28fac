//! Run configuration.
//!
//! Everything tunable lives in one immutable [`RunConfig`], built once from
//! the CLI in `main` and handed to each component. Selector tables are data
//! here, not code in the scrapers.

use crate::browser::Locator;
use crate::cli::Cli;
use crate::error::{Error, Result};
use crate::models::Capability;
use crate::retry::Backoff;
use crate::scrapers::strategy::{Acceptance, Attempt, FieldSpec};
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

pub const OPINION_URL: &str = "https://elpais.com/opinion/";
pub const DEFAULT_HUB_URL: &str = "https://hub.browserstack.com/wd/hub";
pub const DEFAULT_LOCAL_WEBDRIVER: &str = "http://localhost:9515";
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; OpinionScout/0.1)";

const BS_PROJECT: &str = "ElPais Scraper";
const BS_BUILD: &str = "elpais-opinion-scrape";

/// Waits and settle delays. All of these are defaults, not protocol limits.
#[derive(Debug, Clone)]
pub struct Timeouts {
    pub page_load: Duration,
    /// Wait per consent-button locator.
    pub consent_wait: Duration,
    pub consent_settle: Duration,
    pub section_settle: Duration,
    pub article_settle: Duration,
    /// Wait per heading locator in the title chain.
    pub title_wait: Duration,
    /// Hard wall-clock budget for one session.
    pub session_budget: Duration,
    /// Budget for the dashboard status call and browser close.
    pub cleanup: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_load: Duration::from_secs(30),
            consent_wait: Duration::from_secs(5),
            consent_settle: Duration::from_millis(1500),
            section_settle: Duration::from_secs(3),
            article_settle: Duration::from_secs(2),
            title_wait: Duration::from_secs(6),
            session_budget: Duration::from_secs(600),
            cleanup: Duration::from_secs(30),
        }
    }
}

/// Pause between article visits, drawn uniformly from `min..=max`.
#[derive(Debug, Clone)]
pub struct Politeness {
    pub article_delay_min: Duration,
    pub article_delay_max: Duration,
}

impl Default for Politeness {
    fn default() -> Self {
        Self {
            article_delay_min: Duration::from_secs(1),
            article_delay_max: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub source_lang: String,
    pub target_lang: String,
    /// Attempts per provider.
    pub retries: usize,
    pub backoff: Backoff,
    pub pause_between_calls: Duration,
    pub google_api_key: Option<String>,
    /// Sent to MyMemory for a higher free-tier quota.
    pub contact_email: Option<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_lang: "es".to_string(),
            target_lang: "en".to_string(),
            retries: 3,
            backoff: Backoff::constant(Duration::from_secs(1)),
            pause_between_calls: Duration::from_millis(500),
            google_api_key: None,
            contact_email: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub attempts: usize,
    pub timeout: Duration,
    pub backoff: Backoff,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            timeout: Duration::from_secs(15),
            backoff: Backoff::new(
                Duration::from_secs(1),
                Duration::from_secs(8),
                Duration::from_millis(250),
            ),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Where to scrape and how to read each page.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub section_url: String,
    /// Registrable domain; subdomains also qualify.
    pub domain: String,
    /// Path prefix every article URL must contain, e.g. `/opinion/`.
    pub section_path: String,
    /// High-precision link locators, tried before `link_locator`.
    pub card_selectors: Vec<Locator>,
    pub link_locator: Locator,
    pub consent_buttons: Vec<Locator>,
    pub title: FieldSpec,
    pub body: FieldSpec,
    pub image: FieldSpec,
    pub body_char_cap: usize,
    pub body_placeholder: String,
}

impl SiteConfig {
    /// Selector tables for El País, pointed at `section_url`.
    pub fn for_section(section_url: &str, timeouts: &Timeouts) -> Result<Self> {
        let url = Url::parse(section_url)
            .map_err(|e| Error::Config(format!("invalid section url {section_url:?}: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::Config(format!("section url {section_url:?} has no host")))?;
        let domain = host.strip_prefix("www.").unwrap_or(host).to_string();
        let mut section_path = url.path().to_string();
        if !section_path.ends_with('/') {
            section_path.push('/');
        }

        let card_selectors = [
            "article.c a[href]",
            "article h2 a",
            "h2.c_t a",
            "div.c_d h2 a",
            "div.c_h a",
            "article a[href]",
        ]
        .into_iter()
        .map(Locator::css)
        .collect();

        let consent_buttons = vec![
            Locator::id("didomi-notice-agree-button"),
            Locator::xpath(
                "//button[contains(translate(text(),'ACEPTAR','aceptar'),'aceptar')]",
            ),
            Locator::xpath("//button[contains(@class,'accept')]"),
            Locator::xpath("//button[contains(text(),'Accept')]"),
            Locator::css("button.css-1ynyhfy"),
            Locator::css("[data-testid='accept-button']"),
        ];

        let title = FieldSpec::new(
            "title",
            vec![
                Attempt::text(Locator::css("h1.a_t"), timeouts.title_wait),
                Attempt::text(Locator::css("h1.article-title"), timeouts.title_wait),
                Attempt::text(Locator::css("h1"), timeouts.title_wait),
                Attempt::attribute(
                    Locator::css("meta[property='og:title']"),
                    "content",
                    Duration::ZERO,
                ),
                Attempt::document_title(),
            ],
            Acceptance::NonEmpty,
        );

        let body = FieldSpec::new(
            "body",
            [
                "div.a_b p",
                "article p",
                "div.article-body p",
                "div[data-dtm-region='articulo_cuerpo'] p",
            ]
            .into_iter()
            .map(|css| Attempt::joined_text(Locator::css(css), Duration::ZERO))
            .collect(),
            Acceptance::NonEmpty,
        );

        let image = FieldSpec::new(
            "image",
            vec![
                Attempt::attribute(
                    Locator::css("meta[property='og:image']"),
                    "content",
                    Duration::ZERO,
                ),
                Attempt::attribute(Locator::css("figure img"), "src", Duration::ZERO),
                Attempt::attribute(Locator::css("div.a_m img"), "src", Duration::ZERO),
            ],
            Acceptance::TransferUrl,
        );

        Ok(Self {
            section_url: section_url.to_string(),
            domain,
            section_path,
            card_selectors,
            link_locator: Locator::tag("a"),
            consent_buttons,
            title,
            body,
            image,
            body_char_cap: 600,
            body_placeholder: "(Content not available)".to_string(),
        })
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::for_section(OPINION_URL, &Timeouts::default()).expect("Not a valid section url")
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub site: SiteConfig,
    pub timeouts: Timeouts,
    pub politeness: Politeness,
    pub translation: TranslationConfig,
    pub fetch: FetchConfig,
    /// Articles to scrape per session.
    pub article_count: usize,
    /// Report words seen strictly more than this many times.
    pub threshold: usize,
    pub images_dir: PathBuf,
    /// Simultaneous sessions; `None` runs them all at once.
    pub concurrency: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            timeouts: Timeouts::default(),
            politeness: Politeness::default(),
            translation: TranslationConfig::default(),
            fetch: FetchConfig::default(),
            article_count: 5,
            threshold: 2,
            images_dir: PathBuf::from("images"),
            concurrency: None,
        }
    }
}

impl RunConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let timeouts = Timeouts {
            session_budget: Duration::from_secs(cli.session_timeout_secs),
            ..Timeouts::default()
        };
        let translation = TranslationConfig {
            source_lang: cli.source_lang.clone(),
            target_lang: cli.target_lang.clone(),
            google_api_key: cli.google_api_key.clone(),
            contact_email: cli.translation_email.clone(),
            ..TranslationConfig::default()
        };
        Ok(Self {
            site: SiteConfig::for_section(&cli.section_url, &timeouts)?,
            timeouts,
            politeness: Politeness::default(),
            translation,
            fetch: FetchConfig::default(),
            article_count: cli.articles,
            threshold: cli.threshold,
            images_dir: cli.images_dir.clone(),
            concurrency: cli.concurrency.filter(|n| *n > 0),
        })
    }
}

fn bstack_capability(browser: &str, label: &str, options: Value) -> Capability {
    let mut bstack = match options {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    bstack.insert("sessionName".into(), json!(label));
    bstack.insert("projectName".into(), json!(BS_PROJECT));
    bstack.insert("buildName".into(), json!(BS_BUILD));

    let mut webdriver = Map::new();
    webdriver.insert("browserName".into(), json!(browser));
    webdriver.insert("bstack:options".into(), Value::Object(bstack));

    Capability {
        label: label.to_string(),
        report_status: true,
        webdriver,
    }
}

/// Three desktop browsers and two real mobile devices.
pub fn builtin_capabilities() -> Vec<Capability> {
    vec![
        bstack_capability(
            "Chrome",
            "Chrome Win11",
            json!({"os": "Windows", "osVersion": "11", "browserVersion": "latest"}),
        ),
        bstack_capability(
            "Firefox",
            "Firefox Win10",
            json!({"os": "Windows", "osVersion": "10", "browserVersion": "latest"}),
        ),
        bstack_capability(
            "Safari",
            "Safari macOS Ventura",
            json!({"os": "OS X", "osVersion": "Ventura", "browserVersion": "latest"}),
        ),
        bstack_capability(
            "Chrome",
            "Galaxy S23 Chrome",
            json!({"deviceName": "Samsung Galaxy S23", "osVersion": "13.0", "realMobile": "true"}),
        ),
        bstack_capability(
            "Safari",
            "iPhone 14 Safari",
            json!({"deviceName": "iPhone 14", "osVersion": "16", "realMobile": "true"}),
        ),
    ]
}

/// Chrome on this machine, asking for pages in `lang`.
pub fn local_capability(lang: &str) -> Capability {
    let mut webdriver = Map::new();
    webdriver.insert("browserName".into(), json!("chrome"));
    webdriver.insert("pageLoadStrategy".into(), json!("eager"));
    webdriver.insert(
        "goog:chromeOptions".into(),
        json!({
            "args": [
                format!("--lang={lang}"),
                "--disable-blink-features=AutomationControlled",
                "--window-size=1280,900",
            ],
            "prefs": {"intl.accept_languages": format!("{lang},{lang}-{}", lang.to_uppercase())},
        }),
    );
    Capability {
        label: "Chrome (local)".to_string(),
        report_status: false,
        webdriver,
    }
}

/// Read a YAML list of capabilities.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_capabilities(path: &Path) -> Result<Vec<Capability>> {
    let raw = fs::read_to_string(path).await?;
    let caps: Vec<Capability> = serde_yaml::from_str(&raw)?;
    if caps.is_empty() {
        return Err(Error::Config(format!(
            "{} lists no capabilities",
            path.display()
        )));
    }
    info!(count = caps.len(), "Loaded capabilities");
    Ok(caps)
}

/// Hub endpoint with percent-encoded credentials in the userinfo.
pub fn hub_endpoint(base: &str, username: &str, access_key: &str) -> Result<String> {
    let mut url =
        Url::parse(base).map_err(|e| Error::Config(format!("invalid hub url {base:?}: {e}")))?;
    let user = urlencoding::encode(username);
    let key = urlencoding::encode(access_key);
    url.set_username(&user)
        .and_then(|_| url.set_password(Some(&key)))
        .map_err(|_| Error::Config(format!("hub url {base:?} cannot carry credentials")))?;
    Ok(url.to_string())
}
