//! In-memory sites, browsers and translation providers for unit tests.

use crate::browser::html::{HtmlBrowser, HtmlElement, PageSource};
use crate::browser::{Browser, BrowserFactory, Locator};
use crate::config::{FetchConfig, Politeness, RunConfig, SiteConfig, Timeouts, TranslationConfig};
use crate::error::{Error, Result};
use crate::fetch::AssetFetcher;
use crate::models::Capability;
use crate::pipeline::SessionPipeline;
use crate::retry::Backoff;
use crate::translator::{TranslationProvider, Translator};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SECTION_URL: &str = "https://elpais.com/opinion/";

/// Pages served from memory, keyed by exact URL.
#[derive(Debug, Clone, Default)]
pub struct FixtureSite {
    pages: Arc<HashMap<String, String>>,
    delay: Duration,
    panics: bool,
}

impl FixtureSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.to_string(), html.to_string());
        self
    }

    /// Every fetch sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every fetch panics instead of answering.
    pub fn with_panic(mut self) -> Self {
        self.panics = true;
        self
    }
}

#[async_trait]
impl PageSource for FixtureSite {
    async fn fetch(&self, url: &str) -> Result<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.panics {
            panic!("fixture site blew up on {url}");
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Browser(format!("404 for {url}")))
    }
}

fn crisis_article() -> String {
    let filler = "La política europea atraviesa un momento delicado que exige respuestas comunes. "
        .repeat(12);
    format!(
        r#"<html><head><title>Crisis en Europa | Opinión | EL PAÍS</title>
        <meta property="og:image" content="http://127.0.0.1:9/crisis.jpg"></head>
        <body><article><h1 class="a_t">Crisis en Europa</h1>
        <div class="a_b"><p>Primer párrafo.</p><p>{filler}</p><p>Último párrafo.</p></div>
        </article></body></html>"#
    )
}

const EUROPA_ARTICLE: &str = r#"<html><head><title>Europa y la crisis | EL PAÍS</title></head>
    <body><article><h1 class="a_t">Europa y la crisis</h1>
    <div class="a_b"><p>Un texto breve.</p></div></article></body></html>"#;

const SIN_PORTADA_ARTICLE: &str = r#"<html><head><title>EL PAÍS</title>
    <meta property="og:title" content="Sin portada"></head>
    <body><div class="vacio">Nada que leer.</div></body></html>"#;

const SECTION_PAGE: &str = r#"<html><head><title>Opinión | EL PAÍS</title></head><body>
    <article class="c"><h2 class="c_t"><a href="/opinion/2026-02-19/crisis-en-europa.html">Crisis en Europa</a></h2></article>
    <article class="c"><h2 class="c_t"><a href="https://elpais.com/opinion/2026-02-18/europa-y-la-crisis.html">Europa y la crisis</a></h2></article>
    <article class="c"><a href="/opinion/2026-02-19/crisis-en-europa.html">Crisis en Europa (foto)</a></article>
    <nav>
      <a href="/opinion/">Opinión</a>
      <a href="/opinion/editoriales/">Editoriales</a>
      <a href="/espana/2026-02-19/otra-seccion.html">España</a>
      <a href="https://otrodiario.com/opinion/2026-02-19/ajeno.html">Ajeno</a>
      <a href="/opinion/2026-02-17/sin-portada.html">Sin portada</a>
    </nav></body></html>"#;

/// The opinion front page plus three linked articles.
pub fn fixture_site() -> FixtureSite {
    FixtureSite::new()
        .page(SECTION_URL, SECTION_PAGE)
        .page(
            "https://elpais.com/opinion/2026-02-19/crisis-en-europa.html",
            &crisis_article(),
        )
        .page(
            "https://elpais.com/opinion/2026-02-18/europa-y-la-crisis.html",
            EUROPA_ARTICLE,
        )
        .page(
            "https://elpais.com/opinion/2026-02-17/sin-portada.html",
            SIN_PORTADA_ARTICLE,
        )
}

/// No waits, no pauses, a single download attempt, threshold 1.
///
/// Covers land under `images_dir`, normally a test-owned `TempDir`.
pub fn fast_config(images_dir: &Path) -> RunConfig {
    let timeouts = Timeouts {
        page_load: Duration::from_secs(5),
        consent_wait: Duration::ZERO,
        consent_settle: Duration::ZERO,
        section_settle: Duration::ZERO,
        article_settle: Duration::ZERO,
        title_wait: Duration::ZERO,
        session_budget: Duration::from_secs(30),
        cleanup: Duration::from_secs(2),
    };
    let site = SiteConfig::for_section(SECTION_URL, &timeouts).expect("fixture section url");
    RunConfig {
        site,
        timeouts,
        politeness: Politeness {
            article_delay_min: Duration::ZERO,
            article_delay_max: Duration::ZERO,
        },
        translation: fast_translation_config(),
        fetch: FetchConfig {
            attempts: 1,
            timeout: Duration::from_secs(2),
            backoff: Backoff::none(),
            ..FetchConfig::default()
        },
        article_count: 5,
        threshold: 1,
        images_dir: images_dir.to_path_buf(),
        concurrency: None,
    }
}

pub fn fast_translation_config() -> TranslationConfig {
    TranslationConfig {
        retries: 3,
        backoff: Backoff::none(),
        pause_between_calls: Duration::ZERO,
        ..TranslationConfig::default()
    }
}

/// A pipeline whose translator knows the fixture titles and nothing else.
pub fn test_pipeline(config: Arc<RunConfig>) -> SessionPipeline {
    let translator = Translator::new(vec![Box::new(PhraseBook::fixture())], &config.translation);
    let fetcher = AssetFetcher::new(reqwest::Client::new(), config.fetch.attempts, config.fetch.backoff);
    SessionPipeline::new(config, Arc::new(translator), Arc::new(fetcher))
}

/// Fixed phrase table; anything else is an error.
pub struct PhraseBook {
    phrases: HashMap<&'static str, &'static str>,
}

impl PhraseBook {
    pub fn fixture() -> Self {
        Self {
            phrases: HashMap::from([
                ("Crisis en Europa", "Crisis in Europe"),
                ("Europa y la crisis", "Europe and the crisis"),
            ]),
        }
    }
}

#[async_trait]
impl TranslationProvider for PhraseBook {
    fn name(&self) -> &'static str {
        "phrasebook"
    }

    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
        self.phrases
            .get(text)
            .map(|t| t.to_string())
            .ok_or_else(|| Error::Rejected(format!("no entry for {text:?}")))
    }
}

enum Script {
    Always(std::result::Result<String, &'static str>),
    Sequence(Mutex<VecDeque<std::result::Result<String, &'static str>>>),
    EchoUpper,
}

/// Provider that answers from a script and counts calls.
pub struct ScriptedProvider {
    script: Script,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
    fn with(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn always(reply: std::result::Result<String, &'static str>) -> Self {
        Self::with(Script::Always(reply))
    }

    /// Replies in order; once exhausted every call fails.
    pub fn sequence(replies: Vec<std::result::Result<String, &'static str>>) -> Self {
        Self::with(Script::Sequence(Mutex::new(replies.into())))
    }

    pub fn echo_upper() -> Self {
        Self::with(Script::EchoUpper)
    }
}

#[async_trait]
impl TranslationProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = match &self.script {
            Script::Always(reply) => reply.clone(),
            Script::Sequence(queue) => queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err("script exhausted")),
            Script::EchoUpper => Ok(text.to_uppercase()),
        };
        reply.map_err(|e| Error::Rejected(e.to_string()))
    }
}

/// Browser over a [`FixtureSite`] that reports directives, closes and
/// concurrency back to its factory.
pub struct TrackedBrowser {
    inner: HtmlBrowser<FixtureSite>,
    closed: Arc<AtomicUsize>,
    open_now: Arc<AtomicUsize>,
    directives: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Browser for TrackedBrowser {
    type Element = HtmlElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        self.inner.navigate(url).await
    }

    async fn locate(&self, locator: &Locator, wait: Duration) -> Result<Option<HtmlElement>> {
        self.inner.locate(locator, wait).await
    }

    async fn locate_all(&self, locator: &Locator, wait: Duration) -> Result<Vec<HtmlElement>> {
        self.inner.locate_all(locator, wait).await
    }

    async fn click(&self, element: &HtmlElement) -> Result<()> {
        self.inner.click(element).await
    }

    async fn read_attribute(&self, element: &HtmlElement, name: &str) -> Result<Option<String>> {
        self.inner.read_attribute(element, name).await
    }

    async fn read_text(&self, element: &HtmlElement) -> Result<String> {
        self.inner.read_text(element).await
    }

    async fn document_title(&self) -> Result<String> {
        self.inner.document_title().await
    }

    async fn execute(&self, script: &str) -> Result<()> {
        self.directives.lock().unwrap().push(script.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        self.open_now.fetch_sub(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

/// Hands out [`TrackedBrowser`]s over the fixture site, with per-label faults.
pub struct FixtureFactory {
    site: FixtureSite,
    failing: HashSet<String>,
    slow: HashMap<String, Duration>,
    refused: HashSet<String>,
    panicking: HashSet<String>,
    open_now: Arc<AtomicUsize>,
    pub peak_open: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub directives: Arc<Mutex<Vec<String>>>,
}

impl FixtureFactory {
    pub fn new() -> Self {
        Self {
            site: fixture_site(),
            failing: HashSet::new(),
            slow: HashMap::new(),
            refused: HashSet::new(),
            panicking: HashSet::new(),
            open_now: Arc::new(AtomicUsize::new(0)),
            peak_open: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            directives: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sessions with this label open, but every page fails to load.
    pub fn failing(mut self, label: &str) -> Self {
        self.failing.insert(label.to_string());
        self
    }

    /// Sessions with this label wait `delay` on every page.
    pub fn slow(mut self, label: &str, delay: Duration) -> Self {
        self.slow.insert(label.to_string(), delay);
        self
    }

    /// Sessions with this label never get a browser.
    pub fn refuse_open(mut self, label: &str) -> Self {
        self.refused.insert(label.to_string());
        self
    }

    /// Sessions with this label panic on their first page load.
    pub fn panicking(mut self, label: &str) -> Self {
        self.panicking.insert(label.to_string());
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.site = self.site.with_delay(delay);
        self
    }
}

#[async_trait]
impl BrowserFactory for FixtureFactory {
    type Browser = TrackedBrowser;

    async fn open(&self, capability: &Capability) -> Result<TrackedBrowser> {
        let label = capability.label.as_str();
        if self.refused.contains(label) {
            return Err(Error::Session(format!("no capacity for {label}")));
        }
        let site = if self.failing.contains(label) {
            FixtureSite::new()
        } else if self.panicking.contains(label) {
            self.site.clone().with_panic()
        } else if let Some(delay) = self.slow.get(label) {
            self.site.clone().with_delay(*delay)
        } else {
            self.site.clone()
        };

        let now = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_open.fetch_max(now, Ordering::SeqCst);
        Ok(TrackedBrowser {
            inner: HtmlBrowser::new(site),
            closed: Arc::clone(&self.closed),
            open_now: Arc::clone(&self.open_now),
            directives: Arc::clone(&self.directives),
        })
    }
}
