//! Lightweight backend: fetch the page over HTTP and query it with `scraper`.
//!
//! No JavaScript runs, so XPath locators never match, clicks do nothing, and
//! scripts are ignored. Good enough for pages that render server-side.

use super::{Browser, BrowserFactory, Locator};
use crate::error::{Error, Result};
use crate::models::Capability;
use async_trait::async_trait;
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Where [`HtmlBrowser`] gets its markup from.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<String> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

#[async_trait]
impl<S: PageSource + ?Sized> PageSource for Arc<S> {
    async fn fetch(&self, url: &str) -> Result<String> {
        (**self).fetch(url).await
    }
}

/// Snapshot of a matched element; `scraper` nodes cannot outlive the parse.
#[derive(Debug, Clone)]
pub struct HtmlElement {
    text: String,
    attributes: HashMap<String, String>,
    base: Option<Url>,
}

impl HtmlElement {
    fn capture(el: ElementRef<'_>, base: Option<&Url>) -> Self {
        Self {
            text: el.text().flat_map(str::split_whitespace).join(" "),
            attributes: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            base: base.cloned(),
        }
    }
}

struct LoadedPage {
    url: Option<Url>,
    html: String,
}

pub struct HtmlBrowser<S> {
    source: S,
    current: Mutex<Option<LoadedPage>>,
}

impl<S: PageSource> HtmlBrowser<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            current: Mutex::new(None),
        }
    }

    fn with_page<T>(&self, f: impl FnOnce(&LoadedPage) -> T) -> Result<T> {
        let guard = self
            .current
            .lock()
            .map_err(|_| Error::Browser("page state poisoned".to_string()))?;
        match guard.as_ref() {
            Some(page) => Ok(f(page)),
            None => Err(Error::Browser("no page loaded".to_string())),
        }
    }

    fn query(&self, locator: &Locator, limit: Option<usize>) -> Result<Vec<HtmlElement>> {
        let css = match locator {
            Locator::Css(s) | Locator::Tag(s) => s.clone(),
            Locator::Id(id) => format!("[id=\"{id}\"]"),
            Locator::XPath(_) => {
                debug!(%locator, "XPath is not supported without a browser engine");
                return Ok(Vec::new());
            }
        };
        let selector = Selector::parse(&css)
            .map_err(|e| Error::Browser(format!("invalid selector {css:?}: {e}")))?;

        self.with_page(|page| {
            let doc = Html::parse_document(&page.html);
            doc.select(&selector)
                .take(limit.unwrap_or(usize::MAX))
                .map(|el| HtmlElement::capture(el, page.url.as_ref()))
                .collect()
        })
    }
}

#[async_trait]
impl<S: PageSource> Browser for HtmlBrowser<S> {
    type Element = HtmlElement;

    #[instrument(level = "debug", skip(self))]
    async fn navigate(&self, url: &str) -> Result<()> {
        let html = self
            .source
            .fetch(url)
            .await
            .map_err(|e| Error::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        let page = LoadedPage {
            url: Url::parse(url).ok(),
            html,
        };
        let mut guard = self
            .current
            .lock()
            .map_err(|_| Error::Browser("page state poisoned".to_string()))?;
        *guard = Some(page);
        Ok(())
    }

    async fn locate(&self, locator: &Locator, _wait: Duration) -> Result<Option<HtmlElement>> {
        Ok(self.query(locator, Some(1))?.into_iter().next())
    }

    async fn locate_all(&self, locator: &Locator, _wait: Duration) -> Result<Vec<HtmlElement>> {
        self.query(locator, None)
    }

    async fn click(&self, _element: &HtmlElement) -> Result<()> {
        Ok(())
    }

    /// `href` and `src` come back absolute, like a live DOM would report them.
    async fn read_attribute(&self, element: &HtmlElement, name: &str) -> Result<Option<String>> {
        let Some(raw) = element.attributes.get(name) else {
            return Ok(None);
        };
        if matches!(name, "href" | "src") {
            if let Some(resolved) = element.base.as_ref().and_then(|b| b.join(raw).ok()) {
                return Ok(Some(resolved.to_string()));
            }
        }
        Ok(Some(raw.clone()))
    }

    async fn read_text(&self, element: &HtmlElement) -> Result<String> {
        Ok(element.text.clone())
    }

    async fn document_title(&self) -> Result<String> {
        let title = Locator::tag("title");
        Ok(self
            .query(&title, Some(1))?
            .into_iter()
            .next()
            .map(|el| el.text)
            .unwrap_or_default())
    }

    async fn execute(&self, _script: &str) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Ok(mut guard) = self.current.lock() {
            guard.take();
        }
        Ok(())
    }
}

/// Every capability gets the same HTTP client; labels only name the session.
#[derive(Debug, Clone)]
pub struct HtmlBrowserFactory {
    client: reqwest::Client,
}

impl HtmlBrowserFactory {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BrowserFactory for HtmlBrowserFactory {
    type Browser = HtmlBrowser<HttpPageSource>;

    async fn open(&self, _capability: &Capability) -> Result<Self::Browser> {
        Ok(HtmlBrowser::new(HttpPageSource::new(self.client.clone())))
    }
}
