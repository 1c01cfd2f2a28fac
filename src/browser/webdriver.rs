//! WebDriver backend built on `fantoccini`.
//!
//! Works against any W3C endpoint: a remote hub (BrowserStack Automate) or a
//! chromedriver listening locally.

use super::{Browser, BrowserFactory, Locator};
use crate::error::{Error, Result};
use crate::models::Capability;
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

fn cmd_err(e: CmdError) -> Error {
    Error::Browser(e.to_string())
}

fn is_absent(e: &CmdError) -> bool {
    matches!(e, CmdError::WaitTimeout) || e.is_no_such_element()
}

fn to_fantoccini(locator: &Locator) -> fantoccini::Locator<'_> {
    match locator {
        Locator::Css(s) | Locator::Tag(s) => fantoccini::Locator::Css(s),
        Locator::XPath(s) => fantoccini::Locator::XPath(s),
        Locator::Id(s) => fantoccini::Locator::Id(s),
    }
}

/// Opens WebDriver sessions against a single endpoint.
#[derive(Debug, Clone)]
pub struct WebDriverFactory {
    endpoint: String,
    page_load_timeout: Duration,
}

impl WebDriverFactory {
    pub fn new(endpoint: impl Into<String>, page_load_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            page_load_timeout,
        }
    }
}

#[async_trait]
impl BrowserFactory for WebDriverFactory {
    type Browser = WebDriverBrowser;

    #[instrument(level = "info", skip_all, fields(session = %capability.label))]
    async fn open(&self, capability: &Capability) -> Result<WebDriverBrowser> {
        let client = ClientBuilder::native()
            .capabilities(capability.webdriver.clone())
            .connect(&self.endpoint)
            .await
            .map_err(|e| Error::Session(e.to_string()))?;

        let timeouts = TimeoutConfiguration::new(None, Some(self.page_load_timeout), None);
        if let Err(e) = client.update_timeouts(timeouts).await {
            warn!(error = %e, "Could not set page load timeout; continuing with driver default");
        }

        info!("WebDriver session opened");
        Ok(WebDriverBrowser { client })
    }
}

pub struct WebDriverBrowser {
    client: Client,
}

#[async_trait]
impl Browser for WebDriverBrowser {
    type Element = Element;

    #[instrument(level = "debug", skip(self))]
    async fn navigate(&self, url: &str) -> Result<()> {
        self.client.goto(url).await.map_err(|e| Error::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn locate(&self, locator: &Locator, wait: Duration) -> Result<Option<Element>> {
        let found = if wait.is_zero() {
            self.client.find(to_fantoccini(locator)).await
        } else {
            self.client
                .wait()
                .at_most(wait)
                .for_element(to_fantoccini(locator))
                .await
        };

        match found {
            Ok(el) => Ok(Some(el)),
            Err(e) if is_absent(&e) => {
                debug!(%locator, "No element matched");
                Ok(None)
            }
            Err(e) => Err(cmd_err(e)),
        }
    }

    async fn locate_all(&self, locator: &Locator, wait: Duration) -> Result<Vec<Element>> {
        if !wait.is_zero() && self.locate(locator, wait).await?.is_none() {
            return Ok(Vec::new());
        }
        self.client
            .find_all(to_fantoccini(locator))
            .await
            .map_err(cmd_err)
    }

    async fn click(&self, element: &Element) -> Result<()> {
        element.click().await.map_err(cmd_err)
    }

    /// Prefers the DOM property (absolute `href`/`src`) over the raw attribute.
    async fn read_attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        match element.prop(name).await.map_err(cmd_err)? {
            Some(v) if !v.is_empty() => Ok(Some(v)),
            _ => element.attr(name).await.map_err(cmd_err),
        }
    }

    async fn read_text(&self, element: &Element) -> Result<String> {
        element.text().await.map_err(cmd_err)
    }

    async fn document_title(&self) -> Result<String> {
        self.client.title().await.map_err(cmd_err)
    }

    async fn execute(&self, script: &str) -> Result<()> {
        self.client
            .execute(script, Vec::new())
            .await
            .map(|_| ())
            .map_err(cmd_err)
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().close().await.map_err(cmd_err)
    }
}
