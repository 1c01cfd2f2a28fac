//! Browsing capability used by the scrapers.
//!
//! The scrapers only ever talk to a page through the [`Browser`] trait, so the
//! same extraction code runs against a remote WebDriver hub, a local
//! chromedriver, or a plain HTTP fetch parsed with `scraper`.
//!
//! | Backend | Module | JavaScript | Consent overlays |
//! |---------|--------|------------|------------------|
//! | WebDriver (hub or local) | [`webdriver`] | yes | clicked |
//! | HTTP + HTML | [`html`] | no | never present |

use crate::error::Result;
use crate::models::Capability;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod html;
pub mod webdriver;

/// How to find an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Locator {
    Css(String),
    XPath(String),
    Id(String),
    Tag(String),
}

impl Locator {
    pub fn css(selector: &str) -> Self {
        Locator::Css(selector.to_string())
    }

    pub fn xpath(expr: &str) -> Self {
        Locator::XPath(expr.to_string())
    }

    pub fn id(id: &str) -> Self {
        Locator::Id(id.to_string())
    }

    pub fn tag(name: &str) -> Self {
        Locator::Tag(name.to_string())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={s}"),
            Locator::XPath(s) => write!(f, "xpath={s}"),
            Locator::Id(s) => write!(f, "id={s}"),
            Locator::Tag(s) => write!(f, "tag={s}"),
        }
    }
}

/// One open browsing session.
///
/// `locate` returns `Ok(None)` when nothing matched within `wait`; `Err` is
/// reserved for failures of the session itself.
#[async_trait]
pub trait Browser: Send + Sync {
    type Element: Send + Sync;

    async fn navigate(&self, url: &str) -> Result<()>;

    async fn locate(&self, locator: &Locator, wait: Duration) -> Result<Option<Self::Element>>;

    async fn locate_all(&self, locator: &Locator, wait: Duration) -> Result<Vec<Self::Element>>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    async fn read_attribute(&self, element: &Self::Element, name: &str) -> Result<Option<String>>;

    async fn read_text(&self, element: &Self::Element) -> Result<String>;

    async fn document_title(&self) -> Result<String>;

    /// Run a script (or a vendor directive disguised as one) in the page.
    async fn execute(&self, script: &str) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Opens one [`Browser`] per capability.
#[async_trait]
pub trait BrowserFactory: Send + Sync + 'static {
    type Browser: Browser + 'static;

    async fn open(&self, capability: &Capability) -> Result<Self::Browser>;
}
