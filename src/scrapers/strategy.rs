//! Ordered fallback chains for reading one field off a page.
//!
//! A [`FieldSpec`] is plain data: a list of [`Attempt`]s tried strictly in
//! order, each with its own wait. The first attempt producing an acceptable
//! value wins; nothing is merged or ranked. When every attempt comes up empty
//! the field is absent, which is not an error.

use crate::browser::{Browser, Locator};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// What to read once a locator matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    /// Visible text of the first match.
    Text(Locator),
    /// An attribute of the first match.
    Attribute(Locator, String),
    /// Visible text of every match, joined with spaces.
    JoinedText(Locator),
    /// The document `<title>`.
    DocumentTitle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub reading: Reading,
    pub wait: Duration,
}

impl Attempt {
    pub fn text(locator: Locator, wait: Duration) -> Self {
        Self {
            reading: Reading::Text(locator),
            wait,
        }
    }

    pub fn attribute(locator: Locator, name: &str, wait: Duration) -> Self {
        Self {
            reading: Reading::Attribute(locator, name.to_string()),
            wait,
        }
    }

    pub fn joined_text(locator: Locator, wait: Duration) -> Self {
        Self {
            reading: Reading::JoinedText(locator),
            wait,
        }
    }

    pub fn document_title() -> Self {
        Self {
            reading: Reading::DocumentTitle,
            wait: Duration::ZERO,
        }
    }
}

/// Which values end the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    NonEmpty,
    /// An absolute `http`/`https` URL.
    TransferUrl,
}

impl Acceptance {
    fn accepts(&self, value: &str) -> bool {
        match self {
            Acceptance::NonEmpty => !value.is_empty(),
            Acceptance::TransferUrl => Url::parse(value)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub attempts: Vec<Attempt>,
    pub accept: Acceptance,
}

impl FieldSpec {
    pub fn new(name: &str, attempts: Vec<Attempt>, accept: Acceptance) -> Self {
        Self {
            name: name.to_string(),
            attempts,
            accept,
        }
    }
}

/// Walk `spec` against the current page and return the first accepted value.
///
/// A browser error inside one attempt only skips that attempt.
pub async fn extract<B: Browser + ?Sized>(browser: &B, spec: &FieldSpec) -> Option<String> {
    for (i, attempt) in spec.attempts.iter().enumerate() {
        match run_attempt(browser, attempt).await {
            Ok(Some(value)) if spec.accept.accepts(&value) => {
                debug!(field = %spec.name, attempt = i + 1, "Field resolved");
                return Some(value);
            }
            Ok(_) => trace!(field = %spec.name, attempt = i + 1, "Attempt yielded nothing"),
            Err(e) => debug!(field = %spec.name, attempt = i + 1, error = %e, "Attempt failed"),
        }
    }
    debug!(field = %spec.name, "All attempts exhausted");
    None
}

async fn run_attempt<B: Browser + ?Sized>(
    browser: &B,
    attempt: &Attempt,
) -> crate::error::Result<Option<String>> {
    let value = match &attempt.reading {
        Reading::Text(locator) => match browser.locate(locator, attempt.wait).await? {
            Some(el) => Some(browser.read_text(&el).await?),
            None => None,
        },
        Reading::Attribute(locator, name) => match browser.locate(locator, attempt.wait).await? {
            Some(el) => browser.read_attribute(&el, name).await?,
            None => None,
        },
        Reading::JoinedText(locator) => {
            let mut parts = Vec::new();
            for el in browser.locate_all(locator, attempt.wait).await? {
                let text = browser.read_text(&el).await?;
                let text = text.trim();
                if !text.is_empty() {
                    parts.push(text.to_string());
                }
            }
            Some(parts.join(" "))
        }
        Reading::DocumentTitle => Some(browser.document_title().await?),
    };
    Ok(value.map(|v| v.trim().to_string()))
}
