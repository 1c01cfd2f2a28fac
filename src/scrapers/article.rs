//! Opinion-section scraper: consent handling, article discovery and
//! per-article extraction.
//!
//! # URL Pattern
//!
//! Only dated article pages qualify, e.g.
//! `https://elpais.com/opinion/2026-02-19/some-slug.html`. Listing pages such
//! as `/opinion/editoriales/` and the bare `/opinion/` root never do.

use super::strategy::extract;
use crate::browser::{Browser, Locator};
use crate::config::{SiteConfig, Timeouts};
use crate::error::Result;
use crate::models::ArticleRecord;
use crate::utils::truncate_with_ellipsis;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

static DATE_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d{4}-\d{2}-\d{2}/").unwrap());

/// Does `href` point at a dated article inside the configured section?
pub fn is_article_url(href: &str, site: &SiteConfig) -> bool {
    let Ok(url) = Url::parse(href) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let on_domain = host == site.domain || host.ends_with(&format!(".{}", site.domain));
    if !on_domain {
        return false;
    }
    let path = url.path();
    if !path.contains(&site.section_path) {
        return false;
    }
    if path.trim_end_matches('/') == site.section_path.trim_end_matches('/') {
        return false;
    }
    DATE_SEGMENT.is_match(path)
}

/// Reads the opinion section through a [`Browser`], following the
/// fallback chains in [`SiteConfig`].
///
/// Borrows everything it needs, so one is made per session.
pub struct ArticleExtractor<'a, B: ?Sized> {
    browser: &'a B,
    site: &'a SiteConfig,
    timeouts: &'a Timeouts,
}

impl<'a, B: Browser + ?Sized> ArticleExtractor<'a, B> {
    pub fn new(browser: &'a B, site: &'a SiteConfig, timeouts: &'a Timeouts) -> Self {
        Self {
            browser,
            site,
            timeouts,
        }
    }

    /// Load the section front page and clear any consent overlay.
    ///
    /// Unlike a single article, a section that fails to load is fatal for the
    /// session.
    #[instrument(level = "info", skip_all, fields(url = %self.site.section_url))]
    pub async fn open_section(&self) -> Result<()> {
        self.browser.navigate(&self.site.section_url).await?;
        settle(self.timeouts.section_settle).await;
        self.dismiss_consent_overlay().await;
        match self.browser.document_title().await {
            Ok(title) => info!(%title, "Section loaded"),
            Err(e) => debug!(error = %e, "Could not read section title"),
        }
        Ok(())
    }

    /// Click the first consent button that shows up; `true` if one was clicked.
    pub async fn dismiss_consent_overlay(&self) -> bool {
        for locator in &self.site.consent_buttons {
            let found = match self.browser.locate(locator, self.timeouts.consent_wait).await {
                Ok(Some(button)) => button,
                Ok(None) => continue,
                Err(e) => {
                    debug!(%locator, error = %e, "Consent locator failed");
                    continue;
                }
            };
            match self.browser.click(&found).await {
                Ok(()) => {
                    info!(%locator, "Consent banner dismissed");
                    settle(self.timeouts.consent_settle).await;
                    return true;
                }
                Err(e) => debug!(%locator, error = %e, "Consent button not clickable"),
            }
        }
        debug!("No consent banner found (or already dismissed)");
        false
    }

    /// Collect up to `count` distinct article URLs in discovery order.
    ///
    /// Card selectors are scanned first; every link on the page is the last
    /// resort. Fewer than `count` results is not an error.
    #[instrument(level = "info", skip(self))]
    pub async fn discover_article_urls(&self, count: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut urls = Vec::new();
        if count == 0 {
            return urls;
        }

        let scans = self
            .site
            .card_selectors
            .iter()
            .chain(std::iter::once(&self.site.link_locator));
        for locator in scans {
            let links = match self.browser.locate_all(locator, Duration::ZERO).await {
                Ok(links) => links,
                Err(e) => {
                    debug!(%locator, error = %e, "Link scan failed");
                    continue;
                }
            };
            for link in links {
                let Ok(Some(href)) = self.browser.read_attribute(&link, "href").await else {
                    continue;
                };
                let href = self.resolve(&href);
                if is_article_url(&href, self.site) && seen.insert(href.clone()) {
                    urls.push(href);
                    if urls.len() >= count {
                        info!(count = urls.len(), "Article URLs collected");
                        return urls;
                    }
                }
            }
        }

        if urls.is_empty() {
            warn!("No article links found on the section page");
        } else {
            info!(count = urls.len(), wanted = count, "Fewer article URLs than requested");
        }
        urls
    }

    /// Visit `url` and pull title, body and cover image URL.
    ///
    /// Returns `None` when the page cannot be loaded; the batch carries on.
    pub async fn extract_article(&self, url: &str) -> Option<ArticleRecord> {
        match self.try_extract_article(url).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(%url, error = %e, "Skipping article");
                None
            }
        }
    }

    #[instrument(level = "info", skip(self))]
    async fn try_extract_article(&self, url: &str) -> Result<ArticleRecord> {
        self.browser.navigate(url).await?;
        settle(self.timeouts.article_settle).await;
        self.dismiss_consent_overlay().await;

        let title = extract(self.browser, &self.site.title).await.unwrap_or_default();
        let body = match extract(self.browser, &self.site.body).await {
            Some(text) => truncate_with_ellipsis(&text, self.site.body_char_cap),
            None => self.site.body_placeholder.clone(),
        };
        let image_url = extract(self.browser, &self.site.image).await;

        info!(%title, has_image = image_url.is_some(), body_chars = body.chars().count(), "Extracted article");
        Ok(ArticleRecord {
            title,
            title_translated: None,
            body,
            image_url,
            image_path: None,
            source_url: url.to_string(),
        })
    }

    fn resolve(&self, href: &str) -> String {
        Url::parse(&self.site.section_url)
            .and_then(|base| base.join(href))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string())
    }
}

async fn settle(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}
