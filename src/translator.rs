//! Title translation with provider fallback and bounded retry.
//!
//! # Providers
//!
//! | Provider | Needs | Request |
//! |----------|-------|---------|
//! | [`GoogleTranslate`] | `GOOGLE_API_KEY` | `POST /language/translate/v2` |
//! | [`MyMemory`] | nothing (optional contact e-mail) | `GET /get?q=..&langpair=es\|en` |
//!
//! [`select_providers`] decides once, at startup, which providers a
//! [`Translator`] walks. Whatever happens, [`Translator::translate`] hands back
//! a string: the translation, or the input unchanged.

use crate::config::TranslationConfig;
use crate::error::{Error, Result};
use crate::retry::{Backoff, retry_with_backoff};
use crate::utils::truncate_for_log;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

pub const MYMEMORY_URL: &str = "https://api.mymemory.translated.net/get";
pub const GOOGLE_URL: &str = "https://translation.googleapis.com/language/translate/v2";

/// Case-insensitive marker MyMemory puts in `translatedText` for bad pairs.
const INVALID_PAIR_SENTINEL: &str = "invalid language pair";

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct MyMemoryResponse {
    #[serde(rename = "responseData")]
    response_data: MyMemoryData,
}

#[derive(Debug, Deserialize)]
struct MyMemoryData {
    #[serde(rename = "translatedText", default)]
    translated_text: Option<String>,
}

/// The free MyMemory API.
#[derive(Debug, Clone)]
pub struct MyMemory {
    client: reqwest::Client,
    endpoint: String,
    contact_email: Option<String>,
}

impl MyMemory {
    pub fn new(client: reqwest::Client, contact_email: Option<String>) -> Self {
        Self {
            client,
            endpoint: MYMEMORY_URL.to_string(),
            contact_email,
        }
    }
}

#[async_trait]
impl TranslationProvider for MyMemory {
    fn name(&self) -> &'static str {
        "mymemory"
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let langpair = format!("{source}|{target}");
        let mut query = vec![("q", text), ("langpair", langpair.as_str())];
        if let Some(email) = self.contact_email.as_deref() {
            query.push(("de", email));
        }
        let body: MyMemoryResponse = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.response_data.translated_text.unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    data: GoogleData,
}

#[derive(Debug, Deserialize)]
struct GoogleData {
    translations: Vec<GoogleTranslation>,
}

#[derive(Debug, Deserialize)]
struct GoogleTranslation {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Google Cloud Translation v2, keyed by API key.
#[derive(Clone)]
pub struct GoogleTranslate {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GoogleTranslate {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            endpoint: GOOGLE_URL.to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl TranslationProvider for GoogleTranslate {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let body: GoogleResponse = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("q", text),
                ("source", source),
                ("target", target),
                ("key", self.api_key.as_str()),
                ("format", "text"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        body.data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| Error::Rejected("empty translations array".to_string()))
    }
}

/// Commercial provider first when a key is configured, the free one always last.
pub fn select_providers(
    config: &TranslationConfig,
    client: &reqwest::Client,
) -> Vec<Box<dyn TranslationProvider>> {
    let mut providers: Vec<Box<dyn TranslationProvider>> = Vec::new();
    if let Some(key) = config.google_api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        providers.push(Box::new(GoogleTranslate::new(client.clone(), key.to_string())));
    }
    providers.push(Box::new(MyMemory::new(
        client.clone(),
        config.contact_email.clone(),
    )));
    info!(
        providers = ?providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
        "Translation providers selected"
    );
    providers
}

/// A response counts only if it is non-empty and not the invalid-pair sentinel.
fn accept(response: String) -> Result<String> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(Error::Rejected("empty response".to_string()));
    }
    if trimmed.to_lowercase().contains(INVALID_PAIR_SENTINEL) {
        return Err(Error::Rejected(truncate_for_log(trimmed, 80)));
    }
    Ok(trimmed.to_string())
}

/// Walks an ordered provider list and never fails: the worst case is the
/// untranslated input.
pub struct Translator {
    providers: Vec<Box<dyn TranslationProvider>>,
    source: String,
    target: String,
    retries: usize,
    backoff: Backoff,
    pause: Duration,
}

impl Translator {
    pub fn new(providers: Vec<Box<dyn TranslationProvider>>, config: &TranslationConfig) -> Self {
        Self {
            providers,
            source: config.source_lang.clone(),
            target: config.target_lang.clone(),
            retries: config.retries,
            backoff: config.backoff,
            pause: config.pause_between_calls,
        }
    }

    /// Translate `text`, giving each provider up to `retries` attempts.
    ///
    /// # Arguments
    ///
    /// * `text` - Source-language text
    /// * `retries` - Calls allowed per provider; `0` makes no calls at all
    ///
    /// # Returns
    ///
    /// The first accepted translation. Empty input, zero retries and
    /// exhausted providers all give back the original text.
    #[instrument(level = "info", skip_all, fields(text = %truncate_for_log(text, 60)))]
    pub async fn translate(&self, text: &str, retries: usize) -> String {
        if text.is_empty() {
            return String::new();
        }
        if retries == 0 {
            debug!("Zero retries; keeping original text");
            return text.to_string();
        }

        for provider in &self.providers {
            let res = retry_with_backoff(provider.name(), retries, &self.backoff, |attempt| async move {
                debug!(provider = provider.name(), attempt, "Requesting translation");
                provider
                    .translate(text, &self.source, &self.target)
                    .await
                    .and_then(accept)
            })
            .await;

            match res {
                Ok(translated) => return translated,
                Err(e) => warn!(provider = provider.name(), error = %e, "Provider exhausted"),
            }
        }

        warn!("No translation available; keeping original text");
        text.to_string()
    }

    /// Translate titles one by one, pausing between calls.
    pub async fn translate_all(&self, titles: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(titles.len());
        for (i, title) in titles.iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                sleep(self.pause).await;
            }
            let translated = self.translate(title, self.retries).await;
            info!(index = i + 1, original = %title, translated = %translated, "Translated title");
            out.push(translated);
        }
        out
    }
}
