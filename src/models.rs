//! Data models shared by the scraping sessions and the final report.
//!
//! - [`Capability`]: one browsing environment a session runs in
//! - [`ArticleRecord`]: one scraped article, title translated in place
//! - [`SessionResult`]: what a finished session hands back to the orchestrator
//! - [`ConsolidatedReport`]: every session plus the global word table

use crate::analyzer::FrequencyReport;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One target browsing environment.
///
/// `webdriver` holds the raw W3C capabilities sent when the session is
/// created; the other fields are for this program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Human-readable session name, e.g. `"Galaxy S23 Chrome"`.
    pub label: String,
    /// Whether to push the pass/fail verdict to the remote dashboard.
    #[serde(default)]
    pub report_status: bool,
    #[serde(default)]
    pub webdriver: Map<String, Value>,
}

impl Capability {
    /// A capability with no WebDriver settings, for backends that ignore them.
    pub fn named(label: &str) -> Self {
        Self {
            label: label.to_string(),
            report_status: false,
            webdriver: Map::new(),
        }
    }
}

/// A single scraped article.
///
/// `source_url` always carries a `YYYY-MM-DD` path segment; listing pages are
/// never recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    /// Filled in once by the translator; the original title when translation failed.
    pub title_translated: Option<String>,
    /// Body text capped at a fixed length, or a placeholder when none was found.
    pub body: String,
    /// Remote cover image, when the page advertised one.
    pub image_url: Option<String>,
    /// Local path of the downloaded cover image.
    pub image_path: Option<String>,
    pub source_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Passed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Passed => "passed",
            SessionStatus::Failed => "failed",
        }
    }
}

/// Outcome of one session. Created once, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    /// 1-based position in the capability list.
    pub id: usize,
    pub capability: Capability,
    pub status: SessionStatus,
    pub articles: Vec<ArticleRecord>,
    /// Words repeated within this session's titles alone.
    pub repeated_words: FrequencyReport,
    pub error: Option<String>,
    pub elapsed_ms: u128,
}

impl SessionResult {
    pub fn passed(
        id: usize,
        capability: Capability,
        articles: Vec<ArticleRecord>,
        repeated_words: FrequencyReport,
        elapsed_ms: u128,
    ) -> Self {
        Self {
            id,
            capability,
            status: SessionStatus::Passed,
            articles,
            repeated_words,
            error: None,
            elapsed_ms,
        }
    }

    /// A failed session carries no articles, whatever it managed before failing.
    pub fn failed(id: usize, capability: Capability, error: String, elapsed_ms: u128) -> Self {
        Self {
            id,
            capability,
            status: SessionStatus::Failed,
            articles: Vec::new(),
            repeated_words: FrequencyReport::default(),
            error: Some(error),
            elapsed_ms,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == SessionStatus::Passed
    }
}

/// The externally visible artifact of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    /// RFC 3339 timestamp of when the report was assembled.
    pub generated_at: String,
    /// Sessions in launch order.
    pub sessions: Vec<SessionResult>,
    /// Word counts over every passed session's translated titles.
    pub frequency: FrequencyReport,
}

impl ConsolidatedReport {
    pub fn passed_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.sessions.len() - self.passed_count()
    }

    /// True when there was at least one session and none of them passed.
    pub fn all_failed(&self) -> bool {
        !self.sessions.is_empty() && self.passed_count() == 0
    }
}

/// Translated titles of passed sessions, in the order given, then article order.
pub fn translated_titles<'a>(sessions: impl IntoIterator<Item = &'a SessionResult>) -> Vec<String> {
    sessions
        .into_iter()
        .filter(|s| s.is_passed())
        .flat_map(|s| s.articles.iter())
        .filter_map(|a| a.title_translated.clone())
        .collect()
}
