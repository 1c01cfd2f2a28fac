//! Error type shared by the browsing, translation and download layers.
//!
//! Most failures in this crate never reach the user as errors: fields degrade
//! to absent, articles are skipped, sessions are marked failed. This type is
//! what those layers return internally before the caller decides how far a
//! failure is allowed to climb.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A WebDriver command failed (stale element, protocol error, lost session).
    #[error("browser command failed: {0}")]
    Browser(String),

    /// The remote or local WebDriver refused to open a session.
    #[error("could not open browser session: {0}")]
    Session(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// The provider answered, but with nothing usable.
    #[error("provider returned no usable translation: {0}")]
    Rejected(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;
