//! Cover image downloads.
//!
//! A failed download never fails the article: [`AssetFetcher::fetch`] logs and
//! returns `None`.

use crate::error::Result;
use crate::retry::{Backoff, retry_with_backoff};
use crate::utils::{sanitize_file_name, truncate_for_log};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

pub const MAX_FILE_NAME_LEN: usize = 80;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
    attempts: usize,
    backoff: Backoff,
}

impl AssetFetcher {
    pub fn new(client: reqwest::Client, attempts: usize, backoff: Backoff) -> Self {
        Self {
            client,
            attempts,
            backoff,
        }
    }

    /// Build a dedicated client with a per-request timeout and user agent.
    pub fn with_timeout(
        timeout: Duration,
        user_agent: &str,
        attempts: usize,
        backoff: Backoff,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self::new(client, attempts, backoff))
    }

    /// Download `url` into `dest_dir/<sanitized name>`.
    #[instrument(level = "info", skip(self, dest_dir), fields(url = %truncate_for_log(url, 120)))]
    pub async fn fetch(&self, url: &str, dest_dir: &Path, name: &str) -> Option<PathBuf> {
        if let Err(e) = fs::create_dir_all(dest_dir).await {
            warn!(dir = %dest_dir.display(), error = %e, "Cannot create image directory");
            return None;
        }
        let dest = dest_dir.join(sanitize_file_name(name, MAX_FILE_NAME_LEN));

        let res = retry_with_backoff("image download", self.attempts, &self.backoff, |_| {
            self.download_once(url, &dest)
        })
        .await;

        match res {
            Ok(bytes) => {
                info!(path = %dest.display(), bytes, "Saved image");
                Some(dest)
            }
            Err(e) => {
                warn!(error = %e, "Image download failed; continuing without image");
                let _ = fs::remove_file(&dest).await;
                None
            }
        }
    }

    async fn download_once(&self, url: &str, dest: &Path) -> Result<u64> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let mut file = fs::File::create(dest).await?;
        let mut stream = resp.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

/// `article_<n>_cover.<ext>`, with the extension taken from the URL path when
/// it is a known image type.
pub fn cover_file_name(index: usize, image_url: &str) -> String {
    let path = image_url.split(['?', '#']).next().unwrap_or_default();
    let last_segment = path.rsplit('/').next().unwrap_or_default();
    let ext = last_segment
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "jpg".to_string());
    format!("article_{index}_cover.{ext}")
}
