//! One end-to-end session: scrape, download covers, translate, analyze.

use crate::analyzer::{FrequencyReport, WordFrequencyAnalyzer};
use crate::browser::Browser;
use crate::config::RunConfig;
use crate::error::Result;
use crate::fetch::{AssetFetcher, cover_file_name};
use crate::models::ArticleRecord;
use crate::scrapers::article::ArticleExtractor;
use crate::translator::Translator;
use crate::utils::slugify;
use rand::{Rng, rng};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument};

/// What a session produces before the orchestrator wraps it up.
#[derive(Debug, Clone)]
pub struct SessionOutput {
    pub articles: Vec<ArticleRecord>,
    pub repeated_words: FrequencyReport,
}

/// Everything one session does once it holds a browser: open the section,
/// discover and extract articles, download covers, translate titles and count
/// words.
///
/// Built once and shared by every session; per-session state lives on the
/// stack of [`SessionPipeline::run`].
pub struct SessionPipeline {
    config: Arc<RunConfig>,
    translator: Arc<Translator>,
    fetcher: Arc<AssetFetcher>,
    analyzer: WordFrequencyAnalyzer,
}

impl SessionPipeline {
    pub fn new(config: Arc<RunConfig>, translator: Arc<Translator>, fetcher: Arc<AssetFetcher>) -> Self {
        let analyzer = WordFrequencyAnalyzer::new(config.threshold);
        Self {
            config,
            translator,
            fetcher,
            analyzer,
        }
    }

    pub fn analyzer(&self) -> WordFrequencyAnalyzer {
        self.analyzer
    }

    /// Run the whole session on `browser`.
    ///
    /// Only a section page that will not load is an error; individual
    /// articles, images and translations degrade on their own.
    ///
    /// # Arguments
    ///
    /// * `browser` - An open browser owned by the caller, who also closes it
    /// * `session_id` - 1-based id, used in the session's images folder
    /// * `label` - Capability label, used in logs and the folder slug
    ///
    /// # Returns
    ///
    /// The extracted articles with translated titles and this session's
    /// repeated words.
    #[instrument(level = "info", skip(self, browser))]
    pub async fn run<B: Browser + ?Sized>(
        &self,
        browser: &B,
        session_id: usize,
        label: &str,
    ) -> Result<SessionOutput> {
        let config = &self.config;
        let extractor = ArticleExtractor::new(browser, &config.site, &config.timeouts);

        extractor.open_section().await?;
        let urls = extractor.discover_article_urls(config.article_count).await;
        info!(count = urls.len(), "Scraping articles");

        let images_dir = self.images_dir(session_id, label);
        let mut articles = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            if i > 0 {
                self.polite_pause().await;
            }
            let Some(mut article) = extractor.extract_article(url).await else {
                continue;
            };
            if let Some(image_url) = article.image_url.as_deref() {
                let name = cover_file_name(i + 1, image_url);
                article.image_path = self
                    .fetcher
                    .fetch(image_url, &images_dir, &name)
                    .await
                    .map(|p| p.display().to_string());
            }
            articles.push(article);
        }

        let titles: Vec<String> = articles.iter().map(|a| a.title.clone()).collect();
        let translated = self.translator.translate_all(&titles).await;
        for (article, title) in articles.iter_mut().zip(translated) {
            article.title_translated = Some(title);
        }

        let session_titles: Vec<&str> = articles
            .iter()
            .filter_map(|a| a.title_translated.as_deref())
            .collect();
        let repeated_words = self.analyzer.analyze(&session_titles);
        info!(
            articles = articles.len(),
            repeated = ?repeated_words.words,
            "Session pipeline finished"
        );

        Ok(SessionOutput {
            articles,
            repeated_words,
        })
    }

    /// `<images_dir>/<id>-<slug>`. The id keeps sessions with look-alike
    /// labels out of each other's folders.
    fn images_dir(&self, session_id: usize, label: &str) -> PathBuf {
        let slug = slugify(label);
        let folder = if slug.is_empty() {
            session_id.to_string()
        } else {
            format!("{session_id}-{slug}")
        };
        self.config.images_dir.join(folder)
    }

    async fn polite_pause(&self) {
        let politeness = &self.config.politeness;
        let min = politeness.article_delay_min.as_millis() as u64;
        let max = politeness.article_delay_max.as_millis() as u64;
        let ms = if max > min {
            rng().random_range(min..=max)
        } else {
            min
        };
        if ms > 0 {
            sleep(Duration::from_millis(ms)).await;
        }
    }
}
