//! Page scraping for the opinion section.
//!
//! - [`strategy`]: ordered fallback chains for a single field
//! - [`article`]: consent handling, article discovery and extraction
//!
//! Selectors themselves are data and live in [`crate::config::SiteConfig`].

pub mod article;
pub mod strategy;
