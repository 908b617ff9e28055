//! Hierarchical scraper for the archive's table of contents.
//!
//! The crawl runs in two steps so the parsed DOM is never held across an
//! `.await`:
//! - `html`: synchronous parsing of the TOC outline and of detail pages
//! - `client`: sequential, rate-limited fetching that resolves the outline
//!   into a [`TocItem`](crate::toc::TocItem) tree
//!
//! `cache` wraps a crawl in a load-or-compute JSON file.

pub mod cache;
mod client;
pub mod html;

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::core::config::{AppPaths, ScraperSettings};

pub use cache::{load_or_scrape, ScrapeCache};
pub use client::CatechismScraper;
pub use html::TocEntry;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to retrieve data from URL {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no table of contents list found at {0}")]
    MissingToc(String),

    #[error("cache file {}: {source}", path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file {} is not valid: {source}", path.display())]
    CacheFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything a crawl needs, constructed up front and handed to the scraper.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: Url,
    pub toc_path: String,
    pub max_depth: usize,
    pub request_interval: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ScraperConfig {
    pub fn from_settings(settings: &ScraperSettings) -> Result<Self, ScrapeError> {
        Ok(Self {
            base_url: parse_base_url(&settings.base_url)?,
            toc_path: settings.toc_path.clone(),
            max_depth: settings.max_depth,
            request_interval: Duration::from_millis(settings.request_interval_ms),
            timeout: Duration::from_secs(settings.timeout_secs),
            user_agent: settings.user_agent.clone(),
        })
    }

    /// Resolves a TOC-relative link the way a browser would.
    pub fn resolve(&self, link: &str) -> Result<Url, ScrapeError> {
        self.base_url
            .join(link)
            .map_err(|err| ScrapeError::InvalidUrl {
                url: link.to_string(),
                reason: err.to_string(),
            })
    }

    pub fn toc_url(&self) -> Result<Url, ScrapeError> {
        self.resolve(&self.toc_path)
    }
}

/// Loads the configured cache file, crawling and writing it first if absent.
pub async fn cached_items(
    paths: &AppPaths,
    settings: &ScraperSettings,
) -> Result<ScrapeCache, ScrapeError> {
    let config = ScraperConfig::from_settings(settings)?;
    let base_url = config.base_url.to_string();
    let scraper = CatechismScraper::new(config)?;
    let cache_path = paths.resolve_data_path(&settings.cache_file);

    load_or_scrape(&cache_path, &base_url, || scraper.scrape()).await
}

/// Relative links resolve against the base only if it ends in `/`.
fn parse_base_url(raw: &str) -> Result<Url, ScrapeError> {
    let mut url = Url::parse(raw).map_err(|err| ScrapeError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
