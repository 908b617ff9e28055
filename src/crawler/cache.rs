use std::fs;
use std::future::Future;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ScrapeError;
use crate::toc::TocItem;

/// On-disk form of a finished crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeCache {
    pub scraped_at: DateTime<Utc>,
    pub base_url: String,
    pub items: Vec<TocItem>,
}

impl ScrapeCache {
    pub fn new(base_url: impl Into<String>, items: Vec<TocItem>) -> Self {
        Self {
            scraped_at: Utc::now(),
            base_url: base_url.into(),
            items,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ScrapeError> {
        let contents = fs::read_to_string(path).map_err(|source| ScrapeError::CacheIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ScrapeError::CacheFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn store(&self, path: &Path) -> Result<(), ScrapeError> {
        let io_err = |source| ScrapeError::CacheIo {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let contents = serde_json::to_string(self).map_err(|source| ScrapeError::CacheFormat {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, contents).map_err(io_err)
    }
}

/// Returns the cached crawl if `path` exists, otherwise runs `scrape` and
/// writes its result. A cache that fails to load is an error, not a cue to
/// re-crawl.
pub async fn load_or_scrape<F, Fut>(
    path: &Path,
    base_url: &str,
    scrape: F,
) -> Result<ScrapeCache, ScrapeError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<TocItem>, ScrapeError>>,
{
    if path.exists() {
        return match ScrapeCache::load(path) {
            Ok(cache) => {
                tracing::info!(
                    "Data loaded from {} (scraped {})",
                    path.display(),
                    cache.scraped_at.to_rfc3339()
                );
                Ok(cache)
            }
            Err(err) => {
                tracing::error!("Error loading data from cache file: {}", err);
                Err(err)
            }
        };
    }

    let items = match scrape().await {
        Ok(items) => items,
        Err(err) => {
            tracing::error!("An error occurred while fetching data: {}", err);
            return Err(err);
        }
    };

    let cache = ScrapeCache::new(base_url, items);
    cache.store(path)?;
    tracing::info!("Data fetched and saved to {}", path.display());
    Ok(cache)
}
