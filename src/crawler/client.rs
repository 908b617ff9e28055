use futures_util::future::BoxFuture;
use reqwest::{Client, Url};

use super::html::{extract_paragraph_text, parse_toc, TocEntry};
use super::{ScrapeError, ScraperConfig};
use crate::toc::TocItem;

/// Sequential crawler: one request in flight, document order, fixed pause
/// before every detail page.
pub struct CatechismScraper {
    config: ScraperConfig,
    client: Client,
}

impl CatechismScraper {
    pub fn new(config: ScraperConfig) -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(ScrapeError::Client)?;
        Ok(Self { config, client })
    }

    /// Fetches the TOC and every linked page. The first failed request
    /// aborts the whole crawl.
    pub async fn scrape(&self) -> Result<Vec<TocItem>, ScrapeError> {
        let toc_url = self.config.toc_url()?;
        tracing::info!("Extracting table of contents from {}", toc_url);

        let toc_html = self.fetch(&toc_url).await?;
        let outline = parse_toc(&toc_html, self.config.max_depth)
            .map_err(|_| ScrapeError::MissingToc(toc_url.to_string()))?;
        let total_links: usize = outline.iter().map(TocEntry::link_count).sum();
        tracing::info!(
            "Found {} top-level entries ({} linked pages)",
            outline.len(),
            total_links
        );

        let mut items = Vec::with_capacity(outline.len());
        for entry in outline {
            let item = self.resolve_entry(entry).await?;
            tracing::info!("Finished extracting data for: {}", item.name);
            items.push(item);
        }
        Ok(items)
    }

    fn resolve_entry(&self, entry: TocEntry) -> BoxFuture<'_, Result<TocItem, ScrapeError>> {
        Box::pin(async move {
            let text = match entry.link.as_deref() {
                Some(link) => Some(self.fetch_page_text(link).await?),
                None => None,
            };

            let mut children = Vec::with_capacity(entry.children.len());
            for child in entry.children {
                children.push(self.resolve_entry(child).await?);
            }

            Ok(TocItem {
                name: entry.name,
                link: entry.link,
                text,
                children,
            })
        })
    }

    async fn fetch_page_text(&self, link: &str) -> Result<String, ScrapeError> {
        let url = self.config.resolve(link)?;
        tokio::time::sleep(self.config.request_interval).await;
        let html = self.fetch(&url).await?;
        tracing::debug!("Extracted {} bytes of HTML from {}", html.len(), url);
        Ok(extract_paragraph_text(&html))
    }

    async fn fetch(&self, url: &Url) -> Result<String, ScrapeError> {
        let result: Result<String, reqwest::Error> = async {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await?
                .error_for_status()?;
            response.text().await
        }
        .await;

        result.map_err(|source| {
            tracing::error!("Failed to retrieve data from URL: {} Error: {}", url, source);
            ScrapeError::Fetch {
                url: url.to_string(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::response::Html;
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    use super::*;

    type Hits = Arc<Mutex<Vec<String>>>;

    const TOC: &str = r#"<html><body><ul>
        <li><a href="P1.HTM">PROLOGUE</a></li>
        <li><a href="P2.HTM">PART ONE</a>
          <ul>
            <li><a href="P3.HTM">SECTION ONE</a>
              <ul><li><a href="P4.HTM">CHAPTER ONE</a></li></ul>
            </li>
            <li>SECTION TWO</li>
          </ul>
        </li>
    </ul></body></html>"#;

    async fn page(State(hits): State<Hits>, Path(name): Path<String>) -> (StatusCode, Html<String>) {
        hits.lock().unwrap().push(name.clone());
        let body = match name.as_str() {
            "_INDEX.HTM" => TOC.to_string(),
            "MISSING.HTM" => return (StatusCode::NOT_FOUND, Html(String::new())),
            other => format!("<p>Text of {}<sup>3</sup></p><p>Second line</p>", other),
        };
        (StatusCode::OK, Html(body))
    }

    async fn serve(hits: Hits) -> Url {
        let app = Router::new()
            .route("/archive/:name", get(page))
            .with_state(hits);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{}/archive/", addr)).unwrap()
    }

    fn config(base_url: Url, max_depth: usize) -> ScraperConfig {
        ScraperConfig {
            base_url,
            toc_path: "_INDEX.HTM".to_string(),
            max_depth,
            request_interval: Duration::from_millis(0),
            timeout: Duration::from_secs(5),
            user_agent: "catechism-rag-test".to_string(),
        }
    }

    #[tokio::test]
    async fn scrapes_tree_in_document_order() {
        let hits = Hits::default();
        let base = serve(hits.clone()).await;
        let scraper = CatechismScraper::new(config(base, 4)).unwrap();

        let items = scraper.scrape().await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "PROLOGUE");
        assert_eq!(
            items[0].text.as_deref(),
            Some("Text of P1.HTM\nSecond line")
        );
        let section_two = &items[1].children[1];
        assert_eq!(section_two.name, "SECTION TWO");
        assert_eq!(section_two.text, None);
        assert_eq!(items[1].children[0].children[0].name, "CHAPTER ONE");

        let order = hits.lock().unwrap().clone();
        assert_eq!(
            order,
            vec!["_INDEX.HTM", "P1.HTM", "P2.HTM", "P3.HTM", "P4.HTM"]
        );
    }

    #[tokio::test]
    async fn depth_cap_skips_deeper_pages() {
        let hits = Hits::default();
        let base = serve(hits.clone()).await;
        let scraper = CatechismScraper::new(config(base, 2)).unwrap();

        let items = scraper.scrape().await.unwrap();

        assert!(items[1].children[0].children.is_empty());
        assert!(!hits.lock().unwrap().contains(&"P4.HTM".to_string()));
    }

    #[tokio::test]
    async fn failed_fetch_aborts_scrape() {
        let hits = Hits::default();
        let base = serve(hits.clone()).await;
        let mut cfg = config(base, 4);
        cfg.toc_path = "MISSING.HTM".to_string();
        let scraper = CatechismScraper::new(cfg).unwrap();

        let err = scraper.scrape().await.unwrap_err();

        match err {
            ScrapeError::Fetch { url, source } => {
                assert!(url.ends_with("/archive/MISSING.HTM"));
                assert_eq!(source.status(), Some(reqwest::StatusCode::NOT_FOUND));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn broken_detail_link_aborts_without_partial_result() {
        let hits = Hits::default();
        let base = serve(hits.clone()).await;
        let scraper = CatechismScraper::new(config(base, 4)).unwrap();

        let err = scraper
            .resolve_entry(TocEntry {
                name: "broken".to_string(),
                link: Some("MISSING.HTM".to_string()),
                children: vec![TocEntry {
                    name: "never fetched".to_string(),
                    link: Some("P9.HTM".to_string()),
                    children: vec![],
                }],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ScrapeError::Fetch { .. }));
        assert!(!hits.lock().unwrap().contains(&"P9.HTM".to_string()));
    }
}
