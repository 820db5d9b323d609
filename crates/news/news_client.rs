use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::domain::value_objects::news::{NEWS_PAGE_SIZE, NewsArticle, NewsPage};

pub const NEWS_API_BASE: &str = "https://newsapi.org";

/// Read-only client for the NewsAPI `everything` and `top-headlines` endpoints.
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiResponse {
    #[serde(default)]
    articles: Option<Vec<NewsArticle>>,
    #[serde(default)]
    total_results: Option<u64>,
}

impl From<NewsApiResponse> for NewsPage {
    fn from(value: NewsApiResponse) -> Self {
        Self {
            articles: value.articles.unwrap_or_default(),
            total_results: value.total_results.unwrap_or(0),
        }
    }
}

impl NewsApiClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build news http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Latest English articles mentioning India, newest first.
    pub async fn fetch_indian_news(&self, page: u32) -> Result<NewsPage> {
        self.fetch(
            "v2/everything",
            &[("q", "india"), ("language", "en"), ("sortBy", "publishedAt")],
            page,
        )
        .await
    }

    /// English top headlines from every country.
    pub async fn fetch_world_news(&self, page: u32) -> Result<NewsPage> {
        self.fetch("v2/top-headlines", &[("language", "en")], page)
            .await
    }

    async fn fetch(&self, path: &str, filters: &[(&str, &str)], page: u32) -> Result<NewsPage> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let page = page.max(1).to_string();
        let page_size = NEWS_PAGE_SIZE.to_string();

        let resp = self
            .http
            .get(&url)
            .query(filters)
            .query(&[
                ("pageSize", page_size.as_str()),
                ("page", page.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("news request failed: {}", path))?
            .error_for_status()
            .with_context(|| format!("news api returned an error: {}", path))?;

        let parsed: NewsApiResponse = resp
            .json()
            .await
            .with_context(|| format!("unexpected news api response: {}", path))?;
        let page: NewsPage = parsed.into();

        debug!(
            path = %path,
            articles = page.articles.len(),
            total_results = page.total_results,
            "news: fetched page"
        );

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_become_an_empty_page() {
        let parsed: NewsApiResponse = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert_eq!(NewsPage::from(parsed), NewsPage::default());
    }

    #[test]
    fn parses_articles_and_total() {
        let parsed: NewsApiResponse = serde_json::from_str(
            r#"{
                "status": "ok",
                "totalResults": 42,
                "articles": [{
                    "source": { "id": null, "name": "The Hindu" },
                    "author": null,
                    "title": "Monsoon arrives early",
                    "description": "Rain in Kerala",
                    "url": "https://example.com/monsoon",
                    "urlToImage": null,
                    "publishedAt": "2024-11-20T08:00:00Z",
                    "content": null
                }]
            }"#,
        )
        .unwrap();

        let page = NewsPage::from(parsed);
        assert_eq!(page.total_results, 42);
        assert_eq!(page.articles.len(), 1);
        assert_eq!(page.articles[0].source.name.as_deref(), Some("The Hindu"));
        assert_eq!(page.articles[0].url_to_image, None);
    }
}
