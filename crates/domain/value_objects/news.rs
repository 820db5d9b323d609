use serde::{Deserialize, Serialize};

pub const NEWS_PAGE_SIZE: u32 = 7;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewsSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    #[serde(default)]
    pub source: NewsSource,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewsPage {
    #[serde(default)]
    pub articles: Vec<NewsArticle>,
    #[serde(default)]
    pub total_results: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardNewsDto {
    pub page: u32,
    pub indian: NewsPage,
    pub world: NewsPage,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NewsQuery {
    pub page: Option<u32>,
}

impl NewsQuery {
    /// Pages are 1-based; anything below 1 is treated as the first page.
    pub fn page_or_first(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }
}
