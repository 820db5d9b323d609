use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::{
    domain::value_objects::news::{DashboardNewsDto, NewsPage, NewsQuery},
    news::news_client::NewsApiClient,
};
use tracing::{info, warn};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsGateway: Send + Sync {
    async fn fetch_indian_news(&self, page: u32) -> AnyResult<NewsPage>;

    async fn fetch_world_news(&self, page: u32) -> AnyResult<NewsPage>;
}

#[async_trait]
impl NewsGateway for NewsApiClient {
    async fn fetch_indian_news(&self, page: u32) -> AnyResult<NewsPage> {
        self.fetch_indian_news(page).await
    }

    async fn fetch_world_news(&self, page: u32) -> AnyResult<NewsPage> {
        self.fetch_world_news(page).await
    }
}

pub struct NewsUseCase<N>
where
    N: NewsGateway + Send + Sync + 'static,
{
    news_client: Arc<N>,
}

impl<N> NewsUseCase<N>
where
    N: NewsGateway + Send + Sync + 'static,
{
    pub fn new(news_client: Arc<N>) -> Self {
        Self { news_client }
    }

    /// Both sections are fetched concurrently. A failing section comes back empty.
    pub async fn dashboard_news(&self, query: NewsQuery) -> DashboardNewsDto {
        let page = query.page_or_first();

        let (indian, world) = tokio::join!(
            self.news_client.fetch_indian_news(page),
            self.news_client.fetch_world_news(page),
        );

        let indian = indian.unwrap_or_else(|err| {
            warn!(page, error = ?err, "news: indian news unavailable");
            NewsPage::default()
        });
        let world = world.unwrap_or_else(|err| {
            warn!(page, error = ?err, "news: world news unavailable");
            NewsPage::default()
        });

        info!(
            page,
            indian = indian.articles.len(),
            world = world.articles.len(),
            "news: dashboard page assembled"
        );

        DashboardNewsDto {
            page,
            indian,
            world,
        }
    }
}
