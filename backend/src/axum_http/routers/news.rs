use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use crates::{
    domain::value_objects::news::{DashboardNewsDto, NewsQuery},
    news::news_client::NewsApiClient,
};

use crate::{
    auth::AuthUser,
    usecases::news::{NewsGateway, NewsUseCase},
};

pub fn routes(news_client: Arc<NewsApiClient>) -> Router {
    router(Arc::new(NewsUseCase::new(news_client)))
}

pub fn router<N>(news_usecase: Arc<NewsUseCase<N>>) -> Router
where
    N: NewsGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/news", get(dashboard_news))
        .with_state(news_usecase)
}

pub async fn dashboard_news<N>(
    State(news_usecase): State<Arc<NewsUseCase<N>>>,
    _auth: AuthUser,
    Query(query): Query<NewsQuery>,
) -> Json<DashboardNewsDto>
where
    N: NewsGateway + Send + Sync + 'static,
{
    Json(news_usecase.dashboard_news(query).await)
}
