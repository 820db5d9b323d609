use anyhow::Result;
use crates::{
    infra::db::postgres::postgres_connection, news::news_client::NewsApiClient,
    payments::stripe_client::StripeClient,
};
use newsdash::{auth::SessionTokens, axum_http::http_serve, config::config_loader};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {:#}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("backend")?;

    let dotenvy_env = config_loader::load()?;
    info!(stage = %dotenvy_env.stage, "ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let stripe_client = StripeClient::new(
        dotenvy_env.stripe.secret_key.clone(),
        dotenvy_env.stripe.webhook_secret.clone(),
        dotenvy_env.app.checkout_success_url(),
        dotenvy_env.app.checkout_cancel_url(),
    )?;

    let news_client = NewsApiClient::new(
        dotenvy_env.news_api.base_url.clone(),
        dotenvy_env.news_api.api_key.clone(),
    )?;

    let session_tokens = SessionTokens::new(
        dotenvy_env.session.jwt_secret.clone(),
        dotenvy_env.session.ttl_seconds,
        dotenvy_env.stage.is_production(),
    );

    http_serve::start(
        Arc::new(dotenvy_env),
        Arc::new(postgres_pool),
        Arc::new(stripe_client),
        Arc::new(news_client),
        Arc::new(session_tokens),
    )
    .await?;

    Ok(())
}
