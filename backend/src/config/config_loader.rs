use anyhow::{Context, Result};
use url::Url;

use super::{
    config_model::{App, BackendServer, Database, DotEnvyConfig, NewsApi, Session, Stripe},
    stage::Stage,
};

pub const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_NEWS_API_BASE_URL: &str = "https://newsapi.org";
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 86_400;
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from any key lookup; `load` feeds it the process environment.
pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |key: &str| -> Result<String> {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .with_context(|| format!("{} is invalid", key))
    };
    let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: match optional("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse().context("DATABASE_MAX_CONNECTIONS is invalid")?,
            None => DEFAULT_DATABASE_MAX_CONNECTIONS,
        },
    };

    let stripe = Stripe {
        secret_key: required("STRIPE_SECRET_KEY")?,
        webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
    };

    let app = App {
        base_url: validate_base_url(
            &optional("APP_BASE_URL").unwrap_or_else(|| DEFAULT_APP_BASE_URL.to_string()),
        )
        .context("APP_BASE_URL is invalid")?,
    };

    let session = Session {
        jwt_secret: required("JWT_SESSION_SECRET")?,
        ttl_seconds: match optional("JWT_SESSION_TTL_SECONDS") {
            Some(raw) => raw.parse().context("JWT_SESSION_TTL_SECONDS is invalid")?,
            None => DEFAULT_SESSION_TTL_SECONDS,
        },
    };

    let news_api = NewsApi {
        api_key: required("NEWS_API_KEY")?,
        base_url: validate_base_url(
            &optional("NEWS_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_NEWS_API_BASE_URL.to_string()),
        )
        .context("NEWS_API_BASE_URL is invalid")?,
    };

    let stage = optional("STAGE")
        .map(|raw| Stage::try_from(&raw))
        .transpose()?
        .unwrap_or_default();

    Ok(DotEnvyConfig {
        backend_server,
        database,
        stripe,
        app,
        session,
        news_api,
        stage,
    })
}

/// Accepts absolute http(s) URLs and returns them without a trailing slash.
pub fn validate_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).with_context(|| format!("not a valid URL: {}", trimmed))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("base URL must use http or https: {}", trimmed);
    }
    if parsed.host_str().is_none() {
        anyhow::bail!("base URL has no host: {}", trimmed);
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}
