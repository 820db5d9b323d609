use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub stripe: Stripe,
    pub app: App,
    pub session: Session,
    pub news_api: NewsApi,
    pub stage: Stage,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// Seconds
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone)]
pub struct App {
    /// Public origin of the web app, without a trailing slash.
    pub base_url: String,
}

impl App {
    pub fn checkout_success_url(&self) -> String {
        format!(
            "{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.base_url
        )
    }

    pub fn checkout_cancel_url(&self) -> String {
        format!("{}/payment/failure?error=payment_cancelled", self.base_url)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub jwt_secret: String,
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct NewsApi {
    pub api_key: String,
    pub base_url: String,
}
