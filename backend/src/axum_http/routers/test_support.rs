use std::sync::Arc;

use axum::{Extension, Router, body::Body, response::Response};
use http_body_util::BodyExt;
use uuid::Uuid;

use crate::auth::SessionTokens;

pub const TEST_SECRET: &str = "supersecretjwtsecretforunittesting123";

pub fn session_tokens() -> Arc<SessionTokens> {
    Arc::new(SessionTokens::new(TEST_SECRET.to_string(), 3600, false))
}

pub fn with_session_tokens(router: Router) -> Router {
    router.layer(Extension(session_tokens()))
}

pub fn bearer_for(user_id: Uuid, email: &str) -> String {
    let token = session_tokens().issue(user_id, email, "reader").unwrap();
    format!("Bearer {}", token)
}

pub async fn read_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
