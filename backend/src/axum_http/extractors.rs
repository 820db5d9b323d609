use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use serde::de::DeserializeOwned;
use tracing::warn;

use super::error_responses::AppError;

/// `Json<T>` whose rejection is a 400 `ErrorResponse` instead of axum's plain-text 415/422.
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(status = rejection.status().as_u16(), reason = %rejection.body_text(), "http: rejected request body");
        AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}
