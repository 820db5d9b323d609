pub mod passwords;

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use cookie::{Cookie, SameSite};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use crate::axum_http::error_responses::AppError;

pub const SESSION_COOKIE: &str = "session_token";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub username: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
}

/// Issues and validates HS256 session tokens.
pub struct SessionTokens {
    secret: String,
    ttl_seconds: u64,
    secure_cookie: bool,
}

impl SessionTokens {
    pub fn new(secret: String, ttl_seconds: u64, secure_cookie: bool) -> Self {
        Self {
            secret,
            ttl_seconds,
            secure_cookie,
        }
    }

    pub fn issue(&self, user_id: Uuid, email: &str, username: &str) -> anyhow::Result<String> {
        let now = Utc::now().timestamp().max(0) as usize;
        let claims = SessionClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            username: username.to_string(),
            iat: now,
            exp: now + self.ttl_seconds as usize,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let validation = Validation::new(Algorithm::HS256);
        let token_data = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| anyhow::anyhow!("JWT validation failed: {}", e))?;

        Ok(token_data.claims)
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .max_age(cookie::time::Duration::seconds(self.ttl_seconds as i64))
            .build()
    }

    pub fn cleared_session_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .max_age(cookie::time::Duration::ZERO)
            .build()
    }
}

/// Bearer header first, then the session cookie.
fn session_token_from_parts(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    bearer.or_else(|| {
        CookieJar::from_headers(&parts.headers)
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session_tokens = parts
            .extensions
            .get::<Arc<SessionTokens>>()
            .cloned()
            .ok_or_else(|| {
                error!("auth: session tokens are not installed on the router");
                AppError::internal("Internal server error", None)
            })?;

        let token = session_token_from_parts(parts).ok_or_else(AppError::unauthorized)?;

        let claims = session_tokens.validate(&token).map_err(|err| {
            debug!(error = %err, "auth: rejected session token");
            AppError::unauthorized()
        })?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::unauthorized())?;

        Ok(AuthUser {
            user_id,
            email: claims.email,
            username: claims.username,
        })
    }
}
