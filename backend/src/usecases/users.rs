use std::sync::{Arc, LazyLock};

use crates::domain::{
    entities::users::RegisterUserEntity,
    repositories::users::UserRepository,
    value_objects::users::{LoginRequest, LoginResponse, SignupRequest, UserDto},
};
use regex::Regex;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    auth::{
        SessionTokens,
        passwords::{hash_password, verify_password},
    },
    axum_http::error_responses::AppError,
};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";
pub const MIN_PASSWORD_LENGTH: usize = 6;

static EMAIL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(EMAIL_PATTERN).ok());

#[derive(Debug, Error)]
pub enum UserError {
    #[error("All fields are required")]
    MissingFields,
    #[error("Invalid email format")]
    InvalidEmail,
    #[error("Password must be at least 6 characters long")]
    WeakPassword,
    #[error("User with email or username already exists")]
    AlreadyExists,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Something went wrong")]
    Internal(#[from] anyhow::Error),
}

impl UserError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            UserError::MissingFields | UserError::InvalidEmail | UserError::WeakPassword => {
                StatusCode::BAD_REQUEST
            }
            UserError::AlreadyExists => StatusCode::CONFLICT,
            UserError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            UserError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        let message = err.to_string();
        match err {
            UserError::MissingFields | UserError::InvalidEmail | UserError::WeakPassword => {
                AppError::BadRequest(message)
            }
            UserError::AlreadyExists => AppError::Conflict(message),
            UserError::InvalidCredentials => AppError::Unauthorized(message),
            UserError::Internal(_) => AppError::internal(message, None),
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(email))
}

pub struct UserUseCase<U>
where
    U: UserRepository + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    session_tokens: Arc<SessionTokens>,
}

impl<U> UserUseCase<U>
where
    U: UserRepository + Send + Sync + 'static,
{
    pub fn new(user_repo: Arc<U>, session_tokens: Arc<SessionTokens>) -> Self {
        Self {
            user_repo,
            session_tokens,
        }
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<UserDto, UserError> {
        let username = request.username.trim().to_lowercase();
        let email = request.email.trim().to_lowercase();
        let password = request.password;

        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(UserError::MissingFields);
        }
        if !is_valid_email(&email) {
            return Err(UserError::InvalidEmail);
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(UserError::WeakPassword);
        }

        let existing = self
            .user_repo
            .find_by_email_or_username(&email, &username)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "users: failed to look up existing user");
                UserError::Internal(err)
            })?;
        if existing.is_some() {
            warn!(username = %username, "users: signup for an existing email or username");
            return Err(UserError::AlreadyExists);
        }

        let password_hash = hash_password(&password)?;
        let user = self
            .user_repo
            .register(RegisterUserEntity {
                username,
                email,
                password_hash: Some(password_hash),
            })
            .await
            .map_err(|err| {
                error!(db_error = ?err, "users: failed to register user");
                UserError::Internal(err)
            })?;

        info!(user_id = %user.id, "users: user registered");
        Ok(UserDto::from(user))
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, UserError> {
        let email = request.email.trim().to_lowercase();
        if email.is_empty() || request.password.is_empty() {
            return Err(UserError::MissingFields);
        }

        let user = self
            .user_repo
            .find_by_email(&email)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "users: failed to load user for login");
                UserError::Internal(err)
            })?
            .ok_or(UserError::InvalidCredentials)?;

        let password_hash = user
            .password_hash
            .as_deref()
            .ok_or(UserError::InvalidCredentials)?;
        verify_password(&request.password, password_hash).map_err(|_| {
            warn!(user_id = %user.id, "users: password mismatch");
            UserError::InvalidCredentials
        })?;

        let token = self
            .session_tokens
            .issue(user.id, &user.email, &user.username)?;

        info!(user_id = %user.id, "users: session issued");
        Ok(LoginResponse { token })
    }
}
