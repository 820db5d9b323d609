use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    routing::post,
};
use axum_extra::extract::cookie::CookieJar;
use crates::{
    domain::{
        repositories::users::UserRepository,
        value_objects::users::{LoginRequest, LoginResponse, SignupRequest, UserDto},
    },
    infra::db::{postgres::postgres_connection::PgPoolSquad, repositories::users::UserPostgres},
};
use serde_json::{Value, json};

use crate::{
    auth::SessionTokens,
    axum_http::{error_responses::AppError, extractors::AppJson},
    usecases::users::UserUseCase,
};

pub fn routes(db_pool: Arc<PgPoolSquad>, session_tokens: Arc<SessionTokens>) -> Router {
    let user_repository = UserPostgres::new(db_pool);
    let users_usecase = UserUseCase::new(Arc::new(user_repository), session_tokens);

    router(Arc::new(users_usecase))
}

pub fn router<U>(users_usecase: Arc<UserUseCase<U>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/signout", post(signout))
        .with_state(users_usecase)
}

pub async fn signup<U>(
    State(users_usecase): State<Arc<UserUseCase<U>>>,
    AppJson(request): AppJson<SignupRequest>,
) -> Result<(StatusCode, Json<UserDto>), AppError>
where
    U: UserRepository + Send + Sync + 'static,
{
    let user = users_usecase.signup(request).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login<U>(
    State(users_usecase): State<Arc<UserUseCase<U>>>,
    Extension(session_tokens): Extension<Arc<SessionTokens>>,
    jar: CookieJar,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError>
where
    U: UserRepository + Send + Sync + 'static,
{
    let response = users_usecase.login(request).await?;
    let jar = jar.add(session_tokens.session_cookie(response.token.clone()));

    Ok((jar, Json(response)))
}

pub async fn signout(
    Extension(session_tokens): Extension<Arc<SessionTokens>>,
    jar: CookieJar,
) -> (CookieJar, Json<Value>) {
    (
        jar.add(session_tokens.cleared_session_cookie()),
        Json(json!({ "success": true })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{SESSION_COOKIE, passwords::hash_password},
        axum_http::routers::test_support::{read_json, with_session_tokens},
    };
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use chrono::Utc;
    use crates::domain::{entities::users::UserEntity, repositories::users::MockUserRepository};
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app(user_repo: MockUserRepository) -> Router {
        let usecase = UserUseCase::new(
            Arc::new(user_repo),
            crate::axum_http::routers::test_support::session_tokens(),
        );
        with_session_tokens(router(Arc::new(usecase)))
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn signup_returns_created_without_the_hash() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_email_or_username()
            .returning(|_, _| Ok(None));
        user_repo.expect_register().times(1).returning(|entity| {
            let now = Utc::now();
            Ok(UserEntity {
                id: Uuid::new_v4(),
                username: entity.username,
                email: entity.email,
                password_hash: entity.password_hash,
                created_at: now,
                updated_at: now,
            })
        });

        let response = app(user_repo)
            .oneshot(json_post(
                "/auth/signup",
                json!({ "username": "reader", "email": "reader@example.com", "password": "secret1" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["email"], "reader@example.com");
        assert!(body.get("passwordHash").is_none());
        assert!(body.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn login_sets_the_session_cookie() {
        let now = Utc::now();
        let user = UserEntity {
            id: Uuid::new_v4(),
            username: "reader".to_string(),
            email: "reader@example.com".to_string(),
            password_hash: Some(hash_password("secret1").unwrap()),
            created_at: now,
            updated_at: now,
        };
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));

        let response = app(user_repo)
            .oneshot(json_post(
                "/auth/login",
                json!({ "email": "reader@example.com", "password": "secret1" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with(&format!("{}=", SESSION_COOKIE)));
        assert!(cookie.contains("HttpOnly"));
        assert!(read_json(response).await["token"].is_string());
    }

    #[tokio::test]
    async fn login_with_bad_credentials_is_unauthorized() {
        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_email().returning(|_| Ok(None));

        let response = app(user_repo)
            .oneshot(json_post(
                "/auth/login",
                json!({ "email": "ghost@example.com", "password": "secret1" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn signout_clears_the_cookie() {
        let response = app(MockUserRepository::new())
            .oneshot(json_post("/auth/signout", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with(&format!("{}=", SESSION_COOKIE)));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn malformed_auth_bodies_are_json_bad_requests() {
        let mut user_repo = MockUserRepository::new();
        user_repo.expect_find_by_email().never();
        user_repo.expect_find_by_email_or_username().never();
        user_repo.expect_register().never();
        let app = app(user_repo);

        for uri in ["/auth/signup", "/auth/login"] {
            let response = app
                .clone()
                .oneshot(json_post(uri, json!({ "email": 42 })))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = read_json(response).await;
            assert_eq!(body["code"], 400);
            assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
        }
    }
}
