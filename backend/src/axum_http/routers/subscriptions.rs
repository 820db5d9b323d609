use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
        value_objects::{
            plans::PlanCatalog,
            subscriptions::{
                CreateCheckoutRequest, CreateCheckoutResponse, UserSubscriptionResponse,
                VerifyPaymentRequest, VerifyPaymentResponse,
            },
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{subscriptions::SubscriptionPostgres, users::UserPostgres},
    },
    payments::stripe_client::StripeClient,
};

use crate::{
    auth::AuthUser,
    axum_http::{error_responses::AppError, extractors::AppJson},
    usecases::{stripe_gateway::StripeGateway, subscriptions::SubscriptionUseCase},
};

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    stripe_client: Arc<StripeClient>,
    plan_catalog: Arc<PlanCatalog>,
) -> Router {
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let subscriptions_usecase = SubscriptionUseCase::new(
        Arc::new(user_repository),
        Arc::new(subscription_repository),
        stripe_client,
        plan_catalog,
    );

    router(Arc::new(subscriptions_usecase))
}

pub fn router<U, S, Stripe>(subscriptions_usecase: Arc<SubscriptionUseCase<U, S, Stripe>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/verify-payment", post(verify_payment))
        .route("/subscription", get(get_user_subscription))
        .route("/user-subscription", get(get_user_subscription))
        .with_state(subscriptions_usecase)
}

pub async fn create_checkout_session<U, S, Stripe>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<U, S, Stripe>>>,
    auth: AuthUser,
    AppJson(request): AppJson<CreateCheckoutRequest>,
) -> Result<Json<CreateCheckoutResponse>, AppError>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let response = subscriptions_usecase
        .create_checkout_session(&auth, request.plan_id.as_deref())
        .await?;

    Ok(Json(response))
}

pub async fn verify_payment<U, S, Stripe>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<U, S, Stripe>>>,
    auth: AuthUser,
    request: Result<AppJson<VerifyPaymentRequest>, AppError>,
) -> Result<Json<VerifyPaymentResponse>, AppError>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    // An unreadable body counts as a missing session id, after the caller is resolved.
    let session_id = request
        .ok()
        .and_then(|AppJson(request)| request.session_id);

    let response = subscriptions_usecase
        .verify_payment(&auth, session_id.as_deref())
        .await?;

    Ok(Json(response))
}

pub async fn get_user_subscription<U, S, Stripe>(
    State(subscriptions_usecase): State<Arc<SubscriptionUseCase<U, S, Stripe>>>,
    auth: AuthUser,
) -> Result<Json<UserSubscriptionResponse>, AppError>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let response = subscriptions_usecase.get_user_subscription(&auth).await?;

    Ok(Json(response))
}
