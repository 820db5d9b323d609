use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use crates::{
    domain::{
        repositories::subscriptions::SubscriptionRepository,
        value_objects::subscriptions::WebhookAck,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::subscriptions::SubscriptionPostgres,
    },
    payments::stripe_client::StripeClient,
};

use crate::{
    axum_http::error_responses::AppError,
    usecases::{stripe_gateway::StripeGateway, stripe_webhook::StripeWebhookUseCase},
};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let subscription_repository = SubscriptionPostgres::new(db_pool);
    let webhook_usecase =
        StripeWebhookUseCase::new(Arc::new(subscription_repository), stripe_client);

    router(Arc::new(webhook_usecase))
}

pub fn router<S, Stripe>(webhook_usecase: Arc<StripeWebhookUseCase<S, Stripe>>) -> Router
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    Router::new()
        .route("/webhooks/stripe", post(stripe_webhook))
        .with_state(webhook_usecase)
}

/// Takes the body as raw bytes; the signature is computed over them unchanged.
pub async fn stripe_webhook<S, Stripe>(
    State(webhook_usecase): State<Arc<StripeWebhookUseCase<S, Stripe>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let ack = webhook_usecase.handle_stripe_webhook(&body, signature).await?;

    Ok(Json(ack))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        axum_http::routers::test_support::read_json,
        usecases::{stripe_gateway::MockStripeGateway, test_support::InMemorySubscriptions},
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use crates::payments::stripe_client::StripeEvent;
    use serde_json::json;
    use tower::ServiceExt;

    fn app(stripe: MockStripeGateway, store: Arc<InMemorySubscriptions>) -> Router {
        router(Arc::new(StripeWebhookUseCase::new(store, Arc::new(stripe))))
    }

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().never();
        let store = Arc::new(InMemorySubscriptions::default());

        let response = app(stripe, Arc::clone(&store))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks/stripe")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            read_json(response).await["error"],
            "Webhook signature verification failed"
        );
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn raw_body_and_header_reach_verification() {
        let payload = r#"{"id":"evt_1","type":"customer.created"}"#;
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .withf(move |body, signature| {
                body == payload.as_bytes() && signature == "t=1,v1=abc"
            })
            .times(1)
            .returning(|_, _| {
                Ok(serde_json::from_value::<StripeEvent>(json!({
                    "id": "evt_1",
                    "type": "customer.created",
                    "created": 1,
                    "livemode": false,
                    "data": { "object": {} }
                }))
                .unwrap())
            });

        let response = app(stripe, Arc::new(InMemorySubscriptions::default()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks/stripe")
                    .header(STRIPE_SIGNATURE_HEADER, "t=1,v1=abc")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, json!({ "received": true }));
    }
}
