use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::payments::stripe_client::{
    CheckoutSessionRequest, StripeCheckoutSession, StripeClient, StripeEvent, StripePaymentIntent,
    StripeSubscription,
};

/// The Stripe calls the subscription flows depend on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> AnyResult<String>;

    async fn retrieve_checkout_session(&self, session_id: &str) -> AnyResult<StripeCheckoutSession>;

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription>;

    async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> AnyResult<StripePaymentIntent>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> AnyResult<String> {
        self.create_checkout_session(&request).await
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> AnyResult<StripeCheckoutSession> {
        self.retrieve_checkout_session(session_id).await
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> AnyResult<StripeSubscription> {
        self.retrieve_subscription(subscription_id).await
    }

    async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> AnyResult<StripePaymentIntent> {
        self.retrieve_payment_intent(payment_intent_id).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> AnyResult<StripeEvent> {
        self.verify_webhook_signature(payload, signature)
    }
}
