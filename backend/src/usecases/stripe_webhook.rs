use std::sync::Arc;

use anyhow::{Context, Result as AnyResult, anyhow};
use chrono::Utc;
use crates::{
    domain::{
        repositories::subscriptions::SubscriptionRepository,
        value_objects::{
            checkout_metadata::CheckoutMetadata,
            subscription_events::{Cancellation, PaymentFailure, PlanScope, SubscriptionEvent},
            subscriptions::WebhookAck,
        },
    },
    payments::stripe_client::{
        StripeCheckoutSession, StripeEvent, StripeInvoice, StripePaymentIntent, StripeSubscription,
    },
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    axum_http::error_responses::AppError,
    usecases::{
        stripe_gateway::StripeGateway, subscription_reconciler::SubscriptionReconciler,
        subscriptions::stripe_period,
    },
};

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const INVOICE_PAID: &str = "invoice.paid";
pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";
pub const CUSTOMER_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const PAYMENT_INTENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Webhook signature verification failed")]
    InvalidSignature(#[source] anyhow::Error),
    #[error("Error processing webhook")]
    Processing(#[source] anyhow::Error),
}

impl WebhookError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            WebhookError::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            WebhookError::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        let message = err.to_string();
        match err {
            WebhookError::InvalidSignature(_) => AppError::BadRequest(message),
            WebhookError::Processing(source) => {
                AppError::internal(message, Some(format!("{:#}", source)))
            }
        }
    }
}

pub struct StripeWebhookUseCase<S, Stripe>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    stripe_client: Arc<Stripe>,
    reconciler: SubscriptionReconciler<S>,
}

impl<S, Stripe> StripeWebhookUseCase<S, Stripe>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<S>, stripe_client: Arc<Stripe>) -> Self {
        Self {
            stripe_client,
            reconciler: SubscriptionReconciler::new(subscription_repo),
        }
    }

    /// Verifies the signature over the raw body, then dispatches on the event type.
    ///
    /// Nothing is parsed or written when the signature does not check out.
    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck, WebhookError> {
        let signature = signature
            .ok_or_else(|| WebhookError::InvalidSignature(anyhow!("missing stripe-signature header")))?;

        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| {
                warn!(error = %err, "stripe_webhook: signature verification failed");
                WebhookError::InvalidSignature(err)
            })?;

        let event_id = event.id.clone().unwrap_or_default();
        info!(event_id = %event_id, event_type = %event.type_, "stripe_webhook: event received");

        let normalized = self.normalize(&event).await.map_err(|err| {
            error!(
                event_id = %event_id,
                event_type = %event.type_,
                error = ?err,
                "stripe_webhook: failed to read event"
            );
            WebhookError::Processing(err)
        })?;

        let Some(normalized) = normalized else {
            debug!(event_id = %event_id, event_type = %event.type_, "stripe_webhook: event ignored");
            return Ok(WebhookAck { received: true });
        };

        self.reconciler
            .apply(normalized)
            .await
            .map_err(WebhookError::Processing)?;

        Ok(WebhookAck { received: true })
    }

    /// Maps a verified Stripe event onto a subscription event; `None` for types we do not handle.
    async fn normalize(&self, event: &StripeEvent) -> AnyResult<Option<SubscriptionEvent>> {
        let normalized = match event.type_.as_str() {
            CHECKOUT_SESSION_COMPLETED => {
                let session: StripeCheckoutSession = event.object()?;
                let metadata = CheckoutMetadata::from_metadata(session.metadata.as_ref())
                    .with_context(|| format!("checkout session {} has unusable metadata", session.id))?;
                let subscription_id = session
                    .subscription
                    .as_ref()
                    .map(|subscription| subscription.id().to_string())
                    .ok_or_else(|| anyhow!("checkout session {} has no subscription", session.id))?;

                let subscription = self.stripe_client.retrieve_subscription(&subscription_id).await?;

                SubscriptionEvent::CheckoutPaid {
                    user_id: metadata.user_id,
                    plan: metadata.plan_type,
                    billing_interval: metadata.billing_interval,
                    period: stripe_period(&subscription)?,
                    plan_scope: PlanScope::CreateOnly,
                }
            }
            INVOICE_PAID => {
                let invoice: StripeInvoice = event.object()?;
                let subscription = self.invoice_subscription(&invoice).await?;
                let period = stripe_period(&subscription)?;

                SubscriptionEvent::RenewalPaid {
                    stripe_subscription_id: period.stripe_subscription_id,
                    end_date: period.end_date,
                }
            }
            INVOICE_PAYMENT_FAILED => {
                let invoice: StripeInvoice = event.object()?;
                let subscription = self.invoice_subscription(&invoice).await?;

                let payment_intent = match invoice.payment_intent.as_deref() {
                    Some(payment_intent_id) => Some(
                        self.stripe_client
                            .retrieve_payment_intent(payment_intent_id)
                            .await?,
                    ),
                    None => {
                        warn!(invoice_id = %invoice.id, "stripe_webhook: failed invoice has no payment intent");
                        None
                    }
                };

                SubscriptionEvent::PaymentFailed {
                    stripe_subscription_id: subscription.id,
                    failure: payment_failure(payment_intent.as_ref()),
                }
            }
            CUSTOMER_SUBSCRIPTION_DELETED => {
                let subscription: StripeSubscription = event.object()?;
                let reason = subscription
                    .cancellation_reason()
                    .unwrap_or(Cancellation::DEFAULT_REASON)
                    .to_string();

                SubscriptionEvent::Cancelled {
                    stripe_subscription_id: subscription.id,
                    cancellation: Cancellation {
                        reason,
                        cancelled_at: Utc::now(),
                    },
                }
            }
            PAYMENT_INTENT_PAYMENT_FAILED => {
                let event_intent: StripePaymentIntent = event.object()?;
                let payment_intent = self
                    .stripe_client
                    .retrieve_payment_intent(&event_intent.id)
                    .await?;
                let subscription_id = payment_intent.subscription_id().ok_or_else(|| {
                    anyhow!("payment intent {} is not linked to a subscription", payment_intent.id)
                })?;
                let subscription = self.stripe_client.retrieve_subscription(subscription_id).await?;

                SubscriptionEvent::PaymentFailed {
                    stripe_subscription_id: subscription.id,
                    failure: payment_failure(Some(&payment_intent)),
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(normalized))
    }

    async fn invoice_subscription(&self, invoice: &StripeInvoice) -> AnyResult<StripeSubscription> {
        let subscription_id = invoice
            .subscription_id()
            .ok_or_else(|| anyhow!("invoice {} is not linked to a subscription", invoice.id))?;

        self.stripe_client.retrieve_subscription(subscription_id).await
    }
}

fn payment_failure(payment_intent: Option<&StripePaymentIntent>) -> PaymentFailure {
    let last_error = payment_intent.and_then(|intent| intent.last_payment_error.as_ref());

    PaymentFailure {
        message: last_error.and_then(|err| err.message.clone()),
        code: last_error.and_then(|err| err.code.clone()),
        attempted_at: Utc::now(),
    }
}
