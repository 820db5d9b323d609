use std::sync::Arc;

use chrono::Utc;
use crates::{
    domain::{
        entities::users::UserEntity,
        repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
        value_objects::{
            checkout_metadata::{CheckoutMetadata, PlanSelection},
            enums::plan_types::PlanType,
            plans::PlanCatalog,
            subscription_events::{PlanScope, StripePeriod, SubscriptionEvent},
            subscriptions::{
                CreateCheckoutResponse, SubscriptionDto, UserSubscriptionResponse,
                VerifiedSubscriptionDto, VerifyPaymentResponse,
            },
        },
    },
    payments::stripe_client::{
        CheckoutSessionRequest, Expandable, StripeSubscription, is_stripe_object_id,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::{stripe_gateway::StripeGateway, subscription_reconciler::SubscriptionReconciler},
};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("{0}")]
    InvalidPlan(&'static str),
    #[error("User not found")]
    UserNotFound,
    #[error("Session ID is required")]
    MissingSessionId,
    #[error("Invalid session data")]
    InvalidSessionData,
    #[error("Unauthorized")]
    EmailMismatch,
    #[error("Payment not completed")]
    PaymentNotCompleted,
    #[error("No subscription found")]
    NoSubscription,
    #[error("{context}")]
    Stripe {
        context: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("Error updating subscription in database")]
    Store(#[source] anyhow::Error),
    #[error("Error fetching subscription")]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SubscriptionError::InvalidPlan(_)
            | SubscriptionError::MissingSessionId
            | SubscriptionError::InvalidSessionData
            | SubscriptionError::PaymentNotCompleted
            | SubscriptionError::NoSubscription => StatusCode::BAD_REQUEST,
            SubscriptionError::UserNotFound => StatusCode::NOT_FOUND,
            SubscriptionError::EmailMismatch => StatusCode::UNAUTHORIZED,
            SubscriptionError::Stripe { .. }
            | SubscriptionError::Store(_)
            | SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SubscriptionError> for AppError {
    fn from(err: SubscriptionError) -> Self {
        let message = err.to_string();
        match err {
            SubscriptionError::InvalidPlan(_)
            | SubscriptionError::MissingSessionId
            | SubscriptionError::InvalidSessionData
            | SubscriptionError::PaymentNotCompleted
            | SubscriptionError::NoSubscription => AppError::BadRequest(message),
            SubscriptionError::UserNotFound => AppError::NotFound(message),
            SubscriptionError::EmailMismatch => AppError::Unauthorized(message),
            SubscriptionError::Stripe { source, .. } => {
                AppError::internal(message, Some(source.to_string()))
            }
            SubscriptionError::Store(source) | SubscriptionError::Internal(source) => {
                AppError::internal(message, Some(source.to_string()))
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

pub struct SubscriptionUseCase<U, S, Stripe>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    stripe_client: Arc<Stripe>,
    reconciler: SubscriptionReconciler<S>,
    plan_catalog: Arc<PlanCatalog>,
}

impl<U, S, Stripe> SubscriptionUseCase<U, S, Stripe>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + Send + Sync + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        subscription_repo: Arc<S>,
        stripe_client: Arc<Stripe>,
        plan_catalog: Arc<PlanCatalog>,
    ) -> Self {
        let reconciler = SubscriptionReconciler::new(Arc::clone(&subscription_repo));
        Self {
            user_repo,
            subscription_repo,
            stripe_client,
            reconciler,
            plan_catalog,
        }
    }

    pub async fn create_checkout_session(
        &self,
        auth: &AuthUser,
        plan_id: Option<&str>,
    ) -> UseCaseResult<CreateCheckoutResponse> {
        let user_id = auth.user_id;
        let plan_id = plan_id.map(str::trim).unwrap_or_default();
        info!(%user_id, plan_id, "subscriptions: creating checkout session");

        let plan = self.plan_catalog.find(plan_id).ok_or_else(|| {
            warn!(%user_id, plan_id, "subscriptions: unknown plan requested");
            SubscriptionError::InvalidPlan("Invalid plan")
        })?;

        if plan.plan_type != PlanType::Premium || plan.disabled {
            warn!(
                %user_id,
                plan_id,
                plan_type = %plan.plan_type,
                disabled = plan.disabled,
                "subscriptions: plan is not purchasable"
            );
            return Err(SubscriptionError::InvalidPlan("Invalid plan type for checkout"));
        }

        let pricing = plan.pricing().ok_or_else(|| {
            error!(%user_id, plan_id, "subscriptions: plan is missing price, currency or interval");
            SubscriptionError::InvalidPlan("Invalid plan configuration")
        })?;

        let metadata = CheckoutMetadata {
            user_id,
            plan_id: Some(plan.id.clone()),
            plan_type: plan.plan_type,
            billing_interval: pricing.interval,
            user_email: Some(auth.email.clone()),
        };

        let request = CheckoutSessionRequest {
            product_name: plan.name.clone(),
            product_description: plan.description.clone(),
            pricing,
            customer_email: auth.email.clone(),
            metadata,
        };

        let session_id = self
            .stripe_client
            .create_checkout_session(request)
            .await
            .map_err(|err| {
                error!(%user_id, plan_id, error = ?err, "subscriptions: stripe checkout session failed");
                SubscriptionError::Stripe {
                    context: "Error creating checkout session",
                    source: err,
                }
            })?;

        info!(%user_id, plan_id, session_id = %session_id, "subscriptions: checkout session created");
        Ok(CreateCheckoutResponse { session_id })
    }

    pub async fn verify_payment(
        &self,
        auth: &AuthUser,
        session_id: Option<&str>,
    ) -> UseCaseResult<VerifyPaymentResponse> {
        let user = self.resolve_user(auth).await?;
        let user_id = user.id;

        let session_id = session_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(SubscriptionError::MissingSessionId)?;
        if !is_stripe_object_id(session_id) {
            warn!(%user_id, "subscriptions: malformed checkout session id");
            return Err(SubscriptionError::InvalidSessionData);
        }
        info!(%user_id, session_id, "subscriptions: verifying checkout session");

        let session = self
            .stripe_client
            .retrieve_checkout_session(session_id)
            .await
            .map_err(|err| {
                error!(%user_id, session_id, error = ?err, "subscriptions: failed to retrieve checkout session");
                SubscriptionError::Stripe {
                    context: "Error verifying payment",
                    source: err,
                }
            })?;

        let payer_email = session.payer_email().ok_or_else(|| {
            warn!(%user_id, session_id, "subscriptions: checkout session carries no customer email");
            SubscriptionError::InvalidSessionData
        })?;

        if payer_email != user.email {
            warn!(
                %user_id,
                session_id,
                "subscriptions: checkout session email does not match the caller"
            );
            return Err(SubscriptionError::EmailMismatch);
        }

        if !session.is_paid() {
            warn!(
                %user_id,
                session_id,
                payment_status = ?session.payment_status,
                "subscriptions: payment not completed"
            );
            return Err(SubscriptionError::PaymentNotCompleted);
        }

        let subscription = match session.subscription.as_ref() {
            Some(Expandable::Object(subscription)) => (**subscription).clone(),
            Some(Expandable::Id(subscription_id)) => self
                .stripe_client
                .retrieve_subscription(subscription_id)
                .await
                .map_err(|err| SubscriptionError::Stripe {
                    context: "Error verifying payment",
                    source: err,
                })?,
            None => {
                warn!(%user_id, session_id, "subscriptions: checkout session has no subscription");
                return Err(SubscriptionError::NoSubscription);
            }
        };

        let period = stripe_period(&subscription).map_err(|err| SubscriptionError::Stripe {
            context: "Error verifying payment",
            source: err,
        })?;

        let selection = PlanSelection::from_metadata(session.metadata.as_ref()).map_err(|err| {
            warn!(%user_id, session_id, error = %err, "subscriptions: unusable checkout metadata");
            SubscriptionError::InvalidSessionData
        })?;

        let updated = self
            .reconciler
            .apply(SubscriptionEvent::CheckoutPaid {
                user_id,
                plan: selection.plan_type,
                billing_interval: selection.billing_interval,
                period,
                plan_scope: PlanScope::CreateAndUpdate,
            })
            .await
            .map_err(SubscriptionError::Store)?;

        info!(
            %user_id,
            session_id,
            stripe_subscription_id = ?updated.stripe_subscription_id,
            "subscriptions: payment verified"
        );

        Ok(VerifyPaymentResponse {
            success: true,
            subscription: VerifiedSubscriptionDto::from(&updated),
        })
    }

    pub async fn get_user_subscription(&self, auth: &AuthUser) -> UseCaseResult<UserSubscriptionResponse> {
        let user = self.resolve_user(auth).await?;
        let user_id = user.id;

        let subscription = self
            .subscription_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load subscription");
                SubscriptionError::Internal(err)
            })?;

        let now = Utc::now();
        Ok(UserSubscriptionResponse {
            subscription: subscription.map(|entity| SubscriptionDto::from_entity(entity, now)),
        })
    }

    async fn resolve_user(&self, auth: &AuthUser) -> UseCaseResult<UserEntity> {
        self.user_repo
            .find_by_email(&auth.email)
            .await
            .map_err(|err| {
                error!(user_id = %auth.user_id, db_error = ?err, "subscriptions: failed to load user");
                SubscriptionError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(user_id = %auth.user_id, "subscriptions: user not found");
                SubscriptionError::UserNotFound
            })
    }
}

/// Period data the store needs from a Stripe subscription.
pub fn stripe_period(subscription: &StripeSubscription) -> anyhow::Result<StripePeriod> {
    let end_date = subscription.period_end().ok_or_else(|| {
        anyhow::anyhow!(
            "stripe subscription {} has no current period end",
            subscription.id
        )
    })?;

    Ok(StripePeriod {
        stripe_subscription_id: subscription.id.clone(),
        stripe_customer_id: subscription.customer_id().map(str::to_string),
        end_date,
    })
}
