use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::domain::value_objects::enums::{billing_intervals::BillingInterval, plan_types::PlanType};

/// Billing period as reported by the Stripe subscription object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripePeriod {
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub end_date: DateTime<Utc>,
}

/// Whether a confirmed checkout may overwrite plan and interval on an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanScope {
    /// Client verification: the session the user just paid for is authoritative.
    CreateAndUpdate,
    /// `checkout.session.completed`: plan and interval are only written when the row is created.
    CreateOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFailure {
    pub message: Option<String>,
    pub code: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl PaymentFailure {
    pub fn to_metadata(&self) -> Value {
        json!({
            "lastPaymentError": self.message,
            "lastPaymentErrorCode": self.code,
            "lastPaymentAttempt": self.attempted_at.to_rfc3339(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

impl Cancellation {
    pub const DEFAULT_REASON: &'static str = "user_cancelled";

    pub fn to_metadata(&self) -> Value {
        json!({
            "cancellationReason": self.reason,
            "cancelledAt": self.cancelled_at.to_rfc3339(),
        })
    }
}

/// Normalized billing event. Both the verification endpoint and the webhook endpoint
/// translate what they learn from Stripe into one of these before touching the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    CheckoutPaid {
        user_id: Uuid,
        plan: PlanType,
        billing_interval: BillingInterval,
        period: StripePeriod,
        plan_scope: PlanScope,
    },
    RenewalPaid {
        stripe_subscription_id: String,
        end_date: DateTime<Utc>,
    },
    PaymentFailed {
        stripe_subscription_id: String,
        failure: PaymentFailure,
    },
    Cancelled {
        stripe_subscription_id: String,
        cancellation: Cancellation,
    },
}

impl SubscriptionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SubscriptionEvent::CheckoutPaid { .. } => "checkout_paid",
            SubscriptionEvent::RenewalPaid { .. } => "renewal_paid",
            SubscriptionEvent::PaymentFailed { .. } => "payment_failed",
            SubscriptionEvent::Cancelled { .. } => "cancelled",
        }
    }
}
