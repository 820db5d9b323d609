use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    #[serde(default)]
    pub plan_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutResponse {
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedSubscriptionDto {
    pub plan: String,
    pub status: String,
    pub billing_interval: String,
    pub end_date: DateTime<Utc>,
}

impl From<&SubscriptionEntity> for VerifiedSubscriptionDto {
    fn from(value: &SubscriptionEntity) -> Self {
        Self {
            plan: value.plan.clone(),
            status: value.status.clone(),
            billing_interval: value.billing_interval.clone(),
            end_date: value.end_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub subscription: VerifiedSubscriptionDto,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub end_date: DateTime<Utc>,
    pub billing_interval: String,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub has_access: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionDto {
    pub fn from_entity(value: SubscriptionEntity, now: DateTime<Utc>) -> Self {
        let has_access = value.grants_access(now);
        Self {
            id: value.id,
            user_id: value.user_id,
            plan: value.plan,
            status: value.status,
            end_date: value.end_date,
            billing_interval: value.billing_interval,
            stripe_subscription_id: value.stripe_subscription_id,
            stripe_customer_id: value.stripe_customer_id,
            metadata: value.metadata,
            has_access,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSubscriptionResponse {
    pub subscription: Option<SubscriptionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookAck {
    pub received: bool,
}
