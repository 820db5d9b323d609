use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::value_objects::enums::subscription_statuses::SubscriptionStatus;
use crate::infra::db::postgres::schema::subscriptions;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub end_date: DateTime<Utc>,
    pub billing_interval: String,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionEntity {
    /// An ACTIVE row only grants access until its period end; the stored status is not rewritten on expiry.
    pub fn grants_access(&self, now: DateTime<Utc>) -> bool {
        SubscriptionStatus::from_str(&self.status) == Some(SubscriptionStatus::Active)
            && self.end_date > now
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub end_date: DateTime<Utc>,
    pub billing_interval: String,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Partial update. `None` fields are left untouched; `metadata` replaces the stored value wholesale.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = subscriptions)]
pub struct EditSubscriptionEntity {
    pub plan: Option<String>,
    pub status: Option<String>,
    pub end_date: Option<DateTime<Utc>>,
    pub billing_interval: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl EditSubscriptionEntity {
    pub fn touched_at(updated_at: DateTime<Utc>) -> Self {
        Self {
            plan: None,
            status: None,
            end_date: None,
            billing_interval: None,
            stripe_subscription_id: None,
            stripe_customer_id: None,
            metadata: None,
            updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(status: SubscriptionStatus, end_date: DateTime<Utc>) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan: "PREMIUM".to_string(),
            status: status.to_string(),
            end_date,
            billing_interval: "month".to_string(),
            stripe_subscription_id: Some("sub_123".to_string()),
            stripe_customer_id: Some("cus_123".to_string()),
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn active_subscription_grants_access_until_end_date() {
        let now = Utc::now();

        assert!(subscription(SubscriptionStatus::Active, now + Duration::days(3)).grants_access(now));
        assert!(!subscription(SubscriptionStatus::Active, now - Duration::seconds(1)).grants_access(now));
    }

    #[test]
    fn past_due_and_cancelled_never_grant_access() {
        let now = Utc::now();
        let future = now + Duration::days(3);

        assert!(!subscription(SubscriptionStatus::PastDue, future).grants_access(now));
        assert!(!subscription(SubscriptionStatus::Cancelled, future).grants_access(now));
    }
}
