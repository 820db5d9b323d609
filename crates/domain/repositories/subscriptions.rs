use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{
    EditSubscriptionEntity, InsertSubscriptionEntity, SubscriptionEntity,
};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    /// Single-statement upsert keyed by the owning user: inserts `create` or applies `update`.
    async fn upsert_by_user_id(
        &self,
        create: InsertSubscriptionEntity,
        update: EditSubscriptionEntity,
    ) -> Result<SubscriptionEntity>;

    /// Fails when no row carries `stripe_subscription_id`; never inserts.
    async fn update_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        update: EditSubscriptionEntity,
    ) -> Result<SubscriptionEntity>;
}
