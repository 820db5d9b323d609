use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use crates::domain::{
    entities::subscriptions::{EditSubscriptionEntity, InsertSubscriptionEntity, SubscriptionEntity},
    repositories::subscriptions::SubscriptionRepository,
};
use uuid::Uuid;

/// Subscription store backed by a Vec, with the same key semantics as the Postgres table.
#[derive(Default)]
pub struct InMemorySubscriptions {
    rows: Mutex<Vec<SubscriptionEntity>>,
    writes: Mutex<usize>,
}

impl InMemorySubscriptions {
    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    pub fn get(&self, user_id: Uuid) -> Option<SubscriptionEntity> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.user_id == user_id)
            .cloned()
    }

    fn record_write(&self) {
        *self.writes.lock().unwrap() += 1;
    }
}

fn apply_edit(row: &mut SubscriptionEntity, update: EditSubscriptionEntity) {
    if let Some(plan) = update.plan {
        row.plan = plan;
    }
    if let Some(status) = update.status {
        row.status = status;
    }
    if let Some(end_date) = update.end_date {
        row.end_date = end_date;
    }
    if let Some(billing_interval) = update.billing_interval {
        row.billing_interval = billing_interval;
    }
    if update.stripe_subscription_id.is_some() {
        row.stripe_subscription_id = update.stripe_subscription_id;
    }
    if update.stripe_customer_id.is_some() {
        row.stripe_customer_id = update.stripe_customer_id;
    }
    if update.metadata.is_some() {
        row.metadata = update.metadata;
    }
    row.updated_at = update.updated_at;
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptions {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        Ok(self.get(user_id))
    }

    async fn upsert_by_user_id(
        &self,
        create: InsertSubscriptionEntity,
        update: EditSubscriptionEntity,
    ) -> Result<SubscriptionEntity> {
        self.record_write();
        let mut rows = self.rows.lock().unwrap();

        if let Some(row) = rows.iter_mut().find(|row| row.user_id == create.user_id) {
            apply_edit(row, update);
            return Ok(row.clone());
        }

        let now = Utc::now();
        let row = SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: create.user_id,
            plan: create.plan,
            status: create.status,
            end_date: create.end_date,
            billing_interval: create.billing_interval,
            stripe_subscription_id: create.stripe_subscription_id,
            stripe_customer_id: create.stripe_customer_id,
            metadata: create.metadata,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn update_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        update: EditSubscriptionEntity,
    ) -> Result<SubscriptionEntity> {
        self.record_write();
        let mut rows = self.rows.lock().unwrap();

        let row = rows
            .iter_mut()
            .find(|row| row.stripe_subscription_id.as_deref() == Some(stripe_subscription_id))
            .ok_or_else(|| {
                anyhow!(
                    "no subscription found for stripe subscription id {}",
                    stripe_subscription_id
                )
            })?;

        apply_edit(row, update);
        Ok(row.clone())
    }
}
