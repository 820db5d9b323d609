use anyhow::{Result, anyhow};
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::subscriptions::{
            EditSubscriptionEntity, InsertSubscriptionEntity, SubscriptionEntity,
        },
        repositories::subscriptions::SubscriptionRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn upsert_by_user_id(
        &self,
        create: InsertSubscriptionEntity,
        update: EditSubscriptionEntity,
    ) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // One row per user; concurrent writers land on the same row.
        let result = insert_into(subscriptions::table)
            .values(&create)
            .on_conflict(subscriptions::user_id)
            .do_update()
            .set(&update)
            .returning(SubscriptionEntity::as_returning())
            .get_result::<SubscriptionEntity>(&mut conn)?;

        Ok(result)
    }

    async fn update_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        update_entity: EditSubscriptionEntity,
    ) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(
            subscriptions::table
                .filter(subscriptions::stripe_subscription_id.eq(stripe_subscription_id)),
        )
        .set(&update_entity)
        .returning(SubscriptionEntity::as_returning())
        .get_result::<SubscriptionEntity>(&mut conn)
        .optional()?
        .ok_or_else(|| {
            anyhow!(
                "no subscription found for stripe subscription id {}",
                stripe_subscription_id
            )
        })
    }
}
