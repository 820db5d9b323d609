use std::sync::Arc;

use anyhow::Result as AnyResult;
use chrono::{DateTime, Utc};
use crates::domain::{
    entities::subscriptions::{EditSubscriptionEntity, InsertSubscriptionEntity, SubscriptionEntity},
    repositories::subscriptions::SubscriptionRepository,
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        subscription_events::{PlanScope, SubscriptionEvent},
    },
};
use tracing::{error, info};

/// The single store operation an event translates into.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionWrite {
    UpsertByUserId {
        create: InsertSubscriptionEntity,
        update: EditSubscriptionEntity,
    },
    UpdateByStripeSubscriptionId {
        stripe_subscription_id: String,
        update: EditSubscriptionEntity,
    },
}

impl SubscriptionWrite {
    pub fn from_event(event: SubscriptionEvent, now: DateTime<Utc>) -> Self {
        match event {
            SubscriptionEvent::CheckoutPaid {
                user_id,
                plan,
                billing_interval,
                period,
                plan_scope,
            } => {
                let create = InsertSubscriptionEntity {
                    user_id,
                    plan: plan.to_string(),
                    status: SubscriptionStatus::Active.to_string(),
                    end_date: period.end_date,
                    billing_interval: billing_interval.to_string(),
                    stripe_subscription_id: Some(period.stripe_subscription_id.clone()),
                    stripe_customer_id: period.stripe_customer_id.clone(),
                    metadata: None,
                };

                let mut update = EditSubscriptionEntity::touched_at(now);
                update.status = Some(SubscriptionStatus::Active.to_string());
                update.end_date = Some(period.end_date);
                update.stripe_subscription_id = Some(period.stripe_subscription_id);
                update.stripe_customer_id = period.stripe_customer_id;
                if plan_scope == PlanScope::CreateAndUpdate {
                    update.plan = Some(plan.to_string());
                    update.billing_interval = Some(billing_interval.to_string());
                }

                SubscriptionWrite::UpsertByUserId { create, update }
            }
            SubscriptionEvent::RenewalPaid {
                stripe_subscription_id,
                end_date,
            } => {
                let mut update = EditSubscriptionEntity::touched_at(now);
                update.status = Some(SubscriptionStatus::Active.to_string());
                update.end_date = Some(end_date);

                SubscriptionWrite::UpdateByStripeSubscriptionId {
                    stripe_subscription_id,
                    update,
                }
            }
            SubscriptionEvent::PaymentFailed {
                stripe_subscription_id,
                failure,
            } => {
                let mut update = EditSubscriptionEntity::touched_at(now);
                update.status = Some(SubscriptionStatus::PastDue.to_string());
                update.metadata = Some(failure.to_metadata());

                SubscriptionWrite::UpdateByStripeSubscriptionId {
                    stripe_subscription_id,
                    update,
                }
            }
            SubscriptionEvent::Cancelled {
                stripe_subscription_id,
                cancellation,
            } => {
                let mut update = EditSubscriptionEntity::touched_at(now);
                update.status = Some(SubscriptionStatus::Cancelled.to_string());
                update.metadata = Some(cancellation.to_metadata());

                SubscriptionWrite::UpdateByStripeSubscriptionId {
                    stripe_subscription_id,
                    update,
                }
            }
        }
    }
}

/// Applies normalized billing events to the subscription store.
///
/// Both the verification endpoint and the webhook endpoint go through here, so every
/// transition is defined once. Each call performs exactly one write and never reorders:
/// whatever arrives last wins.
pub struct SubscriptionReconciler<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
}

impl<S> SubscriptionReconciler<S>
where
    S: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<S>) -> Self {
        Self { subscription_repo }
    }

    pub async fn apply(&self, event: SubscriptionEvent) -> AnyResult<SubscriptionEntity> {
        self.apply_at(event, Utc::now()).await
    }

    pub async fn apply_at(
        &self,
        event: SubscriptionEvent,
        now: DateTime<Utc>,
    ) -> AnyResult<SubscriptionEntity> {
        let event_name = event.name();

        let result = match SubscriptionWrite::from_event(event, now) {
            SubscriptionWrite::UpsertByUserId { create, update } => {
                let user_id = create.user_id;
                self.subscription_repo
                    .upsert_by_user_id(create, update)
                    .await
                    .inspect_err(|err| {
                        error!(
                            %user_id,
                            event = event_name,
                            db_error = ?err,
                            "subscriptions: failed to upsert subscription"
                        );
                    })?
            }
            SubscriptionWrite::UpdateByStripeSubscriptionId {
                stripe_subscription_id,
                update,
            } => self
                .subscription_repo
                .update_by_stripe_subscription_id(&stripe_subscription_id, update)
                .await
                .inspect_err(|err| {
                    error!(
                        stripe_subscription_id = %stripe_subscription_id,
                        event = event_name,
                        db_error = ?err,
                        "subscriptions: failed to update subscription"
                    );
                })?,
        };

        info!(
            user_id = %result.user_id,
            subscription_id = %result.id,
            status = %result.status,
            event = event_name,
            "subscriptions: event applied"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::InMemorySubscriptions;
    use chrono::Duration;
    use crates::domain::{
        repositories::subscriptions::MockSubscriptionRepository,
        value_objects::{
            enums::{billing_intervals::BillingInterval, plan_types::PlanType},
            subscription_events::{Cancellation, PaymentFailure, StripePeriod},
        },
    };
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn checkout_paid(user_id: Uuid, plan_scope: PlanScope, end_date: DateTime<Utc>) -> SubscriptionEvent {
        SubscriptionEvent::CheckoutPaid {
            user_id,
            plan: PlanType::Premium,
            billing_interval: BillingInterval::Year,
            period: StripePeriod {
                stripe_subscription_id: "sub_123".to_string(),
                stripe_customer_id: Some("cus_123".to_string()),
                end_date,
            },
            plan_scope,
        }
    }

    #[test]
    fn webhook_checkout_only_sets_plan_on_create() {
        let now = Utc::now();
        let write = SubscriptionWrite::from_event(
            checkout_paid(Uuid::new_v4(), PlanScope::CreateOnly, now + Duration::days(30)),
            now,
        );

        let SubscriptionWrite::UpsertByUserId { create, update } = write else {
            panic!("checkout must upsert by user id");
        };
        assert_eq!(create.plan, "PREMIUM");
        assert_eq!(create.billing_interval, "year");
        assert_eq!(create.status, "ACTIVE");
        assert_eq!(update.plan, None);
        assert_eq!(update.billing_interval, None);
        assert_eq!(update.status.as_deref(), Some("ACTIVE"));
        assert_eq!(update.stripe_subscription_id.as_deref(), Some("sub_123"));
    }

    #[test]
    fn verified_checkout_overwrites_plan() {
        let now = Utc::now();
        let write = SubscriptionWrite::from_event(
            checkout_paid(Uuid::new_v4(), PlanScope::CreateAndUpdate, now),
            now,
        );

        let SubscriptionWrite::UpsertByUserId { update, .. } = write else {
            panic!("checkout must upsert by user id");
        };
        assert_eq!(update.plan.as_deref(), Some("PREMIUM"));
        assert_eq!(update.billing_interval.as_deref(), Some("year"));
    }

    #[test]
    fn failures_and_cancellations_replace_metadata() {
        let now = Utc::now();

        let failed = SubscriptionWrite::from_event(
            SubscriptionEvent::PaymentFailed {
                stripe_subscription_id: "sub_123".to_string(),
                failure: PaymentFailure {
                    message: Some("Your card was declined.".to_string()),
                    code: Some("card_declined".to_string()),
                    attempted_at: now,
                },
            },
            now,
        );
        let SubscriptionWrite::UpdateByStripeSubscriptionId { update, .. } = failed else {
            panic!("payment failure must update by stripe id");
        };
        assert_eq!(update.status.as_deref(), Some("PAST_DUE"));
        let metadata = update.metadata.unwrap();
        assert_eq!(metadata["lastPaymentErrorCode"], "card_declined");
        assert_eq!(metadata["lastPaymentAttempt"], now.to_rfc3339());

        let cancelled = SubscriptionWrite::from_event(
            SubscriptionEvent::Cancelled {
                stripe_subscription_id: "sub_123".to_string(),
                cancellation: Cancellation {
                    reason: Cancellation::DEFAULT_REASON.to_string(),
                    cancelled_at: now,
                },
            },
            now,
        );
        let SubscriptionWrite::UpdateByStripeSubscriptionId { update, .. } = cancelled else {
            panic!("cancellation must update by stripe id");
        };
        assert_eq!(update.status.as_deref(), Some("CANCELLED"));
        assert_eq!(update.metadata.unwrap()["cancellationReason"], "user_cancelled");
    }

    #[tokio::test]
    async fn applying_the_same_checkout_twice_is_idempotent() {
        let store = Arc::new(InMemorySubscriptions::default());
        let reconciler = SubscriptionReconciler::new(Arc::clone(&store));
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let end_date = now + Duration::days(30);

        let first = reconciler
            .apply_at(checkout_paid(user_id, PlanScope::CreateAndUpdate, end_date), now)
            .await
            .unwrap();
        let second = reconciler
            .apply_at(checkout_paid(user_id, PlanScope::CreateAndUpdate, end_date), now)
            .await
            .unwrap();

        let mut second = second;
        second.updated_at = first.updated_at;
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn renewal_for_unknown_subscription_fails_without_insert() {
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_update_by_stripe_subscription_id()
            .withf(|id, _| id == "sub_missing")
            .times(1)
            .returning(|id, _| Err(anyhow::anyhow!("no subscription found for stripe subscription id {}", id)));
        subscription_repo.expect_upsert_by_user_id().never();

        let reconciler = SubscriptionReconciler::new(Arc::new(subscription_repo));
        let result = reconciler
            .apply(SubscriptionEvent::RenewalPaid {
                stripe_subscription_id: "sub_missing".to_string(),
                end_date: Utc::now(),
            })
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn upsert_is_keyed_by_user_id() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let store = InMemorySubscriptions::default();
        let expected = {
            let write = SubscriptionWrite::from_event(
                checkout_paid(user_id, PlanScope::CreateOnly, now),
                now,
            );
            let SubscriptionWrite::UpsertByUserId { create, update } = write else {
                panic!("checkout must upsert by user id");
            };
            store.upsert_by_user_id(create, update).await.unwrap()
        };

        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_upsert_by_user_id()
            .withf(move |create, _| create.user_id == user_id)
            .times(1)
            .returning(move |_, _| Ok(expected.clone()));
        subscription_repo
            .expect_find_by_user_id()
            .with(eq(user_id))
            .never();

        let reconciler = SubscriptionReconciler::new(Arc::new(subscription_repo));
        let applied = reconciler
            .apply_at(checkout_paid(user_id, PlanScope::CreateOnly, now), now)
            .await
            .unwrap();

        assert_eq!(applied.user_id, user_id);
    }
}
