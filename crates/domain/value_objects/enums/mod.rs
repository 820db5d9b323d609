pub mod billing_intervals;
pub mod plan_types;
pub mod subscription_statuses;
