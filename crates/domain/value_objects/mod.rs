pub mod checkout_metadata;
pub mod enums;
pub mod news;
pub mod plans;
pub mod subscription_events;
pub mod subscriptions;
pub mod users;
