pub mod news;
pub mod stripe_gateway;
pub mod stripe_webhook;
pub mod subscription_reconciler;
pub mod subscriptions;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;
