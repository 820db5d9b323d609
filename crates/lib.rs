pub mod domain;
pub mod infra;
pub mod news;
pub mod observability;
pub mod payments;
