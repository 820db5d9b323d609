use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Tier of a plan. `Free` is never persisted: a user without a subscription row is on the free tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanType {
    Free,
    Premium,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Free => "FREE",
            PlanType::Premium => "PREMIUM",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "FREE" => Some(PlanType::Free),
            "PREMIUM" => Some(PlanType::Premium),
            _ => None,
        }
    }
}

impl Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
