use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::value_objects::enums::{billing_intervals::BillingInterval, plan_types::PlanType};

pub const USER_ID_KEY: &str = "userId";
pub const PLAN_ID_KEY: &str = "planId";
pub const PLAN_TYPE_KEY: &str = "planType";
pub const BILLING_INTERVAL_KEY: &str = "billingInterval";
pub const USER_EMAIL_KEY: &str = "userEmail";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutMetadataError {
    #[error("checkout metadata is missing")]
    Missing,
    #[error("checkout metadata is missing `{0}`")]
    MissingField(&'static str),
    #[error("checkout metadata has an invalid `{field}`: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Correlation envelope written onto the checkout session and its subscription at creation time.
///
/// Stripe only stores string key/value metadata, so this type owns the mapping in both
/// directions. Every payment event that rebuilds a subscription reads it back through
/// [`CheckoutMetadata::from_metadata`] or [`PlanSelection::from_metadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub user_id: Uuid,
    pub plan_id: Option<String>,
    pub plan_type: PlanType,
    pub billing_interval: BillingInterval,
    pub user_email: Option<String>,
}

impl CheckoutMetadata {
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::from([
            (USER_ID_KEY.to_string(), self.user_id.to_string()),
            (PLAN_TYPE_KEY.to_string(), self.plan_type.to_string()),
            (
                BILLING_INTERVAL_KEY.to_string(),
                self.billing_interval.to_string(),
            ),
        ]);
        if let Some(plan_id) = &self.plan_id {
            metadata.insert(PLAN_ID_KEY.to_string(), plan_id.clone());
        }
        if let Some(user_email) = &self.user_email {
            metadata.insert(USER_EMAIL_KEY.to_string(), user_email.clone());
        }
        metadata
    }

    /// Only `userId` is required; `planId` and `userEmail` are informational.

    pub fn from_metadata(
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<Self, CheckoutMetadataError> {
        let metadata = metadata.ok_or(CheckoutMetadataError::Missing)?;

        let raw_user_id = non_empty(metadata, USER_ID_KEY)
            .ok_or(CheckoutMetadataError::MissingField(USER_ID_KEY))?;
        let user_id =
            Uuid::parse_str(raw_user_id).map_err(|_| CheckoutMetadataError::InvalidField {
                field: USER_ID_KEY,
                value: raw_user_id.to_string(),
            })?;

        let plan_id = non_empty(metadata, PLAN_ID_KEY).map(str::to_string);
        let user_email = non_empty(metadata, USER_EMAIL_KEY).map(str::to_string);

        let selection = PlanSelection::from_metadata(Some(metadata))?;

        Ok(Self {
            user_id,
            plan_id,
            plan_type: selection.plan_type,
            billing_interval: selection.billing_interval,
            user_email,
        })
    }
}

/// Plan tier and interval carried in checkout metadata.
///
/// Absent keys fall back to `PREMIUM` / `month`; present but unrecognised values are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSelection {
    pub plan_type: PlanType,
    pub billing_interval: BillingInterval,
}

impl Default for PlanSelection {
    fn default() -> Self {
        Self {
            plan_type: PlanType::Premium,
            billing_interval: BillingInterval::Month,
        }
    }
}

impl PlanSelection {
    pub fn from_metadata(
        metadata: Option<&HashMap<String, String>>,
    ) -> Result<Self, CheckoutMetadataError> {
        let Some(metadata) = metadata else {
            return Ok(Self::default());
        };

        let plan_type = match non_empty(metadata, PLAN_TYPE_KEY) {
            Some(raw) => {
                PlanType::from_str(raw).ok_or_else(|| CheckoutMetadataError::InvalidField {
                    field: PLAN_TYPE_KEY,
                    value: raw.to_string(),
                })?
            }
            None => PlanType::Premium,
        };

        let billing_interval = match non_empty(metadata, BILLING_INTERVAL_KEY) {
            Some(raw) => BillingInterval::from_str(raw).ok_or_else(|| {
                CheckoutMetadataError::InvalidField {
                    field: BILLING_INTERVAL_KEY,
                    value: raw.to_string(),
                }
            })?,
            None => BillingInterval::Month,
        };

        Ok(Self {
            plan_type,
            billing_interval,
        })
    }
}

/// The `userEmail` stored in checkout metadata, if any.
pub fn metadata_user_email(metadata: Option<&HashMap<String, String>>) -> Option<&str> {
    metadata.and_then(|metadata| non_empty(metadata, USER_EMAIL_KEY))
}

fn non_empty<'a>(metadata: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}
