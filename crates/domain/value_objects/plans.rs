use serde::Serialize;

use crate::domain::value_objects::enums::{billing_intervals::BillingInterval, plan_types::PlanType};

/// A purchasable plan as shown on the pricing page.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanModel {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub interval: Option<BillingInterval>,
    pub features: Vec<String>,
    pub disabled: bool,
}

/// Price fields of a plan that passed checkout validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPricing {
    /// Price in the currency's minor unit (cents).
    pub unit_amount: i64,
    /// Lowercase ISO currency code.
    pub currency: String,
    pub interval: BillingInterval,
}

impl PlanModel {
    /// Returns the Stripe-ready pricing, or `None` when price, currency or interval is missing.
    pub fn pricing(&self) -> Option<PlanPricing> {
        let price = self.price.filter(|price| price.is_finite() && *price > 0.0)?;
        let currency = self
            .currency
            .as_deref()
            .map(str::trim)
            .filter(|currency| !currency.is_empty())?;
        let interval = self.interval?;

        Some(PlanPricing {
            unit_amount: (price * 100.0).round() as i64,
            currency: currency.to_lowercase(),
            interval,
        })
    }
}

/// Static plan catalog. Lookups are by plan id.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<PlanModel>,
}

impl PlanCatalog {
    pub fn new(plans: Vec<PlanModel>) -> Self {
        Self { plans }
    }

    pub fn find(&self, plan_id: &str) -> Option<&PlanModel> {
        self.plans.iter().find(|plan| plan.id == plan_id)
    }

    pub fn plans(&self) -> &[PlanModel] {
        &self.plans
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::new(vec![
            PlanModel {
                id: "free".to_string(),
                name: "Free".to_string(),
                description: "Headlines from India and around the world".to_string(),
                plan_type: PlanType::Free,
                price: Some(0.0),
                currency: Some("USD".to_string()),
                interval: Some(BillingInterval::Month),
                features: vec![
                    "Indian news".to_string(),
                    "World news".to_string(),
                    "7 articles per page".to_string(),
                ],
                disabled: true,
            },
            PlanModel {
                id: "premium-month".to_string(),
                name: "Premium".to_string(),
                description: "Unlimited access to every news category".to_string(),
                plan_type: PlanType::Premium,
                price: Some(9.99),
                currency: Some("USD".to_string()),
                interval: Some(BillingInterval::Month),
                features: vec![
                    "Everything in Free".to_string(),
                    "All news categories".to_string(),
                    "Cancel anytime".to_string(),
                ],
                disabled: false,
            },
            PlanModel {
                id: "premium-year".to_string(),
                name: "Premium Yearly".to_string(),
                description: "Premium billed once a year".to_string(),
                plan_type: PlanType::Premium,
                price: Some(99.99),
                currency: Some("USD".to_string()),
                interval: Some(BillingInterval::Year),
                features: vec![
                    "Everything in Premium".to_string(),
                    "Two months free".to_string(),
                ],
                disabled: false,
            },
        ])
    }
}
