use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, de::DeserializeOwned};
use sha2::Sha256;
use tracing::error;

use crate::domain::value_objects::{
    checkout_metadata::{CheckoutMetadata, metadata_user_email},
    plans::PlanPricing,
};

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;
pub const PAYMENT_INTENT_SUBSCRIPTION_KEY: &str = "subscriptionId";

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
    webhook_secret: String,
    success_url: String,
    cancel_url: String,
}

/// A field Stripe returns either as a bare id or, when expanded, as the full object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

pub trait StripeObject {
    fn object_id(&self) -> &str;
}

impl<T: StripeObject> Expandable<T> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(object) => object.object_id(),
        }
    }

    pub fn object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(object) => Some(object),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

impl StripeEvent {
    /// Deserializes `data.object` into the shape expected for this event type.
    pub fn object<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.data.object.clone())
            .with_context(|| format!("unexpected data.object for stripe event {}", self.type_))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
}

impl StripeObject for StripeCustomer {
    fn object_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripeCustomerDetails {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: Option<String>,
    pub customer: Option<Expandable<StripeCustomer>>,
    pub customer_details: Option<StripeCustomerDetails>,
    pub subscription: Option<Expandable<StripeSubscription>>,
    pub metadata: Option<HashMap<String, String>>,
}

impl StripeCheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }

    /// Payer email: expanded customer first, then the checkout's customer details,
    /// then the `userEmail` written into the session metadata.
    pub fn payer_email(&self) -> Option<&str> {
        self.customer
            .as_ref()
            .and_then(Expandable::object)
            .and_then(|customer| customer.email.as_deref())
            .or_else(|| {
                self.customer_details
                    .as_ref()
                    .and_then(|details| details.email.as_deref())
            })
            .or_else(|| metadata_user_email(self.metadata.as_ref()))
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripeCancellationDetails {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: Option<String>,
    pub customer: Option<Expandable<StripeCustomer>>,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
    pub cancellation_details: Option<StripeCancellationDetails>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub current_period_end: Option<i64>,
}

impl StripeObject for StripeSubscription {
    fn object_id(&self) -> &str {
        &self.id
    }
}

impl StripeSubscription {
    /// Period end, falling back to the first item for API versions that moved it there.
    pub fn period_end(&self) -> Option<DateTime<Utc>> {
        self.current_period_end
            .or_else(|| {
                self.items
                    .data
                    .first()
                    .and_then(|item| item.current_period_end)
            })
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
    }

    pub fn customer_id(&self) -> Option<&str> {
        self.customer.as_ref().map(Expandable::id)
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_details
            .as_ref()
            .and_then(|details| details.reason.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripeInvoiceParent {
    pub subscription_details: Option<StripeInvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceSubscriptionDetails {
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub subscription: Option<String>,
    pub payment_intent: Option<String>,
    pub parent: Option<StripeInvoiceParent>,
}

impl StripeInvoice {
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_deref().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|parent| parent.subscription_details.as_ref())
                .and_then(|details| details.subscription.as_deref())
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StripePaymentError {
    pub message: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub last_payment_error: Option<StripePaymentError>,
    pub metadata: Option<HashMap<String, String>>,
}

impl StripePaymentIntent {
    pub fn subscription_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get(PAYMENT_INTENT_SUBSCRIPTION_KEY))
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

/// Everything needed to open a subscription-mode Checkout Session for one plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    pub product_name: String,
    pub product_description: String,
    pub pricing: PlanPricing,
    pub customer_email: String,
    pub metadata: CheckoutMetadata,
}

/// Form body for `POST /v1/checkout/sessions`.
///
/// The correlation metadata goes on both the session and the subscription it creates.
pub fn checkout_session_form(
    request: &CheckoutSessionRequest,
    success_url: &str,
    cancel_url: &str,
) -> Vec<(String, String)> {
    let mut body: Vec<(String, String)> = vec![
        ("mode".to_string(), "subscription".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        (
            "line_items[0][price_data][currency]".to_string(),
            request.pricing.currency.clone(),
        ),
        (
            "line_items[0][price_data][product_data][name]".to_string(),
            request.product_name.clone(),
        ),
        (
            "line_items[0][price_data][product_data][description]".to_string(),
            request.product_description.clone(),
        ),
        (
            "line_items[0][price_data][unit_amount]".to_string(),
            request.pricing.unit_amount.to_string(),
        ),
        (
            "line_items[0][price_data][recurring][interval]".to_string(),
            request.pricing.interval.to_string(),
        ),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), success_url.to_string()),
        ("cancel_url".to_string(), cancel_url.to_string()),
        ("customer_email".to_string(), request.customer_email.clone()),
        (
            "billing_address_collection".to_string(),
            "required".to_string(),
        ),
        ("allow_promotion_codes".to_string(), "true".to_string()),
    ];

    let metadata: BTreeMap<String, String> = request.metadata.to_metadata().into_iter().collect();
    for (key, value) in &metadata {
        body.push((format!("metadata[{}]", key), value.clone()));
    }
    for (key, value) in metadata {
        body.push((format!("subscription_data[metadata][{}]", key), value));
    }

    body
}

/// Checks a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`) against the payload.
///
/// The signed content is `"{t}.{payload}"` under HMAC-SHA256. Any matching `v1` entry is
/// accepted; timestamps older than `tolerance_secs` relative to `now` are rejected.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature_header: &str,
    now: DateTime<Utc>,
    tolerance_secs: i64,
) -> Result<()> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = Some(rest);
        } else if let Some(rest) = part.strip_prefix("v1=") {
            signatures.push(rest);
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| anyhow::anyhow!("missing timestamp in stripe-signature"))?;
    if signatures.is_empty() {
        anyhow::bail!("missing v1 in stripe-signature");
    }

    let signed_at: i64 = timestamp
        .parse()
        .context("malformed timestamp in stripe-signature")?;
    if signed_at < now.timestamp() - tolerance_secs {
        anyhow::bail!("stripe-signature timestamp is outside the tolerance window");
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|signature| {
        hex::decode(signature)
            .map(|provided| mac.clone().verify_slice(&provided).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        anyhow::bail!("invalid webhook signature");
    }

    Ok(())
}

/// Stripe object ids (`cs_...`, `sub_...`, `pi_...`) are ASCII alphanumerics and underscores.
pub fn is_stripe_object_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn object_path(resource: &str, id: &str) -> Result<String> {
    if !is_stripe_object_id(id) {
        anyhow::bail!("invalid stripe object id for {}: {:?}", resource, id);
    }
    Ok(format!("{}/{}", resource, id))
}

impl StripeClient {
    pub fn new(
        secret_key: String,
        webhook_secret: String,
        success_url: String,
        cancel_url: String,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build stripe http client")?;

        Ok(Self {
            http,
            api_base: STRIPE_API_BASE.to_string(),
            secret_key,
            webhook_secret,
            success_url,
            cancel_url,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base.trim_end_matches('/'), path)
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = resp.text().await.unwrap_or_default();
        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        let stripe_message = details.as_ref().and_then(|d| d.message.clone());
        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.clone()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.clone()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.clone()),
            stripe_error_message = ?stripe_message,
            context = %context,
            "stripe: api request failed"
        );

        match stripe_message {
            Some(message) => anyhow::bail!("{}", message),
            None => anyhow::bail!("Stripe API request failed: {} (status {})", context, status),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<T> {
        let resp = self
            .http
            .get(self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .query(query)
            .send()
            .await
            .with_context(|| format!("stripe request failed: {}", context))?;
        let resp = Self::ensure_success(resp, context).await?;

        resp.json()
            .await
            .with_context(|| format!("unexpected stripe response: {}", context))
    }

    /// Creates a subscription-mode Checkout Session and returns its id.
    pub async fn create_checkout_session(&self, request: &CheckoutSessionRequest) -> Result<String> {
        let body = checkout_session_form(request, &self.success_url, &self.cancel_url);

        let resp = self
            .http
            .post(self.url("checkout/sessions"))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .form(&body)
            .send()
            .await
            .context("stripe request failed: create checkout session")?;
        let resp = Self::ensure_success(resp, "create checkout session").await?;

        #[derive(Deserialize)]
        struct CheckoutResp {
            id: String,
        }

        let parsed: CheckoutResp = resp.json().await?;
        Ok(parsed.id)
    }

    /// Retrieves a Checkout Session with its subscription, customer and line items expanded.
    pub async fn retrieve_checkout_session(&self, session_id: &str) -> Result<StripeCheckoutSession> {
        self.get_json(
            &object_path("checkout/sessions", session_id)?,
            &[
                ("expand[]", "subscription"),
                ("expand[]", "customer"),
                ("expand[]", "line_items"),
            ],
            "retrieve checkout session",
        )
        .await
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription> {
        self.get_json(
            &object_path("subscriptions", subscription_id)?,
            &[],
            "retrieve subscription",
        )
        .await
    }

    pub async fn retrieve_payment_intent(&self, payment_intent_id: &str) -> Result<StripePaymentIntent> {
        self.get_json(
            &object_path("payment_intents", payment_intent_id)?,
            &[],
            "retrieve payment intent",
        )
        .await
    }

    /// Verifies the webhook signature and parses the event.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str) -> Result<StripeEvent> {
        verify_signature(
            &self.webhook_secret,
            payload,
            signature_header,
            Utc::now(),
            SIGNATURE_TOLERANCE_SECS,
        )?;

        let event: StripeEvent =
            serde_json::from_slice(payload).context("webhook payload is not a stripe event")?;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::value_objects::enums::{
        billing_intervals::BillingInterval, plan_types::PlanType,
    };

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    fn checkout_request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            product_name: "Premium".to_string(),
            product_description: "Unlimited access".to_string(),
            pricing: PlanPricing {
                unit_amount: 999,
                currency: "usd".to_string(),
                interval: BillingInterval::Month,
            },
            customer_email: "reader@example.com".to_string(),
            metadata: CheckoutMetadata {
                user_id: Uuid::new_v4(),
                plan_id: Some("premium-month".to_string()),
                plan_type: PlanType::Premium,
                billing_interval: BillingInterval::Month,
                user_email: Some("reader@example.com".to_string()),
            },
        }
    }

    fn form_value<'a>(form: &'a [(String, String)], key: &str) -> Option<&'a str> {
        form.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn checkout_form_carries_price_and_metadata_on_both_objects() {
        let form = checkout_session_form(
            &checkout_request(),
            "http://localhost:3000/payment/success?session_id={CHECKOUT_SESSION_ID}",
            "http://localhost:3000/payment/failure?error=payment_cancelled",
        );

        assert_eq!(form_value(&form, "mode"), Some("subscription"));
        assert_eq!(form_value(&form, "line_items[0][price_data][unit_amount]"), Some("999"));
        assert_eq!(form_value(&form, "line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(
            form_value(&form, "line_items[0][price_data][recurring][interval]"),
            Some("month")
        );
        assert_eq!(form_value(&form, "metadata[planType]"), Some("PREMIUM"));
        assert_eq!(form_value(&form, "metadata[billingInterval]"), Some("month"));
        assert_eq!(
            form_value(&form, "subscription_data[metadata][planType]"),
            Some("PREMIUM")
        );
        assert_eq!(
            form_value(&form, "subscription_data[metadata][billingInterval]"),
            Some("month")
        );
        assert_eq!(form_value(&form, "billing_address_collection"), Some("required"));
    }

    #[test]
    fn accepts_a_valid_signature() {
        let payload = br#"{"type":"invoice.paid","data":{"object":{}}}"#;
        let now = Utc::now();
        let header = format!("t={},v1={}", now.timestamp(), sign(payload, now.timestamp()));

        assert!(verify_signature(SECRET, payload, &header, now, SIGNATURE_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let payload = b"{}";
        let now = Utc::now();
        let header = format!(
            "t={},v1={},v1={}",
            now.timestamp(),
            "00".repeat(32),
            sign(payload, now.timestamp())
        );

        assert!(verify_signature(SECRET, payload, &header, now, SIGNATURE_TOLERANCE_SECS).is_ok());
    }

    #[test]
    fn rejects_a_tampered_body() {
        let now = Utc::now();
        let header = format!("t={},v1={}", now.timestamp(), sign(b"{\"a\":1}", now.timestamp()));

        assert!(verify_signature(SECRET, b"{\"a\":2}", &header, now, SIGNATURE_TOLERANCE_SECS).is_err());
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let payload = b"{}";
        let now = Utc::now();
        let signed_at = now.timestamp() - SIGNATURE_TOLERANCE_SECS - 1;
        let header = format!("t={},v1={}", signed_at, sign(payload, signed_at));

        assert!(verify_signature(SECRET, payload, &header, now, SIGNATURE_TOLERANCE_SECS).is_err());
    }

    #[test]
    fn rejects_a_header_without_v1() {
        let now = Utc::now();
        let header = format!("t={}", now.timestamp());

        assert!(verify_signature(SECRET, b"{}", &header, now, SIGNATURE_TOLERANCE_SECS).is_err());
        assert!(verify_signature(SECRET, b"{}", "garbage", now, SIGNATURE_TOLERANCE_SECS).is_err());
    }

    #[test]
    fn session_exposes_expanded_objects() {
        let session: StripeCheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_1",
            "payment_status": "paid",
            "customer": { "id": "cus_1", "email": "reader@example.com" },
            "subscription": { "id": "sub_1", "customer": "cus_1", "current_period_end": 1_767_225_600 },
            "metadata": { "userEmail": "other@example.com" }
        }))
        .unwrap();

        assert!(session.is_paid());
        assert_eq!(session.payer_email(), Some("reader@example.com"));
        let subscription = session.subscription.as_ref().unwrap();
        assert_eq!(subscription.id(), "sub_1");
        assert_eq!(subscription.object().unwrap().customer_id(), Some("cus_1"));
    }

    #[test]
    fn payer_email_falls_back_in_order() {
        let session: StripeCheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_2",
            "customer": "cus_1",
            "customer_details": { "email": "details@example.com" },
            "subscription": "sub_1",
            "metadata": { "userEmail": "meta@example.com" }
        }))
        .unwrap();
        assert_eq!(session.payer_email(), Some("details@example.com"));
        assert!(session.subscription.as_ref().unwrap().object().is_none());

        let session: StripeCheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_test_3",
            "metadata": { "userEmail": "meta@example.com" }
        }))
        .unwrap();
        assert_eq!(session.payer_email(), Some("meta@example.com"));
    }

    #[test]
    fn subscription_period_end_falls_back_to_items() {
        let subscription: StripeSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_1",
            "items": { "data": [{ "current_period_end": 1_767_225_600 }] }
        }))
        .unwrap();

        assert_eq!(
            subscription.period_end(),
            DateTime::from_timestamp(1_767_225_600, 0)
        );
    }

    #[test]
    fn invoice_subscription_id_reads_parent_details() {
        let invoice: StripeInvoice = serde_json::from_value(serde_json::json!({
            "id": "in_1",
            "parent": { "subscription_details": { "subscription": "sub_9" } }
        }))
        .unwrap();

        assert_eq!(invoice.subscription_id(), Some("sub_9"));
    }

    #[test]
    fn object_ids_are_alphanumeric_with_underscores() {
        assert!(is_stripe_object_id("cs_test_a1B2c3"));
        assert!(is_stripe_object_id("sub_1"));
        assert!(!is_stripe_object_id(""));
        assert!(!is_stripe_object_id("../customers/cus_victim"));
        assert!(!is_stripe_object_id("cs_1?expand[]=customer"));
        assert!(!is_stripe_object_id("cs_1%2F..%2Fcustomers"));
    }

    #[tokio::test]
    async fn path_traversal_ids_never_leave_the_client() {
        let client = StripeClient::new(
            "sk_test_123".to_string(),
            SECRET.to_string(),
            "http://localhost:3000/payment/success".to_string(),
            "http://localhost:3000/payment/failure".to_string(),
        )
        .unwrap()
        .with_api_base("http://127.0.0.1:9");

        let err = client
            .retrieve_checkout_session("../customers/cus_victim")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid stripe object id"));

        let err = client.retrieve_subscription("sub_1/../../charges").await.unwrap_err();
        assert!(err.to_string().contains("invalid stripe object id"));

        let err = client.retrieve_payment_intent("pi 1").await.unwrap_err();
        assert!(err.to_string().contains("invalid stripe object id"));
    }
}
