pub mod stripe;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Money;

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub booking_id: String,
    pub hunter_id: String,
    pub amount: Money,
    pub currency: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub booking_id: String,
    pub amount: Money,
    pub currency: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(&self, req: &CheckoutRequest) -> anyhow::Result<CheckoutSession>;
    async fn create_payment_intent(&self, req: &IntentRequest) -> anyhow::Result<PaymentIntent>;
}

/// What a webhook event means for the booking it references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    Ignored,
}

impl PaymentOutcome {
    pub fn from_event_type(kind: &str) -> Self {
        match kind {
            "checkout.session.completed" | "payment_intent.succeeded" => PaymentOutcome::Succeeded,
            "payment_intent.payment_failed" | "payment_intent.canceled" => PaymentOutcome::Failed,
            _ => PaymentOutcome::Ignored,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEvent {
    pub id: String,
    pub kind: String,
    pub outcome: PaymentOutcome,
    pub booking_id: Option<String>,
    pub payment_intent_id: Option<String>,
}

/// Pulls the fields we act on out of a provider event payload.
pub fn parse_event(payload: &[u8]) -> anyhow::Result<PaymentEvent> {
    let data: serde_json::Value = serde_json::from_slice(payload)?;

    let id = data["id"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("event has no id"))?
        .to_string();
    let kind = data["type"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("event has no type"))?
        .to_string();

    let object = &data["data"]["object"];
    let booking_id = object["metadata"]["booking_id"]
        .as_str()
        .or_else(|| object["client_reference_id"].as_str())
        .map(|s| s.to_string());

    let payment_intent_id = match object["object"].as_str() {
        Some("payment_intent") => object["id"].as_str(),
        _ => object["payment_intent"].as_str(),
    }
    .map(|s| s.to_string());

    Ok(PaymentEvent {
        outcome: PaymentOutcome::from_event_type(&kind),
        id,
        kind,
        booking_id,
        payment_intent_id,
    })
}
