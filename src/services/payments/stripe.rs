use anyhow::Context;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{CheckoutRequest, CheckoutSession, IntentRequest, PaymentIntent, PaymentProvider};

const API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripeProvider {
    secret_key: String,
    client: reqwest::Client,
}

impl StripeProvider {
    pub fn new(secret_key: String) -> Self {
        Self {
            secret_key,
            client: reqwest::Client::new(),
        }
    }

    async fn post_form(&self, path: &str, form: &[(&str, String)]) -> anyhow::Result<serde_json::Value> {
        let resp = self
            .client
            .post(format!("{API_BASE}/{path}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .with_context(|| format!("failed to call Stripe {path}"))?;

        let status = resp.status();
        let data: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse Stripe response")?;

        if !status.is_success() {
            anyhow::bail!(
                "Stripe API error ({}): {}",
                status,
                data["error"]["message"].as_str().unwrap_or("unknown error")
            );
        }
        Ok(data)
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_checkout_session(&self, req: &CheckoutRequest) -> anyhow::Result<CheckoutSession> {
        let form = [
            ("mode", "payment".to_string()),
            ("success_url", req.success_url.clone()),
            ("cancel_url", req.cancel_url.clone()),
            ("client_reference_id", req.booking_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", req.currency.clone()),
            ("line_items[0][price_data][unit_amount]", req.amount.cents().to_string()),
            ("line_items[0][price_data][product_data][name]", req.description.clone()),
            ("metadata[booking_id]", req.booking_id.clone()),
            ("metadata[hunter_id]", req.hunter_id.clone()),
            ("payment_intent_data[metadata][booking_id]", req.booking_id.clone()),
        ];

        let data = self.post_form("checkout/sessions", &form).await?;

        Ok(CheckoutSession {
            id: data["id"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("missing id in Stripe checkout session"))?
                .to_string(),
            url: data["url"].as_str().map(|s| s.to_string()),
            payment_intent_id: data["payment_intent"].as_str().map(|s| s.to_string()),
        })
    }

    async fn create_payment_intent(&self, req: &IntentRequest) -> anyhow::Result<PaymentIntent> {
        let form = [
            ("amount", req.amount.cents().to_string()),
            ("currency", req.currency.clone()),
            ("description", req.description.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("metadata[booking_id]", req.booking_id.clone()),
        ];

        let data = self.post_form("payment_intents", &form).await?;

        Ok(PaymentIntent {
            id: data["id"]
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("missing id in Stripe payment intent"))?
                .to_string(),
            client_secret: data["client_secret"].as_str().map(|s| s.to_string()),
        })
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`, the `v1` scheme.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(to_hex(&mac.finalize().into_bytes()))
}

/// Checks a `Stripe-Signature` header (`t=...,v1=...[,v1=...]`) against the
/// raw body. Timestamps further than `tolerance_secs` from `now` fail.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
    tolerance_secs: i64,
) -> bool {
    let mut timestamp = None;
    let mut signatures = vec![];
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let Some(timestamp) = timestamp else {
        return false;
    };
    if (now - timestamp).abs() > tolerance_secs {
        tracing::warn!(timestamp, now, "webhook signature timestamp outside tolerance");
        return false;
    }

    let Some(expected) = sign_payload(secret, timestamp, payload) else {
        return false;
    };
    signatures
        .iter()
        .any(|sig| constant_time_eq::constant_time_eq(sig.as_bytes(), expected.as_bytes()))
}
