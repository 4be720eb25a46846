use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use rusqlite::TransactionBehavior;

use crate::db::queries;
use crate::errors::AppError;
use crate::services::booking::{self, BookingOutcome};
use crate::services::events::{BookingEvent, BookingEventKind};
use crate::services::payments::stripe::verify_signature;
use crate::services::payments::{parse_event, PaymentOutcome};
use crate::state::AppState;

// POST /webhooks/stripe
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let secret = &state.config.stripe_webhook_secret;
    if secret.is_empty() {
        tracing::warn!("webhook received but no signing secret is configured");
        return Err(AppError::InvalidSignature);
    }

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if signature.is_empty() {
        tracing::warn!("missing Stripe-Signature header");
        return Err(AppError::InvalidSignature);
    }

    let now = chrono::Utc::now();
    if !verify_signature(
        secret,
        signature,
        &body,
        now.timestamp(),
        state.config.webhook_tolerance_secs,
    ) {
        tracing::warn!("invalid Stripe webhook signature");
        return Err(AppError::InvalidSignature);
    }

    let event = parse_event(&body).map_err(|e| AppError::Validation(format!("malformed event: {e}")))?;
    tracing::info!(event_id = %event.id, kind = %event.kind, "payment webhook received");

    let now = now.naive_utc();
    let applied: Option<(BookingEventKind, BookingOutcome)> = {
        let mut db = state.db()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !queries::record_payment_event(&tx, &event.id, &event.kind, event.booking_id.as_deref())? {
            tracing::info!(event_id = %event.id, "duplicate payment event ignored");
            return Ok(Json(serde_json::json!({"received": true, "duplicate": true})));
        }

        let result = match (event.outcome, event.booking_id.as_deref()) {
            (PaymentOutcome::Ignored, _) => Ok(None),
            (_, None) => {
                tracing::warn!(event_id = %event.id, "payment event without booking id");
                Ok(None)
            }
            (PaymentOutcome::Succeeded, Some(booking_id)) => booking::record_payment_success(
                &tx,
                booking_id,
                now,
                state.config.auto_confirm_on_payment,
            )
            .map(|o| Some((BookingEventKind::Paid, o))),
            (PaymentOutcome::Failed, Some(booking_id)) => {
                booking::record_payment_failure(&tx, booking_id, now)
                    .map(|o| Some((BookingEventKind::StatusChanged, o)))
            }
        };

        let applied = match result {
            Ok(applied) => applied,
            Err(AppError::NotFound(what)) => {
                tracing::warn!(event_id = %event.id, missing = %what, "payment event for unknown booking");
                None
            }
            Err(e) => return Err(e),
        };

        if let (Some(intent_id), Some((_, outcome))) = (&event.payment_intent_id, &applied) {
            if outcome.booking.payment_intent_id.is_none() {
                queries::set_payment_intent_id(&tx, &outcome.booking.id, intent_id)?;
            }
        }

        tx.commit()?;
        applied
    };

    if let Some((kind, outcome)) = applied {
        if outcome.changed {
            state
                .events
                .publish(BookingEvent::new(kind, &outcome.booking, &outcome.owner_id));
        }
    }

    Ok(Json(serde_json::json!({"received": true})))
}
