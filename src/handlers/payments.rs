use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingStatus};
use crate::services::payments::{CheckoutRequest, CheckoutSession, IntentRequest, PaymentIntent};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub booking_id: String,
}

/// Loads a booking the actor may pay for, along with its listing title.
fn payable_booking(state: &AppState, actor: &Actor, booking_id: &str) -> Result<(Booking, String), AppError> {
    let db = state.db()?;
    let booking = queries::get_booking_by_id(&db, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.hunter_id != actor.user_id && !actor.is_admin() {
        return Err(AppError::NotFound(format!("booking {booking_id}")));
    }
    if booking.paid_at.is_some() {
        return Err(AppError::Validation("booking is already paid".to_string()));
    }
    match booking.status {
        BookingStatus::Pending | BookingStatus::Confirmed => {}
        BookingStatus::Cancelled | BookingStatus::Completed => {
            return Err(AppError::Validation(format!(
                "cannot pay for a {} booking",
                booking.status.as_str().to_lowercase()
            )))
        }
    }

    let title = queries::get_listing(&db, &booking.listing_id)?
        .map(|l| l.title)
        .unwrap_or_else(|| "Hunting booking".to_string());
    Ok((booking, title))
}

fn describe(booking: &Booking, title: &str) -> String {
    format!(
        "{title}: {} to {} ({} day(s))",
        booking.start_date, booking.end_date, booking.total_days
    )
}

// POST /api/payments/create-checkout
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<PaymentRequest>,
) -> Result<Json<CheckoutSession>, AppError> {
    let (booking, title) = payable_booking(&state, &actor, &body.booking_id)?;

    let app_url = state.config.app_url.trim_end_matches('/');
    let req = CheckoutRequest {
        booking_id: booking.id.clone(),
        hunter_id: booking.hunter_id.clone(),
        amount: booking.grand_total,
        currency: state.config.currency.clone(),
        description: describe(&booking, &title),
        success_url: format!("{app_url}/bookings/{}?payment=success", booking.id),
        cancel_url: format!("{app_url}/bookings/{}?payment=cancelled", booking.id),
    };

    let session = state.payments.create_checkout_session(&req).await.map_err(|e| {
        tracing::error!(error = %e, booking_id = %booking.id, "failed to create checkout session");
        AppError::Upstream("payment provider unavailable".to_string())
    })?;

    if let Some(intent_id) = &session.payment_intent_id {
        let db = state.db()?;
        queries::set_payment_intent_id(&db, &booking.id, intent_id)?;
    }

    tracing::info!(booking_id = %booking.id, session_id = %session.id, "checkout session created");
    Ok(Json(session))
}

// POST /api/payments/create-intent
pub async fn create_intent(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<PaymentRequest>,
) -> Result<Json<PaymentIntent>, AppError> {
    let (booking, title) = payable_booking(&state, &actor, &body.booking_id)?;

    let req = IntentRequest {
        booking_id: booking.id.clone(),
        amount: booking.grand_total,
        currency: state.config.currency.clone(),
        description: describe(&booking, &title),
    };

    let intent = state.payments.create_payment_intent(&req).await.map_err(|e| {
        tracing::error!(error = %e, booking_id = %booking.id, "failed to create payment intent");
        AppError::Upstream("payment provider unavailable".to_string())
    })?;

    {
        let db = state.db()?;
        queries::set_payment_intent_id(&db, &booking.id, &intent.id)?;
    }

    tracing::info!(booking_id = %booking.id, intent_id = %intent.id, "payment intent created");
    Ok(Json(intent))
}
