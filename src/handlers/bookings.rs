use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingStatus};
use crate::services::booking::{self, BookingOutcome, NewBooking};
use crate::services::events::{BookingEvent, BookingEventKind};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

fn publish(state: &AppState, kind: BookingEventKind, outcome: &BookingOutcome) {
    if outcome.changed {
        state
            .events
            .publish(BookingEvent::new(kind, &outcome.booking, &outcome.owner_id));
    }
}

// GET /api/bookings
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            BookingStatus::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown booking status: {raw}")))?,
        ),
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let db = state.db()?;
    Ok(Json(booking::list_bookings(&db, &actor, status, limit)?))
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let outcome = {
        let mut db = state.db()?;
        let now = chrono::Utc::now().naive_utc();
        booking::create_booking(&mut db, &actor, &body, now)
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            if let AppError::DateConflict { conflicting } = &e {
                tracing::info!(
                    listing_id = %body.listing_id,
                    hunter_id = %actor.user_id,
                    conflicting = ?conflicting,
                    "booking request conflicts with existing bookings"
                );
            }
            return Err(e);
        }
    };

    publish(&state, BookingEventKind::Created, &outcome);
    Ok((StatusCode::CREATED, Json(outcome.booking)))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let db = state.db()?;
    Ok(Json(booking::get_booking_for(&db, &actor, &id)?.booking))
}

// POST /api/bookings/:id/confirm
pub async fn confirm_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let outcome = {
        let db = state.db()?;
        booking::confirm_booking(&db, &actor, &id, chrono::Utc::now().naive_utc())?
    };
    publish(&state, BookingEventKind::StatusChanged, &outcome);
    Ok(Json(outcome.booking))
}

// POST /api/bookings/:id/decline
pub async fn decline_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let outcome = {
        let db = state.db()?;
        booking::decline_booking(&db, &actor, &id, chrono::Utc::now().naive_utc())?
    };
    publish(&state, BookingEventKind::StatusChanged, &outcome);
    Ok(Json(outcome.booking))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let outcome = {
        let db = state.db()?;
        booking::cancel_booking(&db, &actor, &id, chrono::Utc::now().naive_utc())?
    };
    publish(&state, BookingEventKind::StatusChanged, &outcome);
    Ok(Json(outcome.booking))
}

// POST /api/bookings/:id/complete
pub async fn complete_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let now = chrono::Utc::now().naive_utc();
    let outcome = {
        let db = state.db()?;
        booking::complete_booking(&db, &actor, &id, now.date(), now)?
    };
    publish(&state, BookingEventKind::StatusChanged, &outcome);
    Ok(Json(outcome.booking))
}

/// Runs one completion sweep and publishes what changed. Called on an
/// interval from `main`.
pub fn run_completion_sweep(state: &AppState) -> Result<usize, AppError> {
    let now = chrono::Utc::now().naive_utc();
    let completed = {
        let db = state.db()?;
        booking::complete_elapsed_bookings(&db, now.date(), now)?
    };
    for outcome in &completed {
        publish(state, BookingEventKind::StatusChanged, outcome);
    }
    Ok(completed.len())
}

// GET /api/bookings/events (SSE)
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) if event.visible_to(&actor) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("booking_event")))
        }
        Ok(_) => None,
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "booking event subscriber lagged");
            None
        }
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    Sse::new(StreamExt::merge(live_stream, keepalive_stream))
}
