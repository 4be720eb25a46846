use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::ListingStatus;
use crate::services::calendar::{generate_ics, generate_listing_feed};
use crate::state::AppState;

fn ics_response(body: String, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                &format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}

// GET /calendar/:booking_id
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let booking_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let (booking, listing) = {
        let db = state.db()?;
        let booking = queries::get_booking_by_id(&db, booking_id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
        let listing = queries::get_listing(&db, &booking.listing_id)?
            .ok_or_else(|| AppError::NotFound(format!("listing {}", booking.listing_id)))?;
        (booking, listing)
    };

    let ics = generate_ics(&booking, &listing);
    Ok(ics_response(ics, &format!("booking-{booking_id}.ics")))
}

// GET /calendar/listings/:id/feed.ics
pub async fn listing_feed(
    State(state): State<Arc<AppState>>,
    Path(listing_id): Path<String>,
) -> Result<Response, AppError> {
    let (listing, bookings) = {
        let db = state.db()?;
        let listing = queries::get_listing(&db, &listing_id)?
            .filter(|l| l.status == ListingStatus::Published)
            .ok_or_else(|| AppError::NotFound(format!("listing {listing_id}")))?;
        let bookings = queries::get_active_bookings_for_listing(&db, &listing.id)?;
        (listing, bookings)
    };

    let feed = generate_listing_feed(&listing, &bookings);
    Ok(ics_response(feed, &format!("listing-{listing_id}.ics")))
}
