use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::queries::ListingFilter;
use crate::errors::AppError;
use crate::models::{AccessType, Actor, DateRange, Listing, ListingStatus};
use crate::services::availability::Quote;
use crate::services::listings::{self, ListingPatch, NewListing};
use crate::services::reviews::{self, ListingDetail};
use crate::state::AppState;

fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

// GET /api/listings
#[derive(Debug, Deserialize)]
pub struct DiscoverQuery {
    pub county: Option<String>,
    pub animal: Option<String>,
    pub access_type: Option<String>,
    pub limit: Option<i64>,
    /// `mine=true` lists the caller's own listings in any status.
    pub mine: Option<bool>,
}

pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    actor: Option<Actor>,
    Query(query): Query<DiscoverQuery>,
) -> Result<Json<Vec<Listing>>, AppError> {
    if query.mine.unwrap_or(false) {
        let actor = actor.ok_or(AppError::Unauthenticated)?;
        let db = state.db()?;
        return Ok(Json(listings::owner_listings(&db, &actor)?));
    }

    let access_type = match query.access_type.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            AccessType::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown access type: {raw}")))?,
        ),
    };
    let filter = ListingFilter {
        county: query.county.filter(|c| !c.trim().is_empty()),
        animal: query.animal.filter(|a| !a.trim().is_empty()),
        access_type,
        limit: query.limit.unwrap_or(0),
    };

    let db = state.db()?;
    Ok(Json(listings::discover_listings(&db, filter)?))
}

// POST /api/listings
pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(body): Json<NewListing>,
) -> Result<(StatusCode, Json<Listing>), AppError> {
    let db = state.db()?;
    let listing = listings::create_listing(&db, &actor, body, now())?;
    Ok((StatusCode::CREATED, Json(listing)))
}

// GET /api/listings/:id
pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    actor: Option<Actor>,
    Path(id): Path<String>,
) -> Result<Json<ListingDetail>, AppError> {
    let db = state.db()?;
    let listing = listings::get_listing(&db, actor.as_ref(), &id)?;
    Ok(Json(reviews::listing_detail(&db, listing)?))
}

// PATCH /api/listings/:id
pub async fn update_listing(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(patch): Json<ListingPatch>,
) -> Result<Json<Listing>, AppError> {
    let db = state.db()?;
    Ok(Json(listings::update_listing(&db, &actor, &id, patch, now())?))
}

// POST /api/listings/:id/status
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ListingStatus,
}

pub async fn set_listing_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Listing>, AppError> {
    let db = state.db()?;
    Ok(Json(listings::set_listing_status(&db, &actor, &id, body.status, now())?))
}

// GET /api/listings/:id/booked-dates
#[derive(Debug, Serialize)]
pub struct BookedDatesResponse {
    pub listing_id: String,
    pub dates: Vec<NaiveDate>,
}

pub async fn booked_dates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookedDatesResponse>, AppError> {
    let db = state.db()?;
    let dates = listings::booked_dates(&db, &id)?.into_iter().collect();
    Ok(Json(BookedDatesResponse {
        listing_id: id,
        dates,
    }))
}

// GET /api/listings/:id/quote?start_date=..&end_date=..
#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub async fn quote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<QuoteQuery>,
) -> Result<Json<Quote>, AppError> {
    let db = state.db()?;
    let range = DateRange::new(query.start_date, query.end_date);
    Ok(Json(listings::quote(&db, &id, range)?))
}
