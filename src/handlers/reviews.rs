use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{Actor, Review};
use crate::services::reviews::{self, NewReview};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

// POST /api/bookings/:id/review
pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(booking_id): Path<String>,
    Json(body): Json<NewReview>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let db = state.db()?;
    let now = chrono::Utc::now().naive_utc();
    let review = reviews::submit_review(&db, &actor, &booking_id, &body, now)?;
    Ok((StatusCode::CREATED, Json(review)))
}

// GET /api/listings/:id/reviews
#[derive(Debug, Deserialize)]
pub struct ReviewsQuery {
    pub limit: Option<i64>,
}

pub async fn listing_reviews(
    State(state): State<Arc<AppState>>,
    actor: Option<Actor>,
    Path(listing_id): Path<String>,
    Query(query): Query<ReviewsQuery>,
) -> Result<Json<Vec<Review>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let db = state.db()?;
    Ok(Json(reviews::listing_reviews(&db, actor.as_ref(), &listing_id, limit)?))
}
