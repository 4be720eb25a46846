use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::{Actor, Listing};
use crate::services::favorites;
use crate::state::AppState;

// GET /api/favorites
pub async fn list_saved(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Listing>>, AppError> {
    let db = state.db()?;
    Ok(Json(favorites::saved_listings(&db, &actor)?))
}

// PUT /api/favorites/:listing_id
pub async fn save(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(listing_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let db = state.db()?;
    let now = chrono::Utc::now().naive_utc();
    let changed = favorites::save_listing(&db, &actor, &listing_id, now)?;
    Ok(Json(json!({ "listing_id": listing_id, "saved": true, "changed": changed })))
}

// DELETE /api/favorites/:listing_id
pub async fn unsave(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(listing_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let db = state.db()?;
    let changed = favorites::unsave_listing(&db, &actor, &listing_id)?;
    Ok(Json(json!({ "listing_id": listing_id, "saved": false, "changed": changed })))
}
