use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::errors::AppError;
use crate::models::Actor;
use crate::services::dashboard::{build_dashboard, Dashboard};
use crate::state::AppState;

// GET /api/dashboard
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Dashboard>, AppError> {
    let today = chrono::Utc::now().date_naive();
    let db = state.db()?;
    Ok(Json(build_dashboard(&db, &actor, today)?))
}
