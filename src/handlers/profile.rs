use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::auth::SessionUser;
use crate::models::{Profile, Role};
use crate::state::AppState;

// GET /api/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
) -> Result<Json<Profile>, AppError> {
    let db = state.db()?;
    if let Some(profile) = queries::get_profile(&db, &user.user_id)? {
        return Ok(Json(profile));
    }

    queries::upsert_profile(&db, &user.user_id, None, None)?;
    let profile = queries::get_profile(&db, &user.user_id)?
        .ok_or_else(|| AppError::NotFound(format!("profile {}", user.user_id)))?;
    Ok(Json(profile))
}

// POST /api/profile
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub role: Option<Role>,
    pub display_name: Option<String>,
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: SessionUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    let db = state.db()?;
    let existing = queries::get_profile(&db, &user.user_id)?;
    let current_role = existing.as_ref().and_then(|p| p.role);

    if let Some(requested) = body.role {
        if requested == Role::Admin {
            return Err(AppError::Unauthorized(
                "the admin role cannot be self-assigned".to_string(),
            ));
        }
        if current_role.is_some_and(|r| r != requested) {
            return Err(AppError::Validation("role has already been chosen".to_string()));
        }
    }

    let display_name = body
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    queries::upsert_profile(&db, &user.user_id, body.role, display_name)?;
    if body.role.is_some() && current_role.is_none() {
        tracing::info!(user_id = %user.user_id, role = ?body.role, "role chosen");
    }

    let profile = queries::get_profile(&db, &user.user_id)?
        .ok_or_else(|| AppError::NotFound(format!("profile {}", user.user_id)))?;
    Ok(Json(profile))
}
