use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, Role};
use crate::state::AppState;

/// An authenticated user who may not have picked a role yet.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user_id: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn resolve_user(parts: &Parts, state: &AppState) -> Result<String, AppError> {
    let token = bearer_token(&parts.headers).ok_or(AppError::Unauthenticated)?;

    match state.identity.user_id(token).await {
        Ok(Some(user_id)) => Ok(user_id),
        Ok(None) => Err(AppError::Unauthenticated),
        Err(e) => {
            tracing::error!(error = %e, "identity provider failed");
            Err(AppError::Upstream("identity provider unavailable".to_string()))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let user_id = resolve_user(parts, state).await?;
        Ok(SessionUser { user_id })
    }
}

/// A user with a role from the local profile store. Users who have not
/// finished onboarding are rejected.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let user_id = resolve_user(parts, state).await?;

        let role: Option<Role> = {
            let db = state.db()?;
            queries::get_profile(&db, &user_id)?.and_then(|p| p.role)
        };

        match role {
            Some(role) => Ok(Actor::new(user_id, role)),
            None => Err(AppError::Unauthorized(
                "choose a role before using this endpoint".to_string(),
            )),
        }
    }
}
