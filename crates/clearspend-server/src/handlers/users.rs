//! Acting-user profile and limit handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use clearspend_core::models::User;

use crate::{acting_user, AppError, AppState};

/// GET /api/me - Profile of the acting user
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<User>, AppError> {
    let user = acting_user(&state, &headers)?;
    Ok(Json(user))
}

/// Request body for updating the monthly limit
#[derive(Debug, Deserialize)]
pub struct UpdateLimitRequest {
    /// New monthly limit; null clears it
    pub monthly_limit: Option<f64>,
}

#[derive(Serialize)]
pub struct UpdateLimitResponse {
    pub success: bool,
    pub monthly_limit: Option<f64>,
}

/// PUT /api/limit - Set or clear the acting user's monthly spending limit
pub async fn update_limit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<UpdateLimitRequest>,
) -> Result<Json<UpdateLimitResponse>, AppError> {
    let user = acting_user(&state, &headers)?;

    if let Some(limit) = req.monthly_limit {
        if !limit.is_finite() || limit < 0.0 {
            return Err(AppError::bad_request("Monthly limit must be non-negative"));
        }
    }

    let updated = state
        .db
        .set_monthly_limit(user.id, req.monthly_limit)
        .map_err(AppError::from_core)?;
    if !updated {
        return Err(AppError::not_found("User not found"));
    }

    Ok(Json(UpdateLimitResponse {
        success: true,
        monthly_limit: req.monthly_limit,
    }))
}
