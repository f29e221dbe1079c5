//! Expense CRUD handlers
//!
//! Every operation is scoped to the acting user; an expense owned by someone
//! else is indistinguishable from one that does not exist.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clearspend_core::models::{Expense, ExpenseFilter, ExpenseUpdate, NewExpense, SpendingStats};
use clearspend_core::MessageSource;

use crate::{acting_user, AppError, AppState, MAX_PAGE_LIMIT};

/// Query parameters for listing expenses
#[derive(Debug, Deserialize)]
pub struct ExpenseQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    /// Filter by exact category
    pub category: Option<String>,
    /// Start of date range (RFC 3339)
    pub from: Option<String>,
    /// End of date range (RFC 3339)
    pub to: Option<String>,
}

fn default_limit() -> i64 {
    50
}

fn parse_date(value: Option<&str>, field: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    match value {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| {
                AppError::bad_request(&format!("{} must be an RFC 3339 datetime", field))
            }),
    }
}

fn filter_from_query(params: &ExpenseQuery) -> Result<ExpenseFilter, AppError> {
    Ok(ExpenseFilter {
        category: params.category.clone(),
        from: parse_date(params.from.as_deref(), "from")?,
        to: parse_date(params.to.as_deref(), "to")?,
    })
}

#[derive(Serialize)]
pub struct ExpenseListResponse {
    pub expenses: Vec<Expense>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// GET /api/expenses - List the acting user's expenses, newest first
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExpenseQuery>,
    headers: HeaderMap,
) -> Result<Json<ExpenseListResponse>, AppError> {
    let user = acting_user(&state, &headers)?;

    // Input validation: clamp pagination parameters
    let limit = params.limit.max(1).min(MAX_PAGE_LIMIT);
    let offset = params.offset.max(0);
    let filter = filter_from_query(&params)?;

    let expenses = state
        .db
        .list_expenses(user.id, &filter, limit, offset)
        .map_err(AppError::from_core)?;
    let total = state
        .db
        .count_expenses(user.id, &filter)
        .map_err(AppError::from_core)?;

    Ok(Json(ExpenseListResponse {
        expenses,
        total,
        limit,
        offset,
    }))
}

/// Request body for creating an expense
#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub amount: f64,
    pub category: String,
    pub description: String,
    /// Occurrence date (RFC 3339); defaults to now
    pub date: Option<DateTime<Utc>>,
}

/// POST /api/expenses - Create an expense for the acting user
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<Expense>), AppError> {
    let user = acting_user(&state, &headers)?;

    let description = req.description.trim();
    if description.is_empty() {
        return Err(AppError::bad_request("Description cannot be empty"));
    }

    let expense = state
        .db
        .create_expense(
            user.id,
            &NewExpense {
                amount: req.amount,
                category: req.category,
                description: description.to_string(),
                date: req.date,
                source: MessageSource::Web,
                message_sid: None,
            },
        )
        .map_err(AppError::from_core)?;

    Ok((StatusCode::CREATED, Json(expense)))
}

/// GET /api/expenses/:id - Fetch one expense
pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Expense>, AppError> {
    let user = acting_user(&state, &headers)?;

    let expense = state
        .db
        .get_expense(user.id, id)
        .map_err(AppError::from_core)?
        .ok_or_else(|| AppError::not_found("Expense not found"))?;

    Ok(Json(expense))
}

/// PUT /api/expenses/:id - Update one expense
pub async fn update_expense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<ExpenseUpdate>,
) -> Result<Json<Expense>, AppError> {
    let user = acting_user(&state, &headers)?;

    let updated = state
        .db
        .update_expense(user.id, id, &req)
        .map_err(AppError::from_core)?
        .ok_or_else(|| AppError::not_found("Expense not found"))?;

    Ok(Json(updated))
}

/// DELETE /api/expenses/:id - Delete one expense
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let user = acting_user(&state, &headers)?;

    let deleted = state
        .db
        .delete_expense(user.id, id)
        .map_err(AppError::from_core)?;
    if !deleted {
        return Err(AppError::not_found("Expense not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Query parameters for the stats endpoint
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// GET /api/expenses/stats - Category breakdown for the acting user
pub async fn expense_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatsQuery>,
    headers: HeaderMap,
) -> Result<Json<SpendingStats>, AppError> {
    let user = acting_user(&state, &headers)?;

    let filter = ExpenseFilter {
        category: None,
        from: parse_date(params.from.as_deref(), "from")?,
        to: parse_date(params.to.as_deref(), "to")?,
    };

    let stats = state
        .db
        .category_totals(user.id, &filter)
        .map_err(AppError::from_core)?;

    Ok(Json(stats))
}
