//! Spending report handler

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};

use clearspend_core::models::{CategoryTotal, Expense, ExpenseFilter};

use crate::{acting_user, AppError, AppState};

/// Number of detailed expenses included in a report
const REPORT_DETAIL_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Serialize)]
pub struct SpendingReport {
    pub total: f64,
    pub count: i64,
    pub by_category: Vec<CategoryTotal>,
    /// Most recent expenses in the period, newest first
    pub recent: Vec<Expense>,
}

/// GET /api/reports - Spending report for the acting user
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportQuery>,
    headers: HeaderMap,
) -> Result<Json<SpendingReport>, AppError> {
    let user = acting_user(&state, &headers)?;

    let parse = |value: Option<&str>, field: &str| match value {
        None => Ok(None),
        Some(raw) => chrono::DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&chrono::Utc)))
            .map_err(|_| AppError::bad_request(&format!("{} must be an RFC 3339 datetime", field))),
    };

    let filter = ExpenseFilter {
        category: None,
        from: parse(params.from.as_deref(), "from")?,
        to: parse(params.to.as_deref(), "to")?,
    };

    let stats = state
        .db
        .category_totals(user.id, &filter)
        .map_err(AppError::from_core)?;
    let recent = state
        .db
        .list_expenses(user.id, &filter, REPORT_DETAIL_LIMIT, 0)
        .map_err(AppError::from_core)?;

    Ok(Json(SpendingReport {
        total: stats.total,
        count: stats.count,
        by_category: stats.by_category,
        recent,
    }))
}
