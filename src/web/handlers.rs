//! HTTP request handlers.

use super::AppState;
use crate::db::{DbError, NewSite, OutcomeLog, SiteDirectory};
use crate::scheduler::MonitorError;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;

const DEFAULT_CHECKS_LIMIT: u32 = 100;
const MAX_CHECKS_LIMIT: u32 = 1000;

fn db_error_response(e: DbError) -> Response {
    match e {
        DbError::NotFound => (StatusCode::NOT_FOUND, "Site not found").into_response(),
        DbError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
        other => {
            tracing::error!("Database error: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response()
        }
    }
}

pub async fn handle_health() -> impl IntoResponse {
    Json("OK")
}

// ============================================================================
// API: Sites
// ============================================================================

pub async fn handle_list_sites(State(state): State<AppState>) -> Response {
    match state.store.list_sites() {
        Ok(sites) => Json(sites).into_response(),
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_create_site(
    State(state): State<AppState>,
    Json(req): Json<NewSite>,
) -> Response {
    if let Err(e) = req.validate() {
        return (StatusCode::BAD_REQUEST, e).into_response();
    }

    match state.store.add_site(&req) {
        Ok(site) => {
            tracing::info!("Registered site {} ({})", site.name, site.id);
            (StatusCode::CREATED, Json(site)).into_response()
        }
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_update_site(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<NewSite>,
) -> Response {
    if let Err(e) = req.validate() {
        return (StatusCode::BAD_REQUEST, e).into_response();
    }

    // The scheduler picks the change up on its next tick.
    match state.store.update_site(id, &req) {
        Ok(site) => Json(site).into_response(),
        Err(e) => db_error_response(e),
    }
}

pub async fn handle_delete_site(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.delete_site(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => db_error_response(e),
    }
}

// ============================================================================
// API: Stats and history
// ============================================================================

pub async fn handle_site_stats(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.monitor.get_site_stats(id).await {
        Ok(stats) => Json(stats).into_response(),
        Err(MonitorError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, "Site not found").into_response()
        }
        Err(e) => {
            tracing::error!("Failed to compute stats for site {}: {}", id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Statistics for a single trailing window of `days` days (0 = lifetime).
pub async fn handle_site_window_stats(
    State(state): State<AppState>,
    Path((id, days)): Path<(i64, u32)>,
) -> Response {
    if let Err(e) = state.store.get_site(id) {
        return db_error_response(e);
    }

    match state.monitor.stats().stats_for(id, days) {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => db_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ChecksQuery {
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn handle_site_checks(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ChecksQuery>,
) -> Response {
    if let Err(e) = state.store.get_site(id) {
        return db_error_response(e);
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_CHECKS_LIMIT)
        .clamp(1, MAX_CHECKS_LIMIT);

    match state.store.recent_outcomes(id, limit) {
        Ok(checks) => Json(checks).into_response(),
        Err(e) => db_error_response(e),
    }
}
