//! HTTP request handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use viewer_guard::{BlockStats, CheckOutcome, EntryId, ListPage};

use crate::error::ApiResult;
use crate::state::AppState;
use crate::types::{
    BlockBody, BlockResponse, CheckBody, HealthResponse, ListQuery, UnblockAddressResponse,
    UnblockBody, UnblockResponse,
};

/// Handle GET /health - liveness probe.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Handle POST /block - create a block rule.
pub async fn block(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BlockBody>, JsonRejection>,
) -> ApiResult<Json<BlockResponse>> {
    let Json(body) = body?;
    let entry = state.guard().block(body.into())?;

    Ok(Json(BlockResponse {
        success: true,
        entry,
    }))
}

/// Handle POST /unblock/{id} - remove one rule.
pub async fn unblock_by_id(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u64>, PathRejection>,
) -> ApiResult<Json<UnblockResponse>> {
    let Path(id) = id?;
    let success = state.guard().unblock(EntryId(id))?;

    Ok(Json(UnblockResponse { success }))
}

/// Handle POST /unblock - remove rules for an address with an exact scope.
pub async fn unblock_by_address(
    State(state): State<Arc<AppState>>,
    body: Result<Json<UnblockBody>, JsonRejection>,
) -> ApiResult<Json<UnblockAddressResponse>> {
    let Json(body) = body?;
    let removed_count = state.guard().unblock_by_address(
        body.ip_address.as_deref().unwrap_or_default(),
        body.path_pattern.as_deref(),
        body.node_id,
    )?;

    Ok(Json(UnblockAddressResponse {
        success: true,
        removed_count,
    }))
}

/// Handle POST /check - decide whether a request is blocked.
pub async fn check(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CheckBody>, JsonRejection>,
) -> ApiResult<Json<CheckOutcome>> {
    let Json(body) = body?;
    Ok(Json(state.guard().check(body.into())?))
}

/// Handle GET / - page through rules, most recent first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<ListPage>> {
    let Query(query) = query?;
    let guard = state.guard();
    let per_page = query.per_page(guard.config().default_per_page);

    Ok(Json(guard.list(query.page(), per_page)?))
}

/// Handle GET /stats - counts over active rules.
pub async fn stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<BlockStats>> {
    Ok(Json(state.guard().stats()?))
}
