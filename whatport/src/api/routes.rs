use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use crate::store_manager::StoreHandle;
use shared::protocol::{API_PREFIX, ROUTE_DESCRIBE, ROUTE_PORTS, ROUTE_STATUS};
use shared::types::{PortRecord, StoreStatus};

#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle,
}

#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    /// Substring match instead of exact match
    #[serde(default)]
    pub like: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DescribeResponse {
    pub protocol: String,
    pub description: String,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(ROUTE_PORTS, get(get_ports))
        .route(ROUTE_DESCRIBE, get(get_description))
        .route(ROUTE_STATUS, get(get_status));

    Router::new().nest(API_PREFIX, api).with_state(state)
}

async fn get_ports(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<LookupQuery>,
) -> Result<Json<Vec<PortRecord>>, StatusCode> {
    state
        .store
        .lookup(key, params.like)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("Failed to look up ports: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn get_description(
    State(state): State<AppState>,
    Path(protocol): Path<String>,
) -> Result<Json<DescribeResponse>, StatusCode> {
    let description = state
        .store
        .describe(protocol.clone())
        .await
        .map_err(|e| {
            tracing::error!("Failed to describe protocol: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(DescribeResponse { protocol, description }))
}

async fn get_status(State(state): State<AppState>) -> Result<Json<StoreStatus>, StatusCode> {
    state.store.status().await.map(Json).map_err(|e| {
        tracing::error!("Failed to read store status: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
