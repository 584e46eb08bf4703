//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the server
//! version, uptime, registry and route table state, and cumulative
//! request statistics.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub routes: RoutesHealth,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct RoutesHealth {
    pub registry: String,
    pub applications: usize,
    pub table_version: u64,
    pub table_size: usize,
    pub stale: bool,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let table = state.locator.snapshot().await;
    let applications = state
        .registry
        .list_instances()
        .await
        .map_or(0, |instances| instances.len());

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        routes: RoutesHealth {
            registry: state.registry.name().to_string(),
            applications,
            table_version: table.version(),
            table_size: table.len(),
            stale: state.locator.is_stale(),
        },
        stats: StatsResponse {
            requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
            requests_failed: state.stats.failed.load(Ordering::Relaxed),
        },
    })
}
