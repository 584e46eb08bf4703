//! Administrative route-listing endpoint.
//!
//! `GET /admin/routes` returns a read-only dump of the current route table
//! for operational inspection: the table version, whether a rebuild is
//! pending, and each route's prefix pattern and target.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct RoutesResponse {
    pub version: u64,
    pub stale: bool,
    pub routes: Vec<RouteEntry>,
}

#[derive(Serialize, Deserialize)]
pub struct RouteEntry {
    pub id: String,
    pub pattern: String,
    pub target: String,
    pub strip_prefix: bool,
}

pub async fn routes_handler(State(state): State<Arc<AppState>>) -> Json<RoutesResponse> {
    let table = state.locator.snapshot().await;

    let routes = table
        .routes()
        .iter()
        .map(|route| RouteEntry {
            id: route.id.clone(),
            pattern: format!("{}**", route.prefix),
            target: route.instance.url.to_string(),
            strip_prefix: route.strip_prefix,
        })
        .collect();

    Json(RoutesResponse {
        version: table.version(),
        stale: state.locator.is_stale(),
        routes,
    })
}
