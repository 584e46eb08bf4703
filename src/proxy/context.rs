//! Per-request routing context.

use axum::http::HeaderMap;

use crate::route::Route;

/// Transient value created at the decoration stage and consumed by the
/// later pipeline stages. Carries the resolved route, the original path
/// and query, and the outbound headers accumulated by header injection.
/// Never shared across requests.
#[derive(Debug)]
pub struct RoutingContext {
    pub route: Route,
    pub original_path: String,
    pub query: Option<String>,
    pub outbound_headers: HeaderMap,
}

impl RoutingContext {
    #[must_use]
    pub fn new(route: Route, original_path: &str, query: Option<&str>) -> Self {
        Self {
            route,
            original_path: original_path.to_string(),
            query: query.map(String::from),
            outbound_headers: HeaderMap::new(),
        }
    }

    /// The backend-relative path after prefix stripping.
    #[must_use]
    pub fn forward_path(&self) -> &str {
        self.route.forward_path(&self.original_path)
    }
}
