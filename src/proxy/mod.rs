//! The request-processing pipeline.
//!
//! [`proxy_handler`] is the Axum fallback that receives every request not
//! claimed by the health or admin endpoints and runs it through three
//! ordered stages: decoration ([`crate::route::RouteLocator`] resolution
//! into a [`context::RoutingContext`]), header injection
//! ([`headers::HeaderProvider`]), and host forwarding ([`forward`]).
//! Decoration misses fall through to 404; header-injection failures are
//! best-effort and only logged; forwarding failures surface as gateway
//! errors.

pub mod context;
pub mod forward;
pub mod headers;
pub mod trace;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::server::AppState;

use context::RoutingContext;
use forward::{ForwardError, ForwardRequest};

pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path();
    let correlation_id = req_headers
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    // Decoration: resolve the path against the current table. A miss means
    // this request is not ours to proxy.
    let Some(route) = state.locator.resolve(path).await else {
        tracing::debug!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            "no route matched"
        );
        return StatusCode::NOT_FOUND.into_response();
    };

    tracing::info!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        application = %route.instance.id,
        "request routed"
    );

    let mut ctx = RoutingContext::new(route, path, uri.query());

    // Header injection: best-effort. A provider failure downgrades to
    // forwarding without the extra headers.
    match state.header_provider.headers_for(&ctx.route.instance) {
        Ok(injected) => {
            for (name, value) in &injected {
                ctx.outbound_headers.insert(name, value.clone());
            }
        }
        Err(e) => {
            tracing::warn!(
                correlation_id = %correlation_id,
                application = %ctx.route.instance.id,
                error = %e,
                "header provider failed, forwarding without injected headers"
            );
        }
    }

    // Host forwarding: the only stage whose failure terminates the request
    // with an error response.
    let client_ip = addr.ip().to_string();
    let request = ForwardRequest {
        client: &state.http_client,
        helper: &state.helper,
        traces: state.traces.as_deref(),
        ctx: &ctx,
        method: &method,
        inbound_headers: &req_headers,
        body: &body,
        client_ip: &client_ip,
        correlation_id: &correlation_id,
        timeout: Duration::from_millis(state.timeout_ms),
    };

    match forward::forward(request).await {
        Ok(response) => {
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            response
        }
        Err(ForwardError::Timeout { target }) => {
            tracing::error!(
                correlation_id = %correlation_id,
                target = %target,
                timeout_ms = state.timeout_ms,
                "backend timed out"
            );
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
        Err(ForwardError::Upstream { target, message }) => {
            tracing::error!(
                correlation_id = %correlation_id,
                target = %target,
                error = %message,
                "backend unreachable"
            );
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
