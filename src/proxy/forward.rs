//! Host forwarding: the terminal pipeline stage.
//!
//! Builds the outbound request from the routing context, issues it on the
//! shared pooled client, and streams the backend response to the caller.
//! Backend statuses (including errors) pass through verbatim; only
//! transport-level failures are translated — connect errors to 502 and
//! timeouts to 504, by the handler in [`super`]. Nothing here retries.
//!
//! When body tracing is enabled the response is collected instead of
//! streamed, since the trace sink needs the bytes.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use url::Url;

use crate::server::HttpClient;

use super::context::RoutingContext;
use super::headers::ProxyRequestHelper;
use super::trace::{RequestTrace, TraceSink};

/// Transport-level forwarding failure. Backend error statuses are not
/// errors here; they pass through as responses.
#[derive(Debug)]
pub enum ForwardError {
    Timeout { target: String },
    Upstream { target: String, message: String },
}

pub struct ForwardRequest<'a> {
    pub client: &'a HttpClient,
    pub helper: &'a ProxyRequestHelper,
    pub traces: Option<&'a dyn TraceSink>,
    pub ctx: &'a RoutingContext,
    pub method: &'a Method,
    pub inbound_headers: &'a HeaderMap,
    pub body: &'a Bytes,
    pub client_ip: &'a str,
    pub correlation_id: &'a str,
    pub timeout: Duration,
}

/// The outbound URL: target base joined with the stripped path and the
/// original query string.
fn build_target_url(ctx: &RoutingContext) -> Url {
    let mut target = ctx.route.instance.url.clone();
    let base = target.path().trim_end_matches('/').to_string();
    target.set_path(&format!("{base}{}", ctx.forward_path()));
    target.set_query(ctx.query.as_deref());
    target
}

pub async fn forward(req: ForwardRequest<'_>) -> Result<Response, ForwardError> {
    let target = build_target_url(req.ctx);
    let target_str = target.to_string();

    let mut outbound_headers = req.helper.build_outbound_headers(
        req.inbound_headers,
        req.client_ip,
        &target,
        req.correlation_id,
    );
    // Injected headers win on collision, nothing else is removed.
    for (name, value) in &req.ctx.outbound_headers {
        outbound_headers.insert(name, value.clone());
    }

    let mut builder = hyper::Request::builder()
        .method(req.method.clone())
        .uri(target_str.clone());
    for (name, value) in &outbound_headers {
        builder = builder.header(name, value);
    }
    let outbound = builder
        .body(Full::new(req.body.clone()))
        .map_err(|e| ForwardError::Upstream {
            target: target_str.clone(),
            message: e.to_string(),
        })?;

    let start = Instant::now();
    let result = tokio::time::timeout(req.timeout, req.client.request(outbound)).await;

    let response = match result {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            record_failure(&req, &target_str, start, &e.to_string());
            return Err(ForwardError::Upstream {
                target: target_str,
                message: e.to_string(),
            });
        }
        Err(_) => {
            record_failure(&req, &target_str, start, "request timed out");
            return Err(ForwardError::Timeout { target: target_str });
        }
    };

    let status = response.status();
    let (parts, upstream_body) = response.into_parts();
    let mut resp_headers = parts.headers;
    req.helper.strip_response_headers(&mut resp_headers);

    let body = if req.helper.should_trace_body() && req.traces.is_some() {
        // Tracing wants the bytes, so collect rather than stream.
        let collected = upstream_body
            .collect()
            .await
            .map_err(|e| ForwardError::Upstream {
                target: target_str.clone(),
                message: format!("body read error: {e}"),
            })?
            .to_bytes();
        record_success(&req, &target_str, start, status, Some(&collected));
        Body::from(collected)
    } else {
        record_success(&req, &target_str, start, status, None);
        Body::new(upstream_body)
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in &resp_headers {
        builder = builder.header(name, value);
    }
    Ok(builder
        .header("x-correlation-id", req.correlation_id)
        .body(body)
        .unwrap_or_else(|e| {
            tracing::error!(
                correlation_id = %req.correlation_id,
                error = %e,
                "failed to build response"
            );
            StatusCode::BAD_GATEWAY.into_response()
        }))
}

#[allow(clippy::cast_possible_truncation)]
fn record_success(
    req: &ForwardRequest<'_>,
    target: &str,
    start: Instant,
    status: StatusCode,
    response_body: Option<&Bytes>,
) {
    let Some(traces) = req.traces else { return };
    let trace_body = req.helper.should_trace_body();
    traces.record(RequestTrace {
        correlation_id: req.correlation_id.to_string(),
        method: req.method.to_string(),
        path: req.ctx.original_path.clone(),
        target: target.to_string(),
        status: Some(status.as_u16()),
        duration_ms: start.elapsed().as_millis() as u64,
        request_body: trace_body.then(|| String::from_utf8_lossy(req.body).into_owned()),
        response_body: response_body.map(|b| String::from_utf8_lossy(b).into_owned()),
        error: None,
    });
}

#[allow(clippy::cast_possible_truncation)]
fn record_failure(req: &ForwardRequest<'_>, target: &str, start: Instant, error: &str) {
    let Some(traces) = req.traces else { return };
    traces.record(RequestTrace {
        correlation_id: req.correlation_id.to_string(),
        method: req.method.to_string(),
        path: req.ctx.original_path.clone(),
        target: target.to_string(),
        status: None,
        duration_ms: start.elapsed().as_millis() as u64,
        request_body: None,
        response_body: None,
        error: Some(error.to_string()),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ApplicationInstance;
    use crate::route::Route;
    use std::sync::Arc;

    fn context(base_url: &str, path: &str, query: Option<&str>) -> RoutingContext {
        let instance = Arc::new(ApplicationInstance {
            id: "svc-a".into(),
            url: Url::parse(base_url).unwrap(),
            version: None,
            endpoints: None,
            healthy: true,
        });
        let route = Route {
            id: "svc-a".into(),
            prefix: "/api/applications/svc-a/".into(),
            instance,
            strip_prefix: true,
            strip_len: "/api/applications/svc-a/".len(),
        };
        RoutingContext::new(route, path, query)
    }

    #[test]
    fn target_url_joins_stripped_path() {
        let ctx = context(
            "http://10.0.0.5:8080",
            "/api/applications/svc-a/health",
            None,
        );
        assert_eq!(
            build_target_url(&ctx).as_str(),
            "http://10.0.0.5:8080/health"
        );
    }

    #[test]
    fn target_url_keeps_query() {
        let ctx = context(
            "http://10.0.0.5:8080",
            "/api/applications/svc-a/search",
            Some("q=up&limit=5"),
        );
        assert_eq!(
            build_target_url(&ctx).as_str(),
            "http://10.0.0.5:8080/search?q=up&limit=5"
        );
    }

    #[test]
    fn target_url_respects_backend_base_path() {
        let ctx = context(
            "http://10.0.0.5:8080/app/",
            "/api/applications/svc-a/health",
            None,
        );
        assert_eq!(
            build_target_url(&ctx).as_str(),
            "http://10.0.0.5:8080/app/health"
        );
    }

    #[test]
    fn bare_prefix_maps_to_backend_root() {
        let ctx = context("http://10.0.0.5:8080", "/api/applications/svc-a", None);
        assert_eq!(build_target_url(&ctx).as_str(), "http://10.0.0.5:8080/");
    }
}
