//! Header construction, forwarding rules, and hop-by-hop stripping.
//!
//! [`ProxyRequestHelper`] is the pure transformation half of the pipeline:
//! it clones inbound headers, strips hop-by-hop and configured ignored
//! headers, rewrites `Host`, and adds proxy metadata (`X-Forwarded-For`,
//! `X-Real-IP`, `Via`, `X-Correlation-Id`). It performs no I/O of its own.
//!
//! [`HeaderProvider`] is the seam for the header-injection stage:
//! [`ApplicationHeaderProvider`] derives outbound headers from the resolved
//! instance's metadata plus configured static additions.

use std::collections::HashMap;
use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::GangwayError;
use crate::registry::ApplicationInstance;

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

pub struct ProxyRequestHelper {
    ignored: Vec<HeaderName>,
    trace_body: bool,
}

impl ProxyRequestHelper {
    /// Invalid names in the configured ignore list are logged and skipped
    /// rather than failing startup.
    #[must_use]
    pub fn new(ignored_headers: &[String], trace_body: bool) -> Self {
        let ignored = ignored_headers
            .iter()
            .filter_map(|name| match name.parse::<HeaderName>() {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    tracing::warn!(header = %name, "invalid name in proxy.ignored_headers, skipping");
                    None
                }
            })
            .collect();
        Self {
            ignored,
            trace_body,
        }
    }

    #[must_use]
    pub const fn should_trace_body(&self) -> bool {
        self.trace_body
    }

    /// Headers for the outbound call: inbound minus hop-by-hop and ignored,
    /// `Host` rewritten to the target, forwarded-chain metadata appended.
    #[must_use]
    pub fn build_outbound_headers(
        &self,
        original: &HeaderMap,
        client_ip: &str,
        target_url: &Url,
        correlation_id: &str,
    ) -> HeaderMap {
        let mut headers = original.clone();

        for name in HOP_BY_HOP.iter().chain(self.ignored.iter()) {
            headers.remove(name);
        }

        // Rewrite Host
        if let Some(host) = target_url.host_str() {
            let host_value = target_url
                .port()
                .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
            if let Ok(val) = HeaderValue::from_str(&host_value) {
                headers.insert("host", val);
            }
        }

        // X-Forwarded-For: append to chain
        let xff = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map_or_else(
                || client_ip.to_string(),
                |existing| format!("{existing}, {client_ip}"),
            );
        if let Ok(val) = HeaderValue::from_str(&xff) {
            headers.insert("x-forwarded-for", val);
        }

        // X-Real-IP (first IP in chain)
        let real_ip = xff.split(',').next().unwrap_or(client_ip).trim();
        if let Ok(val) = HeaderValue::from_str(real_ip) {
            headers.insert("x-real-ip", val);
        }

        // X-Forwarded-Proto
        let proto = if target_url.scheme() == "https" {
            "https"
        } else {
            "http"
        };
        if let Ok(val) = HeaderValue::from_str(proto) {
            headers.insert("x-forwarded-proto", val);
        }

        // X-Forwarded-Host (original Host the client targeted)
        if let Some(original_host) = original.get("host") {
            headers.insert("x-forwarded-host", original_host.clone());
        }

        // Via
        if let Ok(val) = HeaderValue::from_str("1.1 gangway") {
            headers.insert("via", val);
        }

        // Correlation ID
        if let Ok(val) = HeaderValue::from_str(correlation_id) {
            headers.insert("x-correlation-id", val);
        }

        headers
    }

    /// Strip hop-by-hop and ignored headers from an upstream response
    /// before it is returned to the caller.
    pub fn strip_response_headers(&self, headers: &mut HeaderMap) {
        for name in HOP_BY_HOP.iter().chain(self.ignored.iter()) {
            headers.remove(name);
        }
    }
}

/// Computes the extra headers the header-injection stage attaches to an
/// outbound call, from the resolved instance's registry metadata.
pub trait HeaderProvider: Send + Sync {
    fn headers_for(&self, instance: &ApplicationInstance) -> Result<HeaderMap, GangwayError>;
}

/// Default provider: application id and version headers plus any static
/// additions from `proxy.add_headers`.
pub struct ApplicationHeaderProvider {
    extra: Vec<(HeaderName, HeaderValue)>,
}

impl ApplicationHeaderProvider {
    #[must_use]
    pub fn new(add_headers: &HashMap<String, String>) -> Self {
        let extra = add_headers
            .iter()
            .filter_map(|(key, value)| {
                match (key.parse::<HeaderName>(), HeaderValue::from_str(value)) {
                    (Ok(name), Ok(val)) => Some((name, val)),
                    _ => {
                        tracing::warn!(header = %key, "invalid name or value in proxy.add_headers, skipping");
                        None
                    }
                }
            })
            .collect();
        Self { extra }
    }
}

impl HeaderProvider for ApplicationHeaderProvider {
    fn headers_for(&self, instance: &ApplicationInstance) -> Result<HeaderMap, GangwayError> {
        let mut headers = HeaderMap::new();

        let id = HeaderValue::from_str(&instance.id).map_err(|e| GangwayError::HttpRequest {
            source: Box::new(e),
        })?;
        headers.insert("x-application-id", id);

        if let Some(ref version) = instance.version {
            if let Ok(val) = HeaderValue::from_str(version) {
                headers.insert("x-application-version", val);
            }
        }

        for (name, value) in &self.extra {
            headers.insert(name.clone(), value.clone());
        }

        Ok(headers)
    }
}
