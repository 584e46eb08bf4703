//! Optional request/response trace collection.
//!
//! [`TraceSink`] is the collaborator the forwarding stage hands a
//! [`RequestTrace`] summary to when tracing is enabled. [`LogTraceSink`]
//! is the default implementation, emitting the summary as a structured
//! log event. Body fields are only populated when `proxy.trace_body` is
//! set, since capturing them forces the forwarding stage to collect the
//! response instead of streaming it.

#[derive(Debug)]
pub struct RequestTrace {
    pub correlation_id: String,
    pub method: String,
    pub path: String,
    pub target: String,
    pub status: Option<u16>,
    pub duration_ms: u64,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub error: Option<String>,
}

pub trait TraceSink: Send + Sync {
    fn record(&self, trace: RequestTrace);
}

pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn record(&self, trace: RequestTrace) {
        if let Some(ref error) = trace.error {
            tracing::warn!(
                correlation_id = %trace.correlation_id,
                method = %trace.method,
                path = %trace.path,
                target = %trace.target,
                duration_ms = trace.duration_ms,
                error = %error,
                "proxied request failed"
            );
        } else {
            tracing::info!(
                correlation_id = %trace.correlation_id,
                method = %trace.method,
                path = %trace.path,
                target = %trace.target,
                status = trace.status.unwrap_or(0),
                duration_ms = trace.duration_ms,
                request_body = trace.request_body.as_deref().unwrap_or(""),
                response_body = trace.response_body.as_deref().unwrap_or(""),
                "proxied request"
            );
        }
    }
}
