//! Request Context - what the middleware knows before the handler runs

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::Request;
use chrono::{DateTime, Utc};
use tracing::{debug, info_span, Span};

/// Global request counter for request IDs
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Short sequential ID used to correlate log lines of one request
pub fn next_request_id() -> u64 {
    REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed) + 1
}

/// Request attributes captured on entry
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: u64,
    pub method: String,
    /// Path without the query string
    pub path: String,
    /// Raw query (without `?`)
    pub query: Option<String>,
    /// Protocol version (e.g., "HTTP/1.1")
    pub protocol: String,
    pub timestamp: DateTime<Utc>,
    pub started_at: Instant,
}

impl RequestContext {
    pub fn capture(request: &Request) -> Self {
        let uri = request.uri();
        Self {
            request_id: next_request_id(),
            method: request.method().to_string(),
            path: uri.path().to_string(),
            query: uri.query().map(String::from),
            protocol: format!("{:?}", request.version()),
            timestamp: Utc::now(),
            started_at: Instant::now(),
        }
    }

    /// Path and query exactly as requested
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Span helpers for the access log middleware
pub struct RequestSpan;

impl RequestSpan {
    pub fn enter(ctx: &RequestContext) -> Span {
        info_span!(
            "access",
            request_id = ctx.request_id,
            method = %ctx.method,
            path = %ctx.path,
        )
    }

    pub fn log_exit(ctx: &RequestContext, status: u16, content_length: u64, emitted: bool) {
        debug!(
            request_id = ctx.request_id,
            emitted,
            "← {} {}B ({}ms)",
            status,
            content_length,
            ctx.elapsed_ms()
        );
    }
}
