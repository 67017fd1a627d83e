//! Access event - one completed HTTP request/response cycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured record describing one completed request/response cycle.
///
/// Built by the server integration once the response body length is known.
/// Filters and appenders only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// When the request was received
    pub timestamp: DateTime<Utc>,
    /// Host name the request was addressed to (e.g., "localhost")
    pub server_name: String,
    /// Port the request was received on
    pub local_port: u16,
    /// Protocol version (e.g., "HTTP/1.1")
    pub protocol: String,
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path without the query string
    pub request_uri: String,
    /// Query string including the leading `?`, or empty
    pub query_string: String,
    /// Request line as sent: "GET /text?query HTTP/1.1"
    pub request_url: String,
    pub remote_addr: String,
    pub remote_host: String,
    /// User name from basic authentication, if any
    pub remote_user: Option<String>,
    pub status_code: u16,
    /// Response body size in bytes
    pub content_length: u64,
    /// Time between receiving the request and completing the response
    pub elapsed_ms: u64,
    /// Name of the thread that completed the request
    pub thread_name: String,
}

impl AccessEvent {
    /// Build the request line from its parts
    pub fn request_line(method: &str, path_and_query: &str, protocol: &str) -> String {
        format!("{} {} {}", method, path_and_query, protocol)
    }

    /// Format a raw query (without `?`) the way events carry it
    pub fn format_query(query: Option<&str>) -> String {
        match query {
            Some(q) => format!("?{}", q),
            None => String::new(),
        }
    }

    /// Elapsed time in whole seconds
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_ms / 1000
    }

    /// NCSA common log line
    pub fn to_common_log(&self) -> String {
        format!(
            "{} - {} [{}] \"{}\" {} {}",
            self.remote_host,
            self.remote_user.as_deref().unwrap_or("-"),
            self.timestamp.format("%d/%b/%Y:%H:%M:%S %z"),
            self.request_url,
            self.status_code,
            self.content_length
        )
    }
}
