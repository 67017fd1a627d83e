//! Server integration - how request attributes are read from the connection
//!
//! The strategy is picked explicitly through `ServerIntegration` instead of
//! being detected from the runtime environment.

use std::net::SocketAddr;

use accesslog_core::ServerIntegration;
use axum::extract::connect_info::Connected;
use axum::http::{header, HeaderMap, Uri};
use axum::serve::IncomingStream;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::net::TcpListener;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Socket addresses of an accepted connection
///
/// Installed by `serve_with_shutdown` through axum's connect-info machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub remote: SocketAddr,
    pub local: Option<SocketAddr>,
}

impl Connected<IncomingStream<'_, TcpListener>> for ConnectionInfo {
    fn connect_info(stream: IncomingStream<'_, TcpListener>) -> Self {
        Self {
            remote: *stream.remote_addr(),
            local: stream.io().local_addr().ok(),
        }
    }
}

/// Peer and server attributes resolved for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub remote_addr: String,
    pub remote_host: String,
    pub server_name: String,
    /// Port the client addressed (from the `Host` header)
    pub server_port: Option<u16>,
    /// Port of the local socket
    pub local_port: Option<u16>,
}

impl PeerInfo {
    /// Port to report on the event
    pub fn port(&self, use_server_port: bool) -> u16 {
        let (first, second) = if use_server_port {
            (self.server_port, self.local_port)
        } else {
            (self.local_port, self.server_port)
        };
        first.or(second).unwrap_or(0)
    }
}

/// Resolve peer attributes according to the integration strategy
pub fn resolve_peer(
    integration: ServerIntegration,
    headers: &HeaderMap,
    uri: &Uri,
    connection: Option<&ConnectionInfo>,
) -> PeerInfo {
    let host_header = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(split_host_port);
    let (mut server_name, server_port) = match (host_header, uri.host()) {
        (Some((host, port)), _) => (host, port),
        (None, Some(host)) => (host.to_string(), uri.port_u16()),
        (None, None) => (
            connection
                .and_then(|c| c.local)
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "localhost".to_string()),
            None,
        ),
    };

    let mut remote_addr = connection
        .map(|c| c.remote.ip().to_string())
        .unwrap_or_else(|| "-".to_string());

    if integration == ServerIntegration::Forwarded {
        if let Some(client) = first_header_value(headers, X_FORWARDED_FOR) {
            remote_addr = client;
        }
        if let Some(host) = first_header_value(headers, X_FORWARDED_HOST) {
            server_name = split_host_port(&host).0;
        }
    }

    PeerInfo {
        remote_host: remote_addr.clone(),
        remote_addr,
        server_name,
        server_port,
        local_port: connection.and_then(|c| c.local).map(|addr| addr.port()),
    }
}

/// User name from `Authorization: Basic ...`, if present and well-formed
pub fn basic_auth_user(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credentials) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(credentials.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let user = decoded.split(':').next()?;
    (!user.is_empty()).then(|| user.to_string())
}

/// First comma-separated entry of a header
fn first_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Split "host:port" / "[::1]:port" / "host"
fn split_host_port(value: &str) -> (String, Option<u16>) {
    let value = value.trim();
    if let Some(rest) = value.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (host.to_string(), port);
        }
    }
    match value.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (value.to_string(), None),
        },
        _ => (value.to_string(), None),
    }
}
