//! Access Log Middleware
//!
//! Builds one `AccessEvent` per completed request/response cycle and hands
//! it to the facility. The response reaches the client unchanged. When its
//! size is not known up front the body is passed through a counting wrapper
//! and the event is emitted once the body ends or is dropped, so streaming
//! responses are delivered as they are produced.

use std::net::SocketAddr;
use std::task::Poll;

use accesslog_core::AccessEvent;
use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use futures::StreamExt;
use http_body_util::{BodyStream, StreamBody};
use tracing::{warn, Instrument, Span};

use super::integration::{basic_auth_user, resolve_peer, ConnectionInfo, PeerInfo};
use super::AccessLog;
use crate::logging::{RequestContext, RequestSpan};

/// Declared `Content-Length`, if any
fn declared_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Connection info from `serve_with_shutdown`, or the plain socket address axum installs
/// for `into_make_service_with_connect_info::<SocketAddr>()`
fn connection_info(request: &Request) -> Option<ConnectionInfo> {
    let extensions = request.extensions();
    extensions
        .get::<ConnectInfo<ConnectionInfo>>()
        .map(|ConnectInfo(info)| *info)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(remote)| ConnectionInfo {
                    remote: *remote,
                    local: None,
                })
        })
}

/// Everything known about a request once the response head is ready.
///
/// The event is emitted by `finish`, at the latest when this is dropped.
struct PendingEvent {
    access_log: AccessLog,
    ctx: RequestContext,
    peer: PeerInfo,
    remote_user: Option<String>,
    status: u16,
    span: Span,
    bytes: u64,
    emitted: bool,
}

impl PendingEvent {
    fn finish(&mut self) {
        if self.emitted {
            return;
        }
        self.emitted = true;
        let _entered = self.span.enter();

        let ctx = &self.ctx;
        let event = AccessEvent {
            timestamp: ctx.timestamp,
            server_name: self.peer.server_name.clone(),
            local_port: self.peer.port(self.access_log.use_server_port()),
            protocol: ctx.protocol.clone(),
            method: ctx.method.clone(),
            request_uri: ctx.path.clone(),
            query_string: AccessEvent::format_query(ctx.query.as_deref()),
            request_url: AccessEvent::request_line(&ctx.method, &ctx.path_and_query(), &ctx.protocol),
            remote_addr: self.peer.remote_addr.clone(),
            remote_host: self.peer.remote_host.clone(),
            remote_user: self.remote_user.take(),
            status_code: self.status,
            content_length: self.bytes,
            elapsed_ms: ctx.elapsed_ms(),
            thread_name: std::thread::current()
                .name()
                .unwrap_or("unnamed")
                .to_string(),
        };

        let emitted = self.access_log.emit(&event);
        RequestSpan::log_exit(ctx, self.status, self.bytes, emitted);
    }
}

impl Drop for PendingEvent {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Pass frames through unchanged while adding up data bytes; the event is
/// emitted when the body ends, fails, or is dropped by the server
fn counting_body(body: Body, mut pending: PendingEvent) -> Body {
    let mut frames = BodyStream::new(body);
    let stream = futures::stream::poll_fn(move |cx| {
        let next = frames.poll_next_unpin(cx);
        match &next {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    pending.bytes += data.len() as u64;
                }
            }
            Poll::Ready(Some(Err(e))) => {
                warn!("Response body failed after {} bytes: {}", pending.bytes, e);
                pending.finish();
            }
            Poll::Ready(None) => pending.finish(),
            Poll::Pending => {}
        }
        next
    });
    Body::new(StreamBody::new(stream))
}

/// Middleware that records an access event for every request
pub async fn access_log_middleware(
    State(access_log): State<AccessLog>,
    request: Request,
    next: Next,
) -> Response {
    let ctx = RequestContext::capture(&request);
    let connection = connection_info(&request);
    let peer = resolve_peer(
        access_log.integration(),
        request.headers(),
        request.uri(),
        connection.as_ref(),
    );
    let remote_user = basic_auth_user(request.headers());
    let span = RequestSpan::enter(&ctx);

    let response = next.run(request).instrument(span.clone()).await;

    let known_length = declared_content_length(response.headers())
        .or_else(|| response.body().size_hint().exact());
    let mut pending = PendingEvent {
        access_log,
        ctx,
        peer,
        remote_user,
        status: response.status().as_u16(),
        span,
        bytes: 0,
        emitted: false,
    };

    match known_length {
        Some(length) => {
            pending.bytes = length;
            pending.finish();
            response
        }
        None => {
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, counting_body(body, pending))
        }
    }
}
