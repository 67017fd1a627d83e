//! Accesslog for axum
//!
//! Wires the access logging facility into an embedded axum server:
//! - Configuration resolution at startup (explicit location, fallbacks, built-in)
//! - Request/response middleware producing one access event per request
//! - Profile-scoped filtering and named appenders
//! - Tracing setup for the host application

pub mod logging;
pub mod server;

pub use logging::{init_tracing, LoggingConfig};
pub use server::{
    access_log_middleware, serve_with_shutdown, AccessLog, ConnectionInfo, EmbeddedServer,
    RouterExt, ServerConfig,
};

// Core types most applications need alongside the server integration
pub use accesslog_core::{
    AccessEvent, AccessEventAppender, AccessLogError, AccessLogSettings, AppenderRegistry,
    ProfileSet, QueueAppender, ServerIntegration,
};
