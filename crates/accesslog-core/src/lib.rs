//! # Accesslog Core Library
//!
//! Server-agnostic pieces of the access logging facility.
//!
//! ## Modules
//!
//! - `domain` - Access events, profiles, and the configuration file schema
//! - `locator` - Resolution of the configuration source (explicit, fallbacks, built-in)
//! - `filter` - Profile-scoped rules deciding which events get emitted
//! - `appender` - Sinks that receive emitted events
//! - `settings` - Startup settings (explicit path, active profiles, integration)

pub mod appender;
pub mod domain;
pub mod error;
pub mod filter;
pub mod locator;
pub mod settings;

// Re-export commonly used types
pub use appender::{
    AccessEventAppender, AppenderRegistry, LogPattern, QueueAppender, TracingAppender,
    CONSOLE_APPENDER,
};
pub use domain::*;
pub use error::{AccessLogError, Result};
pub use filter::{Decision, EventFilter, EventMatcher, FilterRule, ProfileGate};
pub use locator::{
    ConfigurationLocator, ResourceHandle, ResourceLocation, BUILTIN_CONFIG_NAME, FALLBACK_CONFIG_NAMES,
};
pub use settings::{AccessLogSettings, ServerIntegration};
