//! Access Log Server Integration
//!
//! Wires the access log facility into an embedded axum server:
//! - `AccessLog` - resolved configuration, filter, and appenders (immutable)
//! - `RouterExt` - installs the middleware on a router
//! - `EmbeddedServer` - binds, installs connection info, and serves

mod integration;
pub mod middleware;

pub use integration::{basic_auth_user, resolve_peer, ConnectionInfo, PeerInfo};
pub use middleware::access_log_middleware;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use accesslog_core::{
    AccessEvent, AccessEventAppender, AccessLogConfig, AccessLogError, AccessLogSettings,
    AppenderRegistry, EventFilter, ProfileSet, ServerIntegration,
};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

struct AccessLogInner {
    source: String,
    filter: EventFilter,
    appenders: Vec<Arc<dyn AccessEventAppender>>,
    profiles: ProfileSet,
    integration: ServerIntegration,
    use_server_port: bool,
}

/// The installed access logging facility
///
/// Built once at startup and shared by every request; nothing in it is
/// mutated afterwards.
#[derive(Clone)]
pub struct AccessLog {
    inner: Arc<AccessLogInner>,
}

impl AccessLog {
    /// Resolve, parse, and assemble the facility.
    ///
    /// Returns `Ok(None)` when access logging is disabled by the settings or
    /// the configuration, or when no configuration is available at all.
    /// An explicit configuration that cannot be read is an error.
    pub fn initialize(
        settings: &AccessLogSettings,
        registry: &AppenderRegistry,
    ) -> Result<Option<Self>, AccessLogError> {
        if !settings.enabled {
            info!("[AccessLog] Disabled by settings");
            return Ok(None);
        }

        let handle = match settings.locator().resolve(settings.config.as_deref()) {
            Ok(handle) => handle,
            Err(e) if e.is_recoverable() => {
                warn!("[AccessLog] {}; access logging disabled", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let location = handle.location();
        let text = handle.read_to_string()?;
        let config = AccessLogConfig::from_json(&location, &text)?;
        Self::from_config(config, &location, settings, registry)
    }

    /// Assemble the facility from an already parsed configuration
    pub fn from_config(
        config: AccessLogConfig,
        source: &str,
        settings: &AccessLogSettings,
        registry: &AppenderRegistry,
    ) -> Result<Option<Self>, AccessLogError> {
        if !config.enabled {
            info!("[AccessLog] Disabled by {}", source);
            return Ok(None);
        }

        let names = config.active_appenders(&settings.profiles);
        let appenders = registry.resolve(&names, config.pattern)?;
        let filter = EventFilter::from_config(&config);

        info!(
            "[AccessLog] Enabled from {} (profiles: {}, appenders: [{}], rules: {}, integration: {:?})",
            source,
            settings.profiles,
            names.join(", "),
            filter.len(),
            settings.integration
        );

        Ok(Some(Self {
            inner: Arc::new(AccessLogInner {
                source: source.to_string(),
                filter,
                appenders,
                profiles: settings.profiles.clone(),
                integration: settings.integration,
                use_server_port: settings.use_server_port,
            }),
        }))
    }

    /// Where the configuration came from
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    pub fn profiles(&self) -> &ProfileSet {
        &self.inner.profiles
    }

    pub fn integration(&self) -> ServerIntegration {
        self.inner.integration
    }

    pub fn use_server_port(&self) -> bool {
        self.inner.use_server_port
    }

    pub fn should_log(&self, event: &AccessEvent) -> bool {
        self.inner.filter.should_log(event, &self.inner.profiles)
    }

    /// Filter the event and hand it to every appender.
    ///
    /// Returns whether the event was emitted.
    pub fn emit(&self, event: &AccessEvent) -> bool {
        if !self.should_log(event) {
            return false;
        }
        for appender in &self.inner.appenders {
            appender.append(event);
        }
        true
    }
}

impl std::fmt::Debug for AccessLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessLog")
            .field("source", &self.inner.source)
            .field("profiles", &self.inner.profiles)
            .field("appenders", &self.inner.appenders.len())
            .field("rules", &self.inner.filter.len())
            .field("integration", &self.inner.integration)
            .finish()
    }
}

/// Installs the access log middleware on a router
pub trait RouterExt {
    /// Wrap every route (and the fallback) with the access log middleware.
    /// `None` leaves the router unchanged.
    fn with_access_log(self, access_log: Option<&AccessLog>) -> Self;
}

impl<S> RouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_access_log(self, access_log: Option<&AccessLog>) -> Self {
        match access_log {
            Some(access_log) => self.layer(axum::middleware::from_fn_with_state(
                access_log.clone(),
                access_log_middleware,
            )),
            None => self,
        }
    }
}

/// Embedded server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on (0 picks a free port)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// An axum application with the access log wired in
pub struct EmbeddedServer {
    config: ServerConfig,
    router: Router,
    access_log: Option<AccessLog>,
}

impl EmbeddedServer {
    /// Initialize the access log from `settings` and install it on `router`
    pub fn new(
        config: ServerConfig,
        router: Router,
        settings: &AccessLogSettings,
        registry: &AppenderRegistry,
    ) -> Result<Self, AccessLogError> {
        let access_log = AccessLog::initialize(settings, registry)?;
        Ok(Self::with_access_log(config, router, access_log))
    }

    /// Use an already initialized access log
    pub fn with_access_log(config: ServerConfig, router: Router, access_log: Option<AccessLog>) -> Self {
        let router = router.with_access_log(access_log.as_ref());
        Self {
            config,
            router,
            access_log,
        }
    }

    pub fn access_log(&self) -> Option<&AccessLog> {
        self.access_log.as_ref()
    }

    /// Bind `config.host:config.port` and serve in the background until
    /// `shutdown` completes. Returns the bound address (useful with port 0).
    pub async fn start<F>(
        self,
        shutdown: F,
    ) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<anyhow::Result<()>>)>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        info!(
            "[Server] Listening on {} (access log: {})",
            addr,
            self.access_log
                .as_ref()
                .map(|a| a.source().to_string())
                .unwrap_or_else(|| "disabled".to_string())
        );

        let handle =
            tokio::spawn(async move { serve_with_shutdown(listener, self.router, shutdown).await });
        Ok((addr, handle))
    }
}

/// Serve `router` with `ConnectionInfo` available to the middleware,
/// stopping gracefully when `shutdown` completes
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<ConnectionInfo>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    Ok(())
}
