//! Startup settings for the access log facility
//!
//! Settings come from code (`Default` + field updates), from a serde source,
//! or from the process environment via `from_env`:
//!
//! | Variable                    | Field             |
//! |-----------------------------|-------------------|
//! | `ACCESSLOG_ENABLED`         | `enabled`         |
//! | `ACCESSLOG_CONFIG`          | `config`          |
//! | `ACCESSLOG_PROFILES`        | `profiles`        |
//! | `ACCESSLOG_INTEGRATION`     | `integration`     |
//! | `ACCESSLOG_USE_SERVER_PORT` | `use_server_port` |
//! | `ACCESSLOG_RESOURCE_ROOTS`  | `resource_roots`  |

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::ProfileSet;
use crate::locator::ConfigurationLocator;

/// How request attributes are derived from the connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerIntegration {
    /// Peer address comes from the socket
    #[default]
    Direct,
    /// Peer address and host come from `X-Forwarded-*` headers when present
    Forwarded,
}

impl FromStr for ServerIntegration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "forwarded" => Ok(Self::Forwarded),
            other => Err(format!("unknown server integration '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessLogSettings {
    pub enabled: bool,
    /// Explicit configuration location; disables the fallback search
    pub config: Option<String>,
    /// Active runtime profiles
    pub profiles: ProfileSet,
    pub integration: ServerIntegration,
    /// Report the port from the `Host` header instead of the local socket port
    pub use_server_port: bool,
    /// Directories searched for `classpath:` locations, in order
    pub resource_roots: Vec<PathBuf>,
}

impl Default for AccessLogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            config: None,
            profiles: ProfileSet::new(),
            integration: ServerIntegration::Direct,
            use_server_port: false,
            resource_roots: default_resource_roots(),
        }
    }
}

/// Current directory, then `./resources`
pub fn default_resource_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("."), PathBuf::from("resources")]
}

impl AccessLogSettings {
    /// Read settings from the environment, loading `.env` first if present
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(value) = lookup("ACCESSLOG_ENABLED") {
            settings.enabled = parse_bool("ACCESSLOG_ENABLED", &value, settings.enabled);
        }
        if let Some(value) = lookup("ACCESSLOG_CONFIG") {
            let value = value.trim();
            if !value.is_empty() {
                settings.config = Some(value.to_string());
            }
        }
        if let Some(value) = lookup("ACCESSLOG_PROFILES") {
            settings.profiles = ProfileSet::from_list(&value);
        }
        if let Some(value) = lookup("ACCESSLOG_INTEGRATION") {
            match value.parse() {
                Ok(integration) => settings.integration = integration,
                Err(e) => warn!("[Settings] ACCESSLOG_INTEGRATION: {}", e),
            }
        }
        if let Some(value) = lookup("ACCESSLOG_USE_SERVER_PORT") {
            settings.use_server_port =
                parse_bool("ACCESSLOG_USE_SERVER_PORT", &value, settings.use_server_port);
        }
        if let Some(value) = lookup("ACCESSLOG_RESOURCE_ROOTS") {
            let roots: Vec<PathBuf> = std::env::split_paths(&value).collect();
            if !roots.is_empty() {
                settings.resource_roots = roots;
            }
        }

        settings
    }

    pub fn with_config(mut self, location: impl Into<String>) -> Self {
        self.config = Some(location.into());
        self
    }

    pub fn with_profiles(mut self, profiles: ProfileSet) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_integration(mut self, integration: ServerIntegration) -> Self {
        self.integration = integration;
        self
    }

    pub fn with_resource_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.resource_roots = roots;
        self
    }

    /// Locator searching this configuration's resource roots
    pub fn locator(&self) -> ConfigurationLocator {
        ConfigurationLocator::new(self.resource_roots.clone())
    }
}

fn parse_bool(key: &str, value: &str, current: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        other => {
            warn!("[Settings] Ignoring {}={} (expected a boolean)", key, other);
            current
        }
    }
}
