//! Access log configuration document
//!
//! Parsed from JSON once at startup. Profile-gated sections attach extra
//! appenders and carry the enable/disable directives the filter is built from.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::profile::{ProfilePredicate, ProfileSet};
use crate::appender::LogPattern;
use crate::error::{AccessLogError, Result};
use crate::filter::Decision;

/// Access log configuration file
///
/// ```json
/// {
///   "appenders": ["console"],
///   "sections": [
///     { "profile": "prod", "enabled": false },
///     { "profile": "dev | test", "appenders": ["queue"] },
///     { "path_prefix": "/health", "enabled": false }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccessLogConfig {
    /// Install the access log at all
    pub enabled: bool,
    /// Decision when no section decides
    pub default: Decision,
    /// Appenders that receive every emitted event
    pub appenders: Vec<String>,
    /// Line format for the console appender
    pub pattern: LogPattern,
    /// Profile-scoped sections, evaluated in order
    pub sections: Vec<SectionConfig>,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default: Decision::Log,
            appenders: Vec::new(),
            pattern: LogPattern::Common,
            sections: Vec::new(),
        }
    }
}

/// A configuration section, optionally gated by a profile predicate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SectionConfig {
    /// Profile predicate (e.g. "dev | test"); absent means always active
    pub profile: Option<String>,
    /// Enable/disable directive for events this section matches
    pub enabled: Option<bool>,
    /// Extra appenders attached while the profile is active
    pub appenders: Vec<String>,
    pub path_prefix: Option<String>,
    /// Regular expression over the request path
    pub path_pattern: Option<String>,
    pub methods: Vec<String>,
    pub status_min: Option<u16>,
    pub status_max: Option<u16>,
}

impl SectionConfig {
    /// Parsed profile predicate; `Ok(None)` when the section is not gated
    pub fn predicate(&self) -> std::result::Result<Option<ProfilePredicate>, super::ProfileParseError> {
        self.profile.as_deref().map(ProfilePredicate::parse).transpose()
    }
}

impl AccessLogConfig {
    /// Parse a configuration document read from `location`
    pub fn from_json(location: &str, text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| AccessLogError::InvalidConfiguration {
            location: location.to_string(),
            source,
        })
    }

    /// Appender names in effect for the given profiles, without duplicates
    pub fn active_appenders(&self, profiles: &ProfileSet) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let scoped = self
            .sections
            .iter()
            .filter(|section| !section.appenders.is_empty())
            .filter(|section| match section.predicate() {
                Ok(None) => true,
                Ok(Some(predicate)) => predicate.matches(profiles),
                Err(e) => {
                    warn!(
                        "[AccessLog] Ignoring appenders [{}] of section with profile '{}': {}",
                        section.appenders.join(", "),
                        section.profile.as_deref().unwrap_or_default(),
                        e
                    );
                    false
                }
            })
            .flat_map(|section| section.appenders.iter());

        for name in self.appenders.iter().chain(scoped) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }

        if names.is_empty() {
            warn!("[AccessLog] No appenders active for profiles {}", profiles);
        }
        names
    }
}
