//! Configuration Locator
//!
//! Decides which configuration source the access log uses. An explicit
//! location is used as-is and never replaced by a fallback. Without one,
//! the fixed fallback list is walked in order and the first readable
//! resource wins; the built-in default closes the list unless disabled.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use url::Url;

use crate::error::{AccessLogError, Result};

/// Name of the configuration compiled into this crate
pub const BUILTIN_CONFIG_NAME: &str = "accesslog-default.json";

const BUILTIN_CONFIG: &str = include_str!("../resources/accesslog-default.json");

/// Well-known names searched under the resource roots, in priority order
pub const FALLBACK_CONFIG_NAMES: &[&str] = &["accesslog-test.json", "accesslog.json"];

const CLASSPATH_PREFIX: &str = "classpath:";
const FILE_PREFIX: &str = "file:";
const BUILTIN_PREFIX: &str = "builtin:";

/// A resource identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocation {
    /// Name looked up under each resource root
    Classpath(String),
    /// Filesystem path
    File(PathBuf),
    /// The configuration bundled with the library
    Builtin,
}

impl ResourceLocation {
    /// Parse `classpath:name`, `file:///path`, `builtin:` or a plain path
    pub fn parse(location: &str) -> Result<Self> {
        let location = location.trim();
        if location.is_empty() {
            return Err(AccessLogError::InvalidLocation(location.to_string()));
        }

        if let Some(name) = location.strip_prefix(CLASSPATH_PREFIX) {
            let name = name.trim_start_matches('/');
            if name.is_empty() {
                return Err(AccessLogError::InvalidLocation(location.to_string()));
            }
            return Ok(Self::Classpath(name.to_string()));
        }

        if location.starts_with(BUILTIN_PREFIX) {
            return Ok(Self::Builtin);
        }

        if location.starts_with(FILE_PREFIX) {
            let url = Url::parse(location)
                .map_err(|_| AccessLogError::InvalidLocation(location.to_string()))?;
            let path = url
                .to_file_path()
                .map_err(|_| AccessLogError::InvalidLocation(location.to_string()))?;
            return Ok(Self::File(path));
        }

        Ok(Self::File(PathBuf::from(location)))
    }
}

impl fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classpath(name) => write!(f, "{}{}", CLASSPATH_PREFIX, name),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Builtin => write!(f, "{}{}", BUILTIN_PREFIX, BUILTIN_CONFIG_NAME),
        }
    }
}

/// A resolved, readable configuration resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceHandle {
    File { location: String, path: PathBuf },
    Builtin,
}

impl ResourceHandle {
    /// Human-readable origin (used in log lines and errors)
    pub fn location(&self) -> String {
        match self {
            Self::File { location, .. } => location.clone(),
            Self::Builtin => ResourceLocation::Builtin.to_string(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Builtin => None,
        }
    }

    pub fn read_to_string(&self) -> Result<String> {
        match self {
            Self::File { location, path } => {
                std::fs::read_to_string(path).map_err(|source| AccessLogError::Io {
                    location: location.clone(),
                    source,
                })
            }
            Self::Builtin => Ok(BUILTIN_CONFIG.to_string()),
        }
    }
}

/// Resolves the configuration source once at startup
#[derive(Debug, Clone)]
pub struct ConfigurationLocator {
    roots: Vec<PathBuf>,
    builtin_default: bool,
}

impl ConfigurationLocator {
    /// Locator searching `roots` for the well-known fallback names
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            builtin_default: true,
        }
    }

    /// Do not fall back to the bundled configuration
    pub fn without_builtin_default(mut self) -> Self {
        self.builtin_default = false;
        self
    }

    /// The ordered candidate list for a resolution
    pub fn candidates(&self, explicit: Option<&str>) -> Result<Vec<ResourceLocation>> {
        if let Some(location) = explicit {
            return Ok(vec![ResourceLocation::parse(location)?]);
        }

        let mut candidates: Vec<ResourceLocation> = FALLBACK_CONFIG_NAMES
            .iter()
            .map(|name| ResourceLocation::Classpath(name.to_string()))
            .collect();
        if self.builtin_default {
            candidates.push(ResourceLocation::Builtin);
        }
        Ok(candidates)
    }

    /// Resolve the configuration source.
    ///
    /// Errors with `ConfigurationNotFound` when an explicit location is not
    /// readable, and with `NoConfigurationAvailable` when no fallback is.
    pub fn resolve(&self, explicit: Option<&str>) -> Result<ResourceHandle> {
        if let Some(location) = explicit {
            let parsed = ResourceLocation::parse(location)?;
            return match self.locate(&parsed) {
                Some(handle) => {
                    info!("[Locator] Using configured {}", handle.location());
                    Ok(handle)
                }
                None => Err(AccessLogError::ConfigurationNotFound {
                    location: location.to_string(),
                }),
            };
        }

        let candidates = self.candidates(None)?;
        for candidate in &candidates {
            if let Some(handle) = self.locate(candidate) {
                info!("[Locator] Using fallback {}", handle.location());
                return Ok(handle);
            }
        }

        Err(AccessLogError::NoConfigurationAvailable {
            searched: candidates.iter().map(ToString::to_string).collect(),
        })
    }

    /// Find a readable resource for one location
    pub fn locate(&self, location: &ResourceLocation) -> Option<ResourceHandle> {
        match location {
            ResourceLocation::Classpath(name) => self.roots.iter().find_map(|root| {
                let path = root.join(name);
                is_readable_file(&path).then(|| ResourceHandle::File {
                    location: location.to_string(),
                    path,
                })
            }),
            ResourceLocation::File(path) => {
                is_readable_file(path).then(|| ResourceHandle::File {
                    location: location.to_string(),
                    path: path.clone(),
                })
            }
            ResourceLocation::Builtin => Some(ResourceHandle::Builtin),
        }
    }
}

fn is_readable_file(path: &Path) -> bool {
    let readable = path.is_file() && File::open(path).is_ok();
    debug!("[Locator] Probing {} -> {}", path.display(), readable);
    readable
}
