//! Appenders - sinks that receive emitted access events

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::AccessEvent;
use crate::error::{AccessLogError, Result};

/// Name of the built-in appender that writes through `tracing`
pub const CONSOLE_APPENDER: &str = "console";

/// Receives events that passed the filter.
///
/// Called concurrently from request-handling tasks; implementations
/// serialize their own writes.
pub trait AccessEventAppender: Send + Sync {
    fn append(&self, event: &AccessEvent);
}

/// Line format used by the console appender
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogPattern {
    /// NCSA common log format
    #[default]
    Common,
    /// Common format plus elapsed time and thread name
    Detailed,
}

impl LogPattern {
    pub fn format(&self, event: &AccessEvent) -> String {
        match self {
            Self::Common => event.to_common_log(),
            Self::Detailed => format!(
                "{} {}ms [{}]",
                event.to_common_log(),
                event.elapsed_ms,
                event.thread_name
            ),
        }
    }
}

/// Writes each event as an INFO record on the `access_log` target
#[derive(Debug, Clone, Default)]
pub struct TracingAppender {
    pattern: LogPattern,
}

impl TracingAppender {
    pub fn new(pattern: LogPattern) -> Self {
        Self { pattern }
    }
}

impl AccessEventAppender for TracingAppender {
    fn append(&self, event: &AccessEvent) {
        info!(target: "access_log", "{}", self.pattern.format(event));
    }
}

/// In-memory FIFO of emitted events
#[derive(Debug, Default)]
pub struct QueueAppender {
    events: Mutex<VecDeque<AccessEvent>>,
}

impl QueueAppender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the oldest event
    pub fn pop(&self) -> Option<AccessEvent> {
        self.events.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn drain(&self) -> Vec<AccessEvent> {
        self.events.lock().drain(..).collect()
    }
}

impl AccessEventAppender for QueueAppender {
    fn append(&self, event: &AccessEvent) {
        self.events.lock().push_back(event.clone());
    }
}

/// Named appenders a configuration can refer to
#[derive(Clone, Default)]
pub struct AppenderRegistry {
    appenders: HashMap<String, Arc<dyn AccessEventAppender>>,
}

impl AppenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an appender under `name` (replaces a previous registration)
    pub fn register(mut self, name: impl Into<String>, appender: Arc<dyn AccessEventAppender>) -> Self {
        let name = name.into();
        debug!("[AccessLog] Registered appender '{}'", name);
        self.appenders.insert(name, appender);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        name == CONSOLE_APPENDER || self.appenders.contains_key(name)
    }

    /// Look up every name; `console` falls back to a `TracingAppender`
    /// unless registered explicitly.
    pub fn resolve(
        &self,
        names: &[String],
        pattern: LogPattern,
    ) -> Result<Vec<Arc<dyn AccessEventAppender>>> {
        names
            .iter()
            .map(|name| match self.appenders.get(name) {
                Some(appender) => Ok(appender.clone()),
                None if name == CONSOLE_APPENDER => {
                    Ok(Arc::new(TracingAppender::new(pattern)) as Arc<dyn AccessEventAppender>)
                }
                None => Err(AccessLogError::UnknownAppender(name.clone())),
            })
            .collect()
    }
}

impl std::fmt::Debug for AppenderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.appenders.keys().collect();
        names.sort();
        f.debug_struct("AppenderRegistry").field("appenders", &names).finish()
    }
}
