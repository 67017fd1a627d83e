//! Event Filter - decides per request whether an access event is emitted
//!
//! Rules are built once from the configuration sections that carry an
//! `enabled` directive and are never mutated afterwards, so a single
//! `EventFilter` can be shared by every request-handling task.
//!
//! The first rule whose profile gate and matcher both accept the event
//! decides. When no rule applies the configured default is used, which is
//! `Decision::Log` unless the configuration says otherwise.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{AccessEvent, AccessLogConfig, ProfilePredicate, ProfileSet, SectionConfig};

/// Outcome of evaluating an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    #[default]
    Log,
    Skip,
}

impl Decision {
    fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Self::Log
        } else {
            Self::Skip
        }
    }
}

/// Profile condition attached to a rule
#[derive(Debug, Clone)]
pub enum ProfileGate {
    Always,
    When(ProfilePredicate),
    /// Malformed predicate: the rule never applies
    Never,
}

impl ProfileGate {
    fn admits(&self, active: &ProfileSet) -> bool {
        match self {
            Self::Always => true,
            Self::When(predicate) => predicate.matches(active),
            Self::Never => false,
        }
    }
}

/// Conditions over the event itself; unset fields match anything
#[derive(Debug, Clone, Default)]
pub struct EventMatcher {
    pub path_prefix: Option<String>,
    pub path_pattern: Option<Regex>,
    pub methods: Vec<String>,
    pub status_min: Option<u16>,
    pub status_max: Option<u16>,
}

impl EventMatcher {
    pub fn matches(&self, event: &AccessEvent) -> bool {
        if let Some(prefix) = &self.path_prefix {
            if !event.request_uri.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(pattern) = &self.path_pattern {
            if !pattern.is_match(&event.request_uri) {
                return false;
            }
        }
        if !self.methods.is_empty()
            && !self
                .methods
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&event.method))
        {
            return false;
        }
        if self.status_min.is_some_and(|min| event.status_code < min) {
            return false;
        }
        if self.status_max.is_some_and(|max| event.status_code > max) {
            return false;
        }
        true
    }
}

/// A single enable/disable directive with its conditions
#[derive(Debug, Clone)]
pub struct FilterRule {
    pub gate: ProfileGate,
    pub matcher: EventMatcher,
    pub decision: Decision,
}

impl FilterRule {
    pub fn new(gate: ProfileGate, decision: Decision) -> Self {
        Self {
            gate,
            matcher: EventMatcher::default(),
            decision,
        }
    }

    /// Rule gated by a profile expression; a malformed expression yields a
    /// rule that never applies.
    pub fn for_profile(expression: &str, decision: Decision) -> Self {
        let gate = match ProfilePredicate::parse(expression) {
            Ok(predicate) => ProfileGate::When(predicate),
            Err(e) => {
                warn!("[Filter] Ignoring rule with profile '{}': {}", expression, e);
                ProfileGate::Never
            }
        };
        Self::new(gate, decision)
    }

    /// Build a rule from a section; sections without a directive yield `None`
    pub fn from_section(section: &SectionConfig) -> Option<Self> {
        let enabled = section.enabled?;
        let decision = Decision::from_enabled(enabled);

        let mut rule = match &section.profile {
            Some(expression) => Self::for_profile(expression, decision),
            None => Self::new(ProfileGate::Always, decision),
        };

        let path_pattern = match section.path_pattern.as_deref().map(Regex::new).transpose() {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!("[Filter] Ignoring rule with invalid path pattern: {}", e);
                rule.gate = ProfileGate::Never;
                None
            }
        };

        rule.matcher = EventMatcher {
            path_prefix: section.path_prefix.clone(),
            path_pattern,
            methods: section.methods.clone(),
            status_min: section.status_min,
            status_max: section.status_max,
        };
        Some(rule)
    }

    pub fn applies(&self, event: &AccessEvent, active: &ProfileSet) -> bool {
        self.gate.admits(active) && self.matcher.matches(event)
    }
}

/// Ordered rule list plus the fallback decision
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    rules: Vec<FilterRule>,
    default: Decision,
}

impl EventFilter {
    pub fn new(rules: Vec<FilterRule>, default: Decision) -> Self {
        Self { rules, default }
    }

    pub fn from_config(config: &AccessLogConfig) -> Self {
        let rules = config
            .sections
            .iter()
            .filter_map(FilterRule::from_section)
            .collect();
        Self::new(rules, config.default)
    }

    pub fn decide(&self, event: &AccessEvent, active: &ProfileSet) -> Decision {
        self.rules
            .iter()
            .find(|rule| rule.applies(event, active))
            .map(|rule| rule.decision)
            .unwrap_or(self.default)
    }

    pub fn should_log(&self, event: &AccessEvent, active: &ProfileSet) -> bool {
        self.decide(event, active) == Decision::Log
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
