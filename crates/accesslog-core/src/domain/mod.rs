//! Domain entities

mod config;
mod event;
mod profile;

pub use config::{AccessLogConfig, SectionConfig};
pub use event::AccessEvent;
pub use profile::{ProfileParseError, ProfilePredicate, ProfileSet};
