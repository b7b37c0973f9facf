//! Re-exports the logging configuration types owned by the domain layer
//! (`domain::models::config`) so the rest of `infrastructure::logging` has a
//! single local name to import, without the domain depending back on this
//! module.

pub use crate::domain::models::config::{LogFormat, LoggingConfig as LogConfig, RotationPolicy};
