//! Domain layer: core models, ports (traits), and errors.
//!
//! Nothing in this module depends on a concrete adapter; infrastructure
//! implements the traits declared in `ports`.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{CoreError, CoreResult};
