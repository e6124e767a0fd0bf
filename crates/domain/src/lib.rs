//! Ferrous Query Domain Layer
pub mod config;
pub mod deadline;
pub mod endpoint;
pub mod errors;

pub use config::{CliOverrides, Config, ConfigError};
pub use config::query::{DEFAULT_PORT, DEFAULT_TLS_PORT};
pub use deadline::{compute_times, Deadline};
pub use endpoint::AddressFamily;
pub use errors::QueryError;
