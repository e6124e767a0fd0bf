pub mod errors;
pub mod logging;
pub mod query;
pub mod root;
pub mod tls;

pub use errors::ConfigError;
pub use logging::LoggingConfig;
pub use query::QueryConfig;
pub use root::{CliOverrides, Config};
pub use tls::TlsConfig;
