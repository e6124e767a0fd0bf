use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Name the server certificate is checked against. Without it the
    /// certificate chain is still verified but the hostname is not.
    #[serde(default)]
    pub server_hostname: Option<String>,
}
