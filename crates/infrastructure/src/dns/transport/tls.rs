//! DNS-over-TLS (RFC 7858)
//!
//! Framing and reply matching are the TCP exchange's; TLS only changes how
//! the connection is made. The context policy:
//! - an explicit [`TlsContext`] is used exactly as given;
//! - otherwise the system trust store is used, and the certificate is checked
//!   against the server hostname when one is given. Without a hostname the
//!   chain is still verified but the name is not, since there is nothing to
//!   check it against.

use super::lease::Lease;
use super::tcp::{exchange_borrowed, exchange_stream, StreamOptions};
use super::{resolve_endpoints, Route};
use crate::dns::backend::{Backend, StreamSocket, TlsConnect};
use crate::dns::message::{DnsQuery, Reply};
use ferrous_query_domain::{compute_times, QueryError, DEFAULT_TLS_PORT};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, Error, RootCertStore, SignatureScheme,
};
use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, LazyLock};
use tracing::debug;

fn system_roots() -> RootCertStore {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    root_store
}

/// System trust, hostname checked. Built once and shared by every exchange.
static SHARED_TLS_CONFIG: LazyLock<Arc<ClientConfig>> = LazyLock::new(|| {
    let config = ClientConfig::builder()
        .with_root_certificates(system_roots())
        .with_no_client_auth();
    Arc::new(config)
});

/// System trust, hostname not checked.
static NO_HOSTNAME_TLS_CONFIG: LazyLock<Result<Arc<ClientConfig>, QueryError>> =
    LazyLock::new(|| skip_hostname_config(system_roots()));

fn skip_hostname_config(roots: RootCertStore) -> Result<Arc<ClientConfig>, QueryError> {
    let inner = WebPkiServerVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|e| QueryError::Tls(format!("Failed to build certificate verifier: {}", e)))?;

    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(SkipHostnameVerification { inner }))
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Full chain and signature verification, minus the name check.
struct SkipHostnameVerification {
    inner: Arc<WebPkiServerVerifier>,
}

impl fmt::Debug for SkipHostnameVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SkipHostnameVerification")
    }
}

impl ServerCertVerifier for SkipHostnameVerification {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, Error> {
        match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Err(Error::InvalidCertificate(CertificateError::NotValidForName))
            | Err(Error::InvalidCertificate(CertificateError::NotValidForNameContext { .. })) => {
                Ok(ServerCertVerified::assertion())
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Client-side TLS settings for DNS-over-TLS connections.
#[derive(Clone)]
pub struct TlsContext {
    config: Arc<ClientConfig>,
    verify_hostname: bool,
}

impl TlsContext {
    /// System trust store; the hostname is verified only when one is given.
    pub fn system(server_hostname: Option<&str>) -> Result<Self, QueryError> {
        match server_hostname {
            Some(_) => Ok(Self {
                config: SHARED_TLS_CONFIG.clone(),
                verify_hostname: true,
            }),
            None => Ok(Self {
                config: NO_HOSTNAME_TLS_CONFIG.clone()?,
                verify_hostname: false,
            }),
        }
    }

    /// Custom trust store with the same hostname policy as [`TlsContext::system`].
    pub fn with_roots(
        roots: RootCertStore,
        server_hostname: Option<&str>,
    ) -> Result<Self, QueryError> {
        match server_hostname {
            Some(_) => Ok(Self {
                config: Arc::new(
                    ClientConfig::builder()
                        .with_root_certificates(roots)
                        .with_no_client_auth(),
                ),
                verify_hostname: true,
            }),
            None => Ok(Self {
                config: skip_hostname_config(roots)?,
                verify_hostname: false,
            }),
        }
    }

    /// A caller-built configuration, used as is.
    pub fn from_config(config: Arc<ClientConfig>) -> Self {
        Self {
            config,
            verify_hostname: true,
        }
    }

    pub fn config(&self) -> &Arc<ClientConfig> {
        &self.config
    }

    pub fn verifies_hostname(&self) -> bool {
        self.verify_hostname
    }
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("verify_hostname", &self.verify_hostname)
            .finish_non_exhaustive()
    }
}

/// Picks the context for a new connection: the explicit one untouched,
/// otherwise a system context for `server_hostname`.
pub fn resolve_tls_context(
    explicit: Option<TlsContext>,
    server_hostname: Option<&str>,
) -> Result<TlsContext, QueryError> {
    match explicit {
        Some(context) => Ok(context),
        None => TlsContext::system(server_hostname),
    }
}

/// SNI and verification name: the hostname when given, else the server IP.
fn server_name(
    server: IpAddr,
    server_hostname: Option<&str>,
) -> Result<ServerName<'static>, QueryError> {
    match server_hostname {
        Some(hostname) => ServerName::try_from(hostname.to_string()).map_err(|e| {
            QueryError::Tls(format!("Invalid TLS hostname '{}': {}", hostname, e))
        }),
        None => Ok(ServerName::from(server)),
    }
}

#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    pub stream: StreamOptions,
    /// Used as is when set; `server_hostname` then only names the server.
    pub context: Option<TlsContext>,
    pub server_hostname: Option<String>,
}

impl TlsOptions {
    /// Default route for DNS-over-TLS servers.
    pub fn route() -> Route {
        Route::to_port(DEFAULT_TLS_PORT)
    }
}

/// Sends `query` to `server` over a new TLS connection, closed before this
/// returns.
pub async fn tls(
    backend: &dyn Backend,
    query: &DnsQuery,
    server: IpAddr,
    route: &Route,
    options: &TlsOptions,
) -> Result<Reply, QueryError> {
    let (start, deadline) = compute_times(options.stream.timeout);
    let endpoints = resolve_endpoints(server, route)?;

    let hostname = options.server_hostname.as_deref();
    let context = resolve_tls_context(options.context.clone(), hostname)?;
    let connect = TlsConnect {
        config: context.config.clone(),
        server_name: server_name(server, hostname)?,
    };

    let socket = backend
        .make_stream_socket(
            endpoints.family,
            endpoints.source,
            endpoints.destination,
            Some(connect),
            deadline.remaining(),
        )
        .await?;
    debug!(
        server = %endpoints.destination,
        hostname = hostname.unwrap_or("-"),
        verify_hostname = context.verifies_hostname(),
        "TLS connection established"
    );

    let mut lease = Lease::Owned(socket);
    let result = exchange_stream(lease.socket(), query, start, deadline, &options.stream).await;
    lease.release(result).await
}

/// Sends `query` over a caller-owned TLS connection, which is left open.
pub async fn tls_with_socket(
    socket: &mut dyn StreamSocket,
    query: &DnsQuery,
    options: &StreamOptions,
) -> Result<Reply, QueryError> {
    exchange_borrowed(socket, query, options).await
}
