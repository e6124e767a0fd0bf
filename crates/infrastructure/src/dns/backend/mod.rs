//! Socket backends.
//!
//! Exchanges never touch the operating system directly. They ask a
//! [`Backend`] for datagram and stream sockets and drive them through the
//! traits below, which lets the same exchange code run over tokio sockets or
//! the in-memory [`mock::MockBackend`].

pub mod mock;
pub mod tokio_backend;

use async_trait::async_trait;
use ferrous_query_domain::{AddressFamily, QueryError};
use rustls::pki_types::ServerName;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

pub use mock::MockBackend;
pub use tokio_backend::TokioBackend;

static DEFAULT_BACKEND: LazyLock<Arc<TokioBackend>> = LazyLock::new(|| Arc::new(TokioBackend));

/// Process-wide tokio backend.
pub fn default_backend() -> Arc<dyn Backend> {
    DEFAULT_BACKEND.clone()
}

#[async_trait]
pub trait Closable: Send {
    async fn close(&mut self) -> Result<(), QueryError>;
}

#[async_trait]
pub trait DatagramSocket: Closable + Sync {
    fn family(&self) -> AddressFamily;

    async fn send_to(
        &self,
        data: &[u8],
        destination: SocketAddr,
        timeout: Option<Duration>,
    ) -> Result<usize, QueryError>;

    async fn recv_from(
        &self,
        max_size: usize,
        timeout: Option<Duration>,
    ) -> Result<(Vec<u8>, SocketAddr), QueryError>;
}

#[async_trait]
pub trait StreamSocket: Closable {
    /// Writes all of `data`, retrying short writes internally.
    async fn send_all(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<(), QueryError>;

    /// Reads at most `max_size` bytes. An empty result means the peer closed.
    async fn recv(&mut self, max_size: usize, timeout: Option<Duration>)
        -> Result<Vec<u8>, QueryError>;

    /// Fails with [`QueryError::NotConnected`] on a socket without a peer.
    fn peer_addr(&self) -> Result<SocketAddr, QueryError>;
}

/// TLS parameters for a stream socket.
#[derive(Clone)]
pub struct TlsConnect {
    pub config: Arc<rustls::ClientConfig>,
    pub server_name: ServerName<'static>,
}

impl std::fmt::Debug for TlsConnect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnect")
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

/// Socket factory shared by concurrent exchanges.
#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Creates a datagram socket, bound to `source` when given.
    async fn make_datagram_socket(
        &self,
        family: AddressFamily,
        source: Option<SocketAddr>,
    ) -> Result<Box<dyn DatagramSocket>, QueryError>;

    /// Creates a stream socket connected to `destination` within `timeout`,
    /// wrapped in TLS when `tls` is given.
    async fn make_stream_socket(
        &self,
        family: AddressFamily,
        source: Option<SocketAddr>,
        destination: SocketAddr,
        tls: Option<TlsConnect>,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn StreamSocket>, QueryError>;
}

/// Runs `operation` within `timeout`.
///
/// A zero budget fails before `operation` is polled, so an expired deadline
/// never lets an already-ready read slip through.
pub async fn with_timeout<T, F>(
    timeout: Option<Duration>,
    what: &str,
    operation: F,
) -> Result<T, QueryError>
where
    F: Future<Output = Result<T, QueryError>>,
{
    match timeout {
        None => operation.await,
        Some(budget) if budget.is_zero() => Err(QueryError::Timeout(what.to_string())),
        Some(budget) => tokio::time::timeout(budget, operation)
            .await
            .map_err(|_| QueryError::Timeout(what.to_string()))?,
    }
}

pub(crate) fn unsupported_family(family: AddressFamily) -> Result<(), QueryError> {
    match family {
        AddressFamily::Other(raw) => Err(QueryError::NotImplemented(format!(
            "unknown address family {}",
            raw
        ))),
        _ => Ok(()),
    }
}
