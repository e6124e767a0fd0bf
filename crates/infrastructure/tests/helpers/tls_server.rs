#![allow(dead_code)]
use super::dns_server_mock::serve_stream;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{RootCertStore, ServerConfig};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

pub const TLS_HOSTNAME: &str = "dns.test";

/// Loopback DNS-over-TLS server with a self-signed certificate for
/// [`TLS_HOSTNAME`].
pub struct MockTlsServer {
    addr: SocketAddr,
    certificate: CertificateDer<'static>,
    queries: Arc<AtomicUsize>,
}

impl MockTlsServer {
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        Self::spawn(true).await
    }

    /// Completes handshakes, then never reads from the connection again.
    pub async fn start_stalled() -> Result<Self, Box<dyn std::error::Error>> {
        Self::spawn(false).await
    }

    async fn spawn(answer: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let certified = rcgen::generate_simple_self_signed(vec![TLS_HOSTNAME.to_string()])?;
        let certificate = certified.cert.der().clone();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![certificate.clone()], key)?;
        let acceptor = TlsAcceptor::from(Arc::new(config));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let queries = Arc::new(AtomicUsize::new(0));

        let count = queries.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let count = count.clone();
                tokio::spawn(async move {
                    if let Ok(tls_stream) = acceptor.accept(stream).await {
                        if answer {
                            serve_stream(tls_stream, count).await;
                        } else {
                            let _held = tls_stream;
                            std::future::pending::<()>().await;
                        }
                    }
                });
            }
        });

        Ok(Self {
            addr,
            certificate,
            queries,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Trust store holding only this server's certificate.
    pub fn roots(&self) -> RootCertStore {
        let mut roots = RootCertStore::empty();
        let _ = roots.add(self.certificate.clone());
        roots
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}
