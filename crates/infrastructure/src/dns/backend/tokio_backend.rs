//! Backend over tokio sockets, with tokio-rustls for DNS-over-TLS.

use super::{
    unsupported_family, with_timeout, Backend, Closable, DatagramSocket, StreamSocket, TlsConnect,
};
use async_trait::async_trait;
use ferrous_query_domain::{AddressFamily, Deadline, QueryError};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream, UdpSocket};
use tokio_rustls::client::TlsStream;
use tracing::debug;

/// Upper bound on a graceful shutdown. A TLS close_notify to a peer that has
/// stopped reading would otherwise wait forever.
pub const STREAM_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioBackend;

fn io_error(context: &str, e: std::io::Error) -> QueryError {
    QueryError::Io(format!("{}: {}", context, e))
}

#[async_trait]
impl Backend for TokioBackend {
    fn name(&self) -> &'static str {
        "tokio"
    }

    async fn make_datagram_socket(
        &self,
        family: AddressFamily,
        source: Option<SocketAddr>,
    ) -> Result<Box<dyn DatagramSocket>, QueryError> {
        unsupported_family(family)?;

        let bind_addr = match source {
            Some(source) => source,
            None => SocketAddr::new(family.wildcard()?, 0),
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| io_error(&format!("Failed to bind UDP socket to {}", bind_addr), e))?;

        Ok(Box::new(TokioDatagramSocket {
            socket: Some(socket),
            family,
        }))
    }

    async fn make_stream_socket(
        &self,
        family: AddressFamily,
        source: Option<SocketAddr>,
        destination: SocketAddr,
        tls: Option<TlsConnect>,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn StreamSocket>, QueryError> {
        let deadline = Deadline::after(Instant::now(), timeout);

        let socket = match family {
            AddressFamily::Inet => TcpSocket::new_v4(),
            AddressFamily::Inet6 => TcpSocket::new_v6(),
            AddressFamily::Other(raw) => {
                return Err(QueryError::NotImplemented(format!(
                    "unknown address family {}",
                    raw
                )))
            }
        }
        .map_err(|e| io_error("Failed to create TCP socket", e))?;

        if let Some(source) = source {
            socket
                .bind(source)
                .map_err(|e| io_error(&format!("Failed to bind TCP socket to {}", source), e))?;
        }

        let stream = with_timeout(
            deadline.remaining(),
            &format!("connecting to {}", destination),
            async {
                socket.connect(destination).await.map_err(|e| {
                    io_error(&format!("Connection to {} failed", destination), e)
                })
            },
        )
        .await?;

        stream
            .set_nodelay(true)
            .map_err(|e| io_error(&format!("Failed to set TCP_NODELAY on {}", destination), e))?;

        let connection = match tls {
            None => Connection::Plain(stream),
            Some(tls) => {
                let connector = tokio_rustls::TlsConnector::from(tls.config);
                let tls_stream = with_timeout(
                    deadline.remaining(),
                    &format!("TLS handshake with {}", destination),
                    async {
                        connector
                            .connect(tls.server_name, stream)
                            .await
                            .map_err(|e| {
                                QueryError::Tls(format!(
                                    "TLS handshake with {} failed: {}",
                                    destination, e
                                ))
                            })
                    },
                )
                .await?;
                debug!(server = %destination, "TLS connection established");
                Connection::Tls(Box::new(tls_stream))
            }
        };

        Ok(Box::new(TokioStreamSocket {
            connection: Some(connection),
        }))
    }
}

pub struct TokioDatagramSocket {
    socket: Option<UdpSocket>,
    family: AddressFamily,
}

impl TokioDatagramSocket {
    /// Wraps an already bound tokio socket, e.g. one shared by the caller.
    pub fn from_socket(socket: UdpSocket) -> Result<Self, QueryError> {
        let local = socket
            .local_addr()
            .map_err(|e| io_error("Failed to read local address", e))?;
        Ok(Self {
            socket: Some(socket),
            family: AddressFamily::of(local.ip()),
        })
    }

    fn socket(&self) -> Result<&UdpSocket, QueryError> {
        self.socket
            .as_ref()
            .ok_or_else(|| QueryError::Io("UDP socket is closed".to_string()))
    }
}

#[async_trait]
impl Closable for TokioDatagramSocket {
    async fn close(&mut self) -> Result<(), QueryError> {
        self.socket.take();
        Ok(())
    }
}

#[async_trait]
impl DatagramSocket for TokioDatagramSocket {
    fn family(&self) -> AddressFamily {
        self.family
    }

    async fn send_to(
        &self,
        data: &[u8],
        destination: SocketAddr,
        timeout: Option<Duration>,
    ) -> Result<usize, QueryError> {
        let socket = self.socket()?;
        with_timeout(timeout, &format!("sending UDP query to {}", destination), async {
            socket
                .send_to(data, destination)
                .await
                .map_err(|e| io_error(&format!("Failed to send UDP query to {}", destination), e))
        })
        .await
    }

    async fn recv_from(
        &self,
        max_size: usize,
        timeout: Option<Duration>,
    ) -> Result<(Vec<u8>, SocketAddr), QueryError> {
        let socket = self.socket()?;
        let mut buf = vec![0u8; max_size];
        let (received, from) = with_timeout(timeout, "waiting for UDP response", async {
            socket
                .recv_from(&mut buf)
                .await
                .map_err(|e| io_error("Failed to receive UDP response", e))
        })
        .await?;
        buf.truncate(received);
        Ok((buf, from))
    }
}

trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

enum Connection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection {
    fn io(&mut self) -> &mut dyn AsyncStream {
        match self {
            Connection::Plain(stream) => stream as &mut dyn AsyncStream,
            Connection::Tls(stream) => stream.as_mut() as &mut dyn AsyncStream,
        }
    }

    fn tcp(&self) -> &TcpStream {
        match self {
            Connection::Plain(stream) => stream,
            Connection::Tls(stream) => stream.get_ref().0,
        }
    }
}

pub struct TokioStreamSocket {
    connection: Option<Connection>,
}

impl TokioStreamSocket {
    /// Wraps a caller-owned plain TCP connection.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            connection: Some(Connection::Plain(stream)),
        }
    }

    /// Wraps a caller-owned TLS connection.
    pub fn from_tls(stream: TlsStream<TcpStream>) -> Self {
        Self {
            connection: Some(Connection::Tls(Box::new(stream))),
        }
    }

    fn connection(&mut self) -> Result<&mut Connection, QueryError> {
        self.connection
            .as_mut()
            .ok_or_else(|| QueryError::NotConnected("stream socket is closed".to_string()))
    }
}

#[async_trait]
impl Closable for TokioStreamSocket {
    async fn close(&mut self) -> Result<(), QueryError> {
        if let Some(mut connection) = self.connection.take() {
            let io = connection.io();
            with_timeout(Some(STREAM_CLOSE_TIMEOUT), "shutting down stream", async {
                io.shutdown()
                    .await
                    .map_err(|e| io_error("Failed to shut down stream", e))
            })
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StreamSocket for TokioStreamSocket {
    async fn send_all(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<(), QueryError> {
        let io = self.connection()?.io();
        with_timeout(timeout, "sending on stream", async {
            io.write_all(data)
                .await
                .map_err(|e| io_error("Failed to write DNS message", e))?;
            io.flush()
                .await
                .map_err(|e| io_error("Failed to flush stream", e))
        })
        .await
    }

    async fn recv(
        &mut self,
        max_size: usize,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, QueryError> {
        let io = self.connection()?.io();
        let mut buf = vec![0u8; max_size];
        let received = with_timeout(timeout, "reading from stream", async {
            io.read(&mut buf)
                .await
                .map_err(|e| io_error("Failed to read from stream", e))
        })
        .await?;
        buf.truncate(received);
        Ok(buf)
    }

    fn peer_addr(&self) -> Result<SocketAddr, QueryError> {
        let connection = self
            .connection
            .as_ref()
            .ok_or_else(|| QueryError::NotConnected("stream socket is closed".to_string()))?;
        connection
            .tcp()
            .peer_addr()
            .map_err(|e| QueryError::NotConnected(e.to_string()))
    }
}
