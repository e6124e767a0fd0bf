#![allow(dead_code)]
use super::builders::{frame, ReplyBuilder};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::oneshot;

pub const ANSWER_IP: [u8; 4] = [93, 184, 216, 34];

/// How the UDP side of [`MockDnsServer`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdpBehavior {
    Answer,
    /// TC bit set and no answers, pushing the client to TCP.
    Truncate,
    /// Never reply.
    Silent,
}

/// Loopback DNS server answering on UDP and TCP on the same port.
pub struct MockDnsServer {
    addr: SocketAddr,
    udp_queries: Arc<AtomicUsize>,
    tcp_queries: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockDnsServer {
    pub async fn start(behavior: UdpBehavior) -> Result<Self, std::io::Error> {
        let (udp, tcp) = bind_pair().await?;
        let addr = udp.local_addr()?;

        let udp_queries = Arc::new(AtomicUsize::new(0));
        let tcp_queries = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let udp_count = udp_queries.clone();
        let tcp_count = tcp_queries.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        break;
                    }
                    result = udp.recv_from(&mut buf) => {
                        if let Ok((len, peer)) = result {
                            udp_count.fetch_add(1, Ordering::SeqCst);
                            if let Some(response) = udp_response(&buf[..len], behavior) {
                                let _ = udp.send_to(&response, peer).await;
                            }
                        }
                    }
                    result = tcp.accept() => {
                        if let Ok((stream, _)) = result {
                            let count = tcp_count.clone();
                            tokio::spawn(serve_stream(stream, count));
                        }
                    }
                }
            }
        });

        Ok(Self {
            addr,
            udp_queries,
            tcp_queries,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn udp_queries(&self) -> usize {
        self.udp_queries.load(Ordering::SeqCst)
    }

    pub fn tcp_queries(&self) -> usize {
        self.tcp_queries.load(Ordering::SeqCst)
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockDnsServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn bind_pair() -> Result<(UdpSocket, TcpListener), std::io::Error> {
    let mut last_error = None;
    for _ in 0..20 {
        let udp = UdpSocket::bind("127.0.0.1:0").await?;
        let port = udp.local_addr()?.port();
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(tcp) => return Ok((udp, tcp)),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.unwrap_or_else(|| std::io::Error::other("no free port pair")))
}

fn udp_response(query: &[u8], behavior: UdpBehavior) -> Option<Vec<u8>> {
    if query.len() < 12 {
        return None;
    }
    match behavior {
        UdpBehavior::Answer => Some(ReplyBuilder::to(query).answer_a(ANSWER_IP).build()),
        UdpBehavior::Truncate => Some(ReplyBuilder::to(query).truncated().build()),
        UdpBehavior::Silent => None,
    }
}

/// Answers length-prefixed queries on one connection until the client
/// closes it.
pub async fn serve_stream<S>(mut stream: S, count: Arc<AtomicUsize>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let mut len_buf = [0u8; 2];
        if stream.read_exact(&mut len_buf).await.is_err() {
            break;
        }
        let mut query = vec![0u8; u16::from_be_bytes(len_buf) as usize];
        if stream.read_exact(&mut query).await.is_err() {
            break;
        }
        count.fetch_add(1, Ordering::SeqCst);

        if query.len() < 12 {
            break;
        }
        let response = ReplyBuilder::to(&query).answer_a(ANSWER_IP).build();
        if stream.write_all(&frame(&response)).await.is_err() {
            break;
        }
        let _ = stream.flush().await;
    }
}

/// TCP server that writes a fixed byte string to each connection and then
/// closes it, whatever the client sent.
pub struct ScriptedStreamServer {
    addr: SocketAddr,
}

impl ScriptedStreamServer {
    pub async fn start(script: Vec<u8>) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut len_buf = [0u8; 2];
                let _ = stream.read_exact(&mut len_buf).await;
                let mut query = vec![0u8; u16::from_be_bytes(len_buf) as usize];
                let _ = stream.read_exact(&mut query).await;

                let _ = stream.write_all(&script).await;
                let _ = stream.shutdown().await;
            }
        });

        Ok(Self { addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// UDP socket that receives queries and never answers.
pub async fn silent_udp_server() -> Result<(UdpSocket, SocketAddr), std::io::Error> {
    let socket = UdpSocket::bind("127.0.0.1:0").await?;
    let addr = socket.local_addr()?;
    Ok((socket, addr))
}
