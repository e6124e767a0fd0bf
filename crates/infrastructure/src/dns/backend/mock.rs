//! In-memory backend for deterministic exchange tests.
//!
//! Datagrams and stream bytes are scripted up front; everything the exchange
//! sends is captured, and every socket created or closed is counted so tests
//! can check the ownership rules.
//!
//! # Example
//!
//! ```ignore
//! let backend = MockBackend::new();
//! backend.push_datagram(reply_bytes, "192.0.2.53:53".parse().unwrap());
//!
//! let server = "192.0.2.53".parse().unwrap();
//! let reply = udp(&backend, &query, server, &Route::default(), &options).await?;
//! assert_eq!(backend.sockets_closed(), 1);
//! ```

use super::{
    unsupported_family, with_timeout, Backend, Closable, DatagramSocket, StreamSocket, TlsConnect,
};
use async_trait::async_trait;
use ferrous_query_domain::{AddressFamily, QueryError};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One scripted step of the stream peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Bytes delivered to the reader, possibly across several reads.
    Data(Vec<u8>),
    /// The peer goes silent; the read only ends by timing out.
    Stall,
}

/// A stream connection requested from the backend.
#[derive(Debug, Clone)]
pub struct ConnectRecord {
    pub family: AddressFamily,
    pub source: Option<SocketAddr>,
    pub destination: SocketAddr,
    pub tls_server_name: Option<String>,
    pub timeout: Option<Duration>,
}

#[derive(Default)]
struct MockState {
    datagrams: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    stream_events: Mutex<VecDeque<StreamEvent>>,
    sent_datagrams: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    sent_stream: Mutex<Vec<Vec<u8>>>,
    datagram_binds: Mutex<Vec<(AddressFamily, Option<SocketAddr>)>>,
    connects: Mutex<Vec<ConnectRecord>>,
    datagram_sockets_created: AtomicUsize,
    stream_sockets_created: AtomicUsize,
    sockets_closed: AtomicUsize,
    refuse_connections: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a datagram that the next `recv_from` on any mock socket returns.
    pub fn push_datagram(&self, data: impl Into<Vec<u8>>, from: SocketAddr) {
        lock(&self.state.datagrams).push_back((data.into(), from));
    }

    /// Queues bytes for the stream peer to deliver.
    pub fn push_stream_data(&self, data: impl Into<Vec<u8>>) {
        lock(&self.state.stream_events).push_back(StreamEvent::Data(data.into()));
    }

    /// Queues a DNS message framed with its 2-byte length prefix.
    pub fn push_stream_message(&self, message: &[u8]) {
        let mut framed = (message.len() as u16).to_be_bytes().to_vec();
        framed.extend_from_slice(message);
        self.push_stream_data(framed);
    }

    pub fn push_stream_stall(&self) {
        lock(&self.state.stream_events).push_back(StreamEvent::Stall);
    }

    pub fn refuse_connections(&self) {
        self.state.refuse_connections.store(true, Ordering::Relaxed);
    }

    pub fn sent_datagrams(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        lock(&self.state.sent_datagrams).clone()
    }

    /// Every buffer handed to `send_all`, in order.
    pub fn sent_stream_data(&self) -> Vec<Vec<u8>> {
        lock(&self.state.sent_stream).clone()
    }

    pub fn datagram_binds(&self) -> Vec<(AddressFamily, Option<SocketAddr>)> {
        lock(&self.state.datagram_binds).clone()
    }

    pub fn connects(&self) -> Vec<ConnectRecord> {
        lock(&self.state.connects).clone()
    }

    pub fn datagram_sockets_created(&self) -> usize {
        self.state.datagram_sockets_created.load(Ordering::Relaxed)
    }

    pub fn stream_sockets_created(&self) -> usize {
        self.state.stream_sockets_created.load(Ordering::Relaxed)
    }

    pub fn sockets_closed(&self) -> usize {
        self.state.sockets_closed.load(Ordering::Relaxed)
    }

    /// A datagram socket owned by the test rather than by an exchange.
    pub fn datagram_socket(&self, family: AddressFamily) -> MockDatagramSocket {
        MockDatagramSocket {
            state: self.state.clone(),
            family,
        }
    }

    /// A connected stream socket owned by the test rather than by an exchange.
    pub fn stream_socket(&self, peer: SocketAddr) -> MockStreamSocket {
        MockStreamSocket {
            state: self.state.clone(),
            peer: Some(peer),
        }
    }

    /// A stream socket that was never connected.
    pub fn unconnected_stream_socket(&self) -> MockStreamSocket {
        MockStreamSocket {
            state: self.state.clone(),
            peer: None,
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn make_datagram_socket(
        &self,
        family: AddressFamily,
        source: Option<SocketAddr>,
    ) -> Result<Box<dyn DatagramSocket>, QueryError> {
        unsupported_family(family)?;
        lock(&self.state.datagram_binds).push((family, source));
        self.state
            .datagram_sockets_created
            .fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(self.datagram_socket(family)))
    }

    async fn make_stream_socket(
        &self,
        family: AddressFamily,
        source: Option<SocketAddr>,
        destination: SocketAddr,
        tls: Option<TlsConnect>,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn StreamSocket>, QueryError> {
        unsupported_family(family)?;
        lock(&self.state.connects).push(ConnectRecord {
            family,
            source,
            destination,
            tls_server_name: tls.map(|tls| tls.server_name.to_str().into_owned()),
            timeout,
        });

        if timeout.is_some_and(|budget| budget.is_zero()) {
            return Err(QueryError::Timeout(format!("connecting to {}", destination)));
        }
        if self.state.refuse_connections.load(Ordering::Relaxed) {
            return Err(QueryError::Io(format!(
                "Connection to {} failed: connection refused",
                destination
            )));
        }

        self.state
            .stream_sockets_created
            .fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(self.stream_socket(destination)))
    }
}

pub struct MockDatagramSocket {
    state: Arc<MockState>,
    family: AddressFamily,
}

#[async_trait]
impl Closable for MockDatagramSocket {
    async fn close(&mut self) -> Result<(), QueryError> {
        self.state.sockets_closed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl DatagramSocket for MockDatagramSocket {
    fn family(&self) -> AddressFamily {
        self.family
    }

    async fn send_to(
        &self,
        data: &[u8],
        destination: SocketAddr,
        timeout: Option<Duration>,
    ) -> Result<usize, QueryError> {
        with_timeout(timeout, &format!("sending UDP query to {}", destination), async {
            lock(&self.state.sent_datagrams).push((data.to_vec(), destination));
            Ok(data.len())
        })
        .await
    }

    async fn recv_from(
        &self,
        max_size: usize,
        timeout: Option<Duration>,
    ) -> Result<(Vec<u8>, SocketAddr), QueryError> {
        with_timeout(timeout, "waiting for UDP response", async {
            match lock(&self.state.datagrams).pop_front() {
                Some((mut data, from)) => {
                    data.truncate(max_size);
                    Ok((data, from))
                }
                None if timeout.is_some() => {
                    Err(QueryError::Timeout("waiting for UDP response".to_string()))
                }
                None => Err(QueryError::Io(
                    "no datagram scripted and no timeout set".to_string(),
                )),
            }
        })
        .await
    }
}

pub struct MockStreamSocket {
    state: Arc<MockState>,
    peer: Option<SocketAddr>,
}

#[async_trait]
impl Closable for MockStreamSocket {
    async fn close(&mut self) -> Result<(), QueryError> {
        self.state.sockets_closed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl StreamSocket for MockStreamSocket {
    async fn send_all(&mut self, data: &[u8], timeout: Option<Duration>) -> Result<(), QueryError> {
        with_timeout(timeout, "sending on stream", async {
            lock(&self.state.sent_stream).push(data.to_vec());
            Ok(())
        })
        .await
    }

    async fn recv(
        &mut self,
        max_size: usize,
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, QueryError> {
        with_timeout(timeout, "reading from stream", async {
            let mut events = lock(&self.state.stream_events);
            match events.pop_front() {
                // An exhausted script is a peer that hung up.
                None => Ok(Vec::new()),
                Some(StreamEvent::Stall) if timeout.is_some() => {
                    Err(QueryError::Timeout("reading from stream".to_string()))
                }
                Some(StreamEvent::Stall) => Err(QueryError::Io(
                    "stream stalled and no timeout set".to_string(),
                )),
                Some(StreamEvent::Data(mut data)) => {
                    if data.len() > max_size {
                        let rest = data.split_off(max_size);
                        events.push_front(StreamEvent::Data(rest));
                    }
                    Ok(data)
                }
            }
        })
        .await
    }

    fn peer_addr(&self) -> Result<SocketAddr, QueryError> {
        self.peer.ok_or_else(|| {
            QueryError::NotConnected("Transport endpoint is not connected".to_string())
        })
    }
}
