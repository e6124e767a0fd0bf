//! DNS over TCP (RFC 1035 §4.2.2, RFC 7766)
//!
//! Each message is prefixed with its length as a big-endian u16. Reads go
//! through [`read_exact`], which keeps reading until the promised byte count
//! has arrived and reports a peer that hangs up early as
//! [`QueryError::EndOfStream`].

use super::lease::Lease;
use super::{resolve_endpoints, Route};
use crate::dns::backend::{Backend, StreamSocket};
use crate::dns::message::{DecodeOptions, DnsQuery, Outgoing, Reply, ReplyDecoder};
use ferrous_query_domain::{compute_times, Deadline, QueryError};
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::debug;

pub const MAX_TCP_MESSAGE_SIZE: usize = 65535;

/// Options shared by TCP and TLS exchanges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamOptions {
    /// Budget for connecting and the whole exchange.
    pub timeout: Option<Duration>,
    pub ignore_trailing: bool,
}

impl StreamOptions {
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            raise_on_truncation: false,
            ignore_trailing: self.ignore_trailing,
        }
    }
}

/// Writes one length-prefixed message and returns the framed length and the
/// time the write completed.
pub async fn send_tcp<'q>(
    socket: &mut dyn StreamSocket,
    what: impl Into<Outgoing<'q>>,
    deadline: Deadline,
) -> Result<(usize, Instant), QueryError> {
    let wire = what.into().into_wire();
    if wire.len() > MAX_TCP_MESSAGE_SIZE {
        return Err(QueryError::MalformedMessage(format!(
            "Message too large for TCP framing: {} bytes (max {})",
            wire.len(),
            MAX_TCP_MESSAGE_SIZE
        )));
    }

    let mut framed = Vec::with_capacity(wire.len() + 2);
    framed.extend_from_slice(&(wire.len() as u16).to_be_bytes());
    framed.extend_from_slice(wire);

    socket.send_all(&framed, deadline.remaining()).await?;
    let sent_time = Instant::now();

    debug!(message_len = wire.len(), "TCP query sent");

    Ok((framed.len(), sent_time))
}

/// Reads exactly `count` bytes.
pub async fn read_exact(
    socket: &mut dyn StreamSocket,
    count: usize,
    deadline: Deadline,
) -> Result<Vec<u8>, QueryError> {
    let mut buf = Vec::with_capacity(count);
    while buf.len() < count {
        let chunk = socket.recv(count - buf.len(), deadline.remaining()).await?;
        if chunk.is_empty() {
            return Err(QueryError::EndOfStream {
                expected: count,
                received: buf.len(),
            });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Reads one length-prefixed message without decoding it.
pub async fn read_framed(
    socket: &mut dyn StreamSocket,
    deadline: Deadline,
) -> Result<Vec<u8>, QueryError> {
    let prefix = read_exact(socket, 2, deadline).await?;
    let length = u16::from_be_bytes([prefix[0], prefix[1]]) as usize;
    read_exact(socket, length, deadline).await
}

/// Reads and decodes one length-prefixed reply.
pub async fn receive_tcp(
    socket: &mut dyn StreamSocket,
    deadline: Deadline,
    decoder: &ReplyDecoder<'_>,
) -> Result<(Reply, Instant), QueryError> {
    let wire = read_framed(socket, deadline).await?;
    let received_time = Instant::now();

    debug!(response_len = wire.len(), "TCP response received");

    let reply = decoder.decode(&wire)?;
    Ok((reply, received_time))
}

/// Send, receive and match over an already connected stream. TLS exchanges
/// run through here too once their connection is up.
pub(crate) async fn exchange_stream(
    socket: &mut dyn StreamSocket,
    query: &DnsQuery,
    start: Instant,
    deadline: Deadline,
    options: &StreamOptions,
) -> Result<Reply, QueryError> {
    send_tcp(socket, query, deadline).await?;

    let decoder = ReplyDecoder::for_query(query, options.decode_options());
    let (mut reply, received_time) = receive_tcp(socket, deadline, &decoder).await?;
    reply.time = received_time.saturating_duration_since(start);

    if !reply.is_response_to(query) {
        return Err(QueryError::BadResponse(format!(
            "stream reply (id {}) does not answer query id {}",
            reply.id(),
            query.id()
        )));
    }

    Ok(reply)
}

/// Runs a stream exchange on a caller-owned socket.
///
/// The socket must already be connected: its peer is looked up first so a
/// half-open socket fails here instead of on a later write.
pub(crate) async fn exchange_borrowed(
    socket: &mut dyn StreamSocket,
    query: &DnsQuery,
    options: &StreamOptions,
) -> Result<Reply, QueryError> {
    let (start, deadline) = compute_times(options.timeout);
    let peer = socket.peer_addr()?;
    debug!(server = %peer, "Using caller-supplied stream socket");

    let mut lease = Lease::Borrowed(socket);
    let result = exchange_stream(lease.socket(), query, start, deadline, options).await;
    lease.release(result).await
}

/// Sends `query` to `server` over a new TCP connection, closed before this
/// returns.
pub async fn tcp(
    backend: &dyn Backend,
    query: &DnsQuery,
    server: IpAddr,
    route: &Route,
    options: &StreamOptions,
) -> Result<Reply, QueryError> {
    let (start, deadline) = compute_times(options.timeout);
    let endpoints = resolve_endpoints(server, route)?;

    let socket = backend
        .make_stream_socket(
            endpoints.family,
            endpoints.source,
            endpoints.destination,
            None,
            deadline.remaining(),
        )
        .await?;
    debug!(server = %endpoints.destination, "TCP connection established");

    let mut lease = Lease::Owned(socket);
    let result = exchange_stream(lease.socket(), query, start, deadline, options).await;
    lease.release(result).await
}

/// Sends `query` over a caller-owned, connected stream socket, which is left
/// open.
pub async fn tcp_with_socket(
    socket: &mut dyn StreamSocket,
    query: &DnsQuery,
    options: &StreamOptions,
) -> Result<Reply, QueryError> {
    exchange_borrowed(socket, query, options).await
}
