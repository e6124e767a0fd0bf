//! DNS over UDP (RFC 1035 §4.2.1)
//!
//! Messages go out unframed, one datagram per query. The receive loop only
//! accepts a datagram from the address the query was sent to, except that a
//! query sent to a multicast group accepts replies from any member on the
//! group's port.

use super::lease::Lease;
use super::{resolve_endpoints, Route};
use crate::dns::backend::{Backend, DatagramSocket};
use crate::dns::message::{DecodeOptions, DnsQuery, Outgoing, Reply, ReplyDecoder};
use ferrous_query_domain::endpoint::{addresses_equal, is_multicast, low_level_address_tuple};
use ferrous_query_domain::{compute_times, AddressFamily, Deadline, QueryError};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Largest datagram the receive path accepts.
pub const MAX_UDP_MESSAGE_SIZE: usize = 65535;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UdpOptions {
    /// Budget for the whole exchange; `None` waits as long as the socket does.
    pub timeout: Option<Duration>,
    /// Drop datagrams from unexpected peers instead of failing.
    pub ignore_unexpected: bool,
    pub ignore_trailing: bool,
    /// Fail with [`QueryError::Truncated`] when the reply has the TC bit set.
    pub raise_on_truncation: bool,
}

impl UdpOptions {
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            raise_on_truncation: self.raise_on_truncation,
            ignore_trailing: self.ignore_trailing,
        }
    }
}

/// Sends one datagram and returns the byte count and the time the send
/// completed.
pub async fn send_udp<'q>(
    socket: &dyn DatagramSocket,
    what: impl Into<Outgoing<'q>>,
    destination: SocketAddr,
    deadline: Deadline,
) -> Result<(usize, Instant), QueryError> {
    let wire = what.into().into_wire();
    let bytes_sent = socket
        .send_to(wire, destination, deadline.remaining())
        .await?;
    let sent_time = Instant::now();

    debug!(server = %destination, bytes_sent, "UDP query sent");

    Ok((bytes_sent, sent_time))
}

fn accepts_source(family: AddressFamily, expected: SocketAddr, from: SocketAddr) -> bool {
    if addresses_equal(family, expected, from) {
        return true;
    }
    is_multicast(expected.ip()) && expected.port() == from.port()
}

/// Reads datagrams until one arrives from `expected`, then decodes it.
///
/// A datagram from anyone else fails the exchange with
/// [`QueryError::UnexpectedSource`], or is dropped when `ignore_unexpected`
/// is set.
pub async fn receive_udp(
    socket: &dyn DatagramSocket,
    expected: SocketAddr,
    deadline: Deadline,
    ignore_unexpected: bool,
    decoder: &ReplyDecoder<'_>,
) -> Result<(Reply, Instant), QueryError> {
    let family = socket.family();

    let wire = loop {
        let (wire, from) = socket
            .recv_from(MAX_UDP_MESSAGE_SIZE, deadline.remaining())
            .await?;

        if accepts_source(family, expected, from) {
            break wire;
        }
        if !ignore_unexpected {
            return Err(QueryError::UnexpectedSource {
                expected,
                received: from,
            });
        }
        warn!(
            expected = %expected,
            received_from = %from,
            bytes = wire.len(),
            "Ignoring UDP datagram from unexpected source"
        );
    };
    let received_time = Instant::now();

    debug!(server = %expected, bytes_received = wire.len(), "UDP response received");

    let reply = decoder.decode(&wire)?;
    Ok((reply, received_time))
}

async fn exchange(
    socket: &dyn DatagramSocket,
    query: &DnsQuery,
    destination: SocketAddr,
    start: Instant,
    deadline: Deadline,
    options: &UdpOptions,
) -> Result<Reply, QueryError> {
    send_udp(socket, query, destination, deadline).await?;

    let decoder = ReplyDecoder::for_query(query, options.decode_options());
    let (mut reply, received_time) = receive_udp(
        socket,
        destination,
        deadline,
        options.ignore_unexpected,
        &decoder,
    )
    .await?;
    reply.time = received_time.saturating_duration_since(start);

    if !reply.is_response_to(query) {
        return Err(QueryError::BadResponse(format!(
            "UDP reply from {} (id {}) does not answer query id {}",
            destination,
            reply.id(),
            query.id()
        )));
    }

    Ok(reply)
}

/// Sends `query` to `server` over a new UDP socket.
///
/// The socket is bound per `route` and closed before this returns, whatever
/// the outcome.
pub async fn udp(
    backend: &dyn Backend,
    query: &DnsQuery,
    server: IpAddr,
    route: &Route,
    options: &UdpOptions,
) -> Result<Reply, QueryError> {
    let (start, deadline) = compute_times(options.timeout);
    let endpoints = resolve_endpoints(server, route)?;

    let socket = backend
        .make_datagram_socket(endpoints.family, endpoints.source)
        .await?;
    let mut lease = Lease::Owned(socket);

    let result = exchange(
        lease.socket(),
        query,
        endpoints.destination,
        start,
        deadline,
        options,
    )
    .await;
    lease.release(result).await
}

/// Sends `query` to `destination` over a caller-owned UDP socket, which is
/// left open.
pub async fn udp_with_socket(
    socket: &mut dyn DatagramSocket,
    query: &DnsQuery,
    destination: SocketAddr,
    options: &UdpOptions,
) -> Result<Reply, QueryError> {
    let (start, deadline) = compute_times(options.timeout);
    let destination =
        low_level_address_tuple(socket.family(), destination.ip(), destination.port())?;

    let mut lease = Lease::Borrowed(socket);
    let result = exchange(lease.socket(), query, destination, start, deadline, options).await;
    lease.release(result).await
}
