//! UDP first, TCP when the UDP reply is truncated.

use super::tcp::{tcp, tcp_with_socket, StreamOptions};
use super::udp::{udp, udp_with_socket, UdpOptions};
use super::Route;
use crate::dns::backend::{Backend, DatagramSocket, StreamSocket};
use crate::dns::message::{DnsQuery, Reply};
use ferrous_query_domain::QueryError;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FallbackOptions {
    /// Budget for each attempt. The TCP retry gets the full budget again.
    pub timeout: Option<Duration>,
    pub ignore_unexpected: bool,
    pub ignore_trailing: bool,
}

/// Caller-owned sockets for either leg of the exchange. A leg without one
/// creates and closes its own.
#[derive(Default)]
pub struct FallbackSockets<'a> {
    pub udp: Option<&'a mut dyn DatagramSocket>,
    pub tcp: Option<&'a mut dyn StreamSocket>,
}

/// Queries over UDP and retries over TCP if, and only if, the UDP reply has
/// the TC bit set.
///
/// Both legs go to the same server and port. Returns the reply and whether it
/// came over TCP.
pub async fn udp_with_fallback(
    backend: &dyn Backend,
    query: &DnsQuery,
    server: IpAddr,
    route: &Route,
    options: &FallbackOptions,
    sockets: FallbackSockets<'_>,
) -> Result<(Reply, bool), QueryError> {
    let udp_options = UdpOptions {
        timeout: options.timeout,
        ignore_unexpected: options.ignore_unexpected,
        ignore_trailing: options.ignore_trailing,
        raise_on_truncation: true,
    };

    let udp_result = match sockets.udp {
        Some(socket) => {
            let destination = SocketAddr::new(server, route.port);
            udp_with_socket(socket, query, destination, &udp_options).await
        }
        None => udp(backend, query, server, route, &udp_options).await,
    };

    match udp_result {
        Ok(reply) => Ok((reply, false)),
        Err(QueryError::Truncated(detail)) => {
            debug!(
                server = %server,
                port = route.port,
                detail = %detail,
                "UDP response truncated, retrying over TCP"
            );

            let tcp_options = StreamOptions {
                timeout: options.timeout,
                ignore_trailing: options.ignore_trailing,
            };
            let reply = match sockets.tcp {
                Some(socket) => tcp_with_socket(socket, query, &tcp_options).await?,
                None => tcp(backend, query, server, route, &tcp_options).await?,
            };
            Ok((reply, true))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::backend::MockBackend;
    use hickory_proto::rr::RecordType;

    fn server() -> IpAddr {
        "192.0.2.53".parse().unwrap()
    }

    fn reply_to(query: &DnsQuery, flags: u8) -> Vec<u8> {
        let mut wire = query.to_wire().to_vec();
        wire[2] = flags;
        wire[3] = 0x80;
        wire
    }

    #[tokio::test]
    async fn test_clean_udp_reply_skips_tcp() {
        let backend = MockBackend::new();
        let query = DnsQuery::build("example.com", RecordType::A).unwrap();
        backend.push_datagram(reply_to(&query, 0x81), "192.0.2.53:53".parse().unwrap());

        let (reply, used_tcp) = udp_with_fallback(
            &backend,
            &query,
            server(),
            &Route::default(),
            &FallbackOptions::default(),
            FallbackSockets::default(),
        )
        .await
        .unwrap();

        assert!(!used_tcp);
        assert_eq!(reply.id(), query.id());
        assert!(backend.connects().is_empty());
    }

    #[tokio::test]
    async fn test_truncated_udp_reply_retries_once_over_tcp() {
        let backend = MockBackend::new();
        let query = DnsQuery::build("example.com", RecordType::A).unwrap();
        backend.push_datagram(reply_to(&query, 0x83), "192.0.2.53:53".parse().unwrap());
        backend.push_stream_message(&reply_to(&query, 0x81));

        let timeout = Some(Duration::from_secs(3));
        let (reply, used_tcp) = udp_with_fallback(
            &backend,
            &query,
            server(),
            &Route::default(),
            &FallbackOptions {
                timeout,
                ..Default::default()
            },
            FallbackSockets::default(),
        )
        .await
        .unwrap();

        assert!(used_tcp);
        assert!(!reply.truncated());
        let connects = backend.connects();
        assert_eq!(connects.len(), 1);
        assert_eq!(connects[0].destination, "192.0.2.53:53".parse().unwrap());
        let connect_budget = connects[0].timeout.unwrap();
        assert!(connect_budget <= Duration::from_secs(3));
        assert!(connect_budget > Duration::from_secs(2));
        assert_eq!(backend.sent_stream_data().len(), 1);
        assert_eq!(backend.sockets_closed(), 2);
    }

    #[tokio::test]
    async fn test_other_udp_errors_do_not_fall_back() {
        let backend = MockBackend::new();
        let query = DnsQuery::build("example.com", RecordType::A).unwrap();
        backend.push_datagram(reply_to(&query, 0x81), "198.51.100.9:53".parse().unwrap());

        let result = udp_with_fallback(
            &backend,
            &query,
            server(),
            &Route::default(),
            &FallbackOptions::default(),
            FallbackSockets::default(),
        )
        .await;

        assert!(matches!(result, Err(QueryError::UnexpectedSource { .. })));
        assert!(backend.connects().is_empty());
    }
}
