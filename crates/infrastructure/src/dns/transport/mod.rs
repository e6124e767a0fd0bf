//! DNS exchanges over UDP, TCP and TLS.
//!
//! Every exchange follows the same pipeline: resolve the endpoints, acquire a
//! socket (created here, or supplied by the caller), send, receive, check the
//! reply answers the query, and release the socket if it was created here.
//! Callers that supply their own socket use the `*_with_socket` entry points,
//! which take no address or bind arguments at all.

pub mod fallback;
pub mod lease;
pub mod tcp;
pub mod tls;
pub mod udp;

use ferrous_query_domain::endpoint::{low_level_address_tuple, source_tuple};
use ferrous_query_domain::{AddressFamily, QueryError, DEFAULT_PORT};
use std::net::{IpAddr, SocketAddr};

pub use fallback::{udp_with_fallback, FallbackOptions, FallbackSockets};
pub use lease::Lease;
pub use tcp::{
    read_exact, read_framed, receive_tcp, send_tcp, tcp, tcp_with_socket, StreamOptions,
    MAX_TCP_MESSAGE_SIZE,
};
pub use tls::{resolve_tls_context, tls, tls_with_socket, TlsContext, TlsOptions};
pub use udp::{receive_udp, send_udp, udp, udp_with_socket, UdpOptions, MAX_UDP_MESSAGE_SIZE};

/// Where a self-created socket connects from and to.
///
/// Only the entry points that create their own socket take a `Route`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub port: u16,
    pub source: Option<IpAddr>,
    pub source_port: u16,
}

impl Default for Route {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            source: None,
            source_port: 0,
        }
    }
}

impl Route {
    pub fn to_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Endpoints {
    pub family: AddressFamily,
    pub destination: SocketAddr,
    pub source: Option<SocketAddr>,
}

/// Resolves the family-qualified destination and bind address for a server.
pub(crate) fn resolve_endpoints(server: IpAddr, route: &Route) -> Result<Endpoints, QueryError> {
    let family = AddressFamily::of(server);
    Ok(Endpoints {
        family,
        destination: low_level_address_tuple(family, server, route.port)?,
        source: source_tuple(family, route.source, route.source_port)?,
    })
}
