use ferrous_query_domain::config::QueryConfig;
use ferrous_query_domain::{Config, QueryError};
use ferrous_query_infrastructure::dns::transport::{
    tcp, tls, udp, udp_with_fallback, FallbackOptions, FallbackSockets, Route, StreamOptions,
    TlsOptions, UdpOptions,
};
use ferrous_query_infrastructure::dns::{Backend, DnsQuery, Reply};
use std::fmt;
use std::net::IpAddr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Udp,
    Tcp,
    Tls,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Udp => "UDP",
            Protocol::Tcp => "TCP",
            Protocol::Tls => "TLS",
        })
    }
}

pub fn route(query: &QueryConfig, port: u16) -> Route {
    Route {
        port,
        source: query.source,
        source_port: query.source_port,
    }
}

pub fn udp_options(query: &QueryConfig) -> UdpOptions {
    UdpOptions {
        timeout: query.timeout(),
        ignore_unexpected: query.ignore_unexpected,
        ignore_trailing: query.ignore_trailing,
        raise_on_truncation: false,
    }
}

pub fn fallback_options(query: &QueryConfig) -> FallbackOptions {
    FallbackOptions {
        timeout: query.timeout(),
        ignore_unexpected: query.ignore_unexpected,
        ignore_trailing: query.ignore_trailing,
    }
}

pub fn stream_options(query: &QueryConfig) -> StreamOptions {
    StreamOptions {
        timeout: query.timeout(),
        ignore_trailing: query.ignore_trailing,
    }
}

pub fn tls_options(config: &Config) -> TlsOptions {
    TlsOptions {
        stream: stream_options(&config.query),
        context: None,
        server_hostname: config.tls.server_hostname.clone(),
    }
}

/// Runs one exchange and reports the protocol that produced the reply, which
/// is TCP when a UDP reply came back truncated.
pub async fn run(
    backend: &dyn Backend,
    config: &Config,
    query: &DnsQuery,
    server: IpAddr,
    protocol: Protocol,
) -> Result<(Reply, Protocol), QueryError> {
    let q = &config.query;
    debug!(%server, %protocol, id = query.id(), "Sending query");

    match protocol {
        Protocol::Udp if q.fallback_to_tcp => {
            let (reply, used_tcp) = udp_with_fallback(
                backend,
                query,
                server,
                &route(q, q.udp_port),
                &fallback_options(q),
                FallbackSockets::default(),
            )
            .await?;
            if used_tcp {
                info!(%server, "UDP reply truncated, answered over TCP");
                Ok((reply, Protocol::Tcp))
            } else {
                Ok((reply, Protocol::Udp))
            }
        }
        Protocol::Udp => {
            let reply = udp(backend, query, server, &route(q, q.udp_port), &udp_options(q)).await?;
            Ok((reply, Protocol::Udp))
        }
        Protocol::Tcp => {
            let reply =
                tcp(backend, query, server, &route(q, q.tcp_port), &stream_options(q)).await?;
            Ok((reply, Protocol::Tcp))
        }
        Protocol::Tls => {
            let reply = tls(
                backend,
                query,
                server,
                &route(q, q.tls_port),
                &tls_options(config),
            )
            .await?;
            Ok((reply, Protocol::Tls))
        }
    }
}
