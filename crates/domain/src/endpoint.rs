//! Address-family helpers shared by the transports.
//!
//! A "high level" endpoint is the `(address, port)` pair callers think in.
//! Backends need a family-qualified [`SocketAddr`], so every conversion goes
//! through an [`AddressFamily`] and never drops the v4/v6 distinction
//! (`0.0.0.0` and `::` are different wildcards).

use crate::errors::QueryError;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    Inet,
    Inet6,
    /// A raw family number this crate has no socket support for.
    Other(i32),
}

impl AddressFamily {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            libc::AF_INET => AddressFamily::Inet,
            libc::AF_INET6 => AddressFamily::Inet6,
            other => AddressFamily::Other(other),
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            AddressFamily::Inet => libc::AF_INET,
            AddressFamily::Inet6 => libc::AF_INET6,
            AddressFamily::Other(raw) => *raw,
        }
    }

    pub fn of(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::Inet,
            IpAddr::V6(_) => AddressFamily::Inet6,
        }
    }

    /// Family of a textual IPv4 or IPv6 address.
    pub fn for_address(text: &str) -> Result<Self, QueryError> {
        parse_ip(text).map(Self::of)
    }

    /// The wildcard address of this family.
    pub fn wildcard(&self) -> Result<IpAddr, QueryError> {
        match self {
            AddressFamily::Inet => Ok(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            AddressFamily::Inet6 => Ok(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
            AddressFamily::Other(raw) => Err(QueryError::NotImplemented(format!(
                "unknown address family {}",
                raw
            ))),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Inet => write!(f, "AF_INET"),
            AddressFamily::Inet6 => write!(f, "AF_INET6"),
            AddressFamily::Other(raw) => write!(f, "AF_{}", raw),
        }
    }
}

pub fn parse_ip(text: &str) -> Result<IpAddr, QueryError> {
    text.parse::<IpAddr>()
        .map_err(|e| QueryError::InvalidAddress(format!("'{}': {}", text, e)))
}

/// Builds the local bind address for a new socket.
///
/// Returns `None` when neither an address nor a non-zero port was given, which
/// leaves the choice to the operating system. A port without an address binds
/// the family wildcard.
pub fn source_tuple(
    family: AddressFamily,
    address: Option<IpAddr>,
    port: u16,
) -> Result<Option<SocketAddr>, QueryError> {
    if address.is_none() && port == 0 {
        return Ok(None);
    }
    let address = match address {
        Some(address) => address,
        None => family.wildcard()?,
    };
    low_level_address_tuple(family, address, port).map(Some)
}

/// Converts `(ip, port)` into the socket address a socket of `family` accepts.
///
/// IPv4 addresses are mapped into `::ffff:0:0/96` for `Inet6` sockets. An IPv6
/// address cannot be expressed for an `Inet` socket.
pub fn low_level_address_tuple(
    family: AddressFamily,
    ip: IpAddr,
    port: u16,
) -> Result<SocketAddr, QueryError> {
    match (family, ip) {
        (AddressFamily::Inet, IpAddr::V4(v4)) => Ok(SocketAddr::new(IpAddr::V4(v4), port)),
        (AddressFamily::Inet, IpAddr::V6(v6)) => Err(QueryError::InvalidAddress(format!(
            "{} is not an {} address",
            v6, family
        ))),
        (AddressFamily::Inet6, IpAddr::V6(v6)) => {
            Ok(SocketAddr::V6(SocketAddrV6::new(v6, port, 0, 0)))
        }
        (AddressFamily::Inet6, IpAddr::V4(v4)) => Ok(SocketAddr::V6(SocketAddrV6::new(
            v4.to_ipv6_mapped(),
            port,
            0,
            0,
        ))),
        (AddressFamily::Other(raw), _) => Err(QueryError::NotImplemented(format!(
            "unknown address family {}",
            raw
        ))),
    }
}

fn normalize(addr: SocketAddr) -> (IpAddr, u16) {
    let ip = match addr.ip() {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    };
    (ip, addr.port())
}

/// Compares two endpoints of a socket of `family`.
///
/// IPv4-mapped IPv6 addresses compare equal to their IPv4 form, so a reply
/// seen on a dual-stack socket still matches the address the query went to.
pub fn addresses_equal(family: AddressFamily, a: SocketAddr, b: SocketAddr) -> bool {
    match family {
        AddressFamily::Inet6 => normalize(a) == normalize(b),
        _ => a.ip() == b.ip() && a.port() == b.port(),
    }
}

pub fn is_multicast(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_multicast(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.is_multicast(),
            None => v6.is_multicast(),
        },
    }
}
