//! Ferrous Query Infrastructure Layer
//!
//! Socket backends, the DNS message service and the UDP/TCP/TLS exchanges
//! built on top of them.
pub mod dns;
