pub mod backend;
pub mod message;
pub mod transport;

pub use backend::{default_backend, Backend, DatagramSocket, MockBackend, StreamSocket, TokioBackend};
pub use message::{DecodeOptions, DnsQuery, Reply, ResponseVerifier};
pub use transport::{
    FallbackOptions, FallbackSockets, Lease, Route, StreamOptions, TlsContext, TlsOptions,
    UdpOptions,
};
