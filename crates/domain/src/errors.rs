use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Timeout while {0}")]
    Timeout(String),

    #[error("Got a response from {received} instead of {expected}")]
    UnexpectedSource {
        expected: SocketAddr,
        received: SocketAddr,
    },

    #[error("Truncated DNS response: {0}")]
    Truncated(String),

    #[error("DNS response does not match the query: {0}")]
    BadResponse(String),

    #[error("Connection closed by peer after {received} of {expected} bytes")]
    EndOfStream { expected: usize, received: usize },

    #[error("Malformed DNS message: {0}")]
    MalformedMessage(String),

    #[error("Trailing data after DNS message: {0} bytes")]
    TrailingJunk(usize),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Stream socket is not connected: {0}")]
    NotConnected(String),

    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl QueryError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, QueryError::Timeout(_))
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, QueryError::Truncated(_))
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, QueryError::EndOfStream { .. })
    }
}
