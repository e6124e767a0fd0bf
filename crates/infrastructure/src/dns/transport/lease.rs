use crate::dns::backend::Closable;
use ferrous_query_domain::QueryError;
use tracing::{debug, warn};

/// Who is responsible for closing a socket used by one exchange.
///
/// Exchanges resolve ownership once, when they pick up the socket, and hand
/// the result of the exchange to [`Lease::release`]: an owned socket is closed
/// exactly once there whatever the result, a borrowed one is left alone.
pub enum Lease<'a, S: ?Sized> {
    /// Created by the exchange; closed when the exchange ends.
    Owned(Box<S>),
    /// Supplied by the caller, who keeps it open or closes it.
    Borrowed(&'a mut S),
}

impl<'a, S: Closable + ?Sized> Lease<'a, S> {
    pub fn socket(&mut self) -> &mut S {
        match self {
            Lease::Owned(socket) => socket.as_mut(),
            Lease::Borrowed(socket) => socket,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Lease::Owned(_))
    }

    /// Ends the lease and passes `result` through.
    ///
    /// A failure to close an owned socket is logged, never reported in place
    /// of the exchange result.
    pub async fn release<T>(self, result: Result<T, QueryError>) -> Result<T, QueryError> {
        if let Lease::Owned(mut socket) = self {
            match socket.close().await {
                Ok(()) => debug!(succeeded = result.is_ok(), "Released self-created socket"),
                Err(e) => warn!(error = %e, "Failed to close self-created socket"),
            }
        }
        result
    }
}
