use std::time::{Duration, Instant};

/// Absolute expiration of one exchange.
///
/// Each suspending I/O call asks for [`Deadline::remaining`] right before it
/// starts, so every call gets a fresh budget instead of the original timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expiration: Option<Instant>,
}

impl Deadline {
    /// No deadline; I/O blocks until the transport gives up.
    pub const fn none() -> Self {
        Self { expiration: None }
    }

    pub const fn at(expiration: Instant) -> Self {
        Self {
            expiration: Some(expiration),
        }
    }

    pub fn after(start: Instant, timeout: Option<Duration>) -> Self {
        match timeout {
            Some(timeout) => Self::at(start + timeout),
            None => Self::none(),
        }
    }

    pub fn expiration(&self) -> Option<Instant> {
        self.expiration
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.remaining_at(Instant::now())
    }

    /// Time left at `now`, floored at zero. `None` means unbounded.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        self.expiration
            .map(|expiration| expiration.saturating_duration_since(now))
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.remaining(), Some(left) if left.is_zero())
    }
}

/// Start instant and deadline for an exchange with the given relative timeout.
pub fn compute_times(timeout: Option<Duration>) -> (Instant, Deadline) {
    let start = Instant::now();
    (start, Deadline::after(start, timeout))
}
