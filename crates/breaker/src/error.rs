use thiserror::Error;

/// Outcome of a call that went through a circuit breaker.
///
/// `Open` means the wrapped operation was never invoked; `Inner` carries the
/// operation's own error unchanged.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker rejected the call without attempting it.
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    /// The wrapped operation failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the breaker rejected the call.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// Returns the wrapped operation's error, if the operation ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Open { .. } => None,
            BreakerError::Inner(e) => Some(e),
        }
    }
}
