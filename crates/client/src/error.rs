//! Client-side errors.

/// Failure while connecting to or reading from the hub's event stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The connection attempt itself failed. Counts toward the reconnect
    /// attempt budget.
    #[error("connection failed: {message}")]
    Connect {
        /// Transport-reported cause.
        message: String,
    },
    /// An established stream broke mid-read. Triggers a reconnect cycle
    /// with a fresh attempt budget.
    #[error("stream interrupted: {message}")]
    Stream {
        /// Transport-reported cause.
        message: String,
    },
    /// Every scheduled reconnect attempt failed; the client will not try
    /// again.
    #[error("gave up after {attempts} failed connection attempts")]
    Exhausted {
        /// Consecutive connect failures observed.
        attempts: u32,
    },
}

impl ClientError {
    /// A connection failure.
    #[must_use]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// A mid-stream failure.
    #[must_use]
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// A terminal give-up after `attempts` consecutive connect failures.
    #[must_use]
    pub fn exhausted(attempts: u32) -> Self {
        Self::Exhausted { attempts }
    }
}
