//! Error types for the pixel hub.
//!
//! - [`ConnError`]: failures on one established connection. Every variant is
//!   terminal for that connection and never for the process.
//! - [`HubError`]: process-level failures (listener bind, I/O, settings).
//!
//! Malformed batch payloads are not represented here: the codec forwards
//! whatever it receives and never fails.

use std::time::Duration;

use thiserror::Error;

/// Terminal failure of a single connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnError {
    /// The connection was closed, by the peer or locally.
    #[error("connection closed")]
    Closed,

    /// Nothing (not even a pong) was received before the idle deadline.
    #[error("idle timeout after {0:?}")]
    IdleTimeout(Duration),

    /// The outbound queue stayed full for longer than the send timeout.
    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),

    /// A liveness probe could not be queued or written in time.
    #[error("probe timed out after {0:?}")]
    ProbeTimeout(Duration),

    /// The underlying transport reported an error.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnError {
    /// Build a transport error from anything displayable.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Whether this is an orderly close rather than a failure.
    pub fn is_clean_close(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Process-level error.
#[derive(Debug, Error)]
pub enum HubError {
    /// The listening socket could not be bound. Fatal.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
