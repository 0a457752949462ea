use policyflow_core::{AudioDevice, StreamType};
use thiserror::Error;

/// Errors returned to callers of the policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The request is malformed or not valid in the current configuration.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The device is already marked as connected.
    #[error("Device already connected: {0}")]
    AlreadyConnected(AudioDevice),
    /// The device is not connected, or is connected under another address.
    #[error("Device not connected: {0}")]
    NotConnected(AudioDevice),
    /// The resource the request would create already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// The handle does not refer to an open output or input.
    #[error("Unknown handle")]
    NotFound,
    /// Another input is already capturing.
    #[error("Another input is already active")]
    Busy,
    /// The driver could not provide the requested sink or source.
    #[error("Unavailable: {reason}")]
    Unavailable {
        /// Driver message or description of the mismatch.
        reason: String,
    },
}

impl PolicyError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn unavailable(reason: impl ToString) -> Self {
        Self::Unavailable {
            reason: reason.to_string(),
        }
    }
}

/// Bookkeeping anomaly caused by unbalanced caller requests. Logged and counted, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Inconsistency {
    /// A usage counter would have gone below zero.
    #[error("usage count underflow for stream {0}")]
    UsageUnderflow(StreamType),
    /// A stream was unmuted more times than it was muted.
    #[error("unmuting non muted stream {0}")]
    MuteUnderflow(StreamType),
    /// A stream was stopped on an output where its strategy was not in use.
    #[error("stopping stream {0} on an output where it is not active")]
    StreamNotActive(StreamType),
    /// An input was stopped while not capturing.
    #[error("stopping an input which is already stopped")]
    InputAlreadyStopped,
}

/// Result of engine operations.
pub type Result<T, E = PolicyError> = std::result::Result<T, E>;
