//! Common error types for mousekit.

use thiserror::Error;

/// Errors surfaced by the control and event façades.
#[derive(Debug, Error)]
pub enum MouseError {
    /// No backend exists for the host platform identifier.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
    /// A caller-supplied value is outside its domain (e.g. a raw button code).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The native mouse-control or input-hook facility reported a failure.
    #[error("{op} failed: {reason}")]
    NativeCall { op: &'static str, reason: String },
}

impl MouseError {
    /// Wrap a native failure for operation `op`.
    pub fn native(op: &'static str, reason: impl ToString) -> Self {
        Self::NativeCall {
            op,
            reason: reason.to_string(),
        }
    }
}

/// Result type for mousekit operations.
pub type MouseResult<T> = Result<T, MouseError>;
