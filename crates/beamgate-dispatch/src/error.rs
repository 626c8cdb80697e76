//! Errors surfaced by the dispatcher.

use std::time::Duration;

use crate::codec::CodecError;

/// Failure modes of a dispatched call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// The submission queue is full.
    #[error("dispatch queue is full")]
    Busy,
    /// No reply arrived before the deadline.
    #[error("no reply from the manager within {timeout:?}")]
    Timeout { timeout: Duration },
    /// The connection failed or a frame could not be processed.
    #[error("manager transport failed: {reason}")]
    TransportError { reason: String },
    /// The manager returned a well-formed error payload.
    #[error("manager rejected the call: {message}")]
    RemoteError { message: String },
}

impl DispatchError {
    /// A [`DispatchError::Timeout`] for the given deadline span.
    #[must_use]
    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout { timeout }
    }

    /// A [`DispatchError::TransportError`] with the given reason.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::TransportError {
            reason: reason.into(),
        }
    }

    /// A [`DispatchError::RemoteError`] with the given message.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::RemoteError {
            message: message.into(),
        }
    }

    /// Whether retrying the same call later can succeed.
    ///
    /// A remote rejection is deterministic, everything else is a matter
    /// of load or connectivity.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::RemoteError { .. })
    }
}

impl From<std::io::Error> for DispatchError {
    fn from(error: std::io::Error) -> Self {
        Self::transport(error.to_string())
    }
}

impl From<CodecError> for DispatchError {
    fn from(error: CodecError) -> Self {
        Self::transport(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failure() {
        let error = DispatchError::timeout(Duration::from_secs(10));
        assert_eq!(error.to_string(), "no reply from the manager within 10s");

        let error = DispatchError::remote("RE environment is not open");
        assert_eq!(
            error.to_string(),
            "manager rejected the call: RE environment is not open"
        );
    }

    #[test]
    fn only_remote_rejections_are_final() {
        assert!(DispatchError::Busy.is_retryable());
        assert!(DispatchError::timeout(Duration::from_secs(1)).is_retryable());
        assert!(DispatchError::transport("connection reset").is_retryable());
        assert!(!DispatchError::remote("bad plan").is_retryable());
    }

    #[test]
    fn io_errors_become_transport_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let error = DispatchError::from(io);
        assert!(matches!(error, DispatchError::TransportError { .. }));
    }
}
