//! Error taxonomy for connection operations.
//!
//! Transport and handshake failures travel through the completion callbacks.
//! Contract violations (`InvalidState`, `Framing`, operations on a closed
//! handler) are returned directly from the call that caused them.

use std::io;

use thiserror::Error;

/// Errors produced by the framed stream and the connection handler.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// I/O failure on the underlying socket (reset, broken pipe, peer EOF).
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// TLS negotiation failed.
    #[error("TLS handshake failed: {0}")]
    Handshake(#[source] io::Error),

    /// The handler was closed before or while the operation ran.
    #[error("connection is closed")]
    ConnectionClosed,

    /// The operation is not allowed in the handler's current state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// A message was requested before a full delimiter was buffered.
    #[error("no complete delimited message is buffered")]
    Framing,
}

impl ConnectionError {
    /// Peer went away: EOF, reset, aborted or broken pipe.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ConnectionError::Transport(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            ConnectionError::ConnectionClosed => true,
            _ => false,
        }
    }

    /// Contract violations are the caller's bug and must not be retried.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ConnectionError::InvalidState(_) | ConnectionError::Framing
        )
    }

    pub(crate) fn peer_closed() -> Self {
        ConnectionError::Transport(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "peer closed the connection",
        ))
    }
}

/// Outcome slot of the `(owner, handler, outcome, bytes)` completion tuple.
pub type Outcome = Result<(), ConnectionError>;

/// Result type for direct (non-callback) connection operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_counts_as_disconnect() {
        assert!(ConnectionError::peer_closed().is_disconnect());
        assert!(ConnectionError::ConnectionClosed.is_disconnect());
        assert!(!ConnectionError::Framing.is_disconnect());
    }

    #[test]
    fn contract_violations() {
        assert!(ConnectionError::InvalidState("read in flight").is_contract_violation());
        assert!(ConnectionError::Framing.is_contract_violation());
        assert!(!ConnectionError::ConnectionClosed.is_contract_violation());
    }

    #[test]
    fn io_error_converts_to_transport() {
        let err: ConnectionError = io::Error::from(io::ErrorKind::BrokenPipe).into();
        assert!(matches!(err, ConnectionError::Transport(_)));
        assert!(err.to_string().starts_with("transport error"));
    }
}
