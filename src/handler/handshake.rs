//! TLS handshake state machine.
//!
//! # State Transitions
//! ```text
//! Unstarted → Handshaking: begin_handshake()
//! Handshaking → Open:      handshake succeeded
//! Handshaking → Failed:    handshake failed or the handler was closed
//! ```
//!
//! `Open` and `Failed` are terminal. Any other transition is `InvalidState`.

use crate::error::ConnectionError;
use crate::net::connection::Role;
use crate::net::tls::TlsEndpoint;

/// Handshake progress of a TLS connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Unstarted,
    Handshaking,
    Open,
    Failed,
}

impl HandshakeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Open | HandshakeState::Failed)
    }
}

/// What the handler does on its own once a handshake succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostHandshake {
    /// Issue the first delimited read.
    pub start_read_loop: bool,
    /// Fire the ready callback so the owner can send first.
    pub signal_ready: bool,
}

impl PostHandshake {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Server | Role::LoginServer => Self {
                start_read_loop: true,
                signal_ready: false,
            },
            Role::Client => Self {
                start_read_loop: true,
                signal_ready: true,
            },
        }
    }
}

/// Handshake bookkeeping for one TLS connection.
///
/// Holds the raw socket and the TLS endpoint until the handshake starts.
pub(crate) struct HandshakeSession<S> {
    state: HandshakeState,
    pending: Option<(S, TlsEndpoint)>,
}

impl<S> HandshakeSession<S> {
    pub(crate) fn new(socket: S, endpoint: TlsEndpoint) -> Self {
        Self {
            state: HandshakeState::Unstarted,
            pending: Some((socket, endpoint)),
        }
    }

    pub(crate) fn state(&self) -> HandshakeState {
        self.state
    }

    /// Move to `Handshaking`, handing out the socket and endpoint.
    pub(crate) fn begin(&mut self) -> Result<(S, TlsEndpoint), ConnectionError> {
        match self.state {
            HandshakeState::Unstarted => {}
            HandshakeState::Handshaking => {
                return Err(ConnectionError::InvalidState("handshake already in progress"))
            }
            HandshakeState::Open | HandshakeState::Failed => {
                return Err(ConnectionError::InvalidState("handshake already completed"))
            }
        }
        let pending = self
            .pending
            .take()
            .ok_or(ConnectionError::InvalidState("handshake socket already released"))?;
        self.state = HandshakeState::Handshaking;
        Ok(pending)
    }

    pub(crate) fn succeed(&mut self) {
        if self.state == HandshakeState::Handshaking {
            self.state = HandshakeState::Open;
        }
    }

    pub(crate) fn fail(&mut self) {
        self.pending = None;
        if !self.state.is_terminal() {
            self.state = HandshakeState::Failed;
        }
    }

    /// Drop the raw socket if the handshake never started.
    pub(crate) fn release(&mut self) {
        self.pending = None;
    }
}
