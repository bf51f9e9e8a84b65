//! Connection identity and role.
//!
//! # Responsibilities
//! - Hand out per-process handler ids for log correlation
//! - Describe the behavioural mode of a connection (server, login gateway, client)
//! - Fix the handshake direction implied by each role

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique handler id, attached to every log line of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn next() -> Self {
        // Only uniqueness matters.
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Behavioural mode of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Accepted by a game/application server.
    Server,
    /// Accepted by the login gateway.
    LoginServer,
    /// Outbound connection opened by this process.
    Client,
}

/// Which side of the TLS handshake a connection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeDirection {
    Accept,
    Connect,
}

impl Role {
    pub fn handshake_direction(&self) -> HandshakeDirection {
        match self {
            Role::Server | Role::LoginServer => HandshakeDirection::Accept,
            Role::Client => HandshakeDirection::Connect,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Server => "server",
            Role::LoginServer => "login-server",
            Role::Client => "client",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
