//! Delimiter-framed connection handlers over plain TCP or TLS.
//!
//! An application owner wraps an established socket in a
//! [`ConnectionHandler`], registers completion callbacks, and drives reads,
//! writes and the TLS handshake without caring which transport is underneath.

pub mod config;
pub mod error;
pub mod handler;
pub mod net;
pub mod observability;

pub use config::HandlerConfig;
pub use error::{ConnectionError, ConnectionResult, Outcome};
pub use handler::{CallbackKind, ConnectionHandler, HandshakeState};
pub use net::{Role, TlsEndpoint, TransportKind, DELIMITER};
