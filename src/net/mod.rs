//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Established socket (accepted or connected by the application)
//!     → tls.rs (optional handshake, accept or connect side)
//!     → transport.rs (Plain | Tls behind one AsyncRead/AsyncWrite)
//!     → framing.rs (receive buffer, "\r\n\r\n" delimiter, framed writes)
//!     → handler (callbacks, lifetime, state)
//! ```
//!
//! # Design Decisions
//! - Listening and accepting stay with the application
//! - Transport capability (plain/TLS) and role (server/login/client) are
//!   independent axes; only the handshake looks at both

pub mod connection;
pub mod framing;
pub mod tls;
pub mod transport;

pub use connection::{ConnectionId, HandshakeDirection, Role};
pub use framing::{FramedReader, FramedStream, FramedWriter, ReceiveBuffer, DELIMITER};
pub use tls::TlsEndpoint;
pub use transport::{Socket, Transport, TransportKind};
