//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! handler / framing / tls produce:
//!     → tracing events with connection_id, role, transport fields
//!     → metrics counters (bytes, handshakes, closes)
//!
//! Consumers:
//!     → logging.rs installs the subscriber (binary only)
//!     → any `metrics` recorder the application installs
//! ```
//!
//! # Design Decisions
//! - The library never installs a subscriber or recorder itself
//! - Counters are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
