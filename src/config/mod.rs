//! Handler and demo configuration.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read file, toml → HandlerConfig)
//!     → validation.rs (ranges, TLS material consistency)
//!     → HandlerConfig (validated, immutable)
//!     → ConnectionConfig handed to each ConnectionHandler
//!     → TlsConfig turned into a TlsEndpoint by the application
//! ```
//!
//! # Design Decisions
//! - Every field is defaulted; an empty file means plain TCP, 1 KiB reads
//! - serde rejects malformed input, validation rejects inconsistent input
//! - TLS protocol policy is fixed in code, not configurable

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{ConnectionConfig, HandlerConfig, ObservabilityConfig, TlsConfig};
