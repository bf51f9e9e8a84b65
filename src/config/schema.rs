//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.

use serde::{Deserialize, Serialize};

use crate::net::framing::DEFAULT_READ_CHUNK;

/// Root configuration for connection handlers and the demo binary.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HandlerConfig {
    /// Per-connection I/O settings.
    pub connection: ConnectionConfig,

    /// TLS material. Plain TCP when absent.
    pub tls: Option<TlsConfig>,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Per-connection I/O settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Bytes requested from the transport per read while waiting for a delimiter.
    pub read_chunk_bytes: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_chunk_bytes: DEFAULT_READ_CHUNK,
        }
    }
}

/// TLS material locations.
///
/// Servers need `cert_path` and `key_path`; clients need `ca_path` and
/// `server_name`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to certificate chain file (PEM).
    pub cert_path: Option<String>,

    /// Path to private key file (PEM, unencrypted).
    pub key_path: Option<String>,

    /// Path to the CA certificate(s) trusted by clients (PEM).
    pub ca_path: Option<String>,

    /// Name the client verifies the server certificate against.
    pub server_name: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "conn_handler=info".to_string(),
        }
    }
}
