//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (read chunk size)
//! - Check TLS material is named consistently for the side being configured
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HandlerConfig → Result<(), Vec<ValidationError>>

use tokio_rustls::rustls::pki_types::ServerName;

use crate::config::schema::{HandlerConfig, TlsConfig};

/// Largest accepted per-read chunk.
pub const MAX_READ_CHUNK: usize = 16 * 1024 * 1024;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate `config`, collecting every problem.
pub fn validate_config(config: &HandlerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let chunk = config.connection.read_chunk_bytes;
    if chunk == 0 || chunk > MAX_READ_CHUNK {
        errors.push(ValidationError::new(
            "connection.read_chunk_bytes",
            format!("must be between 1 and {MAX_READ_CHUNK}, got {chunk}"),
        ));
    }

    if let Some(tls) = &config.tls {
        validate_tls(tls, &mut errors);
    }

    if config.observability.log_filter.trim().is_empty() {
        errors.push(ValidationError::new(
            "observability.log_filter",
            "must not be empty",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_tls(tls: &TlsConfig, errors: &mut Vec<ValidationError>) {
    let paths = [
        ("tls.cert_path", &tls.cert_path),
        ("tls.key_path", &tls.key_path),
        ("tls.ca_path", &tls.ca_path),
    ];
    for (field, path) in paths {
        if matches!(path, Some(p) if p.trim().is_empty()) {
            errors.push(ValidationError::new(field, "must not be empty"));
        }
    }

    if tls.cert_path.is_some() != tls.key_path.is_some() {
        errors.push(ValidationError::new(
            "tls.key_path",
            "cert_path and key_path must be set together",
        ));
    }

    if tls.cert_path.is_none() && tls.ca_path.is_none() {
        errors.push(ValidationError::new(
            "tls",
            "needs cert_path/key_path (server) or ca_path (client)",
        ));
    }

    match (&tls.ca_path, &tls.server_name) {
        (Some(_), None) => errors.push(ValidationError::new(
            "tls.server_name",
            "required when ca_path is set",
        )),
        (_, Some(name)) if ServerName::try_from(name.as_str()).is_err() => {
            errors.push(ValidationError::new(
                "tls.server_name",
                format!("'{name}' is not a valid DNS name or IP address"),
            ))
        }
        _ => {}
    }
}
