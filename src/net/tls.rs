//! TLS configuration, certificate loading and the handshake entry point.
//!
//! # Responsibilities
//! - Build rustls server/client configs under a fixed policy (TLS 1.2 floor)
//! - Load certificate chains and private keys from PEM files
//! - Run the accept or connect side of a handshake over any socket

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio_rustls::rustls::{
    self,
    pki_types::{CertificateDer, PrivateKeyDer, ServerName},
    ClientConfig, RootCertStore, ServerConfig,
};
use tokio_rustls::{TlsAcceptor, TlsConnector, TlsStream};

use crate::error::ConnectionError;
use crate::net::connection::HandshakeDirection;
use crate::net::transport::Socket;

/// Protocol versions offered by both sides. TLS 1.0/1.1 are never negotiated.
static PROTOCOL_VERSIONS: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];

/// Error type for TLS material and configuration.
#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(String),

    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    #[error("rustls: {0}")]
    Rustls(#[from] rustls::Error),
}

fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Server config presenting `certs` with `key`; no client authentication.
pub fn server_config(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<Arc<ServerConfig>, TlsSetupError> {
    let config = ServerConfig::builder_with_provider(crypto_provider())
        .with_protocol_versions(PROTOCOL_VERSIONS)?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(Arc::new(config))
}

/// Client config trusting exactly `roots`.
pub fn client_config(
    roots: Vec<CertificateDer<'static>>,
) -> Result<Arc<ClientConfig>, TlsSetupError> {
    let mut store = RootCertStore::empty();
    for root in roots {
        store.add(root)?;
    }
    let config = ClientConfig::builder_with_provider(crypto_provider())
        .with_protocol_versions(PROTOCOL_VERSIONS)?
        .with_root_certificates(store)
        .with_no_client_auth();
    Ok(Arc::new(config))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsSetupError> {
    File::open(path).map(BufReader::new).map_err(|source| TlsSetupError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Read every certificate from a PEM file.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsSetupError> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsSetupError::Io {
            path: path.display().to_string(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsSetupError::NoCertificates(path.display().to_string()));
    }
    Ok(certs)
}

/// Read the first private key (PKCS#8, PKCS#1 or SEC1) from a PEM file.
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsSetupError> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|source| TlsSetupError::Io {
            path: path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsSetupError::NoPrivateKey(path.display().to_string()))
}

/// Load a server config from certificate chain and key files.
pub fn load_server_config(
    cert_path: &Path,
    key_path: &Path,
) -> Result<Arc<ServerConfig>, TlsSetupError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;
    tracing::debug!(cert_path = ?cert_path, certificates = certs.len(), "Loaded server certificate chain");
    server_config(certs, key)
}

/// Load a client config trusting the certificates in `ca_path`.
pub fn load_client_config(ca_path: &Path) -> Result<Arc<ClientConfig>, TlsSetupError> {
    client_config(load_certs(ca_path)?)
}

/// The local side of a TLS handshake, fixed when the handler is built.
#[derive(Clone)]
pub enum TlsEndpoint {
    /// Act as the TLS server.
    Accept(TlsAcceptor),
    /// Act as the TLS client, verifying the peer against `server_name`.
    Connect {
        connector: TlsConnector,
        server_name: ServerName<'static>,
    },
}

impl TlsEndpoint {
    pub fn acceptor(config: Arc<ServerConfig>) -> Self {
        TlsEndpoint::Accept(TlsAcceptor::from(config))
    }

    pub fn connector(config: Arc<ClientConfig>, server_name: &str) -> Result<Self, TlsSetupError> {
        let server_name = ServerName::try_from(server_name.to_string())
            .map_err(|_| TlsSetupError::InvalidServerName(server_name.to_string()))?;
        Ok(TlsEndpoint::Connect {
            connector: TlsConnector::from(config),
            server_name,
        })
    }

    pub fn direction(&self) -> HandshakeDirection {
        match self {
            TlsEndpoint::Accept(_) => HandshakeDirection::Accept,
            TlsEndpoint::Connect { .. } => HandshakeDirection::Connect,
        }
    }

    /// Run the handshake over `socket`.
    pub async fn handshake<S: Socket>(self, socket: S) -> Result<TlsStream<S>, ConnectionError> {
        match self {
            TlsEndpoint::Accept(acceptor) => acceptor
                .accept(socket)
                .await
                .map(TlsStream::from)
                .map_err(ConnectionError::Handshake),
            TlsEndpoint::Connect {
                connector,
                server_name,
            } => connector
                .connect(server_name, socket)
                .await
                .map(TlsStream::from)
                .map_err(ConnectionError::Handshake),
        }
    }
}

impl std::fmt::Debug for TlsEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsEndpoint::Accept(_) => f.write_str("TlsEndpoint::Accept"),
            TlsEndpoint::Connect { server_name, .. } => f
                .debug_struct("TlsEndpoint::Connect")
                .field("server_name", server_name)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cert_file_names_the_path() {
        let err = load_certs(Path::new("/nonexistent/cert.pem")).unwrap_err();
        assert!(matches!(err, TlsSetupError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/cert.pem"));
    }

    #[test]
    fn connector_rejects_bad_server_name() {
        let config = client_config(Vec::new()).unwrap();
        let err = TlsEndpoint::connector(config, "not a host name").unwrap_err();
        assert!(matches!(err, TlsSetupError::InvalidServerName(_)));
    }

    #[test]
    fn endpoint_direction() {
        let config = client_config(Vec::new()).unwrap();
        let endpoint = TlsEndpoint::connector(config, "localhost").unwrap();
        assert_eq!(endpoint.direction(), HandshakeDirection::Connect);
    }
}
