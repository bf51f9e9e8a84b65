//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use conn_handler::config::ConnectionConfig;
use conn_handler::net::{tls, Socket};
use conn_handler::{CallbackKind, ConnectionHandler, Role, TlsEndpoint};
use rcgen::CertifiedKey;
use tokio::io::{duplex, DuplexStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

/// How long a test waits for a callback before failing.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// One callback invocation as seen by the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: CallbackKind,
    pub ok: bool,
    pub bytes: usize,
    /// Message extracted inside a successful read callback.
    pub message: Option<Vec<u8>>,
}

/// Owner that forwards every callback to a channel.
pub struct Recorder {
    events: mpsc::UnboundedSender<Event>,
}

impl Recorder {
    pub fn push(&self, kind: CallbackKind, ok: bool, bytes: usize, message: Option<Vec<u8>>) {
        let _ = self.events.send(Event {
            kind,
            ok,
            bytes,
            message,
        });
    }
}

pub type Handler<S = DuplexStream> = Arc<ConnectionHandler<Recorder, S>>;

pub fn recorder() -> (Arc<Recorder>, mpsc::UnboundedReceiver<Event>) {
    let (events, rx) = mpsc::unbounded_channel();
    (Arc::new(Recorder { events }), rx)
}

/// Register a recording callback for every kind. Read callbacks extract the
/// buffered message so the next read starts from a clean buffer.
pub fn record_all<S: Socket>(handler: &ConnectionHandler<Recorder, S>) {
    handler.set_read_callback(|recorder: &Recorder, handler, outcome, bytes| {
        let message = match outcome {
            Ok(()) => handler.extract_message().ok(),
            Err(_) => None,
        };
        recorder.push(CallbackKind::Read, message.is_some(), bytes, message);
    });
    handler.set_async_read_callback(|recorder: &Recorder, _, outcome, bytes| {
        recorder.push(CallbackKind::AsyncRead, outcome.is_ok(), bytes, None);
    });
    handler.set_write_callback(|recorder: &Recorder, _, outcome, bytes| {
        recorder.push(CallbackKind::Write, outcome.is_ok(), bytes, None);
    });
    handler.set_handshake_callback(|recorder: &Recorder, _, outcome, bytes| {
        recorder.push(CallbackKind::Handshake, outcome.is_ok(), bytes, None);
    });
    handler.set_ready_callback(|recorder: &Recorder, _, outcome, bytes| {
        recorder.push(CallbackKind::Ready, outcome.is_ok(), bytes, None);
    });
}

/// In-memory socket pair.
pub fn pipe() -> (DuplexStream, DuplexStream) {
    duplex(64 * 1024)
}

/// Connected loopback TCP pair: (client side, accepted side).
pub async fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (client.unwrap(), accepted.unwrap().0)
}

/// Plain handler over one end of a pipe, with recording callbacks.
pub fn plain_handler(
    role: Role,
) -> (Handler, DuplexStream, mpsc::UnboundedReceiver<Event>) {
    let (owner, rx) = recorder();
    let (local, peer) = pipe();
    let handler = ConnectionHandler::plain(
        Handle::current(),
        owner,
        role,
        local,
        &ConnectionConfig::default(),
    );
    record_all(&handler);
    (handler, peer, rx)
}

/// TLS handler over `socket`, with recording callbacks.
pub fn tls_handler<S: Socket>(
    role: Role,
    socket: S,
    endpoint: TlsEndpoint,
) -> (Handler<S>, mpsc::UnboundedReceiver<Event>) {
    let (owner, rx) = recorder();
    let handler = ConnectionHandler::tls(
        Handle::current(),
        owner,
        role,
        socket,
        endpoint,
        &ConnectionConfig::default(),
    )
    .unwrap();
    record_all(&handler);
    (handler, rx)
}

/// Wait for the next callback.
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    tokio::time::timeout(CALLBACK_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for a callback")
        .expect("recorder dropped")
}

/// Self-signed certificate for `localhost`.
pub struct TlsMaterial {
    pub cert: CertificateDer<'static>,
    pub key_der: Vec<u8>,
    pub cert_pem: String,
    pub key_pem: String,
}

impl TlsMaterial {
    pub fn generate() -> Self {
        let CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        Self {
            cert: cert.der().clone(),
            key_der: key_pair.serialize_der(),
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
        }
    }

    pub fn acceptor(&self) -> TlsEndpoint {
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.key_der.clone()));
        let config = tls::server_config(vec![self.cert.clone()], key).unwrap();
        TlsEndpoint::acceptor(config)
    }

    pub fn connector(&self) -> TlsEndpoint {
        let config = tls::client_config(vec![self.cert.clone()]).unwrap();
        TlsEndpoint::connector(config, "localhost").unwrap()
    }
}
