//! Connection handler: the facade an application owner drives.
//!
//! # Data Flow
//! ```text
//! owner registers callbacks
//!     → begin_read / begin_write / begin_handshake (returns immediately)
//!     → operation runs as a task on the supplied runtime, holding Arc<handler>
//!     → completion: callback(owner, &Arc<handler>, outcome, bytes)
//!     → owner extracts the message and issues the next operation
//! ```
//!
//! # Design Decisions
//! - At most one read and one write in flight; the framed halves are moved
//!   into the task and returned before the callback runs
//! - Callbacks of one connection never overlap (per-connection dispatch lock)
//! - The handler owns an `Arc` of its owner; the owner must not hold a strong
//!   reference back (a `Weak` is fine)
//! - Close wakes every in-flight task, which completes with `ConnectionClosed`

pub mod callbacks;
pub mod handshake;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_rustls::TlsStream;

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, ConnectionResult, Outcome};
use crate::net::connection::{ConnectionId, Role};
use crate::net::framing::{FramedReader, FramedStream, FramedWriter};
use crate::net::tls::TlsEndpoint;
use crate::net::transport::{Socket, Transport, TransportKind};
use crate::observability::metrics;

pub use callbacks::{Callback, CallbackKind, CallbackRegistry};
pub use handshake::{HandshakeState, PostHandshake};

use handshake::HandshakeSession;

/// Upper bound on the graceful transport shutdown performed by `close`.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

type Reader<S> = FramedReader<ReadHalf<Transport<S>>>;
type Writer<S> = FramedWriter<WriteHalf<Transport<S>>>;

/// One direction of the framed stream.
enum Slot<T> {
    Idle(T),
    InFlight,
    /// TLS handshake not finished, or handler closed.
    Unavailable,
}

impl<T> Slot<T> {
    fn take(&mut self, busy: &'static str) -> ConnectionResult<T> {
        match std::mem::replace(self, Slot::InFlight) {
            Slot::Idle(value) => Ok(value),
            Slot::InFlight => Err(ConnectionError::InvalidState(busy)),
            Slot::Unavailable => {
                *self = Slot::Unavailable;
                Err(ConnectionError::InvalidState("handshake has not completed"))
            }
        }
    }

    fn get_mut(&mut self, busy: &'static str) -> ConnectionResult<&mut T> {
        match self {
            Slot::Idle(value) => Ok(value),
            Slot::InFlight => Err(ConnectionError::InvalidState(busy)),
            Slot::Unavailable => Err(ConnectionError::InvalidState("handshake has not completed")),
        }
    }

    fn restore(&mut self, value: T) {
        *self = Slot::Idle(value);
    }

    fn release(&mut self) -> Option<T> {
        match std::mem::replace(self, Slot::Unavailable) {
            Slot::Idle(value) => Some(value),
            Slot::InFlight | Slot::Unavailable => None,
        }
    }
}

struct HandlerState<S> {
    session: Option<HandshakeSession<S>>,
    reader: Slot<Reader<S>>,
    writer: Slot<Writer<S>>,
    closed: bool,
}

impl<S> HandlerState<S> {
    fn ensure_open(&self) -> ConnectionResult<()> {
        if self.closed {
            return Err(ConnectionError::ConnectionClosed);
        }
        Ok(())
    }
}

fn into_completion(result: ConnectionResult<usize>) -> (Outcome, usize) {
    match result {
        Ok(bytes) => (Ok(()), bytes),
        Err(error) => (Err(error), 0),
    }
}

/// A single plain or TLS connection bound to an application owner.
///
/// Always handled through `Arc`; every in-flight operation keeps a clone, so
/// the handler outlives any callback that may still fire.
pub struct ConnectionHandler<O, S = TcpStream> {
    id: ConnectionId,
    role: Role,
    kind: TransportKind,
    read_chunk: usize,
    owner: Arc<O>,
    runtime: Handle,
    callbacks: CallbackRegistry<O, S>,
    state: Mutex<HandlerState<S>>,
    closed: watch::Sender<bool>,
    dispatch: AsyncMutex<()>,
}

impl<O, S> ConnectionHandler<O, S>
where
    O: Send + Sync + 'static,
    S: Socket,
{
    /// Wrap an established plain socket. Reads may be issued immediately.
    pub fn plain(
        runtime: Handle,
        owner: Arc<O>,
        role: Role,
        socket: S,
        config: &ConnectionConfig,
    ) -> Arc<Self> {
        let (reader, writer) =
            FramedStream::new(Transport::Plain(socket), config.read_chunk_bytes).into_parts();
        let state = HandlerState {
            session: None,
            reader: Slot::Idle(reader),
            writer: Slot::Idle(writer),
            closed: false,
        };
        Self::build(runtime, owner, role, TransportKind::Plain, config, state)
    }

    /// Wrap a socket that still needs a TLS handshake.
    ///
    /// The endpoint must act on the side `role` implies: accept for servers,
    /// connect for clients.
    pub fn tls(
        runtime: Handle,
        owner: Arc<O>,
        role: Role,
        socket: S,
        endpoint: TlsEndpoint,
        config: &ConnectionConfig,
    ) -> ConnectionResult<Arc<Self>> {
        if endpoint.direction() != role.handshake_direction() {
            return Err(ConnectionError::InvalidState(
                "TLS endpoint does not match the connection role",
            ));
        }
        let state = HandlerState {
            session: Some(HandshakeSession::new(socket, endpoint)),
            reader: Slot::Unavailable,
            writer: Slot::Unavailable,
            closed: false,
        };
        Ok(Self::build(runtime, owner, role, TransportKind::Tls, config, state))
    }

    fn build(
        runtime: Handle,
        owner: Arc<O>,
        role: Role,
        kind: TransportKind,
        config: &ConnectionConfig,
        state: HandlerState<S>,
    ) -> Arc<Self> {
        let (closed, _) = watch::channel(false);
        let handler = Arc::new(Self {
            id: ConnectionId::next(),
            role,
            kind,
            read_chunk: config.read_chunk_bytes,
            owner,
            runtime,
            callbacks: CallbackRegistry::new(),
            state: Mutex::new(state),
            closed,
            dispatch: AsyncMutex::new(()),
        });
        tracing::debug!(
            connection_id = %handler.id,
            role = %role,
            transport = %kind,
            "Connection handler created"
        );
        handler
    }

    /// Register the action fired when a `begin_read` completes.
    pub fn set_read_callback<F>(&self, action: F)
    where
        F: Fn(&O, &Arc<Self>, Outcome, usize) + Send + Sync + 'static,
    {
        self.callbacks.set(CallbackKind::Read, Callback::new(action));
    }

    /// Register the action fired when a `begin_read_some` completes.
    pub fn set_async_read_callback<F>(&self, action: F)
    where
        F: Fn(&O, &Arc<Self>, Outcome, usize) + Send + Sync + 'static,
    {
        self.callbacks.set(CallbackKind::AsyncRead, Callback::new(action));
    }

    /// Register the action fired when a `begin_write` completes.
    pub fn set_write_callback<F>(&self, action: F)
    where
        F: Fn(&O, &Arc<Self>, Outcome, usize) + Send + Sync + 'static,
    {
        self.callbacks.set(CallbackKind::Write, Callback::new(action));
    }

    /// Register the action fired once the TLS handshake resolves.
    pub fn set_handshake_callback<F>(&self, action: F)
    where
        F: Fn(&O, &Arc<Self>, Outcome, usize) + Send + Sync + 'static,
    {
        self.callbacks.set(CallbackKind::Handshake, Callback::new(action));
    }

    /// Register the client-only readiness action, fired after a successful
    /// handshake and before any read completion.
    pub fn set_ready_callback<F>(&self, action: F)
    where
        F: Fn(&O, &Arc<Self>, Outcome, usize) + Send + Sync + 'static,
    {
        self.callbacks.set(CallbackKind::Ready, Callback::new(action));
    }

    /// Read until a full delimited message is buffered.
    ///
    /// The read callback receives the bytes transferred by this operation.
    pub fn begin_read(self: &Arc<Self>) -> ConnectionResult<()> {
        let mut reader = self.take_reader()?;
        let callback = self.callbacks.get(CallbackKind::Read);
        let shutdown = self.closed_signal();
        let handler = Arc::clone(self);
        tracing::trace!(connection_id = %self.id, "Delimited read issued");

        self.runtime.spawn(async move {
            let result = tokio::select! {
                result = reader.read_until_delimiter() => result,
                _ = shutdown => Err(ConnectionError::ConnectionClosed),
            };
            handler
                .complete_read(CallbackKind::Read, reader, result, callback)
                .await;
        });
        Ok(())
    }

    /// Single transport read of up to `max_bytes`, completing through the
    /// async-read callback. The bytes land in the receive buffer.
    pub fn begin_read_some(self: &Arc<Self>, max_bytes: usize) -> ConnectionResult<()> {
        let mut reader = self.take_reader()?;
        let callback = self.callbacks.get(CallbackKind::AsyncRead);
        let shutdown = self.closed_signal();
        let handler = Arc::clone(self);
        tracing::trace!(connection_id = %self.id, max_bytes, "Raw read issued");

        self.runtime.spawn(async move {
            let result = tokio::select! {
                result = reader.read(max_bytes) => result,
                _ = shutdown => Err(ConnectionError::ConnectionClosed),
            };
            handler
                .complete_read(CallbackKind::AsyncRead, reader, result, callback)
                .await;
        });
        Ok(())
    }

    /// Direct read of up to `max_bytes` into the receive buffer, returned to
    /// the caller instead of a callback.
    pub async fn read_some(&self, max_bytes: usize) -> ConnectionResult<usize> {
        let reader = self.take_reader()?;
        let shutdown = self.closed_signal();
        let mut lease = ReaderLease {
            handler: self,
            reader: Some(reader),
        };
        let Some(reader) = lease.reader.as_mut() else {
            return Err(ConnectionError::InvalidState("read slot is empty"));
        };
        let result = tokio::select! {
            result = reader.read(max_bytes) => result,
            _ = shutdown => Err(ConnectionError::ConnectionClosed),
        };
        if let Ok(bytes) = &result {
            metrics::record_bytes_read(self.kind, *bytes);
        }
        result
    }

    /// Send `payload` followed by the delimiter.
    ///
    /// The write callback receives the wire byte count, delimiter included.
    pub fn begin_write(self: &Arc<Self>, payload: impl Into<Vec<u8>>) -> ConnectionResult<()> {
        let mut writer = self.take_writer()?;
        let payload = payload.into();
        let callback = self.callbacks.get(CallbackKind::Write);
        let shutdown = self.closed_signal();
        let handler = Arc::clone(self);
        tracing::trace!(connection_id = %self.id, bytes = payload.len(), "Write issued");

        self.runtime.spawn(async move {
            let result = tokio::select! {
                result = writer.write(&payload) => result,
                _ = shutdown => Err(ConnectionError::ConnectionClosed),
            };
            handler.complete_write(writer, result, callback).await;
        });
        Ok(())
    }

    /// Start the TLS handshake. Valid once, from `HandshakeState::Unstarted`.
    pub fn begin_handshake(self: &Arc<Self>) -> ConnectionResult<()> {
        let (socket, endpoint) = {
            let mut state = self.lock_state();
            let closed = state.closed;
            let Some(session) = state.session.as_mut() else {
                return Err(ConnectionError::InvalidState(
                    "plain transport has no handshake",
                ));
            };
            if closed && session.state() == HandshakeState::Unstarted {
                return Err(ConnectionError::ConnectionClosed);
            }
            session.begin()?
        };
        let on_handshake = self.callbacks.get(CallbackKind::Handshake);
        let on_ready = self.callbacks.get(CallbackKind::Ready);
        let shutdown = self.closed_signal();
        let handler = Arc::clone(self);
        tracing::debug!(
            connection_id = %self.id,
            role = %self.role,
            direction = ?endpoint.direction(),
            "TLS handshake started"
        );

        self.runtime.spawn(async move {
            let result = tokio::select! {
                result = endpoint.handshake(socket) => result,
                _ = shutdown => Err(ConnectionError::ConnectionClosed),
            };
            handler.complete_handshake(result, on_handshake, on_ready).await;
        });
        Ok(())
    }

    /// Remove the first buffered message and its delimiter.
    pub fn extract_message(&self) -> ConnectionResult<Vec<u8>> {
        let mut state = self.lock_state();
        state.ensure_open()?;
        state
            .reader
            .get_mut("cannot extract while a read is in flight")?
            .extract_message()
    }

    /// Discard every buffered byte, including any that follow a message.
    pub fn reset_buffer(&self) -> ConnectionResult<()> {
        let mut state = self.lock_state();
        state.ensure_open()?;
        state
            .reader
            .get_mut("cannot reset while a read is in flight")?
            .reset_buffer();
        Ok(())
    }

    /// Number of bytes currently held in the receive buffer.
    pub fn buffered_len(&self) -> ConnectionResult<usize> {
        let mut state = self.lock_state();
        state.ensure_open()?;
        let reader = state
            .reader
            .get_mut("cannot inspect while a read is in flight")?;
        Ok(reader.buffer().len())
    }

    /// Release the transport. Idempotent.
    ///
    /// In-flight operations complete with `ConnectionClosed`; new ones fail
    /// with it immediately.
    pub fn close(&self) {
        let (reader, writer) = {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            state.closed = true;
            if let Some(session) = state.session.as_mut() {
                session.release();
            }
            (state.reader.release(), state.writer.release())
        };
        self.closed.send_replace(true);
        metrics::record_closed(self.kind);
        tracing::debug!(connection_id = %self.id, role = %self.role, "Connection closed");

        if let Some(mut writer) = writer {
            let id = self.id;
            self.runtime.spawn(async move {
                match tokio::time::timeout(CLOSE_GRACE, writer.shutdown()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        tracing::trace!(connection_id = %id, error = %error, "Transport shutdown failed")
                    }
                    Err(_) => {
                        tracing::trace!(connection_id = %id, "Transport shutdown timed out")
                    }
                }
                drop(reader);
            });
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, HandlerState<S>> {
        self.state.lock().expect("connection state mutex poisoned")
    }

    fn take_reader(&self) -> ConnectionResult<Reader<S>> {
        let mut state = self.lock_state();
        state.ensure_open()?;
        state.reader.take("a read is already in flight")
    }

    fn take_writer(&self) -> ConnectionResult<Writer<S>> {
        let mut state = self.lock_state();
        state.ensure_open()?;
        state.writer.take("a write is already in flight")
    }

    fn return_reader(&self, reader: Reader<S>) {
        let mut state = self.lock_state();
        if !state.closed {
            state.reader.restore(reader);
        }
    }

    /// Resolves once `close` has been called.
    fn closed_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut closed = self.closed.subscribe();
        async move {
            let _ = closed.wait_for(|closed| *closed).await;
        }
    }

    async fn complete_read(
        self: Arc<Self>,
        kind: CallbackKind,
        reader: Reader<S>,
        result: ConnectionResult<usize>,
        callback: Option<Arc<Callback<O, S>>>,
    ) {
        let _turn = self.dispatch.lock().await;
        self.return_reader(reader);

        let (outcome, bytes) = into_completion(result);
        match &outcome {
            Ok(()) => {
                metrics::record_bytes_read(self.kind, bytes);
                tracing::trace!(connection_id = %self.id, kind = kind.as_str(), bytes, "Read completed");
            }
            Err(error) => {
                tracing::debug!(connection_id = %self.id, kind = kind.as_str(), error = %error, "Read failed");
            }
        }
        self.dispatch_callback(kind, callback.as_deref(), outcome, bytes);
    }

    async fn complete_write(
        self: Arc<Self>,
        writer: Writer<S>,
        result: ConnectionResult<usize>,
        callback: Option<Arc<Callback<O, S>>>,
    ) {
        let _turn = self.dispatch.lock().await;
        {
            let mut state = self.lock_state();
            if !state.closed {
                state.writer.restore(writer);
            }
        }

        let (outcome, bytes) = into_completion(result);
        match &outcome {
            Ok(()) => {
                metrics::record_bytes_written(self.kind, bytes);
                tracing::trace!(connection_id = %self.id, bytes, "Write completed");
            }
            Err(error) => {
                tracing::debug!(connection_id = %self.id, error = %error, "Write failed");
            }
        }
        self.dispatch_callback(CallbackKind::Write, callback.as_deref(), outcome, bytes);
    }

    async fn complete_handshake(
        self: Arc<Self>,
        result: ConnectionResult<TlsStream<S>>,
        on_handshake: Option<Arc<Callback<O, S>>>,
        on_ready: Option<Arc<Callback<O, S>>>,
    ) {
        let _turn = self.dispatch.lock().await;
        match result.and_then(|stream| self.install_tls(stream)) {
            Ok(()) => {
                metrics::record_handshake(self.role, true);
                tracing::info!(connection_id = %self.id, role = %self.role, "TLS handshake complete");

                let post = PostHandshake::for_role(self.role);
                if post.start_read_loop {
                    if let Err(error) = self.begin_read() {
                        tracing::warn!(
                            connection_id = %self.id,
                            error = %error,
                            "Could not start read loop after handshake"
                        );
                    }
                }
                self.dispatch_callback(CallbackKind::Handshake, on_handshake.as_deref(), Ok(()), 0);
                if post.signal_ready {
                    self.dispatch_callback(CallbackKind::Ready, on_ready.as_deref(), Ok(()), 0);
                }
            }
            Err(error) => {
                {
                    let mut state = self.lock_state();
                    if let Some(session) = state.session.as_mut() {
                        session.fail();
                    }
                }
                metrics::record_handshake(self.role, false);
                tracing::warn!(
                    connection_id = %self.id,
                    role = %self.role,
                    error = %error,
                    "TLS handshake failed"
                );
                self.dispatch_callback(CallbackKind::Handshake, on_handshake.as_deref(), Err(error), 0);
                self.close();
            }
        }
    }

    fn install_tls(&self, stream: TlsStream<S>) -> ConnectionResult<()> {
        let mut state = self.lock_state();
        state.ensure_open()?;
        let (reader, writer) =
            FramedStream::new(Transport::Tls(stream), self.read_chunk).into_parts();
        state.reader.restore(reader);
        state.writer.restore(writer);
        if let Some(session) = state.session.as_mut() {
            session.succeed();
        }
        Ok(())
    }

    /// Run `callback`; the caller holds the dispatch lock.
    fn dispatch_callback(
        self: &Arc<Self>,
        kind: CallbackKind,
        callback: Option<&Callback<O, S>>,
        outcome: Outcome,
        bytes: usize,
    ) {
        match (callback, outcome) {
            (Some(callback), outcome) => callback.invoke(&self.owner, self, outcome, bytes),
            (None, Ok(())) => {
                tracing::trace!(connection_id = %self.id, kind = kind.as_str(), "No callback registered");
            }
            (None, Err(error)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    kind = kind.as_str(),
                    error = %error,
                    "Operation failed with no callback registered"
                );
            }
        }
    }
}

impl<O, S> ConnectionHandler<O, S> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.kind
    }

    /// The application object this handler serves.
    pub fn owner(&self) -> &Arc<O> {
        &self.owner
    }

    /// `None` for plain connections.
    pub fn handshake_state(&self) -> Option<HandshakeState> {
        self.state
            .lock()
            .expect("connection state mutex poisoned")
            .session
            .as_ref()
            .map(|session| session.state())
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl<O, S> Drop for ConnectionHandler<O, S> {
    fn drop(&mut self) {
        tracing::trace!(connection_id = %self.id, "Connection handler dropped");
    }
}

/// Returns the reader to its slot even if a direct read is cancelled.
struct ReaderLease<'a, O, S>
where
    O: Send + Sync + 'static,
    S: Socket,
{
    handler: &'a ConnectionHandler<O, S>,
    reader: Option<Reader<S>>,
}

impl<O, S> Drop for ReaderLease<'_, O, S>
where
    O: Send + Sync + 'static,
    S: Socket,
{
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            self.handler.return_reader(reader);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
    use tokio::sync::mpsc;

    struct Probe {
        events: mpsc::UnboundedSender<(CallbackKind, bool, usize)>,
    }

    fn plain_pair(role: Role) -> (Arc<ConnectionHandler<Probe, DuplexStream>>, DuplexStream, mpsc::UnboundedReceiver<(CallbackKind, bool, usize)>) {
        let (events, rx) = mpsc::unbounded_channel();
        let (peer, local) = duplex(256);
        let handler = ConnectionHandler::plain(
            Handle::current(),
            Arc::new(Probe { events }),
            role,
            local,
            &ConnectionConfig::default(),
        );
        (handler, peer, rx)
    }

    #[tokio::test]
    async fn second_read_is_invalid_state() {
        let (handler, _peer, _rx) = plain_pair(Role::Server);
        handler.begin_read().unwrap();
        let err = handler.begin_read().unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidState(_)));
        let err = handler.begin_read_some(16).unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidState(_)));
    }

    #[tokio::test]
    async fn extract_during_read_is_invalid_state() {
        let (handler, _peer, _rx) = plain_pair(Role::Server);
        handler.begin_read().unwrap();
        assert!(matches!(
            handler.extract_message(),
            Err(ConnectionError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn plain_connection_has_no_handshake() {
        let (handler, _peer, _rx) = plain_pair(Role::Client);
        assert_eq!(handler.handshake_state(), None);
        assert!(matches!(
            handler.begin_handshake(),
            Err(ConnectionError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_new_operations() {
        let (handler, _peer, _rx) = plain_pair(Role::Server);
        handler.close();
        handler.close();
        assert!(handler.is_closed());
        assert!(matches!(handler.begin_read(), Err(ConnectionError::ConnectionClosed)));
        assert!(matches!(handler.begin_write("x"), Err(ConnectionError::ConnectionClosed)));
        assert!(matches!(handler.extract_message(), Err(ConnectionError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn direct_read_lands_in_buffer() {
        let (handler, mut peer, _rx) = plain_pair(Role::Server);
        peer.write_all(b"abc\r\n\r\n").await.unwrap();
        let mut total = 0;
        while total < 7 {
            total += handler.read_some(64).await.unwrap();
        }
        assert_eq!(handler.buffered_len().unwrap(), 7);
        assert_eq!(handler.extract_message().unwrap(), b"abc");
        handler.reset_buffer().unwrap();
        assert_eq!(handler.buffered_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn write_and_read_some_fire_their_callbacks() {
        let (handler, mut peer, mut rx) = plain_pair(Role::Client);
        handler.set_write_callback(|probe: &Probe, _, outcome, bytes| {
            let _ = probe.events.send((CallbackKind::Write, outcome.is_ok(), bytes));
        });
        handler.set_async_read_callback(|probe: &Probe, _, outcome, bytes| {
            let _ = probe.events.send((CallbackKind::AsyncRead, outcome.is_ok(), bytes));
        });

        handler.begin_write("hi").unwrap();
        assert_eq!(rx.recv().await.unwrap(), (CallbackKind::Write, true, 6));
        let mut wire = [0u8; 6];
        peer.read_exact(&mut wire).await.unwrap();
        assert_eq!(&wire, b"hi\r\n\r\n");

        peer.write_all(b"xy").await.unwrap();
        handler.begin_read_some(1).unwrap();
        assert_eq!(rx.recv().await.unwrap(), (CallbackKind::AsyncRead, true, 1));
    }

    #[tokio::test]
    async fn handler_outlives_caller_reference_until_callback() {
        let (handler, mut peer, mut rx) = plain_pair(Role::Server);
        handler.set_read_callback(|probe: &Probe, handler, outcome, bytes| {
            assert!(Arc::strong_count(handler) >= 1);
            let _ = probe.events.send((CallbackKind::Read, outcome.is_ok(), bytes));
        });
        handler.begin_read().unwrap();
        let weak = Arc::downgrade(&handler);
        drop(handler);
        assert!(weak.upgrade().is_some());

        peer.write_all(b"m\r\n\r\n").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), (CallbackKind::Read, true, 5));
    }

    #[test]
    fn slot_transitions() {
        let mut slot = Slot::Idle(1u8);
        assert_eq!(slot.take("busy").unwrap(), 1);
        assert!(matches!(slot.take("busy"), Err(ConnectionError::InvalidState("busy"))));
        slot.restore(2);
        assert_eq!(slot.release(), Some(2));
        assert!(slot.take("busy").is_err());
        assert!(matches!(slot, Slot::Unavailable));
    }
}
