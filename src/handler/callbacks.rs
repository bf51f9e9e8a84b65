//! Completion callback registration.
//!
//! One replaceable action per [`CallbackKind`]. Operations snapshot the action
//! when they are issued, so a re-registration only affects later operations.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::error::Outcome;

use super::ConnectionHandler;

/// Operation kinds that complete through a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    /// Delimited read issued by `begin_read`.
    Read,
    /// Raw chunk read issued by `begin_read_some`.
    AsyncRead,
    /// Framed write issued by `begin_write`.
    Write,
    /// TLS handshake outcome, for every role.
    Handshake,
    /// Post-handshake readiness, client role only.
    Ready,
}

impl CallbackKind {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        match self {
            CallbackKind::Read => 0,
            CallbackKind::AsyncRead => 1,
            CallbackKind::Write => 2,
            CallbackKind::Handshake => 3,
            CallbackKind::Ready => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackKind::Read => "read",
            CallbackKind::AsyncRead => "async-read",
            CallbackKind::Write => "write",
            CallbackKind::Handshake => "handshake",
            CallbackKind::Ready => "ready",
        }
    }
}

type ActionFn<O, S> = dyn Fn(&O, &Arc<ConnectionHandler<O, S>>, Outcome, usize) + Send + Sync;

/// A registered action: receives the owner, the handler handle that keeps
/// the connection alive for the call, the outcome and the byte count.
pub struct Callback<O, S> {
    action: Box<ActionFn<O, S>>,
}

impl<O, S> Callback<O, S> {
    pub fn new<F>(action: F) -> Self
    where
        F: Fn(&O, &Arc<ConnectionHandler<O, S>>, Outcome, usize) + Send + Sync + 'static,
    {
        Self {
            action: Box::new(action),
        }
    }

    pub(crate) fn invoke(
        &self,
        owner: &O,
        handler: &Arc<ConnectionHandler<O, S>>,
        outcome: Outcome,
        bytes: usize,
    ) {
        (self.action)(owner, handler, outcome, bytes)
    }
}

/// Per-kind callback slots.
pub struct CallbackRegistry<O, S> {
    slots: [ArcSwapOption<Callback<O, S>>; CallbackKind::COUNT],
}

impl<O, S> CallbackRegistry<O, S> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| ArcSwapOption::empty()),
        }
    }

    /// Install `callback` for `kind`, replacing any previous one.
    pub fn set(&self, kind: CallbackKind, callback: Callback<O, S>) {
        self.slots[kind.index()].store(Some(Arc::new(callback)));
    }

    /// Snapshot of the action currently registered for `kind`.
    pub fn get(&self, kind: CallbackKind) -> Option<Arc<Callback<O, S>>> {
        self.slots[kind.index()].load_full()
    }

    pub fn is_set(&self, kind: CallbackKind) -> bool {
        self.slots[kind.index()].load().is_some()
    }
}

impl<O, S> Default for CallbackRegistry<O, S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::io::DuplexStream;

    type Registry = CallbackRegistry<AtomicUsize, DuplexStream>;

    #[test]
    fn empty_until_set() {
        let registry = Registry::new();
        assert!(registry.get(CallbackKind::Read).is_none());
        assert!(!registry.is_set(CallbackKind::Write));
    }

    #[test]
    fn snapshot_survives_replacement() {
        let registry = Registry::new();
        registry.set(CallbackKind::Read, Callback::new(|_, _, _, _| {}));
        let first = registry.get(CallbackKind::Read).unwrap();

        registry.set(CallbackKind::Read, Callback::new(|_, _, _, _| {}));
        let second = registry.get(CallbackKind::Read).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(Arc::strong_count(&first), 1);
    }

    #[test]
    fn kinds_are_independent() {
        let registry = Registry::new();
        registry.set(CallbackKind::Handshake, Callback::new(|_, _, _, _| {}));
        assert!(registry.is_set(CallbackKind::Handshake));
        assert!(!registry.is_set(CallbackKind::Ready));
        assert!(!registry.is_set(CallbackKind::AsyncRead));
    }
}
