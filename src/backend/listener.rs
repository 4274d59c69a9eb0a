//! Owned notification guards.
//!
//! A [`Listener`] is the receiving end of a registration. Dropping it (or
//! calling [`Listener::unsubscribe`]) removes the registration and stops any
//! task feeding it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::types::events::{AuthEvent, ChangeEvent};

/// Guard for auth-state notifications.
pub type AuthListener = Listener<AuthEvent>;

/// Guard for record-change notifications.
pub type FeedSubscription = Listener<ChangeEvent>;

struct RegistryInner<T> {
    next_id: u64,
    senders: HashMap<u64, mpsc::UnboundedSender<T>>,
}

/// Fan-out of events to every live listener.
pub struct ListenerRegistry<T> {
    inner: Arc<Mutex<RegistryInner<T>>>,
}

impl<T> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                next_id: 0,
                senders: HashMap::new(),
            })),
        }
    }

    /// Registers a new listener.
    pub fn register(&self) -> Listener<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = match self.inner.lock() {
            Ok(mut inner) => {
                inner.next_id += 1;
                let id = inner.next_id;
                inner.senders.insert(id, tx);
                id
            }
            Err(_) => 0,
        };
        Listener {
            id,
            rx,
            registry: Some(Arc::downgrade(&self.inner)),
            cancel: None,
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.senders.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every sender; live listeners then see the end of their stream.
    pub fn close_all(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.senders.clear();
        }
    }
}

impl<T: Clone> ListenerRegistry<T> {
    /// Delivers `event` to every listener; closed receivers are pruned.
    pub fn emit(&self, event: T) {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .senders
                .retain(|_, tx| tx.send(event.clone()).is_ok());
        }
    }
}

/// Receiving end of a registration.
pub struct Listener<T> {
    id: u64,
    rx: mpsc::UnboundedReceiver<T>,
    registry: Option<Weak<Mutex<RegistryInner<T>>>>,
    cancel: Option<CancellationToken>,
}

impl<T> Listener<T> {
    /// A listener fed by a task rather than a registry; `cancel` stops it.
    pub fn detached(rx: mpsc::UnboundedReceiver<T>, cancel: CancellationToken) -> Self {
        Self {
            id: 0,
            rx,
            registry: None,
            cancel: Some(cancel),
        }
    }

    /// Next event, or `None` once the source is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Removes the registration. Same as dropping the guard.
    pub fn unsubscribe(self) {}
}

impl<T> Drop for Listener<T> {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(inner) = self.registry.take().and_then(|weak| weak.upgrade()) {
            if let Ok(mut inner) = inner.lock() {
                inner.senders.remove(&self.id);
            }
        }
    }
}
