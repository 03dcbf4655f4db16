//! Chatroom event fan-out
//!
//! Listeners register for one [`ChatroomEventKind`] or for everything, either
//! as a callback or as an unbounded channel. Events are dispatched on the
//! caller's thread at the moment the adapter emits them. The registry lock is
//! released before any callback runs, so callbacks may subscribe, unsubscribe,
//! or call back into the adapter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use voxroom_common::{ChatroomEvent, ChatroomEventKind};

/// Handle returned by a subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&ChatroomEvent) + Send + Sync>;

#[derive(Clone)]
enum Sink {
    Callback(Callback),
    Channel(mpsc::UnboundedSender<ChatroomEvent>),
}

struct Listener {
    id: ListenerId,
    /// `None` receives every kind
    filter: Option<ChatroomEventKind>,
    sink: Sink,
}

/// Registry of chatroom event listeners
pub struct EventHub {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Call `callback` for every event of `kind`
    pub fn subscribe<F>(&self, kind: ChatroomEventKind, callback: F) -> ListenerId
    where
        F: Fn(&ChatroomEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), Sink::Callback(Arc::new(callback)))
    }

    /// Call `callback` for every event
    pub fn subscribe_all<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ChatroomEvent) + Send + Sync + 'static,
    {
        self.register(None, Sink::Callback(Arc::new(callback)))
    }

    /// Receive every event on an unbounded channel
    ///
    /// The listener is dropped automatically once the receiver is gone.
    pub fn subscribe_channel(&self) -> (ListenerId, mpsc::UnboundedReceiver<ChatroomEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.register(None, Sink::Channel(tx)), rx)
    }

    /// Remove a listener; returns `false` if it was already gone
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Remove every listener
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no listeners are registered
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver `event` to every matching listener
    pub fn emit(&self, event: &ChatroomEvent) {
        let kind = event.kind();

        let targets: Vec<(ListenerId, Sink)> = self
            .lock()
            .iter()
            .filter(|l| l.filter.is_none_or(|k| k == kind))
            .map(|l| (l.id, l.sink.clone()))
            .collect();

        let mut closed = Vec::new();
        for (id, sink) in targets {
            match sink {
                Sink::Callback(callback) => callback(event),
                Sink::Channel(tx) => {
                    if tx.send(event.clone()).is_err() {
                        closed.push(id);
                    }
                }
            }
        }

        if !closed.is_empty() {
            self.lock().retain(|l| !closed.contains(&l.id));
        }
    }

    fn register(&self, filter: Option<ChatroomEventKind>, sink: Sink) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Listener { id, filter, sink });
        id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
