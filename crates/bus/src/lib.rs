//! Typed in-process event bus shared by the castbridge modules.
//!
//! `publish` is synchronous and never blocks the caller; each subscriber is
//! backed by its own unbounded channel drained on a dedicated task, so a slow
//! or panicking handler cannot delay delivery to the others. Delivery is
//! at-least-once locally, with no ordering guarantee across distinct event
//! types.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::debug;

type AnyEvent = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Default)]
pub struct EventBus {
    topics: Arc<Mutex<HashMap<TypeId, Vec<mpsc::UnboundedSender<AnyEvent>>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes one event to every live subscriber of its type. Subscribers
    /// whose tasks have gone away are pruned here.
    pub fn publish<E: Any + Send + Sync>(&self, event: E) {
        let event: AnyEvent = Arc::new(event);
        let mut topics = self.topics.lock().unwrap();
        if let Some(senders) = topics.get_mut(&TypeId::of::<E>()) {
            senders.retain(|sender| sender.send(Arc::clone(&event)).is_ok());
        }
    }

    /// Registers `handler` for events of type `E` on its own consumer task.
    pub fn subscribe<E, F>(&self, handler: F)
    where
        E: Any + Send + Sync,
        F: Fn(Arc<E>) + Send + 'static,
    {
        let mut receiver = self.subscribe_channel::<E>();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                handler(event);
            }
        });
    }

    /// Lower-level subscription returning the typed channel directly, handy
    /// in tests and for callers that want to drive consumption themselves.
    pub fn subscribe_channel<E: Any + Send + Sync>(&self) -> mpsc::UnboundedReceiver<Arc<E>> {
        let (any_tx, mut any_rx) = mpsc::unbounded_channel::<AnyEvent>();
        let (typed_tx, typed_rx) = mpsc::unbounded_channel::<Arc<E>>();

        self.topics
            .lock()
            .unwrap()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(any_tx);

        tokio::spawn(async move {
            while let Some(event) = any_rx.recv().await {
                match event.downcast::<E>() {
                    Ok(typed) => {
                        if typed_tx.send(typed).is_err() {
                            // receiver dropped; let the sender get pruned
                            return;
                        }
                    }
                    Err(_) => debug!("event bus delivered a mistyped payload"),
                }
            }
        });

        typed_rx
    }

    /// Number of live subscriptions for an event type, used by tests.
    pub fn subscriber_count<E: Any + Send + Sync>(&self) -> usize {
        self.topics
            .lock()
            .unwrap()
            .get(&TypeId::of::<E>())
            .map(|senders| senders.len())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics = self.topics.lock().unwrap();
        f.debug_struct("EventBus")
            .field("topics", &topics.len())
            .finish()
    }
}
