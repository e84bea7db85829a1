use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;

use crate::error::ChatError;

/// How an outbound payload is encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Message,
    Command,
    RawLine,
}

/// One pending outbound chat action. Immutable once enqueued; `enqueued_at`
/// anchors the staleness budget.
#[derive(Debug, Clone)]
pub struct OutboundAction {
    pub channel: String,
    pub payload: String,
    pub kind: ActionKind,
    pub enqueued_at: Instant,
}

impl OutboundAction {
    pub fn new(channel: impl Into<String>, payload: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
            kind,
            enqueued_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}

/// Creates the bounded queue pair: a cloneable producer handle for facade
/// callers and the single-consumer receiver owned by the send loop.
pub fn bounded(capacity: usize) -> (OutboundQueue, QueueReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (OutboundQueue { tx }, QueueReceiver { rx })
}

/// Producer side. `enqueue` is a bounded attempt: a full queue is reported
/// as an error, never an indefinite wait and never a silent drop.
#[derive(Clone)]
pub struct OutboundQueue {
    tx: mpsc::Sender<OutboundAction>,
}

impl OutboundQueue {
    pub fn enqueue(&self, action: OutboundAction) -> Result<(), ChatError> {
        self.tx.try_send(action).map_err(|err| match err {
            TrySendError::Full(_) => ChatError::QueueFull,
            TrySendError::Closed(_) => ChatError::NotConnected,
        })
    }
}

/// Consumer side, held by exactly one send loop.
pub struct QueueReceiver {
    rx: mpsc::Receiver<OutboundAction>,
}

impl QueueReceiver {
    /// Waits up to `timeout` for the next action. `None` on timeout keeps
    /// the send loop responsive to shutdown signals.
    pub async fn dequeue(&mut self, timeout: Duration) -> Option<OutboundAction> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }
}
