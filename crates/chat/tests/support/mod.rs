//! In-memory transport scripting for engine tests: each scripted session
//! exposes what the engine wrote and lets the test feed inbound lines or
//! close the connection.

use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cb_core::transport::{
    ChatTransport, LineReader, LineWriter, TransportError, TransportSession,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

#[derive(Default)]
pub struct MemoryTransport {
    sessions: Mutex<VecDeque<TransportSession>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts one future session; `open` hands sessions out in order.
    pub fn script_session(&self) -> SessionController {
        let (wrote_tx, wrote_rx) = mpsc::unbounded_channel();
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        self.sessions.lock().unwrap().push_back(TransportSession {
            writer: Box::new(MemoryWriter { tx: wrote_tx }),
            reader: Box::new(MemoryReader { rx: feed_rx }),
        });
        SessionController {
            wrote: wrote_rx,
            feed: Some(feed_tx),
        }
    }
}

#[async_trait]
impl ChatTransport for MemoryTransport {
    async fn open(&self, endpoint: &str) -> Result<TransportSession, TransportError> {
        self.sessions
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Connect {
                endpoint: endpoint.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "no scripted session"),
            })
    }
}

pub struct SessionController {
    wrote: mpsc::UnboundedReceiver<String>,
    feed: Option<mpsc::UnboundedSender<String>>,
}

impl SessionController {
    pub fn feed_line(&self, line: &str) {
        self.feed
            .as_ref()
            .expect("session already closed")
            .send(line.to_string())
            .expect("reader gone");
    }

    /// Standard auth acknowledgment.
    pub fn welcome(&self) {
        self.feed_line(":server 001 bot :Welcome, GLHF!");
    }

    /// Simulates the server dropping the connection.
    pub fn close(&mut self) {
        self.feed = None;
    }

    pub async fn expect_line(&mut self) -> String {
        timeout(Duration::from_secs(2), self.wrote.recv())
            .await
            .expect("timed out waiting for an outbound line")
            .expect("writer dropped")
    }

    pub async fn expect_no_line_for(&mut self, window: Duration) {
        if let Ok(line) = timeout(window, self.wrote.recv()).await {
            panic!("unexpected outbound line: {line:?}");
        }
    }
}

struct MemoryWriter {
    tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl LineWriter for MemoryWriter {
    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        self.tx
            .send(line.to_string())
            .map_err(|_| TransportError::Closed)
    }
}

struct MemoryReader {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl LineReader for MemoryReader {
    async fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.rx.recv().await)
    }
}
