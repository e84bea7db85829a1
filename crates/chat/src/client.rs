use std::sync::{Arc, Mutex};

use cb_bus::EventBus;
use cb_core::credentials::CredentialSource;
use cb_core::transport::ChatTransport;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ChatConfig;
use crate::connection::{Control, Engine, EngineHandle};
use crate::error::ChatError;
use crate::proto;
use crate::publisher::EventPublisher;
use crate::queue::{ActionKind, OutboundAction, OutboundQueue, QueueReceiver, bounded};
use crate::router::CommandRouter;

struct ChatState {
    queue_tx: OutboundQueue,
    parked_rx: Option<QueueReceiver>,
    engine: Option<EngineHandle>,
    pending_joins: Vec<String>,
}

/// Public entry point of the chat module. Send-family calls enqueue an
/// outbound action and return immediately; delivery outcomes and connection
/// transitions are observed on the event bus.
pub struct ChatClient {
    config: ChatConfig,
    transport: Arc<dyn ChatTransport>,
    credentials: Arc<dyn CredentialSource>,
    bus: EventBus,
    router: Arc<CommandRouter>,
    state: Mutex<ChatState>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient").finish_non_exhaustive()
    }
}

impl ChatClient {
    pub fn new(
        config: ChatConfig,
        transport: Arc<dyn ChatTransport>,
        credentials: Arc<dyn CredentialSource>,
        bus: EventBus,
    ) -> Result<Self, ChatError> {
        config.validate()?;
        let (queue_tx, queue_rx) = bounded(config.queue_capacity);
        let router = Arc::new(CommandRouter::new(config.command_triggers.clone()));
        Ok(Self {
            config,
            transport,
            credentials,
            bus,
            router,
            state: Mutex::new(ChatState {
                queue_tx,
                parked_rx: Some(queue_rx),
                engine: None,
                pending_joins: Vec::new(),
            }),
        })
    }

    /// Spawns a fresh connection engine. A previous session that reached
    /// `Closed` leaves no residue; calling while a session is live is an
    /// error.
    pub fn connect(&self) -> Result<(), ChatError> {
        let mut state = self.state.lock().unwrap();
        if let Some(engine) = &state.engine {
            if !engine.task.is_finished() {
                return Err(ChatError::AlreadyConnected);
            }
        }

        let queue_rx = match state.parked_rx.take() {
            Some(rx) => rx,
            None => {
                // the previous engine consumed the receiver; start a fresh queue
                let (tx, rx) = bounded(self.config.queue_capacity);
                state.queue_tx = tx;
                rx
            }
        };

        let (control_tx, control_rx) = mpsc::unbounded_channel();
        for channel in state.pending_joins.drain(..) {
            let _ = control_tx.send(Control::Join(channel));
        }

        let cancel = CancellationToken::new();
        let engine = Engine::new(
            self.config.clone(),
            Arc::clone(&self.transport),
            Arc::clone(&self.credentials),
            EventPublisher::new(self.bus.clone()),
            Arc::clone(&self.router),
        );
        let task = tokio::spawn(engine.run(queue_rx, control_rx, cancel.clone()));
        state.engine = Some(EngineHandle {
            control_tx,
            cancel,
            task,
        });
        Ok(())
    }

    /// Signals the engine and both loops to exit; pending outbound actions
    /// are discarded under the fire-and-forget contract.
    pub fn disconnect(&self) -> Result<(), ChatError> {
        let mut state = self.state.lock().unwrap();
        match state.engine.take() {
            Some(engine) => {
                engine.cancel.cancel();
                Ok(())
            }
            None => Err(ChatError::NotConnected),
        }
    }

    pub fn send_message(&self, channel: &str, text: &str) -> Result<(), ChatError> {
        self.enqueue(OutboundAction::new(
            proto::normalize_channel(channel),
            proto::sanitize(text),
            ActionKind::Message,
        ))
    }

    pub fn send_command(&self, channel: &str, trigger: &str, args: &str) -> Result<(), ChatError> {
        self.enqueue(OutboundAction::new(
            proto::normalize_channel(channel),
            proto::sanitize(&format!("{trigger}{args}")),
            ActionKind::Command,
        ))
    }

    /// Enqueues a raw protocol line, written verbatim by the send loop.
    pub fn send_raw(&self, line: &str) -> Result<(), ChatError> {
        self.enqueue(OutboundAction::new(
            "*",
            proto::sanitize(line),
            ActionKind::RawLine,
        ))
    }

    /// Joins now when the session is live, otherwise records the intent and
    /// replays it once a connection reaches ready.
    pub fn join_channel(&self, channel: &str) -> Result<(), ChatError> {
        let channel = proto::normalize_channel(channel);
        let mut state = self.state.lock().unwrap();
        if let Some(engine) = &state.engine {
            if engine.control_tx.send(Control::Join(channel.clone())).is_ok() {
                return Ok(());
            }
        }
        if !state.pending_joins.contains(&channel) {
            state.pending_joins.push(channel);
        }
        Ok(())
    }

    pub fn leave_channel(&self, channel: &str) -> Result<(), ChatError> {
        let channel = proto::normalize_channel(channel);
        let mut state = self.state.lock().unwrap();
        state.pending_joins.retain(|c| c != &channel);
        if let Some(engine) = &state.engine {
            let _ = engine.control_tx.send(Control::Leave(channel));
        }
        Ok(())
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn enqueue(&self, action: OutboundAction) -> Result<(), ChatError> {
        let state = self.state.lock().unwrap();
        state.queue_tx.enqueue(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_core::credentials::{AccessToken, StaticCredentials};
    use cb_core::transport::TcpTransport;

    fn client(config: ChatConfig) -> Result<ChatClient, ChatError> {
        ChatClient::new(
            config,
            Arc::new(TcpTransport),
            Arc::new(StaticCredentials::new(AccessToken::new("tok"))),
            EventBus::new(),
        )
    }

    #[tokio::test]
    async fn construction_validates_config() {
        let mut config = ChatConfig::new("bot");
        config.queue_capacity = 0;
        assert!(matches!(client(config), Err(ChatError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn queue_capacity_two_accepts_two_then_rejects() {
        let mut config = ChatConfig::new("bot");
        config.queue_capacity = 2;
        let chat = client(config).unwrap();

        assert!(chat.send_message("demo", "one").is_ok());
        assert!(chat.send_message("demo", "two").is_ok());
        assert_eq!(chat.send_message("demo", "three"), Err(ChatError::QueueFull));
    }

    #[tokio::test]
    async fn disconnect_without_session_reports_not_connected() {
        let chat = client(ChatConfig::new("bot")).unwrap();
        assert_eq!(chat.disconnect(), Err(ChatError::NotConnected));
    }

    #[tokio::test]
    async fn joins_before_connect_are_recorded() {
        let chat = client(ChatConfig::new("bot")).unwrap();
        chat.join_channel("Demo").unwrap();
        chat.join_channel("demo").unwrap();
        let state = chat.state.lock().unwrap();
        assert_eq!(state.pending_joins, vec!["#demo"]);
    }
}
