use std::collections::HashSet;
use std::sync::Arc;

use cb_backpressure::{Admission, TokenBucket};
use cb_core::credentials::CredentialSource;
use cb_core::events::{ConnectionState, DropReason, SendDroppedEvent};
use cb_core::transport::{ChatTransport, LineReader, LineWriter, TransportError};
use cb_telemetry::{TelemetryLabels, record_counter};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::proto;
use crate::publisher::EventPublisher;
use crate::queue::{ActionKind, OutboundAction, QueueReceiver};
use crate::router::{CommandRouter, Routed};

/// Intents from the facade that must be applied by the engine task because
/// only it may write to the transport.
#[derive(Debug)]
pub(crate) enum Control {
    Join(String),
    Leave(String),
}

/// Control results fed back from the receive loop.
#[derive(Debug)]
enum Signal {
    AuthAccepted,
    AuthRejected(String),
    Ping(String),
    Joined(String),
    Parted(String),
    SessionClosed(Option<TransportError>),
}

/// Why the ready loop ended.
enum End {
    Reconnect,
    Fatal,
    Cancelled,
}

/// Outcome of one delivery attempt.
enum Deliver {
    Delivered,
    Dropped,
    Requeue(OutboundAction),
    Cancelled,
}

pub(crate) struct EngineHandle {
    pub control_tx: mpsc::UnboundedSender<Control>,
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

/// Owner of the transport session and the only mutator of the connection
/// state and channel membership. Other tasks observe both exclusively
/// through published events.
pub(crate) struct Engine {
    config: ChatConfig,
    transport: Arc<dyn ChatTransport>,
    credentials: Arc<dyn CredentialSource>,
    publisher: EventPublisher,
    router: Arc<CommandRouter>,
    state: ConnectionState,
    membership: HashSet<String>,
    desired: Vec<String>,
    bucket: TokenBucket,
    labels: TelemetryLabels,
}

impl Engine {
    pub(crate) fn new(
        config: ChatConfig,
        transport: Arc<dyn ChatTransport>,
        credentials: Arc<dyn CredentialSource>,
        publisher: EventPublisher,
        router: Arc<CommandRouter>,
    ) -> Self {
        let bucket = TokenBucket::new(config.rate_limit);
        Self {
            config,
            transport,
            credentials,
            publisher,
            router,
            state: ConnectionState::Disconnected,
            membership: HashSet::new(),
            desired: Vec::new(),
            bucket,
            labels: TelemetryLabels::new("chat"),
        }
    }

    fn transition(&mut self, new: ConnectionState) {
        if self.state == new {
            return;
        }
        info!(from = self.state.as_str(), to = new.as_str(), "connection state change");
        self.publisher.connection_change(self.state, new);
        self.state = new;
    }

    pub(crate) async fn run(
        mut self,
        mut queue_rx: QueueReceiver,
        mut control_rx: mpsc::UnboundedReceiver<Control>,
        cancel: CancellationToken,
    ) {
        let mut attempt: u32 = 0;
        let mut held: Option<OutboundAction> = None;

        loop {
            if cancel.is_cancelled() {
                self.transition(ConnectionState::Closed);
                return;
            }
            self.transition(ConnectionState::Connecting);

            let transport = Arc::clone(&self.transport);
            let endpoint = self.config.endpoint.clone();
            let opened = tokio::select! {
                _ = cancel.cancelled() => {
                    self.transition(ConnectionState::Closed);
                    return;
                }
                opened = transport.open(&endpoint) => opened,
            };
            let session = match opened {
                Ok(session) => session,
                Err(err) => {
                    warn!(endpoint = %self.config.endpoint, error = %err, "transport connect failed");
                    if !self.backoff(&mut attempt, &cancel).await {
                        self.drop_held(&mut held, DropReason::Disconnected);
                        self.transition(ConnectionState::Closed);
                        return;
                    }
                    continue;
                }
            };
            let mut writer = session.writer;

            self.transition(ConnectionState::Authenticating);
            let token = match self.credentials.token().await {
                Ok(token) => token,
                Err(err) => {
                    warn!(error = %err, "credential fetch failed; closing connection");
                    self.transition(ConnectionState::Closed);
                    return;
                }
            };

            self.membership.clear();
            let (signal_tx, mut signal_rx) = mpsc::channel::<Signal>(64);
            let session_cancel = cancel.child_token();
            let recv_task = tokio::spawn(receive_loop(
                session.reader,
                Arc::clone(&self.router),
                self.publisher.clone(),
                signal_tx,
                session_cancel.clone(),
                self.config.login.to_ascii_lowercase(),
            ));

            let auth = self
                .authenticate(&mut writer, &token, &mut signal_rx, &cancel)
                .await;
            let end = match auth {
                AuthOutcome::Ready => {
                    self.transition(ConnectionState::Ready);
                    attempt = 0;
                    if self.replay_joins(&mut writer).await {
                        self.ready_loop(
                            &mut writer,
                            &mut queue_rx,
                            &mut control_rx,
                            &mut signal_rx,
                            &mut held,
                            &cancel,
                        )
                        .await
                    } else {
                        End::Reconnect
                    }
                }
                AuthOutcome::Rejected => End::Fatal,
                AuthOutcome::Lost => End::Reconnect,
                AuthOutcome::Cancelled => End::Cancelled,
            };

            session_cancel.cancel();
            recv_task.abort();

            match end {
                End::Reconnect => {
                    record_counter("castbridge_chat_reconnects_total", 1, &self.labels);
                    if !self.backoff(&mut attempt, &cancel).await {
                        self.drop_held(&mut held, DropReason::Disconnected);
                        self.transition(ConnectionState::Closed);
                        return;
                    }
                }
                End::Fatal | End::Cancelled => {
                    self.transition(ConnectionState::Closed);
                    return;
                }
            }
        }
    }

    async fn authenticate(
        &mut self,
        writer: &mut Box<dyn LineWriter>,
        token: &cb_core::credentials::AccessToken,
        signal_rx: &mut mpsc::Receiver<Signal>,
        cancel: &CancellationToken,
    ) -> AuthOutcome {
        if writer
            .write_line(&proto::pass_line(&token.irc_pass()))
            .await
            .is_err()
            || writer
                .write_line(&proto::nick_line(&self.config.login))
                .await
                .is_err()
        {
            return AuthOutcome::Lost;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return AuthOutcome::Cancelled,
                sig = signal_rx.recv() => match sig {
                    Some(Signal::AuthAccepted) => return AuthOutcome::Ready,
                    Some(Signal::AuthRejected(reason)) => {
                        warn!(reason = %reason, "authentication rejected; not retrying");
                        return AuthOutcome::Rejected;
                    }
                    Some(Signal::Ping(payload)) => {
                        if writer.write_line(&proto::pong_line(&payload)).await.is_err() {
                            return AuthOutcome::Lost;
                        }
                    }
                    Some(Signal::SessionClosed(err)) => {
                        if let Some(err) = err {
                            warn!(error = %err, "transport lost during authentication");
                        }
                        return AuthOutcome::Lost;
                    }
                    Some(_) => {}
                    None => return AuthOutcome::Lost,
                },
            }
        }
    }

    /// Re-issues JOIN for every desired channel after a (re)connect.
    /// Returns false when the transport died underneath us.
    async fn replay_joins(&mut self, writer: &mut Box<dyn LineWriter>) -> bool {
        for channel in self.desired.clone() {
            debug!(channel = %channel, "replaying join");
            if writer.write_line(&proto::join_line(&channel)).await.is_err() {
                return false;
            }
        }
        true
    }

    async fn ready_loop(
        &mut self,
        writer: &mut Box<dyn LineWriter>,
        queue_rx: &mut QueueReceiver,
        control_rx: &mut mpsc::UnboundedReceiver<Control>,
        signal_rx: &mut mpsc::Receiver<Signal>,
        held: &mut Option<OutboundAction>,
        cancel: &CancellationToken,
    ) -> End {
        let dequeue_timeout = self.config.dequeue_timeout;
        loop {
            if let Some(action) = held.take() {
                match self.deliver(action, writer, cancel).await {
                    Deliver::Delivered | Deliver::Dropped => {}
                    Deliver::Requeue(action) => {
                        *held = Some(action);
                        return End::Reconnect;
                    }
                    Deliver::Cancelled => return End::Cancelled,
                }
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => return End::Cancelled,
                sig = signal_rx.recv() => {
                    if let Some(end) = self.handle_signal(sig, writer).await {
                        return end;
                    }
                }
                ctrl = control_rx.recv() => {
                    if let Some(end) = self.handle_control(ctrl, writer).await {
                        return end;
                    }
                }
                action = queue_rx.dequeue(dequeue_timeout) => {
                    if let Some(action) = action {
                        match self.deliver(action, writer, cancel).await {
                            Deliver::Delivered | Deliver::Dropped => {}
                            Deliver::Requeue(action) => {
                                *held = Some(action);
                                return End::Reconnect;
                            }
                            Deliver::Cancelled => return End::Cancelled,
                        }
                    }
                }
            }
        }
    }

    async fn handle_signal(
        &mut self,
        sig: Option<Signal>,
        writer: &mut Box<dyn LineWriter>,
    ) -> Option<End> {
        match sig {
            Some(Signal::Ping(payload)) => {
                if writer.write_line(&proto::pong_line(&payload)).await.is_err() {
                    return Some(End::Reconnect);
                }
                None
            }
            Some(Signal::Joined(channel)) => {
                debug!(channel = %channel, "join acknowledged");
                self.membership.insert(channel);
                None
            }
            Some(Signal::Parted(channel)) => {
                self.membership.remove(&channel);
                None
            }
            Some(Signal::SessionClosed(err)) => {
                match err {
                    Some(err) => warn!(error = %err, "transport dropped"),
                    None => info!("transport closed by peer"),
                }
                Some(End::Reconnect)
            }
            Some(Signal::AuthRejected(reason)) => {
                warn!(reason = %reason, "authentication revoked mid-session");
                Some(End::Fatal)
            }
            Some(Signal::AuthAccepted) => None,
            None => Some(End::Reconnect),
        }
    }

    async fn handle_control(
        &mut self,
        ctrl: Option<Control>,
        writer: &mut Box<dyn LineWriter>,
    ) -> Option<End> {
        match ctrl {
            Some(Control::Join(channel)) => {
                if !self.desired.contains(&channel) {
                    self.desired.push(channel.clone());
                }
                if writer.write_line(&proto::join_line(&channel)).await.is_err() {
                    return Some(End::Reconnect);
                }
                None
            }
            Some(Control::Leave(channel)) => {
                self.desired.retain(|c| c != &channel);
                self.membership.remove(&channel);
                if writer.write_line(&proto::part_line(&channel)).await.is_err() {
                    return Some(End::Reconnect);
                }
                None
            }
            // facade handle dropped; treat like an explicit disconnect
            None => Some(End::Cancelled),
        }
    }

    async fn deliver(
        &mut self,
        action: OutboundAction,
        writer: &mut Box<dyn LineWriter>,
        cancel: &CancellationToken,
    ) -> Deliver {
        if action.age() > self.config.staleness_budget {
            self.publisher
                .send_dropped(SendDroppedEvent::now(&action.channel, DropReason::Stale));
            return Deliver::Dropped;
        }

        loop {
            match self.bucket.try_acquire(1) {
                Admission::Granted => break,
                Admission::Wait { until } => {
                    let deadline = action.enqueued_at + self.config.staleness_budget;
                    if until > deadline {
                        self.publisher.send_dropped(SendDroppedEvent::now(
                            &action.channel,
                            DropReason::RateLimited,
                        ));
                        return Deliver::Dropped;
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => return Deliver::Cancelled,
                        _ = sleep_until(until) => {}
                    }
                }
            }
        }

        let line = match action.kind {
            ActionKind::Message | ActionKind::Command => {
                proto::privmsg_line(&action.channel, &action.payload)
            }
            ActionKind::RawLine => action.payload.clone(),
        };
        match writer.write_line(&line).await {
            Ok(()) => {
                record_counter("castbridge_chat_sent_total", 1, &self.labels);
                Deliver::Delivered
            }
            Err(err) => {
                warn!(error = %err, "transport write failed; holding action");
                Deliver::Requeue(action)
            }
        }
    }

    /// Exponential, jittered, capped backoff. Returns false once the retry
    /// budget is spent or the engine was cancelled while sleeping.
    async fn backoff(&mut self, attempt: &mut u32, cancel: &CancellationToken) -> bool {
        *attempt += 1;
        if *attempt > self.config.reconnect.max_retries {
            warn!(attempt = *attempt - 1, "reconnect retry budget exhausted");
            return false;
        }
        self.transition(ConnectionState::Reconnecting);

        let factor = 2f64.powi((*attempt - 1).min(16) as i32);
        let delay = self
            .config
            .reconnect
            .base_backoff
            .mul_f64(factor)
            .min(self.config.reconnect.max_backoff);
        let jittered = delay.mul_f64(rand::rng().random_range(0.875..1.125));
        info!(attempt = *attempt, delay_ms = jittered.as_millis() as u64, "backing off before reconnect");

        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(jittered) => true,
        }
    }

    fn drop_held(&mut self, held: &mut Option<OutboundAction>, reason: DropReason) {
        if let Some(action) = held.take() {
            self.publisher
                .send_dropped(SendDroppedEvent::now(&action.channel, reason));
        }
    }
}

enum AuthOutcome {
    Ready,
    Rejected,
    Lost,
    Cancelled,
}

/// Dedicated receive loop: reads inbound lines, routes them, publishes the
/// results, and feeds control results back to the engine task.
async fn receive_loop(
    mut reader: Box<dyn LineReader>,
    router: Arc<CommandRouter>,
    publisher: EventPublisher,
    signals: mpsc::Sender<Signal>,
    cancel: CancellationToken,
    login: String,
) {
    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => return,
            read = reader.read_line() => read,
        };
        match read {
            Ok(Some(raw)) => {
                for routed in router.route(&raw) {
                    let signal = match &routed {
                        Routed::Welcome => Some(Signal::AuthAccepted),
                        Routed::AuthFailure(reason) => Some(Signal::AuthRejected(reason.clone())),
                        Routed::Ping(payload) => Some(Signal::Ping(payload.clone())),
                        Routed::Membership(event) if event.user.eq_ignore_ascii_case(&login) => {
                            match event.action {
                                cb_core::events::MembershipAction::Joined => {
                                    Some(Signal::Joined(event.channel.clone()))
                                }
                                cb_core::events::MembershipAction::Parted => {
                                    Some(Signal::Parted(event.channel.clone()))
                                }
                            }
                        }
                        _ => None,
                    };
                    if let Some(signal) = signal {
                        if signals.send(signal).await.is_err() {
                            return;
                        }
                    }
                    publisher.publish(routed);
                }
            }
            Ok(None) => {
                let _ = signals.send(Signal::SessionClosed(None)).await;
                return;
            }
            Err(err) => {
                let _ = signals.send(Signal::SessionClosed(Some(err))).await;
                return;
            }
        }
    }
}
