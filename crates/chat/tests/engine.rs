mod support;

use std::sync::Arc;
use std::time::Duration;

use cb_bus::EventBus;
use cb_chat::{ChatClient, ChatConfig, ReconnectPolicy};
use cb_core::credentials::{AccessToken, StaticCredentials};
use cb_core::events::{
    CommandEvent, ConnectionState, ConnectionStateEvent, DropReason, MembershipEvent,
    RoomStateEvent, RoomStateKind, SendDroppedEvent,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{Instant, timeout};

use support::MemoryTransport;

fn test_config() -> ChatConfig {
    let mut config = ChatConfig::new("bot");
    config.endpoint = "mem:chat".into();
    config.dequeue_timeout = Duration::from_millis(50);
    config.reconnect = ReconnectPolicy {
        max_retries: 2,
        base_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
    };
    config
}

fn chat_client(config: ChatConfig, transport: Arc<MemoryTransport>, bus: EventBus) -> ChatClient {
    ChatClient::new(
        config,
        transport,
        Arc::new(StaticCredentials::new(AccessToken::new("tok"))),
        bus,
    )
    .unwrap()
}

async fn next_transition(
    rx: &mut UnboundedReceiver<Arc<ConnectionStateEvent>>,
) -> (ConnectionState, ConnectionState) {
    let event = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a connection event")
        .expect("bus closed");
    (event.old, event.new)
}

#[tokio::test]
async fn connect_walks_the_lifecycle_to_ready() {
    let transport = Arc::new(MemoryTransport::new());
    let mut session = transport.script_session();
    let bus = EventBus::new();
    let mut transitions = bus.subscribe_channel::<ConnectionStateEvent>();
    let chat = chat_client(test_config(), transport, bus);

    chat.connect().unwrap();
    assert_eq!(session.expect_line().await, "PASS oauth:tok");
    assert_eq!(session.expect_line().await, "NICK bot");

    assert_eq!(
        next_transition(&mut transitions).await,
        (ConnectionState::Disconnected, ConnectionState::Connecting)
    );
    assert_eq!(
        next_transition(&mut transitions).await,
        (ConnectionState::Connecting, ConnectionState::Authenticating)
    );

    session.welcome();
    assert_eq!(
        next_transition(&mut transitions).await,
        (ConnectionState::Authenticating, ConnectionState::Ready)
    );

    chat.disconnect().unwrap();
}

#[tokio::test]
async fn auth_rejection_is_fatal_and_not_retried() {
    let transport = Arc::new(MemoryTransport::new());
    let mut session = transport.script_session();
    let bus = EventBus::new();
    let mut transitions = bus.subscribe_channel::<ConnectionStateEvent>();
    let chat = chat_client(test_config(), transport, bus);

    chat.connect().unwrap();
    session.expect_line().await;
    session.expect_line().await;
    session.feed_line(":server NOTICE * :Login authentication failed");

    loop {
        let (old, new) = next_transition(&mut transitions).await;
        assert_ne!(new, ConnectionState::Reconnecting, "fatal auth must not retry");
        if new == ConnectionState::Closed {
            assert_eq!(old, ConnectionState::Authenticating);
            break;
        }
    }
}

#[tokio::test]
async fn queued_sends_are_written_only_after_ready() {
    let transport = Arc::new(MemoryTransport::new());
    let mut session = transport.script_session();
    let chat = chat_client(test_config(), transport, EventBus::new());

    chat.connect().unwrap();
    session.expect_line().await; // PASS
    session.expect_line().await; // NICK

    chat.send_message("Demo", "hello there").unwrap();
    session.expect_no_line_for(Duration::from_millis(150)).await;

    session.welcome();
    assert_eq!(session.expect_line().await, "PRIVMSG #demo :hello there");

    chat.disconnect().unwrap();
}

#[tokio::test]
async fn per_channel_order_is_preserved() {
    let transport = Arc::new(MemoryTransport::new());
    let mut session = transport.script_session();
    let chat = chat_client(test_config(), transport, EventBus::new());

    chat.connect().unwrap();
    session.expect_line().await;
    session.expect_line().await;
    session.welcome();

    for i in 0..4 {
        chat.send_message("demo", &format!("msg-{i}")).unwrap();
    }
    for i in 0..4 {
        assert_eq!(
            session.expect_line().await,
            format!("PRIVMSG #demo :msg-{i}")
        );
    }

    chat.disconnect().unwrap();
}

#[tokio::test]
async fn rate_limit_defers_the_second_message() {
    let transport = Arc::new(MemoryTransport::new());
    let mut session = transport.script_session();
    let mut config = test_config();
    config.rate_limit = cb_backpressure::RateLimitPolicy {
        capacity: 1,
        refill_amount: 1,
        refill_period: Duration::from_millis(500),
    };
    config.staleness_budget = Duration::from_secs(5);
    let chat = chat_client(config, transport, EventBus::new());

    chat.connect().unwrap();
    session.expect_line().await;
    session.expect_line().await;
    session.welcome();

    chat.send_message("demo", "first").unwrap();
    chat.send_message("demo", "second").unwrap();

    let first = session.expect_line().await;
    let first_at = Instant::now();
    assert!(first.ends_with(":first"));
    let second = session.expect_line().await;
    assert!(second.ends_with(":second"));
    assert!(
        first_at.elapsed() >= Duration::from_millis(200),
        "second message must wait for a refill"
    );

    chat.disconnect().unwrap();
}

#[tokio::test]
async fn rate_limited_beyond_staleness_is_dropped_with_diagnostic() {
    let transport = Arc::new(MemoryTransport::new());
    let mut session = transport.script_session();
    let bus = EventBus::new();
    let mut drops = bus.subscribe_channel::<SendDroppedEvent>();
    let mut config = test_config();
    config.rate_limit = cb_backpressure::RateLimitPolicy {
        capacity: 1,
        refill_amount: 1,
        refill_period: Duration::from_secs(30),
    };
    config.staleness_budget = Duration::from_millis(200);
    let chat = chat_client(config, transport, bus);

    chat.connect().unwrap();
    session.expect_line().await;
    session.expect_line().await;
    session.welcome();

    chat.send_message("demo", "first").unwrap();
    chat.send_message("demo", "second").unwrap();

    assert!(session.expect_line().await.ends_with(":first"));
    let drop = timeout(Duration::from_secs(2), drops.recv())
        .await
        .expect("timed out waiting for drop diagnostic")
        .unwrap();
    assert_eq!(drop.reason, DropReason::RateLimited);
    assert_eq!(drop.channel, "#demo");

    chat.disconnect().unwrap();
}

#[tokio::test]
async fn stale_actions_are_discarded_not_delivered_late() {
    let transport = Arc::new(MemoryTransport::new());
    let mut session = transport.script_session();
    let bus = EventBus::new();
    let mut drops = bus.subscribe_channel::<SendDroppedEvent>();
    let mut config = test_config();
    config.staleness_budget = Duration::from_millis(50);
    let chat = chat_client(config, transport, bus);

    // enqueued long before the session reaches ready
    chat.send_message("demo", "ancient").unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    chat.connect().unwrap();
    session.expect_line().await;
    session.expect_line().await;
    session.welcome();

    let drop = timeout(Duration::from_secs(2), drops.recv())
        .await
        .expect("timed out waiting for drop diagnostic")
        .unwrap();
    assert_eq!(drop.reason, DropReason::Stale);
    session.expect_no_line_for(Duration::from_millis(150)).await;

    chat.disconnect().unwrap();
}

#[tokio::test]
async fn transport_drop_reconnects_and_replays_joins() {
    let transport = Arc::new(MemoryTransport::new());
    let mut first = transport.script_session();
    let mut second = transport.script_session();
    let bus = EventBus::new();
    let mut transitions = bus.subscribe_channel::<ConnectionStateEvent>();
    let chat = chat_client(test_config(), transport, bus);

    chat.connect().unwrap();
    first.expect_line().await;
    first.expect_line().await;
    first.welcome();

    chat.join_channel("demo").unwrap();
    assert_eq!(first.expect_line().await, "JOIN #demo");

    first.close();

    // fresh session authenticates and replays the join
    assert_eq!(second.expect_line().await, "PASS oauth:tok");
    assert_eq!(second.expect_line().await, "NICK bot");
    second.welcome();
    assert_eq!(second.expect_line().await, "JOIN #demo");

    let mut saw_reconnecting = false;
    while let Ok(Some(event)) =
        timeout(Duration::from_millis(500), transitions.recv()).await
    {
        if event.new == ConnectionState::Reconnecting {
            saw_reconnecting = true;
            break;
        }
    }
    assert!(saw_reconnecting, "a transport drop must pass through Reconnecting");

    chat.disconnect().unwrap();
}

#[tokio::test]
async fn retry_budget_exhaustion_ends_closed() {
    // no scripted sessions: every connect attempt fails
    let transport = Arc::new(MemoryTransport::new());
    let bus = EventBus::new();
    let mut transitions = bus.subscribe_channel::<ConnectionStateEvent>();
    let chat = chat_client(test_config(), transport, bus);

    chat.connect().unwrap();

    let mut reconnecting = 0;
    loop {
        let (_, new) = next_transition(&mut transitions).await;
        match new {
            ConnectionState::Reconnecting => reconnecting += 1,
            ConnectionState::Closed => break,
            _ => {}
        }
    }
    assert_eq!(reconnecting, 2, "budget of two retries means two backoffs");
}

#[tokio::test]
async fn disconnect_mid_ready_closes_promptly() {
    let transport = Arc::new(MemoryTransport::new());
    let mut session = transport.script_session();
    let bus = EventBus::new();
    let mut transitions = bus.subscribe_channel::<ConnectionStateEvent>();
    let chat = chat_client(test_config(), transport, bus);

    chat.connect().unwrap();
    session.expect_line().await;
    session.expect_line().await;
    session.welcome();
    loop {
        let (_, new) = next_transition(&mut transitions).await;
        if new == ConnectionState::Ready {
            break;
        }
    }

    chat.disconnect().unwrap();
    let started = Instant::now();
    loop {
        let (old, new) = next_transition(&mut transitions).await;
        if new == ConnectionState::Closed {
            assert_eq!(old, ConnectionState::Ready);
            break;
        }
    }
    assert!(started.elapsed() < Duration::from_secs(1));

    // the engine terminated, so a fresh connect is accepted again
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(chat.connect().is_ok());
}

#[tokio::test]
async fn inbound_lines_route_to_typed_bus_events() {
    let transport = Arc::new(MemoryTransport::new());
    let mut session = transport.script_session();
    let bus = EventBus::new();
    let mut commands = bus.subscribe_channel::<CommandEvent>();
    let mut room_states = bus.subscribe_channel::<RoomStateEvent>();
    let mut memberships = bus.subscribe_channel::<MembershipEvent>();
    let config = test_config().with_trigger("!").with_trigger("!!");
    let chat = chat_client(config, transport, bus);

    chat.connect().unwrap();
    session.expect_line().await;
    session.expect_line().await;
    session.welcome();

    session.feed_line(":mod!m@h PRIVMSG #demo :!!ban user");
    session.feed_line("ROOMSTATE #chan followers-only=10");
    session.feed_line(":bot!b@h JOIN #demo");

    let command = timeout(Duration::from_secs(2), commands.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(command.trigger, "!!");
    assert_eq!(command.args, "ban user");

    let room_state = timeout(Duration::from_secs(2), room_states.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(room_state.kind, RoomStateKind::FollowersOnly);
    assert_eq!(room_state.value, 10);
    assert_eq!(room_state.channel, "#chan");

    let membership = timeout(Duration::from_secs(2), memberships.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(membership.user, "bot");

    chat.disconnect().unwrap();
}

#[tokio::test]
async fn pings_are_answered_by_the_engine() {
    let transport = Arc::new(MemoryTransport::new());
    let mut session = transport.script_session();
    let chat = chat_client(test_config(), transport, EventBus::new());

    chat.connect().unwrap();
    session.expect_line().await;
    session.expect_line().await;
    session.welcome();

    session.feed_line("PING :keepalive");
    assert_eq!(session.expect_line().await, "PONG :keepalive");

    chat.disconnect().unwrap();
}
