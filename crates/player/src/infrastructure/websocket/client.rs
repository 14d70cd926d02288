//! Connection driver: runs the core state machine against a real transport.
//!
//! One task owns the transport, the command queue and the reconnect timer,
//! so inbound frames reach the consumer in exactly the order they arrived.

use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use gridtalk_shared::{parse_server_message, ClientMessage, ServerMessage};
use tokio::sync::mpsc;
use url::Url;

use super::core::{ConnectionCore, ConnectionEvent};
use super::transport::{Connector, Transport, TransportError};
use crate::infrastructure::messaging::{set_connection_state, ConnectionState, Control};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Every handle was dropped; the driver task ends.
    Stop,
}

pub struct ConnectionDriver {
    core: ConnectionCore,
    connector: Arc<dyn Connector>,
    url: Url,
    commands: mpsc::Receiver<ClientMessage>,
    commands_open: bool,
    control: mpsc::UnboundedReceiver<Control>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    state: Arc<AtomicU8>,
    published: ConnectionState,
}

impl ConnectionDriver {
    pub fn new(
        core: ConnectionCore,
        connector: Arc<dyn Connector>,
        url: Url,
        commands: mpsc::Receiver<ClientMessage>,
        control: mpsc::UnboundedReceiver<Control>,
        events: mpsc::UnboundedSender<ConnectionEvent>,
        state: Arc<AtomicU8>,
    ) -> Self {
        let published = core.state();
        set_connection_state(&state, published);
        Self {
            core,
            connector,
            url,
            commands,
            commands_open: true,
            control,
            events,
            state,
            published,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                control = self.control.recv() => match control {
                    None => break,
                    Some(Control::Connect) => {
                        if self.connect_and_serve().await == Flow::Stop {
                            break;
                        }
                    }
                    Some(Control::Disconnect) => {
                        self.core.disconnect();
                        self.publish_state();
                    }
                    Some(Control::SetReconnect(enabled)) => self.core.set_reconnect_enabled(enabled),
                },
                command = self.commands.recv(), if self.commands_open => self.drop_command(command),
            }
        }
        tracing::debug!("Connection driver stopped");
    }

    async fn connect_and_serve(&mut self) -> Flow {
        if !self.core.begin_connect() {
            tracing::debug!(state = %self.core.state(), "Connect ignored");
            return Flow::Continue;
        }

        loop {
            self.publish_state();

            let flow = match self.connector.open(&self.url).await {
                Ok(transport) => self.serve(transport).await,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to open transport");
                    Flow::Continue
                }
            };

            let reconnect = self.core.on_close();
            self.publish_state();
            if flow == Flow::Stop {
                return Flow::Stop;
            }
            let Some(delay) = reconnect else {
                return Flow::Continue;
            };

            tracing::info!(delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    control = self.control.recv() => match control {
                        None => return Flow::Stop,
                        Some(Control::Disconnect) => {
                            tracing::info!("Reconnect cancelled by disconnect");
                            self.core.disconnect();
                            self.publish_state();
                            return Flow::Continue;
                        }
                        Some(Control::SetReconnect(enabled)) => {
                            self.core.set_reconnect_enabled(enabled);
                            if !enabled {
                                tracing::info!("Reconnect cancelled");
                                return Flow::Continue;
                            }
                        }
                        Some(Control::Connect) => {}
                    },
                    command = self.commands.recv(), if self.commands_open => self.drop_command(command),
                }
            }

            if !self.core.begin_connect() {
                return Flow::Continue;
            }
        }
    }

    async fn serve(&mut self, transport: Transport) -> Flow {
        let Transport {
            outbound,
            mut inbound,
        } = transport;

        if let Some(join) = self.core.on_open() {
            if let Err(e) = write(&outbound, &join).await {
                tracing::warn!(error = %e, "Failed to send JOIN");
                return Flow::Continue;
            }
        }
        self.publish_state();

        loop {
            tokio::select! {
                frame = inbound.recv() => match frame {
                    Some(text) => {
                        self.handle_frame(&text);
                        if self.core.state() == ConnectionState::Failed {
                            return Flow::Continue;
                        }
                    }
                    None => {
                        tracing::info!("Transport closed");
                        return Flow::Continue;
                    }
                },
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(message) if self.core.state() == ConnectionState::Joined => {
                        if let Err(e) = write(&outbound, &message).await {
                            tracing::warn!(message = message.kind(), error = %e, "Failed to send command");
                            return Flow::Continue;
                        }
                    }
                    other => self.drop_command(other),
                },
                control = self.control.recv() => match control {
                    None => {
                        self.core.disconnect();
                        return Flow::Stop;
                    }
                    Some(Control::Disconnect) => {
                        tracing::info!("Disconnecting");
                        self.core.disconnect();
                        return Flow::Continue;
                    }
                    Some(Control::Connect) => tracing::debug!("Already connected"),
                    Some(Control::SetReconnect(enabled)) => self.core.set_reconnect_enabled(enabled),
                },
            }
        }
    }

    fn handle_frame(&mut self, text: &str) {
        let message = match parse_server_message(text) {
            Ok(ServerMessage::Unknown) => {
                tracing::debug!("Ignoring unknown server message type");
                return;
            }
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed server frame");
                return;
            }
        };

        let events = self.core.on_message(&message);
        self.publish_state();
        for event in events {
            if let ConnectionEvent::ServerError { message, terminal } = &event {
                if *terminal {
                    tracing::error!(error = %message, "Server refused session; reconnection disabled");
                } else {
                    tracing::warn!(error = %message, "Server error");
                }
            }
            self.emit(event);
        }
    }

    fn drop_command(&mut self, command: Option<ClientMessage>) {
        match command {
            Some(message) => tracing::warn!(
                message = message.kind(),
                state = %self.core.state(),
                "Dropping command while not joined"
            ),
            None => self.commands_open = false,
        }
    }

    fn publish_state(&mut self) {
        let state = self.core.state();
        set_connection_state(&self.state, state);
        if state != self.published {
            self.published = state;
            tracing::info!(%state, "Connection state changed");
            self.emit(ConnectionEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Connection event consumer dropped");
        }
    }
}

async fn write(outbound: &mpsc::Sender<String>, message: &ClientMessage) -> Result<(), TransportError> {
    let text = match message.encode() {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(message = message.kind(), error = %e, "Failed to encode command");
            return Ok(());
        }
    };
    outbound.send(text).await.map_err(|_| TransportError::Closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use gridtalk_domain::{EntityId, UserId};
    use tokio::time::{timeout, Instant};

    use crate::infrastructure::messaging::{CommandBus, ConnectionHandle};
    use crate::ports::outbound::CommandSink;

    struct FakeServer {
        opened_at: Instant,
        to_client: mpsc::Sender<String>,
        from_client: mpsc::Receiver<String>,
    }

    struct FakeConnector {
        opens: mpsc::UnboundedSender<FakeServer>,
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn open(&self, _url: &Url) -> Result<Transport, TransportError> {
            let (out_tx, out_rx) = mpsc::channel(32);
            let (in_tx, in_rx) = mpsc::channel(32);
            self.opens
                .send(FakeServer {
                    opened_at: Instant::now(),
                    to_client: in_tx,
                    from_client: out_rx,
                })
                .map_err(|_| TransportError::Closed)?;
            Ok(Transport::new(out_tx, in_rx))
        }
    }

    struct Harness {
        handle: ConnectionHandle,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
        bus: CommandBus,
        opens: mpsc::UnboundedReceiver<FakeServer>,
    }

    fn spawn_player() -> Harness {
        let join = ClientMessage::Join {
            token: "t".into(),
            user_id: UserId::new("u1"),
            display_name: "Ada".into(),
        };
        let (opens_tx, opens) = mpsc::unbounded_channel();
        let (bus, commands) = CommandBus::channel();
        let (control_tx, control) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicU8::new(0));

        let driver = ConnectionDriver::new(
            ConnectionCore::new(Some(join), Duration::from_millis(2_000)),
            Arc::new(FakeConnector { opens: opens_tx }),
            Url::parse("ws://test/ws").expect("url"),
            commands,
            control,
            events_tx,
            Arc::clone(&state),
        );
        tokio::spawn(driver.run());

        Harness {
            handle: ConnectionHandle::new(state, control_tx),
            events,
            bus,
            opens,
        }
    }

    async fn next_matching(
        events: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
        pred: impl Fn(&ConnectionEvent) -> bool,
    ) -> ConnectionEvent {
        loop {
            let event = events.recv().await.expect("event stream open");
            if pred(&event) {
                return event;
            }
        }
    }

    /// Lets the driver drain everything ready before time moves.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn join_session(h: &mut Harness) -> FakeServer {
        h.handle.connect();
        let mut server = h.opens.recv().await.expect("transport opened");
        let join = server.from_client.recv().await.expect("join frame");
        assert!(join.contains(r#""type":"JOIN""#));

        server
            .to_client
            .send(r#"{"type":"WELCOME","entityId":"e1"}"#.into())
            .await
            .expect("send welcome");
        let joined = next_matching(&mut h.events, |e| {
            matches!(e, ConnectionEvent::Joined { .. })
        })
        .await;
        assert_eq!(
            joined,
            ConnectionEvent::Joined {
                entity_id: EntityId::new("e1")
            }
        );
        server
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_once_after_fixed_delay() {
        let mut h = spawn_player();
        let server = join_session(&mut h).await;

        let closed_at = Instant::now();
        drop(server);

        let second = h.opens.recv().await.expect("reconnect attempt");
        let waited = second.opened_at - closed_at;
        assert!(waited >= Duration::from_millis(2_000));
        assert!(waited < Duration::from_millis(2_010));

        assert!(timeout(Duration::from_secs(10), h.opens.recv())
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_error_disables_reconnect() {
        let mut h = spawn_player();
        let server = join_session(&mut h).await;

        server
            .to_client
            .send(r#"{"type":"ERROR","error":"User already connected"}"#.into())
            .await
            .expect("send error");
        let event = next_matching(&mut h.events, |e| {
            matches!(e, ConnectionEvent::ServerError { .. })
        })
        .await;
        assert_eq!(
            event,
            ConnectionEvent::ServerError {
                message: "User already connected".into(),
                terminal: true
            }
        );
        drop(server);

        assert!(timeout(Duration::from_secs(10), h.opens.recv())
            .await
            .is_err());
        assert_eq!(h.handle.state(), ConnectionState::Failed);

        h.handle.connect();
        settle().await;
        assert!(h.opens.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_is_idempotent() {
        let mut h = spawn_player();
        h.handle.connect();
        h.handle.connect();

        let _server = h.opens.recv().await.expect("first open");
        assert!(timeout(Duration::from_secs(5), h.opens.recv())
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect() {
        let mut h = spawn_player();
        let server = join_session(&mut h).await;

        drop(server);
        settle().await;
        h.handle.disconnect();

        assert!(timeout(Duration::from_secs(10), h.opens.recv())
            .await
            .is_err());
        assert_eq!(h.handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn commands_flow_only_after_welcome() {
        let mut h = spawn_player();
        h.handle.connect();
        let mut server = h.opens.recv().await.expect("open");
        server.from_client.recv().await.expect("join");

        h.bus.send(ClientMessage::Respawn).expect("queued");
        settle().await;

        server
            .to_client
            .send(r#"{"type":"WELCOME","entityId":"e1"}"#.into())
            .await
            .expect("welcome");
        next_matching(&mut h.events, |e| {
            matches!(e, ConnectionEvent::Joined { .. })
        })
        .await;

        h.bus.send(ClientMessage::EndConversation).expect("queued");
        let frame = server.from_client.recv().await.expect("command frame");
        assert_eq!(frame, r#"{"type":"END_CONVERSATION"}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_skipped() {
        let mut h = spawn_player();
        let server = join_session(&mut h).await;

        server
            .to_client
            .send("{not json".into())
            .await
            .expect("send");
        server
            .to_client
            .send(r#"{"type":"ERROR","error":"Target busy"}"#.into())
            .await
            .expect("send");

        let event = next_matching(&mut h.events, |e| {
            !matches!(e, ConnectionEvent::StateChanged(_))
        })
        .await;
        assert_eq!(
            event,
            ConnectionEvent::ServerError {
                message: "Target busy".into(),
                terminal: false
            }
        );
    }
}
