//! Gridtalk Player - headless composition root.
//!
//! Reads commands from stdin, prints what happens in the world to stdout and
//! logs through `tracing` (stderr).

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gridtalk_player::application::PlanOutcome;
use gridtalk_player::infrastructure::SystemClock;
use gridtalk_player::input::InputCommand;
use gridtalk_player::{
    create_connection, ClientConfig, Connectivity, GameSession, Notice, SessionError, WsConnector,
};

const TICK_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real env vars still apply.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridtalk_player=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Gridtalk Player");

    let config = ClientConfig::from_env()?;
    tracing::info!(url = %config.ws_url, role = ?config.role.kind(), "Configuration loaded");

    let connection = create_connection(&config, Arc::new(WsConnector));
    let handle = connection.handle.clone();
    let mut events = connection.events;
    let mut session = GameSession::new(
        config.role.kind(),
        Arc::new(connection.command_bus),
        Arc::new(SystemClock::new()),
    );

    handle.connect();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    for notice in session.handle(event) {
                        report(&notice);
                    }
                }
                None => {
                    tracing::warn!("Connection task ended");
                    break;
                }
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !run_command(&mut session, &line) {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::debug!("stdin closed; still listening");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin");
                    stdin_open = false;
                }
            },
            _ = ticker.tick() => {
                if let Err(e) = session.tick() {
                    tracing::debug!(error = %e, "Tick failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    handle.set_reconnect_enabled(false);
    handle.disconnect();
    tracing::info!("Gridtalk Player stopped");
    Ok(())
}

/// Execute one input line. Returns false when the user asked to quit.
fn run_command(session: &mut GameSession, line: &str) -> bool {
    let command = match InputCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(e) => {
            println!("{e}");
            return true;
        }
    };

    let result: Result<(), SessionError> = match command {
        InputCommand::Quit => return false,
        InputCommand::Who => {
            print_who(session);
            Ok(())
        }
        InputCommand::MoveTo(goal) => session.move_to(goal).map(|outcome| match outcome {
            PlanOutcome::Planned { steps } => println!("Walking to {goal} ({steps} steps)"),
            PlanOutcome::AlreadyThere => println!("Already at {goal}"),
            PlanOutcome::NoPath => println!("No path to {goal}"),
        }),
        InputCommand::Steer(direction) => session.set_direction(direction),
        InputCommand::Talk(target) => session.request_conversation(&target),
        InputCommand::Accept(request_id) => session.accept_request(&request_id),
        InputCommand::Reject(request_id) => session.reject_request(&request_id),
        InputCommand::End => session.end_conversation(),
        InputCommand::Respawn => session.respawn(),
        InputCommand::Say(text) => session.say(&text),
    };

    if let Err(e) = result {
        println!("{e}");
    }
    true
}

fn print_who(session: &GameSession) {
    let me = session.local_entity();
    let mut entities: Vec<_> = session.world().iter().collect();
    entities.sort_by(|a, b| a.id.cmp(&b.id));

    for entity in entities {
        let marker = if Some(&entity.id) == me.map(|m| &m.id) {
            "*"
        } else {
            " "
        };
        let distance = me
            .map(|m| format!("{:.1}", m.position.distance_to(entity.position)))
            .unwrap_or_default();
        println!(
            "{marker} {:<12} {:<20} {:?} at {} {} {}",
            entity.id,
            entity.label(),
            entity.kind,
            entity.position,
            entity.conversation.state,
            distance
        );
    }

    for (request, stale) in session.incoming_requests() {
        let stale = if stale { " (expired)" } else { "" };
        println!(
            "  request {} from {}{stale}",
            request.request_id, request.initiator_name
        );
    }
}

fn report(notice: &Notice) {
    match notice {
        Notice::Joined { entity_id } => println!("Joined as {entity_id}"),
        Notice::Connectivity(Connectivity::Online) => println!("Connected"),
        Notice::Connectivity(Connectivity::Reconnecting) => {
            println!("Connection lost; reconnecting")
        }
        Notice::Connectivity(Connectivity::ActionRequired(message)) => {
            println!("Session refused: {message}. Close the other session and restart.")
        }
        Notice::Connectivity(Connectivity::Offline) => {}
        Notice::ServerError { message } => println!("Server: {message}"),
        Notice::Chat(message) => {
            let name = if message.sender_name.is_empty() {
                message.sender_id.as_str()
            } else {
                message.sender_name.as_str()
            };
            println!("[{name}] {}", message.content);
        }
        Notice::IncomingRequest(request) => {
            let reason = request
                .reason
                .as_deref()
                .map(|r| format!(": {r}"))
                .unwrap_or_default();
            println!(
                "{} wants to talk{reason}. /accept {id} or /reject {id}",
                request.initiator_name,
                id = request.request_id
            );
        }
        Notice::RequestAccepted { by } => println!("{by} accepted"),
        Notice::RequestRejected { by } => println!("{by} declined"),
        Notice::ConversationStarted { partner_id, .. } => println!("Now talking with {partner_id}"),
        Notice::ConversationEnded { .. } => println!("Conversation ended"),
    }
}
