//! Presence & messaging coordinator
//!
//! This binary drives the coordinator with a scripted local scenario so the
//! routing and fan-out behavior can be observed without wiring up a real
//! transport.
//!
//! Usage:
//!   cargo run -- demo                      # Run the scripted demo
//!   cargo run -- demo --cap 10            # Smaller per-room history cap

use std::env;

use confab::{ClientCommand, Coordinator, CoordinatorConfig, ServerEvent};
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "demo" => {
            run_demo(&args).await?;
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage();
            return Ok(());
        }
    }

    Ok(())
}

fn print_usage() {
    println!("Confab - In-Memory Presence & Messaging Coordinator");
    println!();
    println!("USAGE:");
    println!("    cargo run -- demo [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    demo                Run a scripted multi-session scenario");
    println!("    help                Show this help message");
    println!();
    println!("OPTIONS:");
    println!("    --cap <NUM>         Per-room history cap (default: 100)");
    println!("    --page <NUM>        History page size on room join (default: 50)");
    println!();
    println!("EXAMPLES:");
    println!("    cargo run -- demo");
    println!("    RUST_LOG=debug cargo run -- demo --cap 10");
}

fn parse_flag(args: &[String], flag: &str, default: usize) -> usize {
    for i in 0..args.len() {
        if args[i] == flag && i + 1 < args.len() {
            if let Ok(value) = args[i + 1].parse() {
                return value;
            }
        }
    }
    default
}

/// Spawn a task that plays the transport's role for one client: drain the
/// outbound channel and log what arrives.
fn spawn_client(
    name: &'static str,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            info!("[{}] <- {}", name, event.name());
        }
    })
}

async fn run_demo(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let defaults = CoordinatorConfig::default();
    let config = CoordinatorConfig {
        room_history_cap: parse_flag(args, "--cap", defaults.room_history_cap),
        history_page_limit: parse_flag(args, "--page", defaults.history_page_limit),
        ..defaults
    };

    info!("Starting coordinator demo");
    info!("  - Default room: {}", config.default_room);
    info!("  - Room history cap: {}", config.room_history_cap);
    info!("  - History page size: {}", config.history_page_limit);

    let coordinator = Coordinator::new(config);

    // Three simulated connections, ids minted the way a transport would.
    let alice_id = uuid::Uuid::new_v4().to_string();
    let bob_id = uuid::Uuid::new_v4().to_string();
    let carol_id = uuid::Uuid::new_v4().to_string();

    let (alice_tx, alice_rx) = mpsc::unbounded_channel();
    let (bob_tx, bob_rx) = mpsc::unbounded_channel();
    let (carol_tx, carol_rx) = mpsc::unbounded_channel();

    coordinator.attach(&alice_id, alice_tx).await?;
    coordinator.attach(&bob_id, bob_tx).await?;
    coordinator.attach(&carol_id, carol_tx).await?;

    let clients = vec![
        spawn_client("alice", alice_rx),
        spawn_client("bob", bob_rx),
        spawn_client("carol", carol_rx),
    ];

    for (id, name) in [(&alice_id, "alice"), (&bob_id, "bob"), (&carol_id, "carol")] {
        coordinator
            .handle(
                id,
                ClientCommand::Identify {
                    display_name: name.to_string(),
                },
            )
            .await;
    }

    coordinator
        .handle(
            &alice_id,
            ClientCommand::JoinRoom {
                room: "team".to_string(),
            },
        )
        .await;
    coordinator
        .handle(
            &bob_id,
            ClientCommand::JoinRoom {
                room: "team".to_string(),
            },
        )
        .await;

    coordinator
        .handle(
            &bob_id,
            ClientCommand::SetTyping {
                is_typing: true,
                room: Some("team".to_string()),
            },
        )
        .await;

    let deliveries = coordinator
        .handle(
            &bob_id,
            ClientCommand::SendMessage {
                body: Some("morning, team".to_string()),
                room: Some("team".to_string()),
                attachment: None,
            },
        )
        .await;
    let team_message_id = deliveries
        .iter()
        .find_map(|d| match &d.event {
            ServerEvent::RoomMessage { message } => Some(message.id),
            _ => None,
        })
        .ok_or("room message was not appended")?;

    coordinator
        .handle(
            &bob_id,
            ClientCommand::SetTyping {
                is_typing: false,
                room: Some("team".to_string()),
            },
        )
        .await;

    coordinator
        .handle(
            &alice_id,
            ClientCommand::MarkRead {
                message_id: team_message_id,
            },
        )
        .await;
    coordinator
        .handle(
            &alice_id,
            ClientCommand::React {
                message_id: team_message_id,
                kind: "like".to_string(),
            },
        )
        .await;

    coordinator
        .handle(
            &alice_id,
            ClientCommand::SendPrivateMessage {
                to: bob_id.clone(),
                body: Some("lunch later?".to_string()),
                attachment: None,
            },
        )
        .await;

    coordinator.handle(&carol_id, ClientCommand::ListRooms).await;

    coordinator.handle_disconnect(&carol_id).await;

    let stats = coordinator.stats().await;
    info!(
        "Demo complete: {} connections, {} sessions, {} rooms",
        stats.attached_connections, stats.identified_sessions, stats.known_rooms
    );

    // Dropping the outbound channels ends the client tasks.
    coordinator.shutdown().await;
    for client in clients {
        let _ = client.await;
    }

    Ok(())
}
