//! Terminal front end for the agent chat panel.
//!
//! Run with: cargo run -p chat-cli-demo
//!
//! Reads `AGENT_PANEL_*` environment variables for the backend location and
//! `AGENT_PANEL_ACCESS_TOKEN` for silent sign-in. Type `/help` for commands.

use std::sync::Arc;

use agent_panel_core::{EventBus, Message, PanelConfig, Role};
use agent_panel_session::{ChatPanel, EnvToken, SendOutcome};
use agent_panel_transport::{ChannelSupervisor, HttpTransport, WebSocketConnector};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
commands:
  /login <user> <password>  sign in with credentials
  /reconnect                retry silent sign-in
  /new                      start a new chat
  /history                  list past conversations
  /load <id>                open a past conversation
  /logout                   end the session
  /quit                     exit
anything else is sent to the assistant";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = PanelConfig::from_env()?;
    let transport = Arc::new(HttpTransport::new(&config)?);
    let panel = Arc::new(ChatPanel::with_transport(
        transport,
        Arc::new(EnvToken::default()),
    ));

    let bus = EventBus::new();
    let supervisor =
        ChannelSupervisor::from_config(Arc::new(WebSocketConnector), &config, bus.clone()).spawn();

    // Keep the cached conversation list current when the backend says so.
    let refresher = {
        let panel = Arc::clone(&panel);
        let mut events = bus.subscribe_stream();
        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                tracing::debug!(kind = %event.kind, "realtime refresh");
                if !panel.has_session() {
                    continue;
                }
                if let Err(e) = panel.list_conversations().await {
                    tracing::warn!("refresh failed: {e}");
                }
            }
        })
    };

    panel.open().await;
    println!("status: {:?}", panel.status());
    if let Some(error) = panel.snapshot().error {
        println!("{error}");
    }
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "/quit" => break,
            "/help" => println!("{HELP}"),
            "/login" => {
                let (user, password) = rest.split_once(' ').unwrap_or((rest, ""));
                match panel.authenticate_with_credentials(user, password).await {
                    Ok(id) => println!("signed in (session {id})"),
                    Err(e) => println!("{e}"),
                }
            }
            "/reconnect" => match panel.reconnect().await {
                Ok(id) => println!("signed in (session {id})"),
                Err(e) => println!("{e}"),
            },
            "/new" => {
                if panel.start_new().await {
                    println!("new chat started");
                }
            }
            "/history" => match panel.list_conversations().await {
                Ok(conversations) if conversations.is_empty() => println!("no conversations yet"),
                Ok(conversations) => {
                    for c in conversations {
                        println!("  {}  {}  {}", c.id, c.created_at, c.title);
                    }
                }
                Err(e) => println!("{e}"),
            },
            "/load" => match panel.load_conversation(rest).await {
                Ok(()) => panel.transcript().iter().for_each(print_message),
                Err(e) => println!("{e}"),
            },
            "/logout" => {
                panel.new_connection().await;
                println!("signed out");
            }
            _ => {
                let before = panel.transcript().len();
                let outcome = panel.send(line).await;
                if outcome == SendOutcome::Ignored && !line.is_empty() {
                    println!("not connected; use /login or /reconnect");
                }
                panel.transcript().iter().skip(before + 1).for_each(print_message);
            }
        }
    }

    refresher.abort();
    supervisor.shutdown().await;
    Ok(())
}

fn print_message(message: &Message) {
    match (message.role, &message.agent_label) {
        (Role::User, _) => println!("you> {}", message.content),
        (Role::Agent, Some(label)) => println!("{label}> {}", message.content),
        (Role::Agent, None) => println!("assistant> {}", message.content),
        (Role::System, _) => println!("-- {}", message.content),
    }
}
