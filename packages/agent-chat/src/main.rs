//! Agent Chat - terminal chat client for Agent Core
//!
//! Opens a session with one agent, prints its transcript and sends every plain
//! line typed at the prompt as a chat message.

mod api;
mod commands;
mod config;
mod events;
mod state;
mod views;

use std::path::PathBuf;
use std::sync::Arc;

use agent_chat_core::{AgentId, Transport};
use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::commands::{Command, HELP};
use crate::config::{AppConfig, Overrides};
use crate::state::{AppState, Notice};

#[derive(Parser)]
#[command(name = "agent-chat")]
#[command(about = "Chat with an Agent Core agent from the terminal")]
#[command(version)]
struct Cli {
    /// Path to config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Tenant sent as x-tenant-id
    #[arg(long)]
    tenant: Option<String>,

    /// Agent to open on startup
    #[arg(short, long)]
    agent: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            tenant_id: self.tenant.clone(),
            agent_id: self.agent.clone(),
            request_timeout_secs: self.timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout belongs to the transcript
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref(), cli.overrides())?;

    tracing::info!("Starting Agent Chat against {}", config.base_url);

    let transport: Arc<dyn Transport> = Arc::new(api::connect(&config));
    let (notice_tx, mut notices) = mpsc::unbounded_channel();
    let mut state = AppState::new(transport, config.session_config(), notice_tx);

    match config.agent_id.as_deref() {
        Some(agent) => open(&mut state, AgentId::new(agent)).await,
        None => println!("No agent selected. Use /agent <id> to start chatting."),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                match Command::parse(&line) {
                    Ok(Command::Send(text)) => {
                        state.send(text);
                    }
                    Ok(Command::SwitchAgent(agent_id)) => open(&mut state, agent_id).await,
                    Ok(Command::ReloadHistory) => state.reload_history().await,
                    Ok(Command::Metrics) => {
                        if let Some(metrics) = state.refresh_metrics().await {
                            for line in views::metrics::render_metrics(metrics) {
                                println!("{}", line);
                            }
                        }
                    }
                    Ok(Command::Help) => {
                        if let Some(agent_id) = state.active_agent() {
                            println!("Chatting with {}", agent_id);
                        }
                        println!("{}", HELP);
                    }
                    Ok(Command::Quit) => break,
                    Err(e) => println!("{}", e),
                }
            }
            Some(notice) = notices.recv() => print_notice(&notice),
        }
    }

    tracing::info!("Agent Chat exiting");
    Ok(())
}

/// Switch agents and attach a printer to the new transcript
async fn open(state: &mut AppState, agent_id: AgentId) {
    let session = state.open_agent(agent_id).await;
    println!("-- chatting with {} --", session.agent_id());

    // Stops by itself when the session is replaced
    events::start_render_loop(session.store().clone(), |line| println!("{}", line));
}

fn print_notice(notice: &Notice) {
    match notice {
        Notice::Info(_) => println!("  {}", notice.text()),
        Notice::Warning(_) => println!("  ! {}", notice.text()),
    }
}
