//! chatdeck - terminal demo screens for a hosted chat SDK
//!
//! A channel manager and a two-party support chat, run against an
//! in-process demo workspace.

mod api;
mod config;
mod demo;
mod draft;
mod linked_text;
mod models;
mod pagination;
mod reactions;
mod sdk;
mod session;
mod tui;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use demo::Roles;
use sdk::memory::MemoryServer;
use session::Session;
use tui::LogBuffer;

#[derive(Parser)]
#[command(name = "chatdeck")]
#[command(about = "Demo screens for a hosted chat SDK", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage channels: create, fetch, update, delete, presence, typing
    Manager,

    /// Open the support conversation
    Chat {
        /// Act as the support agent instead of the customer
        #[arg(long)]
        agent: bool,
    },

    /// List every channel, page by page
    Channels {
        /// Channels requested per page (defaults to `page_limit`)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Print recent messages of a channel
    History {
        /// Channel ID (from `channels` output)
        channel: String,

        /// Number of messages (defaults to `history_count`)
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Show who is present on a channel
    Presence {
        /// Channel ID (from `channels` output)
        channel: String,
    },

    /// Print the resolved configuration
    Config,
}

impl Commands {
    fn is_interactive(&self) -> bool {
        matches!(self, Commands::Manager | Commands::Chat { .. })
    }
}

/// Route tracing output to stderr, or into `logs` while a screen owns the terminal.
fn init_logging(verbose: bool, logs: Option<&LogBuffer>) {
    let filter = if verbose { "debug" } else { "info" };
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()));
    match logs {
        Some(buffer) => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(buffer.clone()),
            )
            .init(),
        None => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn workspace(config: &Config) -> Result<MemoryServer> {
    demo::workspace(config.typing_timeout())
        .await
        .context("Failed to seed the demo workspace")
}

/// Session for the channel manager and the one-shot commands.
fn manager_session(server: &MemoryServer, config: &Config) -> Session {
    let user_id = config
        .user_id
        .as_deref()
        .unwrap_or(demo::DEFAULT_MANAGER_USER);
    Session::new(Arc::new(server.client(user_id)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref())?;
    let config = Config::load(&config_path)?;

    let logs = cli
        .command
        .is_interactive()
        .then(|| LogBuffer::new(config.log_capacity));
    init_logging(cli.verbose, logs.as_ref());
    Config::log_source(&config_path);

    match cli.command {
        Commands::Manager => {
            let server = workspace(&config).await?;
            let session = manager_session(&server, &config);
            let result = tui::run_manager(&session, &config, logs).await;
            session.close().await;
            result?;
        }
        Commands::Chat { agent } => {
            let server = workspace(&config).await?;
            let roles = Roles::new(agent);
            let mut session = Session::new(Arc::new(server.client(roles.me.id)));
            if config.peer_replies {
                session.spawn_background(demo::run_peer(server.client(roles.peer.id), roles.me));
            }
            let result = tui::run_chat(&session, roles, &config, logs).await;
            session.close().await;
            result?;
        }
        Commands::Channels { limit } => {
            let server = workspace(&config).await?;
            let session = manager_session(&server, &config);
            let limit = limit.unwrap_or(config.page_limit);
            tracing::debug!(limit, max_pages = config.max_pages, "Listing channels...");
            let result = api::list_channels(&session, limit, config.max_pages).await;
            session.close().await;
            result?;
        }
        Commands::History { channel, count } => {
            let server = workspace(&config).await?;
            let session = manager_session(&server, &config);
            let count = count.unwrap_or(config.history_count);
            let result = api::show_history(&session, &channel, count).await;
            session.close().await;
            result?;
        }
        Commands::Presence { channel } => {
            let server = workspace(&config).await?;
            let session = manager_session(&server, &config);
            let result = api::show_presence(&session, &channel).await;
            session.close().await;
            result?;
        }
        Commands::Config => {
            println!("# {}", config_path.display());
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
