#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use switchboard::{
    AdapterSet, Config, EnvCredentialStore, JsonlTurnStore, SessionManager, TurnStore,
    provider::build_adapter_set,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "switchboard",
    about = "Session orchestration core for multi-backend AI assistants",
    version
)]
struct Cli {
    /// Path to config.toml (defaults to ~/.config/switchboard/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe every configured model once and print the health table.
    Status,
    /// Send a single message through the orchestration core.
    Send {
        /// Model to request; falls back through its chain if down.
        #[arg(long)]
        model: Option<String>,
        /// The message content.
        message: String,
    },
}

fn build_manager(config: Config) -> Result<SessionManager> {
    let adapters: AdapterSet = build_adapter_set(&config, &EnvCredentialStore)?;
    let store: Option<Arc<dyn TurnStore>> = match &config.persistence.turn_log_dir {
        Some(dir) => Some(Arc::new(JsonlTurnStore::new(dir.clone())?)),
        None => None,
    };
    Ok(SessionManager::new(config, adapters, store)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Status => {
            let manager = build_manager(config)?;
            manager.probe_all().await;
            let table = manager.list_model_health();
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        Commands::Send { model, message } => {
            let requested = model.unwrap_or_else(|| config.default_model.clone());
            let manager = build_manager(config)?;
            let session = manager.create_session()?;
            let turn = manager
                .send_message(&session.id, &requested, &message, None)
                .await?;
            let effective = turn.model.as_deref().unwrap_or(&requested);
            if effective != requested {
                eprintln!("(answered by {effective} after fallback from {requested})");
            }
            println!("{}", turn.content);
            manager.close_session(&session.id)?;
        }
    }

    Ok(())
}
