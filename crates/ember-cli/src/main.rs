//! Minimal CLI for protocol verification.
//!
//! Runs the one-shot and room walkthroughs end to end against the
//! in-memory backend, logging each observable step. Useful for eyeballing
//! the protocol without a hosted backend; the integration tests in
//! `ember-harness` assert the same flows.

use std::{process::ExitCode, sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use ember_app::{NoteOutcome, NoteService, RoomRuntime};
use ember_client::{CreateConfig, MessageBody, SessionPhase};
use ember_harness::{MemoryBackend, SimEnv};

#[derive(Parser)]
#[command(name = "ember", about = "Ember protocol walkthroughs on an in-memory backend")]
struct Cli {
    /// RNG seed for the deterministic environment.
    #[arg(long, default_value_t = 7)]
    seed: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish a one-shot note, read it once, show the second read failing.
    Note {
        /// Note text to seal.
        #[arg(default_value = "the cache is under the third floorboard")]
        message: String,
    },

    /// Create a room, chat between two participants, then nuke it.
    Room {
        /// Message the creator sends.
        #[arg(default_value = "meet at the usual place")]
        message: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Note { message } => note_walkthrough(cli.seed, &message).await,
        Command::Room { message } => room_walkthrough(cli.seed, &message).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(reason) => {
            error!("{reason}");
            ExitCode::FAILURE
        },
    }
}

async fn note_walkthrough(seed: u64, message: &str) -> Result<(), String> {
    let backend = Arc::new(MemoryBackend::new());
    let service = NoteService::new(Arc::clone(&backend), SimEnv::seeded(seed));

    let locator =
        service.publish(message, "https://ember.example").await.map_err(|e| e.to_string())?;
    info!(url = %locator.to_url(), "note sealed and stored");
    info!(rows = backend.record_count(), "backend holds ciphertext only");

    match service.open(&locator.to_url()).await {
        NoteOutcome::Revealed { plaintext } => info!(%plaintext, "first read succeeded"),
        NoteOutcome::Denied { reason } => return Err(format!("first read denied: {reason:?}")),
    }
    info!(rows = backend.record_count(), "note burned");

    match service.open(&locator.to_url()).await {
        NoteOutcome::Denied { reason } => info!(?reason, "second read denied, as designed"),
        NoteOutcome::Revealed { .. } => return Err("second read must not succeed".to_owned()),
    }

    Ok(())
}

async fn room_walkthrough(seed: u64, message: &str) -> Result<(), String> {
    let backend = Arc::new(MemoryBackend::new());
    let runtime =
        RoomRuntime::new(Arc::clone(&backend), Arc::clone(&backend), SimEnv::seeded(seed));

    let config = CreateConfig { max_attempts: 8, ttl: Some(Duration::from_secs(3600)) };
    let code = runtime.create("alice", config).await.map_err(|e| e.to_string())?;
    info!(%code, "room created; share the code out-of-band");

    let mut alice = runtime.join("alice", code.as_str()).await.map_err(|e| e.to_string())?;
    let mut bob = runtime.join("bob", code.as_str()).await.map_err(|e| e.to_string())?;

    alice.send(message).await.map_err(|e| e.to_string())?;
    for _ in 0..16 {
        if bob.session().messages().len() >= 2 {
            break;
        }
        let _ = bob.pump().await;
    }

    for entry in bob.session().messages() {
        let alias = entry.alias.as_deref().unwrap_or("?");
        match &entry.body {
            MessageBody::Text(text) => info!(alias, %text, "bob sees"),
            MessageBody::RoomOpened => info!(alias, "room opened"),
            MessageBody::Unreadable => warn!("unreadable record shown as placeholder"),
        }
    }

    alice.nuke().await.map_err(|e| e.to_string())?;
    for _ in 0..16 {
        if !matches!(alice.session().phase(), SessionPhase::Active) {
            break;
        }
        let _ = alice.pump().await;
    }
    for _ in 0..16 {
        if !matches!(bob.session().phase(), SessionPhase::Active) {
            break;
        }
        let _ = bob.pump().await;
    }
    info!(rows = backend.record_count(), "room nuked; every participant terminated");

    Ok(())
}
