//! Command-line front end for the turn pipeline and replay runner.
//!
//! Exit codes: 0 on success, 1 on any gate or replay failure, 2 on usage
//! errors (clap's default).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use warden_runtime::{
    BundleStore, FixtureAdapter, Intent, TurnPipeline, TurnRequest, WardenConfig,
    replay::replay_file,
};

#[derive(Parser)]
#[command(name = "warden", about = "Deterministic tabletop rules engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one turn through the pipeline.
    RunTurn {
        /// Path to the game state JSON file.
        #[arg(long)]
        state: PathBuf,
        /// Path to the intent JSON file.
        #[arg(long)]
        intent: PathBuf,
        /// Optional RNG seed; re-seeds the state before the turn.
        #[arg(long)]
        seed: Option<u64>,
        /// Envelope fixture file; skips the adapter call.
        #[arg(long)]
        fixture: Option<PathBuf>,
    },
    /// Verify a recorded replay bundle.
    Replay {
        /// Path to the replay bundle JSON file.
        #[arg(long)]
        bundle: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is a convenience for local runs; absence is fine.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run(Cli::parse()).await {
        Ok(ok) => {
            if ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Command::RunTurn {
            state,
            intent,
            seed,
            fixture,
        } => run_turn(state, intent, seed, fixture).await,
        Command::Replay { bundle } => {
            let report = replay_file(&bundle)
                .with_context(|| format!("cannot load replay bundle {}", bundle.display()))?;
            for error in &report.errors {
                tracing::error!("{error}");
            }
            println!("final state hash: {}", report.final_state_hash);
            Ok(report.ok)
        }
    }
}

async fn run_turn(
    state: PathBuf,
    intent_path: PathBuf,
    seed: Option<u64>,
    fixture: Option<PathBuf>,
) -> anyhow::Result<bool> {
    let config = WardenConfig::from_env()?;

    let intent_raw = std::fs::read_to_string(&intent_path)
        .with_context(|| format!("cannot read intent file {}", intent_path.display()))?;
    let intent: Intent =
        serde_json::from_str(&intent_raw).context("intent file failed to parse")?;

    // Without a fixture a live adapter would be needed; the credential
    // check runs up front so misconfiguration aborts before any I/O.
    let adapter = match &fixture {
        Some(path) => FixtureAdapter::new(path.clone()),
        None => {
            config.require_api_key()?;
            anyhow::bail!(
                "no live adapter is wired into this build; pass --fixture for recorded envelopes"
            );
        }
    };

    let store = BundleStore::new(config.data_dir.join("bundles"))?;
    let pipeline = TurnPipeline::new(Arc::new(adapter), store, config.adapter_timeout);

    let outcome = pipeline
        .run_turn(&TurnRequest {
            state_path: state,
            intent,
            seed,
            fixture,
            request_id: None,
        })
        .await;

    for line in &outcome.log {
        tracing::info!("{line}");
    }
    if let Some(gate) = outcome.failure_gate {
        tracing::error!(gate = gate.as_ref(), "turn failed");
        for violation in &outcome.violations {
            tracing::error!("  {violation}");
        }
    }
    if let Some(name) = &outcome.bundle_name {
        println!("bundle: {name}");
    }
    Ok(outcome.ok)
}
