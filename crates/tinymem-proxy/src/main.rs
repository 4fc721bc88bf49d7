//! tinymem-proxy: CLI entrypoint wiring the state-transition engine
//! together. The HTTP surface itself is out of scope (spec.md section 1) --
//! this binary only demonstrates the diagnostics contract and gives the
//! engine a place to boot from.

mod config;
mod dispatch;

use clap::{Parser, Subcommand};
use dispatch::{handle_diagnostics_request, DiagnosticsRequest, DiagnosticsResponse};
use std::path::PathBuf;
use std::sync::Arc;
use tinymem_etv::{EtvCache, EtvChecker, StdFileReader};
use tinymem_resolver::{NullParser, Resolver};
use tinymem_runtime::Diagnostics;
use tinymem_storage::{Db, Ledger, StateMap, TombstoneTracker, Vault};

#[derive(Parser)]
#[command(name = "tinymem-proxy", version, about = "tinymem state-transition engine")]
struct Cli {
    /// Path to a TOML config file. Defaults to built-in defaults if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply schema migrations and exit.
    Init,
    /// Print aggregate health counters (backs the out-of-scope `/doctor` endpoint).
    Doctor,
    /// Print every entity currently tracked (backs `/state`).
    State,
    /// Print the last N episodes (backs `/recent`).
    Recent {
        #[arg(long, default_value_t = 10)]
        n: u32,
    },
    /// Print the stored prompt artifact for an episode (backs `/debug/last-prompt`).
    LastPrompt { episode_id: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let engine_config = config::load(cli.config.as_deref())?;

    let db = Db::open(
        std::path::Path::new(&engine_config.storage.database_path),
        engine_config.storage.wal_mode,
    )?;
    let vault = Vault::new(db.clone());
    let ledger = Ledger::new(db.clone());
    let state_map = StateMap::new(db.clone());
    let tombstones = TombstoneTracker::new(db);

    // No parser implementation is in scope for the core (spec.md section 6);
    // a real deployment wires in a language-specific grammar here.
    let _resolver = Resolver::new(Arc::new(NullParser), state_map.clone());
    let _etv = EtvChecker::new(Box::new(StdFileReader), EtvCache::new(engine_config.etv.cache_ttl_ms));

    let diagnostics = Diagnostics::new(vault, ledger, state_map, tombstones);

    match cli.command {
        Command::Init => {
            tracing::info!("schema migrations applied");
        }
        Command::Doctor => {
            if let DiagnosticsResponse::Doctor(report) =
                handle_diagnostics_request(&diagnostics, DiagnosticsRequest::Doctor)?
            {
                println!("artifacts: {}", report.artifact_count);
                println!("state_map rows: {}", report.state_map_count);
                println!("tracked episodes: {}", report.tracked_episode_count);
                println!("pending tombstones: {}", report.pending_tombstone_count);
            }
        }
        Command::State => {
            if let DiagnosticsResponse::State(entities) =
                handle_diagnostics_request(&diagnostics, DiagnosticsRequest::State)?
            {
                for entity in entities {
                    println!("{}\t{:?}\t{}", entity.entity_key, entity.state, entity.artifact_hash);
                }
            }
        }
        Command::Recent { n } => {
            if let DiagnosticsResponse::Recent(episodes) =
                handle_diagnostics_request(&diagnostics, DiagnosticsRequest::Recent { n })?
            {
                for episode in episodes {
                    println!("{}\t{}", episode.episode_id, episode.timestamp);
                }
            }
        }
        Command::LastPrompt { episode_id } => {
            if let DiagnosticsResponse::LastPrompt(artifact) = handle_diagnostics_request(
                &diagnostics,
                DiagnosticsRequest::LastPrompt { episode_id },
            )? {
                match artifact {
                    Some(artifact) => println!("{}", artifact.content),
                    None => println!("(no prompt recorded for that episode)"),
                }
            }
        }
    }

    Ok(())
}
