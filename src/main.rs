use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use huddle::config::Config;
use huddle::{EntityMapper, EventClient, EventMapper, LoadError};

#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(about = "Load events from the API, falling back to the local cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/huddle/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Load events and print them as JSON
  Show {
    #[arg(required = true)]
    ids: Vec<String>,

    /// Give up on each event after this many seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
  },
  /// Remove cached copies of events
  Evict {
    #[arg(required = true)]
    ids: Vec<String>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _guard = huddle::logging::init()?;

  let config = Config::load(args.config.as_deref())?;
  let client = EventClient::new(&config)?;

  match args.command {
    Command::Show { ids, timeout } => show(&client, &ids, Duration::from_secs(timeout)).await,
    Command::Evict { ids } => evict(&client, &ids).await,
  }
}

/// Load all ids concurrently, each bounded by `limit`.
async fn show(client: &EventClient, ids: &[String], limit: Duration) -> Result<()> {
  let outcomes = join_all(
    ids
      .iter()
      .map(|id| async move { (id, tokio::time::timeout(limit, client.get_event(id)).await) }),
  )
  .await;

  let mut failures = 0;
  let mut session_expired = false;

  for (id, outcome) in outcomes {
    match outcome {
      Ok(Ok(loaded)) => {
        let json = EventMapper.to_json(&loaded.data);
        println!("# {} ({})", id, loaded.source);
        println!("{}", serde_json::to_string_pretty(&json)?);
      }
      Ok(Err(LoadError::NotRecoverable { .. })) => {
        failures += 1;
        session_expired = true;
        eprintln!("{}: session expired, sign in again", id);
      }
      Ok(Err(e)) => {
        failures += 1;
        warn!(id = %id, error = %e, "load failed");
        eprintln!("{}: could not load, try again ({})", id, e);
      }
      Err(_) => {
        failures += 1;
        warn!(id = %id, "load timed out");
        eprintln!("{}: timed out after {}s, try again", id, limit.as_secs());
      }
    }
  }

  if session_expired {
    return Err(eyre!("Session expired"));
  }
  if failures > 0 {
    return Err(eyre!("{} of {} events failed to load", failures, ids.len()));
  }
  Ok(())
}

async fn evict(client: &EventClient, ids: &[String]) -> Result<()> {
  for id in ids {
    client
      .evict(id)
      .await
      .map_err(|e| eyre!("Failed to evict {}: {}", id, e))?;
    println!("evicted {}", id);
  }
  Ok(())
}
