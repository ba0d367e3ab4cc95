//! recruit server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, optionally imports a JSON seed of leaf data, and serves the JSON API
//! under `/api`.
//!
//! # Password hash generation
//!
//! Seed files carry argon2 PHC strings for each user. To produce one:
//!
//! ```
//! cargo run -p recruit-server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use axum::Router;
use clap::Parser;
use rand_core::OsRng;
use recruit_core::clock::SystemClock;
use recruit_store_sqlite::{Seed, SqliteStore};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Recruitment platform API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Import users, roles, companies and job posts from a JSON seed file
  /// before serving.
  #[arg(long, value_name = "PATH")]
  seed: Option<PathBuf>,

  /// Recompute every job post's active-application counter and exit.
  #[arg(long)]
  reconcile: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
  #[serde(default = "default_host")]
  host:       String,
  #[serde(default = "default_port")]
  port:       u16,
  store_path: PathBuf,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = rpassword_or_stdin()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("RECRUIT"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  tracing::info!(
    schema_version = store.capabilities().schema_version,
    "store opened"
  );

  if let Some(path) = cli.seed {
    let raw = std::fs::read_to_string(&path)
      .with_context(|| format!("failed to read seed file {path:?}"))?;
    let seed: Seed = serde_json::from_str(&raw)
      .with_context(|| format!("failed to parse seed file {path:?}"))?;
    store
      .apply_seed(seed)
      .await
      .context("failed to import seed")?;
    tracing::info!(?path, "seed imported");
  }

  if cli.reconcile {
    let drift = store
      .reconcile_active_counts()
      .await
      .context("failed to reconcile active counters")?;
    for d in &drift {
      tracing::warn!(
        job_post_id = d.job_post_id,
        recorded = d.recorded,
        replayed = d.replayed,
        "active counter corrected"
      );
    }
    tracing::info!(corrected = drift.len(), "reconciliation complete");
    return Ok(());
  }

  let api = recruit_api::api_router(Arc::new(store), Arc::new(SystemClock));
  let app = Router::new()
    .nest("/api", api)
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin (no echo).
fn rpassword_or_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
