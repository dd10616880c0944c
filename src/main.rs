mod commands;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use offq::config::{Config, LogConfig};
use offq::{OfflineQueueStore, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "offq")]
#[command(about = "Inspect and administer the donor app's offline operation queue")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/offq/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Path to the store database, overriding the config
  #[arg(short, long)]
  store: Option<PathBuf>,

  /// Print JSON instead of text
  #[arg(long, global = true)]
  json: bool,

  /// Increase log verbosity (-v info, -vv debug, -vvv trace)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = init_logging(&config.log, args.verbose)?;

  let path = match args.store {
    Some(path) => path,
    None => config.store_path()?,
  };
  let store = Arc::new(OfflineQueueStore::new(SqliteStore::open_at(&path)?));

  let output = commands::run(&store, &config, args.command, args.json).await?;
  if !output.is_empty() {
    println!("{}", output);
  }

  Ok(())
}

/// Install the tracing subscriber. The returned guard flushes the log file
/// on drop and must live until exit.
fn init_logging(config: &LogConfig, verbosity: u8) -> Result<Option<WorkerGuard>> {
  let level = match verbosity {
    0 => config.level.as_str(),
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_env("OFFQ_LOG").unwrap_or_else(|_| EnvFilter::new(level));

  match &config.file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
      std::fs::create_dir_all(dir)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

      let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
      tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
      Ok(None)
    }
  }
}
