mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod query;
mod records;
mod request;
mod resource;
mod ui;

#[cfg(test)]
mod testing;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (`info`, `officeshift=debug`, ...)
const LOG_ENV: &str = "OFFICESHIFT_LOG";

#[derive(Parser, Debug)]
#[command(name = "officeshift")]
#[command(about = "A terminal admin dashboard for offices and work shifts")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/officeshift/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Backend base URL, overriding config and OFFICESHIFT_BE_URL
  #[arg(short, long)]
  base_url: Option<String>,

  /// Rows per page (10, 20, 30, 40 or 50)
  #[arg(short, long)]
  page_size: Option<usize>,
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging(path: &Path) -> Result<WorkerGuard> {
  let dir = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .unwrap_or_else(|| Path::new("."));
  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Log path has no file name: {}", path.display()))?;
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration, command line wins
  let mut config = config::Config::load(args.config.as_deref())?.with_base_url_override(args.base_url);
  if let Some(page_size) = args.page_size {
    config.page_size = page_size;
  }
  let config = config.validated()?;

  let _log_guard = init_logging(&config.log_path())?;
  info!(base_url = %config.api.base_url, "starting");

  let context = ui::AppContext {
    client: api::ApiClient::new(&config.api)?,
    cache: cache::QueryCache::new(),
    page_size: config.page_size,
    login_email: config.login.email.clone(),
  };

  // Initialize and run the app
  let mut app = app::App::new(context, config.display_title());
  app.run().await?;

  Ok(())
}
