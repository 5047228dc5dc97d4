//! Allowlist manager server.
//!
//! ```text
//!   allowlist-cli / browser
//!          │
//!          ▼
//!   ┌──────────────┐   add/remove   ┌────────────────┐
//!   │  HTTP API    │───────────────▶│ allowlist store│  <instance>/database.csv
//!   └──────┬───────┘                └────────────────┘
//!          │ after change
//!          ▼
//!   ┌──────────────┐   nginx -s reload   ┌───────────────┐
//!   │ProxyReloader │────────────────────▶│ reverse proxy │
//!   └──────────────┘                     └───────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use allowlist_manager::config::ConfigSource;
use allowlist_manager::observability::logging;
use allowlist_manager::{create_app, AllowlistConfig, Shutdown};

#[derive(Parser)]
#[command(name = "allowlist-manager")]
#[command(about = "Web-served allowlist manager for a reverse proxy", long_about = None)]
struct Args {
    /// Directory holding config.toml, the log file and the allowlist store.
    #[arg(short, long, default_value = "instance")]
    instance_path: PathBuf,

    /// Explicit config file (defaults to <instance>/config.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let source = match args.config {
        Some(path) => ConfigSource::File(path),
        None => ConfigSource::Instance,
    };

    // The logger has to be the global subscriber before create_app attaches
    // its sinks, or startup diagnostics are lost. The console sink covers
    // anything logged before configure replaces it.
    let resolved = source.resolve(&args.instance_path)?;
    let name = AllowlistConfig::from_user(&resolved.table).app_name();
    let logger = logging::registry().get_or_create(&name);
    logger.add_console_sink();
    logger.install_global(EnvFilter::try_from_default_env().ok())?;

    let app = create_app(resolved.table.clone(), &args.instance_path).await?;
    resolved.report();

    tracing::info!(
        logger = %app.logger().name(),
        instance = %app.instance_path().display(),
        "allowlist-manager v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let web = app.config().web_settings();
    let listener = TcpListener::bind(&web.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();
    app.serve(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
