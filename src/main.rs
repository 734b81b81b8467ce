use actix_web::{web, App, HttpServer};
use anyhow::{bail, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

use trafficlog::api::routes;
use trafficlog::capture::manager::CaptureManager;
use trafficlog::models::config::{AppConfig, DEFAULT_MAX_ENTRIES};
use trafficlog::utils::logging;

#[derive(Parser, Debug)]
#[clap(author, version, about = "An HTTP transaction logger with filtering and export")]
struct Args {
    /// Port for the REST API server
    #[clap(short, long, default_value = "3000")]
    port: u16,

    /// Maximum number of transactions kept; the oldest is evicted beyond this
    #[clap(long, default_value_t = DEFAULT_MAX_ENTRIES)]
    max_entries: usize,

    /// Directory for export files when no path is given
    #[clap(long, default_value = ".")]
    export_dir: PathBuf,

    /// Host considered in scope, subdomains included (repeatable)
    #[clap(long = "scope")]
    scope: Vec<String>,

    /// Log level (trace, debug, info, warn, error, off)
    #[clap(long, default_value = "info")]
    log_level: String,
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger with specified level
    logging::init_logger(logging::get_log_level(&args.log_level));

    info!("Starting TrafficLog v{}", env!("CARGO_PKG_VERSION"));

    if args.max_entries == 0 {
        bail!("--max-entries must be at least 1");
    }

    // Create application config
    let config = AppConfig {
        port: args.port,
        max_entries: args.max_entries,
        export_dir: args.export_dir,
        scope: args.scope,
    };

    if !config.export_dir.is_dir() {
        warn!(
            "Export directory {} does not exist; exports without a path will fail",
            config.export_dir.display()
        );
    }
    if config.scope.is_empty() {
        info!("No scope hosts configured; the in-scope filter will hide everything");
    } else {
        info!("Scope: {}", config.scope.join(", "));
    }

    // Initialize capture manager
    let capture_manager = Arc::new(CaptureManager::new(config.clone()));

    // Create a shared state for our application
    let app_state = web::Data::new(capture_manager);

    info!("Keeping up to {} transactions", config.max_entries);
    info!("Starting TrafficLog API server on port {}", config.port);

    // Start the HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
    })
    .bind(format!("127.0.0.1:{}", config.port))?
    .run()
    .await?;

    Ok(())
}
