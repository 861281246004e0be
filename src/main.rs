//! BloomWatch canola bloom layer service entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bloomwatch::api::{create_router, AppState};
use bloomwatch::config::Config;
use bloomwatch::engine::{EarthEngineClient, ImageryBackend, NotInitialized, ServiceAccountKey};
use bloomwatch::metrics;
use bloomwatch::utils::shutdown_signal;

/// Canola bloom layer service backed by Google Earth Engine.
#[derive(Parser, Debug)]
#[command(name = "bloomwatch")]
#[command(about = "Serves cloud-free Landsat bloom composites as map tiles")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,

    /// HTTP bind address (overrides HOST).
    #[arg(long)]
    host: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,

        /// HTTP bind address (overrides HOST).
        #[arg(long)]
        host: Option<String>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Authenticate and run a small computation against Earth Engine.
    CheckEngine,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("bloomwatch=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Initialize metrics
    metrics::init_metrics();

    // Handle subcommands
    match args.command {
        Some(Command::Serve { port, host }) => cmd_serve(port, host).await,
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::CheckEngine) => cmd_check_engine().await,
        None => cmd_serve(args.port, args.host).await,
    }
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BLOOMWATCH - CONFIGURATION CHECK");
    println!("======================================================================");

    // Load configuration
    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    // Check the key file parses, without contacting Google
    print!("Reading service account key... ");
    match ServiceAccountKey::from_file(&config.service_account_key_path) {
        Ok(key) => {
            println!("OK");
            println!("  Service account: {}", key.client_email);
            if let Some(project) = &key.project_id {
                println!("  Key project: {}", project);
            }
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            println!("  The server will start but /get-canola-layer will return 500");
        }
    }

    // Show configuration summary
    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Listen: {}:{}", config.host, config.port);
    println!("  Key Path: {}", config.service_account_key_path.display());
    println!(
        "  EE Project: {}",
        config.ee_project.as_deref().unwrap_or("(from key)")
    );
    println!("  EE API: {}", config.api_base());
    println!("  Cloud Cover Ceiling: < {}%", config.cloud_cover_ceiling);
    match config.http_timeout_ms {
        Some(ms) => println!("  HTTP Timeout: {}ms", ms),
        None => println!("  HTTP Timeout: none"),
    }
    println!(
        "  Metrics: {}",
        if config.metrics_enabled {
            format!("Enabled (port {})", config.metrics_port)
        } else {
            "Disabled".to_string()
        }
    );
    println!("  Log Level: {}", config.rust_log);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Authenticate and compute a trivial value remotely.
async fn cmd_check_engine() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BLOOMWATCH - EARTH ENGINE CHECK");
    println!("======================================================================");

    let config = Config::load()?;

    print!("Authenticating service account... ");
    let client = match EarthEngineClient::initialize(&config).await {
        Ok(c) => {
            println!("OK");
            println!("  Service account: {}", c.client_email());
            println!("  Project: {}", c.project());
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Earth Engine authentication failed"));
        }
    };

    print!("Computing band names of a public image... ");
    match client.probe().await {
        Ok(bands) => {
            println!("OK");
            println!("  Bands: {}", bands.join(", "));
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Earth Engine computation failed"));
        }
    }

    println!("======================================================================");
    println!("EARTH ENGINE CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run the HTTP server.
async fn cmd_serve(port: Option<u16>, host: Option<String>) -> anyhow::Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(host) = host {
        config.host = host;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    if config.metrics_enabled {
        metrics::install_exporter(config.metrics_port)?;
    }

    // One authentication attempt; the outcome is fixed for the process lifetime
    let (backend, engine_ready): (Arc<dyn ImageryBackend>, bool) =
        match EarthEngineClient::initialize(&config).await {
            Ok(client) => (Arc::new(client), true),
            Err(e) => {
                error!("Earth Engine initialization failed: {}", e);
                warn!("Layer requests will fail until restarted with valid credentials");
                (Arc::new(NotInitialized), false)
            }
        };

    let app_state = AppState::new(backend, engine_ready, config.cloud_cover_ceiling);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr).await?;

    print_banner(&addr, engine_ready);
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn print_banner(addr: &SocketAddr, engine_ready: bool) {
    println!("======================================================================");
    println!("BLOOMWATCH BACKEND");
    println!("======================================================================");
    println!("  Listening:     http://{}", addr);
    println!(
        "  Earth Engine:  {}",
        if engine_ready { "initialized" } else { "NOT initialized" }
    );
    println!("----------------------------------------------------------------------");
    println!("Endpoints:");
    println!("  GET  /                  map page");
    println!("  GET  /health            service status");
    println!("  POST /get-canola-layer  bloom composite tile URL");
    println!("======================================================================");
}
