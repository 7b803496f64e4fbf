pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod services;
pub mod state;

use clap::Parser;
use tokio::signal;

pub use config::Config;
use cli::{Cli, Commands};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Loads `.env` into the process environment if present.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        // Tracing is not up yet.
        eprintln!("Loaded environment from {}", path.display());
    }
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    init_tracing(&config);
    config.warn_on_ephemeral_settings();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => {
            config.validate()?;
            run_server(config, port).await
        }
        Commands::Init => cli::cmd_init(),
        Commands::SeedRoles => cli::cmd_seed_roles(&config).await,
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.general.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run_server(config: Config, port_override: Option<u16>) -> anyhow::Result<()> {
    info!("Flasky v{} starting...", env!("CARGO_PKG_VERSION"));

    let port = port_override.unwrap_or(config.server.port);
    let api_state = api::create_app_state_from_config(config).await?;
    let app = api::router(api_state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 Web Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }
}
