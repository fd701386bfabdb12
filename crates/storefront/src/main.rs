//! Storefront - account, login and session backend for the web shop

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod config;

use config::{Config, LoggingConfig};
use storefront_api::{AppState, LogNotifier, create_router};
use storefront_auth::AuthService;
use storefront_db::{Database, NewUser};

/// Storefront - account, login and session backend
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "STOREFRONT_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "STOREFRONT_PORT")]
    port: Option<u16>,

    /// Token signing secret, overrides the config file
    #[arg(long, env = "STOREFRONT_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(secret) = args.jwt_secret {
        config.auth.jwt_secret = secret;
    }

    init_logging(&config.logging);
    config.validate()?;

    info!("Starting Storefront v{}", env!("CARGO_PKG_VERSION"));

    // Create data directory
    if let Some(parent) = Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let db = Database::with_max_connections(&config.database.url(), config.database.max_connections)
        .await?;

    let auth = Arc::new(AuthService::new(
        config.auth_config(),
        Arc::new(db.clone()),
        Arc::new(db.clone()),
    )?);

    bootstrap_admin(&config, &db, &auth).await?;

    let metrics_handle = if config.metrics.enabled {
        Some(Arc::new(PrometheusBuilder::new().install_recorder()?))
    } else {
        None
    };

    let state = AppState::new(
        db,
        auth,
        config.cookie_settings(),
        Arc::new(LogNotifier),
        config.public_url.clone(),
    );

    let app = create_router(state, metrics_handle).layer(TraceLayer::new_for_http());

    let bind_addr = args.bind.unwrap_or(config.server.bind_address);
    let port = args.port.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;

    info!("Listening on {}", addr);
    info!("Public URL: {}", config.public_url);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Create the configured admin account on first start
async fn bootstrap_admin(config: &Config, db: &Database, auth: &AuthService) -> Result<()> {
    let Some(bootstrap) = &config.bootstrap else {
        return Ok(());
    };
    if db.has_users().await? {
        return Ok(());
    }

    info!("Creating bootstrap admin user");
    let password_hash = auth.hash_password(&bootstrap.admin_password).await?;
    db.insert_user(NewUser {
        email: bootstrap.admin_email.clone(),
        name: bootstrap.admin_name.clone(),
        password_hash,
        verified: true,
        is_admin: true,
    })
    .await?;
    info!("Bootstrap admin user created ({})", bootstrap.admin_email);
    Ok(())
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}
