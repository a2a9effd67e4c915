//! Passport Broker Binary
//!
//! Runs the token-exchange HTTP server.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use passport_broker::{create_router, load_key_file, AppState, BrokerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let log_level = env::var("BROKER_LOG_LEVEL")
        .unwrap_or_else(|_| "info".into())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Broker stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration
    let port: u16 = env::var("BROKER_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()
        .map_err(|e| format!("BROKER_PORT must be a valid port number: {}", e))?;

    let config_path =
        env::var("BROKER_CONFIG_PATH").unwrap_or_else(|_| "/etc/passport-broker/config.json".into());
    let keys_path =
        env::var("BROKER_KEYS_PATH").unwrap_or_else(|_| "/etc/passport-broker/keys.json".into());

    // Keys and config must be valid before anything listens
    let config = BrokerConfig::load(&config_path)?;
    let registry = Arc::new(load_key_file(&keys_path)?);
    let service = config.build_service(registry)?;

    info!(
        issuer = %config.issuer,
        passport_kid = %config.passport_kid,
        port = port,
        "Starting passport broker"
    );

    // Create application state
    let state = Arc::new(AppState::new(service)?);

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(addr = %addr, "Passport broker listening");

    axum::serve(listener, app).await?;
    Ok(())
}
