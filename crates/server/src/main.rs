use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use ticketsync_core::{
    create_authenticator, load_config, validate_config, Authenticator, CrmClient, HubSpotClient,
    TicketReconciliationWorkflow, WorkflowDispatcher,
};
use ticketsync_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());

    let json = std::env::var("TICKETSYNC_LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn run() -> Result<()> {
    init_logging();
    info!("ticketsync {} starting", VERSION);

    // Determine config path
    let config_path = std::env::var("TICKETSYNC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    // Fingerprint of the effective (sanitized) config for correlating logs
    let sanitized = serde_json::to_string(&ticketsync_core::SanitizedConfig::from(&config))
        .unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(sanitized.as_bytes()));

    info!("Configuration loaded successfully ({})", &config_hash[..16]);
    info!("Auth method: {:?}", config.auth.method);
    info!("HubSpot API: {}", config.hubspot.base_url());
    info!(
        "Support pipeline {}, closed stage {}, new ticket stage {}",
        config.workflow.support_pipeline,
        config.workflow.closed_stage,
        config.workflow.new_ticket_stage
    );
    if config.is_background() {
        info!("Completion mode: background (runs reported via /api/v1/runs)");
    } else {
        info!("Completion mode: await");
    }

    // Create authenticator
    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());
    if authenticator.method_name() == "none" {
        warn!("Inbound webhook calls are not authenticated");
    }

    // Create CRM client
    let crm: Arc<dyn CrmClient> = Arc::new(
        HubSpotClient::new(config.hubspot.clone()).context("Failed to create HubSpot client")?,
    );

    // Create workflow and dispatcher
    let workflow = TicketReconciliationWorkflow::new(crm, config.workflow.clone());
    let dispatcher = WorkflowDispatcher::new(workflow, &config.dispatch);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let drain_timeout = Duration::from_secs(config.dispatch.shutdown_timeout_secs);

    // Create app state and router
    let state = Arc::new(AppState::new(config, authenticator, dispatcher));
    let app = create_router(Arc::clone(&state));

    // Start server
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    let aborted = state.dispatcher().shutdown(drain_timeout).await;
    if aborted > 0 {
        warn!("Aborted {} background run(s) at shutdown", aborted);
    }
    info!("Server stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
