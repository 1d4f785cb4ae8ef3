use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use recipe_gateway::middleware::install_panic_hook;
use recipe_gateway::{AppState, Config, build_router, utils};

#[tokio::main]
async fn main() -> ExitCode {
    // APP_ENV may come from .env, so load it before picking a log format
    let _ = dotenvy::dotenv();
    init_logging();
    install_panic_hook();

    info!(
        "Starting Recipe Gateway v{}",
        env!("CARGO_PKG_VERSION")
    );

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// JSON logs in production, human-readable logs elsewhere.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let production = std::env::var("APP_ENV")
        .map(|env| env.eq_ignore_ascii_case("production"))
        .unwrap_or(false);

    if production {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        app_env = %config.app_env,
        model = %config.claude_model,
        "Configuration loaded"
    );

    // Build application state and router
    let state = AppState::new(config.clone()).map_err(|e| {
        error!("Failed to build application state: {e}");
        exitcode::CONFIG
    })?;
    let app = build_router(state.clone());

    // Start server
    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    info!("API endpoints:");
    info!("  GET    /health                  - Health check");
    info!("  GET    /ready                   - Readiness check");
    info!("  GET    /metrics                 - Prometheus metrics");
    info!("  POST   /generate_recipe         - Generate a recipe");
    info!("  POST   /save_recipe             - Save a recipe");
    info!("  POST   /export_recipe/{{format}}  - Export as json or txt");
    info!("  POST   /validate_ingredients    - Check an ingredient list");
    info!("  GET    /api/recipes             - List saved recipes");
    info!("  GET    /api/recipes/{{id}}        - Get a recipe");
    info!("  DELETE /api/recipes/{{id}}        - Delete a recipe");
    info!("  PUT    /api/recipes/{{id}}/rating - Rate a recipe");

    // Start server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal())
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    // Gracefully shutdown background tasks
    info!("HTTP server stopped, shutting down background tasks...");
    state.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}
