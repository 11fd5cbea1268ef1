// src/main.rs

use std::process::ExitCode;
use std::sync::Arc;

use quiz_backend::cli;
use quiz_backend::config::Config;
use quiz_backend::routes;
use quiz_backend::state::AppState;
use quiz_backend::utils::telemetry::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration from environment (.env included)
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize Tracing (Logging)
    let _guard = init_tracing(&config.rust_log, &config.log_dir, "app.log");

    // Database pool with retry, migrations applied
    let store = match cli::connect(&config.database_url, cli::Schema::Migrate).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let addr = config.bind_addr;
    let state = AppState {
        store: Arc::new(store),
        config,
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Listening on {}", addr);

    // Start the server
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
