use std::sync::Arc;

use gemini_relay::api;
use gemini_relay::config::{load_config, AppConfig};
use gemini_relay::observability::init_tracing;
use gemini_relay::state::AppState;

fn main() {
    let config = load_config("config.yaml").unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    init_tracing(&config.server.log_level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialize Tokio runtime: {e}");
            std::process::exit(1);
        });

    runtime.block_on(run(config));
}

async fn run(config: AppConfig) {
    let host = config.server.host.clone();
    let port = config.server.port;
    let state = Arc::new(AppState::new(config));

    // Warm the model table so the first completion doesn't pay for
    // discovery; endpoint failures degrade to an empty contribution.
    match state.refresh_models().await {
        Ok(models) => tracing::info!("resolved {} Gemini models at startup", models.len()),
        Err(err) => tracing::warn!(error = %err, "initial model refresh failed"),
    }

    let app = api::router(Arc::clone(&state));

    tracing::info!("gemini-relay starting on {}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}"))
        .await
        .unwrap_or_else(|err| {
            eprintln!("Failed to bind to {host}:{port}: {err}");
            std::process::exit(1);
        });

    tracing::info!("gemini-relay is ready to accept connections");
    if let Err(err) = axum::serve(listener, app).await {
        eprintln!("Server error: {err}");
        std::process::exit(1);
    }
}
