use pyme_scoring::backend::ScoringBackend;
use pyme_scoring::config::Config;
use pyme_scoring::handlers::{self, AppState};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, picks the scoring backend
/// (remote analyzer or offline model), builds the session state and serves
/// the page routes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pyme_scoring=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let backend = ScoringBackend::from_config(&config)?;

    let app_state = Arc::new(AppState::new(config.clone(), backend));
    tracing::info!(
        "Session cache initialized (capacity {})",
        config.session_cache_capacity
    );

    let app = handlers::router(app_state)
        // Uploads carry financial statements; cap the body instead of axum's 2MB default
        .layer(RequestBodyLimitLayer::new(config.upload_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
