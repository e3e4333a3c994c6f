use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rust_ch_retrieval::config::Config;
use rust_ch_retrieval::handlers::{self, AppState};
use rust_ch_retrieval::registry_client::RegistryClient;
use rust_ch_retrieval::retrieval::CompanyRetriever;
use rust_ch_retrieval::search::SearchOrchestrator;

/// Main entry point for the application.
///
/// Initializes logging, loads configuration, builds the registry client and the
/// export orchestrator, then serves the HTTP routes behind CORS, tracing and
/// per-IP rate limiting.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_ch_retrieval=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; a missing credential stops here, before any fetch
    let config = Config::from_env()?;

    let client = RegistryClient::from_config(&config)?;
    tracing::info!("✓ Registry client initialized: {}", client.base_url());

    let orchestrator = SearchOrchestrator::new(
        CompanyRetriever::new(client.clone()),
        config.max_concurrent_companies,
    );

    let app_state = Arc::new(AppState {
        config: config.clone(),
        client,
        orchestrator,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = Router::new()
        .route("/api/v1/search", get(handlers::search))
        .route("/api/v1/advanced-search", get(handlers::advanced_search))
        .route("/api/v1/exports/search", post(handlers::export_search))
        .route(
            "/api/v1/exports/companies/:number",
            post(handlers::export_company),
        )
        .layer(
            ServiceBuilder::new()
                // Export requests are small JSON bodies
                .layer(RequestBodyLimitLayer::new(64 * 1024))
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
