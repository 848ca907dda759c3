//! Visitgate Server - Facility Visitor Check-in
//!
//! REST API server for visitor desks and kiosks.

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use visitgate_server::{
    api, config::AppConfig, logging, repository::Repository, services::Services, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().expect("Failed to load configuration");

    logging::init(&config.logging);

    tracing::info!("Starting Visitgate Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Save server address before moving config
    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    let repository = Repository::new(pool);
    let services = Services::new(
        repository,
        config.email.clone(),
        config.facility.clone(),
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    let addr = SocketAddr::new(
        server_host.parse().expect("Invalid host address"),
        server_port,
    );

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Kiosk scans
        .route("/checkin", post(api::visits::check_in))
        .route("/checkout", post(api::visits::check_out))
        // Visits
        .route("/visits", post(api::visits::create_visit))
        .route("/visits/checked-in", get(api::visits::list_checked_in))
        .route("/visits/print-queue", get(api::visits::print_queue))
        .route(
            "/visits/:id",
            get(api::visits::get_visit).delete(api::visits::delete_visit),
        )
        .route("/visits/:id/manual-checkout", post(api::visits::manual_checkout))
        .route("/visits/:id/approve", post(api::visits::approve_visit))
        .route("/visits/:id/reject", post(api::visits::reject_visit))
        // Cards
        .route("/visits/:id/card", post(api::visits::issue_card))
        .route("/visits/:id/card/printed", post(api::visits::mark_card_printed))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
