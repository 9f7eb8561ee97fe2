//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, DbIdentityResolver, DbTagCatalog},
    config::Config,
    error::ApiError,
    web::{self, state::AppState, ApiDoc},
};
use fyp_chat_core::service::ConversationService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Adapters & the Conversation Service ---
    let identity_adapter = Arc::new(DbIdentityResolver::new(db_pool.clone()));
    let tag_catalog = Arc::new(DbTagCatalog::new(db_pool.clone()));

    let chat_service = ConversationService::new(
        db_adapter.clone(),
        db_adapter.clone(),
        identity_adapter.clone(),
        tag_catalog.clone(),
        tag_catalog.clone(),
    );

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState {
        chat: chat_service,
        identity: identity_adapter,
        config: config.clone(),
    });

    // Merge the API router with the Swagger UI router for a complete application.
    let app = web::router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
