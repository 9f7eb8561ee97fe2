pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware as axum_middleware,
    routing::{get, put},
    Router,
};
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub use middleware::require_participant;
pub use rest::ApiDoc;

/// Builds the application router. Shared between the `api` binary and the
/// integration tests so both exercise the same middleware stack.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.config.cors_allowed_origin.clone())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new().route("/health", get(rest::health_handler));

    // Protected routes (a resolved participant required)
    let protected_routes = Router::new()
        .route("/conversations", get(rest::list_conversations_handler))
        .route(
            "/conversations/with/{counterpart_id}",
            get(rest::open_conversation_handler),
        )
        .route(
            "/conversations/{id}/messages",
            get(rest::list_messages_handler).post(rest::send_message_handler),
        )
        .route(
            "/conversations/{id}/messages/read",
            put(rest::mark_read_handler),
        )
        .route(
            "/conversations/{id}/messages/search",
            get(rest::search_messages_handler),
        )
        .route("/taggable-items", get(rest::taggable_items_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_participant,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(state)
}
