//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use fyp_chat_core::ports::IdentityResolver;
use fyp_chat_core::service::ConversationService;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single entry point for every chat operation.
    pub chat: ConversationService,
    /// Resolves session tokens for the auth middleware.
    pub identity: Arc<dyn IdentityResolver>,
    pub config: Arc<Config>,
}
