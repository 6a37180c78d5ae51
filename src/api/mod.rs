pub mod auth;
mod chat;
mod error;
mod system;
mod validation;

pub use error::{ApiError, ErrorCode, ErrorResponse};

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes; register/login are public, the rest check their own token
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/validate", get(auth::validate))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    // Chat routes, guarded by the session middleware
    let chat_routes = Router::new()
        .route("/message", post(chat::send_message))
        .route("/conversations", get(chat::list_conversations))
        .route("/conversations/:id/messages", get(chat::list_messages))
        .route("/conversations/:id", delete(chat::delete_conversation))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .route("/", get(system::root))
        .route("/api/test", get(system::api_test))
        .nest("/api/auth", auth_routes)
        .nest("/api/chat", chat_routes)
        .layer(cors_layer(&state.config.cors.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS restricted to the configured origins, with credentials enabled.
/// Browsers enforce the rejection of everything else.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_skips_invalid_origins() {
        // Must not panic on garbage config; the valid origin survives
        let _ = cors_layer(&[
            "http://localhost:5173".to_string(),
            "not a header value\u{0}".to_string(),
        ]);
    }
}
