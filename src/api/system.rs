//! Health and debug endpoints.
//!
//! Serves the static JSON shapes the SPA's deployment checks expect.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
    pub timestamp: String,
    pub endpoints: EndpointHints,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointHints {
    pub auth: String,
    pub chat: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestResponse {
    pub message: String,
    pub status: String,
}

/// Root health check
///
/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Loura AI backend is running!".to_string(),
        status: "success".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        endpoints: EndpointHints {
            auth: "/api/auth".to_string(),
            chat: "/api/chat".to_string(),
        },
    })
}

/// Debug route to confirm routing works
///
/// GET /api/test
pub async fn api_test() -> Json<TestResponse> {
    Json(TestResponse {
        message: "Test route working!".to_string(),
        status: "success".to_string(),
    })
}
