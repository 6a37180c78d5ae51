//! Registration, login, and session management.
//!
//! Sessions are opaque random tokens handed to the client once; only the
//! SHA-256 hash is stored. Lookup is always guarded by the expiry check,
//! so an expired session and a missing one are indistinguishable (401
//! either way). Login failure never reveals whether the email exists.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::db::{AuthResponse, LoginRequest, RegisterRequest, Session, User, UserResponse};
use crate::AppState;

use super::error::ApiError;
use super::validation;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a random session token
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Session expiry timestamp, formatted to compare against datetime('now')
fn session_expiry(ttl_days: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::days(ttl_days))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Create a session row for a user and return the plaintext token
async fn create_session(
    pool: &crate::DbPool,
    user_id: &str,
    ttl_days: i64,
) -> Result<String, ApiError> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let expires_at = session_expiry(ttl_days);

    let session_id = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (id, user_id, token_hash, expires_at) VALUES (?, ?, ?, ?)")
        .bind(&session_id)
        .bind(user_id)
        .bind(&token_hash)
        .bind(&expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

/// Register endpoint
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    validation::validate_email(&request.email).map_err(ApiError::validation)?;
    validation::validate_password(&request.password).map_err(ApiError::validation)?;
    validation::validate_first_name(&request.full_name.first_name)
        .map_err(ApiError::validation)?;

    // Reject duplicates up front for a friendlier message than the
    // UNIQUE constraint produces
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    if existing.is_some() {
        return Err(ApiError::conflict(
            "An account with this email already exists",
        ));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, first_name, last_name) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.email)
    .bind(&password_hash)
    .bind(request.full_name.first_name.trim())
    .bind(request.full_name.last_name.trim())
    .execute(&state.db)
    .await?;

    tracing::info!("Registered new user: {}", request.email);

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&id)
        .fetch_one(&state.db)
        .await?;

    let token = create_session(
        &state.db,
        &user.id,
        i64::from(state.config.auth.session_ttl_days),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserResponse::from(user),
        }),
    ))
}

/// Login endpoint
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&request.email)
        .fetch_optional(&state.db)
        .await?;

    let user = user.ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = create_session(
        &state.db,
        &user.id,
        i64::from(state.config.auth.session_ttl_days),
    )
    .await?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Validate token endpoint
///
/// GET /api/auth/validate
pub async fn validate(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> StatusCode {
    let token = match extract_token(&headers, &jar) {
        Some(token) => token,
        None => return StatusCode::UNAUTHORIZED,
    };

    match get_current_user(&state.db, &token).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::UNAUTHORIZED,
    }
}

/// Current user endpoint
///
/// GET /api/auth/me
pub async fn me(user: User) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Logout endpoint - revokes the caller's session
///
/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = extract_token(&headers, &jar)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let token_hash = hash_token(&token);
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(&token_hash)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Auth middleware that validates session tokens
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers(), &jar)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    get_current_user(&state.db, &token).await?;

    Ok(next.run(request).await)
}

/// Extract the token from the Authorization header or the token cookie
fn extract_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    if let Some(auth_header) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    jar.get("token").map(|cookie| cookie.value().to_string())
}

/// Get the current user from a token
pub async fn get_current_user(pool: &crate::DbPool, token: &str) -> Result<User, ApiError> {
    let token_hash = hash_token(token);

    // Expired sessions fail the same way missing ones do
    let session: Option<Session> = sqlx::query_as(
        "SELECT * FROM sessions WHERE token_hash = ? AND expires_at > datetime('now')",
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await?;

    let session = session.ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(&session.user_id)
        .fetch_optional(pool)
        .await?;

    user.ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))
}

/// Extractor for getting the current authenticated user from a request
#[async_trait]
impl FromRequestParts<Arc<AppState>> for User {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = extract_token(&parts.headers, &jar)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
        get_current_user(&state.db, &token).await
    }
}
