//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use santri_core::{PortError, Role};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::extract::JsonOrForm;
use crate::web::middleware::session_cookie;
use crate::web::rest::{DataBody, Envelope};
use crate::web::state::AppState;
use crate::web::users::UserResponse;

const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn session_cookie_header(session_id: &str, ttl: Duration) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        session_id,
        ttl.num_seconds()
    )
}

/// Creates a new auth session for `user_id` and returns its `Set-Cookie` value.
async fn start_session(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    let ttl = Duration::days(state.config.session_ttl_days);
    let auth_session_id = Uuid::new_v4().to_string();
    state
        .db
        .create_auth_session(&auth_session_id, user_id, Utc::now() + ttl)
        .await?;
    Ok(session_cookie_header(&auth_session_id, ttl))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new account and log it in
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = DataBody<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    JsonOrForm(req): JsonOrForm<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim();
    let email = normalize_email(&req.email);
    if name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    if !email.contains('@') {
        return Err(ApiError::BadRequest("email is invalid".to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    // 1. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })?
        .to_string();

    // 2. Create user in database
    let role = if state.config.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::Santri
    };
    let user = state
        .db
        .create_user(name, &email, &password_hash, role)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => {
                ApiError::Port(PortError::Conflict("email already registered".to_string()))
            }
            other => ApiError::Port(other),
        })?;
    info!(user = %user.id, role = %user.role, "account created");

    // 3. Log the new account in
    let cookie = start_session(&state, user.id).await?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Envelope(StatusCode::CREATED, UserResponse::from(&user)),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = DataBody<UserResponse>),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    JsonOrForm(req): JsonOrForm<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Get user by email
    let creds = state
        .db
        .get_user_by_email(&normalize_email(&req.email))
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::Unauthenticated,
            other => ApiError::Port(other),
        })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(ApiError::Unauthenticated);
    }

    // 3. Create the session and its cookie
    let cookie = start_session(&state, creds.user.id).await?;

    Ok((
        [(header::SET_COOKIE, cookie)],
        Envelope(StatusCode::OK, UserResponse::from(&creds.user)),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Logout successful"),
        (status = 401, description = "No active session", body = ErrorBody)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Parse session ID from cookie
    let auth_session_id = session_cookie(&headers).ok_or(ApiError::Unauthenticated)?;

    // 2. Delete auth session from database
    state.db.delete_auth_session(auth_session_id).await?;

    // 3. Clear cookie
    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie.to_string())]))
}
