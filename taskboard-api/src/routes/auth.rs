/// Account endpoints
///
/// - `POST /v1/auth/register` - Create an account
/// - `POST /v1/auth/login` - Start a session (sets the session cookie)
/// - `POST /v1/auth/logout` - End the current session (clears the cookie)
/// - `GET /v1/auth/me` - The signed-in user
///
/// The session cookie is `HttpOnly; SameSite=Lax`, plus `Secure` in
/// production. Its value is the opaque session token; nothing else about the
/// session reaches the client.

use crate::{
    app::AppState,
    config::Config,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::{SessionCookie, UserAgent},
    policies,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use taskboard_shared::{
    auth::{password, ScopeHint},
    models::user::{CreateUser, User},
    session::{SessionRecord, SessionToken},
};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 3, max = 64, message = "Username must be 3-64 characters"))]
    pub username: String,

    /// Checked for strength separately
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email or username
    #[validate(length(min = 1, message = "Login is required"))]
    pub login: String,

    pub password: String,
}

/// Creates an account
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed or weak password
/// - `409 Conflict`: Email or username taken
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    req.validate()?;

    password::validate_password_strength(&req.password).map_err(|e| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "password".to_string(),
            message: e,
        }])
    })?;

    let plaintext = req.password;
    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
        .await
        .map_err(|e| ApiError::InternalError(format!("Password hashing task failed: {}", e)))??;

    let user = state
        .accounts
        .create_user(CreateUser {
            email: req.email.trim().to_lowercase(),
            username: req.username.trim().to_string(),
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Verifies credentials and starts a session
///
/// Unknown login and wrong password produce the same `401`.
pub async fn login(
    State(state): State<AppState>,
    UserAgent(user_agent): UserAgent,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let login = normalize_login(&req.login);
    let user = state
        .accounts
        .find_user_by_login(&login)
        .await?
        .ok_or_else(invalid_credentials)?;

    let hash = user.password_hash.clone();
    let plaintext = req.password;
    let valid = tokio::task::spawn_blocking(move || password::verify_password(&plaintext, &hash))
        .await
        .map_err(|e| ApiError::InternalError(format!("Password verification task failed: {}", e)))??;

    if !valid {
        tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid_credentials());
    }

    let token = state
        .sessions
        .create(SessionRecord::new(user.id, user_agent))
        .await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok((
        [(header::SET_COOKIE, session_cookie(&state.config, &token))],
        Json(user),
    ))
}

/// Destroys the current session
///
/// Idempotent: logging out without a live session still clears the cookie.
pub async fn logout(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
) -> ApiResult<impl IntoResponse> {
    if let Some(token) = &token {
        state.sessions.destroy(token).await?;
    }

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_cookie(&state.config))],
    ))
}

/// Returns the signed-in user
pub async fn me(
    State(state): State<AppState>,
    SessionCookie(token): SessionCookie,
) -> ApiResult<Json<User>> {
    let access = state.authorize(&policies::SIGNED_IN, token, ScopeHint::None).await?;
    Ok(Json(access.user()?.clone()))
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials".to_string())
}

/// Emails are stored lowercased; usernames are case-sensitive
fn normalize_login(login: &str) -> String {
    let login = login.trim();
    if login.contains('@') {
        login.to_lowercase()
    } else {
        login.to_string()
    }
}

fn session_cookie(config: &Config, token: &SessionToken) -> String {
    cookie(config, token.as_str(), config.session.ttl_secs)
}

fn clear_cookie(config: &Config) -> String {
    cookie(config, "", 0)
}

fn cookie(config: &Config, value: &str, max_age: u64) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        config.session.cookie_name, value, max_age
    );
    if config.api.production {
        cookie.push_str("; Secure");
    }
    cookie
}
