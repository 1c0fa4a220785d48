use axum::{extract::State, routing::get, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    extract::Json,
    services::accounts,
    AppState,
};

pub const SESSION_COOKIE: &str = "session";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", get(crate::serve_index).post(register))
        .route("/login", get(crate::serve_index).post(login))
        .route("/logout", get(logout))
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
    pub redirect: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub username: String,
    pub is_admin: bool,
    pub exp: usize,
}

pub fn create_token(
    user_id: i64,
    username: &str,
    is_admin: bool,
    secret: &str,
    valid_days: i64,
) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(chrono::Duration::days(valid_days))
        .ok_or_else(|| AppError::Internal("Session expiry out of range".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        is_admin,
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal("Failed to create token".to_string()))
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<MessageResponse>> {
    accounts::register(&state.db.pool, &body.username, &body.password).await?;

    Ok(Json(MessageResponse {
        message: "Registration successful! Please log in.".to_string(),
    }))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<CredentialsRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let user = accounts::authenticate(&state.db.pool, &body.username, &body.password)
        .await?
        .ok_or_else(|| {
            tracing::info!(username = %body.username, "Rejected login");
            AppError::InvalidCredentials
        })?;

    let token = create_token(
        user.id,
        &user.username,
        user.is_admin,
        &state.config.jwt_secret,
        state.config.session_days,
    )?;

    let redirect = if user.is_admin {
        "/admin/dashboard"
    } else {
        "/dashboard"
    };

    Ok((
        jar.add(session_cookie(token.clone())),
        Json(AuthResponse {
            token,
            user: UserResponse {
                id: user.id,
                username: user.username,
                is_admin: user.is_admin,
            },
            redirect,
        }),
    ))
}

async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Json(MessageResponse {
            message: "Logged out successfully.".to_string(),
        }),
    )
}
