use axum::{extract::State, routing::get, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{ChatMessage, ParkingLot},
    error::Result,
    extract::Json,
    middleware::auth::Session,
    routes::admin,
    services::{
        accounts,
        booking::{self, BookingDetail},
        chat::{self, OnlineUser},
        lots, stats,
    },
    AppState,
};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(home))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/profile", get(profile).post(update_profile))
        .route("/chat", get(chat_room))
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum DashboardResponse {
    User {
        username: String,
        active_bookings: Vec<BookingDetail>,
        available_slots: i64,
        total_bookings: i64,
        recent_lots: Vec<ParkingLot>,
    },
    Admin(admin::DashboardResponse),
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    pub is_admin: bool,
    pub total_bookings: i64,
    pub active_bookings: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatRoomResponse {
    pub current_user: String,
    pub is_admin: bool,
    pub messages: Vec<ChatMessage>,
    pub online_users: Vec<OnlineUser>,
}

async fn home(State(state): State<AppState>) -> Result<Json<stats::HomeStats>> {
    Ok(Json(stats::home(&state.db.pool).await?))
}

async fn dashboard(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<DashboardResponse>> {
    let pool = &state.db.pool;

    if session.is_admin {
        let slots = lots::slot_overview(pool).await?;
        let stats = stats::admin(pool, Utc::now()).await?;
        return Ok(Json(DashboardResponse::Admin(admin::DashboardResponse {
            slots,
            stats,
        })));
    }

    let active_bookings = booking::active_bookings(pool, &session.username).await?;
    let user_stats = stats::user(pool, &session.username).await?;
    let recent_lots = sqlx::query_as::<_, ParkingLot>(
        "SELECT id, name, price FROM parking_lots ORDER BY id ASC LIMIT 5",
    )
    .fetch_all(pool)
    .await?;

    Ok(Json(DashboardResponse::User {
        username: session.username,
        active_bookings,
        available_slots: user_stats.available_slots,
        total_bookings: user_stats.total_bookings,
        recent_lots,
    }))
}

async fn profile_response(
    state: &AppState,
    session: Session,
    message: Option<String>,
) -> Result<ProfileResponse> {
    let user_stats = stats::user(&state.db.pool, &session.username).await?;
    Ok(ProfileResponse {
        username: session.username,
        is_admin: session.is_admin,
        total_bookings: user_stats.total_bookings,
        active_bookings: user_stats.active_bookings,
        message,
    })
}

async fn profile(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ProfileResponse>> {
    Ok(Json(profile_response(&state, session, None).await?))
}

async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>> {
    let mut message = None;
    if let Some(password) = body.new_password.filter(|p| !p.is_empty()) {
        accounts::change_password(&state.db.pool, &session.username, &password).await?;
        message = Some("Profile updated successfully!".to_string());
    }

    Ok(Json(profile_response(&state, session, message).await?))
}

async fn chat_room(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<ChatRoomResponse>> {
    let messages = chat::recent_messages(&state.db.pool, state.config.chat_history_limit).await?;
    let online_users = chat::online_users(&state.db.pool, Utc::now()).await?;

    Ok(Json(ChatRoomResponse {
        current_user: session.username,
        is_admin: session.is_admin,
        messages,
        online_users,
    }))
}
