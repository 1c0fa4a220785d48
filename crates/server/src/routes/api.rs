use axum::{extract::State, routing::get, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    extract::{Json, Query},
    middleware::auth::Session,
    services::{chat, stats},
    AppState,
};

const MAX_CHAT_PAGE: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard-stats", get(dashboard_stats))
        .route("/notifications", get(notifications))
        .route("/chat/messages", get(chat_messages))
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DashboardStats {
    Admin {
        available_slots: i64,
        occupied_slots: i64,
        active_bookings: i64,
        today_revenue: f64,
    },
    User {
        active_bookings: i64,
        available_slots: i64,
    },
}

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ChatMessageResponse {
    pub username: String,
    pub message: String,
    pub timestamp: String,
    pub is_admin: bool,
}

async fn dashboard_stats(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<DashboardStats>> {
    if session.is_admin {
        let s = stats::admin(&state.db.pool, Utc::now()).await?;
        return Ok(Json(DashboardStats::Admin {
            available_slots: s.available_slots,
            occupied_slots: s.occupied_slots,
            active_bookings: s.active_bookings,
            today_revenue: s.today_revenue,
        }));
    }

    let s = stats::user(&state.db.pool, &session.username).await?;
    Ok(Json(DashboardStats::User {
        active_bookings: s.active_bookings,
        available_slots: s.available_slots,
    }))
}

async fn notifications(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<stats::Notification>>> {
    if !session.is_admin {
        return Ok(Json(vec![]));
    }

    let notes = stats::admin_notifications(
        &state.db.pool,
        Utc::now(),
        state.config.overdue_after_hours,
    )
    .await?;
    Ok(Json(notes))
}

async fn chat_messages(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> Result<Json<Vec<ChatMessageResponse>>> {
    let limit = query
        .limit
        .unwrap_or(state.config.chat_history_limit)
        .clamp(1, MAX_CHAT_PAGE);

    let messages = chat::recent_messages(&state.db.pool, limit)
        .await?
        .into_iter()
        .map(|m| ChatMessageResponse {
            username: m.username,
            message: m.message,
            timestamp: m.timestamp,
            is_admin: m.is_admin,
        })
        .collect();

    Ok(Json(messages))
}
