// Chat log and the events fanned out to connected clients

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    db::{format_timestamp, models::ChatMessage},
    error::{AppError, Result},
};

pub const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OnlineUser {
    pub username: String,
    pub is_admin: bool,
}

/// Frames pushed to every socket in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ChatEvent {
    Status {
        msg: String,
        username: String,
        is_admin: bool,
    },
    Message {
        username: String,
        message: String,
        timestamp: String,
        is_admin: bool,
    },
}

impl ChatEvent {
    pub fn joined(username: &str, is_admin: bool) -> Self {
        ChatEvent::Status {
            msg: format!("{username} has entered the chat."),
            username: username.to_string(),
            is_admin,
        }
    }

    pub fn left(username: &str, is_admin: bool) -> Self {
        ChatEvent::Status {
            msg: format!("{username} has left the chat."),
            username: username.to_string(),
            is_admin,
        }
    }
}

impl From<ChatMessage> for ChatEvent {
    fn from(msg: ChatMessage) -> Self {
        ChatEvent::Message {
            username: msg.username,
            message: msg.message,
            timestamp: msg.timestamp,
            is_admin: msg.is_admin,
        }
    }
}

pub async fn post_message(
    pool: &SqlitePool,
    username: &str,
    message: &str,
    is_admin: bool,
    now: DateTime<Utc>,
) -> Result<ChatMessage> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("Message is empty".to_string()));
    }
    if message.len() > MAX_MESSAGE_LEN {
        return Err(AppError::Validation(format!(
            "Message exceeds {MAX_MESSAGE_LEN} bytes"
        )));
    }

    let timestamp = format_timestamp(now);
    let id = sqlx::query(
        "INSERT INTO chat_messages (username, message, timestamp, is_admin) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(message)
    .bind(&timestamp)
    .bind(is_admin)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(ChatMessage {
        id,
        username: username.to_string(),
        message: message.to_string(),
        timestamp,
        is_admin,
    })
}

/// The latest `limit` messages, oldest first.
pub async fn recent_messages(pool: &SqlitePool, limit: i64) -> Result<Vec<ChatMessage>> {
    let mut messages = sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT id, username, message, timestamp, is_admin
        FROM chat_messages
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(limit.max(0))
    .fetch_all(pool)
    .await?;

    messages.reverse();
    Ok(messages)
}

/// Presence is approximated by who posted within the last hour.
pub async fn online_users(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<OnlineUser>> {
    let cutoff = format_timestamp(now - Duration::hours(1));
    let users = sqlx::query_as::<_, OnlineUser>(
        r#"
        SELECT username, MAX(is_admin) AS is_admin
        FROM chat_messages
        WHERE timestamp >= ?
        GROUP BY username
        ORDER BY username ASC
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(users)
}
