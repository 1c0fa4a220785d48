// Dashboard counters and admin notifications

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{db::format_timestamp, error::Result};

#[derive(Debug, Clone, Serialize)]
pub struct HomeStats {
    pub total_lots: i64,
    pub total_slots: i64,
    pub total_users: i64,
    pub total_bookings: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub available_slots: i64,
    pub occupied_slots: i64,
    pub active_bookings: i64,
    pub today_revenue: f64,
    pub total_users: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub active_bookings: i64,
    pub available_slots: i64,
    pub total_bookings: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub action: String,
}

async fn count(pool: &SqlitePool, sql: &str) -> Result<i64> {
    Ok(sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await?)
}

pub async fn home(pool: &SqlitePool) -> Result<HomeStats> {
    Ok(HomeStats {
        total_lots: count(pool, "SELECT COUNT(*) FROM parking_lots").await?,
        total_slots: count(pool, "SELECT COUNT(*) FROM slots").await?,
        total_users: count(pool, "SELECT COUNT(*) FROM users WHERE is_admin = 0").await?,
        total_bookings: count(pool, "SELECT COUNT(*) FROM bookings").await?,
    })
}

pub async fn available_slots(pool: &SqlitePool) -> Result<i64> {
    count(pool, "SELECT COUNT(*) FROM slots WHERE status = 'A'").await
}

/// Revenue of bookings started on the current UTC day.
pub async fn revenue_since(pool: &SqlitePool, since: DateTime<Utc>) -> Result<f64> {
    let revenue = sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(SUM(cost), 0.0) FROM bookings WHERE start_time >= ?",
    )
    .bind(format_timestamp(since))
    .fetch_one(pool)
    .await?;
    Ok(revenue)
}

pub async fn admin(pool: &SqlitePool, now: DateTime<Utc>) -> Result<AdminStats> {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now);

    Ok(AdminStats {
        available_slots: available_slots(pool).await?,
        occupied_slots: count(pool, "SELECT COUNT(*) FROM slots WHERE status = 'O'").await?,
        active_bookings: count(pool, "SELECT COUNT(*) FROM bookings WHERE end_time IS NULL").await?,
        today_revenue: revenue_since(pool, midnight).await?,
        total_users: count(pool, "SELECT COUNT(*) FROM users WHERE is_admin = 0").await?,
    })
}

pub async fn user(pool: &SqlitePool, username: &str) -> Result<UserStats> {
    let active_bookings = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM bookings WHERE username = ? AND end_time IS NULL",
    )
    .bind(username)
    .fetch_one(pool)
    .await?;

    let total_bookings =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings WHERE username = ?")
            .bind(username)
            .fetch_one(pool)
            .await?;

    Ok(UserStats {
        active_bookings,
        available_slots: available_slots(pool).await?,
        total_bookings,
    })
}

pub async fn overdue_bookings(pool: &SqlitePool, now: DateTime<Utc>, after_hours: i64) -> Result<i64> {
    let cutoff = format_timestamp(now - Duration::hours(after_hours));
    let overdue = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM bookings WHERE end_time IS NULL AND start_time < ?",
    )
    .bind(cutoff)
    .fetch_one(pool)
    .await?;
    Ok(overdue)
}

pub async fn admin_notifications(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    after_hours: i64,
) -> Result<Vec<Notification>> {
    let overdue = overdue_bookings(pool, now, after_hours).await?;
    if overdue == 0 {
        return Ok(vec![]);
    }

    Ok(vec![Notification {
        kind: "warning".to_string(),
        message: format!("{overdue} overdue booking(s) found"),
        action: "/admin/bookings".to_string(),
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::Database,
        services::{accounts, booking, lots},
    };
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 18, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn counts_reflect_bookings() {
        let db = Database::in_memory().await.unwrap();
        accounts::seed_admin(&db.pool, "admin", "pw").await.unwrap();
        accounts::register(&db.pool, "alice", "pw").await.unwrap();
        let lot = lots::create_lot(&db.pool, "Central", 10.0, 3).await.unwrap();

        let first = now() - Duration::hours(3);
        booking::book_at(&db.pool, "alice", lot.id, "A1", first).await.unwrap();
        let second = booking::book_at(&db.pool, "alice", lot.id, "A2", first).await.unwrap();
        if let booking::BookingOutcome::Booked(b) = second {
            booking::release_at(&db.pool, b.id, None, now()).await.unwrap();
        }

        let home = home(&db.pool).await.unwrap();
        assert_eq!(home.total_lots, 1);
        assert_eq!(home.total_slots, 3);
        assert_eq!(home.total_users, 1);
        assert_eq!(home.total_bookings, 2);

        let admin = admin(&db.pool, now()).await.unwrap();
        assert_eq!(admin.available_slots, 2);
        assert_eq!(admin.occupied_slots, 1);
        assert_eq!(admin.active_bookings, 1);
        assert_eq!(admin.today_revenue, 30.0);

        let user = user(&db.pool, "alice").await.unwrap();
        assert_eq!(user.active_bookings, 1);
        assert_eq!(user.total_bookings, 2);
    }

    #[tokio::test]
    async fn yesterday_revenue_is_excluded() {
        let db = Database::in_memory().await.unwrap();
        let lot = lots::create_lot(&db.pool, "Central", 10.0, 1).await.unwrap();
        let start = now() - Duration::days(1);
        if let booking::BookingOutcome::Booked(b) =
            booking::book_at(&db.pool, "alice", lot.id, "A1", start).await.unwrap()
        {
            booking::release_at(&db.pool, b.id, None, start + Duration::hours(2))
                .await
                .unwrap();
        }

        assert_eq!(admin(&db.pool, now()).await.unwrap().today_revenue, 0.0);
    }

    #[tokio::test]
    async fn overdue_bookings_raise_a_warning() {
        let db = Database::in_memory().await.unwrap();
        let lot = lots::create_lot(&db.pool, "Central", 10.0, 2).await.unwrap();

        assert!(admin_notifications(&db.pool, now(), 24).await.unwrap().is_empty());

        booking::book_at(&db.pool, "alice", lot.id, "A1", now() - Duration::hours(30))
            .await
            .unwrap();
        booking::book_at(&db.pool, "bob", lot.id, "B1", now() - Duration::hours(2))
            .await
            .unwrap();

        let notes = admin_notifications(&db.pool, now(), 24).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, "1 overdue booking(s) found");
        assert_eq!(notes[0].kind, "warning");
    }
}
