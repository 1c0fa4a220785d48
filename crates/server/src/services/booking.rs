// Slot booking and release

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    db::{format_timestamp, models::Booking, parse_timestamp},
    error::{AppError, Result},
    services::billing,
};

#[derive(Debug)]
pub enum BookingOutcome {
    Booked(Booking),
    NoAvailability,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleasedBooking {
    pub booking_id: i64,
    pub slot_id: i64,
    pub hours: i64,
    pub cost: f64,
    pub end_time: String,
}

/// Release aborts are reported, not raised: the ledger is left untouched.
#[derive(Debug)]
pub enum ReleaseOutcome {
    Released(ReleasedBooking),
    BookingNotFound,
    AlreadyReleased,
    SlotNotFound,
    LotNotFound,
}

/// Booking joined with where it was parked. Lot and location are absent once
/// the slot has been deleted.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BookingDetail {
    pub id: i64,
    pub username: String,
    pub slot_id: i64,
    pub lot_name: Option<String>,
    pub location: Option<String>,
    pub vehicle_number: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub cost: Option<f64>,
}

const BOOKING_DETAIL_SELECT: &str = r#"
    SELECT b.id, b.username, b.slot_id, l.name AS lot_name, s.location,
           b.vehicle_number, b.start_time, b.end_time, b.cost
    FROM bookings b
    LEFT JOIN slots s ON b.slot_id = s.id
    LEFT JOIN parking_lots l ON s.lot_id = l.id
"#;

pub async fn book(
    pool: &SqlitePool,
    username: &str,
    lot_id: i64,
    vehicle_number: &str,
) -> Result<BookingOutcome> {
    book_at(pool, username, lot_id, vehicle_number, Utc::now()).await
}

pub async fn book_at(
    pool: &SqlitePool,
    username: &str,
    lot_id: i64,
    vehicle_number: &str,
    now: DateTime<Utc>,
) -> Result<BookingOutcome> {
    let vehicle_number = vehicle_number.trim();
    if vehicle_number.is_empty() {
        return Err(AppError::Validation("Vehicle number is required".to_string()));
    }

    let mut tx = pool.begin().await?;

    // Claim the lowest free slot in one statement so two requests cannot
    // both take the last one. It must run before any read in the transaction:
    // a SQLite reader that later writes gets BUSY instead of waiting.
    let slot_id = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE slots SET status = 'O'
        WHERE id = (
            SELECT id FROM slots WHERE lot_id = ? AND status = 'A' ORDER BY id ASC LIMIT 1
        ) AND status = 'A'
        RETURNING id
        "#,
    )
    .bind(lot_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(slot_id) = slot_id else {
        let lot_exists =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM parking_lots WHERE id = ?")
                .bind(lot_id)
                .fetch_one(&mut *tx)
                .await?;
        if lot_exists == 0 {
            return Err(AppError::NotFound("Parking lot not found".to_string()));
        }
        tracing::info!(lot_id, "No available slots for booking");
        return Ok(BookingOutcome::NoAvailability);
    };

    let start_time = format_timestamp(now);
    let booking_id = sqlx::query(
        "INSERT INTO bookings (username, slot_id, vehicle_number, start_time) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(slot_id)
    .bind(vehicle_number)
    .bind(&start_time)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    tracing::info!(booking_id, slot_id, lot_id, username, "Slot booked");

    Ok(BookingOutcome::Booked(Booking {
        id: booking_id,
        username: username.to_string(),
        slot_id,
        vehicle_number: vehicle_number.to_string(),
        start_time,
        end_time: None,
        cost: None,
    }))
}

/// `owner` restricts the release to that user's bookings; `None` releases any.
pub async fn release(
    pool: &SqlitePool,
    booking_id: i64,
    owner: Option<&str>,
) -> Result<ReleaseOutcome> {
    release_at(pool, booking_id, owner, Utc::now()).await
}

pub async fn release_at(
    pool: &SqlitePool,
    booking_id: i64,
    owner: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ReleaseOutcome> {
    let mut tx = pool.begin().await?;
    let end_time = format_timestamp(now);

    // Close the booking up front; every abort below drops the transaction and
    // rolls this back.
    let claimed = sqlx::query_as::<_, (i64, String)>(
        r#"
        UPDATE bookings SET end_time = ?
        WHERE id = ? AND end_time IS NULL AND (? IS NULL OR username = ?)
        RETURNING slot_id, start_time
        "#,
    )
    .bind(&end_time)
    .bind(booking_id)
    .bind(owner)
    .bind(owner)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((slot_id, start_time)) = claimed else {
        let existing = sqlx::query_as::<_, Booking>(
            "SELECT id, username, slot_id, vehicle_number, start_time, end_time, cost FROM bookings WHERE id = ?",
        )
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await?;

        return Ok(match existing {
            Some(b) if owner.map_or(true, |o| o == b.username) && !b.is_open() => {
                tracing::warn!(booking_id, "Booking already released");
                ReleaseOutcome::AlreadyReleased
            }
            _ => {
                tracing::warn!(booking_id, "Booking not found, release skipped");
                ReleaseOutcome::BookingNotFound
            }
        });
    };

    let lot_id = sqlx::query_scalar::<_, i64>("SELECT lot_id FROM slots WHERE id = ?")
        .bind(slot_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(lot_id) = lot_id else {
        tracing::warn!(booking_id, slot_id, "Slot not found, release skipped");
        return Ok(ReleaseOutcome::SlotNotFound);
    };

    let price = sqlx::query_scalar::<_, f64>("SELECT price FROM parking_lots WHERE id = ?")
        .bind(lot_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(price) = price else {
        tracing::warn!(booking_id, lot_id, "Lot not found, release skipped");
        return Ok(ReleaseOutcome::LotNotFound);
    };

    let start = parse_timestamp(&start_time).ok_or_else(|| {
        AppError::Internal(format!(
            "Booking {booking_id} has an unreadable start time: {start_time}"
        ))
    })?;
    let hours = billing::billable_hours(start, now);
    let cost = billing::parking_cost(price, start, now);

    sqlx::query("UPDATE bookings SET cost = ? WHERE id = ?")
        .bind(cost)
        .bind(booking_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE slots SET status = 'A' WHERE id = ?")
        .bind(slot_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(booking_id, slot_id, hours, cost, "Slot released");

    Ok(ReleaseOutcome::Released(ReleasedBooking {
        booking_id,
        slot_id,
        hours,
        cost,
        end_time,
    }))
}

pub async fn user_bookings(pool: &SqlitePool, username: &str) -> Result<Vec<BookingDetail>> {
    let sql = format!("{BOOKING_DETAIL_SELECT} WHERE b.username = ? ORDER BY b.id DESC");
    let bookings = sqlx::query_as::<_, BookingDetail>(&sql)
        .bind(username)
        .fetch_all(pool)
        .await?;
    Ok(bookings)
}

pub async fn active_bookings(pool: &SqlitePool, username: &str) -> Result<Vec<BookingDetail>> {
    let sql = format!(
        "{BOOKING_DETAIL_SELECT} WHERE b.username = ? AND b.end_time IS NULL ORDER BY b.id ASC"
    );
    let bookings = sqlx::query_as::<_, BookingDetail>(&sql)
        .bind(username)
        .fetch_all(pool)
        .await?;
    Ok(bookings)
}

pub async fn all_bookings(pool: &SqlitePool) -> Result<Vec<BookingDetail>> {
    let sql = format!("{BOOKING_DETAIL_SELECT} ORDER BY b.id DESC");
    let bookings = sqlx::query_as::<_, BookingDetail>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(bookings)
}
