// Parking lot and slot administration

use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    db::models::{ParkingLot, Slot, SLOT_AVAILABLE},
    error::{AppError, Result},
};

const MAX_SLOTS_PER_LOT: i64 = 10_000;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LotSummary {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub slot_count: i64,
    pub available_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResizeOutcome {
    pub slot_count: i64,
    pub added: i64,
    pub removed: i64,
    /// Occupied slots that could not be removed to reach the requested size.
    pub shortfall: i64,
}

/// A slot with its lot and, while occupied, the open booking parked there.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SlotOverview {
    pub id: i64,
    pub lot_name: String,
    pub location: String,
    pub status: String,
    pub vehicle_number: Option<String>,
    pub username: Option<String>,
    pub start_time: Option<String>,
}

fn validate_lot(name: &str, price: f64) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("Lot name is required".to_string()));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation(
            "Price must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}

fn validate_slot_count(count: i64) -> Result<()> {
    if !(0..=MAX_SLOTS_PER_LOT).contains(&count) {
        return Err(AppError::Validation(format!(
            "Number of spots must be between 0 and {MAX_SLOTS_PER_LOT}"
        )));
    }
    Ok(())
}

fn duplicate_name(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("A parking lot with this name already exists".to_string())
        }
        _ => AppError::Database(err),
    }
}

pub async fn create_lot(
    pool: &SqlitePool,
    name: &str,
    price: f64,
    num_spots: i64,
) -> Result<ParkingLot> {
    validate_lot(name, price)?;
    validate_slot_count(num_spots)?;
    let name = name.trim();

    let mut tx = pool.begin().await?;

    let lot_id = sqlx::query("INSERT INTO parking_lots (name, price) VALUES (?, ?)")
        .bind(name)
        .bind(price)
        .execute(&mut *tx)
        .await
        .map_err(duplicate_name)?
        .last_insert_rowid();

    for i in 1..=num_spots {
        sqlx::query("INSERT INTO slots (lot_id, location, status) VALUES (?, ?, 'A')")
            .bind(lot_id)
            .bind(format!("Spot {i}"))
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!(lot_id, name, num_spots, "Parking lot created");

    Ok(ParkingLot {
        id: lot_id,
        name: name.to_string(),
        price,
    })
}

pub async fn get_lot(pool: &SqlitePool, lot_id: i64) -> Result<ParkingLot> {
    sqlx::query_as::<_, ParkingLot>("SELECT id, name, price FROM parking_lots WHERE id = ?")
        .bind(lot_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Parking lot not found".to_string()))
}

pub async fn update_lot(pool: &SqlitePool, lot_id: i64, name: &str, price: f64) -> Result<ParkingLot> {
    validate_lot(name, price)?;
    let name = name.trim();

    let updated = sqlx::query("UPDATE parking_lots SET name = ?, price = ? WHERE id = ?")
        .bind(name)
        .bind(price)
        .bind(lot_id)
        .execute(pool)
        .await
        .map_err(duplicate_name)?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("Parking lot not found".to_string()));
    }

    Ok(ParkingLot {
        id: lot_id,
        name: name.to_string(),
        price,
    })
}

pub async fn slot_count(pool: &SqlitePool, lot_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM slots WHERE lot_id = ?")
        .bind(lot_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Grows by appending `Spot N` slots; shrinks by removing free slots only,
/// newest first, and stops short when too many are occupied.
pub async fn resize_lot(pool: &SqlitePool, lot_id: i64, new_count: i64) -> Result<ResizeOutcome> {
    validate_slot_count(new_count)?;

    let mut tx = pool.begin().await?;

    // Touch the lot row first so the transaction holds the write lock before
    // it counts slots.
    let exists = sqlx::query("UPDATE parking_lots SET price = price WHERE id = ?")
        .bind(lot_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if exists == 0 {
        return Err(AppError::NotFound("Parking lot not found".to_string()));
    }

    let current = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM slots WHERE lot_id = ?")
        .bind(lot_id)
        .fetch_one(&mut *tx)
        .await?;

    let mut added = 0;
    let mut removed = 0;

    if new_count > current {
        for i in (current + 1)..=new_count {
            sqlx::query("INSERT INTO slots (lot_id, location, status) VALUES (?, ?, 'A')")
                .bind(lot_id)
                .bind(format!("Spot {i}"))
                .execute(&mut *tx)
                .await?;
            added += 1;
        }
    } else if new_count < current {
        let free = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM slots WHERE lot_id = ? AND status = 'A' ORDER BY id DESC LIMIT ?",
        )
        .bind(lot_id)
        .bind(current - new_count)
        .fetch_all(&mut *tx)
        .await?;

        for slot_id in free {
            sqlx::query("DELETE FROM slots WHERE id = ?")
                .bind(slot_id)
                .execute(&mut *tx)
                .await?;
            removed += 1;
        }
    }

    tx.commit().await?;

    let slot_count = current + added - removed;
    let shortfall = (slot_count - new_count).max(0);
    if shortfall > 0 {
        tracing::warn!(lot_id, shortfall, "Occupied slots kept while shrinking lot");
    }
    tracing::info!(lot_id, added, removed, slot_count, "Parking lot resized");

    Ok(ResizeOutcome {
        slot_count,
        added,
        removed,
        shortfall,
    })
}

/// Deletes the lot and its slots; refused while any slot is occupied.
pub async fn delete_lot(pool: &SqlitePool, lot_id: i64) -> Result<u64> {
    let mut tx = pool.begin().await?;

    // Writes first, then decide. Nothing is removed while a slot is occupied.
    let slots_removed = sqlx::query(
        r#"
        DELETE FROM slots
        WHERE lot_id = ?
          AND NOT EXISTS (SELECT 1 FROM slots WHERE lot_id = ? AND status = 'O')
        "#,
    )
    .bind(lot_id)
    .bind(lot_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM parking_lots WHERE id = ?")
        .bind(lot_id)
        .fetch_one(&mut *tx)
        .await?;
    if exists == 0 {
        return Err(AppError::NotFound("Parking lot not found".to_string()));
    }

    let occupied = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM slots WHERE lot_id = ? AND status = 'O'",
    )
    .bind(lot_id)
    .fetch_one(&mut *tx)
    .await?;
    if occupied > 0 {
        return Err(AppError::Conflict(
            "Cannot delete lot: Some slots are occupied!".to_string(),
        ));
    }

    sqlx::query("DELETE FROM parking_lots WHERE id = ?")
        .bind(lot_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(lot_id, slots_removed, "Parking lot deleted");
    Ok(slots_removed)
}

pub async fn add_slot(pool: &SqlitePool, lot_id: i64, location: &str) -> Result<Slot> {
    let location = location.trim();
    if location.is_empty() {
        return Err(AppError::Validation("Slot location is required".to_string()));
    }

    get_lot(pool, lot_id).await?;

    let slot_id = sqlx::query("INSERT INTO slots (lot_id, location, status) VALUES (?, ?, 'A')")
        .bind(lot_id)
        .bind(location)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(Slot {
        id: slot_id,
        lot_id,
        location: location.to_string(),
        status: SLOT_AVAILABLE.to_string(),
    })
}

pub async fn delete_slot(pool: &SqlitePool, slot_id: i64) -> Result<()> {
    let slot = sqlx::query_as::<_, Slot>("SELECT id, lot_id, location, status FROM slots WHERE id = ?")
        .bind(slot_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Slot not found".to_string()))?;

    if !slot.is_available() {
        return Err(AppError::Conflict(
            "Cannot delete an occupied slot".to_string(),
        ));
    }

    // Guard against a booking landing between the read and the delete
    let deleted = sqlx::query("DELETE FROM slots WHERE id = ? AND status = 'A'")
        .bind(slot_id)
        .execute(pool)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(AppError::Conflict(
            "Cannot delete an occupied slot".to_string(),
        ));
    }

    Ok(())
}

pub async fn lot_summaries(pool: &SqlitePool) -> Result<Vec<LotSummary>> {
    let lots = sqlx::query_as::<_, LotSummary>(
        r#"
        SELECT l.id, l.name, l.price,
               COUNT(s.id) AS slot_count,
               COALESCE(SUM(CASE WHEN s.status = 'A' THEN 1 ELSE 0 END), 0) AS available_count
        FROM parking_lots l
        LEFT JOIN slots s ON s.lot_id = l.id
        GROUP BY l.id
        ORDER BY l.id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(lots)
}

pub async fn slot_overview(pool: &SqlitePool) -> Result<Vec<SlotOverview>> {
    let slots = sqlx::query_as::<_, SlotOverview>(
        r#"
        SELECT s.id, l.name AS lot_name, s.location, s.status,
               b.vehicle_number, b.username, b.start_time
        FROM slots s
        JOIN parking_lots l ON s.lot_id = l.id
        LEFT JOIN bookings b ON b.slot_id = s.id AND b.end_time IS NULL
        ORDER BY l.name ASC, s.id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::Database,
        services::booking::{self, BookingOutcome},
    };

    async fn occupy(pool: &SqlitePool, lot_id: i64) -> i64 {
        match booking::book(pool, "alice", lot_id, "KA01").await.unwrap() {
            BookingOutcome::Booked(b) => b.slot_id,
            BookingOutcome::NoAvailability => panic!("lot is full"),
        }
    }

    #[tokio::test]
    async fn create_lot_adds_numbered_slots() {
        let db = Database::in_memory().await.unwrap();
        let lot = create_lot(&db.pool, "  North  ", 15.0, 3).await.unwrap();
        assert_eq!(lot.name, "North");

        let summaries = lot_summaries(&db.pool).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].slot_count, 3);
        assert_eq!(summaries[0].available_count, 3);

        let overview = slot_overview(&db.pool).await.unwrap();
        let labels: Vec<_> = overview.iter().map(|s| s.location.as_str()).collect();
        assert_eq!(labels, vec!["Spot 1", "Spot 2", "Spot 3"]);
    }

    #[tokio::test]
    async fn create_lot_rejects_duplicates_and_bad_input() {
        let db = Database::in_memory().await.unwrap();
        create_lot(&db.pool, "North", 15.0, 1).await.unwrap();

        let err = create_lot(&db.pool, "North", 10.0, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = create_lot(&db.pool, "", 10.0, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = create_lot(&db.pool, "South", -1.0, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = create_lot(&db.pool, "South", 1.0, -4).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn update_lot_changes_name_and_price() {
        let db = Database::in_memory().await.unwrap();
        let lot = create_lot(&db.pool, "North", 15.0, 0).await.unwrap();

        update_lot(&db.pool, lot.id, "North Deck", 18.5).await.unwrap();
        let stored = get_lot(&db.pool, lot.id).await.unwrap();
        assert_eq!(stored.name, "North Deck");
        assert_eq!(stored.price, 18.5);

        let err = update_lot(&db.pool, 999, "Ghost", 1.0).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn resize_grows_with_continuing_labels() {
        let db = Database::in_memory().await.unwrap();
        let lot = create_lot(&db.pool, "North", 15.0, 2).await.unwrap();

        let outcome = resize_lot(&db.pool, lot.id, 4).await.unwrap();
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.slot_count, 4);

        let overview = slot_overview(&db.pool).await.unwrap();
        assert_eq!(overview.last().unwrap().location, "Spot 4");
    }

    #[tokio::test]
    async fn resize_shrinks_only_free_slots() {
        let db = Database::in_memory().await.unwrap();
        let lot = create_lot(&db.pool, "North", 15.0, 3).await.unwrap();
        occupy(&db.pool, lot.id).await;
        occupy(&db.pool, lot.id).await;

        let outcome = resize_lot(&db.pool, lot.id, 0).await.unwrap();
        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.slot_count, 2);
        assert_eq!(outcome.shortfall, 2);
        assert_eq!(slot_count(&db.pool, lot.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_lot_refuses_while_occupied() {
        let db = Database::in_memory().await.unwrap();
        let lot = create_lot(&db.pool, "North", 15.0, 2).await.unwrap();
        let slot_id = occupy(&db.pool, lot.id).await;

        let err = delete_lot(&db.pool, lot.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(slot_count(&db.pool, lot.id).await.unwrap(), 2);

        let booking_id = sqlx::query_scalar::<_, i64>("SELECT id FROM bookings WHERE slot_id = ?")
            .bind(slot_id)
            .fetch_one(&db.pool)
            .await
            .unwrap();
        booking::release(&db.pool, booking_id, None).await.unwrap();

        assert_eq!(delete_lot(&db.pool, lot.id).await.unwrap(), 2);
        assert_eq!(slot_count(&db.pool, lot.id).await.unwrap(), 0);
        assert!(lot_summaries(&db.pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resize_and_delete_of_unknown_lot_are_not_found() {
        let db = Database::in_memory().await.unwrap();
        let lot = create_lot(&db.pool, "North", 15.0, 2).await.unwrap();

        let err = resize_lot(&db.pool, 999, 4).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = delete_lot(&db.pool, 999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        assert_eq!(slot_count(&db.pool, lot.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn single_slots_are_added_and_removed_when_free() {
        let db = Database::in_memory().await.unwrap();
        let lot = create_lot(&db.pool, "North", 15.0, 0).await.unwrap();

        let slot = add_slot(&db.pool, lot.id, "Level 2 / B7").await.unwrap();
        assert!(slot.is_available());
        assert!(matches!(
            add_slot(&db.pool, 999, "X").await.unwrap_err(),
            AppError::NotFound(_)
        ));

        let occupied = occupy(&db.pool, lot.id).await;
        assert_eq!(occupied, slot.id);
        assert!(matches!(
            delete_slot(&db.pool, slot.id).await.unwrap_err(),
            AppError::Conflict(_)
        ));

        let spare = add_slot(&db.pool, lot.id, "Level 2 / B8").await.unwrap();
        delete_slot(&db.pool, spare.id).await.unwrap();
        assert!(matches!(
            delete_slot(&db.pool, spare.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn overview_shows_open_booking_details() {
        let db = Database::in_memory().await.unwrap();
        let lot = create_lot(&db.pool, "North", 15.0, 2).await.unwrap();
        occupy(&db.pool, lot.id).await;

        let overview = slot_overview(&db.pool).await.unwrap();
        assert_eq!(overview[0].status, "O");
        assert_eq!(overview[0].username.as_deref(), Some("alice"));
        assert_eq!(overview[0].vehicle_number.as_deref(), Some("KA01"));
        assert_eq!(overview[1].status, "A");
        assert_eq!(overview[1].username, None);
    }
}
