use serde::{Deserialize, Serialize};

pub const SLOT_AVAILABLE: &str = "A";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ParkingLot {
    pub id: i64,
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Slot {
    pub id: i64,
    pub lot_id: i64,
    pub location: String,
    pub status: String,
}

impl Slot {
    pub fn is_available(&self) -> bool {
        self.status == SLOT_AVAILABLE
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub username: String,
    pub slot_id: i64,
    pub vehicle_number: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub cost: Option<f64>,
}

impl Booking {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: i64,
    pub username: String,
    pub message: String,
    pub timestamp: String,
    pub is_admin: bool,
}
