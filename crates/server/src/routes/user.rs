use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::Booking,
    error::{AppError, Result},
    extract::{Json, Path},
    middleware::auth::Session,
    services::{
        booking::{self, BookingDetail, BookingOutcome, ReleaseOutcome, ReleasedBooking},
        lots::{self, LotSummary},
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/book", get(bookable_lots).post(book_slot))
        .route("/bookings", get(my_bookings))
        .route("/release/:id", post(release_slot))
}

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub lot_id: i64,
    pub vehicle_number: String,
}

#[derive(Debug, Serialize)]
pub struct LotsResponse {
    pub lots: Vec<LotSummary>,
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub message: String,
    pub booking: Booking,
}

#[derive(Debug, Serialize)]
pub struct BookingsResponse {
    pub bookings: Vec<BookingDetail>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<ReleasedBooking>,
}

async fn bookable_lots(State(state): State<AppState>) -> Result<Json<LotsResponse>> {
    let lots = lots::lot_summaries(&state.db.pool).await?;
    Ok(Json(LotsResponse { lots }))
}

async fn book_slot(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<BookRequest>,
) -> Result<Json<BookResponse>> {
    match booking::book(&state.db.pool, &session.username, body.lot_id, &body.vehicle_number).await? {
        BookingOutcome::Booked(booking) => Ok(Json(BookResponse {
            message: "Slot booked successfully!".to_string(),
            booking,
        })),
        BookingOutcome::NoAvailability => Err(AppError::Conflict(
            "No available slots in this lot!".to_string(),
        )),
    }
}

async fn my_bookings(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<BookingsResponse>> {
    let bookings = booking::user_bookings(&state.db.pool, &session.username).await?;
    Ok(Json(BookingsResponse { bookings }))
}

// Missing records abort the release without failing the request
async fn release_slot(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> Result<Json<ReleaseResponse>> {
    let owner = (!session.is_admin).then_some(session.username.as_str());
    let outcome = booking::release(&state.db.pool, id, owner).await?;

    let response = match outcome {
        ReleaseOutcome::Released(receipt) => ReleaseResponse {
            released: true,
            message: "Slot released.".to_string(),
            receipt: Some(receipt),
        },
        ReleaseOutcome::AlreadyReleased => ReleaseResponse {
            released: false,
            message: "Booking was already released.".to_string(),
            receipt: None,
        },
        ReleaseOutcome::BookingNotFound
        | ReleaseOutcome::SlotNotFound
        | ReleaseOutcome::LotNotFound => ReleaseResponse {
            released: false,
            message: "Nothing to release.".to_string(),
            receipt: None,
        },
    };

    Ok(Json(response))
}
