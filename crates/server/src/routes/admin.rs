use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{ParkingLot, Slot},
    error::Result,
    extract::{Json, Path},
    middleware::auth::Session,
    routes::auth::MessageResponse,
    services::{
        accounts::{self, UserListing},
        booking::{self, BookingDetail, ReleaseOutcome},
        lots::{self, LotSummary, ResizeOutcome, SlotOverview},
        stats::{self, AdminStats},
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/lots", get(list_lots).post(create_lot))
        .route("/lots/:id", get(get_lot).put(update_lot).delete(delete_lot))
        .route("/lots/:id/spots", put(resize_lot))
        .route("/lot-summary", get(lot_summary))
        .route("/slots", post(add_slot))
        .route("/slots/:id", delete(delete_slot))
        .route("/bookings", get(list_bookings))
        .route("/bookings/:id/release", post(release_booking))
        .route("/users", get(list_users))
}

#[derive(Debug, Deserialize)]
pub struct CreateLotRequest {
    pub lot_name: String,
    pub price: f64,
    pub num_spots: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLotRequest {
    pub lot_name: String,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct ResizeLotRequest {
    pub new_spots: i64,
}

#[derive(Debug, Deserialize)]
pub struct AddSlotRequest {
    pub lot_id: i64,
    pub location: String,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub slots: Vec<SlotOverview>,
    pub stats: AdminStats,
}

#[derive(Debug, Serialize)]
pub struct LotDetailResponse {
    #[serde(flatten)]
    pub lot: ParkingLot,
    pub spot_count: i64,
}

#[derive(Debug, Serialize)]
pub struct LotListResponse {
    pub lots: Vec<LotSummary>,
}

#[derive(Debug, Serialize)]
pub struct LotSummaryRow {
    pub name: String,
    pub slot_count: i64,
    pub price: f64,
}

#[derive(Debug, Serialize)]
pub struct DeleteLotResponse {
    pub message: String,
    pub slots_removed: u64,
}

#[derive(Debug, Serialize)]
pub struct BookingsListResponse {
    pub bookings: Vec<BookingDetail>,
}

#[derive(Debug, Serialize)]
pub struct UsersListResponse {
    pub users: Vec<UserListing>,
}

#[derive(Debug, Serialize)]
pub struct AdminReleaseResponse {
    pub released: bool,
    pub message: String,
}

async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>> {
    let slots = lots::slot_overview(&state.db.pool).await?;
    let stats = stats::admin(&state.db.pool, Utc::now()).await?;
    Ok(Json(DashboardResponse { slots, stats }))
}

async fn list_lots(State(state): State<AppState>) -> Result<Json<LotListResponse>> {
    let lots = lots::lot_summaries(&state.db.pool).await?;
    Ok(Json(LotListResponse { lots }))
}

async fn create_lot(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateLotRequest>,
) -> Result<Json<ParkingLot>> {
    let lot = lots::create_lot(&state.db.pool, &body.lot_name, body.price, body.num_spots).await?;
    tracing::debug!(admin = %session.username, lot_id = lot.id, "Lot created by admin");
    Ok(Json(lot))
}

async fn get_lot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LotDetailResponse>> {
    let lot = lots::get_lot(&state.db.pool, id).await?;
    let spot_count = lots::slot_count(&state.db.pool, id).await?;
    Ok(Json(LotDetailResponse { lot, spot_count }))
}

async fn update_lot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateLotRequest>,
) -> Result<Json<ParkingLot>> {
    let lot = lots::update_lot(&state.db.pool, id, &body.lot_name, body.price).await?;
    Ok(Json(lot))
}

async fn resize_lot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ResizeLotRequest>,
) -> Result<Json<ResizeOutcome>> {
    let outcome = lots::resize_lot(&state.db.pool, id, body.new_spots).await?;
    Ok(Json(outcome))
}

async fn delete_lot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteLotResponse>> {
    let slots_removed = lots::delete_lot(&state.db.pool, id).await?;
    Ok(Json(DeleteLotResponse {
        message: "Parking lot and its slots deleted.".to_string(),
        slots_removed,
    }))
}

async fn lot_summary(State(state): State<AppState>) -> Result<Json<Vec<LotSummaryRow>>> {
    let rows = lots::lot_summaries(&state.db.pool)
        .await?
        .into_iter()
        .map(|lot| LotSummaryRow {
            name: lot.name,
            slot_count: lot.slot_count,
            price: lot.price,
        })
        .collect();
    Ok(Json(rows))
}

async fn add_slot(
    State(state): State<AppState>,
    Json(body): Json<AddSlotRequest>,
) -> Result<Json<Slot>> {
    let slot = lots::add_slot(&state.db.pool, body.lot_id, &body.location).await?;
    Ok(Json(slot))
}

async fn delete_slot(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>> {
    lots::delete_slot(&state.db.pool, id).await?;
    Ok(Json(MessageResponse {
        message: "Slot deleted.".to_string(),
    }))
}

async fn list_bookings(State(state): State<AppState>) -> Result<Json<BookingsListResponse>> {
    let bookings = booking::all_bookings(&state.db.pool).await?;
    Ok(Json(BookingsListResponse { bookings }))
}

async fn release_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AdminReleaseResponse>> {
    let outcome = booking::release(&state.db.pool, id, None).await?;
    let released = matches!(outcome, ReleaseOutcome::Released(_));
    Ok(Json(AdminReleaseResponse {
        released,
        message: if released {
            "Slot released.".to_string()
        } else {
            "Nothing to release.".to_string()
        },
    }))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<UsersListResponse>> {
    let users = accounts::list_users(&state.db.pool).await?;
    Ok(Json(UsersListResponse { users }))
}
