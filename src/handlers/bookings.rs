use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::services::booking as booking_service;
use crate::services::notify;
use crate::state::AppState;

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    car_id: String,
    customer_id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_price: Decimal,
    status: BookingStatus,
    created_at: String,
    updated_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        BookingResponse {
            id: b.id,
            car_id: b.car_id,
            customer_id: b.customer_id,
            start_date: b.start_date,
            end_date: b.end_date,
            total_price: b.total_price,
            status: b.status,
            created_at: b.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            updated_at: b.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

// POST /api/bookings
#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub car_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let actor = super::actor_from_headers(&headers)?;

    let booking = {
        let mut db = state.db.lock().unwrap();
        booking_service::create_booking(
            &mut db,
            &actor.id,
            &body.car_id,
            body.start_date,
            body.end_date,
        )?
    };

    notify::spawn_created(&state, booking.clone());
    Ok((StatusCode::CREATED, Json(BookingResponse::from(booking))))
}

// GET /api/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<BookingStatus>,
    pub car_id: Option<String>,
    pub customer_id: Option<String>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let actor = super::actor_from_headers(&headers)?;

    let filter = queries::BookingFilter {
        customer_id: query.customer_id,
        car_id: query.car_id,
        status: query.status,
    };

    let bookings = {
        let db = state.db.lock().unwrap();
        booking_service::list_for_actor(&db, &actor, filter)?
    };

    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let actor = super::actor_from_headers(&headers)?;

    let booking = {
        let db = state.db.lock().unwrap();
        booking_service::get_booking_for_actor(&db, &id, &actor)?
    };

    Ok(Json(BookingResponse::from(booking)))
}

// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let actor = super::actor_from_headers(&headers)?;

    let booking = {
        let db = state.db.lock().unwrap();
        booking_service::cancel_booking(&db, &id, &actor)?
    };

    notify::spawn_status_changed(&state, booking.clone());
    Ok(Json(BookingResponse::from(booking)))
}

// PATCH /api/bookings/:id/status
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

pub async fn set_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    super::require_staff(&headers)?;

    let booking = {
        let db = state.db.lock().unwrap();
        booking_service::set_status(&db, &id, body.status)?
    };

    notify::spawn_status_changed(&state, booking.clone());
    Ok(Json(BookingResponse::from(booking)))
}

// GET /api/bookings/statistics
#[derive(Serialize)]
pub struct StatisticsResponse {
    total_bookings: i64,
    pending_bookings: i64,
    confirmed_bookings: i64,
    completed_bookings: i64,
    cancelled_bookings: i64,
    total_revenue: Decimal,
}

pub async fn statistics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatisticsResponse>, AppError> {
    super::require_staff(&headers)?;

    let stats = {
        let db = state.db.lock().unwrap();
        crate::db::read_with_retry(|| queries::booking_statistics(&db))?
    };

    Ok(Json(StatisticsResponse {
        total_bookings: stats.total,
        pending_bookings: stats.pending,
        confirmed_bookings: stats.confirmed,
        completed_bookings: stats.completed,
        cancelled_bookings: stats.cancelled,
        total_revenue: stats.total_revenue,
    }))
}
