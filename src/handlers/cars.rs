use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Car, CarStatus};
use crate::services::booking as booking_service;
use crate::state::AppState;

#[derive(Serialize)]
pub struct CarResponse {
    id: String,
    make: String,
    model: String,
    year: i32,
    price_per_day: Decimal,
    features: Vec<String>,
    image_urls: Vec<String>,
    status: CarStatus,
    created_at: String,
    updated_at: Option<String>,
}

impl From<Car> for CarResponse {
    fn from(car: Car) -> Self {
        CarResponse {
            id: car.id,
            make: car.make,
            model: car.model,
            year: car.year,
            price_per_day: car.price_per_day,
            features: car.features,
            image_urls: car.image_urls,
            status: car.status,
            created_at: car.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            updated_at: car
                .updated_at
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

// GET /api/cars
#[derive(Deserialize)]
pub struct CarsQuery {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub status: Option<CarStatus>,
}

pub async fn list_cars(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CarsQuery>,
) -> Result<Json<Vec<CarResponse>>, AppError> {
    let filter = queries::CarFilter {
        make: query.make,
        model: query.model,
        year: query.year,
        min_price: query.min_price,
        max_price: query.max_price,
        status: query.status,
    };

    let cars = {
        let db = state.db.lock().unwrap();
        queries::list_cars(&db, &filter)?
    };

    Ok(Json(cars.into_iter().map(CarResponse::from).collect()))
}

// GET /api/cars/:id
pub async fn get_car(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CarResponse>, AppError> {
    let car = {
        let db = state.db.lock().unwrap();
        crate::db::read_with_retry(|| queries::get_car(&db, &id))?
    };

    car.map(CarResponse::from)
        .map(Json)
        .ok_or(AppError::NotFound("car"))
}

// POST /api/cars
#[derive(Deserialize)]
pub struct CreateCarRequest {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub price_per_day: Decimal,
    pub features: Option<Vec<String>>,
    pub image_urls: Option<Vec<String>>,
    pub status: Option<CarStatus>,
}

pub async fn create_car(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateCarRequest>,
) -> Result<(StatusCode, Json<CarResponse>), AppError> {
    super::require_staff(&headers)?;

    if body.price_per_day <= Decimal::ZERO {
        return Err(AppError::Validation(
            "price_per_day must be positive".to_string(),
        ));
    }
    if body.make.trim().is_empty() || body.model.trim().is_empty() {
        return Err(AppError::Validation("make and model are required".to_string()));
    }

    let car = Car {
        id: Uuid::new_v4().to_string(),
        make: body.make,
        model: body.model,
        year: body.year,
        price_per_day: body.price_per_day,
        features: body.features.unwrap_or_default(),
        image_urls: body.image_urls.unwrap_or_default(),
        status: body.status.unwrap_or(CarStatus::Available),
        created_at: Utc::now().naive_utc(),
        updated_at: None,
    };

    {
        let db = state.db.lock().unwrap();
        queries::create_car(&db, &car)?;
    }

    tracing::info!(car_id = %car.id, make = %car.make, model = %car.model, "car added");
    Ok((StatusCode::CREATED, Json(CarResponse::from(car))))
}

// PUT /api/cars/:id
#[derive(Deserialize)]
pub struct UpdateCarRequest {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub price_per_day: Option<Decimal>,
    pub features: Option<Vec<String>>,
    pub image_urls: Option<Vec<String>>,
    pub status: Option<CarStatus>,
}

pub async fn update_car(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateCarRequest>,
) -> Result<Json<CarResponse>, AppError> {
    super::require_staff(&headers)?;

    if let Some(price) = &body.price_per_day {
        if *price <= Decimal::ZERO {
            return Err(AppError::Validation(
                "price_per_day must be positive".to_string(),
            ));
        }
    }

    let db = state.db.lock().unwrap();
    let mut car = queries::get_car(&db, &id)?.ok_or(AppError::NotFound("car"))?;

    if let Some(make) = body.make {
        car.make = make;
    }
    if let Some(model) = body.model {
        car.model = model;
    }
    if let Some(year) = body.year {
        car.year = year;
    }
    // Existing bookings keep the price they were created with.
    if let Some(price) = body.price_per_day {
        car.price_per_day = price;
    }
    if let Some(features) = body.features {
        car.features = features;
    }
    if let Some(image_urls) = body.image_urls {
        car.image_urls = image_urls;
    }
    if let Some(status) = body.status {
        car.status = status;
    }

    queries::update_car(&db, &car)?;
    car.updated_at = Some(Utc::now().naive_utc());

    Ok(Json(CarResponse::from(car)))
}

// DELETE /api/cars/:id
pub async fn delete_car(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    super::require_staff(&headers)?;

    let db = state.db.lock().unwrap();
    queries::get_car(&db, &id)?.ok_or(AppError::NotFound("car"))?;

    // Booking history (any status), maintenance records, reviews and
    // damage reports all carry foreign keys to the car, so deletion is
    // only possible while the car was never used.
    if queries::car_is_referenced(&db, &id)? {
        return Err(AppError::CarInUse);
    }

    queries::delete_car(&db, &id)?;
    tracing::info!(car_id = %id, "car deleted");
    Ok(Json(serde_json::json!({ "ok": true })))
}

// GET /api/cars/:id/availability
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let outcome = {
        let db = state.db.lock().unwrap();
        booking_service::check_availability(&db, &id, query.start, query.end)?
    };

    Ok(Json(AvailabilityResponse {
        available: outcome.is_available(),
        reason: outcome.reason(),
    }))
}
