use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingStatus, Review, ReviewStatus};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ReviewResponse {
    id: String,
    booking_id: String,
    car_id: String,
    customer_id: String,
    rating: i32,
    comment: Option<String>,
    status: ReviewStatus,
    created_at: String,
}

impl From<Review> for ReviewResponse {
    fn from(r: Review) -> Self {
        ReviewResponse {
            id: r.id,
            booking_id: r.booking_id,
            car_id: r.car_id,
            customer_id: r.customer_id,
            rating: r.rating,
            comment: r.comment,
            status: r.status,
            created_at: r.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

// GET /api/cars/:id/reviews
pub async fn list_car_reviews(
    State(state): State<Arc<AppState>>,
    Path(car_id): Path<String>,
) -> Result<Json<Vec<ReviewResponse>>, AppError> {
    let reviews = {
        let db = state.db.lock().unwrap();
        queries::get_car(&db, &car_id)?.ok_or(AppError::NotFound("car"))?;
        queries::list_approved_reviews_for_car(&db, &car_id)?
    };

    Ok(Json(reviews.into_iter().map(ReviewResponse::from).collect()))
}

// POST /api/reviews
#[derive(Deserialize)]
pub struct CreateReviewRequest {
    pub booking_id: String,
    pub rating: i32,
    pub comment: Option<String>,
}

pub async fn create_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>), AppError> {
    let actor = super::actor_from_headers(&headers)?;

    if !(1..=5).contains(&body.rating) {
        return Err(AppError::Validation("rating must be between 1 and 5".to_string()));
    }

    let review = {
        let db = state.db.lock().unwrap();

        let booking =
            queries::get_booking(&db, &body.booking_id)?.ok_or(AppError::NotFound("booking"))?;

        if booking.customer_id != actor.id {
            return Err(AppError::Forbidden);
        }
        // reviews only make sense once the rental actually happened
        if booking.status != BookingStatus::Completed {
            return Err(AppError::Validation(
                "only completed bookings can be reviewed".to_string(),
            ));
        }
        if queries::get_review_for_booking(&db, &booking.id)?.is_some() {
            return Err(AppError::Validation(
                "booking has already been reviewed".to_string(),
            ));
        }

        let review = Review {
            id: Uuid::new_v4().to_string(),
            booking_id: booking.id,
            car_id: booking.car_id,
            customer_id: booking.customer_id,
            rating: body.rating,
            comment: body.comment,
            status: ReviewStatus::Pending,
            created_at: Utc::now().naive_utc(),
        };
        queries::insert_review(&db, &review)?;
        review
    };

    Ok((StatusCode::CREATED, Json(ReviewResponse::from(review))))
}

// PATCH /api/reviews/:id/status
#[derive(Deserialize)]
pub struct ModerateReviewRequest {
    pub status: ReviewStatus,
}

pub async fn moderate_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<ModerateReviewRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    super::require_staff(&headers)?;

    let updated = {
        let db = state.db.lock().unwrap();
        queries::update_review_status(&db, &id, body.status)?
    };

    if updated {
        Ok(Json(serde_json::json!({ "ok": true })))
    } else {
        Err(AppError::NotFound("review"))
    }
}
