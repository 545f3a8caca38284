use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{MaintenanceRecord, MaintenanceStatus};
use crate::state::AppState;

#[derive(Serialize)]
pub struct MaintenanceResponse {
    id: String,
    car_id: String,
    description: String,
    due_date: NaiveDate,
    status: MaintenanceStatus,
    created_at: String,
    completed_at: Option<String>,
    // derived from due_date/status at read time, never stored
    is_overdue: bool,
    days_until_due: i64,
}

impl MaintenanceResponse {
    fn from_record(record: MaintenanceRecord, today: NaiveDate) -> Self {
        MaintenanceResponse {
            is_overdue: record.is_overdue(today),
            days_until_due: record.days_until_due(today),
            id: record.id,
            car_id: record.car_id,
            description: record.description,
            due_date: record.due_date,
            status: record.status,
            created_at: record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            completed_at: record
                .completed_at
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

// GET /api/maintenance
#[derive(Deserialize)]
pub struct MaintenanceQuery {
    pub car_id: Option<String>,
    pub status: Option<MaintenanceStatus>,
    pub overdue: Option<bool>,
}

pub async fn list_maintenance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MaintenanceQuery>,
) -> Result<Json<Vec<MaintenanceResponse>>, AppError> {
    super::require_staff(&headers)?;

    let records = {
        let db = state.db.lock().unwrap();
        queries::list_maintenance(&db, query.car_id.as_deref(), query.status)?
    };

    let today = Utc::now().date_naive();
    let mut response: Vec<MaintenanceResponse> = records
        .into_iter()
        .map(|r| MaintenanceResponse::from_record(r, today))
        .collect();

    if let Some(overdue) = query.overdue {
        response.retain(|r| r.is_overdue == overdue);
    }

    Ok(Json(response))
}

// POST /api/maintenance
#[derive(Deserialize)]
pub struct CreateMaintenanceRequest {
    pub car_id: String,
    pub description: String,
    pub due_date: NaiveDate,
}

pub async fn create_maintenance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateMaintenanceRequest>,
) -> Result<(StatusCode, Json<MaintenanceResponse>), AppError> {
    super::require_staff(&headers)?;

    if body.description.trim().is_empty() {
        return Err(AppError::Validation("description is required".to_string()));
    }

    let record = {
        let db = state.db.lock().unwrap();
        queries::get_car(&db, &body.car_id)?.ok_or(AppError::NotFound("car"))?;

        let record = MaintenanceRecord {
            id: Uuid::new_v4().to_string(),
            car_id: body.car_id,
            description: body.description,
            due_date: body.due_date,
            status: MaintenanceStatus::Due,
            created_at: Utc::now().naive_utc(),
            completed_at: None,
        };
        queries::insert_maintenance(&db, &record)?;
        record
    };

    tracing::info!(maintenance_id = %record.id, car_id = %record.car_id, "maintenance scheduled");
    let today = Utc::now().date_naive();
    Ok((
        StatusCode::CREATED,
        Json(MaintenanceResponse::from_record(record, today)),
    ))
}

// POST /api/maintenance/:id/complete
pub async fn complete_maintenance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    super::require_staff(&headers)?;

    let completed = {
        let db = state.db.lock().unwrap();
        queries::complete_maintenance(&db, &id)?
    };

    if completed {
        Ok(Json(serde_json::json!({ "ok": true })))
    } else {
        Err(AppError::NotFound("maintenance record"))
    }
}
