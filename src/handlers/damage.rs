use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingStatus, DamageReport, DamageSeverity, DamageStatus};
use crate::state::AppState;

#[derive(Serialize)]
pub struct DamageReportResponse {
    id: String,
    booking_id: String,
    car_id: String,
    customer_id: String,
    description: String,
    severity: DamageSeverity,
    image_urls: Vec<String>,
    status: DamageStatus,
    created_at: String,
    resolved_at: Option<String>,
}

impl From<DamageReport> for DamageReportResponse {
    fn from(r: DamageReport) -> Self {
        DamageReportResponse {
            id: r.id,
            booking_id: r.booking_id,
            car_id: r.car_id,
            customer_id: r.customer_id,
            description: r.description,
            severity: r.severity,
            image_urls: r.image_urls,
            status: r.status,
            created_at: r.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            resolved_at: r
                .resolved_at
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

// GET /api/damage-reports
#[derive(Deserialize)]
pub struct DamageReportsQuery {
    pub status: Option<DamageStatus>,
    pub severity: Option<DamageSeverity>,
}

/// Staff see every report; customers only the ones they filed.
pub async fn list_damage_reports(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DamageReportsQuery>,
) -> Result<Json<Vec<DamageReportResponse>>, AppError> {
    let actor = super::actor_from_headers(&headers)?;

    let filter = queries::DamageReportFilter {
        customer_id: (!actor.is_staff).then(|| actor.id.clone()),
        status: query.status,
        severity: query.severity,
    };

    let reports = {
        let db = state.db.lock().unwrap();
        queries::list_damage_reports(&db, &filter)?
    };

    Ok(Json(
        reports.into_iter().map(DamageReportResponse::from).collect(),
    ))
}

// GET /api/damage-reports/:id
pub async fn get_damage_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DamageReportResponse>, AppError> {
    let actor = super::actor_from_headers(&headers)?;

    let report = {
        let db = state.db.lock().unwrap();
        crate::db::read_with_retry(|| queries::get_damage_report(&db, &id))?
    }
    .ok_or(AppError::NotFound("damage report"))?;

    if !actor.can_manage(&report.customer_id) {
        return Err(AppError::Forbidden);
    }

    Ok(Json(DamageReportResponse::from(report)))
}

// POST /api/damage-reports
#[derive(Deserialize)]
pub struct CreateDamageReportRequest {
    pub booking_id: String,
    pub description: String,
    pub severity: DamageSeverity,
    pub image_urls: Option<Vec<String>>,
}

pub async fn create_damage_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateDamageReportRequest>,
) -> Result<(StatusCode, Json<DamageReportResponse>), AppError> {
    let actor = super::actor_from_headers(&headers)?;

    let description = body.description.trim().to_string();
    if description.len() < 10 || description.len() > 500 {
        return Err(AppError::Validation(
            "description must be between 10 and 500 characters".to_string(),
        ));
    }

    let report = {
        let db = state.db.lock().unwrap();

        let booking =
            queries::get_booking(&db, &body.booking_id)?.ok_or(AppError::NotFound("booking"))?;

        if booking.customer_id != actor.id {
            return Err(AppError::Forbidden);
        }
        // damage is assessed at return, so the rental must be over
        if booking.status != BookingStatus::Completed {
            return Err(AppError::Validation(
                "damage reports can only be created for completed bookings".to_string(),
            ));
        }

        let report = DamageReport {
            id: Uuid::new_v4().to_string(),
            booking_id: booking.id,
            car_id: booking.car_id,
            customer_id: booking.customer_id,
            description,
            severity: body.severity,
            image_urls: body.image_urls.unwrap_or_default(),
            status: DamageStatus::Pending,
            created_at: Utc::now().naive_utc(),
            resolved_at: None,
        };
        queries::insert_damage_report(&db, &report)?;
        report
    };

    tracing::info!(report_id = %report.id, booking_id = %report.booking_id, "damage report filed");
    Ok((StatusCode::CREATED, Json(DamageReportResponse::from(report))))
}

// POST /api/damage-reports/:id/resolve
pub async fn resolve_damage_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<DamageReportResponse>, AppError> {
    super::require_staff(&headers)?;

    let report = {
        let db = state.db.lock().unwrap();

        let report =
            queries::get_damage_report(&db, &id)?.ok_or(AppError::NotFound("damage report"))?;
        if report.status == DamageStatus::Resolved {
            return Err(AppError::Validation(
                "damage report is already resolved".to_string(),
            ));
        }

        queries::resolve_damage_report(&db, &id)?;
        queries::get_damage_report(&db, &id)?.ok_or(AppError::NotFound("damage report"))?
    };

    Ok(Json(DamageReportResponse::from(report)))
}
