use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use chrono::{Days, Utc};
use tower::ServiceExt;

use fleetbook::config::AppConfig;
use fleetbook::db::{self, queries};
use fleetbook::handlers;
use fleetbook::models::{Booking, BookingStatus};
use fleetbook::services::booking as booking_service;
use fleetbook::services::notify::Notifier;
use fleetbook::state::AppState;

// ── Mock Notifier ──

struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn booking_created(&self, booking: &Booking) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("email API down");
        }
        self.sent.lock().unwrap().push(format!("created:{}", booking.id));
        Ok(())
    }

    async fn booking_status_changed(&self, booking: &Booking) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("email API down");
        }
        self.sent
            .lock()
            .unwrap()
            .push(format!("{}:{}", booking.status, booking.id));
        Ok(())
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        email_api_url: String::new(),
        email_api_key: String::new(),
        email_from: "bookings@test".to_string(),
    }
}

fn test_state_with(fail_notifier: bool) -> (Arc<AppState>, Arc<Mutex<Vec<String>>>) {
    let conn = db::init_db(":memory:").unwrap();
    let sent = Arc::new(Mutex::new(vec![]));
    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
        notifier: Box::new(RecordingNotifier {
            sent: Arc::clone(&sent),
            fail: fail_notifier,
        }),
    });
    (state, sent)
}

fn test_state() -> Arc<AppState> {
    test_state_with(false).0
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/cars", get(handlers::cars::list_cars))
        .route("/api/cars", post(handlers::cars::create_car))
        .route("/api/cars/:id", get(handlers::cars::get_car))
        .route("/api/cars/:id", put(handlers::cars::update_car))
        .route("/api/cars/:id", delete(handlers::cars::delete_car))
        .route(
            "/api/cars/:id/availability",
            get(handlers::cars::check_availability),
        )
        .route("/api/cars/:id/reviews", get(handlers::reviews::list_car_reviews))
        .route("/api/bookings", get(handlers::bookings::list_bookings))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route(
            "/api/bookings/statistics",
            get(handlers::bookings::statistics),
        )
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/status",
            patch(handlers::bookings::set_booking_status),
        )
        .route(
            "/api/maintenance",
            get(handlers::maintenance::list_maintenance),
        )
        .route(
            "/api/maintenance",
            post(handlers::maintenance::create_maintenance),
        )
        .route(
            "/api/maintenance/:id/complete",
            post(handlers::maintenance::complete_maintenance),
        )
        .route("/api/reviews", post(handlers::reviews::create_review))
        .route(
            "/api/reviews/:id/status",
            patch(handlers::reviews::moderate_review),
        )
        .route(
            "/api/damage-reports",
            get(handlers::damage::list_damage_reports),
        )
        .route(
            "/api/damage-reports",
            post(handlers::damage::create_damage_report),
        )
        .route(
            "/api/damage-reports/:id",
            get(handlers::damage::get_damage_report),
        )
        .route(
            "/api/damage-reports/:id/resolve",
            post(handlers::damage::resolve_damage_report),
        )
        .with_state(state)
}

/// ISO date `offset` days from today.
fn day(offset: u64) -> String {
    Utc::now()
        .date_naive()
        .checked_add_days(Days::new(offset))
        .unwrap()
        .format("%Y-%m-%d")
        .to_string()
}

fn request(
    method: &str,
    uri: &str,
    actor: Option<(&str, bool)>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, is_staff)) = actor {
        builder = builder.header("x-actor-id", id);
        if is_staff {
            builder = builder.header("x-actor-role", "staff");
        }
    }
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(res: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn seed_car(app: &Router, price: &str) -> String {
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/cars",
            Some(("admin", true)),
            Some(serde_json::json!({
                "make": "Toyota",
                "model": "Corolla",
                "year": 2022,
                "price_per_day": price,
                "features": ["GPS"],
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    json_body(res).await["id"].as_str().unwrap().to_string()
}

async fn create_booking(
    app: &Router,
    customer: &str,
    car_id: &str,
    start: u64,
    end: u64,
) -> axum::response::Response {
    app.clone()
        .oneshot(request(
            "POST",
            "/api/bookings",
            Some((customer, false)),
            Some(serde_json::json!({
                "car_id": car_id,
                "start_date": day(start),
                "end_date": day(end),
            })),
        ))
        .await
        .unwrap()
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let app = test_app(test_state());
    let res = app
        .oneshot(request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

// ── Cars ──

#[tokio::test]
async fn test_car_crud_requires_staff() {
    let app = test_app(test_state());

    let body = serde_json::json!({
        "make": "Honda", "model": "Civic", "year": 2023, "price_per_day": "45.50"
    });

    let res = app
        .clone()
        .oneshot(request("POST", "/api/cars", None, Some(body.clone())))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = app
        .clone()
        .oneshot(request("POST", "/api/cars", Some(("cust-1", false)), Some(body)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_car_create_and_fetch() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "45.50").await;

    let res = app
        .clone()
        .oneshot(request("GET", &format!("/api/cars/{car_id}"), None, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json["make"], "Toyota");
    assert_eq!(json["price_per_day"], "45.50");
    assert_eq!(json["status"], "available");
}

#[tokio::test]
async fn test_car_list_filters() {
    let app = test_app(test_state());
    seed_car(&app, "45.50").await;

    let res = app
        .clone()
        .oneshot(request("GET", "/api/cars?make=Toy", None, None))
        .await
        .unwrap();
    assert_eq!(json_body(res).await.as_array().unwrap().len(), 1);

    let res = app
        .clone()
        .oneshot(request("GET", "/api/cars?make=Ford", None, None))
        .await
        .unwrap();
    assert_eq!(json_body(res).await.as_array().unwrap().len(), 0);

    let res = app
        .clone()
        .oneshot(request("GET", "/api/cars?min_price=100", None, None))
        .await
        .unwrap();
    assert_eq!(json_body(res).await.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_car_delete_blocked_by_active_booking() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;
    let res = create_booking(&app, "cust-1", &car_id, 5, 8).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/cars/{car_id}"),
            Some(("admin", true)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_car_delete_blocked_by_booking_history() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;
    let res = create_booking(&app, "cust-1", &car_id, 5, 8).await;
    let booking_id = json_body(res).await["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/bookings/{booking_id}/cancel"),
            Some(("cust-1", false)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // the cancelled booking still references the car row, so deleting
    // it would break the foreign key
    let res = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/cars/{car_id}"),
            Some(("admin", true)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_car_delete_when_never_used() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;

    let res = app
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/cars/{car_id}"),
            Some(("admin", true)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(request("GET", &format!("/api/cars/{car_id}"), None, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// ── Availability ──

#[tokio::test]
async fn test_availability_endpoint() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;

    let uri = format!(
        "/api/cars/{car_id}/availability?start={}&end={}",
        day(5),
        day(8)
    );
    let res = app.clone().oneshot(request("GET", &uri, None, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["available"], true);

    create_booking(&app, "cust-1", &car_id, 5, 8).await;

    let res = app.clone().oneshot(request("GET", &uri, None, None)).await.unwrap();
    let json = json_body(res).await;
    assert_eq!(json["available"], false);
    assert!(json["reason"].as_str().unwrap().contains("booked"));
}

#[tokio::test]
async fn test_availability_rejects_inverted_range() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;

    let uri = format!(
        "/api/cars/{car_id}/availability?start={}&end={}",
        day(8),
        day(5)
    );
    let res = app.oneshot(request("GET", &uri, None, None)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

// ── Bookings ──

#[tokio::test]
async fn test_booking_lifecycle_over_http() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;

    let res = create_booking(&app, "cust-1", &car_id, 10, 13).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = json_body(res).await;
    assert_eq!(created["status"], "pending");
    assert_eq!(created["total_price"], "150");
    let booking_id = created["id"].as_str().unwrap().to_string();

    // staff confirms, then completes
    for status in ["confirmed", "completed"] {
        let res = app
            .clone()
            .oneshot(request(
                "PATCH",
                &format!("/api/bookings/{booking_id}/status"),
                Some(("admin", true)),
                Some(serde_json::json!({ "status": status })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["status"], status);
    }
}

#[tokio::test]
async fn test_booking_conflict_is_409() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;

    assert_eq!(
        create_booking(&app, "cust-1", &car_id, 10, 15).await.status(),
        StatusCode::CREATED
    );
    let res = create_booking(&app, "cust-2", &car_id, 12, 17).await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let json = json_body(res).await;
    assert!(json["error"].as_str().unwrap().contains("not available"));
}

#[tokio::test]
async fn test_back_to_back_bookings_allowed() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;

    assert_eq!(
        create_booking(&app, "cust-1", &car_id, 10, 14).await.status(),
        StatusCode::CREATED
    );
    assert_eq!(
        create_booking(&app, "cust-2", &car_id, 14, 19).await.status(),
        StatusCode::CREATED
    );
}

#[tokio::test]
async fn test_booking_past_date_is_400() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;

    let yesterday = Utc::now()
        .date_naive()
        .pred_opt()
        .unwrap()
        .format("%Y-%m-%d")
        .to_string();
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/bookings",
            Some(("cust-1", false)),
            Some(serde_json::json!({
                "car_id": car_id,
                "start_date": yesterday,
                "end_date": day(3),
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(res).await["error"]
        .as_str()
        .unwrap()
        .contains("past"));
}

#[tokio::test]
async fn test_cancel_frees_slot_and_is_access_controlled() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;

    let res = create_booking(&app, "cust-1", &car_id, 10, 15).await;
    let booking_id = json_body(res).await["id"].as_str().unwrap().to_string();

    // another customer cannot cancel it
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/bookings/{booking_id}/cancel"),
            Some(("cust-2", false)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // the owner can
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/bookings/{booking_id}/cancel"),
            Some(("cust-1", false)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // cancelling again is a conflict (already terminal)
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/bookings/{booking_id}/cancel"),
            Some(("cust-1", false)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // and the slot is free again
    assert_eq!(
        create_booking(&app, "cust-2", &car_id, 10, 15).await.status(),
        StatusCode::CREATED
    );
}

#[tokio::test]
async fn test_status_change_requires_staff_and_valid_transition() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;
    let res = create_booking(&app, "cust-1", &car_id, 10, 13).await;
    let booking_id = json_body(res).await["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/api/bookings/{booking_id}/status"),
            Some(("cust-1", false)),
            Some(serde_json::json!({ "status": "confirmed" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // pending -> completed skips confirmation
    let res = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/api/bookings/{booking_id}/status"),
            Some(("admin", true)),
            Some(serde_json::json!({ "status": "completed" })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_booking_visibility() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;
    let res = create_booking(&app, "cust-1", &car_id, 10, 13).await;
    let booking_id = json_body(res).await["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/bookings/{booking_id}"),
            Some(("cust-2", false)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // list is scoped to the requesting customer
    create_booking(&app, "cust-2", &car_id, 20, 22).await;
    let res = app
        .clone()
        .oneshot(request("GET", "/api/bookings", Some(("cust-1", false)), None))
        .await
        .unwrap();
    let list = json_body(res).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["customer_id"], "cust-1");
}

#[tokio::test]
async fn test_statistics() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;

    let res = create_booking(&app, "cust-1", &car_id, 10, 13).await;
    let booking_id = json_body(res).await["id"].as_str().unwrap().to_string();
    for status in ["confirmed", "completed"] {
        app.clone()
            .oneshot(request(
                "PATCH",
                &format!("/api/bookings/{booking_id}/status"),
                Some(("admin", true)),
                Some(serde_json::json!({ "status": status })),
            ))
            .await
            .unwrap();
    }
    create_booking(&app, "cust-2", &car_id, 20, 25).await;

    let res = app
        .clone()
        .oneshot(request(
            "GET",
            "/api/bookings/statistics",
            Some(("admin", true)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = json_body(res).await;
    assert_eq!(json["total_bookings"], 2);
    assert_eq!(json["pending_bookings"], 1);
    assert_eq!(json["completed_bookings"], 1);
    assert_eq!(json["total_revenue"], "150");
}

// ── Notifications ──

#[tokio::test]
async fn test_booking_creation_notifies() {
    let (state, sent) = test_state_with(false);
    let app = test_app(state);
    let car_id = seed_car(&app, "50").await;

    let res = create_booking(&app, "cust-1", &car_id, 10, 13).await;
    let booking_id = json_body(res).await["id"].as_str().unwrap().to_string();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*sent.lock().unwrap(), vec![format!("created:{booking_id}")]);
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_booking() {
    let (state, sent) = test_state_with(true);
    let app = test_app(state);
    let car_id = seed_car(&app, "50").await;

    let res = create_booking(&app, "cust-1", &car_id, 10, 13).await;
    assert_eq!(res.status(), StatusCode::CREATED);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sent.lock().unwrap().is_empty());
}

// ── Concurrent create race ──

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_one_winner() {
    let (state, _) = test_state_with(false);
    let app = test_app(Arc::clone(&state));
    let car_id = seed_car(&app, "50").await;

    let start = Utc::now().date_naive().checked_add_days(Days::new(10)).unwrap();
    let end = Utc::now().date_naive().checked_add_days(Days::new(15)).unwrap();

    let mut handles = vec![];
    for i in 0..8 {
        let state = Arc::clone(&state);
        let car_id = car_id.clone();
        handles.push(tokio::spawn(async move {
            let mut db = state.db.lock().unwrap();
            booking_service::create_booking(&mut db, &format!("cust-{i}"), &car_id, start, end)
        }));
    }

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(fleetbook::errors::AppError::DateRangeConflict) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(conflicts, 7);

    // exactly one non-cancelled booking exists for the car
    let db = state.db.lock().unwrap();
    let bookings = queries::list_bookings(
        &db,
        &queries::BookingFilter {
            car_id: Some(car_id),
            ..Default::default()
        },
    )
    .unwrap();
    let active: Vec<_> = bookings
        .iter()
        .filter(|b| b.status != BookingStatus::Cancelled)
        .collect();
    assert_eq!(active.len(), 1);
}

// ── Maintenance ──

#[tokio::test]
async fn test_maintenance_derived_fields() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;

    // due in the past -> overdue with negative days_until_due
    let past_due = Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(3))
        .unwrap()
        .format("%Y-%m-%d")
        .to_string();
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/maintenance",
            Some(("admin", true)),
            Some(serde_json::json!({
                "car_id": car_id,
                "description": "brake inspection",
                "due_date": past_due,
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let record = json_body(res).await;
    assert_eq!(record["is_overdue"], true);
    assert_eq!(record["days_until_due"], -3);
    let record_id = record["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(request("GET", "/api/maintenance?overdue=true", Some(("admin", true)), None))
        .await
        .unwrap();
    assert_eq!(json_body(res).await.as_array().unwrap().len(), 1);

    // completing clears the overdue flag
    app.clone()
        .oneshot(request(
            "POST",
            &format!("/api/maintenance/{record_id}/complete"),
            Some(("admin", true)),
            None,
        ))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(request("GET", "/api/maintenance?overdue=true", Some(("admin", true)), None))
        .await
        .unwrap();
    assert_eq!(json_body(res).await.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_maintenance_requires_staff() {
    let app = test_app(test_state());
    let res = app
        .oneshot(request("GET", "/api/maintenance", Some(("cust-1", false)), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

// ── Reviews ──

#[tokio::test]
async fn test_review_gated_on_completed_booking() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;
    let res = create_booking(&app, "cust-1", &car_id, 10, 13).await;
    let booking_id = json_body(res).await["id"].as_str().unwrap().to_string();

    let review_body = serde_json::json!({ "booking_id": booking_id, "rating": 5, "comment": "great car" });

    // pending booking cannot be reviewed
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/reviews",
            Some(("cust-1", false)),
            Some(review_body.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    for status in ["confirmed", "completed"] {
        app.clone()
            .oneshot(request(
                "PATCH",
                &format!("/api/bookings/{booking_id}/status"),
                Some(("admin", true)),
                Some(serde_json::json!({ "status": status })),
            ))
            .await
            .unwrap();
    }

    // only the booking's customer may review it
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/reviews",
            Some(("cust-2", false)),
            Some(review_body.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/reviews",
            Some(("cust-1", false)),
            Some(review_body.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let review = json_body(res).await;
    let review_id = review["id"].as_str().unwrap().to_string();
    assert_eq!(review["status"], "pending");

    // second review for the same booking is rejected
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/reviews",
            Some(("cust-1", false)),
            Some(review_body),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // only approved reviews are listed publicly
    let res = app
        .clone()
        .oneshot(request("GET", &format!("/api/cars/{car_id}/reviews"), None, None))
        .await
        .unwrap();
    assert_eq!(json_body(res).await.as_array().unwrap().len(), 0);

    app.clone()
        .oneshot(request(
            "PATCH",
            &format!("/api/reviews/{review_id}/status"),
            Some(("admin", true)),
            Some(serde_json::json!({ "status": "approved" })),
        ))
        .await
        .unwrap();

    let res = app
        .clone()
        .oneshot(request("GET", &format!("/api/cars/{car_id}/reviews"), None, None))
        .await
        .unwrap();
    let reviews = json_body(res).await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
    assert_eq!(reviews[0]["rating"], 5);
}

#[tokio::test]
async fn test_review_rating_bounds() {
    let app = test_app(test_state());
    let res = app
        .oneshot(request(
            "POST",
            "/api/reviews",
            Some(("cust-1", false)),
            Some(serde_json::json!({ "booking_id": "whatever", "rating": 6 })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

// ── Damage reports ──

async fn completed_booking(app: &Router, customer: &str, car_id: &str, start: u64, end: u64) -> String {
    let res = create_booking(app, customer, car_id, start, end).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let booking_id = json_body(res).await["id"].as_str().unwrap().to_string();

    for status in ["confirmed", "completed"] {
        let res = app
            .clone()
            .oneshot(request(
                "PATCH",
                &format!("/api/bookings/{booking_id}/status"),
                Some(("admin", true)),
                Some(serde_json::json!({ "status": status })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
    booking_id
}

#[tokio::test]
async fn test_damage_report_gated_on_completed_booking() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;
    let res = create_booking(&app, "cust-1", &car_id, 10, 13).await;
    let booking_id = json_body(res).await["id"].as_str().unwrap().to_string();

    let report_body = serde_json::json!({
        "booking_id": booking_id,
        "description": "scratch along the rear passenger door",
        "severity": "medium",
        "image_urls": ["https://img.example/1.jpg"],
    });

    // damage cannot be reported while the rental is still pending
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/damage-reports",
            Some(("cust-1", false)),
            Some(report_body.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    for status in ["confirmed", "completed"] {
        app.clone()
            .oneshot(request(
                "PATCH",
                &format!("/api/bookings/{booking_id}/status"),
                Some(("admin", true)),
                Some(serde_json::json!({ "status": status })),
            ))
            .await
            .unwrap();
    }

    // only the booking's customer may report damage on it
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/damage-reports",
            Some(("cust-2", false)),
            Some(report_body.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/damage-reports",
            Some(("cust-1", false)),
            Some(report_body),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let report = json_body(res).await;
    assert_eq!(report["status"], "pending");
    assert_eq!(report["severity"], "medium");
    assert_eq!(report["car_id"], car_id.as_str());
    assert!(report["resolved_at"].is_null());
}

#[tokio::test]
async fn test_damage_report_resolve_is_staff_only_and_once() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;
    let booking_id = completed_booking(&app, "cust-1", &car_id, 10, 13).await;

    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/damage-reports",
            Some(("cust-1", false)),
            Some(serde_json::json!({
                "booking_id": booking_id,
                "description": "cracked windscreen on the driver side",
                "severity": "high",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let report_id = json_body(res).await["id"].as_str().unwrap().to_string();

    let resolve_uri = format!("/api/damage-reports/{report_id}/resolve");

    let res = app
        .clone()
        .oneshot(request("POST", &resolve_uri, Some(("cust-1", false)), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .clone()
        .oneshot(request("POST", &resolve_uri, Some(("admin", true)), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let resolved = json_body(res).await;
    assert_eq!(resolved["status"], "resolved");
    assert!(resolved["resolved_at"].is_string());

    // resolving twice is rejected
    let res = app
        .clone()
        .oneshot(request("POST", &resolve_uri, Some(("admin", true)), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_damage_report_visibility_and_filters() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;

    let booking_1 = completed_booking(&app, "cust-1", &car_id, 10, 13).await;
    let booking_2 = completed_booking(&app, "cust-2", &car_id, 20, 23).await;

    for (customer, booking_id, severity) in [
        ("cust-1", &booking_1, "low"),
        ("cust-2", &booking_2, "high"),
    ] {
        let res = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/damage-reports",
                Some((customer, false)),
                Some(serde_json::json!({
                    "booking_id": booking_id,
                    "description": "dent in the front bumper area",
                    "severity": severity,
                })),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    // customers only see their own reports
    let res = app
        .clone()
        .oneshot(request("GET", "/api/damage-reports", Some(("cust-1", false)), None))
        .await
        .unwrap();
    let own = json_body(res).await;
    assert_eq!(own.as_array().unwrap().len(), 1);
    assert_eq!(own[0]["customer_id"], "cust-1");
    let foreign_report_id = {
        let res = app
            .clone()
            .oneshot(request("GET", "/api/damage-reports", Some(("cust-2", false)), None))
            .await
            .unwrap();
        json_body(res).await[0]["id"].as_str().unwrap().to_string()
    };

    // and cannot fetch someone else's by id
    let res = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/damage-reports/{foreign_report_id}"),
            Some(("cust-1", false)),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // staff see everything and can narrow by severity
    let res = app
        .clone()
        .oneshot(request("GET", "/api/damage-reports", Some(("admin", true)), None))
        .await
        .unwrap();
    assert_eq!(json_body(res).await.as_array().unwrap().len(), 2);

    let res = app
        .clone()
        .oneshot(request(
            "GET",
            "/api/damage-reports?severity=high",
            Some(("admin", true)),
            None,
        ))
        .await
        .unwrap();
    let high = json_body(res).await;
    assert_eq!(high.as_array().unwrap().len(), 1);
    assert_eq!(high[0]["customer_id"], "cust-2");
}

#[tokio::test]
async fn test_damage_report_description_bounds() {
    let app = test_app(test_state());
    let car_id = seed_car(&app, "50").await;
    let booking_id = completed_booking(&app, "cust-1", &car_id, 10, 13).await;

    let res = app
        .oneshot(request(
            "POST",
            "/api/damage-reports",
            Some(("cust-1", false)),
            Some(serde_json::json!({
                "booking_id": booking_id,
                "description": "scratch",
                "severity": "low",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
