use std::sync::{Arc, Mutex};

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use fleetbook::config::AppConfig;
use fleetbook::db;
use fleetbook::handlers;
use fleetbook::services::notify::{EmailApiNotifier, Notifier, NoopNotifier};
use fleetbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let notifier: Box<dyn Notifier> = if config.email_api_url.is_empty() {
        tracing::info!("EMAIL_API_URL not set, booking notifications disabled");
        Box::new(NoopNotifier)
    } else {
        tracing::info!(url = %config.email_api_url, "using email API notifier");
        Box::new(EmailApiNotifier::new(
            config.email_api_url.clone(),
            config.email_api_key.clone(),
            config.email_from.clone(),
        ))
    };

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        notifier,
    });

    let app = Router::new()
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
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
