use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use crate::models::Booking;
use crate::state::AppState;

/// Outbound notification boundary. Delivery is best-effort by design:
/// callers fire these after the store commit and a failure must never fail
/// or roll back the booking itself.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_created(&self, booking: &Booking) -> anyhow::Result<()>;
    async fn booking_status_changed(&self, booking: &Booking) -> anyhow::Result<()>;
}

/// Used when no email API is configured (dev, tests).
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn booking_created(&self, booking: &Booking) -> anyhow::Result<()> {
        tracing::debug!(booking_id = %booking.id, "notification skipped (no notifier configured)");
        Ok(())
    }

    async fn booking_status_changed(&self, booking: &Booking) -> anyhow::Result<()> {
        tracing::debug!(booking_id = %booking.id, "notification skipped (no notifier configured)");
        Ok(())
    }
}

/// Posts transactional mail through an HTTP email API.
pub struct EmailApiNotifier {
    api_url: String,
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl EmailApiNotifier {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            api_url,
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }

    async fn send(&self, to: &str, subject: &str, text: &str) -> anyhow::Result<()> {
        self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "text": text,
            }))
            .send()
            .await
            .context("failed to reach email API")?
            .error_for_status()
            .context("email API returned error")?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailApiNotifier {
    async fn booking_created(&self, booking: &Booking) -> anyhow::Result<()> {
        let subject = format!("Booking received: {}", booking.id);
        let text = format!(
            "Your booking of car {} from {} to {} is pending confirmation. Total: {}.",
            booking.car_id, booking.start_date, booking.end_date, booking.total_price
        );
        self.send(&booking.customer_id, &subject, &text).await
    }

    async fn booking_status_changed(&self, booking: &Booking) -> anyhow::Result<()> {
        let subject = format!("Booking {}: {}", booking.id, booking.status);
        let text = format!(
            "Your booking of car {} from {} to {} is now {}.",
            booking.car_id, booking.start_date, booking.end_date, booking.status
        );
        self.send(&booking.customer_id, &subject, &text).await
    }
}

/// Fire-and-forget creation notice; logged and dropped on failure.
pub fn spawn_created(state: &Arc<AppState>, booking: Booking) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        if let Err(e) = state.notifier.booking_created(&booking).await {
            tracing::warn!(booking_id = %booking.id, error = %e, "booking-created notification failed");
        }
    });
}

/// Fire-and-forget status-change notice; logged and dropped on failure.
pub fn spawn_status_changed(state: &Arc<AppState>, booking: Booking) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        if let Err(e) = state.notifier.booking_status_changed(&booking).await {
            tracing::warn!(booking_id = %booking.id, error = %e, "status-change notification failed");
        }
    });
}
