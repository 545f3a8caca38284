use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Damage reported by a customer after a completed rental. `car_id` and
/// `customer_id` are denormalized from the booking at creation so reads
/// and visibility checks need no joins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageReport {
    pub id: String,
    pub booking_id: String,
    pub car_id: String,
    pub customer_id: String,
    pub description: String,
    pub severity: DamageSeverity,
    pub image_urls: Vec<String>,
    pub status: DamageStatus,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageSeverity {
    Low,
    Medium,
    High,
}

impl DamageSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            DamageSeverity::Low => "low",
            DamageSeverity::Medium => "medium",
            DamageSeverity::High => "high",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "high" => DamageSeverity::High,
            "medium" => DamageSeverity::Medium,
            _ => DamageSeverity::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageStatus {
    Pending,
    Resolved,
}

impl DamageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DamageStatus::Pending => "pending",
            DamageStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "resolved" => DamageStatus::Resolved,
            _ => DamageStatus::Pending,
        }
    }
}
