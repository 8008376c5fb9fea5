use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    /// Minutes.
    pub duration: u32,
}

/// The bookable unit: one clinic offering one service at its own price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicService {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub service_id: Uuid,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}
