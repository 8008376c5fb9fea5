use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::BookingStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub booking_date: DateTime<Utc>,
    pub appointment_date: DateTime<Utc>,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub patient_id: Uuid,
    pub clinic_service_id: Uuid,
}
