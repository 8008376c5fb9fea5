use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::BookingStatus;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BookingFilter {
    pub clinic_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ReviewFilter {
    pub clinic_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
}
