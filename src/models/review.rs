use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub comment: Option<String>,
    pub rating: u8,
    pub created_at: DateTime<Utc>,
    pub booking_id: Uuid,
}
