use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub contact: String,
    pub email: String,
    pub date_joined: DateTime<Utc>,
    pub user_id: Option<Uuid>,
}
