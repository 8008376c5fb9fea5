use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub specialty: String,
    pub description: Option<String>,
    pub contact: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub image_url: Option<String>,
    pub user_id: Option<Uuid>,
}
