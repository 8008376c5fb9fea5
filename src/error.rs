//! Domain error taxonomy shared by every service module.

use crate::db::DatabaseError;

#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    /// Malformed, missing or out-of-range input. Detected before any write.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A uniqueness or one-to-one rule would be broken.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not permitted: {0}")]
    Authorization(String),

    #[error("Storage error: {0}")]
    Storage(DatabaseError),
}

impl ClinicError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

impl From<DatabaseError> for ClinicError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => Self::NotFound {
                entity: entity_type,
                id,
            },
            DatabaseError::UniqueViolation(columns) => {
                Self::Conflict(format!("{} already in use", describe_columns(&columns)))
            }
            other => Self::Storage(other),
        }
    }
}

impl From<rusqlite::Error> for ClinicError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

/// `patients.email` -> `email`; `t.a, t.b` -> `a, b`.
fn describe_columns(columns: &str) -> String {
    if columns.is_empty() {
        return "value".into();
    }
    columns
        .split(", ")
        .map(|c| c.rsplit('.').next().unwrap_or(c))
        .collect::<Vec<_>>()
        .join(", ")
}
