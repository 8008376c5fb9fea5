pub mod sqlite;
pub mod repository;

pub use sqlite::*;
pub use repository::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    /// A UNIQUE or PRIMARY KEY constraint rejected the write.
    /// Carries the column list SQLite reported, e.g. `patients.email`.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                let columns = message
                    .as_deref()
                    .and_then(|m| m.split_once(": "))
                    .map(|(_, cols)| cols.to_string())
                    .unwrap_or_default();
                DatabaseError::UniqueViolation(columns)
            }
            _ => DatabaseError::Sqlite(err),
        }
    }
}

/// Parse a UUID column value, reporting corruption as a constraint violation.
pub(crate) fn parse_uuid(raw: &str) -> Result<uuid::Uuid, DatabaseError> {
    uuid::Uuid::parse_str(raw).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

/// Parse an RFC 3339 timestamp column.
pub(crate) fn parse_timestamp(
    raw: &str,
) -> Result<chrono::DateTime<chrono::Utc>, DatabaseError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad timestamp {raw}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn unique_failure_is_classified_with_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (email TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: DatabaseError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        match err {
            DatabaseError::UniqueViolation(cols) => assert_eq!(cols, "t.email"),
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[test]
    fn other_sqlite_errors_stay_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        let err: DatabaseError = conn
            .execute("INSERT INTO missing VALUES (1)", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, DatabaseError::Sqlite(_)));
    }
}
