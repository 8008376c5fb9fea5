//! Bearer sessions. Only the SHA-256 of a token is ever stored.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{parse_uuid, DatabaseError};

pub fn insert_session(
    conn: &Connection,
    token_hash: &[u8; 32],
    user_id: &Uuid,
    created_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at, revoked) VALUES (?1, ?2, ?3, 0)",
        params![token_hash.as_slice(), user_id.to_string(), created_at.to_rfc3339()],
    )?;
    Ok(())
}

/// The user behind a live (non-revoked) session.
pub fn get_session_user(
    conn: &Connection,
    token_hash: &[u8; 32],
) -> Result<Option<Uuid>, DatabaseError> {
    let user_id: Option<String> = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token_hash = ?1 AND revoked = 0",
            params![token_hash.as_slice()],
            |row| row.get(0),
        )
        .optional()?;
    user_id.as_deref().map(parse_uuid).transpose()
}

pub fn revoke_session(conn: &Connection, token_hash: &[u8; 32]) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE sessions SET revoked = 1 WHERE token_hash = ?1 AND revoked = 0",
        params![token_hash.as_slice()],
    )?;
    Ok(updated > 0)
}

pub fn delete_sessions_for_user(conn: &Connection, user_id: &Uuid) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1",
        params![user_id.to_string()],
    )?;
    Ok(deleted)
}
