use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{parse_timestamp, parse_uuid, DatabaseError};
use crate::models::enums::Role;
use crate::models::User;

pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, username, password_hash, role, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.id.to_string(),
            user.username,
            user.password_hash,
            user.role.as_str(),
            user.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    conn.query_row(
        "SELECT id, username, password_hash, role, created_at FROM users WHERE id = ?1",
        params![id.to_string()],
        read_user_row,
    )
    .optional()?
    .map(UserRow::into_user)
    .transpose()
}

pub fn get_user_by_username(
    conn: &Connection,
    username: &str,
) -> Result<Option<User>, DatabaseError> {
    conn.query_row(
        "SELECT id, username, password_hash, role, created_at FROM users WHERE username = ?1",
        params![username],
        read_user_row,
    )
    .optional()?
    .map(UserRow::into_user)
    .transpose()
}

/// Removes the account row. Sessions must already be gone.
pub fn delete_user_row(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}

struct UserRow {
    id: String,
    username: String,
    password_hash: String,
    role: String,
    created_at: String,
}

fn read_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl UserRow {
    fn into_user(self) -> Result<User, DatabaseError> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            username: self.username,
            password_hash: self.password_hash,
            role: Role::from_str(&self.role)?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Shared by tests across the repository modules.
#[cfg(test)]
pub(crate) fn make_user(conn: &Connection, username: &str, role: Role) -> User {
    let user = User {
        id: Uuid::new_v4(),
        username: username.into(),
        password_hash: "pbkdf2-sha256$1000$c2FsdA$aGFzaA".into(),
        role,
        created_at: chrono::Utc::now(),
    };
    insert_user(conn, &user).unwrap();
    user
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn user_insert_and_lookup_by_username() {
        let conn = open_memory_database().unwrap();
        let user = make_user(&conn, "amina", Role::Patient);

        let found = get_user_by_username(&conn, "amina").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role, Role::Patient);
        assert!(get_user_by_username(&conn, "nobody").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_is_unique_violation() {
        let conn = open_memory_database().unwrap();
        make_user(&conn, "amina", Role::Patient);
        let dup = User {
            id: Uuid::new_v4(),
            username: "amina".into(),
            password_hash: "x".into(),
            role: Role::Admin,
            created_at: chrono::Utc::now(),
        };
        let err = insert_user(&conn, &dup).unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(ref c) if c == "users.username"));
    }

    #[test]
    fn delete_user_row_reports_absence() {
        let conn = open_memory_database().unwrap();
        let user = make_user(&conn, "amina", Role::Admin);
        assert!(delete_user_row(&conn, &user.id).unwrap());
        assert!(!delete_user_row(&conn, &user.id).unwrap());
        assert!(get_user(&conn, &user.id).unwrap().is_none());
    }
}
