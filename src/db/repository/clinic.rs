use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::patient::lookup_id;
use crate::db::{parse_uuid, DatabaseError};
use crate::models::Clinic;

const CLINIC_COLUMNS: &str =
    "id, name, specialty, description, contact, email, street, city, image_url, user_id";

pub fn insert_clinic(conn: &Connection, clinic: &Clinic) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO clinics (id, name, specialty, description, contact, email, street, city,
         image_url, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            clinic.id.to_string(),
            clinic.name,
            clinic.specialty,
            clinic.description,
            clinic.contact,
            clinic.email,
            clinic.street,
            clinic.city,
            clinic.image_url,
            clinic.user_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

pub fn get_clinic(conn: &Connection, id: &Uuid) -> Result<Option<Clinic>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {CLINIC_COLUMNS} FROM clinics WHERE id = ?1"),
        params![id.to_string()],
        read_clinic_row,
    )
    .optional()?
    .map(ClinicRow::into_clinic)
    .transpose()
}

pub fn get_clinic_by_user(conn: &Connection, user_id: &Uuid) -> Result<Option<Clinic>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {CLINIC_COLUMNS} FROM clinics WHERE user_id = ?1"),
        params![user_id.to_string()],
        read_clinic_row,
    )
    .optional()?
    .map(ClinicRow::into_clinic)
    .transpose()
}

pub fn clinic_with_contact(conn: &Connection, contact: &str) -> Result<Option<Uuid>, DatabaseError> {
    lookup_id(conn, "SELECT id FROM clinics WHERE contact = ?1", contact)
}

pub fn clinic_with_email(conn: &Connection, email: &str) -> Result<Option<Uuid>, DatabaseError> {
    lookup_id(conn, "SELECT id FROM clinics WHERE email = ?1", email)
}

pub fn update_clinic(conn: &Connection, clinic: &Clinic) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE clinics SET name = ?1, specialty = ?2, description = ?3, contact = ?4,
         email = ?5, street = ?6, city = ?7, image_url = ?8
         WHERE id = ?9",
        params![
            clinic.name,
            clinic.specialty,
            clinic.description,
            clinic.contact,
            clinic.email,
            clinic.street,
            clinic.city,
            clinic.image_url,
            clinic.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Clinic".into(),
            id: clinic.id.to_string(),
        });
    }
    Ok(())
}

pub fn list_clinics(conn: &Connection) -> Result<Vec<Clinic>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CLINIC_COLUMNS} FROM clinics ORDER BY name ASC"
    ))?;
    let rows = stmt.query_map([], read_clinic_row)?;

    let mut clinics = Vec::new();
    for row in rows {
        clinics.push(row?.into_clinic()?);
    }
    Ok(clinics)
}

/// Removes only the clinic row; associations and memberships must already be gone.
pub fn delete_clinic_row(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM clinics WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}

struct ClinicRow {
    id: String,
    name: String,
    specialty: String,
    description: Option<String>,
    contact: String,
    email: String,
    street: String,
    city: String,
    image_url: Option<String>,
    user_id: Option<String>,
}

fn read_clinic_row(row: &Row<'_>) -> rusqlite::Result<ClinicRow> {
    Ok(ClinicRow {
        id: row.get(0)?,
        name: row.get(1)?,
        specialty: row.get(2)?,
        description: row.get(3)?,
        contact: row.get(4)?,
        email: row.get(5)?,
        street: row.get(6)?,
        city: row.get(7)?,
        image_url: row.get(8)?,
        user_id: row.get(9)?,
    })
}

impl ClinicRow {
    fn into_clinic(self) -> Result<Clinic, DatabaseError> {
        Ok(Clinic {
            id: parse_uuid(&self.id)?,
            name: self.name,
            specialty: self.specialty,
            description: self.description,
            contact: self.contact,
            email: self.email,
            street: self.street,
            city: self.city,
            image_url: self.image_url,
            user_id: self.user_id.as_deref().map(parse_uuid).transpose()?,
        })
    }
}

#[cfg(test)]
pub(crate) fn make_clinic(conn: &Connection, name: &str, contact: &str, email: &str) -> Clinic {
    let clinic = Clinic {
        id: Uuid::new_v4(),
        name: name.into(),
        specialty: "General".into(),
        description: None,
        contact: contact.into(),
        email: email.into(),
        street: "Moi Avenue 12".into(),
        city: "Nairobi".into(),
        image_url: None,
        user_id: None,
    };
    insert_clinic(conn, &clinic).unwrap();
    clinic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::user::make_user;
    use crate::db::sqlite::open_memory_database;
    use crate::models::enums::Role;

    #[test]
    fn clinic_insert_and_retrieve() {
        let conn = open_memory_database().unwrap();
        let clinic = make_clinic(&conn, "Uhai Clinic", "+254711000001", "uhai@example.com");
        let loaded = get_clinic(&conn, &clinic.id).unwrap().unwrap();
        assert_eq!(loaded, clinic);
    }

    #[test]
    fn clinic_found_through_owning_user() {
        let conn = open_memory_database().unwrap();
        let user = make_user(&conn, "uhai-staff", Role::Clinic);
        let clinic = make_clinic(&conn, "Uhai", "+254711000001", "uhai@example.com");
        conn.execute(
            "UPDATE clinics SET user_id = ?1 WHERE id = ?2",
            params![user.id.to_string(), clinic.id.to_string()],
        )
        .unwrap();

        let linked = get_clinic_by_user(&conn, &user.id).unwrap().unwrap();
        assert_eq!(linked.id, clinic.id);
    }

    #[test]
    fn duplicate_email_rejected_by_storage() {
        let conn = open_memory_database().unwrap();
        make_clinic(&conn, "A", "+254711000001", "same@example.com");
        let mut other = make_clinic(&conn, "B", "+254711000002", "b@example.com");
        other.email = "same@example.com".into();
        let err = update_clinic(&conn, &other).unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(ref c) if c == "clinics.email"));
    }

    #[test]
    fn list_clinics_sorted_by_name() {
        let conn = open_memory_database().unwrap();
        make_clinic(&conn, "Zawadi", "+254711000001", "z@example.com");
        make_clinic(&conn, "Afya", "+254711000002", "a@example.com");
        let names: Vec<_> = list_clinics(&conn).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Afya", "Zawadi"]);
    }
}
