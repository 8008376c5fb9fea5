use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{parse_timestamp, parse_uuid, DatabaseError};
use crate::models::Patient;

const PATIENT_COLUMNS: &str = "id, name, contact, email, date_joined, user_id";

pub fn insert_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, name, contact, email, date_joined, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            patient.id.to_string(),
            patient.name,
            patient.contact,
            patient.email,
            patient.date_joined.to_rfc3339(),
            patient.user_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
        params![id.to_string()],
        read_patient_row,
    )
    .optional()?
    .map(PatientRow::into_patient)
    .transpose()
}

pub fn get_patient_by_user(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE user_id = ?1"),
        params![user_id.to_string()],
        read_patient_row,
    )
    .optional()?
    .map(PatientRow::into_patient)
    .transpose()
}

/// Id of the patient already holding this contact, if any.
pub fn patient_with_contact(conn: &Connection, contact: &str) -> Result<Option<Uuid>, DatabaseError> {
    lookup_id(conn, "SELECT id FROM patients WHERE contact = ?1", contact)
}

/// Id of the patient already holding this email, if any.
pub fn patient_with_email(conn: &Connection, email: &str) -> Result<Option<Uuid>, DatabaseError> {
    lookup_id(conn, "SELECT id FROM patients WHERE email = ?1", email)
}

pub(crate) fn lookup_id(
    conn: &Connection,
    sql: &str,
    value: &str,
) -> Result<Option<Uuid>, DatabaseError> {
    let id: Option<String> = conn
        .query_row(sql, params![value], |row| row.get(0))
        .optional()?;
    id.as_deref().map(parse_uuid).transpose()
}

pub fn update_patient(conn: &Connection, patient: &Patient) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE patients SET name = ?1, contact = ?2, email = ?3 WHERE id = ?4",
        params![
            patient.name,
            patient.contact,
            patient.email,
            patient.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Patient".into(),
            id: patient.id.to_string(),
        });
    }
    Ok(())
}

pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients ORDER BY date_joined ASC, name ASC"
    ))?;
    let rows = stmt.query_map([], read_patient_row)?;

    let mut patients = Vec::new();
    for row in rows {
        patients.push(row?.into_patient()?);
    }
    Ok(patients)
}

/// Removes only the patient row; bookings and reviews must already be gone.
pub fn delete_patient_row(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM patients WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}

struct PatientRow {
    id: String,
    name: String,
    contact: String,
    email: String,
    date_joined: String,
    user_id: Option<String>,
}

fn read_patient_row(row: &Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        contact: row.get(2)?,
        email: row.get(3)?,
        date_joined: row.get(4)?,
        user_id: row.get(5)?,
    })
}

impl PatientRow {
    fn into_patient(self) -> Result<Patient, DatabaseError> {
        Ok(Patient {
            id: parse_uuid(&self.id)?,
            name: self.name,
            contact: self.contact,
            email: self.email,
            date_joined: parse_timestamp(&self.date_joined)?,
            user_id: self.user_id.as_deref().map(parse_uuid).transpose()?,
        })
    }
}

#[cfg(test)]
pub(crate) fn make_patient(conn: &Connection, name: &str, contact: &str, email: &str) -> Patient {
    let patient = Patient {
        id: Uuid::new_v4(),
        name: name.into(),
        contact: contact.into(),
        email: email.into(),
        date_joined: chrono::Utc::now(),
        user_id: None,
    };
    insert_patient(conn, &patient).unwrap();
    patient
}
