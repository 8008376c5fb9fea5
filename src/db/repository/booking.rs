use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{parse_timestamp, parse_uuid, DatabaseError};
use crate::models::{Booking, BookingFilter, BookingStatus};

const BOOKING_COLUMNS: &str =
    "b.id, b.booking_date, b.appointment_date, b.status, b.notes, b.patient_id, b.clinic_service_id";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO bookings (id, booking_date, appointment_date, status, notes,
         patient_id, clinic_service_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            booking.id.to_string(),
            booking.booking_date.to_rfc3339(),
            booking.appointment_date.to_rfc3339(),
            booking.status.as_str(),
            booking.notes,
            booking.patient_id.to_string(),
            booking.clinic_service_id.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &Uuid) -> Result<Option<Booking>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1"),
        params![id.to_string()],
        read_booking_row,
    )
    .optional()?
    .map(BookingRow::into_booking)
    .transpose()
}

/// Writes every mutable column; booking_date is fixed at creation.
pub fn update_booking(conn: &Connection, booking: &Booking) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE bookings SET appointment_date = ?1, status = ?2, notes = ?3,
         patient_id = ?4, clinic_service_id = ?5
         WHERE id = ?6",
        params![
            booking.appointment_date.to_rfc3339(),
            booking.status.as_str(),
            booking.notes,
            booking.patient_id.to_string(),
            booking.clinic_service_id.to_string(),
            booking.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Booking".into(),
            id: booking.id.to_string(),
        });
    }
    Ok(())
}

/// Bookings matching every set filter field, most recent appointment first.
pub fn list_bookings(
    conn: &Connection,
    filter: &BookingFilter,
) -> Result<Vec<Booking>, DatabaseError> {
    let mut sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b
         JOIN clinic_services cs ON cs.id = b.clinic_service_id
         WHERE 1=1"
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut param_idx = 1u32;

    if let Some(clinic_id) = filter.clinic_id {
        sql.push_str(&format!(" AND cs.clinic_id = ?{param_idx}"));
        params_vec.push(Box::new(clinic_id.to_string()));
        param_idx += 1;
    }
    if let Some(patient_id) = filter.patient_id {
        sql.push_str(&format!(" AND b.patient_id = ?{param_idx}"));
        params_vec.push(Box::new(patient_id.to_string()));
        param_idx += 1;
    }
    if let Some(status) = filter.status {
        sql.push_str(&format!(" AND b.status = ?{param_idx}"));
        params_vec.push(Box::new(status.as_str()));
    }

    sql.push_str(" ORDER BY b.appointment_date DESC");

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), read_booking_row)?;

    let mut bookings = Vec::new();
    for row in rows {
        bookings.push(row?.into_booking()?);
    }
    Ok(bookings)
}

/// Ids of every booking made against a clinic service.
pub fn booking_ids_for_clinic_service(
    conn: &Connection,
    clinic_service_id: &Uuid,
) -> Result<Vec<Uuid>, DatabaseError> {
    collect_ids(
        conn,
        "SELECT id FROM bookings WHERE clinic_service_id = ?1",
        clinic_service_id,
    )
}

pub fn booking_ids_for_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<Uuid>, DatabaseError> {
    collect_ids(conn, "SELECT id FROM bookings WHERE patient_id = ?1", patient_id)
}

pub(crate) fn collect_ids(
    conn: &Connection,
    sql: &str,
    key: &Uuid,
) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![key.to_string()], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(parse_uuid(&row?)?);
    }
    Ok(ids)
}

pub fn delete_booking_row(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}

struct BookingRow {
    id: String,
    booking_date: String,
    appointment_date: String,
    status: String,
    notes: Option<String>,
    patient_id: String,
    clinic_service_id: String,
}

fn read_booking_row(row: &Row<'_>) -> rusqlite::Result<BookingRow> {
    Ok(BookingRow {
        id: row.get(0)?,
        booking_date: row.get(1)?,
        appointment_date: row.get(2)?,
        status: row.get(3)?,
        notes: row.get(4)?,
        patient_id: row.get(5)?,
        clinic_service_id: row.get(6)?,
    })
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, DatabaseError> {
        Ok(Booking {
            id: parse_uuid(&self.id)?,
            booking_date: parse_timestamp(&self.booking_date)?,
            appointment_date: parse_timestamp(&self.appointment_date)?,
            status: BookingStatus::from_str(&self.status)?,
            notes: self.notes,
            patient_id: parse_uuid(&self.patient_id)?,
            clinic_service_id: parse_uuid(&self.clinic_service_id)?,
        })
    }
}

#[cfg(test)]
pub(crate) fn make_booking(
    conn: &Connection,
    patient_id: Uuid,
    clinic_service_id: Uuid,
    status: BookingStatus,
) -> Booking {
    let now = chrono::Utc::now();
    let booking = Booking {
        id: Uuid::new_v4(),
        booking_date: now,
        appointment_date: now + chrono::Duration::days(3),
        status,
        notes: None,
        patient_id,
        clinic_service_id,
    };
    insert_booking(conn, &booking).unwrap();
    booking
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::clinic::make_clinic;
    use crate::db::repository::clinic_service::make_clinic_service;
    use crate::db::repository::patient::make_patient;
    use crate::db::repository::service::make_service;
    use crate::db::sqlite::open_memory_database;

    struct Fixture {
        conn: Connection,
        patient_a: Uuid,
        patient_b: Uuid,
        clinic_x: Uuid,
        cs_x: Uuid,
        cs_y: Uuid,
    }

    fn fixture() -> Fixture {
        let conn = open_memory_database().unwrap();
        let patient_a = make_patient(&conn, "A", "+254700000001", "a@example.com").id;
        let patient_b = make_patient(&conn, "B", "+254700000002", "b@example.com").id;
        let clinic_x = make_clinic(&conn, "X", "+254711000001", "x@example.com").id;
        let clinic_y = make_clinic(&conn, "Y", "+254711000002", "y@example.com").id;
        let service = make_service(&conn, "Dental", 30).id;
        let cs_x = make_clinic_service(&conn, clinic_x, service, 1500).id;
        let cs_y = make_clinic_service(&conn, clinic_y, service, 1800).id;
        Fixture {
            conn,
            patient_a,
            patient_b,
            clinic_x,
            cs_x,
            cs_y,
        }
    }

    #[test]
    fn booking_roundtrips_status_and_notes() {
        let f = fixture();
        let mut booking = make_booking(&f.conn, f.patient_a, f.cs_x, BookingStatus::Pending);
        booking.status = BookingStatus::Confirmed;
        booking.notes = Some("bring x-rays".into());
        update_booking(&f.conn, &booking).unwrap();

        let loaded = get_booking(&f.conn, &booking.id).unwrap().unwrap();
        assert_eq!(loaded.status, BookingStatus::Confirmed);
        assert_eq!(loaded.notes.as_deref(), Some("bring x-rays"));
    }

    #[test]
    fn filters_combine_with_and() {
        let f = fixture();
        make_booking(&f.conn, f.patient_a, f.cs_x, BookingStatus::Pending);
        make_booking(&f.conn, f.patient_a, f.cs_y, BookingStatus::Completed);
        make_booking(&f.conn, f.patient_b, f.cs_x, BookingStatus::Completed);

        let all = list_bookings(&f.conn, &BookingFilter::default()).unwrap();
        assert_eq!(all.len(), 3);

        let by_clinic = list_bookings(
            &f.conn,
            &BookingFilter {
                clinic_id: Some(f.clinic_x),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_clinic.len(), 2);

        let narrowed = list_bookings(
            &f.conn,
            &BookingFilter {
                clinic_id: Some(f.clinic_x),
                patient_id: Some(f.patient_b),
                status: Some(BookingStatus::Completed),
            },
        )
        .unwrap();
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].patient_id, f.patient_b);
    }

    #[test]
    fn unknown_status_in_storage_is_rejected() {
        let conn = open_memory_database().unwrap();
        let raw = conn.execute(
            "INSERT INTO bookings (id, booking_date, appointment_date, status, patient_id,
             clinic_service_id) VALUES ('x', 'a', 'b', 'rescheduled', 'p', 'c')",
            [],
        );
        assert!(raw.is_err());
    }

    #[test]
    fn ids_by_owner() {
        let f = fixture();
        let b = make_booking(&f.conn, f.patient_a, f.cs_x, BookingStatus::Pending);
        assert_eq!(booking_ids_for_patient(&f.conn, &f.patient_a).unwrap(), vec![b.id]);
        assert_eq!(booking_ids_for_clinic_service(&f.conn, &f.cs_x).unwrap(), vec![b.id]);
        assert!(booking_ids_for_clinic_service(&f.conn, &f.cs_y).unwrap().is_empty());
    }
}
