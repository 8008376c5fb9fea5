use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::{parse_timestamp, parse_uuid, DatabaseError};
use crate::models::ClinicService;

const CLINIC_SERVICE_COLUMNS: &str = "id, clinic_id, service_id, price, created_at";

pub fn insert_clinic_service(conn: &Connection, cs: &ClinicService) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO clinic_services (id, clinic_id, service_id, price, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            cs.id.to_string(),
            cs.clinic_id.to_string(),
            cs.service_id.to_string(),
            cs.price.to_string(),
            cs.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_clinic_service(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<ClinicService>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {CLINIC_SERVICE_COLUMNS} FROM clinic_services WHERE id = ?1"),
        params![id.to_string()],
        read_clinic_service_row,
    )
    .optional()?
    .map(ClinicServiceRow::into_clinic_service)
    .transpose()
}

/// The association for a (clinic, service) pair, if it exists.
pub fn find_clinic_service(
    conn: &Connection,
    clinic_id: &Uuid,
    service_id: &Uuid,
) -> Result<Option<ClinicService>, DatabaseError> {
    conn.query_row(
        &format!(
            "SELECT {CLINIC_SERVICE_COLUMNS} FROM clinic_services
             WHERE clinic_id = ?1 AND service_id = ?2"
        ),
        params![clinic_id.to_string(), service_id.to_string()],
        read_clinic_service_row,
    )
    .optional()?
    .map(ClinicServiceRow::into_clinic_service)
    .transpose()
}

pub fn update_clinic_service_price(
    conn: &Connection,
    id: &Uuid,
    price: Decimal,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE clinic_services SET price = ?1 WHERE id = ?2",
        params![price.to_string(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "ClinicService".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn list_clinic_services_for_clinic(
    conn: &Connection,
    clinic_id: &Uuid,
) -> Result<Vec<ClinicService>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CLINIC_SERVICE_COLUMNS} FROM clinic_services
         WHERE clinic_id = ?1 ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map(params![clinic_id.to_string()], read_clinic_service_row)?;

    let mut offers = Vec::new();
    for row in rows {
        offers.push(row?.into_clinic_service()?);
    }
    Ok(offers)
}

pub fn delete_clinic_service_row(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM clinic_services WHERE id = ?1",
        params![id.to_string()],
    )?;
    Ok(deleted > 0)
}

struct ClinicServiceRow {
    id: String,
    clinic_id: String,
    service_id: String,
    price: String,
    created_at: String,
}

fn read_clinic_service_row(row: &Row<'_>) -> rusqlite::Result<ClinicServiceRow> {
    Ok(ClinicServiceRow {
        id: row.get(0)?,
        clinic_id: row.get(1)?,
        service_id: row.get(2)?,
        price: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl ClinicServiceRow {
    fn into_clinic_service(self) -> Result<ClinicService, DatabaseError> {
        Ok(ClinicService {
            id: parse_uuid(&self.id)?,
            clinic_id: parse_uuid(&self.clinic_id)?,
            service_id: parse_uuid(&self.service_id)?,
            price: Decimal::from_str(&self.price)
                .map_err(|e| DatabaseError::ConstraintViolation(format!("bad price: {e}")))?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[cfg(test)]
pub(crate) fn make_clinic_service(
    conn: &Connection,
    clinic_id: Uuid,
    service_id: Uuid,
    price: i64,
) -> ClinicService {
    let cs = ClinicService {
        id: Uuid::new_v4(),
        clinic_id,
        service_id,
        price: Decimal::new(price, 0),
        created_at: chrono::Utc::now(),
    };
    insert_clinic_service(conn, &cs).unwrap();
    cs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::clinic::make_clinic;
    use crate::db::repository::service::make_service;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn price_survives_storage_exactly() {
        let conn = open_memory_database().unwrap();
        let clinic = make_clinic(&conn, "Afya", "+254711000001", "afya@example.com");
        let service = make_service(&conn, "Cardiology", 60);
        let mut cs = make_clinic_service(&conn, clinic.id, service.id, 0);

        cs.price = Decimal::new(250050, 2);
        update_clinic_service_price(&conn, &cs.id, cs.price).unwrap();

        let loaded = get_clinic_service(&conn, &cs.id).unwrap().unwrap();
        assert_eq!(loaded.price.to_string(), "2500.50");
    }

    #[test]
    fn pair_is_unique() {
        let conn = open_memory_database().unwrap();
        let clinic = make_clinic(&conn, "Afya", "+254711000001", "afya@example.com");
        let service = make_service(&conn, "Cardiology", 60);
        make_clinic_service(&conn, clinic.id, service.id, 3000);

        let again = ClinicService {
            id: Uuid::new_v4(),
            clinic_id: clinic.id,
            service_id: service.id,
            price: Decimal::new(1, 0),
            created_at: chrono::Utc::now(),
        };
        let err = insert_clinic_service(&conn, &again).unwrap_err();
        assert!(matches!(err, DatabaseError::UniqueViolation(_)));
        assert!(find_clinic_service(&conn, &clinic.id, &service.id).unwrap().is_some());
    }

    #[test]
    fn negative_price_rejected_by_check_constraint() {
        let conn = open_memory_database().unwrap();
        let clinic = make_clinic(&conn, "Afya", "+254711000001", "afya@example.com");
        let service = make_service(&conn, "Cardiology", 60);
        let bad = ClinicService {
            id: Uuid::new_v4(),
            clinic_id: clinic.id,
            service_id: service.id,
            price: Decimal::new(-1, 0),
            created_at: chrono::Utc::now(),
        };
        assert!(insert_clinic_service(&conn, &bad).is_err());
    }

    #[test]
    fn unknown_clinic_rejected_by_foreign_key() {
        let conn = open_memory_database().unwrap();
        let service = make_service(&conn, "Cardiology", 60);
        let orphan = ClinicService {
            id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            service_id: service.id,
            price: Decimal::new(100, 0),
            created_at: chrono::Utc::now(),
        };
        assert!(insert_clinic_service(&conn, &orphan).is_err());
    }
}
