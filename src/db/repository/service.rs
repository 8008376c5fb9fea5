use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::patient::lookup_id;
use crate::db::{parse_uuid, DatabaseError};
use crate::models::Service;

pub fn insert_service(conn: &Connection, service: &Service) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO services (id, name, duration) VALUES (?1, ?2, ?3)",
        params![service.id.to_string(), service.name, service.duration],
    )?;
    Ok(())
}

pub fn get_service(conn: &Connection, id: &Uuid) -> Result<Option<Service>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, duration FROM services WHERE id = ?1",
        params![id.to_string()],
        read_service_row,
    )
    .optional()?
    .map(ServiceRow::into_service)
    .transpose()
}

pub fn service_with_name(conn: &Connection, name: &str) -> Result<Option<Uuid>, DatabaseError> {
    lookup_id(conn, "SELECT id FROM services WHERE name = ?1", name)
}

pub fn update_service(conn: &Connection, service: &Service) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE services SET name = ?1, duration = ?2 WHERE id = ?3",
        params![service.name, service.duration, service.id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Service".into(),
            id: service.id.to_string(),
        });
    }
    Ok(())
}

pub fn list_services(conn: &Connection) -> Result<Vec<Service>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name, duration FROM services ORDER BY name ASC")?;
    let rows = stmt.query_map([], read_service_row)?;

    let mut services = Vec::new();
    for row in rows {
        services.push(row?.into_service()?);
    }
    Ok(services)
}

pub fn delete_service_row(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM services WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}

struct ServiceRow {
    id: String,
    name: String,
    duration: u32,
}

fn read_service_row(row: &Row<'_>) -> rusqlite::Result<ServiceRow> {
    Ok(ServiceRow {
        id: row.get(0)?,
        name: row.get(1)?,
        duration: row.get(2)?,
    })
}

impl ServiceRow {
    fn into_service(self) -> Result<Service, DatabaseError> {
        Ok(Service {
            id: parse_uuid(&self.id)?,
            name: self.name,
            duration: self.duration,
        })
    }
}

#[cfg(test)]
pub(crate) fn make_service(conn: &Connection, name: &str, duration: u32) -> Service {
    let service = Service {
        id: Uuid::new_v4(),
        name: name.into(),
        duration,
    };
    insert_service(conn, &service).unwrap();
    service
}
