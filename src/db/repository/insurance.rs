use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::patient::lookup_id;
use crate::db::{parse_uuid, DatabaseError};
use crate::models::Insurance;

pub fn insert_insurance(conn: &Connection, insurance: &Insurance) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO insurances (id, name) VALUES (?1, ?2)",
        params![insurance.id.to_string(), insurance.name],
    )?;
    Ok(())
}

pub fn get_insurance(conn: &Connection, id: &Uuid) -> Result<Option<Insurance>, DatabaseError> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT id, name FROM insurances WHERE id = ?1",
            params![id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    row.map(into_insurance).transpose()
}

pub fn insurance_with_name(conn: &Connection, name: &str) -> Result<Option<Uuid>, DatabaseError> {
    lookup_id(conn, "SELECT id FROM insurances WHERE name = ?1", name)
}

pub fn rename_insurance(conn: &Connection, id: &Uuid, name: &str) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE insurances SET name = ?1 WHERE id = ?2",
        params![name, id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Insurance".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn list_insurances(conn: &Connection) -> Result<Vec<Insurance>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name FROM insurances ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut insurances = Vec::new();
    for row in rows {
        insurances.push(into_insurance(row?)?);
    }
    Ok(insurances)
}

pub fn delete_insurance_row(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM insurances WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}

// ── Clinic membership ────────────────────────────────────────────────────────

pub fn insert_membership(
    conn: &Connection,
    clinic_id: &Uuid,
    insurance_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO clinic_insurances (clinic_id, insurance_id) VALUES (?1, ?2)",
        params![clinic_id.to_string(), insurance_id.to_string()],
    )?;
    Ok(())
}

pub fn membership_exists(
    conn: &Connection,
    clinic_id: &Uuid,
    insurance_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM clinic_insurances WHERE clinic_id = ?1 AND insurance_id = ?2",
        params![clinic_id.to_string(), insurance_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn delete_membership(
    conn: &Connection,
    clinic_id: &Uuid,
    insurance_id: &Uuid,
) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM clinic_insurances WHERE clinic_id = ?1 AND insurance_id = ?2",
        params![clinic_id.to_string(), insurance_id.to_string()],
    )?;
    Ok(deleted > 0)
}

pub fn delete_memberships_for_clinic(
    conn: &Connection,
    clinic_id: &Uuid,
) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM clinic_insurances WHERE clinic_id = ?1",
        params![clinic_id.to_string()],
    )?)
}

pub fn delete_memberships_for_insurance(
    conn: &Connection,
    insurance_id: &Uuid,
) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM clinic_insurances WHERE insurance_id = ?1",
        params![insurance_id.to_string()],
    )?)
}

/// Insurances accepted by a clinic, by name.
pub fn list_insurances_for_clinic(
    conn: &Connection,
    clinic_id: &Uuid,
) -> Result<Vec<Insurance>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.name FROM insurances i
         JOIN clinic_insurances ci ON ci.insurance_id = i.id
         WHERE ci.clinic_id = ?1
         ORDER BY i.name ASC",
    )?;
    let rows = stmt.query_map(params![clinic_id.to_string()], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })?;

    let mut insurances = Vec::new();
    for row in rows {
        insurances.push(into_insurance(row?)?);
    }
    Ok(insurances)
}

/// Ids of clinics accepting an insurance.
pub fn list_clinic_ids_for_insurance(
    conn: &Connection,
    insurance_id: &Uuid,
) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT clinic_id FROM clinic_insurances WHERE insurance_id = ?1")?;
    let rows = stmt.query_map(params![insurance_id.to_string()], |row| {
        row.get::<_, String>(0)
    })?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(parse_uuid(&row?)?);
    }
    Ok(ids)
}

fn into_insurance((id, name): (String, String)) -> Result<Insurance, DatabaseError> {
    Ok(Insurance {
        id: parse_uuid(&id)?,
        name,
    })
}

#[cfg(test)]
pub(crate) fn make_insurance(conn: &Connection, name: &str) -> Insurance {
    let insurance = Insurance {
        id: Uuid::new_v4(),
        name: name.into(),
    };
    insert_insurance(conn, &insurance).unwrap();
    insurance
}
