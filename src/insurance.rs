//! Insurance plans and the clinics that accept them.
//!
//! Membership is a plain set: linking twice is a conflict and unlinking a
//! plan the clinic never accepted is invalid input. Neither is ignored.

use rusqlite::Connection;
use uuid::Uuid;

use crate::authorization::{check, Action, Resource};
use crate::catalog::find_clinic;
use crate::db::{self, CascadeReport};
use crate::error::ClinicError;
use crate::identity::Identity;
use crate::models::Insurance;
use crate::validation::require_text;

pub fn add_insurance(
    conn: &Connection,
    caller: Option<&Identity>,
    name: &str,
) -> Result<Insurance, ClinicError> {
    check(caller, Action::Create, &Resource::Insurance)?;
    let insurance = Insurance {
        id: Uuid::new_v4(),
        name: require_text("name", name)?,
    };

    let tx = db::begin_write(conn)?;
    ensure_name_free(&tx, &insurance)?;
    db::insert_insurance(&tx, &insurance)?;
    tx.commit()?;

    tracing::info!(insurance_id = %insurance.id, "Insurance added");
    Ok(insurance)
}

fn ensure_name_free(conn: &Connection, insurance: &Insurance) -> Result<(), ClinicError> {
    if db::insurance_with_name(conn, &insurance.name)?.is_some_and(|id| id != insurance.id) {
        return Err(ClinicError::conflict(format!("insurance {} already exists", insurance.name)));
    }
    Ok(())
}

pub fn get_insurance(conn: &Connection, id: &Uuid) -> Result<Insurance, ClinicError> {
    db::get_insurance(conn, id)?.ok_or_else(|| ClinicError::not_found("Insurance", id))
}

pub fn rename_insurance(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
    name: &str,
) -> Result<Insurance, ClinicError> {
    check(caller, Action::Update, &Resource::Insurance)?;

    let tx = db::begin_write(conn)?;
    let mut insurance = get_insurance(&tx, id)?;
    insurance.name = require_text("name", name)?;
    ensure_name_free(&tx, &insurance)?;
    db::rename_insurance(&tx, id, &insurance.name)?;
    tx.commit()?;

    tracing::info!(insurance_id = %id, "Insurance renamed");
    Ok(insurance)
}

/// Drops the plan and every clinic's membership in it.
pub fn delete_insurance(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
) -> Result<CascadeReport, ClinicError> {
    check(caller, Action::Delete, &Resource::Insurance)?;

    let tx = db::begin_write(conn)?;
    let report = db::delete_insurance_cascade(&tx, id)?;
    tx.commit()?;

    tracing::info!(insurance_id = %id, memberships = report.memberships, "Insurance deleted");
    Ok(report)
}

pub fn list_insurances(conn: &Connection) -> Result<Vec<Insurance>, ClinicError> {
    Ok(db::list_insurances(conn)?)
}

pub fn link_to_clinic(
    conn: &Connection,
    caller: Option<&Identity>,
    clinic_id: &Uuid,
    insurance_id: &Uuid,
) -> Result<(), ClinicError> {
    check(caller, Action::Create, &Resource::ClinicOffer(*clinic_id))?;

    let tx = db::begin_write(conn)?;
    find_clinic(&tx, clinic_id)?;
    get_insurance(&tx, insurance_id)?;
    if db::membership_exists(&tx, clinic_id, insurance_id)? {
        return Err(ClinicError::conflict("clinic already accepts this insurance"));
    }
    db::insert_membership(&tx, clinic_id, insurance_id)?;
    tx.commit()?;

    tracing::info!(clinic_id = %clinic_id, insurance_id = %insurance_id, "Insurance linked");
    Ok(())
}

pub fn unlink_from_clinic(
    conn: &Connection,
    caller: Option<&Identity>,
    clinic_id: &Uuid,
    insurance_id: &Uuid,
) -> Result<(), ClinicError> {
    check(caller, Action::Delete, &Resource::ClinicOffer(*clinic_id))?;

    let tx = db::begin_write(conn)?;
    find_clinic(&tx, clinic_id)?;
    get_insurance(&tx, insurance_id)?;
    if !db::delete_membership(&tx, clinic_id, insurance_id)? {
        return Err(ClinicError::validation("clinic does not accept this insurance"));
    }
    tx.commit()?;

    tracing::info!(clinic_id = %clinic_id, insurance_id = %insurance_id, "Insurance unlinked");
    Ok(())
}

pub fn list_clinic_insurances(conn: &Connection, clinic_id: &Uuid) -> Result<Vec<Insurance>, ClinicError> {
    find_clinic(conn, clinic_id)?;
    Ok(db::list_insurances_for_clinic(conn, clinic_id)?)
}
