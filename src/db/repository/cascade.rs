//! Child-first removal of entity graphs.
//!
//! Foreign keys carry no `ON DELETE CASCADE`, so every owning delete walks
//! its dependents explicitly. Callers run these inside one transaction so a
//! failure part-way leaves nothing removed.

use rusqlite::Connection;
use uuid::Uuid;

use super::{booking, clinic, clinic_service, insurance, patient, review, service, session, user};
use crate::db::DatabaseError;

/// Rows removed by a cascading delete, by kind.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CascadeReport {
    pub reviews: usize,
    pub bookings: usize,
    pub clinic_services: usize,
    pub memberships: usize,
    pub users: usize,
    pub sessions: usize,
}

fn not_found(entity_type: &str, id: &Uuid) -> DatabaseError {
    DatabaseError::NotFound {
        entity_type: entity_type.into(),
        id: id.to_string(),
    }
}

/// Booking and its review.
pub fn delete_booking_cascade(
    conn: &Connection,
    booking_id: &Uuid,
    report: &mut CascadeReport,
) -> Result<(), DatabaseError> {
    if review::delete_review_for_booking(conn, booking_id)? {
        report.reviews += 1;
    }
    if !booking::delete_booking_row(conn, booking_id)? {
        return Err(not_found("Booking", booking_id));
    }
    report.bookings += 1;
    Ok(())
}

/// Clinic service, its bookings and their reviews.
pub fn delete_clinic_service_cascade(
    conn: &Connection,
    clinic_service_id: &Uuid,
    report: &mut CascadeReport,
) -> Result<(), DatabaseError> {
    for booking_id in booking::booking_ids_for_clinic_service(conn, clinic_service_id)? {
        delete_booking_cascade(conn, &booking_id, report)?;
    }
    if !clinic_service::delete_clinic_service_row(conn, clinic_service_id)? {
        return Err(not_found("ClinicService", clinic_service_id));
    }
    report.clinic_services += 1;
    Ok(())
}

/// Service and every clinic's offer of it.
pub fn delete_service_cascade(
    conn: &Connection,
    service_id: &Uuid,
) -> Result<CascadeReport, DatabaseError> {
    let mut report = CascadeReport::default();
    let offers = booking::collect_ids(
        conn,
        "SELECT id FROM clinic_services WHERE service_id = ?1",
        service_id,
    )?;
    for cs_id in offers {
        delete_clinic_service_cascade(conn, &cs_id, &mut report)?;
    }
    if !service::delete_service_row(conn, service_id)? {
        return Err(not_found("Service", service_id));
    }
    Ok(report)
}

/// Clinic, its offers (with bookings and reviews), insurance memberships,
/// and the owning user account with its sessions.
pub fn delete_clinic_cascade(
    conn: &Connection,
    clinic_id: &Uuid,
) -> Result<CascadeReport, DatabaseError> {
    let owner = clinic::get_clinic(conn, clinic_id)?
        .ok_or_else(|| not_found("Clinic", clinic_id))?
        .user_id;

    let mut report = CascadeReport::default();
    for cs in clinic_service::list_clinic_services_for_clinic(conn, clinic_id)? {
        delete_clinic_service_cascade(conn, &cs.id, &mut report)?;
    }
    report.memberships += insurance::delete_memberships_for_clinic(conn, clinic_id)?;
    clinic::delete_clinic_row(conn, clinic_id)?;

    if let Some(user_id) = owner {
        delete_user_account(conn, &user_id, &mut report)?;
    }
    Ok(report)
}

/// Patient, their bookings (with reviews), and the owning user account.
pub fn delete_patient_cascade(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<CascadeReport, DatabaseError> {
    let owner = patient::get_patient(conn, patient_id)?
        .ok_or_else(|| not_found("Patient", patient_id))?
        .user_id;

    let mut report = CascadeReport::default();
    for booking_id in booking::booking_ids_for_patient(conn, patient_id)? {
        delete_booking_cascade(conn, &booking_id, &mut report)?;
    }
    patient::delete_patient_row(conn, patient_id)?;

    if let Some(user_id) = owner {
        delete_user_account(conn, &user_id, &mut report)?;
    }
    Ok(report)
}

/// Insurance and its clinic memberships. Clinics themselves survive.
pub fn delete_insurance_cascade(
    conn: &Connection,
    insurance_id: &Uuid,
) -> Result<CascadeReport, DatabaseError> {
    let report = CascadeReport {
        memberships: insurance::delete_memberships_for_insurance(conn, insurance_id)?,
        ..Default::default()
    };
    if !insurance::delete_insurance_row(conn, insurance_id)? {
        return Err(not_found("Insurance", insurance_id));
    }
    Ok(report)
}

fn delete_user_account(
    conn: &Connection,
    user_id: &Uuid,
    report: &mut CascadeReport,
) -> Result<(), DatabaseError> {
    report.sessions += session::delete_sessions_for_user(conn, user_id)?;
    if user::delete_user_row(conn, user_id)? {
        report.users += 1;
    }
    Ok(())
}
