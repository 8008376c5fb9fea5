//! Patient profiles.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{check, Action, Resource};
use crate::db::{self, CascadeReport};
use crate::error::ClinicError;
use crate::identity::Identity;
use crate::models::Patient;
use crate::validation::{require_text, validate_contact, validate_email};

#[derive(Debug, Clone, Deserialize)]
pub struct PatientFields {
    pub name: String,
    pub contact: String,
    pub email: String,
}

/// Field-level update; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientPatch {
    pub name: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
}

/// Validate and insert. Uniqueness is checked first for a precise message;
/// the storage constraint still catches a concurrent duplicate.
pub(crate) fn insert_new_patient(
    conn: &Connection,
    fields: &PatientFields,
    user_id: Option<Uuid>,
) -> Result<Patient, ClinicError> {
    let patient = Patient {
        id: Uuid::new_v4(),
        name: require_text("name", &fields.name)?,
        contact: validate_contact(&fields.contact)?,
        email: validate_email(&fields.email)?,
        date_joined: Utc::now(),
        user_id,
    };
    ensure_unique(conn, &patient)?;
    db::insert_patient(conn, &patient)?;
    Ok(patient)
}

fn ensure_unique(conn: &Connection, patient: &Patient) -> Result<(), ClinicError> {
    if db::patient_with_contact(conn, &patient.contact)?.is_some_and(|id| id != patient.id) {
        return Err(ClinicError::conflict(format!(
            "contact {} is already registered",
            patient.contact
        )));
    }
    if db::patient_with_email(conn, &patient.email)?.is_some_and(|id| id != patient.id) {
        return Err(ClinicError::conflict(format!(
            "email {} is already registered",
            patient.email
        )));
    }
    Ok(())
}

/// Admin-created patient without a login.
pub fn create_patient(
    conn: &Connection,
    caller: Option<&Identity>,
    fields: &PatientFields,
) -> Result<Patient, ClinicError> {
    check(caller, Action::Create, &Resource::Patient(None))?;

    let tx = db::begin_write(conn)?;
    let patient = insert_new_patient(&tx, fields, None)?;
    tx.commit()?;

    tracing::info!(patient_id = %patient.id, "Patient created");
    Ok(patient)
}

pub fn get_patient(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
) -> Result<Patient, ClinicError> {
    check(caller, Action::Read, &Resource::Patient(Some(*id)))?;
    db::get_patient(conn, id)?.ok_or_else(|| ClinicError::not_found("Patient", id))
}

pub fn update_patient(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
    patch: &PatientPatch,
) -> Result<Patient, ClinicError> {
    check(caller, Action::Update, &Resource::Patient(Some(*id)))?;

    let tx = db::begin_write(conn)?;
    let mut patient = db::get_patient(&tx, id)?.ok_or_else(|| ClinicError::not_found("Patient", id))?;
    if let Some(name) = &patch.name {
        patient.name = require_text("name", name)?;
    }
    if let Some(contact) = &patch.contact {
        patient.contact = validate_contact(contact)?;
    }
    if let Some(email) = &patch.email {
        patient.email = validate_email(email)?;
    }
    ensure_unique(&tx, &patient)?;
    db::update_patient(&tx, &patient)?;
    tx.commit()?;

    tracing::info!(patient_id = %patient.id, "Patient updated");
    Ok(patient)
}

/// Removes the patient, their bookings and reviews, and their login.
pub fn delete_patient(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
) -> Result<CascadeReport, ClinicError> {
    check(caller, Action::Delete, &Resource::Patient(Some(*id)))?;

    let tx = db::begin_write(conn)?;
    let report = db::delete_patient_cascade(&tx, id)?;
    tx.commit()?;

    tracing::info!(patient_id = %id, "Patient deleted");
    tracing::debug!(?report, "Patient cascade");
    Ok(report)
}

pub fn list_patients(conn: &Connection, caller: Option<&Identity>) -> Result<Vec<Patient>, ClinicError> {
    check(caller, Action::List, &Resource::Patient(None))?;
    Ok(db::list_patients(conn)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::identity::{patient_fields, register_as, ProfileFields};
    use crate::models::Role;

    struct Fixture {
        conn: Connection,
        admin: Identity,
        wanjiru: Identity,
        otieno: Identity,
    }

    fn fixture() -> Fixture {
        let conn = open_memory_database().unwrap();
        let admin = register_as(&conn, "root", Role::Admin, None);
        let wanjiru = register_as(
            &conn,
            "wanjiru",
            Role::Patient,
            Some(ProfileFields::Patient(patient_fields("Wanjiru", "+254700000001", "wanjiru@example.com"))),
        );
        let otieno = register_as(
            &conn,
            "otieno",
            Role::Patient,
            Some(ProfileFields::Patient(patient_fields("Otieno", "+254700000002", "otieno@example.com"))),
        );
        Fixture {
            conn,
            admin,
            wanjiru,
            otieno,
        }
    }

    #[test]
    fn update_rejects_contact_held_by_another_patient() {
        let f = fixture();
        let id = f.wanjiru.profile_id.unwrap();
        let patch = PatientPatch {
            contact: Some("+254700000002".into()),
            ..Default::default()
        };
        let err = update_patient(&f.conn, Some(&f.wanjiru), &id, &patch).unwrap_err();
        assert!(matches!(err, ClinicError::Conflict(_)));
        assert_eq!(
            db::get_patient(&f.conn, &id).unwrap().unwrap().contact,
            "+254700000001"
        );
    }

    #[test]
    fn update_keeping_own_email_is_not_a_conflict() {
        let f = fixture();
        let id = f.wanjiru.profile_id.unwrap();
        let patch = PatientPatch {
            name: Some("Wanjiru K.".into()),
            email: Some("wanjiru@example.com".into()),
            ..Default::default()
        };
        let updated = update_patient(&f.conn, Some(&f.wanjiru), &id, &patch).unwrap();
        assert_eq!(updated.name, "Wanjiru K.");
    }

    #[test]
    fn patients_cannot_read_each_other() {
        let f = fixture();
        let other = f.otieno.profile_id.unwrap();
        let err = get_patient(&f.conn, Some(&f.wanjiru), &other).unwrap_err();
        assert!(matches!(err, ClinicError::Authorization(_)));
        assert!(get_patient(&f.conn, Some(&f.admin), &other).is_ok());
    }

    #[test]
    fn create_is_admin_only() {
        let f = fixture();
        let fields = patient_fields("Walk-in", "+254700000003", "walkin@example.com");
        assert!(matches!(
            create_patient(&f.conn, Some(&f.wanjiru), &fields),
            Err(ClinicError::Authorization(_))
        ));
        let created = create_patient(&f.conn, Some(&f.admin), &fields).unwrap();
        assert_eq!(created.user_id, None);
        assert_eq!(list_patients(&f.conn, Some(&f.admin)).unwrap().len(), 3);
    }

    #[test]
    fn delete_removes_login_and_sessions() {
        let f = fixture();
        let session = crate::identity::authenticate(
            &f.conn,
            &crate::identity::test_hasher(),
            "otieno",
            "s3cret-pass",
        )
        .unwrap();
        let report = delete_patient(&f.conn, Some(&f.admin), &f.otieno.profile_id.unwrap()).unwrap();
        assert_eq!(report.users, 1);
        assert_eq!(report.sessions, 1);
        assert_eq!(
            crate::identity::current_identity(&f.conn, Some(&session.token)).unwrap(),
            None
        );
        assert!(db::get_user_by_username(&f.conn, "otieno").unwrap().is_none());
    }

    #[test]
    fn missing_patient_is_not_found() {
        let f = fixture();
        let err = get_patient(&f.conn, Some(&f.admin), &Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ClinicError::NotFound { .. }));
    }
}
