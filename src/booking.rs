//! Booking engine.
//!
//! Status is a closed set of four values, but any value may replace any
//! other: `completed -> pending` is accepted. Appointment times must lie
//! strictly in the future whenever they are written.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{check, require_identity, Action, Resource};
use crate::catalog::{clinic_service_detail, find_clinic_service};
use crate::db::{self, CascadeReport};
use crate::error::ClinicError;
use crate::identity::Identity;
use crate::models::{Booking, BookingDetail, BookingFilter, BookingStatus, Role};
use crate::validation::{optional_text, validate_future};

/// Format accepted besides RFC 3339, read as UTC.
pub const APPOINTMENT_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub patient_id: Uuid,
    pub clinic_service_id: Uuid,
    pub appointment_date: DateTime<Utc>,
    pub notes: Option<String>,
    /// Raw status; `None` means pending.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingPatch {
    pub appointment_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    /// A blank string clears the notes.
    pub notes: Option<String>,
}

/// Parse `YYYY-MM-DD HH:MM` (UTC) or an RFC 3339 timestamp.
pub fn parse_appointment_time(raw: &str) -> Result<DateTime<Utc>, ClinicError> {
    let raw = raw.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, APPOINTMENT_FORMAT) {
        return Ok(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            ClinicError::validation(format!(
                "invalid appointment date {raw:?}, expected YYYY-MM-DD HH:MM"
            ))
        })
}

fn parse_status(raw: &str) -> Result<BookingStatus, ClinicError> {
    BookingStatus::from_str(raw.trim()).map_err(|_| {
        let allowed: Vec<_> = BookingStatus::ALL.iter().map(BookingStatus::as_str).collect();
        ClinicError::validation(format!(
            "invalid status {raw:?}, expected one of {}",
            allowed.join(", ")
        ))
    })
}

/// Clinic that owns the offer a booking was made against.
fn clinic_of(conn: &Connection, clinic_service_id: &Uuid) -> Result<Uuid, ClinicError> {
    Ok(find_clinic_service(conn, clinic_service_id)?.clinic_id)
}

fn find_booking(conn: &Connection, id: &Uuid) -> Result<Booking, ClinicError> {
    db::get_booking(conn, id)?.ok_or_else(|| ClinicError::not_found("Booking", id))
}

fn booking_resource(conn: &Connection, booking: &Booking) -> Result<Resource, ClinicError> {
    Ok(Resource::Booking {
        patient_id: Some(booking.patient_id),
        clinic_id: Some(clinic_of(conn, &booking.clinic_service_id)?),
    })
}

pub fn create_booking(
    conn: &Connection,
    caller: Option<&Identity>,
    request: &NewBooking,
) -> Result<Booking, ClinicError> {
    require_identity(caller)?;
    let now = Utc::now();
    let appointment_date = validate_future(request.appointment_date, now)?;

    let tx = db::begin_write(conn)?;
    let offer = find_clinic_service(&tx, &request.clinic_service_id)?;
    if db::get_patient(&tx, &request.patient_id)?.is_none() {
        return Err(ClinicError::not_found("Patient", request.patient_id));
    }
    let status = match request.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => BookingStatus::default(),
    };
    check(
        caller,
        Action::Create,
        &Resource::Booking {
            patient_id: Some(request.patient_id),
            clinic_id: Some(offer.clinic_id),
        },
    )?;

    let booking = Booking {
        id: Uuid::new_v4(),
        booking_date: now,
        appointment_date,
        status,
        notes: optional_text(request.notes.as_deref()),
        patient_id: request.patient_id,
        clinic_service_id: offer.id,
    };
    db::insert_booking(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(booking_id = %booking.id, clinic_service_id = %offer.id, "Booking created");
    Ok(booking)
}

/// Booking with patient, offer (clinic and service) and review resolved.
pub fn get_booking(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
) -> Result<BookingDetail, ClinicError> {
    let booking = find_booking(conn, id)?;
    check(caller, Action::Read, &booking_resource(conn, &booking)?)?;

    let patient = db::get_patient(conn, &booking.patient_id)?
        .ok_or_else(|| ClinicError::not_found("Patient", booking.patient_id))?;
    let clinic_service = clinic_service_detail(conn, find_clinic_service(conn, &booking.clinic_service_id)?)?;
    let review = db::get_review_for_booking(conn, &booking.id)?;

    Ok(BookingDetail {
        booking,
        patient,
        clinic_service,
        review,
    })
}

pub fn update_booking(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
    patch: &BookingPatch,
) -> Result<Booking, ClinicError> {
    let tx = db::begin_write(conn)?;
    let mut booking = find_booking(&tx, id)?;
    check(caller, Action::Update, &booking_resource(&tx, &booking)?)?;

    if let Some(appointment_date) = patch.appointment_date {
        booking.appointment_date = validate_future(appointment_date, Utc::now())?;
    }
    if let Some(raw) = &patch.status {
        let status = parse_status(raw)?;
        if status != booking.status {
            tracing::info!(booking_id = %booking.id, from = %booking.status, to = %status, "Booking status changed");
        }
        booking.status = status;
    }
    if let Some(notes) = &patch.notes {
        booking.notes = optional_text(Some(notes));
    }
    db::update_booking(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(booking_id = %booking.id, "Booking updated");
    Ok(booking)
}

/// Removes the booking and its review. Owner patient or admin only.
pub fn delete_booking(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
) -> Result<CascadeReport, ClinicError> {
    let tx = db::begin_write(conn)?;
    let booking = find_booking(&tx, id)?;
    check(caller, Action::Delete, &booking_resource(&tx, &booking)?)?;

    let mut report = CascadeReport::default();
    db::delete_booking_cascade(&tx, id, &mut report)?;
    tx.commit()?;

    tracing::info!(booking_id = %id, "Booking deleted");
    Ok(report)
}

/// Bookings visible to the caller.
///
/// Patients only ever see their own bookings and clinics only bookings
/// against their own offers, whatever the filter asks for. Admins get the
/// filter as given.
pub fn list_bookings(
    conn: &Connection,
    caller: Option<&Identity>,
    filter: &BookingFilter,
) -> Result<Vec<Booking>, ClinicError> {
    check(
        caller,
        Action::List,
        &Resource::Booking {
            patient_id: None,
            clinic_id: None,
        },
    )?;
    let identity = require_identity(caller)?;

    let mut scoped = filter.clone();
    match identity.role {
        Role::Admin => {}
        Role::Patient => match identity.profile_id {
            Some(patient_id) => scoped.patient_id = Some(patient_id),
            None => return Ok(Vec::new()),
        },
        Role::Clinic => match identity.profile_id {
            Some(clinic_id) => scoped.clinic_id = Some(clinic_id),
            None => return Ok(Vec::new()),
        },
    }
    Ok(db::list_bookings(conn, &scoped)?)
}
