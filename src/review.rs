//! One rating per booking, with clinic and patient derived through the
//! booking on every read.

use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{check, Action, Resource};
use crate::catalog::{find_clinic, find_clinic_service};
use crate::db;
use crate::error::ClinicError;
use crate::identity::Identity;
use crate::models::{Booking, Review, ReviewDetail, ReviewFilter};
use crate::validation::{optional_text, validate_rating};

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub booking_id: Uuid,
    pub rating: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewPatch {
    pub rating: Option<i64>,
    /// A blank string clears the comment.
    pub comment: Option<String>,
}

fn find_booking(conn: &Connection, id: &Uuid) -> Result<Booking, ClinicError> {
    db::get_booking(conn, id)?.ok_or_else(|| ClinicError::not_found("Booking", id))
}

fn find_review(conn: &Connection, id: &Uuid) -> Result<Review, ClinicError> {
    db::get_review(conn, id)?.ok_or_else(|| ClinicError::not_found("Review", id))
}

fn review_resource(booking: &Booking) -> Resource {
    Resource::Review {
        patient_id: Some(booking.patient_id),
    }
}

pub fn create_review(
    conn: &Connection,
    caller: Option<&Identity>,
    request: &NewReview,
) -> Result<Review, ClinicError> {
    let rating = validate_rating(request.rating)?;

    let tx = db::begin_write(conn)?;
    let booking = find_booking(&tx, &request.booking_id)?;
    check(caller, Action::Create, &review_resource(&booking))?;
    if db::get_review_for_booking(&tx, &booking.id)?.is_some() {
        return Err(ClinicError::conflict("booking has already been reviewed"));
    }

    let review = Review {
        id: Uuid::new_v4(),
        comment: optional_text(request.comment.as_deref()),
        rating,
        created_at: Utc::now(),
        booking_id: booking.id,
    };
    db::insert_review(&tx, &review)?;
    tx.commit()?;

    tracing::info!(review_id = %review.id, booking_id = %booking.id, "Review created");
    Ok(review)
}

/// Review with the clinic and patient reached through its booking.
pub fn get_review(conn: &Connection, id: &Uuid) -> Result<ReviewDetail, ClinicError> {
    let review = find_review(conn, id)?;
    review_detail(conn, review)
}

fn review_detail(conn: &Connection, review: Review) -> Result<ReviewDetail, ClinicError> {
    let booking = find_booking(conn, &review.booking_id)?;
    let offer = find_clinic_service(conn, &booking.clinic_service_id)?;
    Ok(ReviewDetail {
        clinic: find_clinic(conn, &offer.clinic_id)?,
        patient: db::get_patient(conn, &booking.patient_id)?
            .ok_or_else(|| ClinicError::not_found("Patient", booking.patient_id))?,
        review,
    })
}

pub fn update_review(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
    patch: &ReviewPatch,
) -> Result<Review, ClinicError> {
    let tx = db::begin_write(conn)?;
    let mut review = find_review(&tx, id)?;
    let booking = find_booking(&tx, &review.booking_id)?;
    check(caller, Action::Update, &review_resource(&booking))?;

    if let Some(rating) = patch.rating {
        review.rating = validate_rating(rating)?;
    }
    if let Some(comment) = &patch.comment {
        review.comment = optional_text(Some(comment));
    }
    db::update_review(&tx, &review)?;
    tx.commit()?;

    tracing::info!(review_id = %review.id, "Review updated");
    Ok(review)
}

pub fn delete_review(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
) -> Result<(), ClinicError> {
    let tx = db::begin_write(conn)?;
    let review = find_review(&tx, id)?;
    let booking = find_booking(&tx, &review.booking_id)?;
    check(caller, Action::Delete, &review_resource(&booking))?;

    db::delete_review_row(&tx, &review.id)?;
    tx.commit()?;

    tracing::info!(review_id = %review.id, "Review deleted");
    Ok(())
}

/// Public listing, optionally narrowed to a clinic and/or patient.
pub fn list_reviews(conn: &Connection, filter: &ReviewFilter) -> Result<Vec<ReviewDetail>, ClinicError> {
    db::list_reviews(conn, filter)?
        .into_iter()
        .map(|review| review_detail(conn, review))
        .collect()
}
