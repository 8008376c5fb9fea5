use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{parse_timestamp, parse_uuid, DatabaseError};
use crate::models::{RatingSummary, Review, ReviewFilter};

const REVIEW_COLUMNS: &str = "r.id, r.comment, r.rating, r.created_at, r.booking_id";

pub fn insert_review(conn: &Connection, review: &Review) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO reviews (id, comment, rating, created_at, booking_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            review.id.to_string(),
            review.comment,
            review.rating,
            review.created_at.to_rfc3339(),
            review.booking_id.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_review(conn: &Connection, id: &Uuid) -> Result<Option<Review>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {REVIEW_COLUMNS} FROM reviews r WHERE r.id = ?1"),
        params![id.to_string()],
        read_review_row,
    )
    .optional()?
    .map(ReviewRow::into_review)
    .transpose()
}

pub fn get_review_for_booking(
    conn: &Connection,
    booking_id: &Uuid,
) -> Result<Option<Review>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {REVIEW_COLUMNS} FROM reviews r WHERE r.booking_id = ?1"),
        params![booking_id.to_string()],
        read_review_row,
    )
    .optional()?
    .map(ReviewRow::into_review)
    .transpose()
}

/// Updates rating and comment. The booking link never changes.
pub fn update_review(conn: &Connection, review: &Review) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE reviews SET rating = ?1, comment = ?2 WHERE id = ?3",
        params![review.rating, review.comment, review.id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Review".into(),
            id: review.id.to_string(),
        });
    }
    Ok(())
}

/// Reviews filtered by the clinic and/or patient derived through the booking.
pub fn list_reviews(conn: &Connection, filter: &ReviewFilter) -> Result<Vec<Review>, DatabaseError> {
    let mut sql = format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews r
         JOIN bookings b ON b.id = r.booking_id
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
    }

    sql.push_str(" ORDER BY r.created_at DESC");

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), read_review_row)?;

    let mut reviews = Vec::new();
    for row in rows {
        reviews.push(row?.into_review()?);
    }
    Ok(reviews)
}

/// Average rating and count over all reviews of a clinic's bookings.
pub fn rating_summary_for_clinic(
    conn: &Connection,
    clinic_id: &Uuid,
) -> Result<RatingSummary, DatabaseError> {
    let (average, count): (Option<f64>, u32) = conn.query_row(
        "SELECT AVG(r.rating), COUNT(r.id) FROM reviews r
         JOIN bookings b ON b.id = r.booking_id
         JOIN clinic_services cs ON cs.id = b.clinic_service_id
         WHERE cs.clinic_id = ?1",
        params![clinic_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(RatingSummary {
        average,
        review_count: count,
    })
}

pub fn delete_review_for_booking(conn: &Connection, booking_id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM reviews WHERE booking_id = ?1",
        params![booking_id.to_string()],
    )?;
    Ok(deleted > 0)
}

pub fn delete_review_row(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let deleted = conn.execute("DELETE FROM reviews WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}

struct ReviewRow {
    id: String,
    comment: Option<String>,
    rating: u8,
    created_at: String,
    booking_id: String,
}

fn read_review_row(row: &Row<'_>) -> rusqlite::Result<ReviewRow> {
    Ok(ReviewRow {
        id: row.get(0)?,
        comment: row.get(1)?,
        rating: row.get(2)?,
        created_at: row.get(3)?,
        booking_id: row.get(4)?,
    })
}

impl ReviewRow {
    fn into_review(self) -> Result<Review, DatabaseError> {
        Ok(Review {
            id: parse_uuid(&self.id)?,
            comment: self.comment,
            rating: self.rating,
            created_at: parse_timestamp(&self.created_at)?,
            booking_id: parse_uuid(&self.booking_id)?,
        })
    }
}

#[cfg(test)]
pub(crate) fn make_review(conn: &Connection, booking_id: Uuid, rating: u8) -> Review {
    let review = Review {
        id: Uuid::new_v4(),
        comment: None,
        rating,
        created_at: chrono::Utc::now(),
        booking_id,
    };
    insert_review(conn, &review).unwrap();
    review
}
