//! Read-side representations with nested relations.
//!
//! Each view carries an entity's own columns plus its direct relations,
//! never a back-reference to the parent it is nested under.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Booking, Clinic, ClinicService, Insurance, Patient, Review, Service};

/// A clinic-service row with both ends of the association resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicServiceDetail {
    #[serde(flatten)]
    pub clinic_service: ClinicService,
    pub clinic: Clinic,
    pub service: Service,
}

/// One priced offer as listed under its clinic (clinic side omitted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceOffer {
    pub clinic_service_id: Uuid,
    pub service: Service,
    pub price: Decimal,
}

/// Average rating over every review reachable through the clinic's bookings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub review_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicDetail {
    #[serde(flatten)]
    pub clinic: Clinic,
    pub services: Vec<ServiceOffer>,
    pub insurances: Vec<Insurance>,
    pub rating: RatingSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub patient: Patient,
    pub clinic_service: ClinicServiceDetail,
    pub review: Option<Review>,
}

/// A review with its derived clinic and patient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDetail {
    #[serde(flatten)]
    pub review: Review,
    pub clinic: Clinic,
    pub patient: Patient,
}

/// The profile linked to a user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Profile {
    Patient(Patient),
    Clinic(Clinic),
}
