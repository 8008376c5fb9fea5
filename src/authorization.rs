//! Role and ownership policy for every domain operation.
//!
//! Rules are checked in order, default deny:
//! 1. Public reads (catalog, clinics, reviews) → ALLOW, no identity needed
//! 2. Anonymous caller → DENY (authentication required)
//! 3. Administrator → ALLOW
//! 4. Patient acting on their own patient record → ALLOW
//! 5. Clinic acting on its own clinic → ALLOW
//! 6. Clinic staff reading the patient directory or booking a patient → ALLOW
//! 7. Default → DENY
//!
//! `evaluate` is pure. `check` turns a denial into the matching error and
//! logs it.

use uuid::Uuid;

use crate::error::ClinicError;
use crate::identity::Identity;
use crate::models::Role;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    List,
    Create,
    Update,
    Delete,
}

/// Target of an action, carrying the owner ids the policy needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Service,
    Insurance,
    /// `None` when creating or listing.
    Clinic(Option<Uuid>),
    /// A clinic's priced services and insurance memberships.
    ClinicOffer(Uuid),
    Patient(Option<Uuid>),
    /// Both ids are `None` for list queries, which are scoped afterwards.
    Booking {
        patient_id: Option<Uuid>,
        clinic_id: Option<Uuid>,
    },
    Review {
        patient_id: Option<Uuid>,
    },
}

/// Why access was granted (or denied).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    /// Open to everyone, including anonymous callers.
    Public,
    Admin,
    /// Patient acting on their own record.
    OwnPatient,
    /// Clinic account acting on its own clinic.
    OwnClinic,
    /// Clinic account reading patient records or booking a patient.
    ClinicStaff,
    /// Any signed-in caller; results are narrowed to what they own.
    Scoped,
    Unauthenticated,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn allow(reason: AccessReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: AccessReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Policy
// ═══════════════════════════════════════════════════════════

pub fn evaluate(identity: Option<&Identity>, action: Action, resource: &Resource) -> AccessDecision {
    // Rule 1: Public reads
    if is_public_read(action, resource) {
        return AccessDecision::allow(AccessReason::Public);
    }

    // Rule 2: Everything else needs a caller
    let Some(identity) = identity else {
        return AccessDecision::deny(AccessReason::Unauthenticated);
    };

    // Rule 3: Administrator
    if identity.is_admin() {
        return AccessDecision::allow(AccessReason::Admin);
    }

    match (resource, action) {
        // Rule 4: Own patient record
        (Resource::Patient(Some(id)), Action::Read | Action::Update) if identity.owns_patient(id) => {
            AccessDecision::allow(AccessReason::OwnPatient)
        }
        // Rule 6: Clinic staff read patients
        (Resource::Patient(_), Action::Read | Action::List) if identity.role == Role::Clinic => {
            AccessDecision::allow(AccessReason::ClinicStaff)
        }

        // Rule 5: Own clinic profile and offers
        (Resource::Clinic(Some(id)), Action::Update) if identity.owns_clinic(id) => {
            AccessDecision::allow(AccessReason::OwnClinic)
        }
        (Resource::ClinicOffer(id), Action::Create | Action::Update | Action::Delete)
            if identity.owns_clinic(id) =>
        {
            AccessDecision::allow(AccessReason::OwnClinic)
        }

        (Resource::Booking { .. }, Action::List) => AccessDecision::allow(AccessReason::Scoped),
        (Resource::Booking { patient_id, clinic_id }, _) => booking_access(identity, action, patient_id, clinic_id),

        (Resource::Review { patient_id: Some(id) }, Action::Create | Action::Update | Action::Delete)
            if identity.owns_patient(id) =>
        {
            AccessDecision::allow(AccessReason::OwnPatient)
        }

        // Rule 7: Default deny
        _ => AccessDecision::deny(AccessReason::Denied),
    }
}

fn is_public_read(action: Action, resource: &Resource) -> bool {
    matches!(action, Action::Read | Action::List)
        && matches!(
            resource,
            Resource::Service
                | Resource::Insurance
                | Resource::Clinic(_)
                | Resource::ClinicOffer(_)
                | Resource::Review { .. }
        )
}

/// Patients reach their own bookings. Clinic staff may book any patient
/// into any offer; otherwise they reach bookings against their own
/// services and may not delete them.
fn booking_access(
    identity: &Identity,
    action: Action,
    patient_id: &Option<Uuid>,
    clinic_id: &Option<Uuid>,
) -> AccessDecision {
    let own_patient = patient_id.as_ref().is_some_and(|id| identity.owns_patient(id));
    let own_clinic = clinic_id.as_ref().is_some_and(|id| identity.owns_clinic(id));

    match action {
        _ if own_patient => AccessDecision::allow(AccessReason::OwnPatient),
        Action::Create if identity.role == Role::Clinic => AccessDecision::allow(AccessReason::ClinicStaff),
        Action::Read | Action::Update if own_clinic => {
            AccessDecision::allow(AccessReason::OwnClinic)
        }
        _ => AccessDecision::deny(AccessReason::Denied),
    }
}

/// Evaluate and convert a denial into an error.
///
/// Anonymous callers get `Authentication`; signed-in callers lacking the
/// role or ownership get `Authorization`.
pub fn check(
    identity: Option<&Identity>,
    action: Action,
    resource: &Resource,
) -> Result<AccessReason, ClinicError> {
    let decision = evaluate(identity, action, resource);
    if decision.allowed {
        return Ok(decision.reason);
    }
    match identity {
        None => Err(ClinicError::Authentication("login required".into())),
        Some(identity) => {
            tracing::warn!(
                user_id = %identity.user_id,
                role = %identity.role,
                ?action,
                ?resource,
                "Access denied"
            );
            Err(ClinicError::Authorization(format!(
                "{} may not {:?} this {}",
                identity.role,
                action,
                resource_label(resource)
            )))
        }
    }
}

/// Shortcut for operations that only need a signed-in caller.
pub fn require_identity(identity: Option<&Identity>) -> Result<&Identity, ClinicError> {
    identity.ok_or_else(|| ClinicError::Authentication("login required".into()))
}

fn resource_label(resource: &Resource) -> &'static str {
    match resource {
        Resource::Service => "service",
        Resource::Insurance => "insurance",
        Resource::Clinic(_) => "clinic",
        Resource::ClinicOffer(_) => "clinic offering",
        Resource::Patient(_) => "patient",
        Resource::Booking { .. } => "booking",
        Resource::Review { .. } => "review",
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
