//! Services, clinics and the priced associations between them.
//!
//! Reads are public. Service mutation and clinic creation/deletion are
//! admin-only; a clinic account may edit its own profile and offers.

use chrono::Utc;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::authorization::{check, Action, Resource};
use crate::db::{self, CascadeReport};
use crate::error::ClinicError;
use crate::identity::Identity;
use crate::models::{Clinic, ClinicDetail, ClinicService, ClinicServiceDetail, Service, ServiceOffer};
use crate::validation::{
    optional_text, require_text, validate_contact, validate_duration, validate_email, validate_price,
};

// ═══════════════════════════════════════════════════════════
// Services
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicePatch {
    pub name: Option<String>,
    pub duration: Option<i64>,
}

pub fn add_service(
    conn: &Connection,
    caller: Option<&Identity>,
    name: &str,
    duration: i64,
) -> Result<Service, ClinicError> {
    check(caller, Action::Create, &Resource::Service)?;
    let service = Service {
        id: Uuid::new_v4(),
        name: require_text("name", name)?,
        duration: validate_duration(duration)?,
    };

    let tx = db::begin_write(conn)?;
    ensure_service_name_free(&tx, &service)?;
    db::insert_service(&tx, &service)?;
    tx.commit()?;

    tracing::info!(service_id = %service.id, "Service added");
    Ok(service)
}

fn ensure_service_name_free(conn: &Connection, service: &Service) -> Result<(), ClinicError> {
    if db::service_with_name(conn, &service.name)?.is_some_and(|id| id != service.id) {
        return Err(ClinicError::conflict(format!("service {} already exists", service.name)));
    }
    Ok(())
}

pub fn get_service(conn: &Connection, id: &Uuid) -> Result<Service, ClinicError> {
    db::get_service(conn, id)?.ok_or_else(|| ClinicError::not_found("Service", id))
}

pub fn update_service(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
    patch: &ServicePatch,
) -> Result<Service, ClinicError> {
    check(caller, Action::Update, &Resource::Service)?;

    let tx = db::begin_write(conn)?;
    let mut service = get_service(&tx, id)?;
    if let Some(name) = &patch.name {
        service.name = require_text("name", name)?;
    }
    if let Some(duration) = patch.duration {
        service.duration = validate_duration(duration)?;
    }
    ensure_service_name_free(&tx, &service)?;
    db::update_service(&tx, &service)?;
    tx.commit()?;

    tracing::info!(service_id = %service.id, "Service updated");
    Ok(service)
}

/// Removes the service from every clinic, with the bookings made against it.
pub fn delete_service(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
) -> Result<CascadeReport, ClinicError> {
    check(caller, Action::Delete, &Resource::Service)?;

    let tx = db::begin_write(conn)?;
    let report = db::delete_service_cascade(&tx, id)?;
    tx.commit()?;

    tracing::info!(service_id = %id, "Service deleted");
    tracing::debug!(?report, "Service cascade");
    Ok(report)
}

pub fn list_services(conn: &Connection) -> Result<Vec<Service>, ClinicError> {
    Ok(db::list_services(conn)?)
}

// ═══════════════════════════════════════════════════════════
// Clinics
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct ClinicFields {
    pub name: String,
    pub specialty: String,
    pub description: Option<String>,
    pub contact: String,
    pub email: String,
    pub street: String,
    pub city: String,
    pub image_url: Option<String>,
}

/// Field-level update. For `description` and `image_url` a blank string
/// clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClinicPatch {
    pub name: Option<String>,
    pub specialty: Option<String>,
    pub description: Option<String>,
    pub contact: Option<String>,
    pub email: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub image_url: Option<String>,
}

pub(crate) fn insert_new_clinic(
    conn: &Connection,
    fields: &ClinicFields,
    user_id: Option<Uuid>,
) -> Result<Clinic, ClinicError> {
    let clinic = Clinic {
        id: Uuid::new_v4(),
        name: require_text("name", &fields.name)?,
        specialty: require_text("specialty", &fields.specialty)?,
        description: optional_text(fields.description.as_deref()),
        contact: validate_contact(&fields.contact)?,
        email: validate_email(&fields.email)?,
        street: require_text("street", &fields.street)?,
        city: require_text("city", &fields.city)?,
        image_url: optional_text(fields.image_url.as_deref()),
        user_id,
    };
    ensure_clinic_unique(conn, &clinic)?;
    db::insert_clinic(conn, &clinic)?;
    Ok(clinic)
}

fn ensure_clinic_unique(conn: &Connection, clinic: &Clinic) -> Result<(), ClinicError> {
    if db::clinic_with_contact(conn, &clinic.contact)?.is_some_and(|id| id != clinic.id) {
        return Err(ClinicError::conflict(format!(
            "contact {} is already registered",
            clinic.contact
        )));
    }
    if db::clinic_with_email(conn, &clinic.email)?.is_some_and(|id| id != clinic.id) {
        return Err(ClinicError::conflict(format!(
            "email {} is already registered",
            clinic.email
        )));
    }
    Ok(())
}

/// Admin-created clinic without a login.
pub fn add_clinic(
    conn: &Connection,
    caller: Option<&Identity>,
    fields: &ClinicFields,
) -> Result<Clinic, ClinicError> {
    check(caller, Action::Create, &Resource::Clinic(None))?;

    let tx = db::begin_write(conn)?;
    let clinic = insert_new_clinic(&tx, fields, None)?;
    tx.commit()?;

    tracing::info!(clinic_id = %clinic.id, "Clinic added");
    Ok(clinic)
}

/// Clinic with its priced services, accepted insurances and rating.
pub fn get_clinic(conn: &Connection, id: &Uuid) -> Result<ClinicDetail, ClinicError> {
    let clinic = find_clinic(conn, id)?;
    Ok(ClinicDetail {
        services: list_clinic_services(conn, id)?,
        insurances: db::list_insurances_for_clinic(conn, id)?,
        rating: db::rating_summary_for_clinic(conn, id)?,
        clinic,
    })
}

pub(crate) fn find_clinic(conn: &Connection, id: &Uuid) -> Result<Clinic, ClinicError> {
    db::get_clinic(conn, id)?.ok_or_else(|| ClinicError::not_found("Clinic", id))
}

pub fn update_clinic(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
    patch: &ClinicPatch,
) -> Result<Clinic, ClinicError> {
    check(caller, Action::Update, &Resource::Clinic(Some(*id)))?;

    let tx = db::begin_write(conn)?;
    let mut clinic = find_clinic(&tx, id)?;
    if let Some(name) = &patch.name {
        clinic.name = require_text("name", name)?;
    }
    if let Some(specialty) = &patch.specialty {
        clinic.specialty = require_text("specialty", specialty)?;
    }
    if let Some(description) = &patch.description {
        clinic.description = optional_text(Some(description));
    }
    if let Some(contact) = &patch.contact {
        clinic.contact = validate_contact(contact)?;
    }
    if let Some(email) = &patch.email {
        clinic.email = validate_email(email)?;
    }
    if let Some(street) = &patch.street {
        clinic.street = require_text("street", street)?;
    }
    if let Some(city) = &patch.city {
        clinic.city = require_text("city", city)?;
    }
    if let Some(image_url) = &patch.image_url {
        clinic.image_url = optional_text(Some(image_url));
    }
    ensure_clinic_unique(&tx, &clinic)?;
    db::update_clinic(&tx, &clinic)?;
    tx.commit()?;

    tracing::info!(clinic_id = %clinic.id, "Clinic updated");
    Ok(clinic)
}

/// Removes the clinic with its offers, bookings, reviews, insurance
/// memberships and login.
pub fn delete_clinic(
    conn: &Connection,
    caller: Option<&Identity>,
    id: &Uuid,
) -> Result<CascadeReport, ClinicError> {
    check(caller, Action::Delete, &Resource::Clinic(Some(*id)))?;

    let tx = db::begin_write(conn)?;
    let report = db::delete_clinic_cascade(&tx, id)?;
    tx.commit()?;

    tracing::info!(clinic_id = %id, "Clinic deleted");
    tracing::debug!(?report, "Clinic cascade");
    Ok(report)
}

pub fn list_clinics(conn: &Connection) -> Result<Vec<Clinic>, ClinicError> {
    Ok(db::list_clinics(conn)?)
}

// ═══════════════════════════════════════════════════════════
// Clinic services
// ═══════════════════════════════════════════════════════════

pub fn attach_service(
    conn: &Connection,
    caller: Option<&Identity>,
    clinic_id: &Uuid,
    service_id: &Uuid,
    price: Decimal,
) -> Result<ClinicService, ClinicError> {
    check(caller, Action::Create, &Resource::ClinicOffer(*clinic_id))?;
    let price = validate_price(price)?;

    let tx = db::begin_write(conn)?;
    find_clinic(&tx, clinic_id)?;
    get_service(&tx, service_id)?;
    if db::find_clinic_service(&tx, clinic_id, service_id)?.is_some() {
        return Err(ClinicError::conflict("clinic already offers this service"));
    }
    let offer = ClinicService {
        id: Uuid::new_v4(),
        clinic_id: *clinic_id,
        service_id: *service_id,
        price,
        created_at: Utc::now(),
    };
    db::insert_clinic_service(&tx, &offer)?;
    tx.commit()?;

    tracing::info!(clinic_service_id = %offer.id, clinic_id = %clinic_id, "Service attached");
    Ok(offer)
}

pub fn update_price(
    conn: &Connection,
    caller: Option<&Identity>,
    clinic_service_id: &Uuid,
    price: Decimal,
) -> Result<ClinicService, ClinicError> {
    let tx = db::begin_write(conn)?;
    let mut offer = find_clinic_service(&tx, clinic_service_id)?;
    check(caller, Action::Update, &Resource::ClinicOffer(offer.clinic_id))?;

    offer.price = validate_price(price)?;
    db::update_clinic_service_price(&tx, &offer.id, offer.price)?;
    tx.commit()?;

    tracing::info!(clinic_service_id = %offer.id, "Price updated");
    Ok(offer)
}

/// Withdraws an offer along with the bookings made against it.
pub fn detach_service(
    conn: &Connection,
    caller: Option<&Identity>,
    clinic_service_id: &Uuid,
) -> Result<CascadeReport, ClinicError> {
    let tx = db::begin_write(conn)?;
    let offer = find_clinic_service(&tx, clinic_service_id)?;
    check(caller, Action::Delete, &Resource::ClinicOffer(offer.clinic_id))?;

    let mut report = CascadeReport::default();
    db::delete_clinic_service_cascade(&tx, &offer.id, &mut report)?;
    tx.commit()?;

    tracing::info!(clinic_service_id = %offer.id, "Service detached");
    tracing::debug!(?report, "Offer cascade");
    Ok(report)
}

pub(crate) fn find_clinic_service(conn: &Connection, id: &Uuid) -> Result<ClinicService, ClinicError> {
    db::get_clinic_service(conn, id)?.ok_or_else(|| ClinicError::not_found("ClinicService", id))
}

/// Offer with both its clinic and service resolved.
pub fn get_clinic_service(conn: &Connection, id: &Uuid) -> Result<ClinicServiceDetail, ClinicError> {
    let offer = find_clinic_service(conn, id)?;
    clinic_service_detail(conn, offer)
}

pub(crate) fn clinic_service_detail(
    conn: &Connection,
    offer: ClinicService,
) -> Result<ClinicServiceDetail, ClinicError> {
    Ok(ClinicServiceDetail {
        clinic: find_clinic(conn, &offer.clinic_id)?,
        service: get_service(conn, &offer.service_id)?,
        clinic_service: offer,
    })
}

/// A clinic's priced services, oldest offer first.
pub fn list_clinic_services(conn: &Connection, clinic_id: &Uuid) -> Result<Vec<ServiceOffer>, ClinicError> {
    find_clinic(conn, clinic_id)?;
    db::list_clinic_services_for_clinic(conn, clinic_id)?
        .into_iter()
        .map(|offer| {
            Ok(ServiceOffer {
                clinic_service_id: offer.id,
                service: get_service(conn, &offer.service_id)?,
                price: offer.price,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::identity::{clinic_fields, register_as, ProfileFields};
    use crate::models::{RatingSummary, Role};

    struct Fixture {
        conn: Connection,
        admin: Identity,
        afya: Identity,
        other: Identity,
    }

    fn fixture() -> Fixture {
        let conn = open_memory_database().unwrap();
        let admin = register_as(&conn, "root", Role::Admin, None);
        let afya = register_as(
            &conn,
            "afya",
            Role::Clinic,
            Some(ProfileFields::Clinic(clinic_fields("Afya", "+254711000001", "afya@example.com"))),
        );
        let other = register_as(
            &conn,
            "tumaini",
            Role::Clinic,
            Some(ProfileFields::Clinic(clinic_fields("Tumaini", "+254711000002", "tumaini@example.com"))),
        );
        Fixture {
            conn,
            admin,
            afya,
            other,
        }
    }

    #[test]
    fn service_names_are_unique() {
        let f = fixture();
        add_service(&f.conn, Some(&f.admin), "Dental Checkup", 45).unwrap();
        let err = add_service(&f.conn, Some(&f.admin), "Dental Checkup", 30).unwrap_err();
        assert!(matches!(err, ClinicError::Conflict(_)));
        let err = add_service(&f.conn, Some(&f.admin), "Scan", 0).unwrap_err();
        assert!(matches!(err, ClinicError::Validation(_)));
    }

    #[test]
    fn only_admin_manages_services() {
        let f = fixture();
        let err = add_service(&f.conn, Some(&f.afya), "Dental", 45).unwrap_err();
        assert!(matches!(err, ClinicError::Authorization(_)));
        let err = add_service(&f.conn, None, "Dental", 45).unwrap_err();
        assert!(matches!(err, ClinicError::Authentication(_)));
    }

    #[test]
    fn rename_service_into_existing_name_conflicts() {
        let f = fixture();
        add_service(&f.conn, Some(&f.admin), "Dental", 45).unwrap();
        let scan = add_service(&f.conn, Some(&f.admin), "Scan", 20).unwrap();
        let patch = ServicePatch {
            name: Some("Dental".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_service(&f.conn, Some(&f.admin), &scan.id, &patch),
            Err(ClinicError::Conflict(_))
        ));
        let patch = ServicePatch {
            duration: Some(25),
            ..Default::default()
        };
        assert_eq!(update_service(&f.conn, Some(&f.admin), &scan.id, &patch).unwrap().duration, 25);
    }

    #[test]
    fn attach_detach_reattach() {
        let f = fixture();
        let clinic_id = f.afya.profile_id.unwrap();
        let dental = add_service(&f.conn, Some(&f.admin), "Dental", 45).unwrap();

        let first = attach_service(&f.conn, Some(&f.afya), &clinic_id, &dental.id, Decimal::new(2000, 0)).unwrap();
        let err = attach_service(&f.conn, Some(&f.afya), &clinic_id, &dental.id, Decimal::new(1500, 0)).unwrap_err();
        assert!(matches!(err, ClinicError::Conflict(_)));

        detach_service(&f.conn, Some(&f.afya), &first.id).unwrap();
        let again = attach_service(&f.conn, Some(&f.afya), &clinic_id, &dental.id, Decimal::new(1500, 0)).unwrap();
        assert_ne!(again.id, first.id);
    }

    #[test]
    fn clinic_cannot_touch_another_clinics_offers() {
        let f = fixture();
        let afya_id = f.afya.profile_id.unwrap();
        let dental = add_service(&f.conn, Some(&f.admin), "Dental", 45).unwrap();
        let offer = attach_service(&f.conn, Some(&f.afya), &afya_id, &dental.id, Decimal::new(2000, 0)).unwrap();

        assert!(matches!(
            attach_service(&f.conn, Some(&f.other), &afya_id, &dental.id, Decimal::ONE),
            Err(ClinicError::Authorization(_))
        ));
        assert!(matches!(
            update_price(&f.conn, Some(&f.other), &offer.id, Decimal::ONE),
            Err(ClinicError::Authorization(_))
        ));
        let updated = update_price(&f.conn, Some(&f.admin), &offer.id, Decimal::new(250050, 2)).unwrap();
        assert_eq!(updated.price, Decimal::new(250050, 2));
    }

    #[test]
    fn attach_to_missing_service_is_not_found_and_negative_price_invalid() {
        let f = fixture();
        let afya_id = f.afya.profile_id.unwrap();
        let err = attach_service(&f.conn, Some(&f.afya), &afya_id, &Uuid::new_v4(), Decimal::ONE).unwrap_err();
        assert!(matches!(err, ClinicError::NotFound { .. }));

        let dental = add_service(&f.conn, Some(&f.admin), "Dental", 45).unwrap();
        let err = attach_service(&f.conn, Some(&f.afya), &afya_id, &dental.id, Decimal::NEGATIVE_ONE).unwrap_err();
        assert!(matches!(err, ClinicError::Validation(_)));
    }

    #[test]
    fn clinic_detail_nests_offers_and_insurances() {
        let f = fixture();
        let afya_id = f.afya.profile_id.unwrap();
        let dental = add_service(&f.conn, Some(&f.admin), "Dental", 45).unwrap();
        attach_service(&f.conn, Some(&f.afya), &afya_id, &dental.id, Decimal::new(2000, 0)).unwrap();

        let detail = get_clinic(&f.conn, &afya_id).unwrap();
        assert_eq!(detail.clinic.name, "Afya");
        assert_eq!(detail.services.len(), 1);
        assert_eq!(detail.services[0].service.name, "Dental");
        assert!(detail.insurances.is_empty());
        assert_eq!(detail.rating, RatingSummary { average: None, review_count: 0 });

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["name"], "Afya");
        assert_eq!(json["services"][0]["price"], "2000");
    }

    #[test]
    fn clinic_update_owner_only_and_revalidates() {
        let f = fixture();
        let afya_id = f.afya.profile_id.unwrap();

        let patch = ClinicPatch {
            email: Some("tumaini@example.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_clinic(&f.conn, Some(&f.afya), &afya_id, &patch),
            Err(ClinicError::Conflict(_))
        ));

        let patch = ClinicPatch {
            description: Some("Family practice".into()),
            city: Some("Mombasa".into()),
            ..Default::default()
        };
        assert!(matches!(
            update_clinic(&f.conn, Some(&f.other), &afya_id, &patch),
            Err(ClinicError::Authorization(_))
        ));
        let updated = update_clinic(&f.conn, Some(&f.afya), &afya_id, &patch).unwrap();
        assert_eq!(updated.city, "Mombasa");
        assert_eq!(updated.description.as_deref(), Some("Family practice"));

        let clear = ClinicPatch {
            description: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(update_clinic(&f.conn, Some(&f.afya), &afya_id, &clear).unwrap().description, None);
    }

    #[test]
    fn add_clinic_admin_only_with_validation() {
        let f = fixture();
        let mut fields = clinic_fields("New", "+254711000003", "new@example.com");
        assert!(matches!(
            add_clinic(&f.conn, Some(&f.afya), &fields),
            Err(ClinicError::Authorization(_))
        ));
        fields.street = " ".into();
        assert!(matches!(
            add_clinic(&f.conn, Some(&f.admin), &fields),
            Err(ClinicError::Validation(_))
        ));
        fields.street = "Kenyatta Ave".into();
        add_clinic(&f.conn, Some(&f.admin), &fields).unwrap();
        assert_eq!(list_clinics(&f.conn).unwrap().len(), 3);
    }

    #[test]
    fn delete_clinic_admin_only() {
        let f = fixture();
        let afya_id = f.afya.profile_id.unwrap();
        assert!(matches!(
            delete_clinic(&f.conn, Some(&f.afya), &afya_id),
            Err(ClinicError::Authorization(_))
        ));
        let report = delete_clinic(&f.conn, Some(&f.admin), &afya_id).unwrap();
        assert_eq!(report.users, 1);
        assert!(matches!(get_clinic(&f.conn, &afya_id), Err(ClinicError::NotFound { .. })));
    }

    #[test]
    fn offers_of_unknown_clinic_not_found() {
        let f = fixture();
        let afya_id = f.afya.profile_id.unwrap();
        assert!(list_clinic_services(&f.conn, &afya_id).unwrap().is_empty());
        assert!(matches!(
            list_clinic_services(&f.conn, &Uuid::new_v4()),
            Err(ClinicError::NotFound { .. })
        ));
    }
}
