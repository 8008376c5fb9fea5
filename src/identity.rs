//! Accounts, registration and bearer sessions.
//!
//! `register` writes the user row and its linked profile in one
//! transaction. `authenticate` issues an opaque token whose SHA-256 digest
//! is the only thing persisted; `current_identity` resolves it back.

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{insert_new_clinic, ClinicFields};
use crate::crypto::{generate_token, hash_token, PasswordHasher};
use crate::db;
use crate::error::ClinicError;
use crate::models::{Profile, Role, User};
use crate::patients::{insert_new_patient, PatientFields};
use crate::validation::require_text;

/// The authenticated actor attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    /// Linked patient or clinic id, depending on `role`.
    pub profile_id: Option<Uuid>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn owns_patient(&self, patient_id: &Uuid) -> bool {
        self.role == Role::Patient && self.profile_id.as_ref() == Some(patient_id)
    }

    pub fn owns_clinic(&self, clinic_id: &Uuid) -> bool {
        self.role == Role::Clinic && self.profile_id.as_ref() == Some(clinic_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfileFields {
    Patient(PatientFields),
    Clinic(ClinicFields),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub username: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub profile: Option<ProfileFields>,
}

fn default_role() -> Role {
    Role::Patient
}

/// Issued on login. `token` is shown to the caller once and never stored.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub identity: Identity,
}

/// Create a user and, for patient and clinic roles, its profile.
///
/// Admin accounts may only be created by an admin, except for the very
/// first one. Any failure rolls back both records.
pub fn register(
    conn: &Connection,
    hasher: &PasswordHasher,
    caller: Option<&Identity>,
    request: &RegistrationRequest,
) -> Result<Identity, ClinicError> {
    let username = require_text("username", &request.username)?;
    if request.password.is_empty() {
        return Err(ClinicError::validation("password is required"));
    }
    // Derived before taking the write lock.
    let password_hash = hasher.hash(&request.password);

    let tx = db::begin_write(conn)?;

    if db::get_user_by_username(&tx, &username)?.is_some() {
        return Err(ClinicError::conflict(format!("username {username} already exists")));
    }

    if request.role == Role::Admin && !caller.is_some_and(Identity::is_admin) && admin_exists(&tx)? {
        tracing::warn!(username = %username, "Admin registration refused");
        return Err(ClinicError::Authorization(
            "only an administrator can create administrator accounts".into(),
        ));
    }

    let user = User {
        id: Uuid::new_v4(),
        username,
        password_hash,
        role: request.role,
        created_at: Utc::now(),
    };
    db::insert_user(&tx, &user)?;

    let profile_id = match (request.role, &request.profile) {
        (Role::Patient, Some(ProfileFields::Patient(fields))) => {
            Some(insert_new_patient(&tx, fields, Some(user.id))?.id)
        }
        (Role::Clinic, Some(ProfileFields::Clinic(fields))) => {
            Some(insert_new_clinic(&tx, fields, Some(user.id))?.id)
        }
        (Role::Admin, None) => None,
        (Role::Admin, Some(_)) => {
            return Err(ClinicError::validation("administrators have no profile"));
        }
        (role, _) => {
            return Err(ClinicError::validation(format!("{role} registration requires {role} profile fields")));
        }
    };

    tx.commit()?;
    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    Ok(Identity {
        user_id: user.id,
        username: user.username,
        role: user.role,
        profile_id,
    })
}

fn admin_exists(conn: &Connection) -> Result<bool, ClinicError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'admin'",
        [],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Verify credentials and open a session.
pub fn authenticate(
    conn: &Connection,
    hasher: &PasswordHasher,
    username: &str,
    password: &str,
) -> Result<Session, ClinicError> {
    let invalid = || ClinicError::Authentication("invalid credentials".into());

    let Some(user) = db::get_user_by_username(conn, username.trim())? else {
        tracing::warn!("Login failed: unknown username");
        return Err(invalid());
    };
    let verified = hasher.verify(password, &user.password_hash).map_err(|e| {
        tracing::error!(user_id = %user.id, error = %e, "Stored password hash unreadable");
        invalid()
    })?;
    if !verified {
        tracing::warn!(user_id = %user.id, "Login failed: wrong password");
        return Err(invalid());
    }

    let token = generate_token();
    db::insert_session(conn, &hash_token(&token), &user.id, Utc::now())?;
    let identity = identity_for_user(conn, user)?;
    tracing::info!(user_id = %identity.user_id, "Session opened");

    Ok(Session { token, identity })
}

/// Identity behind a bearer token. Absent, unknown or revoked tokens
/// yield `None` rather than an error.
pub fn current_identity(
    conn: &Connection,
    token: Option<&str>,
) -> Result<Option<Identity>, ClinicError> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let Some(user_id) = db::get_session_user(conn, &hash_token(token))? else {
        return Ok(None);
    };
    match db::get_user(conn, &user_id)? {
        Some(user) => Ok(Some(identity_for_user(conn, user)?)),
        None => Ok(None),
    }
}

/// Revoke a session. Returns whether a live session was found.
pub fn logout(conn: &Connection, token: &str) -> Result<bool, ClinicError> {
    let revoked = db::revoke_session(conn, &hash_token(token))?;
    if revoked {
        tracing::info!("Session revoked");
    }
    Ok(revoked)
}

/// The caller's own patient or clinic profile; `None` for administrators.
pub fn my_profile(conn: &Connection, caller: Option<&Identity>) -> Result<Option<Profile>, ClinicError> {
    let identity = caller.ok_or_else(|| ClinicError::Authentication("login required".into()))?;
    let profile = match identity.role {
        Role::Patient => db::get_patient_by_user(conn, &identity.user_id)?.map(Profile::Patient),
        Role::Clinic => db::get_clinic_by_user(conn, &identity.user_id)?.map(Profile::Clinic),
        Role::Admin => None,
    };
    Ok(profile)
}

fn identity_for_user(conn: &Connection, user: User) -> Result<Identity, ClinicError> {
    let profile_id = match user.role {
        Role::Patient => db::get_patient_by_user(conn, &user.id)?.map(|p| p.id),
        Role::Clinic => db::get_clinic_by_user(conn, &user.id)?.map(|c| c.id),
        Role::Admin => None,
    };
    Ok(Identity {
        user_id: user.id,
        username: user.username,
        role: user.role,
        profile_id,
    })
}

#[cfg(test)]
pub(crate) fn test_hasher() -> PasswordHasher {
    PasswordHasher::with_iterations(crate::crypto::MIN_ITERATIONS).unwrap()
}

#[cfg(test)]
pub(crate) fn patient_fields(name: &str, contact: &str, email: &str) -> PatientFields {
    PatientFields {
        name: name.into(),
        contact: contact.into(),
        email: email.into(),
    }
}

#[cfg(test)]
pub(crate) fn clinic_fields(name: &str, contact: &str, email: &str) -> ClinicFields {
    ClinicFields {
        name: name.into(),
        specialty: "General Practice".into(),
        description: None,
        contact: contact.into(),
        email: email.into(),
        street: "Moi Avenue".into(),
        city: "Nairobi".into(),
        image_url: None,
    }
}

/// Register an account of any role with a fixed password.
#[cfg(test)]
pub(crate) fn register_as(
    conn: &Connection,
    username: &str,
    role: Role,
    profile: Option<ProfileFields>,
) -> Identity {
    let request = RegistrationRequest {
        username: username.into(),
        password: "s3cret-pass".into(),
        role,
        profile,
    };
    let admin = Identity {
        user_id: Uuid::nil(),
        username: "bootstrap".into(),
        role: Role::Admin,
        profile_id: None,
    };
    register(conn, &test_hasher(), Some(&admin), &request).unwrap()
}
