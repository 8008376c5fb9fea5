//! Process-wide state handed to the transport layer.
//!
//! `CoreState` owns the database location and the password policy. Each
//! request opens its own connection. Write transactions take SQLite's write
//! lock at BEGIN and wait up to `db::BUSY_TIMEOUT` for it, so concurrent
//! writers queue and a losing check-then-insert sees the winner's row.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::config::Settings;
use crate::crypto::{CryptoError, PasswordHasher};
use crate::db::{self, DatabaseError};

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Cannot create data directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid password policy: {0}")]
    Crypto(#[from] CryptoError),
}

pub struct CoreState {
    db_path: PathBuf,
    hasher: PasswordHasher,
}

impl CoreState {
    /// Prepare the data directory and bring the schema up to date.
    pub fn new(settings: &Settings) -> Result<Self, CoreError> {
        if let Some(parent) = settings.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let hasher = PasswordHasher::with_iterations(settings.pbkdf2_iterations)?;
        drop(db::open_database(&settings.db_path)?);

        tracing::info!(
            db_path = %settings.db_path.display(),
            iterations = hasher.iterations(),
            "Core state ready"
        );
        Ok(Self {
            db_path: settings.db_path.clone(),
            hasher,
        })
    }

    /// Fresh connection for one request, with pragmas applied.
    pub fn open_db(&self) -> Result<Connection, DatabaseError> {
        db::open_database(&self.db_path)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;

    use crate::error::ClinicError;
    use crate::identity::{authenticate, patient_fields, register, Identity, ProfileFields, RegistrationRequest};
    use crate::models::Role;

    const WRITERS: usize = 6;

    fn settings(dir: &Path) -> Settings {
        Settings {
            db_path: dir.join("nested").join("healthhub.db"),
            pbkdf2_iterations: crate::crypto::MIN_ITERATIONS,
        }
    }

    #[test]
    fn new_creates_directory_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::new(&settings(dir.path())).unwrap();
        assert!(state.db_path().exists());
        let conn = state.open_db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 11);
    }

    #[test]
    fn data_survives_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::new(&settings(dir.path())).unwrap();

        let request = RegistrationRequest {
            username: "root".into(),
            password: "s3cret-pass".into(),
            role: Role::Admin,
            profile: None,
        };
        register(&state.open_db().unwrap(), state.hasher(), None, &request).unwrap();

        let session = authenticate(&state.open_db().unwrap(), state.hasher(), "root", "s3cret-pass").unwrap();
        assert_eq!(session.identity.role, Role::Admin);
    }

    #[test]
    fn weak_password_policy_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut weak = settings(dir.path());
        weak.pbkdf2_iterations = 1;
        assert!(matches!(CoreState::new(&weak), Err(CoreError::Crypto(_))));
    }

    fn patient_request(username: String, round: usize, writer: usize) -> RegistrationRequest {
        RegistrationRequest {
            username,
            password: "s3cret-pass".into(),
            role: Role::Patient,
            profile: Some(ProfileFields::Patient(patient_fields(
                "Racer",
                &format!("+25470{round:03}{writer:03}"),
                &format!("racer-{round}-{writer}@example.com"),
            ))),
        }
    }

    /// Every writer opens its own connection and registers at the same instant.
    fn race(state: &CoreState, round: usize, username: impl Fn(usize) -> String + Sync) -> Vec<Result<Identity, ClinicError>> {
        let barrier = Barrier::new(WRITERS);
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..WRITERS)
                .map(|writer| {
                    let (barrier, username) = (&barrier, &username);
                    s.spawn(move || {
                        let conn = state.open_db().unwrap();
                        barrier.wait();
                        register(&conn, state.hasher(), None, &patient_request(username(writer), round, writer))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    fn unexpected_errors(outcomes: &[Result<Identity, ClinicError>]) -> Vec<String> {
        outcomes
            .iter()
            .filter_map(|r| r.as_ref().err())
            .filter(|e| !matches!(e, ClinicError::Conflict(_)))
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn concurrent_same_username_yields_one_winner_and_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::new(&settings(dir.path())).unwrap();

        for round in 0..10 {
            let outcomes = race(&state, round, |_| format!("shared-{round}"));
            assert_eq!(unexpected_errors(&outcomes), Vec::<String>::new());
            assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1, "round {round}");
        }
    }

    #[test]
    fn concurrent_independent_registrations_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::new(&settings(dir.path())).unwrap();

        for round in 0..10 {
            let outcomes = race(&state, round, |writer| format!("solo-{round}-{writer}"));
            assert_eq!(unexpected_errors(&outcomes), Vec::<String>::new());
            assert!(outcomes.iter().all(Result::is_ok), "round {round}");
        }

        let users: i64 = state
            .open_db()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(users, (10 * WRITERS) as i64);
    }
}
