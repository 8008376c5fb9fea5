use std::path::PathBuf;

use crate::crypto::{MIN_ITERATIONS, PBKDF2_ITERATIONS};

/// Application-level constants
pub const APP_NAME: &str = "HealthHub";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DB_PATH_VAR: &str = "HEALTHHUB_DB_PATH";
pub const PBKDF2_ITERATIONS_VAR: &str = "HEALTHHUB_PBKDF2_ITERATIONS";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Cannot determine home directory")]
    NoHomeDir,
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Get the application data directory
/// ~/HealthHub/ on all platforms
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(APP_NAME))
}

/// Default database file inside the data directory
pub fn database_path() -> Result<PathBuf, ConfigError> {
    Ok(app_data_dir()?.join("healthhub.db"))
}

/// Used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "healthhub=debug,info"
    } else {
        "healthhub=info,warn"
    }
}

/// Runtime settings resolved from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub db_path: PathBuf,
    pub pbkdf2_iterations: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "Ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path = match lookup(DB_PATH_VAR).filter(|v| !v.trim().is_empty()) {
            Some(path) => PathBuf::from(path.trim()),
            None => database_path()?,
        };

        let pbkdf2_iterations = match lookup(PBKDF2_ITERATIONS_VAR) {
            None => PBKDF2_ITERATIONS,
            Some(raw) => {
                let invalid = |reason: String| ConfigError::InvalidValue {
                    key: PBKDF2_ITERATIONS_VAR,
                    value: raw.clone(),
                    reason,
                };
                let parsed: u32 = raw.trim().parse().map_err(|e| invalid(format!("{e}")))?;
                if parsed < MIN_ITERATIONS {
                    return Err(invalid(format!("minimum is {MIN_ITERATIONS}")));
                }
                parsed
            }
        };

        Ok(Self {
            db_path,
            pbkdf2_iterations,
        })
    }
}
