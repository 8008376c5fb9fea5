pub mod api; // HTTP error mapping for the transport layer
pub mod authorization;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod error;
pub mod identity;
pub mod insurance;
pub mod models;
pub mod patients;
pub mod review;
pub mod validation;


pub use core_state::CoreState;
pub use error::ClinicError;
pub use identity::Identity;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` overrides the default
/// filter. Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
