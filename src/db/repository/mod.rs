//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`, one sub-module per table
//! family. Everything public is re-exported here.

mod booking;
mod cascade;
mod clinic;
mod clinic_service;
mod insurance;
mod patient;
mod review;
mod service;
mod session;
mod user;

pub use booking::*;
pub use cascade::*;
pub use clinic::*;
pub use clinic_service::*;
pub use insurance::*;
pub use patient::*;
pub use review::*;
pub use service::*;
pub use session::*;
pub use user::*;
