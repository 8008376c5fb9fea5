pub mod enums;
pub mod filters;
pub mod user;
pub mod patient;
pub mod clinic;
pub mod service;
pub mod insurance;
pub mod booking;
pub mod review;
pub mod views;

pub use enums::*;
pub use filters::*;
pub use user::*;
pub use patient::*;
pub use clinic::*;
pub use service::*;
pub use insurance::*;
pub use booking::*;
pub use review::*;
pub use views::*;
