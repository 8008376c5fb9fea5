pub mod password;
pub mod token;

pub use password::*;
pub use token::*;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Stored credential is not a recognised password hash")]
    MalformedHash,

    #[error("Iteration count {0} is below the allowed minimum")]
    IterationsTooLow(u32),
}
