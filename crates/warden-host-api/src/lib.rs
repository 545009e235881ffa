//! Host side-effect interfaces for wardend
//!
//! The engine decides; the host acts. Everything wardend does to the
//! outside world goes through [`SessionHost`], so enforcement logic can be
//! tested against [`MockHost`] without a desktop present.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;

use thiserror::Error;

/// Host adapter errors
#[derive(Debug, Error)]
pub enum HostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Host facility unavailable: {0}")]
    Unavailable(String),
}

pub type HostResult<T> = Result<T, HostError>;
