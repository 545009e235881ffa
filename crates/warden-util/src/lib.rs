//! Shared utilities for wardend
//!
//! This crate provides:
//! - ID types (SessionId, ClientId)
//! - Time types (wall-clock ranges, duration parsing/formatting)
//! - Error types
//! - Default paths for the socket, state file, and config file

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
