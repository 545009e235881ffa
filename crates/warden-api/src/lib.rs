//! Protocol types for wardend IPC
//!
//! Everything a client and the daemon exchange over the control socket:
//! command requests and responses, lifecycle signals, broadcast events,
//! and the status view types returned by queries.

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Protocol version, bumped on incompatible changes
pub const API_VERSION: u32 = 1;
