//! Session lifecycle state machine and crash-safe state store for wardend
//!
//! This crate owns the record of who was logged in and engaged, and when:
//! - the data model (`State`, `User`, `SessionRecord`, `SegmentRecord`,
//!   `Override`)
//! - the `StateStore`: one exclusive lock, atomic JSON persistence, an
//!   mtime heartbeat, and uptime-based crash recovery
//! - the lifecycle signal handlers (login/logout/lock/unlock/sleep/wake)
//! - administrative mutations (pause/resume, overrides) and maintenance
//!   sweeps

mod admin;
mod handlers;
mod records;
mod store;

pub use admin::*;
pub use records::*;
pub use store::*;
