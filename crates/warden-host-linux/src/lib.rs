//! Linux host adapter for wardend
//!
//! Talks to the host through `loginctl` (session locking) and `/proc`
//! (uptime for crash recovery). Notification delivery is not here: the
//! daemon broadcasts notification events over IPC and a listener inside
//! the user's session renders them.

mod adapter;
mod uptime;

pub use adapter::*;
pub use uptime::*;
