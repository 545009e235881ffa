//! Policy evaluator and enforcement engine for wardend
//!
//! `eval` holds the pure decision functions; `engine` is the periodic
//! orchestrator that turns their answers into lock and notify side
//! effects through a [`warden_host_api::SessionHost`].

pub mod eval;

mod engine;

pub use engine::*;
