//! Gardener library crate
//!
//! Exposes the scan/gate/journal core so external orchestrators can drive
//! the improvement loop without going through CLI startup.

pub mod adapter;
pub mod config;
pub mod gate;
pub mod git_ops;
pub mod journal;
pub mod scanner;
