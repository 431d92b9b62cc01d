//! Deployment tags and production safety gates for the drift migration
//! planner.
//!
//! Pure grammar and business rules; git and process I/O stay outside the
//! core. Surrounding code observes the repository and feeds the results in.

pub mod gates;
pub mod tags;
