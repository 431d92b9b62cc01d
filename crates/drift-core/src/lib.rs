//! Core types and diff engine for the drift migration planner.
//!
//! This crate contains the schema snapshot model, the migration operation
//! value type, the host ports the core consumes, and the diff engine that
//! turns two snapshots into an ordered operation set.

pub mod diff;
pub mod enums;
pub mod operation;
pub mod ports;
pub mod schema;
