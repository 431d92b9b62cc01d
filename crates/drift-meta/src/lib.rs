//! Migration metadata lifecycle for the drift migration planner.
//!
//! A planned migration carries a metadata record that moves through
//! pending -> tested -> promoted. This crate owns the record layout, its
//! validation rules, typed partial updates, and the status machine.

pub mod error;
pub mod lifecycle;
pub mod patch;
pub mod record;
pub mod validate;
