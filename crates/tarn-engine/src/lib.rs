//! Query surface for TarnDB.
//!
//! This crate provides:
//! - The predicate model for parsed select statements
//! - An index-aware selection planner
//! - A bulk loader for `<key> , <value>` record files
//!
//! Statements arrive pre-parsed; lexing and grammar live outside this
//! workspace.

pub mod load;
pub mod planner;
pub mod predicate;

pub use load::{load, parse_load_line};
pub use planner::SelectPlanner;
pub use predicate::{fold_key_range, matches_all, Attr, CompOp, Condition, KeyRange, Projection};
