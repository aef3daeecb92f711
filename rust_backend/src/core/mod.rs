//! Core domain models for pole permission processing.
//!
//! This module defines the field names, sheet names, business key, sheet
//! mapping and statistics shared by every stage, plus the column alias table.

pub mod domain;
pub mod schema;
