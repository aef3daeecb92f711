//! Timestamp parsing and week-ending arithmetic.

pub mod parse;
pub mod week;

pub use parse::{format_timestamp, parse_timestamp, parse_zoned, Timestamp, CANONICAL_FORMAT};
pub use week::{cohort_name, format_week_ending, week_ending_sunday, WEEK_ENDING_FORMAT};
