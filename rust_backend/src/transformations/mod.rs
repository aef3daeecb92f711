//! Row-level stages of the pole permission pipeline.
//!
//! # Modules
//!
//! - [`filtering`]: keep rows tagged with the approved pole permission flow
//! - [`cleaning`]: quality-control partition and duplicate removal
//! - [`grouping`]: weekly cohorts keyed by week-ending Sunday
//!
//! # Example
//!
//! ```no_run
//! use veloverify::config::DuplicatePolicy;
//! use veloverify::core::domain::fields;
//! use veloverify::transformations::{deduplicate, filter_target_rows, group_by_weeks, qc_partition};
//! use polars::prelude::*;
//!
//! # fn example(df: DataFrame) -> veloverify::error::PipelineResult<()> {
//! let filtered = filter_target_rows(&df)?;
//! let qc = qc_partition(&filtered)?;
//! let dedup = deduplicate(&qc.clean, &[fields::POLE_NUMBER], DuplicatePolicy::EarliestDate)?;
//! let cohorts = group_by_weeks(&dedup.unique)?;
//! # Ok(())
//! # }
//! ```

pub mod cleaning;
pub mod filtering;
pub mod grouping;

pub use cleaning::{deduplicate, qc_partition, row_instants, row_timestamps, DedupResult, QcResult};
pub use filtering::{contains_tag, filter_target_rows, target_mask};
pub use grouping::{group_by_weeks, WeekCohort};
