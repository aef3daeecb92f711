//! Pole permission verification pipeline.
//!
//! Reads field-work extracts of any size, keeps the rows tagged with an
//! approved pole permission, partitions them by data quality, removes
//! duplicate poles and groups the survivors into week-ending cohorts.
//!
//! # Modules
//!
//! - [`config`]: TOML configuration and its validation
//! - [`core`]: field names, sheet mapping and run statistics
//! - [`execution`]: strategy selection, chunk dispatch, spilling and memory sampling
//! - [`io`]: whole-file loading and sheet output
//! - [`parsing`]: encoding detection and chunked CSV reading
//! - [`preprocessing`]: the end-to-end pipeline, progress and validation report
//! - [`time`]: timestamp parsing and week-ending arithmetic
//! - [`transformations`]: filtering, quality control, dedup and weekly grouping

pub mod config;
pub mod core;
pub mod error;
pub mod execution;
pub mod io;
pub mod parsing;
pub mod preprocessing;
pub mod time;
pub mod transformations;

#[cfg(test)]
mod test_fixtures;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use preprocessing::{PipelineOutput, ProcessingPipeline};
