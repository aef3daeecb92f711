//! End-to-end processing, validation and progress reporting.
//!
//! [`ProcessingPipeline`] turns one extract into a sheet mapping;
//! [`DataValidator`] runs the rule checks on a loaded dataset independently
//! of the pipeline.

pub mod pipeline;
pub mod progress;
pub mod validator;


pub use pipeline::{PerformanceReport, PipelineOutput, ProcessingPipeline};
pub use progress::{progress_channel, ProgressEvent, ProgressReporter};
pub use validator::{DataValidator, Severity, ValidationFinding, ValidationReport, ValidationStats};
