//! Whole-file loading and sheet output.
//!
//! The processing pipeline streams its input through the execution engine;
//! the loaders here read an extract in one piece for the standalone
//! validator and for tests, and dump a sheet mapping to CSV files.
//!
//! # Example
//!
//! ```no_run
//! use veloverify::config::EncodingPreference;
//! use veloverify::io::loaders::DatasetLoader;
//! use std::path::Path;
//!
//! let result = DatasetLoader::load_from_file(Path::new("export.csv"), EncodingPreference::Auto)
//!     .expect("Failed to load");
//! println!("Loaded {} rows", result.num_rows);
//! ```

pub mod loaders;

#[cfg(test)]
mod loaders_tests;

pub use loaders::{dump_sheets_csv, DatasetLoadResult, DatasetLoader};
