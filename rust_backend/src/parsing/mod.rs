//! Readers for raw field-work extracts.
//!
//! - [`encoding`]: detect the byte encoding and decode to UTF-8 with fallbacks
//! - [`csv_parser`]: stream decoded text into `DataFrame` chunks and guard the schema
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use veloverify::config::EncodingPreference;
//! use veloverify::parsing::csv_parser::ChunkReader;
//! use veloverify::parsing::encoding::{decode_file, DecodeTarget};
//!
//! let decoded = decode_file(Path::new("extract.csv"), EncodingPreference::Auto, DecodeTarget::Memory)
//!     .expect("Failed to decode extract");
//! let mut chunks = ChunkReader::new(decoded.open().unwrap(), 10_000).unwrap();
//! while let Some(chunk) = chunks.next_chunk().unwrap() {
//!     println!("{} rows", chunk.height());
//! }
//! ```

pub mod csv_parser;
pub mod encoding;

#[cfg(test)]
mod csv_parser_tests;

pub use csv_parser::{check_required_fields, ChunkReader};
pub use encoding::{decode_file, DecodeTarget, DecodedInput};
