use polars::prelude::*;
use std::collections::HashSet;
use std::io::Read;

use crate::core::domain::REQUIRED_FIELDS;
use crate::core::schema::missing_required;
use crate::error::{PipelineError, PipelineResult};

const INITIAL_CAPACITY: usize = 16 * 1024;

/// Streaming reader turning delimited UTF-8 text into fixed-size `DataFrame` chunks.
///
/// Every column is loaded as `String`; empty fields become null. Rows shorter
/// than the header are padded with nulls, surplus fields are dropped.
pub struct ChunkReader<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    chunk_size: usize,
    record: csv::StringRecord,
    rows_read: usize,
    truncated_rows: usize,
    exhausted: bool,
}

impl<R: Read> ChunkReader<R> {
    /// `chunk_size` of `usize::MAX` reads the whole input as one chunk.
    pub fn new(source: R, chunk_size: usize) -> PipelineResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let raw_headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        Ok(Self {
            reader,
            headers: unique_headers(raw_headers),
            chunk_size: chunk_size.max(1),
            record: csv::StringRecord::new(),
            rows_read: 0,
            truncated_rows: 0,
            exhausted: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows read so far.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Read the next chunk; `None` once the input is exhausted.
    pub fn next_chunk(&mut self) -> PipelineResult<Option<DataFrame>> {
        if self.exhausted {
            return Ok(None);
        }

        let width = self.headers.len();
        let capacity = self.chunk_size.min(INITIAL_CAPACITY);
        let mut columns: Vec<Vec<Option<String>>> =
            (0..width).map(|_| Vec::with_capacity(capacity)).collect();
        let mut rows = 0;

        while rows < self.chunk_size {
            if !self.reader.read_record(&mut self.record)? {
                self.exhausted = true;
                break;
            }

            if self.record.len() > width {
                self.truncated_rows += 1;
                if self.truncated_rows == 1 {
                    log::warn!(
                        "Row {} has {} fields but the header has {}; surplus fields dropped",
                        self.rows_read + 1,
                        self.record.len(),
                        width
                    );
                }
            }

            for (idx, column) in columns.iter_mut().enumerate() {
                let value = self
                    .record
                    .get(idx)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string);
                column.push(value);
            }
            rows += 1;
            self.rows_read += 1;
        }

        if rows == 0 {
            if self.truncated_rows > 1 {
                log::warn!("{} rows had surplus fields", self.truncated_rows);
            }
            return Ok(None);
        }

        build_frame(&self.headers, columns).map(Some)
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = PipelineResult<DataFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

/// Assemble a frame of `String` columns from column-major values.
pub fn build_frame(
    headers: &[String],
    columns: Vec<Vec<Option<String>>>,
) -> PipelineResult<DataFrame> {
    let columns: Vec<Column> = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name.as_str().into(), values))
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// A zero-row frame with the given `String` columns.
pub fn empty_frame(headers: &[String]) -> PipelineResult<DataFrame> {
    build_frame(headers, headers.iter().map(|_| Vec::new()).collect())
}

/// Fail with a schema error naming every required field absent from `headers`.
pub fn check_required_fields<S: AsRef<str>>(headers: &[S]) -> PipelineResult<()> {
    let missing = missing_required(headers, &REQUIRED_FIELDS);
    if missing.is_empty() {
        Ok(())
    } else {
        log::error!("Missing required columns: {:?}", missing);
        Err(PipelineError::Schema { missing })
    }
}

/// Make header names unique and non-empty: blanks become `Unnamed: <idx>`,
/// repeats get a `.1`, `.2`, ... suffix.
fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .enumerate()
        .map(|(idx, name)| {
            let base = if name.trim().is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                name
            };
            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}.{}", base, suffix);
                suffix += 1;
            }
            candidate
        })
        .collect()
}

/// Column names of a frame as owned strings.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}
