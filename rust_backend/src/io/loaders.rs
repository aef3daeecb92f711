use anyhow::{Context, Result};
use polars::prelude::*;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::config::EncodingPreference;
use crate::core::domain::SheetMapping;
use crate::parsing::csv_parser::{check_required_fields, empty_frame, ChunkReader};
use crate::parsing::encoding::{decode_file, DecodeTarget};

/// Longest sheet name spreadsheet writers accept.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Text written for a sheet without rows.
pub const NO_DATA_PLACEHOLDER: &str = "No data available";

/// Result of loading an extract
#[derive(Debug)]
pub struct DatasetLoadResult {
    pub dataframe: DataFrame,
    pub encoding: String,
    pub num_rows: usize,
}

impl DatasetLoadResult {
    pub fn new(dataframe: DataFrame, encoding: impl Into<String>) -> Self {
        let num_rows = dataframe.height();
        Self {
            dataframe,
            encoding: encoding.into(),
            num_rows,
        }
    }
}

/// Loads a whole extract into one `DataFrame` of `String` columns
pub struct DatasetLoader;

impl DatasetLoader {
    /// Load an extract, detecting the format from the extension
    pub fn load_from_file(path: &Path, preference: EncodingPreference) -> Result<DatasetLoadResult> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .context("File has no extension")?;

        match extension.to_lowercase().as_str() {
            "csv" | "txt" => Self::load_from_csv(path, preference),
            _ => anyhow::bail!("Unsupported file format: {}", extension),
        }
    }

    /// Load a delimited file through the encoding fallback chain
    pub fn load_from_csv(path: &Path, preference: EncodingPreference) -> Result<DatasetLoadResult> {
        let decoded = decode_file(path, preference, DecodeTarget::Memory)
            .with_context(|| format!("Failed to decode {}", path.display()))?;
        let mut reader =
            ChunkReader::new(decoded.open()?, usize::MAX).context("Failed to read CSV header")?;

        let df = match reader.next_chunk().context("Failed to parse CSV file")? {
            Some(df) => df,
            None => empty_frame(reader.headers())?,
        };
        log::info!(
            "Loaded {} records from {} ({})",
            df.height(),
            path.display(),
            decoded.encoding_name()
        );

        Ok(DatasetLoadResult::new(df, decoded.encoding_name()))
    }

    /// Load a delimited file and require every field the pipeline needs
    pub fn load_checked(path: &Path, preference: EncodingPreference) -> Result<DatasetLoadResult> {
        let result = Self::load_from_csv(path, preference)?;
        let headers: Vec<String> = result
            .dataframe
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();
        check_required_fields(&headers)?;
        Ok(result)
    }
}

/// Sheet name cut to [`MAX_SHEET_NAME_LEN`] characters.
pub fn sheet_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '[' | ']' => '_',
            other => other,
        })
        .take(MAX_SHEET_NAME_LEN)
        .collect()
}

/// Write every sheet to `<dir>/<sheet>.csv`, creating `dir` if needed.
///
/// A sheet without rows is written as a one-cell placeholder.
pub fn dump_sheets_csv(mapping: &SheetMapping, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(mapping.len());
    for sheet in mapping.iter() {
        let path = dir.join(format!("{}.csv", sheet_file_stem(&sheet.name)));
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        let mut data = if sheet.data.height() == 0 {
            df!("Message" => [NO_DATA_PLACEHOLDER])?
        } else {
            sheet.data.clone()
        };
        CsvWriter::new(BufWriter::new(file))
            .include_header(true)
            .finish(&mut data)
            .with_context(|| format!("Failed to write sheet {}", sheet.name))?;

        log::debug!("Wrote sheet {} to {}", sheet.name, path.display());
        written.push(path);
    }

    Ok(written)
}
