//! Temporary storage for processed chunks.
//!
//! Each engine run owns one [`SpillDir`], a uniquely named directory under
//! the system temp dir. Spilled frames are CSV files named after their chunk
//! index and QC category. The directory is removed on drop unless the run was
//! configured to keep its temporary files.

use polars::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::{PipelineError, PipelineResult};
use crate::parsing::csv_parser::{column_names, empty_frame};

/// Processed chunks with more rows than this are written to disk.
pub const SPILL_THRESHOLD_ROWS: usize = 1000;

/// Per-run directory holding spilled chunk results.
#[derive(Debug)]
pub struct SpillDir {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl SpillDir {
    /// Create a fresh directory. With `keep` set, files survive the run.
    pub fn create(keep: bool) -> PipelineResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("veloverify_")
            .tempdir()
            .map_err(|e| PipelineError::io(std::env::temp_dir(), e))?;
        let path = dir.path().to_path_buf();
        log::debug!("Created spill directory {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
            keep,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one frame of a chunk to disk.
    ///
    /// Empty frames are not written; only their columns are remembered.
    pub fn spill(
        &self,
        chunk_index: usize,
        category: &str,
        mut df: DataFrame,
    ) -> PipelineResult<SpilledFrame> {
        let columns = column_names(&df);
        if df.height() == 0 {
            return Ok(SpilledFrame {
                path: None,
                columns,
                rows: 0,
            });
        }

        let path = self
            .path
            .join(format!("chunk_{:06}_{}.csv", chunk_index, category));
        let file = File::create(&path).map_err(|e| PipelineError::io(&path, e))?;
        CsvWriter::new(BufWriter::new(file))
            .include_header(true)
            .finish(&mut df)?;
        log::debug!("Saved chunk to temporary file: {}", path.display());

        Ok(SpilledFrame {
            path: Some(path),
            columns,
            rows: df.height(),
        })
    }
}

impl Drop for SpillDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.keep {
            let kept = dir.keep();
            log::info!("Keeping temporary files in {}", kept.display());
        } else {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => log::debug!("Deleted temporary directory: {}", path.display()),
                Err(e) => log::warn!(
                    "Could not delete temporary directory {}: {}",
                    path.display(),
                    e
                ),
            }
        }
    }
}

/// A frame written by [`SpillDir::spill`].
#[derive(Debug, Clone)]
pub struct SpilledFrame {
    path: Option<PathBuf>,
    columns: Vec<String>,
    rows: usize,
}

impl SpilledFrame {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read the frame back with every column as `String`.
    pub fn load(&self) -> PipelineResult<DataFrame> {
        let Some(path) = &self.path else {
            return empty_frame(&self.columns);
        };

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.clone()))?
            .finish()?;

        if df.height() != self.rows {
            return Err(PipelineError::execution(
                "merge",
                format!(
                    "{} holds {} rows, expected {}",
                    path.display(),
                    df.height(),
                    self.rows
                ),
            ));
        }
        Ok(df)
    }
}
