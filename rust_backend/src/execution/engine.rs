use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::execution::memory::{MemoryMonitor, MemoryProbe};
use crate::execution::spill::{SpillDir, SpilledFrame, SPILL_THRESHOLD_ROWS};
use crate::execution::strategy::{select_strategy, EngineState, ExecutionStrategy, StateMachine};
use crate::parsing::csv_parser::{check_required_fields, ChunkReader};
use crate::parsing::encoding::{decode_file, DecodeTarget};
use crate::preprocessing::progress::ProgressReporter;
use crate::transformations::cleaning::{qc_partition, QcCategory, QcResult};
use crate::transformations::filtering::filter_target_rows;

/// Result of the chunk-local stages for one chunk.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub index: usize,
    pub input_rows: usize,
    pub filtered_rows: usize,
    pub qc: QcResult,
}

/// Business filter followed by the QC partition. Pure function of the chunk.
pub fn process_chunk(index: usize, chunk: DataFrame) -> PipelineResult<ChunkOutcome> {
    let input_rows = chunk.height();
    let run = || -> PipelineResult<ChunkOutcome> {
        let filtered = filter_target_rows(&chunk)?;
        let qc = qc_partition(&filtered)?;
        Ok(ChunkOutcome {
            index,
            input_rows,
            filtered_rows: filtered.height(),
            qc,
        })
    };
    run().map_err(|e| PipelineError::execution(format!("chunk {}", index + 1), e.to_string()))
}

/// Apply `f` to every item, on a pool of `workers` threads when `parallel` is set.
///
/// Results come back in submission order whatever order the workers finish
/// in. The first error aborts the remaining work and is returned.
pub fn dispatch<T, R, F>(items: Vec<T>, workers: usize, parallel: bool, f: F) -> PipelineResult<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> PipelineResult<R> + Sync + Send,
{
    if !parallel || items.len() <= 1 || workers <= 1 {
        return items.into_iter().map(f).collect();
    }

    let threads = workers.min(items.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("veloverify-worker-{}", i))
        .build()
        .map_err(|e| PipelineError::execution("worker pool", e.to_string()))?;

    log::info!("Processing {} chunks with {} workers", items.len(), threads);
    pool.install(|| items.into_par_iter().map(f).collect())
}

/// Append frames to `base` in iteration order.
pub fn merge_frames<I>(base: &mut DataFrame, frames: I) -> PipelineResult<()>
where
    I: IntoIterator<Item = DataFrame>,
{
    for frame in frames {
        base.vstack_mut(&frame)?;
    }
    Ok(())
}

enum HeldChunk {
    Memory(ChunkOutcome),
    Spilled(Vec<SpilledFrame>),
}

impl HeldChunk {
    fn frames_mut(&mut self) -> Vec<&mut DataFrame> {
        match self {
            HeldChunk::Memory(outcome) => vec![
                &mut outcome.qc.clean,
                &mut outcome.qc.no_key_field,
                &mut outcome.qc.field_author_mismatch,
                &mut outcome.qc.date_parse_error,
            ],
            HeldChunk::Spilled(_) => Vec::new(),
        }
    }

    /// Frames in [`QcCategory::ALL`] order, reading spilled ones back.
    fn into_frames(self) -> PipelineResult<Vec<DataFrame>> {
        match self {
            HeldChunk::Memory(outcome) => Ok(outcome.qc.into_frames().into()),
            HeldChunk::Spilled(frames) => frames.iter().map(SpilledFrame::load).collect(),
        }
    }
}

/// Everything the engine hands to the row-order-sensitive stages.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    /// Merged QC partition of all target rows, in input order.
    pub qc: QcResult,
    pub headers: Vec<String>,
    pub strategy: ExecutionStrategy,
    pub encoding: String,
    pub file_size_bytes: u64,
    pub available_bytes: u64,
    pub input_rows: usize,
    pub filtered_rows: usize,
    pub chunks_processed: usize,
    pub spilled_chunks: usize,
    pub memory_pressure_events: usize,
    pub peak_process_bytes: u64,
}

#[derive(Default)]
struct RunCounters {
    chunks: usize,
    spilled: usize,
    pressure_events: usize,
    peak_bytes: u64,
}

/// Adaptive execution engine.
///
/// Chooses a strategy from file size and available memory, reads the input
/// in chunks, runs the chunk-local stages and merges the results in chunk
/// order.
pub struct ExecutionEngine {
    config: PipelineConfig,
    monitor: MemoryMonitor,
    progress: ProgressReporter,
    machine: StateMachine,
    forced_strategy: Option<ExecutionStrategy>,
}

impl ExecutionEngine {
    pub fn new(config: PipelineConfig, probe: Arc<dyn MemoryProbe>) -> Self {
        let monitor = MemoryMonitor::new(probe, config.advanced.memory_optimization);
        Self {
            config,
            monitor,
            progress: ProgressReporter::silent(),
            machine: StateMachine::new(),
            forced_strategy: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Skip strategy selection and always use `strategy`.
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.forced_strategy = Some(strategy);
        self
    }

    pub fn state(&self) -> &EngineState {
        self.machine.state()
    }

    pub fn history(&self) -> &[EngineState] {
        self.machine.history()
    }

    /// Strategy the engine would pick for `path` right now.
    pub fn analyze(&self, path: &Path) -> PipelineResult<(ExecutionStrategy, u64, u64)> {
        let file_size = fs::metadata(path)
            .map_err(|e| PipelineError::io(path, e))?
            .len();
        let available = self.monitor.probe().available_bytes();
        let strategy = self
            .forced_strategy
            .unwrap_or_else(|| select_strategy(file_size, available));
        Ok((strategy, file_size, available))
    }

    /// Run the chunk-local stages over `path`.
    ///
    /// Any failure moves the engine to `Failed` and removes the temporary
    /// files of the run before the error is returned.
    pub fn run(&mut self, path: &Path) -> PipelineResult<EngineOutput> {
        match self.run_inner(path) {
            Ok(output) => Ok(output),
            Err(e) => {
                log::error!("Error in large file processing: {}", e);
                self.machine.fail(e.to_string());
                Err(e)
            }
        }
    }

    fn run_inner(&mut self, path: &Path) -> PipelineResult<EngineOutput> {
        self.machine.begin_analysis()?;
        self.progress.report("Analyzing input", 5.0);

        let (strategy, file_size, available) = self.analyze(path)?;
        log::info!(
            "File: {:.1}MB, Available Memory: {:.1}MB",
            to_mb(file_size),
            to_mb(available)
        );
        log::info!("Selected strategy: {}", strategy);
        self.machine.run_with(strategy)?;

        let spill_dir = match strategy {
            ExecutionStrategy::DiskBased => {
                Some(SpillDir::create(!self.config.advanced.temp_file_cleanup)?)
            }
            _ => None,
        };
        let target = match &spill_dir {
            Some(dir) => DecodeTarget::Spool(dir.path()),
            None => DecodeTarget::Memory,
        };

        self.progress.report("Loading CSV data...", 10.0);
        let preference = self.config.encoding_preference()?;
        let decoded = decode_file(path, preference, target)?;

        let mut reader = ChunkReader::new(decoded.open()?, self.chunk_size(strategy))?;
        self.progress.report("Validating columns...", 15.0);
        check_required_fields(reader.headers())?;
        log::info!("All required columns present");
        let headers = reader.headers().to_vec();

        let mut counters = RunCounters::default();
        let held = match (&spill_dir, strategy) {
            (Some(dir), ExecutionStrategy::DiskBased) => {
                self.run_disk_based(&mut reader, dir, &mut counters)?
            }
            _ => self.run_in_memory(&mut reader, strategy, &mut counters)?,
        };
        let input_rows = reader.rows_read();
        log::info!("Loaded {} records", input_rows);

        self.machine.begin_merge()?;
        self.progress.report("Merging results", 38.0);
        let qc = self.merge(held, &headers)?;
        self.sample_memory(&mut counters, std::iter::empty());
        self.machine.complete()?;

        let filtered_rows = qc.classified_rows();
        log::info!("Filtered to {} pole permission records", filtered_rows);

        Ok(EngineOutput {
            qc,
            headers,
            strategy,
            encoding: decoded.encoding_name().to_string(),
            file_size_bytes: file_size,
            available_bytes: available,
            input_rows,
            filtered_rows,
            chunks_processed: counters.chunks,
            spilled_chunks: counters.spilled,
            memory_pressure_events: counters.pressure_events,
            peak_process_bytes: counters.peak_bytes,
        })
    }

    fn chunk_size(&self, strategy: ExecutionStrategy) -> usize {
        let configured = self.config.processing.chunk_size.max(1);
        match strategy {
            ExecutionStrategy::MemoryEfficient => usize::MAX,
            ExecutionStrategy::ChunkedParallel => configured,
            ExecutionStrategy::DiskBased => (configured / 2).max(1),
        }
    }

    fn run_in_memory<R: std::io::Read>(
        &self,
        reader: &mut ChunkReader<R>,
        strategy: ExecutionStrategy,
        counters: &mut RunCounters,
    ) -> PipelineResult<Vec<HeldChunk>> {
        let mut chunks: Vec<(usize, DataFrame)> = Vec::new();
        while let Some(chunk) = reader.next_chunk()? {
            log::debug!("Read chunk {}: {} rows", chunks.len() + 1, chunk.height());
            chunks.push((chunks.len(), chunk));
            self.sample_memory(counters, chunks.iter_mut().map(|(_, df)| df));
        }
        counters.chunks = chunks.len();

        self.progress.report("Filtering pole permissions...", 25.0);
        let parallel =
            strategy == ExecutionStrategy::ChunkedParallel && self.config.advanced.parallel_processing;
        let outcomes = dispatch(
            chunks,
            self.config.advanced.max_worker_threads,
            parallel,
            |(index, chunk)| process_chunk(index, chunk),
        )?;

        let mut held: Vec<HeldChunk> = outcomes.into_iter().map(HeldChunk::Memory).collect();
        self.sample_memory(counters, held.iter_mut().flat_map(HeldChunk::frames_mut));
        Ok(held)
    }

    fn run_disk_based<R: std::io::Read>(
        &self,
        reader: &mut ChunkReader<R>,
        dir: &SpillDir,
        counters: &mut RunCounters,
    ) -> PipelineResult<Vec<HeldChunk>> {
        self.progress.report("Processing with disk-based approach", 20.0);
        let mut held = Vec::new();

        while let Some(chunk) = reader.next_chunk()? {
            let index = held.len();
            self.progress.report(
                format!("Processing chunk {}", index + 1),
                (25.0 + index as f64 * 0.5).min(35.0),
            );

            let outcome = process_chunk(index, chunk)?;
            if outcome.filtered_rows > SPILL_THRESHOLD_ROWS {
                let frames = QcCategory::ALL
                    .into_iter()
                    .zip(outcome.qc.into_frames())
                    .map(|(category, df)| dir.spill(index, category.as_str(), df))
                    .collect::<PipelineResult<Vec<_>>>()?;
                held.push(HeldChunk::Spilled(frames));
                counters.spilled += 1;
            } else {
                held.push(HeldChunk::Memory(outcome));
            }

            self.sample_memory(counters, held.iter_mut().flat_map(HeldChunk::frames_mut));
        }

        counters.chunks = held.len();
        self.progress.report("Combining results", 36.0);
        Ok(held)
    }

    fn merge(&self, held: Vec<HeldChunk>, headers: &[String]) -> PipelineResult<QcResult> {
        log::info!("Merging {} processed chunks", held.len());
        let mut merged = QcResult::empty(headers)?;

        for chunk in held {
            for (category, frame) in QcCategory::ALL.into_iter().zip(chunk.into_frames()?) {
                merge_frames(merged.frame_mut(category), [frame])?;
            }
        }

        if self.config.advanced.memory_optimization {
            for category in QcCategory::ALL {
                let frame = merged.frame_mut(category);
                frame.as_single_chunk_par();
                frame.shrink_to_fit();
            }
        }

        log::info!("Merged result: {} records", merged.classified_rows());
        Ok(merged)
    }

    /// Sample memory, track the peak, and under pressure shrink the given frames.
    fn sample_memory<'a>(
        &self,
        counters: &mut RunCounters,
        frames: impl Iterator<Item = &'a mut DataFrame>,
    ) {
        let sample = self.monitor.sample();
        counters.peak_bytes = counters.peak_bytes.max(sample.process_bytes);

        if self.monitor.under_pressure(&sample) {
            log::warn!(
                "High memory usage detected: {:.1}% of system memory, process at {:.1}MB",
                sample.system_percent,
                sample.process_mb()
            );
            counters.pressure_events += 1;
            for frame in frames {
                frame.shrink_to_fit();
            }
        }
    }
}

fn to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}
