use chrono::Local;
use polars::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::core::domain::{fields, sheets, ProcessingStats, SheetMapping};
use crate::error::PipelineResult;
use crate::execution::engine::{EngineOutput, ExecutionEngine};
use crate::execution::memory::{MemoryProbe, SystemMemoryProbe};
use crate::execution::strategy::ExecutionStrategy;
use crate::preprocessing::progress::{ProgressEvent, ProgressReporter};
use crate::transformations::cleaning::deduplicate;
use crate::transformations::grouping::group_by_weeks;

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub sheets: SheetMapping,
    pub stats: ProcessingStats,
    pub performance: PerformanceReport,
}

/// Resource figures and settings of one run, logged at the end.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub strategy: String,
    pub optimization_level: String,
    pub chunks_processed: usize,
    pub spilled_chunks: usize,
    pub memory_pressure_events: usize,
    pub peak_memory_mb: f64,
    pub duration_seconds: f64,
    pub file_size_mb: f64,
    pub system: SystemInfo,
    pub configuration: ConfigurationInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub cpu_count: usize,
    pub total_memory_gb: f64,
    pub available_memory_gb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationInfo {
    pub chunk_size: usize,
    pub parallel_processing: bool,
    pub memory_optimization: bool,
    pub max_workers: usize,
    pub quality_control_level: String,
    pub duplicate_detection_method: String,
    pub debug_mode: bool,
}

/// End-to-end processing of one extract into a [`SheetMapping`].
///
/// The execution engine runs the chunk-local stages (business filter and QC
/// partition); deduplication and weekly grouping then run once over the
/// merged clean rows.
pub struct ProcessingPipeline {
    config: PipelineConfig,
    progress: ProgressReporter,
    probe: Arc<dyn MemoryProbe>,
    strategy: Option<ExecutionStrategy>,
}

impl ProcessingPipeline {
    /// Create a pipeline sampling real system memory
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            progress: ProgressReporter::silent(),
            probe: Arc::new(SystemMemoryProbe::new()),
            strategy: None,
        }
    }

    /// Send progress events to `sender`
    pub fn with_progress(mut self, sender: tokio::sync::mpsc::UnboundedSender<ProgressEvent>) -> Self {
        self.progress = ProgressReporter::new(sender);
        self
    }

    pub fn with_memory_probe(mut self, probe: Arc<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Always use `strategy` instead of choosing one from the file size
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process a delimited extract
    ///
    /// # Arguments
    /// * `path` - Path to the CSV export
    ///
    /// # Returns
    /// Sheet mapping and statistics. A failure is reported on the progress
    /// channel as `Error: <message>` at 0% before it is returned.
    pub fn process(&self, path: &Path) -> PipelineResult<PipelineOutput> {
        let started = Instant::now();
        match self.run(path, started) {
            Ok(output) => Ok(output),
            Err(e) => {
                log::error!("Error processing data: {}", e);
                self.progress.report(format!("Error: {}", e), 0.0);
                Err(e)
            }
        }
    }

    fn run(&self, path: &Path, started: Instant) -> PipelineResult<PipelineOutput> {
        self.config.ensure_valid()?;
        log::info!("Processing {}", path.display());
        if self.config.advanced.debug_mode {
            match serde_json::to_string(&self.config) {
                Ok(json) => log::info!("Effective configuration: {}", json),
                Err(e) => log::warn!("Could not serialize configuration: {}", e),
            }
        }

        // Step 1: Chunk-local stages
        let mut engine = ExecutionEngine::new(self.config.clone(), Arc::clone(&self.probe))
            .with_progress(self.progress.clone());
        if let Some(strategy) = self.strategy {
            engine = engine.with_strategy(strategy);
        }
        let output = engine.run(path)?;

        let mut stats = ProcessingStats::default();
        record_engine_stats(&mut stats, &output);
        stats.quality_control_level = Some(
            self.config
                .data_validation
                .quality_control_level
                .as_str()
                .to_string(),
        );

        // Step 2: Quality control summary
        self.progress.report("Performing quality control checks...", 40.0);
        let [clean, no_key_field, field_author_mismatch, date_parse_error] = output.qc.into_frames();
        stats.no_pole_allocated = no_key_field.height();
        stats.agent_data_mismatches = field_author_mismatch.height();
        stats.date_parse_errors = date_parse_error.height();
        stats.clean_records = clean.height();
        log::info!(
            "Quality control: {} clean, {} without pole number, {} agent mismatches, {} date parse errors",
            stats.clean_records,
            stats.no_pole_allocated,
            stats.agent_data_mismatches,
            stats.date_parse_errors
        );
        if self.config.advanced.debug_mode {
            log::info!(
                "Chunks: {} processed, {} spilled, {} memory pressure events",
                stats.chunks_processed,
                stats.spilled_chunks,
                stats.memory_pressure_events
            );
        }

        // Step 3: Deduplication
        self.progress.report("Removing duplicates...", 60.0);
        let dedup = deduplicate(
            &clean,
            &[fields::POLE_NUMBER],
            self.config.data_validation.duplicate_detection_method,
        )?;
        stats.unique_poles = dedup.unique.height();
        stats.duplicates_removed = dedup.duplicates.height();
        log::info!(
            "Removed {} duplicates, {} unique poles remain",
            stats.duplicates_removed,
            stats.unique_poles
        );

        // Step 4: Weekly grouping
        self.progress.report("Grouping by weeks...", 75.0);
        let cohorts = group_by_weeks(&dedup.unique)?;
        stats.weekly_sheets = cohorts.len();

        // Step 5: Sheet mapping
        self.progress.report("Preparing sheets...", 90.0);
        let mut mapping = SheetMapping::new();
        for cohort in cohorts {
            mapping.insert(cohort.sheet_name(), cohort.data);
        }

        if self.config.export.include_qc_sheets {
            let qc_sheets = [
                (sheets::DUPLICATES, dedup.duplicates),
                (sheets::NO_KEY_FIELD, no_key_field),
                (sheets::FIELD_AUTHOR_MISMATCH, field_author_mismatch),
                (sheets::DATE_PARSE_ERROR, date_parse_error),
            ];
            for (name, data) in qc_sheets {
                if data.height() > 0 {
                    mapping.insert(name, data);
                }
            }
        }

        stats.duration_seconds = started.elapsed().as_secs_f64();
        if self.config.export.include_summary_sheet {
            mapping.insert(sheets::SUMMARY, summary_frame(&stats)?);
        }

        let performance =
            self.performance_report(&stats, output.file_size_bytes, output.available_bytes);
        match serde_json::to_string(&performance) {
            Ok(json) => log::info!("Performance statistics: {}", json),
            Err(e) => log::debug!("Could not serialize performance statistics: {}", e),
        }

        self.progress.report("Processing complete!", 100.0);
        log::info!(
            "Processing complete: {} sheets in {:.2}s",
            mapping.len(),
            stats.duration_seconds
        );

        Ok(PipelineOutput {
            sheets: mapping,
            stats,
            performance,
        })
    }

    fn performance_report(
        &self,
        stats: &ProcessingStats,
        file_size_bytes: u64,
        available_bytes: u64,
    ) -> PerformanceReport {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        PerformanceReport {
            strategy: stats.strategy.clone().unwrap_or_default(),
            optimization_level: stats.optimization_level.clone().unwrap_or_default(),
            chunks_processed: stats.chunks_processed,
            spilled_chunks: stats.spilled_chunks,
            memory_pressure_events: stats.memory_pressure_events,
            peak_memory_mb: stats.peak_memory_mb,
            duration_seconds: stats.duration_seconds,
            file_size_mb: file_size_bytes as f64 / 1024.0 / 1024.0,
            system: SystemInfo {
                cpu_count,
                total_memory_gb: to_gb(self.probe.total_bytes()),
                available_memory_gb: to_gb(available_bytes),
            },
            configuration: ConfigurationInfo {
                chunk_size: self.config.processing.chunk_size,
                parallel_processing: self.config.advanced.parallel_processing,
                memory_optimization: self.config.advanced.memory_optimization,
                max_workers: self.config.advanced.max_worker_threads,
                quality_control_level: self
                    .config
                    .data_validation
                    .quality_control_level
                    .as_str()
                    .to_string(),
                duplicate_detection_method: self
                    .config
                    .data_validation
                    .duplicate_detection_method
                    .as_str()
                    .to_string(),
                debug_mode: self.config.advanced.debug_mode,
            },
        }
    }
}

fn record_engine_stats(stats: &mut ProcessingStats, output: &EngineOutput) {
    stats.total_input_records = output.input_rows;
    stats.pole_permission_records = output.filtered_rows;
    stats.strategy = Some(output.strategy.as_str().to_string());
    stats.optimization_level = Some(output.strategy.optimization_level().to_string());
    stats.encoding = Some(output.encoding.clone());
    stats.chunks_processed = output.chunks_processed;
    stats.spilled_chunks = output.spilled_chunks;
    stats.memory_pressure_events = output.memory_pressure_events;
    stats.observe_memory(output.peak_process_bytes);
}

/// Two-column `Metric`/`Value` frame closing the sheet mapping.
fn summary_frame(stats: &ProcessingStats) -> PipelineResult<DataFrame> {
    let mut rows = stats.summary_rows();
    rows.push((
        "Processing Timestamp".to_string(),
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    ));
    let (metrics, values): (Vec<String>, Vec<String>) = rows.into_iter().unzip();
    Ok(df!("Metric" => metrics, "Value" => values)?)
}

fn to_gb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0 / 1024.0
}
