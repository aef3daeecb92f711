use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{PipelineError, PipelineResult};

/// Loaded-frame size relative to the file on disk.
pub const MEMORY_FACTOR: u64 = 4;

/// How the engine walks the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    /// Whole file in one pass.
    MemoryEfficient,
    /// Fixed-size chunks processed on a worker pool.
    ChunkedParallel,
    /// Half-size chunks processed in turn, large results spilled to disk.
    DiskBased,
}

impl ExecutionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStrategy::MemoryEfficient => "memory_efficient",
            ExecutionStrategy::ChunkedParallel => "chunked_processing",
            ExecutionStrategy::DiskBased => "disk_based_processing",
        }
    }

    pub fn optimization_level(&self) -> &'static str {
        match self {
            ExecutionStrategy::MemoryEfficient => "standard",
            ExecutionStrategy::ChunkedParallel => "chunked",
            ExecutionStrategy::DiskBased => "aggressive",
        }
    }

    fn state(&self) -> EngineState {
        match self {
            ExecutionStrategy::MemoryEfficient => EngineState::MemoryEfficient,
            ExecutionStrategy::ChunkedParallel => EngineState::ChunkedParallel,
            ExecutionStrategy::DiskBased => EngineState::DiskBased,
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "memory_efficient" => Ok(ExecutionStrategy::MemoryEfficient),
            "chunked" | "chunked_processing" => Ok(ExecutionStrategy::ChunkedParallel),
            "disk" | "disk_based_processing" => Ok(ExecutionStrategy::DiskBased),
            other => Err(format!(
                "Unknown strategy: {}. Use 'memory', 'chunked' or 'disk'",
                other
            )),
        }
    }
}

/// Estimated resident size of a file once loaded.
/// Saturates at `u64::MAX`.
pub fn estimate_memory(file_size_bytes: u64) -> u64 {
    file_size_bytes.saturating_mul(MEMORY_FACTOR)
}

/// Pick a strategy from file size and available memory.
///
/// Below half of the available memory the file is processed in one pass,
/// below 80% in parallel chunks, otherwise from disk.
pub fn select_strategy(file_size_bytes: u64, available_bytes: u64) -> ExecutionStrategy {
    let estimated = u128::from(estimate_memory(file_size_bytes)) * 10;
    let available = u128::from(available_bytes);

    if estimated < available * 5 {
        ExecutionStrategy::MemoryEfficient
    } else if estimated < available * 8 {
        ExecutionStrategy::ChunkedParallel
    } else {
        ExecutionStrategy::DiskBased
    }
}

/// Lifecycle of one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Analyzing,
    MemoryEfficient,
    ChunkedParallel,
    DiskBased,
    Merging,
    Complete,
    Failed(String),
}

impl EngineState {
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Analyzing => "analyzing",
            EngineState::MemoryEfficient => "memory_efficient",
            EngineState::ChunkedParallel => "chunked_parallel",
            EngineState::DiskBased => "disk_based",
            EngineState::Merging => "merging",
            EngineState::Complete => "complete",
            EngineState::Failed(_) => "failed",
        }
    }

    fn is_running(&self) -> bool {
        matches!(
            self,
            EngineState::MemoryEfficient | EngineState::ChunkedParallel | EngineState::DiskBased
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Complete | EngineState::Failed(_))
    }
}

/// Engine state with the path taken to reach it.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: EngineState,
    history: Vec<EngineState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            state: EngineState::Idle,
            history: vec![EngineState::Idle],
        }
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Every state visited, oldest first, including the current one.
    pub fn history(&self) -> &[EngineState] {
        &self.history
    }

    pub fn begin_analysis(&mut self) -> PipelineResult<()> {
        self.transition(EngineState::Analyzing)
    }

    pub fn run_with(&mut self, strategy: ExecutionStrategy) -> PipelineResult<()> {
        self.transition(strategy.state())
    }

    pub fn begin_merge(&mut self) -> PipelineResult<()> {
        self.transition(EngineState::Merging)
    }

    pub fn complete(&mut self) -> PipelineResult<()> {
        self.transition(EngineState::Complete)
    }

    /// Enter `Failed`. Allowed from any non-terminal state.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.state.is_terminal() {
            self.enter(EngineState::Failed(reason.into()));
        }
    }

    fn transition(&mut self, next: EngineState) -> PipelineResult<()> {
        let allowed = match (&self.state, &next) {
            (EngineState::Idle, EngineState::Analyzing) => true,
            (EngineState::Analyzing, n) => n.is_running(),
            (s, EngineState::Merging) => s.is_running(),
            (EngineState::Merging, EngineState::Complete) => true,
            _ => false,
        };

        if !allowed {
            return Err(PipelineError::execution(
                "state machine",
                format!(
                    "illegal transition {} -> {}",
                    self.state.name(),
                    next.name()
                ),
            ));
        }
        self.enter(next);
        Ok(())
    }

    fn enter(&mut self, next: EngineState) {
        log::debug!("Engine state {} -> {}", self.state.name(), next.name());
        self.history.push(next.clone());
        self.state = next;
    }
}
