//! Adaptive execution of the chunk-local stages.
//!
//! The engine picks one of three strategies from the input size and the
//! memory available, reads the input in chunks, runs the business filter and
//! QC partition per chunk (in parallel for the chunked strategy) and merges
//! the results back in chunk order. Large processed chunks may be spilled to
//! a per-run temporary directory under the disk-based strategy.

pub mod engine;
pub mod memory;
pub mod spill;
pub mod strategy;


pub use engine::{dispatch, merge_frames, process_chunk, ChunkOutcome, EngineOutput, ExecutionEngine};
pub use memory::{FixedMemoryProbe, MemoryMonitor, MemoryProbe, MemorySample, SystemMemoryProbe};
pub use spill::{SpillDir, SpilledFrame, SPILL_THRESHOLD_ROWS};
pub use strategy::{estimate_memory, select_strategy, EngineState, ExecutionStrategy, StateMachine};
