//! Bounded-concurrency execution of independent remote operations.

pub mod batcher;

pub use batcher::{BatchTally, UnitProgress, UnitResult, UnitStatus, UploadBatcher};
