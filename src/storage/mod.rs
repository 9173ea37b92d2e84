//! # Storage Module
//!
//! Durable file access, the signed append writer and the sequence
//! counter.

pub mod file_trait;
pub mod sequence;
pub mod writer;

pub use file_trait::{DurableFile, FsStorage, OpenMode, Storage};
pub use sequence::{Allocation, CounterStore, FileCounterStore, SequenceAllocator};
pub use writer::{CommitStrategy, SignedAppendWriter, WriterState};
