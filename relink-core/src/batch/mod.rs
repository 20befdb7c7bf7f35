//! Generic batch execution

mod processor;

pub use processor::{BatchJob, BatchProcessor, BatchProgress};
