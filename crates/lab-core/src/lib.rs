//! Shared data types and contracts for the experiment harness.

mod algorithm;
mod cancel;
mod error;
mod grid;
mod record;

pub use algorithm::{validate_algorithms, AlgorithmDescriptor};
pub use cancel::{CancellationState, CancellationToken};
pub use error::LabError;
pub use grid::{ParameterGrid, Scalar, Slot};
pub use record::{
    record_key, result_reader, result_writer, RecordKey, RunRecord, ALGORITHM_COL, INSTANCE_COL,
    RESULT_DELIMITER, SOURCE_COL, TIMEOUT_COL,
};

use std::path::Path;

/// Creates `path` and any missing parents.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}
