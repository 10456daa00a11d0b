use std::path::PathBuf;

use thiserror::Error;

/// Failure categories shared by the runner and the analysis layer.
#[derive(Debug, Error)]
pub enum LabError {
    #[error("no algorithm specified")]
    NoAlgorithms,
    #[error("two algorithms have the same name `{0}'")]
    DuplicateAlgorithm(String),
    #[error(
        "no solver produced any output file ({}); please address the probable launch errors above",
        temp_file.display()
    )]
    NoOutput { temp_file: PathBuf },
    #[error("no headers found in the results file `{}'", path.display())]
    MissingHeader { path: PathBuf },
    #[error("column {index} is out of range; the results file has {available} columns")]
    MissingColumn { index: usize, available: usize },
    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
