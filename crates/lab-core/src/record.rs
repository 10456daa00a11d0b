use csv::{ByteRecord, QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};

use crate::LabError;

pub const RESULT_DELIMITER: u8 = b';';

pub const ALGORITHM_COL: usize = 0;
pub const TIMEOUT_COL: usize = 1;
pub const INSTANCE_COL: usize = 2;
pub const SOURCE_COL: usize = 3;

/// Reader for result streams. Lines are split on the delimiter only: solvers
/// write raw text, so quote characters carry no meaning.
pub fn result_reader() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .delimiter(RESULT_DELIMITER)
        .has_headers(false)
        .flexible(true)
        .quoting(false);
    builder
}

/// Writer counterpart of [`result_reader`]; fields are written verbatim.
pub fn result_writer() -> WriterBuilder {
    let mut builder = WriterBuilder::new();
    builder
        .delimiter(RESULT_DELIMITER)
        .flexible(true)
        .quote_style(QuoteStyle::Never);
    builder
}

/// Reconciliation identity of a result line, compared byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordKey<'a> {
    pub algorithm: &'a [u8],
    pub instance: &'a [u8],
}

/// Returns `None` for lines too short to carry an instance identifier.
pub fn record_key(record: &ByteRecord) -> Option<RecordKey<'_>> {
    Some(RecordKey {
        algorithm: record.get(ALGORITHM_COL)?,
        instance: record.get(INSTANCE_COL)?,
    })
}

/// One parsed line of the result stream.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub algorithm: String,
    pub timed_out: bool,
    pub instance: String,
    pub source_file: String,
    /// Every column of the line, metrics included, in file order.
    pub fields: Vec<String>,
}

impl RunRecord {
    pub fn parse(record: &StringRecord) -> Result<Self, LabError> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize| {
            record
                .get(idx)
                .map(str::to_string)
                .ok_or_else(|| LabError::MalformedRecord {
                    line,
                    reason: format!(
                        "expected at least {} columns, found {}",
                        idx + 1,
                        record.len()
                    ),
                })
        };
        let flag = field(TIMEOUT_COL)?;
        let timed_out = match flag.trim() {
            "0" => false,
            "1" => true,
            other => {
                return Err(LabError::MalformedRecord {
                    line,
                    reason: format!("timeout flag must be 0 or 1, got `{}'", other),
                })
            }
        };
        Ok(RunRecord {
            algorithm: field(ALGORITHM_COL)?,
            timed_out,
            instance: field(INSTANCE_COL)?,
            source_file: field(SOURCE_COL)?,
            fields: record.iter().map(str::to_string).collect(),
        })
    }

    pub fn key(&self) -> RecordKey<'_> {
        RecordKey {
            algorithm: self.algorithm.as_bytes(),
            instance: self.instance.as_bytes(),
        }
    }

    pub fn column(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }
}
