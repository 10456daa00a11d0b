use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::StringRecord;
use lab_core::{result_reader, LabError, RunRecord};
use tracing::warn;

use crate::stats::Sample;

/// The permanent result stream, parsed.
#[derive(Debug, Clone)]
pub struct ResultTable {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub records: Vec<RunRecord>,
}

impl ResultTable {
    /// Reads `path`; lines whose fixed columns cannot be parsed are skipped
    /// with a warning. Bytes that are not UTF-8 are replaced.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = result_reader()
            .from_path(path)
            .with_context(|| format!("failed to open results file {}", path.display()))?;
        let mut rows = reader
            .byte_records()
            .map(|row| row.map(StringRecord::from_byte_record_lossy));
        let headers: Vec<String> = match rows.next().transpose()? {
            Some(header) => header.iter().map(|h| h.trim().to_string()).collect(),
            None => Vec::new(),
        };
        if headers.len() <= 1 {
            return Err(LabError::MissingHeader {
                path: path.to_path_buf(),
            }
            .into());
        }
        let mut records = Vec::new();
        for row in rows {
            let row = row?;
            match RunRecord::parse(&row) {
                Ok(record) => records.push(record),
                Err(err) => warn!(path = %path.display(), "skipping line: {}", err),
            }
        }
        Ok(ResultTable {
            path: path.to_path_buf(),
            headers,
            records,
        })
    }

    pub fn column_name(&self, idx: usize) -> Result<&str, LabError> {
        self.headers
            .get(idx)
            .map(String::as_str)
            .ok_or(LabError::MissingColumn {
                index: idx,
                available: self.headers.len(),
            })
    }
}

/// Parses a metric cell; unparseable or missing cells become NaN.
pub fn metric_value(record: &RunRecord, col: usize) -> f64 {
    let raw = record.column(col).unwrap_or("");
    match raw.trim().parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            warn!(
                "Invalid metrics value on column {} for algorithm '{}' on instance '{}': {}",
                col, record.algorithm, record.instance, raw
            );
            f64::NAN
        }
    }
}

/// Samples of one x value, grouped by algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct XBucket {
    pub x: f64,
    pub by_algorithm: BTreeMap<String, Vec<Sample>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub x_name: String,
    pub y_name: String,
    /// Sorted by ascending x.
    pub buckets: Vec<XBucket>,
}

impl Series {
    pub fn algorithms(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .buckets
            .iter()
            .flat_map(|b| b.by_algorithm.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Groups `y_col` samples by algorithm and by the value of `x_col`.
pub fn collect_series(table: &ResultTable, x_col: usize, y_col: usize) -> Result<Series> {
    let x_name = table.column_name(x_col)?.to_string();
    let y_name = format!("median {}", table.column_name(y_col)?);

    let mut grouped: BTreeMap<String, (f64, BTreeMap<String, Vec<Sample>>)> = BTreeMap::new();
    for record in &table.records {
        let raw_x = record.column(x_col).unwrap_or("").trim();
        let Ok(x) = raw_x.parse::<f64>() else {
            warn!(
                "Invalid x value on column {} for algorithm '{}' on instance '{}': {}",
                x_col, record.algorithm, record.instance, raw_x
            );
            continue;
        };
        let sample = Sample {
            timed_out: record.timed_out,
            value: metric_value(record, y_col),
        };
        grouped
            .entry(raw_x.to_string())
            .or_insert_with(|| (x, BTreeMap::new()))
            .1
            .entry(record.algorithm.clone())
            .or_default()
            .push(sample);
    }

    let mut buckets: Vec<XBucket> = grouped
        .into_values()
        .map(|(x, by_algorithm)| XBucket { x, by_algorithm })
        .collect();
    buckets.sort_by(|a, b| a.x.total_cmp(&b.x));
    Ok(Series {
        x_name,
        y_name,
        buckets,
    })
}
