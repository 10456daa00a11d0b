use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use csv::Writer;
use lab_core::{ensure_dir, result_writer};
use serde::Serialize;

use crate::results::{collect_series, metric_value, ResultTable, Series};
use crate::stats::{low_med_high, LowMedHigh};

const BELOW_SUFFIX: &str = " length of below confidence half-interval";
const ABOVE_SUFFIX: &str = " length of above confidence half-interval";

#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub x: f64,
    /// One cell per algorithm, in `SummaryTable::algorithms` order.
    pub cells: Vec<Option<LowMedHigh>>,
}

/// Median and confidence bounds per (x value, algorithm).
#[derive(Debug, Clone, Serialize)]
pub struct SummaryTable {
    pub x_name: String,
    pub y_name: String,
    pub algorithms: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

pub fn summarize(series: &Series) -> SummaryTable {
    let algorithms = series.algorithms();
    let rows = series
        .buckets
        .iter()
        .map(|bucket| SummaryRow {
            x: bucket.x,
            cells: algorithms
                .iter()
                .map(|algo| {
                    bucket
                        .by_algorithm
                        .get(algo)
                        .and_then(|samples| low_med_high(samples))
                })
                .collect(),
        })
        .collect();
    SummaryTable {
        x_name: series.x_name.clone(),
        y_name: series.y_name.clone(),
        algorithms,
        rows,
    }
}

/// Loads `results`, aggregates column `y_col` against `x_col`, and writes
/// the table to `out`.
pub fn summarize_results(
    results: &Path,
    x_col: usize,
    y_col: usize,
    out: &Path,
) -> Result<SummaryTable> {
    let table = ResultTable::load(results)?;
    let summary = summarize(&collect_series(&table, x_col, y_col)?);
    write_summary(&summary, out)?;
    Ok(summary)
}

pub fn write_summary(summary: &SummaryTable, out: &Path) -> Result<()> {
    let mut writer = open_writer(out)?;
    writer.write_record(["y axis label:", summary.y_name.as_str()])?;

    let mut header = vec![summary.x_name.clone()];
    for algo in &summary.algorithms {
        header.push(algo.clone());
        header.push(format!("{}{}", algo, BELOW_SUFFIX));
        header.push(format!("{}{}", algo, ABOVE_SUFFIX));
    }
    writer.write_record(&header)?;

    for row in &summary.rows {
        let mut line = vec![row.x.to_string()];
        for cell in &row.cells {
            match cell {
                Some(lmh) => {
                    line.push(lmh.median.to_string());
                    line.push(lmh.below().to_string());
                    line.push(lmh.above().to_string());
                }
                None => line.extend([String::new(), String::new(), String::new()]),
            }
        }
        writer.write_record(&line)?;
    }
    writer.flush()?;
    Ok(())
}

/// Per-instance metric values of two algorithms; a missing side is NaN.
#[derive(Debug, Clone, Serialize)]
pub struct ScatterData {
    pub metric: String,
    pub x_algo: String,
    pub y_algo: String,
    pub points: BTreeMap<String, (f64, f64)>,
}

pub fn scatter(
    table: &ResultTable,
    x_algo: &str,
    y_algo: &str,
    metric_col: usize,
    include_timeouts: bool,
) -> Result<ScatterData> {
    if x_algo == y_algo {
        return Err(anyhow!("scatter needs two different algorithms, got `{}' twice", x_algo));
    }
    let metric = table.column_name(metric_col)?.to_string();
    let mut points = BTreeMap::new();
    for record in &table.records {
        if record.timed_out && !include_timeouts {
            continue;
        }
        let is_x = if record.algorithm == x_algo {
            true
        } else if record.algorithm == y_algo {
            false
        } else {
            continue;
        };
        let value = metric_value(record, metric_col);
        let point = points
            .entry(record.instance.clone())
            .or_insert((f64::NAN, f64::NAN));
        if is_x {
            point.0 = value;
        } else {
            point.1 = value;
        }
    }
    Ok(ScatterData {
        metric,
        x_algo: x_algo.to_string(),
        y_algo: y_algo.to_string(),
        points,
    })
}

pub fn write_scatter(data: &ScatterData, out: &Path) -> Result<()> {
    let mut writer = open_writer(out)?;
    writer.write_record([data.metric.as_str()])?;
    writer.write_record([data.x_algo.as_str(), data.y_algo.as_str()])?;
    for (x, y) in data.points.values() {
        writer.write_record([x.to_string(), y.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// `figure_data_<name>` next to the results file.
pub fn default_summary_path(results: &Path) -> PathBuf {
    prefixed(results, "figure_data_")
}

/// `figure_data_scatter<name>` next to the results file.
pub fn default_scatter_path(results: &Path) -> PathBuf {
    prefixed(results, "figure_data_scatter")
}

fn prefixed(results: &Path, prefix: &str) -> PathBuf {
    let name = results
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results.csv".to_string());
    results.with_file_name(format!("{}{}", prefix, name))
}

fn open_writer(out: &Path) -> Result<Writer<File>> {
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    result_writer()
        .from_path(out)
        .with_context(|| format!("failed to create {}", out.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::tests::write_results;
    use std::fs;

    const RESULTS: &str = "\
algorithm;timeout;instance;file;size;runtime
DPOP;0;a;p.xml;10;2
DPOP;0;b;p.xml;10;3
DPOP;0;c;p.xml;10;5
DPOP;0;d;p.xml;10;7
DPOP;0;e;p.xml;10;11
DPOP;0;f;p.xml;10;13
MGM;0;a;p.xml;10;1
MGM;1;b;p.xml;20;60
DPOP;0;g;p.xml;20;4
";

    #[test]
    fn summary_export_layout() {
        let (dir, path) = write_results("summary", RESULTS);
        let out = default_summary_path(&path);
        assert_eq!(out, dir.join("figure_data_results.csv"));
        let summary = summarize_results(&path, 4, 5, &out).expect("summarize");

        assert_eq!(summary.algorithms, vec!["DPOP", "MGM"]);
        let first = summary.rows[0].cells[0].expect("DPOP at 10");
        assert_eq!((first.low, first.median, first.high), (2.0, 5.0, 13.0));
        assert!(summary.rows[1].cells[1].expect("MGM at 20").is_nan());

        let text = fs::read_to_string(&out).expect("export");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "y axis label:;median runtime");
        assert_eq!(
            lines[1],
            "size;DPOP;DPOP length of below confidence half-interval;\
             DPOP length of above confidence half-interval;MGM;\
             MGM length of below confidence half-interval;\
             MGM length of above confidence half-interval"
        );
        assert_eq!(lines[2], "10;5;3;8;1;0;0");
        assert_eq!(lines[3], "20;4;0;0;NaN;NaN;NaN");
        assert_eq!(lines.len(), 4);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn algorithm_missing_at_x_leaves_empty_cells() {
        let body = "algorithm;timeout;instance;file;size;runtime\n\
                    DPOP;0;a;p.xml;10;2\nMGM;0;b;p.xml;20;3\n";
        let (dir, path) = write_results("missing", body);
        let out = dir.join("summary.csv");
        summarize_results(&path, 4, 5, &out).expect("summarize");
        let text = fs::read_to_string(&out).expect("export");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], "10;2;0;0;;;");
        assert_eq!(lines[3], "20;;;;3;0;0");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn scatter_pairs_instances() {
        let (dir, path) = write_results("scatter", RESULTS);
        let table = ResultTable::load(&path).expect("load");

        let with_timeouts = scatter(&table, "DPOP", "MGM", 5, true).expect("scatter");
        assert_eq!(with_timeouts.metric, "runtime");
        assert_eq!(with_timeouts.points["a"], (2.0, 1.0));
        assert_eq!(with_timeouts.points["b"], (3.0, 60.0));
        assert!(with_timeouts.points["c"].1.is_nan());

        let finished_only = scatter(&table, "DPOP", "MGM", 5, false).expect("scatter");
        assert!(finished_only.points["b"].1.is_nan());

        let out = default_scatter_path(&path);
        write_scatter(&with_timeouts, &out).expect("write");
        let text = fs::read_to_string(&out).expect("export");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "runtime");
        assert_eq!(lines[1], "DPOP;MGM");
        assert_eq!(lines[2], "2;1");
        assert_eq!(lines.len(), 2 + 7);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn scatter_rejects_same_algorithm() {
        let (dir, path) = write_results("same", RESULTS);
        let table = ResultTable::load(&path).expect("load");
        assert!(scatter(&table, "DPOP", "DPOP", 5, true).is_err());
        assert!(scatter(&table, "DPOP", "MGM", 42, true).is_err());
        let _ = fs::remove_dir_all(dir);
    }
}
