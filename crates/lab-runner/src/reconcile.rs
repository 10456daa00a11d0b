use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::ByteRecord;
use lab_core::{ensure_dir, record_key, result_reader, result_writer, INSTANCE_COL, SOURCE_COL};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Copy each instance's source file to `<instance>_<file name>` next to it.
    pub save_problems: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub header_written: bool,
    pub records_written: usize,
    pub records_dropped: usize,
    pub problems_saved: Vec<PathBuf>,
}

/// Merges the per-instance temporary stream into the permanent one.
///
/// Line 1 of `temp` is the header and is copied only when `output` does not
/// exist yet. A record is dropped when the next record carries the same
/// (algorithm, instance) key: it is a timeout placeholder superseded by the
/// real result. Records are copied byte for byte.
///
/// `temp` is read in full before `output` is touched, and the merged lines
/// go out in a single append; on error `output` is unchanged and `temp` is
/// left in place. `temp` is deleted afterwards.
pub fn reconcile(
    temp: &Path,
    output: &Path,
    options: &ReconcileOptions,
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();
    let mut rows = read_rows(temp)?.into_iter().peekable();
    let Some(header) = rows.next() else {
        warn!(temp = %temp.display(), "temporary result file is empty");
        fs::remove_file(temp)?;
        return Ok(report);
    };

    let mut kept = Vec::new();
    while let Some(record) = rows.next() {
        if rows.peek().is_some_and(|next| same_key(&record, next)) {
            debug!(record = ?record, "dropping superseded timeout record");
            report.records_dropped += 1;
            continue;
        }
        kept.push(record);
    }

    let needs_header = !output.exists();
    let mut writer = result_writer().from_writer(Vec::new());
    if needs_header {
        writer.write_byte_record(&header)?;
    }
    for record in &kept {
        writer.write_byte_record(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| err.into_error())
        .context("failed to buffer reconciled records")?;

    if options.save_problems {
        let mut saved_instances = BTreeSet::new();
        for record in &kept {
            if let Some(saved) = save_problem(record, &mut saved_instances)? {
                report.problems_saved.push(saved);
            }
        }
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(output)
        .with_context(|| format!("failed to open {}", output.display()))?;
    file.write_all(&bytes)
        .and_then(|_| file.flush())
        .with_context(|| format!("failed to append to {}", output.display()))?;
    drop(file);
    report.header_written = needs_header;
    report.records_written = kept.len();

    fs::remove_file(temp).with_context(|| format!("failed to delete {}", temp.display()))?;
    Ok(report)
}

fn read_rows(temp: &Path) -> Result<Vec<ByteRecord>> {
    let mut reader = result_reader()
        .from_path(temp)
        .with_context(|| format!("failed to open {}", temp.display()))?;
    let mut rows = Vec::new();
    for row in reader.byte_records() {
        rows.push(row.with_context(|| format!("failed to read {}", temp.display()))?);
    }
    Ok(rows)
}

fn same_key(current: &ByteRecord, next: &ByteRecord) -> bool {
    match (record_key(current), record_key(next)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn save_problem(
    record: &ByteRecord,
    saved: &mut BTreeSet<Vec<u8>>,
) -> Result<Option<PathBuf>> {
    let (Some(instance), Some(source)) = (record.get(INSTANCE_COL), record.get(SOURCE_COL)) else {
        return Ok(None);
    };
    if !saved.insert(instance.to_vec()) {
        return Ok(None);
    }
    let (Ok(instance), Ok(source)) = (std::str::from_utf8(instance), std::str::from_utf8(source))
    else {
        warn!(record = ?record, "not saving a problem instance whose name is not UTF-8");
        return Ok(None);
    };
    let source = Path::new(source);
    let Some(file_name) = source.file_name() else {
        return Ok(None);
    };
    let target = source.with_file_name(format!("{}_{}", instance, file_name.to_string_lossy()));
    fs::copy(source, &target).with_context(|| {
        format!(
            "failed to save problem instance {} to {}",
            source.display(),
            target.display()
        )
    })?;
    Ok(Some(target))
}
