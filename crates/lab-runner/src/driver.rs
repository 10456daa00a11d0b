use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use chrono::Utc;
use lab_core::{CancellationState, CancellationToken, LabError};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::experiment::{Experiment, SoftStop};
use crate::grid::expand_grid;
use crate::reconcile::{reconcile, ReconcileOptions};
use crate::source::InstancePlan;
use crate::supervisor::Supervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Stopped at a safe point after a soft interrupt.
    Interrupted,
    /// Stopped by a hard terminate; the in-flight instance was discarded.
    Terminated,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub runs_started: usize,
    pub leaves_completed: usize,
    pub records_written: usize,
    pub records_dropped: usize,
    pub problems_saved: usize,
    pub output: PathBuf,
    pub started_at: String,
    pub finished_at: String,
}

/// Runs every repetition of the grid against every algorithm.
///
/// Leaves are processed strictly one after the other; the permanent stream
/// only ever receives fully reconciled leaves. A leaf on which no algorithm
/// produced the temporary file halts the whole experiment.
pub fn run_experiment(experiment: &Experiment, token: &CancellationToken) -> Result<RunSummary> {
    experiment.validate()?;
    let plan = InstancePlan::resolve(experiment)?;
    let supervisor = Supervisor::new(token.clone());

    let mut summary = RunSummary {
        status: RunStatus::Completed,
        runs_started: 0,
        leaves_completed: 0,
        records_written: 0,
        records_dropped: 0,
        problems_saved: 0,
        output: experiment.output.clone(),
        started_at: Utc::now().to_rfc3339(),
        finished_at: String::new(),
    };

    for run in 1..=experiment.runs {
        supervisor.announce_transitions();
        if token.is_interrupted() {
            break;
        }
        info!("Run {}/{}", run, experiment.runs);
        summary.runs_started += 1;
        let expansion = expand_grid(&plan.grid, token, |leaf| {
            run_leaf(experiment, &plan, &supervisor, leaf, &mut summary)
        })?;
        debug!(run = run, leaves = expansion.leaves(), "grid pass finished");
    }

    supervisor.announce_transitions();
    summary.status = match token.state() {
        CancellationState::Running => RunStatus::Completed,
        CancellationState::SoftInterruptRequested => RunStatus::Interrupted,
        CancellationState::HardTerminated => RunStatus::Terminated,
    };
    summary.finished_at = Utc::now().to_rfc3339();
    info!(
        status = summary.status.as_str(),
        records = summary.records_written,
        "experiment finished"
    );
    Ok(summary)
}

fn run_leaf(
    experiment: &Experiment,
    plan: &InstancePlan,
    supervisor: &Supervisor,
    leaf: &[String],
    summary: &mut RunSummary,
) -> Result<()> {
    let token = supervisor.token();
    if !plan.materialize(leaf, &experiment.runtime, supervisor)? {
        return Ok(());
    }

    let temp = &experiment.temp_file;
    discard(temp)?;
    let temp_arg = temp.to_string_lossy();

    let mut launched = 0;
    for algo in &plan.algorithms {
        supervisor.announce_transitions();
        if experiment.soft_stop == SoftStop::Algorithm && token.is_interrupted() {
            info!("Skipping the remaining algorithms on this problem instance");
            break;
        }
        info!("Starting {}", algo.name);
        let mut cmd = Command::new(&experiment.runtime.command);
        cmd.args(algo.invocation_args(&experiment.runtime.args, experiment.timeout, &temp_arg));
        let report = supervisor.run(&algo.name, cmd)?;
        launched += 1;
        debug!(algorithm = %algo.name, status = %report.status_label(), "algorithm exited");
        if token.is_terminated() {
            discard(temp)?;
            return Ok(());
        }
    }
    if launched == 0 {
        return Ok(());
    }

    if !temp.exists() {
        let err = LabError::NoOutput {
            temp_file: temp.clone(),
        };
        error!("{}", err);
        return Err(err.into());
    }
    let report = reconcile(
        temp,
        &experiment.output,
        &ReconcileOptions {
            save_problems: experiment.save_problems,
        },
    )
    .with_context(|| format!("failed to merge results into {}", experiment.output.display()))?;
    summary.leaves_completed += 1;
    summary.records_written += report.records_written;
    summary.records_dropped += report.records_dropped;
    summary.problems_saved += report.problems_saved.len();
    Ok(())
}

fn discard(temp: &Path) -> Result<()> {
    if temp.exists() {
        fs::remove_file(temp).with_context(|| format!("failed to delete {}", temp.display()))?;
    }
    Ok(())
}
