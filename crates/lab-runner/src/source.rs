use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Context, Result};
use lab_core::{AlgorithmDescriptor, ParameterGrid, Scalar, Slot};
use tracing::{error, info};
use walkdir::WalkDir;

use crate::experiment::{Experiment, InstanceSpec, RuntimeSpec};
use crate::supervisor::{ProcessExit, Supervisor};

enum Producer {
    Generator(String),
    /// Leaf is `[source file, instance file]`.
    Copier,
}

/// The grid to sweep and how each leaf becomes a problem instance.
pub struct InstancePlan {
    pub grid: ParameterGrid,
    pub algorithms: Vec<AlgorithmDescriptor>,
    producer: Producer,
}

impl InstancePlan {
    pub fn resolve(experiment: &Experiment) -> Result<Self> {
        match &experiment.instances {
            InstanceSpec::Generator { generator, params } => Ok(InstancePlan {
                grid: params.clone(),
                algorithms: experiment.algorithms.clone(),
                producer: Producer::Generator(generator.clone()),
            }),
            InstanceSpec::Repository {
                repository,
                instance_file,
            } => {
                let files = list_repository(repository)?;
                if files.is_empty() {
                    return Err(anyhow!(
                        "problem repository {} contains no files",
                        repository.display()
                    ));
                }
                let algorithms = experiment
                    .algorithms
                    .iter()
                    .map(|algo| AlgorithmDescriptor {
                        problem: instance_file.clone(),
                        ..algo.clone()
                    })
                    .collect();
                let sources = files
                    .iter()
                    .map(|p| Scalar::new(p.to_string_lossy()))
                    .collect();
                Ok(InstancePlan {
                    grid: ParameterGrid::new(vec![
                        Slot::Sweep(sources),
                        Slot::Fixed(Scalar::new(instance_file.as_str())),
                    ]),
                    algorithms,
                    producer: Producer::Copier,
                })
            }
        }
    }

    pub fn describe(&self) -> String {
        match &self.producer {
            Producer::Generator(generator) => format!("generator {}", generator),
            Producer::Copier => "problem repository".to_string(),
        }
    }

    /// Produces the instance for `leaf`; returns false if the generator was
    /// killed by a hard terminate. A generator that exits with a failure is an
    /// error: the algorithms would otherwise solve a stale instance.
    pub fn materialize(
        &self,
        leaf: &[String],
        runtime: &RuntimeSpec,
        supervisor: &Supervisor,
    ) -> Result<bool> {
        match &self.producer {
            Producer::Generator(generator) => {
                info!(
                    "Generating a problem instance using the following arguments: {:?}",
                    std::iter::once(generator).chain(leaf).collect::<Vec<_>>()
                );
                let mut cmd = Command::new(&runtime.command);
                cmd.args(&runtime.args).arg(generator).args(leaf);
                let report = supervisor.run(generator, cmd)?;
                match &report.exit {
                    ProcessExit::Killed => Ok(false),
                    ProcessExit::Exited(status) if status.success() => Ok(true),
                    ProcessExit::Exited(_) => {
                        error!(
                            "The problem generator exited with status {}; see its output above",
                            report.status_label()
                        );
                        Err(anyhow!(
                            "instance generator {} failed with status {}",
                            generator,
                            report.status_label()
                        ))
                    }
                }
            }
            Producer::Copier => {
                let [source, target] = leaf else {
                    return Err(anyhow!("repository leaf must be [source, target], got {:?}", leaf));
                };
                fs::copy(source, target)
                    .with_context(|| format!("failed to copy {} to {}", source, target))?;
                info!("Copied {} to {}", source, target);
                Ok(true)
            }
        }
    }
}

/// Regular files directly inside `dir`, sorted by name.
fn list_repository(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("failed to list repository {}", dir.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
