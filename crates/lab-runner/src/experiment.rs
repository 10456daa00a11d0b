use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lab_core::{validate_algorithms, AlgorithmDescriptor, LabError, ParameterGrid};
use serde::{Deserialize, Serialize};

use crate::source::InstancePlan;

/// Command used to start both the generator and the algorithms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSpec {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Where problem instances come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstanceSpec {
    /// An external generator invoked once per grid leaf.
    Generator {
        generator: String,
        #[serde(default)]
        params: ParameterGrid,
    },
    /// A directory of ready-made instance files, each copied in turn to
    /// `instance_file`.
    Repository {
        repository: PathBuf,
        #[serde(default = "default_repository_instance")]
        instance_file: String,
    },
}

fn default_repository_instance() -> String {
    ".fromRepo.xcsp".to_string()
}

/// When a soft interrupt is honoured inside a grid leaf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoftStop {
    /// Finish every algorithm on the current instance first.
    #[default]
    Leaf,
    /// Spawn no further algorithm once the running one exits.
    Algorithm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub runtime: RuntimeSpec,
    pub instances: InstanceSpec,
    pub algorithms: Vec<AlgorithmDescriptor>,
    #[serde(default = "default_runs")]
    pub runs: usize,
    /// Per-run timeout in seconds, enforced by the algorithms themselves.
    pub timeout: u64,
    pub output: PathBuf,
    #[serde(default = "default_temp_file")]
    pub temp_file: PathBuf,
    #[serde(default)]
    pub save_problems: bool,
    #[serde(default)]
    pub soft_stop: SoftStop,
}

fn default_runs() -> usize {
    1
}

fn default_temp_file() -> PathBuf {
    PathBuf::from(".current_run.csv")
}

impl Experiment {
    /// Configuration checks that must pass before anything is spawned.
    pub fn validate(&self) -> Result<(), LabError> {
        validate_algorithms(&self.algorithms)?;
        if self.runs == 0 {
            return Err(LabError::Config("runs must be at least 1".to_string()));
        }
        if self.runtime.command.trim().is_empty() {
            return Err(LabError::Config("runtime.command is empty".to_string()));
        }
        if self.temp_file == self.output {
            return Err(LabError::Config(
                "temp_file and output must be different files".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn load_experiment(path: &Path) -> Result<Experiment> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read experiment {}", path.display()))?;
    let experiment: Experiment = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse experiment {}", path.display()))?;
    experiment.validate()?;
    Ok(experiment)
}

pub struct ExperimentSummary {
    pub algorithms: Vec<String>,
    pub source: String,
    pub slots: usize,
    pub leaves: usize,
    pub runs: usize,
    pub timeout: u64,
    pub output: PathBuf,
}

impl ExperimentSummary {
    /// Algorithm processes a full, uninterrupted experiment starts.
    pub fn invocations(&self) -> usize {
        self.runs * self.leaves * self.algorithms.len()
    }
}

pub fn describe_experiment(experiment: &Experiment) -> Result<ExperimentSummary> {
    let plan = InstancePlan::resolve(experiment)?;
    Ok(ExperimentSummary {
        algorithms: plan.algorithms.iter().map(|a| a.name.clone()).collect(),
        source: plan.describe(),
        slots: plan.grid.slots.len(),
        leaves: plan.grid.leaf_count(),
        runs: experiment.runs,
        timeout: experiment.timeout,
        output: experiment.output.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lab_core::Slot;

    const GENERATOR_YAML: &str = r#"
runtime:
  command: java
  args: ["-Xmx2G", "-cp", "frodo2.jar"]
instances:
  generator: frodo2.benchmarks.graphcoloring.GraphColoring
  params: ["-i", [10, 20, 30], 0.4, 0.0, 3]
algorithms:
  - name: DPOP
    target: frodo2.algorithms.dpop.DPOPsolver
    config: agents/DPOP/DPOPagent.xml
    problem: random.xcsp
  - name: MGM
    target: frodo2.algorithms.localSearch.mgm.MGMsolver
    config: agents/MGM/MGMagent.xml
    problem: random.xcsp
    runtime_args: ["-Xmx4G"]
runs: 5
timeout: 600
output: results.csv
"#;

    #[test]
    fn generator_experiment_parses_with_defaults() {
        let exp: Experiment = serde_yaml::from_str(GENERATOR_YAML).expect("parse");
        exp.validate().expect("valid");
        assert_eq!(exp.runs, 5);
        assert_eq!(exp.temp_file, PathBuf::from(".current_run.csv"));
        assert_eq!(exp.soft_stop, SoftStop::Leaf);
        assert!(!exp.save_problems);
        match &exp.instances {
            InstanceSpec::Generator { generator, params } => {
                assert!(generator.ends_with("GraphColoring"));
                assert_eq!(params.slots.len(), 5);
                assert!(matches!(params.slots[1], Slot::Sweep(ref v) if v.len() == 3));
            }
            other => panic!("expected generator, got {:?}", other),
        }
        assert_eq!(
            exp.algorithms[1].runtime_args.as_deref(),
            Some(&["-Xmx4G".to_string()][..])
        );

        let summary = describe_experiment(&exp).expect("describe");
        assert_eq!(summary.leaves, 3);
        assert_eq!(summary.invocations(), 30);
    }

    #[test]
    fn duplicate_algorithm_names_fail_validation() {
        let yaml = GENERATOR_YAML.replace("name: MGM", "name: DPOP");
        let exp: Experiment = serde_yaml::from_str(&yaml).expect("parse");
        let err = exp.validate().expect_err("duplicate");
        assert!(err.to_string().contains("same name `DPOP'"), "{}", err);
    }

    #[test]
    fn zero_runs_and_soft_stop_variants() {
        let yaml = GENERATOR_YAML
            .replace("runs: 5", "runs: 0\nsoft_stop: algorithm");
        let exp: Experiment = serde_yaml::from_str(&yaml).expect("parse");
        assert_eq!(exp.soft_stop, SoftStop::Algorithm);
        assert!(matches!(exp.validate(), Err(LabError::Config(_))));
    }

    #[test]
    fn repository_experiment_parses() {
        let yaml = r#"
runtime: { command: java }
instances: { repository: ./problems }
algorithms:
  - { name: DPOP, target: d, config: c.xml, problem: p.xcsp }
timeout: 60
output: out.csv
"#;
        let exp: Experiment = serde_yaml::from_str(yaml).expect("parse");
        match exp.instances {
            InstanceSpec::Repository {
                repository,
                instance_file,
            } => {
                assert_eq!(repository, PathBuf::from("./problems"));
                assert_eq!(instance_file, ".fromRepo.xcsp");
            }
            other => panic!("expected repository, got {:?}", other),
        }
    }
}
