use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::LabError;

/// One algorithm under test and the arguments needed to launch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmDescriptor {
    /// Display name; unique within one experiment and written to column 0.
    pub name: String,
    /// Opaque token handed to the runtime (a main class, a script, ...).
    pub target: String,
    /// Solver identifier passed after the display name; defaults to `target`.
    #[serde(default)]
    pub solver: Option<String>,
    /// Path to the algorithm-specific configuration file.
    pub config: String,
    /// Path of the problem instance file the generator writes.
    pub problem: String,
    /// Replaces the runtime's default flags for this algorithm only.
    #[serde(default)]
    pub runtime_args: Option<Vec<String>>,
}

impl AlgorithmDescriptor {
    pub fn solver_id(&self) -> &str {
        self.solver.as_deref().unwrap_or(&self.target)
    }

    /// Builds the argument vector following the runtime command:
    /// `[...flags, target, name, solver, config, problem, timeout, temp_output]`.
    pub fn invocation_args(
        &self,
        default_runtime_args: &[String],
        timeout_secs: u64,
        temp_output: &str,
    ) -> Vec<String> {
        let flags = self
            .runtime_args
            .as_deref()
            .unwrap_or(default_runtime_args);
        let mut args = Vec::with_capacity(flags.len() + 7);
        args.extend(flags.iter().cloned());
        args.push(self.target.clone());
        args.push(self.name.clone());
        args.push(self.solver_id().to_string());
        args.push(self.config.clone());
        args.push(self.problem.clone());
        args.push(timeout_secs.to_string());
        args.push(temp_output.to_string());
        args
    }
}

/// Rejects empty algorithm lists and duplicate display names.
pub fn validate_algorithms(algorithms: &[AlgorithmDescriptor]) -> Result<(), LabError> {
    if algorithms.is_empty() {
        return Err(LabError::NoAlgorithms);
    }
    let mut seen = BTreeSet::new();
    for algo in algorithms {
        if !seen.insert(algo.name.as_str()) {
            return Err(LabError::DuplicateAlgorithm(algo.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn algo(name: &str) -> AlgorithmDescriptor {
        AlgorithmDescriptor {
            name: name.to_string(),
            target: "frodo2.algorithms.dpop.DPOPsolver".to_string(),
            solver: None,
            config: "agents/DPOP/DPOPagent.xml".to_string(),
            problem: "random.xcsp".to_string(),
            runtime_args: None,
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = validate_algorithms(&[algo("DPOP"), algo("MGM"), algo("DPOP")])
            .expect_err("duplicate must fail");
        match err {
            LabError::DuplicateAlgorithm(name) => assert_eq!(name, "DPOP"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn empty_algorithm_list_is_rejected() {
        assert!(matches!(
            validate_algorithms(&[]),
            Err(LabError::NoAlgorithms)
        ));
        validate_algorithms(&[algo("DPOP"), algo("MGM")]).expect("distinct names are valid");
    }

    #[test]
    fn invocation_args_follow_positional_contract() {
        let runtime = vec!["-Xmx2G".to_string(), "-cp".to_string(), "frodo2.jar".to_string()];
        let args = algo("DPOP").invocation_args(&runtime, 600, ".current_run.csv");
        assert_eq!(
            args,
            vec![
                "-Xmx2G",
                "-cp",
                "frodo2.jar",
                "frodo2.algorithms.dpop.DPOPsolver",
                "DPOP",
                "frodo2.algorithms.dpop.DPOPsolver",
                "agents/DPOP/DPOPagent.xml",
                "random.xcsp",
                "600",
                ".current_run.csv",
            ]
        );
    }

    #[test]
    fn per_algorithm_runtime_args_replace_defaults() {
        let mut a = algo("new DPOP");
        a.runtime_args = Some(vec!["-cp".to_string(), "new.jar".to_string()]);
        a.solver = Some("dpop".to_string());
        let args = a.invocation_args(&["-cp".to_string(), "old.jar".to_string()], 30, "tmp.csv");
        assert_eq!(&args[..2], &["-cp", "new.jar"]);
        assert_eq!(args[4], "dpop");
    }
}
