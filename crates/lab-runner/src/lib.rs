//! Orchestrates solver experiments: sweeps a parameter grid, runs every
//! algorithm on each generated instance, and merges the result streams.

mod driver;
mod experiment;
mod grid;
mod reconcile;
mod signal;
mod source;
mod supervisor;

pub use driver::{run_experiment, RunStatus, RunSummary};
pub use experiment::{
    describe_experiment, load_experiment, Experiment, ExperimentSummary, InstanceSpec,
    RuntimeSpec, SoftStop,
};
pub use grid::{expand_grid, Expansion};
pub use reconcile::{reconcile, ReconcileOptions, ReconcileReport};
pub use signal::{install_interrupt_handler, isolate_from_interrupts, FORCED_EXIT_CODE};
pub use source::InstancePlan;
pub use supervisor::{ProcessExit, ProcessReport, Supervisor};

pub use lab_core::{CancellationState, CancellationToken};
