use anyhow::Result;
use clap::{Parser, Subcommand};
use lab_core::LabError;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lab", version, about = "Solver experiment harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep the parameter grid and run every algorithm on each instance
    Run {
        experiment: PathBuf,
        #[arg(long)]
        runs: Option<usize>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Per-run timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    Describe {
        experiment: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Median and 95% confidence interval of one column against another
    Summarize {
        results: PathBuf,
        #[arg(long)]
        x_col: usize,
        #[arg(long)]
        y_col: usize,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Per-instance comparison of two algorithms on one metric column
    Scatter {
        results: PathBuf,
        #[arg(long)]
        x_algo: String,
        #[arg(long)]
        y_algo: String,
        #[arg(long)]
        metric_col: usize,
        #[arg(long)]
        no_timeouts: bool,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    Init {
        #[arg(long, default_value = "experiment.yaml")]
        path: PathBuf,
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    let result = run_command(cli.command);
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error(error_code(&err), err.to_string(), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Run {
            experiment,
            runs,
            output,
            timeout,
            json,
        } => {
            let mut exp = lab_runner::load_experiment(&experiment)?;
            if let Some(runs) = runs {
                exp.runs = runs;
            }
            if let Some(output) = output {
                exp.output = output;
            }
            if let Some(timeout) = timeout {
                exp.timeout = timeout;
            }
            let summary = lab_runner::describe_experiment(&exp)?;
            let token = lab_runner::CancellationToken::new();
            lab_runner::install_interrupt_handler(&token)?;
            let result = lab_runner::run_experiment(&exp, &token)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "run",
                    "summary": summary_to_json(&summary),
                    "run": serde_json::to_value(&result)?,
                })));
            }
            print_summary(&summary);
            println!("status: {}", result.status.as_str());
            println!("runs_started: {}", result.runs_started);
            println!("leaves_completed: {}", result.leaves_completed);
            println!("records_written: {}", result.records_written);
            println!("records_dropped: {}", result.records_dropped);
            if exp.save_problems {
                println!("problems_saved: {}", result.problems_saved);
            }
        }
        Commands::Describe { experiment, json } => {
            let exp = lab_runner::load_experiment(&experiment)?;
            let summary = lab_runner::describe_experiment(&exp)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "describe",
                    "summary": summary_to_json(&summary)
                })));
            }
            print_summary(&summary);
        }
        Commands::Summarize {
            results,
            x_col,
            y_col,
            out,
            json,
        } => {
            let out = out.unwrap_or_else(|| lab_analysis::default_summary_path(&results));
            let table = lab_analysis::summarize_results(&results, x_col, y_col, &out)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "summarize",
                    "out": out.display().to_string(),
                    "table": serde_json::to_value(&table)?,
                })));
            }
            println!("(Over)wrote {}", out.display());
        }
        Commands::Scatter {
            results,
            x_algo,
            y_algo,
            metric_col,
            no_timeouts,
            out,
            json,
        } => {
            let out = out.unwrap_or_else(|| lab_analysis::default_scatter_path(&results));
            let table = lab_analysis::ResultTable::load(&results)?;
            let data = lab_analysis::scatter(&table, &x_algo, &y_algo, metric_col, !no_timeouts)?;
            lab_analysis::write_scatter(&data, &out)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "scatter",
                    "out": out.display().to_string(),
                    "metric": data.metric,
                    "instances": data.points.len(),
                })));
            }
            println!("(Over)wrote {}", out.display());
        }
        Commands::Init { path, force } => {
            if !force && path.exists() {
                return Err(anyhow::anyhow!(
                    "init file already exists (use --force): {}",
                    path.display()
                ));
            }
            std::fs::write(&path, EXPERIMENT_TEMPLATE)?;
            println!("wrote: {}", path.display());
            println!("next: lab describe {}", path.display());
        }
    }
    Ok(None)
}

const EXPERIMENT_TEMPLATE: &str = "\
runtime:
  command: java                       # REQUIRED
  args: [-Xmx2G, -classpath, frodo2.jar]
instances:
  generator: ''                       # REQUIRED: generator identifier
  params: []                          # each entry a value or a list of values to sweep
# instances:
#   repository: ./problems            # alternative: every file in a folder
#   instance_file: .fromRepo.xcsp
algorithms:                           # REQUIRED: unique names
  - name: ''
    target: ''
    config: ''
    problem: ''
    # solver: defaults to target
    # runtime_args: overrides runtime.args for this algorithm
runs: 1
timeout: 600                          # seconds, enforced by the algorithms
output: results.csv
save_problems: false
soft_stop: leaf                       # leaf | algorithm
";

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

fn error_code(err: &anyhow::Error) -> &'static str {
    match err.downcast_ref::<LabError>() {
        Some(LabError::NoAlgorithms)
        | Some(LabError::DuplicateAlgorithm(_))
        | Some(LabError::Config(_)) => "configuration_error",
        Some(LabError::NoOutput { .. }) => "no_output",
        Some(LabError::MissingHeader { .. }) | Some(LabError::MissingColumn { .. }) => {
            "invalid_results"
        }
        _ => "command_failed",
    }
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Run { json, .. }
        | Commands::Describe { json, .. }
        | Commands::Summarize { json, .. }
        | Commands::Scatter { json, .. } => *json,
        Commands::Init { .. } => false,
    }
}

fn summary_to_json(summary: &lab_runner::ExperimentSummary) -> Value {
    json!({
        "algorithms": summary.algorithms,
        "source": summary.source,
        "slots": summary.slots,
        "leaves": summary.leaves,
        "runs": summary.runs,
        "timeout": summary.timeout,
        "invocations": summary.invocations(),
        "output": summary.output.display().to_string(),
    })
}

fn print_summary(summary: &lab_runner::ExperimentSummary) {
    println!("source: {}", summary.source);
    println!("algorithms: {}", summary.algorithms.join(", "));
    println!("slots: {}", summary.slots);
    println!("leaves: {}", summary.leaves);
    println!("runs: {}", summary.runs);
    println!("timeout: {}s", summary.timeout);
    println!("invocations: {}", summary.invocations());
    println!("output: {}", summary.output.display());
}
