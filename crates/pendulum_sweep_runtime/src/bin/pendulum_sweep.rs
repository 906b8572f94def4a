use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pendulum_sim::PendulumWorker;
use pendulum_sweep_core::contract::{
    SweepConfig, DEFAULT_DTIME, DEFAULT_THETA_RESOLUTION, DEFAULT_TIME_MAX,
};
use pendulum_sweep_core::storage_keys::{LifecycleStatus, DEFAULT_RESULTS_FILE_NAME};
use pendulum_sweep_runtime::adapters::broker::RabbitmqctlBroker;
use pendulum_sweep_runtime::adapters::metric_socket::TcpMetricSink;
use pendulum_sweep_runtime::adapters::queue::{InProcessQueue, RetryPolicy, DEFAULT_QUEUE_NAME};
use pendulum_sweep_runtime::adapters::status_store::{FsStatusStore, StatusStore};
use pendulum_sweep_runtime::handlers::aggregate::{
    read_results_csv, CsvResultWriter, JsonResultWriter, ResultSink,
};
use pendulum_sweep_runtime::handlers::local::run_local;
use pendulum_sweep_runtime::handlers::monitor::monitor_queues;
use pendulum_sweep_runtime::handlers::seed::{seed_sweep, SweepDependencies};
use pendulum_sweep_runtime::logging::{init_tracing, LogFormat};
use pendulum_sweep_runtime::settings::{MonitoringSettings, RuntimeSettings};
use pendulum_sweep_runtime::SweepError;
use serde_json::json;

#[derive(Parser)]
#[command(
    name = "pendulum_sweep",
    about = "Seed, run and monitor double-pendulum parameter sweeps",
    long_about = "Integrates a double pendulum over a grid of initial angles and\n\
                  collects the final state of every grid point into one table."
)]
struct Cli {
    /// Log output format (logs always go to stderr)
    #[arg(long, global = true, value_enum, env = "SWEEP_LOG_FORMAT", default_value_t = LogFormatArg::Text)]
    log_format: LogFormatArg,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the experiment once and wait for every grid point
    Seed {
        #[command(flatten)]
        locations: LocationArgs,
        #[command(flatten)]
        grid: GridArgs,
        #[command(flatten)]
        execution: ExecutionArgs,
        /// File name of the results table inside the results directory
        #[arg(long, default_value = DEFAULT_RESULTS_FILE_NAME)]
        results_file: String,
        /// Give up on the sweep after this many seconds
        #[arg(long, env = "SWEEP_DEADLINE_SECS", default_value_t = 3600, value_parser = parse_positive::<u64>)]
        deadline_secs: u64,
    },
    /// Run the grid in this process without lifecycle markers
    Local {
        #[command(flatten)]
        grid: GridArgs,
        /// Output table (a `.json` extension selects JSON output)
        #[arg(short = 'n', long = "name", default_value = DEFAULT_RESULTS_FILE_NAME)]
        name: PathBuf,
        /// Worker threads (defaults to one per core)
        #[arg(long, env = "SWEEP_WORKER_THREADS", value_parser = parse_positive::<usize>)]
        threads: Option<usize>,
        /// Hide the progress bar
        #[arg(long)]
        no_progress: bool,
    },
    /// Sample broker queue depths once and ship them to the metrics server
    Monitor {
        #[arg(long, env = "MONITORING_SERVER_NAME", default_value = "localhost")]
        server_name: String,
        #[arg(long, env = "MONITORING_SERVER_PORT", default_value_t = 2003)]
        server_port: u16,
        #[arg(long, env = "MONITORING_METRIC_PREFIX", default_value = "pendulum")]
        metric_prefix: String,
        /// Queue to sample (repeatable)
        #[arg(long = "queue", default_values_t = ["server".to_string(), "worker".to_string()])]
        queues: Vec<String>,
        /// Path to the broker admin tool
        #[arg(long, env = "RABBITMQCTL", default_value = "rabbitmqctl")]
        rabbitmqctl: PathBuf,
    },
    /// Print the recorded lifecycle markers
    Status {
        #[command(flatten)]
        locations: LocationArgs,
    },
    /// Summarize an existing results table
    Summary {
        /// Results table to read
        #[arg(default_value = DEFAULT_RESULTS_FILE_NAME)]
        path: PathBuf,
    },
}

#[derive(Args)]
struct LocationArgs {
    /// Directory holding the lifecycle markers, shared by every process
    #[arg(long, env = "SWEEP_STATUS_DIR", default_value = "status")]
    status_dir: PathBuf,
    #[arg(long, env = "SWEEP_RESULTS_DIR", default_value = "results")]
    results_dir: PathBuf,
}

#[derive(Args)]
struct GridArgs {
    /// Number of initial angles per pendulum (the grid has resolution² points)
    #[arg(short = 'r', long = "resolution", env = "SWEEP_THETA_RESOLUTION", default_value_t = DEFAULT_THETA_RESOLUTION, value_parser = parse_positive::<usize>)]
    resolution: usize,
    /// Simulated time per point, in seconds
    #[arg(short = 't', long = "timemax", env = "SWEEP_TIME_MAX", default_value_t = DEFAULT_TIME_MAX, value_parser = parse_positive::<f64>)]
    timemax: f64,
    /// Integration step, in seconds
    #[arg(short = 'd', long = "dtime", env = "SWEEP_DTIME", default_value_t = DEFAULT_DTIME, value_parser = parse_positive::<f64>)]
    dtime: f64,
}

impl GridArgs {
    fn config(&self) -> SweepConfig {
        SweepConfig {
            theta_resolution: self.resolution,
            tmax: self.timemax,
            dt: self.dtime,
            ..SweepConfig::default()
        }
    }
}

#[derive(Args)]
struct ExecutionArgs {
    /// Worker threads in the queue pool (defaults to one per core)
    #[arg(long, env = "SWEEP_WORKER_THREADS", value_parser = parse_positive::<usize>)]
    threads: Option<usize>,
    /// Attempts per job before it is aborted
    #[arg(long, env = "SWEEP_MAX_ATTEMPTS", default_value_t = 3, value_parser = parse_positive::<u32>)]
    max_attempts: u32,
}

fn parse_positive<T>(raw: &str) -> Result<T, String>
where
    T: FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value = raw.parse::<T>().map_err(|error| error.to_string())?;
    if value > T::default() {
        Ok(value)
    } else {
        Err(format!("'{raw}' must be a positive number"))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(error) = init_tracing(cli.log_format.into()) {
        eprintln!("failed to initialise logging: {error}");
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            exit_code_for(&error)
        }
    }
}

fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<SweepError>() {
        Some(SweepError::AlreadySeeded { .. }) => ExitCode::from(2),
        Some(SweepError::IncompleteSweep { .. } | SweepError::NumericDivergence(_)) => {
            ExitCode::from(3)
        }
        _ => ExitCode::FAILURE,
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Seed {
            locations,
            grid,
            execution,
            results_file,
            deadline_secs,
        } => {
            let settings = RuntimeSettings {
                status_dir: locations.status_dir,
                results_dir: locations.results_dir,
                results_file_name: results_file,
                sweep: grid.config(),
                worker_threads: execution.threads,
                retry: RetryPolicy {
                    max_attempts: execution.max_attempts,
                    ..RetryPolicy::default()
                },
                sweep_deadline: Duration::from_secs(deadline_secs),
                ..RuntimeSettings::default()
            };
            run_seed(&settings)
        }
        Commands::Local {
            grid,
            name,
            threads,
            no_progress,
        } => {
            let sink = sink_for(&name);
            let report = run_local(&grid.config(), &PendulumWorker, sink.as_ref(), threads, !no_progress)
                .with_context(|| format!("local sweep into {}", name.display()))?;
            print_json(&report)
        }
        Commands::Monitor {
            server_name,
            server_port,
            metric_prefix,
            queues,
            rabbitmqctl,
        } => {
            let settings = MonitoringSettings {
                server_name,
                server_port,
                metric_prefix,
                queues,
                rabbitmqctl,
                ..MonitoringSettings::default()
            };
            let broker = RabbitmqctlBroker::new(&settings.rabbitmqctl);
            let sink = TcpMetricSink::new(
                settings.server_name.clone(),
                settings.server_port,
                settings.connect_timeout,
            );
            let lines = monitor_queues(&settings, &broker, &sink, Utc::now().timestamp())
                .context("queue monitoring pass")?;
            print_json(&json!({ "lines_sent": lines, "endpoint": sink.endpoint() }))
        }
        Commands::Status { locations } => {
            let store = FsStatusStore::new(&locations.status_dir);
            let mut markers = BTreeMap::new();
            for status in LifecycleStatus::ALL {
                let recorded = store
                    .read_status(status.as_str())
                    .with_context(|| format!("reading '{status}' marker"))?;
                markers.insert(status.as_str(), recorded);
            }
            print_json(&json!({
                "status_dir": locations.status_dir.display().to_string(),
                "markers": markers,
            }))
        }
        Commands::Summary { path } => {
            let rows = read_results_csv(&path)
                .with_context(|| format!("reading results table {}", path.display()))?;
            let divergent = rows
                .iter()
                .filter(|row| ![row.x1, row.x2, row.y1, row.y2].iter().all(|v| v.is_finite()))
                .count();
            print_json(&json!({
                "path": path.display().to_string(),
                "rows": rows.len(),
                "non_finite_rows": divergent,
            }))
        }
    }
}

fn run_seed(settings: &RuntimeSettings) -> anyhow::Result<()> {
    let store = FsStatusStore::new(&settings.status_dir);
    let queue = InProcessQueue::new(
        DEFAULT_QUEUE_NAME,
        Arc::new(PendulumWorker),
        settings.worker_threads,
        settings.retry,
    )?;
    let results_path = settings.results_path();
    let sink = sink_for(&results_path);
    let deps = SweepDependencies {
        status_store: &store,
        queue: &queue,
        sink: sink.as_ref(),
        deadline: settings.sweep_deadline,
    };

    let report = seed_sweep(&settings.sweep, &deps)
        .with_context(|| format!("seeding sweep into {}", results_path.display()))?;
    print_json(&report)
}

fn sink_for(path: &Path) -> Box<dyn ResultSink> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Box::new(JsonResultWriter::new(path)),
        _ => Box::new(CsvResultWriter::new(path)),
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
