use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "q-search CLI - Checkpointed, resumable parameter sweeps of expensive model optimizations.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sweep the mass ratio over a grid, optimizing the model once per grid value.
    Search(SearchArgs),
    /// Summarize the solutions persisted by one or more sweeps.
    Summary(SummaryArgs),
}

/// Arguments for the `search` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
    // --- Model ---
    /// Path to the model bundle; supports JSON and gzipped JSON.
    #[arg(short = 'p', long = "path", value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Grid ---
    /// Lower bound of the q-grid.
    #[arg(long, value_name = "FLOAT", allow_negative_numbers = true)]
    pub q_min: Option<f64>,

    /// Upper bound of the q-grid (inclusive).
    #[arg(long, value_name = "FLOAT", allow_negative_numbers = true)]
    pub q_max: Option<f64>,

    /// Interval step of the q-grid.
    #[arg(long, value_name = "FLOAT")]
    pub q_step: Option<f64>,

    /// Fix the inclination at this value and run a full q-sweep for it.
    /// Can be used multiple times; each value gets its own solution directory.
    #[arg(long = "incl", value_name = "DEG", action = clap::ArgAction::Append)]
    pub incl: Vec<f64>,

    // --- Execution ---
    /// Number of worker threads. Defaults to half of the available logical cores.
    #[arg(short = 'j', long = "n-procs", value_name = "NUM")]
    pub n_procs: Option<usize>,

    /// Maximum number of optimizer iterations per grid value.
    #[arg(long = "nm-maxiter", value_name = "INT")]
    pub nm_maxiter: Option<usize>,

    /// Parent directory for the solution directories. Defaults to the current directory.
    #[arg(long, value_name = "PATH")]
    pub solution_dir: Option<PathBuf>,

    // --- Optimizer ---
    /// Executable that performs optimizations (`<PROGRAM> optimize <model> <config>`)
    /// and goodness-of-fit computations (`<PROGRAM> compute <model>`).
    #[arg(long, value_name = "PROGRAM")]
    pub optimizer: Option<PathBuf>,

    /// Extra leading argument passed to the optimizer program. Can be used multiple times.
    #[arg(long = "optimizer-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub optimizer_args: Vec<String>,

    /// Record the optimizer's own objective instead of computing the goodness of fit
    /// after each optimization.
    #[arg(long)]
    pub no_goodness_of_fit: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S sweep.disabled-inputs=mesh01,lc02
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `summary` subcommand.
#[derive(Args, Debug, Clone)]
pub struct SummaryArgs {
    /// Campaign root (the `--solution-dir` of the search) or a single solution directory.
    #[arg(default_value = ".", value_name = "PATH")]
    pub root: PathBuf,

    /// Name of the per-sweep solution directory.
    #[arg(long, default_value = "q-solutions", value_name = "NAME")]
    pub sweep_dir: String,

    /// Also export every solution as CSV to this path.
    #[arg(long, value_name = "PATH")]
    pub csv: Option<PathBuf>,
}
