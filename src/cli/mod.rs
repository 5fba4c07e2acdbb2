//! Command-line parsing for the thermal fit tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting code; `app` maps these structs onto the library's option types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{SolverKind, WORK_DONE_PATTERN};
use crate::fit::Bound;
use crate::models::DEFAULT_ORDER;
use crate::throughput::DEFAULT_ALPHA;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "thermofit", version, about = "Fit thermal decay models to thermobench logs")]
pub struct Cli {
    /// Log solver details (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit columns of one or more CSV files and print the result table.
    Fit(FitArgs),
    /// Estimate pooled throughput from work counters.
    Ops(OpsArgs),
    /// Fill gaps in a CSV by linear interpolation.
    Interpolate(InterpolateArgs),
    /// Write a synthetic thermobench-like CSV.
    Synth(SynthArgs),
}

/// Options shared by every command that reads CSV input.
#[derive(Debug, Args, Clone)]
pub struct InputArgs {
    /// Keep column units as recorded (time is still converted to seconds).
    #[arg(long)]
    pub keep_units: bool,

    /// Calibrate `cam_*` columns against CPU_0_temp before anything else.
    #[arg(long)]
    pub thermocam: bool,
}

/// Throughput estimation flags.
#[derive(Debug, Args, Clone)]
pub struct ThroughputArgs {
    /// Regular expression selecting cumulative counter columns.
    #[arg(long, default_value = WORK_DONE_PATTERN)]
    pub pattern: String,

    /// Significance level of the confidence interval.
    #[arg(long, default_value_t = DEFAULT_ALPHA)]
    pub alpha: f64,

    /// Drop infinite rates caused by repeated time stamps.
    #[arg(long)]
    pub drop_inf: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// CSV files, one source each.
    #[arg(required = true, value_name = "CSV")]
    pub files: Vec<PathBuf>,

    /// Column to fit (repeatable; default: every `temp` column).
    #[arg(short, long = "column")]
    pub columns: Vec<String>,

    /// Number of exponential terms.
    #[arg(short, long, default_value_t = DEFAULT_ORDER)]
    pub order: usize,

    /// Reference column subtracted before fitting (e.g. ambient).
    #[arg(long)]
    pub subtract: Option<String>,

    /// Label replacing every source name.
    #[arg(long)]
    pub name: Option<String>,

    /// Report values with their uncertainties.
    #[arg(short, long)]
    pub measurements: bool,

    /// Least-squares back-end.
    #[arg(long, value_enum, default_value_t = SolverKind::Bounded)]
    pub solver: SolverKind,

    /// T_inf bounds as LO:HI.
    #[arg(long, value_parser = parse_bound, default_value = "0:120")]
    pub tinf_bounds: Bound,

    /// k bounds as LO:HI, one per term; the last one repeats.
    #[arg(long, value_parser = parse_bound)]
    pub k_bounds: Vec<Bound>,

    /// tau bounds in seconds as LO:HI, one per term; the last one repeats.
    #[arg(long, value_parser = parse_bound)]
    pub tau_bounds: Vec<Bound>,

    /// Solver iteration budget.
    #[arg(long, default_value_t = 500)]
    pub max_iter: usize,

    /// Also estimate throughput of every source.
    #[arg(long)]
    pub ops: bool,

    #[command(flatten)]
    pub throughput: ThroughputArgs,

    #[command(flatten)]
    pub input: InputArgs,

    /// Show time constants in minutes.
    #[arg(long)]
    pub minutes: bool,

    /// Export one line per fitted column to CSV.
    #[arg(long = "export-csv")]
    pub export_csv: Option<PathBuf>,

    /// Export the full result to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct OpsArgs {
    #[arg(required = true, value_name = "CSV")]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub throughput: ThroughputArgs,

    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct InterpolateArgs {
    #[arg(value_name = "CSV")]
    pub file: PathBuf,

    /// Only this column (default: all).
    #[arg(short, long)]
    pub column: Option<String>,

    /// Output file (default: stdout).
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output file (default: stdout).
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Run length in seconds.
    #[arg(long, default_value_t = 1800.0)]
    pub duration: f64,

    /// Sampling period in seconds.
    #[arg(long, default_value_t = 1.0)]
    pub period: f64,

    /// Standard deviation of the temperature noise (°C).
    #[arg(long, default_value_t = 0.1)]
    pub noise: f64,

    /// Number of work counters.
    #[arg(long, default_value_t = 4)]
    pub cores: usize,
}

fn parse_bound(s: &str) -> Result<Bound, String> {
    let (lo, hi) = s
        .split_once(':')
        .ok_or_else(|| format!("expected LO:HI, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid bound '{v}': {e}"))
    };
    Ok((parse(lo)?, parse(hi)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::DEFAULT_T_INF_BOUNDS;

    #[test]
    fn parses_fit_command() {
        let cli = Cli::parse_from([
            "thermofit",
            "fit",
            "a.csv",
            "b.csv",
            "-c",
            "CPU_0_temp",
            "-c",
            "CPU_1_temp",
            "--tau-bounds",
            "1:60",
            "--ops",
            "-v",
        ]);
        assert!(cli.verbose);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.columns, vec!["CPU_0_temp", "CPU_1_temp"]);
        assert_eq!(args.tau_bounds, vec![(1.0, 60.0)]);
        assert_eq!(args.tinf_bounds, DEFAULT_T_INF_BOUNDS);
        assert!(args.k_bounds.is_empty());
        assert_eq!(args.throughput.pattern, "work_done");
    }

    #[test]
    fn fit_columns_are_optional() {
        let cli = Cli::parse_from(["thermofit", "fit", "a.csv"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert!(args.columns.is_empty());
    }

    #[test]
    fn bound_parser_rejects_garbage() {
        assert_eq!(parse_bound("-8:8"), Ok((-8.0, 8.0)));
        assert!(parse_bound("8").is_err());
        assert!(parse_bound("a:1").is_err());
    }
}
