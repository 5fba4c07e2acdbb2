//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - loads CSV sources
//! - runs fits / throughput estimation
//! - prints reports and writes optional exports

use std::io;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::aggregate::MultiFitOptions;
use crate::cli::{Cli, Command, FitArgs, InputArgs, InterpolateArgs, OpsArgs, SynthArgs, ThroughputArgs};
use crate::data::synthetic::{SyntheticRun, generate_run};
use crate::error::AppError;
use crate::fit::{BoundsConfig, FitOptions, SolverSettings};
use crate::io::ingest::ReadOptions;
use crate::throughput::ThroughputOptions;

pub mod pipeline;

/// Entry point for the `thermofit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Ops(args) => handle_ops(args),
        Command::Interpolate(args) => handle_interpolate(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let read = read_options(&args.input);
    let opts = multi_fit_options_from_args(&args);
    let run = pipeline::run_fit(&args.files, &read, args.input.thermocam, &args.columns, &opts)?;

    println!("{}", crate::report::format_multi_fit(&run.result, args.minutes));

    if let Some(path) = &args.export_csv {
        crate::io::export::write_multi_fit_csv(path, &run.result)?;
    }
    if let Some(path) = &args.export_json {
        crate::io::export::write_multi_fit_json(path, &run.result)?;
    }
    Ok(())
}

fn handle_ops(args: OpsArgs) -> Result<(), AppError> {
    let read = read_options(&args.input);
    let opts = throughput_options(&args.throughput);
    let sources = pipeline::load_sources(&args.files, &read, args.input.thermocam)?;
    for s in &sources {
        let est = crate::throughput::ops_est(s, &opts)?;
        println!("{}", crate::report::format_throughput(&s.name, &est, opts.alpha));
    }
    Ok(())
}

fn handle_interpolate(args: InterpolateArgs) -> Result<(), AppError> {
    let read = read_options(&args.input);
    let mut sources = pipeline::load_sources(std::slice::from_ref(&args.file), &read, args.input.thermocam)?;
    let Some(series) = sources.first_mut() else {
        return Ok(());
    };
    crate::prep::interpolate_in_place(series, args.column.as_deref())?;
    match &args.output {
        Some(path) => crate::io::export::write_series_csv(path, series),
        None => crate::io::export::write_series(io::stdout().lock(), series),
    }
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let spec = SyntheticRun {
        duration_s: args.duration,
        period_s: args.period,
        noise_sd: args.noise,
        cores: args.cores,
        seed: args.seed,
        ..SyntheticRun::default()
    };
    let series = generate_run(&spec)?;
    match &args.output {
        Some(path) => crate::io::export::write_series_csv(path, &series),
        None => crate::io::export::write_series(io::stdout().lock(), &series),
    }
}

fn read_options(args: &InputArgs) -> ReadOptions {
    ReadOptions {
        normalize_units: !args.keep_units,
        strip_units: !args.keep_units,
        ..ReadOptions::default()
    }
}

fn throughput_options(args: &ThroughputArgs) -> ThroughputOptions {
    ThroughputOptions {
        pattern: args.pattern.clone(),
        alpha: args.alpha,
        drop_inf: args.drop_inf,
    }
}

pub fn multi_fit_options_from_args(args: &FitArgs) -> MultiFitOptions {
    let defaults = BoundsConfig::default();
    let bounds = BoundsConfig {
        t_inf: args.tinf_bounds,
        k: if args.k_bounds.is_empty() { defaults.k } else { args.k_bounds.clone() },
        tau: if args.tau_bounds.is_empty() { defaults.tau } else { args.tau_bounds.clone() },
    };
    MultiFitOptions {
        name: args.name.clone(),
        subtract: args.subtract.clone(),
        use_measurements: args.measurements,
        fit: FitOptions {
            order: args.order,
            bounds,
            initial_guess: None,
            solver: args.solver,
            settings: SolverSettings {
                max_iter: args.max_iter,
                ..SolverSettings::default()
            },
        },
        throughput: args.ops.then(|| throughput_options(&args.throughput)),
    }
}
