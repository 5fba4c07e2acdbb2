//! Shared "fit pipeline" logic used by the CLI commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> optional camera calibration -> interpolate/subtract -> fit -> table

use std::path::PathBuf;

use tracing::info;

use crate::aggregate::{MultiFitOptions, multi_fit};
use crate::domain::{ColumnRole, ColumnSchema, MultiFitResult, TimeSeries};
use crate::error::AppError;
use crate::io::ingest::{ReadOptions, read_series};
use crate::prep::thermocam_correct;

/// All computed outputs of a single `thermofit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub sources: Vec<TimeSeries>,
    pub result: MultiFitResult,
}

/// Read every file as one source, calibrating camera columns on request.
pub fn load_sources(paths: &[PathBuf], read: &ReadOptions, thermocam: bool) -> Result<Vec<TimeSeries>, AppError> {
    paths
        .iter()
        .map(|path| {
            let mut series = read_series(path, read)?;
            if thermocam {
                let (gain, offset) = thermocam_correct(&mut series)?;
                info!(series = %series.name, gain, offset, "camera columns calibrated");
            }
            info!(series = %series.name, rows = series.len(), columns = series.columns.len(), "loaded");
            Ok(series)
        })
        .collect()
}

/// Temperature columns of the first source, minus the subtracted reference.
///
/// Used when `fit` is run without any `--column`.
pub fn default_columns(sources: &[TimeSeries], subtract: Option<&str>) -> Result<Vec<String>, AppError> {
    let Some(first) = sources.first() else {
        return Err(AppError::invalid_input("No input series given."));
    };
    let mut columns = ColumnSchema::standard()?.resolve(first, ColumnRole::Temperature);
    columns.retain(|c| Some(c.as_str()) != subtract);
    if columns.is_empty() {
        return Err(AppError::invalid_input(format!(
            "No temperature columns in '{}'; select columns with --column.",
            first.name
        )));
    }
    info!(?columns, "fitting temperature columns");
    Ok(columns)
}

/// Execute the full fitting pipeline and return the computed outputs.
///
/// An empty `columns` selects every temperature column (see [`default_columns`]).
pub fn run_fit(
    paths: &[PathBuf],
    read: &ReadOptions,
    thermocam: bool,
    columns: &[String],
    opts: &MultiFitOptions,
) -> Result<RunOutput, AppError> {
    let sources = load_sources(paths, read, thermocam)?;
    let result = if columns.is_empty() {
        let columns = default_columns(&sources, opts.subtract.as_deref())?;
        multi_fit(&sources, &columns, opts)?
    } else {
        multi_fit(&sources, columns, opts)?
    };
    Ok(RunOutput { sources, result })
}
