//! Export series and multi-fit results.
//!
//! The CSV outputs are meant to be easy to consume in spreadsheets or
//! downstream scripts; the JSON output carries the full result (including
//! fitted parameters and uncertainties) for external plot renderers.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{MultiFitResult, TimeSeries, Value};
use crate::error::AppError;
use crate::io::ingest::TIME_COLUMN;
use crate::report::format_model;

/// Write a series back to CSV; absent values become empty cells.
pub fn write_series_csv(path: &Path, series: &TimeSeries) -> Result<(), AppError> {
    let file = create(path)?;
    write_series(file, series)
}

pub fn write_series<W: Write>(out: W, series: &TimeSeries) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(out);

    let mut header = vec![TIME_COLUMN.to_string()];
    header.extend(series.column_names().map(str::to_string));
    w.write_record(&header).map_err(write_err)?;

    for (i, t) in series.time.iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(if t.is_finite() { t.to_string() } else { String::new() });
        record.extend(
            series
                .columns
                .iter()
                .map(|c| c.values[i].map(|v| v.to_string()).unwrap_or_default()),
        );
        w.write_record(&record).map_err(write_err)?;
    }
    w.flush().map_err(|e| AppError::io(format!("Failed to flush CSV: {e}")))
}

/// Write one line per multi-fit row:
/// `name,column,rmse,ops,Tinf,k1..,tau1..,model`.
pub fn write_multi_fit_csv(path: &Path, result: &MultiFitResult) -> Result<(), AppError> {
    let file = create(path)?;
    write_multi_fit(file, result)
}

pub fn write_multi_fit<W: Write>(out: W, result: &MultiFitResult) -> Result<(), AppError> {
    let mut w = csv::Writer::from_writer(out);

    let mut header: Vec<String> = ["name", "column", "rmse", "ops", "Tinf"].map(String::from).to_vec();
    header.extend((1..=result.order).map(|i| format!("k{i}")));
    header.extend((1..=result.order).map(|i| format!("tau{i}")));
    header.push("model".to_string());
    w.write_record(&header).map_err(write_err)?;

    for r in &result.rows {
        let mut record = vec![
            r.source_name.clone(),
            r.column.clone(),
            r.rmse.to_string(),
            r.ops.map(|v| v.to_cell()).unwrap_or_default(),
            r.t_inf.to_cell(),
        ];
        record.extend(r.k.iter().map(Value::to_cell));
        record.extend(r.tau.iter().map(Value::to_cell));
        record.push(format_model(&r.model, false));
        w.write_record(&record).map_err(write_err)?;
    }
    w.flush().map_err(|e| AppError::io(format!("Failed to flush CSV: {e}")))
}

/// Full result as pretty JSON.
pub fn write_multi_fit_json(path: &Path, result: &MultiFitResult) -> Result<(), AppError> {
    let file = create(path)?;
    serde_json::to_writer_pretty(file, result)
        .map_err(|e| AppError::io(format!("Failed to write JSON '{}': {e}", path.display())))
}

fn create(path: &Path) -> Result<File, AppError> {
    File::create(path).map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))
}

fn write_err(e: csv::Error) -> AppError {
    AppError::io(format!("Failed to write CSV row: {e}"))
}
