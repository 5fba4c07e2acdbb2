//! CSV ingest and normalization.
//!
//! Thermobench writes one header row such as
//! `time/ms,CPU_0_temp/m°C,CPU0_work_done,...` followed by numeric rows. A
//! cell is empty when the sensor produced no value for that period.
//!
//! Design goals:
//! - **Strict schema**: a `time` column is required, malformed numbers are
//!   errors with their line number (exit code 2)
//! - **Units handled once**: time always ends up in seconds; other columns are
//!   normalized on request and their `/unit` suffix stripped
//! - **Separation of concerns**: no interpolation or fitting here

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::debug;

use crate::domain::{Column, MetaValue, TimeSeries};
use crate::error::AppError;

/// Name of the time column once its unit is stripped.
pub const TIME_COLUMN: &str = "time";

/// `(unit, normalized unit, factor)`: value_normalized = value · factor.
const UNIT_RULES: &[(&str, &str, f64)] = &[
    ("ms", "s", 1e-3),
    ("m°C", "°C", 1e-3),
    ("mC", "°C", 1e-3),
    ("‰", "%", 0.1),
    ("per-mille", "%", 0.1),
    ("kHz", "MHz", 1e-3),
    ("Hz", "MHz", 1e-6),
    ("GHz", "MHz", 1e3),
    ("uV", "mV", 1e-3),
    ("µV", "mV", 1e-3),
    ("V", "mV", 1e3),
];

/// Options for reading one CSV source.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    /// Series label; defaults to the file stem.
    pub name: Option<String>,
    pub normalize_units: bool,
    pub strip_units: bool,
    /// Opaque key/value pairs attached to the series.
    pub metadata: BTreeMap<String, MetaValue>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            name: None,
            normalize_units: true,
            strip_units: true,
            metadata: BTreeMap::new(),
        }
    }
}

/// Read a thermobench CSV file.
pub fn read_series(path: &Path, opts: &ReadOptions) -> Result<TimeSeries, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open CSV '{}': {e}", path.display())))?;
    let name = opts.name.clone().unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    });
    let opts = ReadOptions {
        name: Some(name),
        ..opts.clone()
    };
    read_series_from_reader(file, &opts)
}

/// Read a thermobench CSV from any byte stream.
pub fn read_series_from_reader<R: Read>(input: R, opts: &ReadOptions) -> Result<TimeSeries, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::invalid_input(format!("Failed to read CSV headers: {e}")))?
        .iter()
        .map(normalize_header_name)
        .collect();

    let time_idx = headers
        .iter()
        .position(|h| split_unit(h).0 == TIME_COLUMN)
        .ok_or_else(|| AppError::invalid_input("CSV has no 'time' column."))?;

    let mut cells: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len()];
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header; lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::invalid_input(format!("CSV parse error on line {line}: {e}")))?;
        parse_row(&record, &headers, line, &mut cells)?;
    }

    let (time_name, time_unit) = split_unit(&headers[time_idx]);
    let time_factor = match time_unit {
        None | Some("s") => 1.0,
        Some(unit) => unit_rule(unit)
            .filter(|(to, _)| *to == "s")
            .map(|(_, f)| f)
            .ok_or_else(|| AppError::invalid_input(format!("Unsupported time unit '{unit}'.")))?,
    };
    let time: Vec<f64> = cells[time_idx]
        .iter()
        .map(|&v| v.map_or(f64::NAN, |t| t * time_factor))
        .collect();
    debug!(column = time_name, rows = time.len(), "time column");

    let columns: Vec<Column> = headers
        .iter()
        .zip(cells)
        .enumerate()
        .filter(|(i, _)| *i != time_idx)
        .map(|(_, (h, values))| Column::new(h.clone(), values))
        .collect();

    let mut series = TimeSeries::new(opts.name.clone().unwrap_or_default(), time, columns)?;
    series.metadata.extend(opts.metadata.clone());
    if opts.normalize_units {
        normalize_units(&mut series);
    }
    if opts.strip_units {
        strip_units(&mut series)?;
    }
    Ok(series)
}

/// Convert every value column with a known unit to its normalized unit
/// (`°C`, `%`, `MHz`, `mV`), renaming the unit suffix accordingly.
pub fn normalize_units(series: &mut TimeSeries) {
    for col in series.columns.iter_mut() {
        let (base, Some(unit)) = split_unit(&col.name) else {
            continue;
        };
        let Some((to, factor)) = unit_rule(unit) else {
            continue;
        };
        col.name = format!("{base}/{to}");
        for v in col.values.iter_mut().flatten() {
            *v *= factor;
        }
    }
}

/// Remove the `/unit` suffix from column names.
pub fn strip_units(series: &mut TimeSeries) -> Result<(), AppError> {
    let stripped: Vec<String> = series
        .columns
        .iter()
        .map(|c| split_unit(&c.name).0.to_string())
        .collect();
    for (i, name) in stripped.iter().enumerate() {
        if stripped[..i].contains(name) {
            return Err(AppError::invalid_input(format!(
                "Stripping units makes column '{name}' ambiguous in '{}'.",
                series.name
            )));
        }
    }
    for (col, name) in series.columns.iter_mut().zip(stripped) {
        col.name = name;
    }
    Ok(())
}

/// `"CPU_0_temp/m°C"` → `("CPU_0_temp", Some("m°C"))`.
pub fn split_unit(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('/') {
        Some((base, unit)) if !base.is_empty() && !unit.is_empty() => (base, Some(unit)),
        _ => (name, None),
    }
}

fn unit_rule(unit: &str) -> Option<(&'static str, f64)> {
    UNIT_RULES
        .iter()
        .find(|(from, _, _)| *from == unit)
        .map(|&(_, to, factor)| (to, factor))
}

fn parse_row(
    record: &StringRecord,
    headers: &[String],
    line: usize,
    cells: &mut [Vec<Option<f64>>],
) -> Result<(), AppError> {
    for (i, out) in cells.iter_mut().enumerate() {
        let raw = record.get(i).unwrap_or("");
        let value = if raw.is_empty() {
            None
        } else {
            Some(raw.parse::<f64>().map_err(|_| {
                AppError::invalid_input(format!(
                    "Invalid number '{raw}' in column '{}' on line {line}.",
                    headers[i]
                ))
            })?)
        };
        out.push(value);
    }
    Ok(())
}

fn normalize_header_name(name: &str) -> String {
    // Strip a UTF-8 BOM that spreadsheet tools put on the first header.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const SAMPLE: &str = "\
time/ms,CPU_0_temp/m°C,CPU0_work_done,cpu_freq/kHz
0,40000,,1200000
1000,41500,100,
2000,,250,1400000
";

    #[test]
    fn reads_and_normalizes_thermobench_csv() {
        let opts = ReadOptions {
            name: Some("run".into()),
            ..ReadOptions::default()
        };
        let s = read_series_from_reader(SAMPLE.as_bytes(), &opts).unwrap();
        assert_eq!(s.name, "run");
        assert_eq!(s.time, vec![0.0, 1.0, 2.0]);
        assert_eq!(
            s.column_names().collect::<Vec<_>>(),
            vec!["CPU_0_temp", "CPU0_work_done", "cpu_freq"]
        );
        let temp = &s.column("CPU_0_temp").unwrap().values;
        assert!((temp[0].unwrap() - 40.0).abs() < 1e-12);
        assert_eq!(temp[2], None);
        assert_eq!(s.column("CPU0_work_done").unwrap().values[0], None);
        assert!((s.column("cpu_freq").unwrap().values[0].unwrap() - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn units_can_be_kept() {
        let opts = ReadOptions {
            normalize_units: false,
            strip_units: false,
            ..ReadOptions::default()
        };
        let s = read_series_from_reader(SAMPLE.as_bytes(), &opts).unwrap();
        // Time is always seconds.
        assert_eq!(s.time, vec![0.0, 1.0, 2.0]);
        assert_eq!(s.columns[0].name, "CPU_0_temp/m°C");
        assert_eq!(s.columns[0].values[0], Some(40000.0));
    }

    #[test]
    fn metadata_is_attached() {
        let mut opts = ReadOptions::default();
        opts.metadata.insert("board".into(), MetaValue::from("imx8"));
        let s = read_series_from_reader(SAMPLE.as_bytes(), &opts).unwrap();
        assert_eq!(s.metadata.get("board"), Some(&MetaValue::from("imx8")));
    }

    #[test]
    fn rejects_missing_time_and_bad_numbers() {
        let err = read_series_from_reader("a,b\n1,2\n".as_bytes(), &ReadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = read_series_from_reader("time,a\n0,x\n".as_bytes(), &ReadOptions::default()).unwrap_err();
        assert!(err.message().contains("line 2"));
    }

    #[test]
    fn file_stem_names_the_series() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imx8-fan.csv");
        std::fs::write(&path, SAMPLE).unwrap();
        let s = read_series(&path, &ReadOptions::default()).unwrap();
        assert_eq!(s.name, "imx8-fan");

        let err = read_series(&dir.path().join("missing.csv"), &ReadOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn split_unit_handles_plain_names() {
        assert_eq!(split_unit("time/ms"), ("time", Some("ms")));
        assert_eq!(split_unit("ambient"), ("ambient", None));
        assert_eq!(split_unit("/x"), ("/x", None));
    }
}
