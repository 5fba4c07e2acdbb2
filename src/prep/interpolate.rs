//! Linear gap filling.
//!
//! An absent sample is replaced by the straight line between its nearest
//! present neighbours (by time). Absent samples before the first or after the
//! last present sample stay absent: we never extrapolate.

use crate::domain::TimeSeries;
use crate::error::AppError;

/// Fill gaps in one column. `time` must be fully present.
pub fn interpolate_values(time: &[f64], values: &[Option<f64>]) -> Result<Vec<Option<f64>>, AppError> {
    if time.len() != values.len() {
        return Err(AppError::invalid_input(format!(
            "Time and value lengths differ ({} vs {}).",
            time.len(),
            values.len()
        )));
    }
    ensure_time_present(time)?;

    let mut out = values.to_vec();
    let mut prev: Option<usize> = None;
    let mut i = 0;
    while i < values.len() {
        if values[i].is_some() {
            prev = Some(i);
            i += 1;
            continue;
        }
        // Find the end of this run of absent samples.
        let mut j = i;
        while j < values.len() && values[j].is_none() {
            j += 1;
        }
        if let (Some(a), true) = (prev, j < values.len()) {
            let (ya, yb) = (values[a].unwrap_or_default(), values[j].unwrap_or_default());
            for (k, slot) in out.iter_mut().enumerate().take(j).skip(i) {
                *slot = Some(linear_interp((time[a], ya), (time[j], yb), time[k]));
            }
        }
        i = j;
    }
    Ok(out)
}

/// Pure variant: returns an interpolated copy, `series` is untouched.
///
/// `column = None` interpolates every value column.
pub fn interpolate(series: &TimeSeries, column: Option<&str>) -> Result<TimeSeries, AppError> {
    let mut out = series.clone();
    interpolate_in_place(&mut out, column)?;
    Ok(out)
}

/// In-place variant of [`interpolate`].
pub fn interpolate_in_place(series: &mut TimeSeries, column: Option<&str>) -> Result<(), AppError> {
    ensure_time_present(&series.time)?;
    match column {
        Some(name) => {
            series.require_column(name)?;
            let time = &series.time;
            if let Some(col) = series.columns.iter_mut().find(|c| c.name == name) {
                col.values = interpolate_values(time, &col.values)?;
            }
        }
        None => {
            let time = &series.time;
            for col in series.columns.iter_mut() {
                col.values = interpolate_values(time, &col.values)?;
            }
        }
    }
    Ok(())
}

/// `target - reference` after interpolating both; absent wherever either side
/// is still absent.
pub fn subtract(series: &TimeSeries, target: &str, reference: &str) -> Result<Vec<Option<f64>>, AppError> {
    let a = interpolate_values(&series.time, &series.require_column(target)?.values)?;
    let b = interpolate_values(&series.time, &series.require_column(reference)?.values)?;
    Ok(a.iter()
        .zip(&b)
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if (x - y).is_finite() => Some(x - y),
            _ => None,
        })
        .collect())
}

fn ensure_time_present(time: &[f64]) -> Result<(), AppError> {
    if let Some(row) = time.iter().position(|t| !t.is_finite()) {
        return Err(AppError::invalid_input(format!("Time value missing at row {row}.")));
    }
    Ok(())
}

fn linear_interp(a: (f64, f64), b: (f64, f64), x: f64) -> f64 {
    let (x0, y0) = a;
    let (x1, y1) = b;
    if (x1 - x0).abs() < 1e-12 {
        return y0;
    }
    let u = (x - x0) / (x1 - x0);
    y0 + u * (y1 - y0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Column;
    use crate::error::ErrorKind;

    #[test]
    fn fills_single_gap_at_midpoint() {
        let out = interpolate_values(&[0.0, 5.0, 10.0], &[Some(0.0), None, Some(10.0)]).unwrap();
        assert_eq!(out, vec![Some(0.0), Some(5.0), Some(10.0)]);
    }

    #[test]
    fn uses_time_not_row_index() {
        let time = [0.0, 1.0, 2.0, 3.0, 1000.0, 1001.0];
        let v = [Some(0.0), None, None, None, Some(1000.0), None];
        let out = interpolate_values(&time, &v).unwrap();
        assert_eq!(out, vec![Some(0.0), Some(1.0), Some(2.0), Some(3.0), Some(1000.0), None]);
    }

    #[test]
    fn never_extrapolates_or_touches_present_values() {
        let time = [0.0, 1.0, 2.0, 3.0, 4.0];
        let v = [None, Some(3.0), None, Some(7.0), None];
        let out = interpolate_values(&time, &v).unwrap();
        assert_eq!(out, vec![None, Some(3.0), Some(5.0), Some(7.0), None]);
    }

    #[test]
    fn is_idempotent() {
        let series = TimeSeries::new(
            "s",
            vec![0.0, 1.0, 3.0, 4.0, 8.0],
            vec![
                Column::new("a", vec![None, Some(1.0), None, Some(4.0), None]),
                Column::new("b", vec![Some(2.0), None, None, None, Some(10.0)]),
            ],
        )
        .unwrap();
        let once = interpolate(&series, None).unwrap();
        let twice = interpolate(&once, None).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.column("b").unwrap().values[2], Some(5.0));
        // Original untouched by the pure variant.
        assert_eq!(series.column("b").unwrap().values[2], None);
    }

    #[test]
    fn single_column_leaves_others_alone() {
        let mut series = TimeSeries::new(
            "s",
            vec![0.0, 1.0, 2.0],
            vec![
                Column::new("a", vec![Some(0.0), None, Some(2.0)]),
                Column::new("b", vec![Some(0.0), None, Some(2.0)]),
            ],
        )
        .unwrap();
        interpolate_in_place(&mut series, Some("a")).unwrap();
        assert_eq!(series.column("a").unwrap().values[1], Some(1.0));
        assert_eq!(series.column("b").unwrap().values[1], None);
        assert!(interpolate_in_place(&mut series, Some("zzz")).is_err());
    }

    #[test]
    fn missing_time_is_invalid_input() {
        let err = interpolate_values(&[0.0, f64::NAN], &[Some(1.0), None]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn subtract_self_is_zero_where_present() {
        let series = TimeSeries::new(
            "s",
            vec![0.0, 1.0, 2.0, 3.0],
            vec![
                Column::new("t", vec![None, Some(40.0), None, Some(44.0)]),
                Column::new("amb", vec![Some(20.0), Some(21.0), Some(22.0), None]),
            ],
        )
        .unwrap();
        let zero = subtract(&series, "t", "t").unwrap();
        assert_eq!(zero, vec![None, Some(0.0), Some(0.0), Some(0.0)]);

        let diff = subtract(&series, "t", "amb").unwrap();
        assert_eq!(diff, vec![None, Some(19.0), Some(20.0), None]);
    }
}
