//! Thermal camera calibration.
//!
//! Camera readings (`cam_*` columns) are mapped onto the on-chip sensor scale
//! with a straight line fitted between `cam_cpu` and `CPU_0_temp`.

use tracing::debug;

use crate::domain::TimeSeries;
use crate::error::AppError;
use crate::math::ols::fit_line;

pub const CAMERA_PREFIX: &str = "cam_";
pub const CAMERA_REFERENCE: &str = "cam_cpu";
pub const SENSOR_REFERENCE: &str = "CPU_0_temp";

/// Calibrate every `cam_*` column in place and return `(gain, offset)`.
pub fn thermocam_correct(series: &mut TimeSeries) -> Result<(f64, f64), AppError> {
    let cam = series.require_column(CAMERA_REFERENCE)?;
    let sensor = series.require_column(SENSOR_REFERENCE)?;

    let (x, y): (Vec<f64>, Vec<f64>) = cam
        .values
        .iter()
        .zip(&sensor.values)
        .filter_map(|(c, s)| match (c, s) {
            (Some(c), Some(s)) if c.is_finite() && s.is_finite() => Some((*c, *s)),
            _ => None,
        })
        .unzip();

    let (gain, offset) = fit_line(&x, &y).ok_or_else(|| {
        AppError::invalid_input(format!(
            "Cannot calibrate '{}': need at least two rows where {CAMERA_REFERENCE} and \
             {SENSOR_REFERENCE} are both present.",
            series.name
        ))
    })?;
    debug!(series = %series.name, gain, offset, samples = x.len(), "thermocam calibration");

    for col in series.columns.iter_mut().filter(|c| c.name.starts_with(CAMERA_PREFIX)) {
        for v in col.values.iter_mut().flatten() {
            *v = gain * *v + offset;
        }
    }
    Ok((gain, offset))
}
