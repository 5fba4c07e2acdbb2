//! Column roles resolved by name.
//!
//! Thermobench logs name their columns by convention (`time`, `CPU_0_temp`,
//! `CPU3_work_done`, ...). Instead of scattering pattern lookups through the
//! code, a `ColumnSchema` maps each logical role to a regular expression and
//! resolves the matching column names once per series.

use regex::Regex;

use crate::domain::TimeSeries;
use crate::error::AppError;

/// Default rule for cumulative work counters.
pub const WORK_DONE_PATTERN: &str = "work_done";
/// Default rule for temperature channels.
pub const TEMPERATURE_PATTERN: &str = "temp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    /// Monotone cumulative counters used for throughput.
    ThroughputCounter,
    /// Temperature channels (fit targets).
    Temperature,
}

/// Matching rules: a column belongs to a role when the role's regular
/// expression finds a match anywhere in the column name.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    throughput: Regex,
    temperature: Regex,
}

impl ColumnSchema {
    pub fn new(throughput_pattern: &str, temperature_pattern: &str) -> Result<Self, AppError> {
        Ok(Self {
            throughput: compile(throughput_pattern)?,
            temperature: compile(temperature_pattern)?,
        })
    }

    /// Schema with the default `work_done` / `temp` rules.
    pub fn standard() -> Result<Self, AppError> {
        Self::new(WORK_DONE_PATTERN, TEMPERATURE_PATTERN)
    }

    /// Schema with a custom throughput rule and the default temperature rule.
    pub fn with_throughput(pattern: &str) -> Result<Self, AppError> {
        Self::new(pattern, TEMPERATURE_PATTERN)
    }

    fn regex(&self, role: ColumnRole) -> &Regex {
        match role {
            ColumnRole::ThroughputCounter => &self.throughput,
            ColumnRole::Temperature => &self.temperature,
        }
    }

    /// Names of the columns of `series` playing `role`, in column order.
    pub fn resolve(&self, series: &TimeSeries, role: ColumnRole) -> Vec<String> {
        let re = self.regex(role);
        series
            .column_names()
            .filter(|name| re.is_match(name))
            .map(str::to_string)
            .collect()
    }
}

fn compile(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(pattern)
        .map_err(|e| AppError::invalid_input(format!("Invalid column pattern '{pattern}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Column;

    fn series() -> TimeSeries {
        TimeSeries::new(
            "s",
            vec![0.0],
            vec![
                Column::dense("CPU_0_temp", &[40.0]),
                Column::dense("CPU0_work_done", &[1.0]),
                Column::dense("ambient", &[22.0]),
                Column::dense("CPU1_work_done", &[1.0]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn resolves_roles_in_column_order() {
        let schema = ColumnSchema::standard().unwrap();
        assert_eq!(
            schema.resolve(&series(), ColumnRole::ThroughputCounter),
            vec!["CPU0_work_done", "CPU1_work_done"]
        );
        assert_eq!(schema.resolve(&series(), ColumnRole::Temperature), vec!["CPU_0_temp"]);
    }

    #[test]
    fn custom_pattern_is_a_regex() {
        let schema = ColumnSchema::with_throughput(r"^CPU1_").unwrap();
        assert_eq!(
            schema.resolve(&series(), ColumnRole::ThroughputCounter),
            vec!["CPU1_work_done"]
        );
        assert!(ColumnSchema::with_throughput("(").is_err());
    }
}
