//! Combined forecast table export

use crate::error::{ForecastError, Result};
use crate::models::{ForecastPoint, ForecastResult};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

pub const DATE_COLUMN: &str = "Date";
pub const ARIMA_COLUMNS: [&str; 3] = ["ARIMA_Forecast", "ARIMA_Lower_CI", "ARIMA_Upper_CI"];
pub const VAR_COLUMNS: [&str; 3] = ["VAR_Forecast", "VAR_Lower_CI", "VAR_Upper_CI"];

/// `(forecast, lower, upper)` rounded to cents
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Band {
    pub forecast: f64,
    pub lower: f64,
    pub upper: f64,
}

impl From<&ForecastPoint> for Band {
    fn from(point: &ForecastPoint) -> Self {
        Self {
            forecast: round2(point.forecast),
            lower: round2(point.lower),
            upper: round2(point.upper),
        }
    }
}

/// One date of the outer join of both models' forecasts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedRow {
    pub date: NaiveDate,
    pub arima: Option<Band>,
    pub var: Option<Band>,
}

/// ARIMA and VAR forecasts joined on date
///
/// A model passed as `None` has no columns in the output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedForecast {
    has_arima: bool,
    has_var: bool,
    rows: Vec<CombinedRow>,
}

/// Round to two decimals, ties to even
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| format!("{:?}", v)).unwrap_or_default()
}

impl CombinedForecast {
    pub fn new(arima: Option<&ForecastResult>, var: Option<&ForecastResult>) -> Result<Self> {
        if arima.is_none() && var.is_none() {
            return Err(ForecastError::InvalidInput(
                "no forecast to export".to_string(),
            ));
        }

        let mut joined: BTreeMap<NaiveDate, CombinedRow> = BTreeMap::new();
        let empty = |date| CombinedRow {
            date,
            arima: None,
            var: None,
        };
        for point in arima.iter().flat_map(|r| r.points()) {
            joined.entry(point.date).or_insert_with(|| empty(point.date)).arima =
                Some(Band::from(point));
        }
        for point in var.iter().flat_map(|r| r.points()) {
            joined.entry(point.date).or_insert_with(|| empty(point.date)).var =
                Some(Band::from(point));
        }

        Ok(Self {
            has_arima: arima.is_some(),
            has_var: var.is_some(),
            rows: joined.into_values().collect(),
        })
    }

    pub fn rows(&self) -> &[CombinedRow] {
        &self.rows
    }

    pub fn headers(&self) -> Vec<&'static str> {
        let mut headers = vec![DATE_COLUMN];
        if self.has_arima {
            headers.extend(ARIMA_COLUMNS);
        }
        if self.has_var {
            headers.extend(VAR_COLUMNS);
        }
        headers
    }

    fn record(&self, row: &CombinedRow) -> Vec<String> {
        let mut record = vec![row.date.format("%Y-%m-%d").to_string()];
        let mut push_band = |band: Option<Band>| {
            record.push(format_value(band.map(|b| b.forecast)));
            record.push(format_value(band.map(|b| b.lower)));
            record.push(format_value(band.map(|b| b.upper)));
        };
        if self.has_arima {
            push_band(row.arima);
        }
        if self.has_var {
            push_band(row.var);
        }
        record
    }

    /// Write the table as CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(self.headers())?;
        for row in &self.rows {
            csv.write_record(self.record(row))?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write the table to `path`, creating parent directories
    pub fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.write_csv(File::create(path)?)
    }
}
