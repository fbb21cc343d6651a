//! Date-indexed price and return tables

use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use tracing::debug;

/// Days from 0001-01-01 (CE day 1) to 1970-01-01
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Column store shared by [`PriceTable`] and [`ReturnTable`]
///
/// Dates are strictly increasing and every cell is a finite number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesTable {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl TimeSeriesTable {
    /// Build a table from a date index and one value vector per column
    pub fn new(dates: Vec<NaiveDate>, columns: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        if columns.is_empty() {
            return Err(ForecastError::InvalidInput(
                "table needs at least one column".to_string(),
            ));
        }
        if columns.len() != values.len() {
            return Err(ForecastError::InvalidInput(format!(
                "{} column names for {} value columns",
                columns.len(),
                values.len()
            )));
        }
        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(ForecastError::InvalidInput(format!(
                    "duplicate column '{}'",
                    name
                )));
            }
        }
        for (name, column) in columns.iter().zip(&values) {
            if column.len() != dates.len() {
                return Err(ForecastError::InvalidInput(format!(
                    "column '{}' has {} values for {} dates",
                    name,
                    column.len(),
                    dates.len()
                )));
            }
            if let Some(i) = column.iter().position(|v| !v.is_finite()) {
                return Err(ForecastError::InvalidInput(format!(
                    "column '{}' has a missing value on {}",
                    name, dates[i]
                )));
            }
        }
        if let Some(w) = dates.windows(2).find(|w| w[1] <= w[0]) {
            return Err(ForecastError::InvalidInput(format!(
                "dates must be strictly increasing, found {} followed by {}",
                w[0], w[1]
            )));
        }

        Ok(Self {
            dates,
            columns,
            values,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of a named column
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.column_index(name).map(|i| self.values[i].as_slice())
    }

    /// Values of a named column, or `InvalidInput` naming the missing column
    pub fn require_column(&self, name: &str) -> Result<&[f64]> {
        self.column(name).ok_or_else(|| {
            ForecastError::InvalidInput(format!(
                "column '{}' not found (available: {})",
                name,
                self.columns.join(", ")
            ))
        })
    }

    /// Values of the column at `index`
    pub fn column_at(&self, index: usize) -> &[f64] {
        &self.values[index]
    }

    /// All values of row `index` in column order
    pub fn row(&self, index: usize) -> Vec<f64> {
        self.values.iter().map(|c| c[index]).collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Last `n` rows (all rows if `n` exceeds the length)
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        Self {
            dates: self.dates[start..].to_vec(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|c| c[start..].to_vec()).collect(),
        }
    }

    /// One named column with the date index
    pub fn series(&self, name: &str) -> Result<PriceSeries> {
        Ok(PriceSeries {
            name: name.to_string(),
            dates: self.dates.clone(),
            values: self.require_column(name)?.to_vec(),
        })
    }

    /// Table restricted to the named columns, in the given order
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let values = names
            .iter()
            .map(|name| self.require_column(name).map(<[f64]>::to_vec))
            .collect::<Result<Vec<_>>>()?;
        Self::new(
            self.dates.clone(),
            names.iter().map(|n| n.to_string()).collect(),
            values,
        )
    }

    /// Convert to a DataFrame with a `Date` column followed by the value columns
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let days: Vec<i32> = self
            .dates
            .iter()
            .map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
            .collect();
        let mut series = vec![Series::new("Date", days).cast(&DataType::Date)?];
        for (name, column) in self.columns.iter().zip(&self.values) {
            series.push(Series::new(name.as_str(), column.clone()));
        }
        Ok(DataFrame::new(series)?)
    }
}

/// A single date-indexed series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    name: String,
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl PriceSeries {
    pub fn new(name: impl Into<String>, dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        let table = TimeSeriesTable::new(dates, vec![name.clone()], vec![values])?;
        let TimeSeriesTable {
            dates, mut values, ..
        } = table;
        Ok(Self {
            name,
            dates,
            values: values.remove(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}

/// Daily closing prices, one column per series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTable(TimeSeriesTable);

/// Log-returns derived from a [`PriceTable`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnTable(TimeSeriesTable);

impl PriceTable {
    pub fn new(table: TimeSeriesTable) -> Self {
        Self(table)
    }

    pub fn into_inner(self) -> TimeSeriesTable {
        self.0
    }
}

impl ReturnTable {
    pub fn new(table: TimeSeriesTable) -> Self {
        Self(table)
    }

    pub fn into_inner(self) -> TimeSeriesTable {
        self.0
    }
}

impl Deref for PriceTable {
    type Target = TimeSeriesTable;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Deref for ReturnTable {
    type Target = TimeSeriesTable;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Loader for cached daily price files
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a price table from a CSV file with a date column and one column per series
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<PriceTable> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(df)
    }

    /// Create a price table from an existing DataFrame
    ///
    /// Rows are sorted by date, gaps are forward-filled and rows still
    /// incomplete (leading gaps, missing dates) are dropped.
    pub fn from_dataframe(df: DataFrame) -> Result<PriceTable> {
        let time_column = Self::detect_time_column(&df)?;
        let dates = Self::parse_dates(df.column(&time_column)?)?;

        let mut order: Vec<usize> = (0..dates.len()).filter(|&i| dates[i].is_some()).collect();
        order.sort_by_key(|&i| dates[i]);

        let mut columns = Vec::new();
        let mut raw = Vec::new();
        for series in df.get_columns() {
            if series.name() == time_column {
                continue;
            }
            let cast = series.cast(&DataType::Float64).map_err(|_| {
                ForecastError::InvalidInput(format!("column '{}' is not numeric", series.name()))
            })?;
            let unordered: Vec<Option<f64>> = cast
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect();
            let mut values: Vec<Option<f64>> = order.iter().map(|&i| unordered[i]).collect();
            forward_fill(&mut values);
            columns.push(series.name().to_string());
            raw.push(values);
        }

        let complete: Vec<usize> = (0..order.len())
            .filter(|&row| raw.iter().all(|c| c[row].is_some()))
            .collect();
        let dropped = dates.len() - complete.len();
        if dropped > 0 {
            debug!(dropped, "dropped incomplete rows from price data");
        }

        let dates: Vec<NaiveDate> = complete
            .iter()
            .filter_map(|&row| dates[order[row]])
            .collect();
        let values: Vec<Vec<f64>> = raw
            .iter()
            .map(|c| complete.iter().filter_map(|&row| c[row]).collect())
            .collect();

        Ok(PriceTable::new(TimeSeriesTable::new(dates, columns, values)?))
    }

    /// Detect the date column in a DataFrame
    fn detect_time_column(df: &DataFrame) -> Result<String> {
        for name in df.get_column_names() {
            let lower_name = name.to_lowercase();
            if lower_name.contains("date") || lower_name.contains("time") {
                return Ok(name.to_string());
            }
        }

        if let Some(first_col) = df.get_columns().first() {
            if first_col.dtype().is_temporal() {
                return Ok(first_col.name().to_string());
            }
        }

        Err(ForecastError::InvalidInput(
            "No date column found in data".to_string(),
        ))
    }

    fn parse_dates(series: &Series) -> Result<Vec<Option<NaiveDate>>> {
        let from_epoch_days =
            |days: i64| NaiveDate::from_num_days_from_ce_opt(days as i32 + UNIX_EPOCH_DAYS_FROM_CE);

        let dates = match series.dtype() {
            DataType::Date => series
                .date()?
                .into_iter()
                .map(|d| d.and_then(|days| from_epoch_days(days as i64)))
                .collect(),
            DataType::Datetime(unit, _) => {
                let per_day: i64 = match unit {
                    TimeUnit::Nanoseconds => 86_400_000_000_000,
                    TimeUnit::Microseconds => 86_400_000_000,
                    TimeUnit::Milliseconds => 86_400_000,
                };
                series
                    .datetime()?
                    .into_iter()
                    .map(|ts| ts.and_then(|ts| from_epoch_days(ts.div_euclid(per_day))))
                    .collect()
            }
            DataType::Utf8 => series
                .utf8()?
                .into_iter()
                .map(|s| s.and_then(parse_date))
                .collect(),
            other => {
                return Err(ForecastError::InvalidInput(format!(
                    "column '{}' of type {} cannot be read as dates",
                    series.name(),
                    other
                )))
            }
        };
        Ok(dates)
    }
}

/// Parse `YYYY-MM-DD`, ignoring any time-of-day suffix
fn parse_date(text: &str) -> Option<NaiveDate> {
    let day = text.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn forward_fill(values: &mut [Option<f64>]) {
    let mut last = None;
    for v in values.iter_mut() {
        match v {
            Some(x) => last = Some(*x),
            None => *v = last,
        }
    }
}
