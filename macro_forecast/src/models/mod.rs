//! Forecasting models and their shared price-level forecast type

use crate::error::{ForecastError, Result};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::fmt::Debug;
use ts_math::distributions::two_sided_z;

pub mod arima;
pub mod var;

/// One forecast horizon in price-level units
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub forecast: f64,
    pub lower: f64,
    pub upper: f64,
    /// Standard error of the log-price forecast
    pub log_std_error: f64,
}

/// Price forecast over consecutive future days
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    /// Label of the producing model, e.g. `ARIMA(1,1,0)`
    model: String,
    /// Interval coverage, `1 - alpha`
    confidence: f64,
    points: Vec<ForecastPoint>,
}

impl ForecastResult {
    /// Create a forecast result from ordered points
    pub fn new(model: impl Into<String>, confidence: f64, points: Vec<ForecastPoint>) -> Result<Self> {
        if let Some(w) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(ForecastError::InvalidInput(format!(
                "forecast dates must increase, found {} followed by {}",
                w[0].date, w[1].date
            )));
        }
        Ok(Self {
            model: model.into(),
            confidence,
            points,
        })
    }

    /// Build a price forecast from a log-price mean path and its standard errors
    ///
    /// The mean and both bounds are exponentiated independently, so the
    /// price-level point is the median rather than the mean of the implied
    /// log-normal distribution.
    pub fn from_log_space(
        model: impl Into<String>,
        last_date: NaiveDate,
        log_mean: &[f64],
        log_std_errors: &[f64],
        alpha: f64,
    ) -> Result<Self> {
        if log_mean.len() != log_std_errors.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: format!("{} standard errors", log_mean.len()),
                found: format!("{}", log_std_errors.len()),
            });
        }
        let z = two_sided_z(alpha)?;
        let dates = future_dates(last_date, log_mean.len())?;

        let points = dates
            .into_iter()
            .zip(log_mean.iter().zip(log_std_errors))
            .map(|(date, (&mean, &se))| {
                let (forecast, lower, upper) = back_transform(mean, se, z);
                ForecastPoint {
                    date,
                    forecast,
                    lower,
                    upper,
                    log_std_error: se,
                }
            })
            .collect();

        Self::new(model, 1.0 - alpha, points)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    /// Number of forecast horizons
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    /// Point forecasts
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.forecast).collect()
    }

    /// `(lower, upper)` interval per horizon
    pub fn intervals(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.lower, p.upper)).collect()
    }
}

/// A fitted model that can describe itself
pub trait FittedModel: Debug {
    /// Short label such as `ARIMA(1,1,0)` or `VAR(2)`
    fn label(&self) -> String;

    /// Observations used in estimation
    fn nobs(&self) -> usize;

    /// Akaike information criterion of the fit
    fn aic(&self) -> f64;

    /// Multi-line text description of the estimates
    fn summary(&self) -> String;
}

/// Map a log-space mean and standard error to `(point, lower, upper)` prices
pub fn back_transform(log_mean: f64, log_std_error: f64, z: f64) -> (f64, f64, f64) {
    let margin = z * log_std_error;
    (
        log_mean.exp(),
        (log_mean - margin).exp(),
        (log_mean + margin).exp(),
    )
}

/// `steps` consecutive days starting the day after `last`
pub fn future_dates(last: NaiveDate, steps: usize) -> Result<Vec<NaiveDate>> {
    (1..=steps as u64)
        .map(|h| {
            last.checked_add_days(Days::new(h)).ok_or_else(|| {
                ForecastError::InvalidInput(format!("{} + {} days is out of range", last, h))
            })
        })
        .collect()
}
