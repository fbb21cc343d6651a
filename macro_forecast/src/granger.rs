//! Pairwise Granger causality over a return table
//!
//! Every ordered pair of distinct series is tested independently (in parallel
//! on the rayon pool). A pair that cannot be computed leaves its cell absent
//! and records a [`GrangerDiagnostic`]; the rest of the matrix still completes.

use crate::data::TimeSeriesTable;
use crate::error::{ForecastError, Result};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;
use ts_math::distributions::f_survival;
use ts_math::ols;

/// Square table keyed by `(cause, effect)` series names
///
/// The diagonal is never populated, and neither are cells whose test failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CausalityMatrix<T> {
    series: Vec<String>,
    cells: BTreeMap<String, BTreeMap<String, T>>,
}

impl<T> CausalityMatrix<T> {
    pub fn new(series: Vec<String>) -> Self {
        Self {
            series,
            cells: BTreeMap::new(),
        }
    }

    /// Row and column labels, in table order
    pub fn series(&self) -> &[String] {
        &self.series
    }

    pub fn get(&self, cause: &str, effect: &str) -> Option<&T> {
        self.cells.get(cause).and_then(|row| row.get(effect))
    }

    fn insert(&mut self, cause: &str, effect: &str, value: T) {
        self.cells
            .entry(cause.to_string())
            .or_default()
            .insert(effect.to_string(), value);
    }

    /// Number of defined cells
    pub fn len(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Defined cells as `(cause, effect, value)` in table order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &T)> + '_ {
        self.series.iter().flat_map(move |cause| {
            self.series.iter().filter_map(move |effect| {
                self.get(cause, effect)
                    .map(|value| (cause.as_str(), effect.as_str(), value))
            })
        })
    }
}

/// F test of one lag order
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LagTest {
    pub lag: usize,
    pub f_statistic: f64,
    pub p_value: f64,
    pub df_num: usize,
    pub df_den: usize,
}

/// A pair whose test could not be computed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrangerDiagnostic {
    pub cause: String,
    pub effect: String,
    /// Lag at which the failure occurred, if it was lag specific
    pub lag: Option<usize>,
    pub reason: String,
}

impl fmt::Display for GrangerDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lag {
            Some(lag) => write!(
                f,
                "{} -> {} at lag {}: {}",
                self.cause, self.effect, lag, self.reason
            ),
            None => write!(f, "{} -> {}: {}", self.cause, self.effect, self.reason),
        }
    }
}

/// Minimum p-values and significance flags for every ordered pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrangerMatrix {
    pub p_values: CausalityMatrix<f64>,
    pub significant: CausalityMatrix<bool>,
    pub max_lag: usize,
    pub significance: f64,
    pub diagnostics: Vec<GrangerDiagnostic>,
}

/// One row of the ranked causality summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrangerRecord {
    pub cause: String,
    pub effect: String,
    /// `None` when the pair could not be computed
    pub min_p_value: Option<f64>,
    pub significant: bool,
}

/// Minimum number of aligned rows for a test up to `max_lag`
pub fn min_observations(max_lag: usize) -> usize {
    3 * max_lag + 2
}

/// Rows where both series are finite
fn aligned(effect: &[f64], cause: &[f64]) -> (Vec<f64>, Vec<f64>) {
    effect
        .iter()
        .zip(cause)
        .filter(|(e, c)| e.is_finite() && c.is_finite())
        .map(|(e, c)| (*e, *c))
        .unzip()
}

fn lagged_design(effect: &[f64], cause: Option<&[f64]>, lag: usize) -> DMatrix<f64> {
    let nobs = effect.len() - lag;
    let ncols = 1 + lag * if cause.is_some() { 2 } else { 1 };
    DMatrix::from_fn(nobs, ncols, |row, col| {
        let t = row + lag;
        match col {
            0 => 1.0,
            c if c <= lag => effect[t - c],
            c => cause.map_or(0.0, |x| x[t - (c - lag)]),
        }
    })
}

/// SSR-based F tests of `cause` Granger-causing `effect` for lags `1..=max_lag`
///
/// Rows where either series is not finite are dropped first.
pub fn granger_test(effect: &[f64], cause: &[f64], max_lag: usize) -> Result<Vec<LagTest>> {
    if max_lag == 0 {
        return Err(ForecastError::InvalidInput(
            "max_lag must be at least 1".to_string(),
        ));
    }
    if effect.len() != cause.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: format!("{} rows", effect.len()),
            found: format!("{} rows", cause.len()),
        });
    }

    let (effect, cause) = aligned(effect, cause);

    let needed = min_observations(max_lag);
    if effect.len() < needed {
        return Err(ForecastError::InvalidInput(format!(
            "{} aligned rows, need at least {} for max lag {}",
            effect.len(),
            needed,
            max_lag
        )));
    }

    (1..=max_lag).map(|lag| lag_test(&effect, &cause, lag)).collect()
}

fn lag_test(effect: &[f64], cause: &[f64], lag: usize) -> Result<LagTest> {
    let y = DVector::from_column_slice(&effect[lag..]);
    let restricted = ols(&lagged_design(effect, None, lag), &y)?;
    let unrestricted = ols(&lagged_design(effect, Some(cause), lag), &y)?;

    let df_num = lag;
    let df_den = y.len() - 2 * lag - 1;
    let f_statistic = ((restricted.ssr - unrestricted.ssr) / df_num as f64)
        / (unrestricted.ssr / df_den as f64);
    let p_value = f_survival(f_statistic, df_num as f64, df_den as f64)?;

    Ok(LagTest {
        lag,
        f_statistic,
        p_value,
        df_num,
        df_den,
    })
}

fn pair_min_p_value(
    effect: &[f64],
    cause: &[f64],
    max_lag: usize,
) -> std::result::Result<f64, (Option<usize>, String)> {
    let (effect, cause) = aligned(effect, cause);
    let needed = min_observations(max_lag);
    if effect.len() < needed {
        return Err((
            None,
            format!(
                "{} aligned rows, need at least {} for max lag {}",
                effect.len(),
                needed,
                max_lag
            ),
        ));
    }

    (1..=max_lag).try_fold(f64::INFINITY, |best, lag| {
        lag_test(&effect, &cause, lag)
            .map(|test| best.min(test.p_value))
            .map_err(|e| (Some(lag), e.to_string()))
    })
}

/// Test every ordered pair of distinct columns up to `max_lag`
pub fn pairwise_test(
    returns: &TimeSeriesTable,
    max_lag: usize,
    significance: f64,
) -> Result<GrangerMatrix> {
    if max_lag == 0 {
        return Err(ForecastError::InvalidInput(
            "max_lag must be at least 1".to_string(),
        ));
    }
    if !(significance > 0.0 && significance < 1.0) {
        return Err(ForecastError::InvalidInput(format!(
            "significance must lie in (0, 1), got {}",
            significance
        )));
    }

    let n = returns.n_columns();
    let pairs: Vec<(usize, usize)> = (0..n)
        .flat_map(|cause| (0..n).filter(move |&effect| effect != cause).map(move |effect| (cause, effect)))
        .collect();

    let outcomes: Vec<_> = pairs
        .par_iter()
        .map(|&(cause, effect)| {
            let outcome =
                pair_min_p_value(returns.column_at(effect), returns.column_at(cause), max_lag);
            (cause, effect, outcome)
        })
        .collect();

    let series = returns.columns().to_vec();
    let mut p_values = CausalityMatrix::new(series.clone());
    let mut significant = CausalityMatrix::new(series.clone());
    let mut diagnostics = Vec::new();

    for (cause, effect, outcome) in outcomes {
        let (cause, effect) = (&series[cause], &series[effect]);
        match outcome {
            Ok(p) => {
                p_values.insert(cause, effect, p);
                significant.insert(cause, effect, p < significance);
            }
            Err((lag, reason)) => {
                warn!(%cause, %effect, ?lag, %reason, "Granger test failed");
                diagnostics.push(GrangerDiagnostic {
                    cause: cause.clone(),
                    effect: effect.clone(),
                    lag,
                    reason,
                });
            }
        }
    }

    Ok(GrangerMatrix {
        p_values,
        significant,
        max_lag,
        significance,
        diagnostics,
    })
}

fn compare_p(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ranked records from an existing matrix: significant first, then ascending
/// p-value, undefined p-values last
pub fn summarize_matrix(matrix: &GrangerMatrix) -> Vec<GrangerRecord> {
    let series = matrix.p_values.series();
    let mut records: Vec<GrangerRecord> = series
        .iter()
        .flat_map(|cause| {
            series.iter().filter(move |effect| *effect != cause).map(move |effect| {
                let min_p_value = matrix.p_values.get(cause, effect).copied();
                GrangerRecord {
                    cause: cause.clone(),
                    effect: effect.clone(),
                    min_p_value,
                    significant: matrix.significant.get(cause, effect).copied().unwrap_or(false),
                }
            })
        })
        .collect();

    records.sort_by(|a, b| {
        b.significant
            .cmp(&a.significant)
            .then_with(|| compare_p(a.min_p_value, b.min_p_value))
    });
    records
}

/// Run [`pairwise_test`] and rank the results
pub fn summarize(
    returns: &TimeSeriesTable,
    max_lag: usize,
    significance: f64,
) -> Result<Vec<GrangerRecord>> {
    Ok(summarize_matrix(&pairwise_test(returns, max_lag, significance)?))
}
