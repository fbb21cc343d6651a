//! Log-return transform and return correlations

use crate::data::{PriceTable, ReturnTable, TimeSeriesTable};
use crate::error::{ForecastError, Result};
use serde::Serialize;
use ts_math::mean;

/// Continuously compounded returns `r[t] = ln(P[t] / P[t-1])`
///
/// The result is one row shorter than `prices` and indexed from the second
/// date. Fails if any price is non-positive.
pub fn log_returns(prices: &PriceTable) -> Result<ReturnTable> {
    if prices.len() < 2 {
        return Err(ForecastError::InvalidInput(format!(
            "log returns need at least 2 rows, got {}",
            prices.len()
        )));
    }

    let dates = prices.dates();
    let mut values = Vec::with_capacity(prices.n_columns());
    for (i, name) in prices.columns().iter().enumerate() {
        let column = prices.column_at(i);
        if let Some(t) = column.iter().position(|p| *p <= 0.0) {
            return Err(ForecastError::InvalidInput(format!(
                "column '{}' has non-positive price {} on {}",
                name, column[t], dates[t]
            )));
        }
        values.push(column.windows(2).map(|w| (w[1] / w[0]).ln()).collect());
    }

    let table = TimeSeriesTable::new(dates[1..].to_vec(), prices.columns().to_vec(), values)?;
    Ok(ReturnTable::new(table))
}

/// Pearson correlation matrix of the columns of a table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub series: Vec<String>,
    /// Row-major, `values[i][j]` pairs `series[i]` with `series[j]`
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.series.iter().position(|s| s == a)?;
        let j = self.series.iter().position(|s| s == b)?;
        Some(self.values[i][j])
    }
}

/// Pairwise Pearson correlations; pairs involving a constant column are `NaN`
pub fn correlation(table: &TimeSeriesTable) -> CorrelationMatrix {
    let k = table.n_columns();
    let centered: Vec<Vec<f64>> = (0..k)
        .map(|i| {
            let column = table.column_at(i);
            let m = mean(column);
            column.iter().map(|v| v - m).collect()
        })
        .collect();
    let norms: Vec<f64> = centered
        .iter()
        .map(|c| c.iter().map(|v| v * v).sum::<f64>().sqrt())
        .collect();

    let values = (0..k)
        .map(|i| {
            (0..k)
                .map(|j| {
                    let cross: f64 = centered[i].iter().zip(&centered[j]).map(|(a, b)| a * b).sum();
                    cross / (norms[i] * norms[j])
                })
                .collect()
        })
        .collect();

    CorrelationMatrix {
        series: table.columns().to_vec(),
        values,
    }
}
