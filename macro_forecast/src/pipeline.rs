//! End-to-end analysis of a price table

use crate::config::AnalysisConfig;
use crate::data::{PriceTable, ReturnTable};
use crate::error::{ForecastError, Result};
use crate::export::CombinedForecast;
use crate::granger::{pairwise_test, summarize_matrix, GrangerMatrix, GrangerRecord};
use crate::models::arima::{ArimaForecaster, FittedArima};
use crate::models::var::{FittedVar, LagSelection, VarForecaster};
use crate::models::{FittedModel, ForecastResult};
use crate::returns::{correlation, log_returns, CorrelationMatrix};
use crate::stationarity::{test_all, StationarityResult};
use tracing::{info, warn};

/// ARIMA fit and forecast of the target price
#[derive(Debug, Clone)]
pub struct ArimaOutcome {
    pub fitted: FittedArima,
    pub forecast: ForecastResult,
}

/// VAR lag choice, fit and forecast of the target price
#[derive(Debug, Clone)]
pub struct VarOutcome {
    pub lag_selection: LagSelection,
    pub fitted: FittedVar,
    pub forecast: ForecastResult,
}

/// Everything one run produces
///
/// The two models fail independently, so each carries its own result.
#[derive(Debug)]
pub struct AnalysisReport {
    pub returns: ReturnTable,
    pub stationarity: Vec<StationarityResult>,
    pub correlation: CorrelationMatrix,
    pub granger: GrangerMatrix,
    pub granger_summary: Vec<GrangerRecord>,
    pub arima: Result<ArimaOutcome>,
    pub var: Result<VarOutcome>,
}

impl AnalysisReport {
    /// Join the forecasts of the models that succeeded
    pub fn combined_forecast(&self) -> Result<CombinedForecast> {
        CombinedForecast::new(
            self.arima.as_ref().ok().map(|o| &o.forecast),
            self.var.as_ref().ok().map(|o| &o.forecast),
        )
    }
}

/// Run the analysis on `prices` with `config`
pub fn run(prices: &PriceTable, config: &AnalysisConfig) -> Result<AnalysisReport> {
    config.validate()?;
    prices.require_column(&config.target)?;

    let returns = log_returns(prices)?;
    info!(
        rows = returns.len(),
        series = returns.n_columns(),
        "computed log returns"
    );

    let stationarity = test_all(&returns)?;
    for result in stationarity.iter().filter(|r| !r.is_stationary()) {
        warn!(
            series = %result.series,
            statistic = result.statistic,
            p_value = result.p_value,
            "log returns are not stationary"
        );
    }

    let correlation = correlation(&returns);

    let granger = pairwise_test(&returns, config.granger.max_lag, config.granger.significance)?;
    let granger_summary = summarize_matrix(&granger);
    info!(
        significant = granger_summary.iter().filter(|r| r.significant).count(),
        failed = granger.diagnostics.len(),
        "Granger causality tests complete"
    );

    let (arima, var) = rayon::join(
        || run_arima(prices, config),
        || run_var(prices, &returns, config),
    );
    if let Err(e) = &arima {
        warn!(error = %e, "ARIMA model failed");
    }
    if let Err(e) = &var {
        warn!(error = %e, "VAR model failed");
    }

    Ok(AnalysisReport {
        returns,
        stationarity,
        correlation,
        granger,
        granger_summary,
        arima,
        var,
    })
}

fn run_arima(prices: &PriceTable, config: &AnalysisConfig) -> Result<ArimaOutcome> {
    let series = prices.series(&config.target)?;
    let mut forecaster = ArimaForecaster::new(config.arima.clone());
    forecaster.fit(&series, false)?;
    let forecast = forecaster.forecast(config.steps, config.alpha)?;
    let fitted = forecaster
        .into_fitted()
        .ok_or_else(|| ForecastError::NotFitted("ARIMA model was not retained".to_string()))?;
    info!(model = %fitted.label(), "ARIMA forecast ready");
    Ok(ArimaOutcome { fitted, forecast })
}

fn run_var(prices: &PriceTable, returns: &ReturnTable, config: &AnalysisConfig) -> Result<VarOutcome> {
    let mut forecaster =
        VarForecaster::new(config.target.clone()).with_interval_method(config.var.interval_method);
    let lag_selection = forecaster.select_lag(returns, config.var.max_lag, config.var.criterion)?;
    forecaster.fit(returns, lag_selection.lag)?;

    let last_price = prices
        .require_column(&config.target)?
        .last()
        .copied()
        .ok_or_else(|| ForecastError::InvalidInput("price table is empty".to_string()))?;
    let forecast = forecaster.forecast(returns, last_price, config.steps, config.alpha)?;
    let fitted = forecaster
        .into_fitted()
        .ok_or_else(|| ForecastError::NotFitted("VAR model was not retained".to_string()))?;
    info!(model = %fitted.label(), "VAR forecast ready");
    Ok(VarOutcome {
        lag_selection,
        fitted,
        forecast,
    })
}
