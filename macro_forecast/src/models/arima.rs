//! ARIMA models on the log of a price level
//!
//! Fitting is a two-step state machine:
//!
//! 1. [`ArimaForecaster::select_order`] picks `d` by repeated KPSS tests and
//!    runs a stepwise (Hyndman-Khandakar) AIC search over `(p, q)`, estimating
//!    each candidate by conditional sum of squares. The search finds a local
//!    optimum of AIC, not necessarily the global one.
//! 2. [`ArimaForecaster::refit`] re-estimates the chosen order by exact
//!    maximum likelihood.

use crate::config::ArimaConfig;
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::models::{FittedModel, ForecastResult};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};
use ts_math::arma::{fit_css_conditioned, fit_exact, ArmaEstimate, ArmaSpec};
use ts_math::optimize::NelderMead;
use ts_math::polynomial::{difference, difference_anchors, integrate, integrated_ar, psi_weights};
use ts_math::unit_root::kpss_differencing_order;

/// Significance of the KPSS tests that choose the differencing order
const KPSS_ALPHA: f64 = 0.05;

/// Non-seasonal ARIMA order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)
    }
}

/// AIC of one candidate visited by the order search
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateScore {
    pub order: ArimaOrder,
    pub aic: f64,
}

/// Outcome of the order search, waiting to be refitted
#[derive(Debug, Clone)]
pub struct SelectedOrder {
    pub order: ArimaOrder,
    /// Candidates that converged, in evaluation order
    pub candidates: Vec<CandidateScore>,
    search_estimate: ArmaEstimate,
    log_prices: Vec<f64>,
    last_date: NaiveDate,
}

/// ARIMA model estimated by exact maximum likelihood
#[derive(Debug, Clone)]
pub struct FittedArima {
    order: ArimaOrder,
    estimate: ArmaEstimate,
    candidates: Vec<CandidateScore>,
    /// Last value of each differencing level of the log prices
    anchors: Vec<f64>,
    last_date: NaiveDate,
}

#[derive(Debug, Clone)]
enum ArimaState {
    Unfitted,
    OrderSelected(SelectedOrder),
    Fitted(FittedArima),
}

/// Univariate forecaster for a price series
#[derive(Debug, Clone)]
pub struct ArimaForecaster {
    config: ArimaConfig,
    state: ArimaState,
}

impl Default for ArimaForecaster {
    fn default() -> Self {
        Self::new(ArimaConfig::default())
    }
}

impl ArimaForecaster {
    pub fn new(config: ArimaConfig) -> Self {
        Self {
            config,
            state: ArimaState::Unfitted,
        }
    }

    pub fn config(&self) -> &ArimaConfig {
        &self.config
    }

    /// Order chosen by the search, once one has run
    pub fn selected_order(&self) -> Option<ArimaOrder> {
        match &self.state {
            ArimaState::Unfitted => None,
            ArimaState::OrderSelected(selected) => Some(selected.order),
            ArimaState::Fitted(fitted) => Some(fitted.order),
        }
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, ArimaState::Fitted(_))
    }

    pub fn fitted(&self) -> Option<&FittedArima> {
        match &self.state {
            ArimaState::Fitted(fitted) => Some(fitted),
            _ => None,
        }
    }

    /// Consume the forecaster, keeping the fitted model if there is one
    pub fn into_fitted(self) -> Option<FittedArima> {
        match self.state {
            ArimaState::Fitted(fitted) => Some(fitted),
            _ => None,
        }
    }

    /// Choose `(p, d, q)` for the log of `prices`
    ///
    /// Seasonal models are not supported and `seasonal = true` is rejected.
    pub fn select_order(&mut self, prices: &PriceSeries, seasonal: bool) -> Result<ArimaOrder> {
        if seasonal {
            return Err(ForecastError::InvalidInput(
                "seasonal ARIMA search is not supported".to_string(),
            ));
        }
        let last_date = prices.last_date().ok_or_else(|| {
            ForecastError::InvalidInput(format!("series '{}' is empty", prices.name()))
        })?;
        if let Some(i) = prices.values().iter().position(|p| *p <= 0.0) {
            return Err(ForecastError::InvalidInput(format!(
                "series '{}' has non-positive price {} on {}",
                prices.name(),
                prices.values()[i],
                prices.dates()[i]
            )));
        }

        let log_prices: Vec<f64> = prices.values().iter().map(|p| p.ln()).collect();
        let d = kpss_differencing_order(&log_prices, KPSS_ALPHA, self.config.max_d).map_err(
            |e| ForecastError::NonComputableSeries {
                series: prices.name().to_string(),
                reason: e.to_string(),
            },
        )?;
        let differenced = difference(&log_prices, d);

        let (search_estimate, order, candidates) = self.stepwise_search(&differenced, d)?;
        info!(
            series = prices.name(),
            %order,
            aic = search_estimate.aic(),
            candidates = candidates.len(),
            "selected ARIMA order"
        );

        self.state = ArimaState::OrderSelected(SelectedOrder {
            order,
            candidates,
            search_estimate,
            log_prices,
            last_date,
        });
        Ok(order)
    }

    fn stepwise_search(
        &self,
        differenced: &[f64],
        d: usize,
    ) -> Result<(ArmaEstimate, ArimaOrder, Vec<CandidateScore>)> {
        let mut search = StepwiseSearch {
            config: &self.config,
            data: differenced,
            d,
            optimizer: NelderMead::default(),
            visited: HashMap::new(),
            candidates: Vec::new(),
            last_failure: None,
        };

        let mut best: Option<((usize, usize), f64)> = None;
        for start in [(0, 0), (1, 0), (0, 1)] {
            if let Some(aic) = search.evaluate(start) {
                if best.map_or(true, |(_, b)| aic < b) {
                    best = Some((start, aic));
                }
            }
        }

        while let Some(((p, q), best_aic)) = best {
            if search.exhausted() {
                break;
            }
            let mut improved: Option<((usize, usize), f64)> = None;
            for (dp, dq) in NEIGHBOURS {
                let (Some(np), Some(nq)) = (p.checked_add_signed(dp), q.checked_add_signed(dq))
                else {
                    continue;
                };
                if let Some(aic) = search.evaluate((np, nq)) {
                    if aic < best_aic && improved.map_or(true, |(_, b)| aic < b) {
                        improved = Some(((np, nq), aic));
                    }
                }
            }
            match improved {
                Some(next) => best = Some(next),
                None => break,
            }
        }

        let ((p, q), _) = best.ok_or_else(|| ForecastError::NonConvergence {
            model: format!("ARIMA(p,{},q) search", d),
            reason: search
                .last_failure
                .clone()
                .unwrap_or_else(|| "no candidate order converged".to_string()),
        })?;
        let estimate = search
            .visited
            .remove(&(p, q))
            .flatten()
            .ok_or_else(|| ForecastError::NonConvergence {
                model: format!("ARIMA({},{},{})", p, d, q),
                reason: "selected candidate has no estimate".to_string(),
            })?;

        Ok((estimate, ArimaOrder { p, d, q }, search.candidates))
    }

    /// Re-estimate the selected order by exact maximum likelihood
    pub fn refit(&mut self) -> Result<()> {
        let selected = match &self.state {
            ArimaState::OrderSelected(selected) => selected,
            ArimaState::Fitted(_) => return Ok(()),
            ArimaState::Unfitted => {
                return Err(ForecastError::NotFitted(
                    "select an ARIMA order before refitting".to_string(),
                ))
            }
        };

        let order = selected.order;
        let differenced = difference(&selected.log_prices, order.d);
        let estimate = fit_exact(
            &differenced,
            selected.search_estimate.spec,
            Some(&selected.search_estimate.params),
            &NelderMead::default(),
        )
        .map_err(|e| ForecastError::NonConvergence {
            model: order.to_string(),
            reason: e.to_string(),
        })?;
        if !estimate.converged {
            return Err(ForecastError::NonConvergence {
                model: order.to_string(),
                reason: format!(
                    "maximum likelihood stopped after {} evaluations",
                    estimate.evaluations
                ),
            });
        }

        let anchors = difference_anchors(&selected.log_prices, order.d)?;
        info!(
            %order,
            log_likelihood = estimate.log_likelihood,
            aic = estimate.aic(),
            "refitted ARIMA by maximum likelihood"
        );

        let fitted = FittedArima {
            order,
            estimate,
            candidates: selected.candidates.clone(),
            anchors,
            last_date: selected.last_date,
        };
        self.state = ArimaState::Fitted(fitted);
        Ok(())
    }

    /// Select an order and refit it
    pub fn fit(&mut self, prices: &PriceSeries, seasonal: bool) -> Result<ArimaOrder> {
        let order = self.select_order(prices, seasonal)?;
        self.refit()?;
        Ok(order)
    }

    /// Price forecast for `steps` days with a `1 - alpha` interval
    pub fn forecast(&self, steps: usize, alpha: f64) -> Result<ForecastResult> {
        match &self.state {
            ArimaState::Fitted(fitted) => fitted.forecast(steps, alpha),
            _ => Err(ForecastError::NotFitted(
                "ARIMA model has not been fitted".to_string(),
            )),
        }
    }
}

const NEIGHBOURS: [(isize, isize); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
];

struct StepwiseSearch<'a> {
    config: &'a ArimaConfig,
    data: &'a [f64],
    d: usize,
    optimizer: NelderMead,
    /// `None` marks a candidate that failed
    visited: HashMap<(usize, usize), Option<ArmaEstimate>>,
    candidates: Vec<CandidateScore>,
    last_failure: Option<String>,
}

impl StepwiseSearch<'_> {
    fn exhausted(&self) -> bool {
        self.visited.len() >= self.config.max_iterations
    }

    fn admissible(&self, p: usize, q: usize) -> bool {
        p <= self.config.max_p && q <= self.config.max_q && p + q <= self.config.max_order
    }

    /// AIC of `(p, q)`, fitting it on first visit
    fn evaluate(&mut self, (p, q): (usize, usize)) -> Option<f64> {
        if let Some(previous) = self.visited.get(&(p, q)) {
            return previous.as_ref().map(ArmaEstimate::aic);
        }
        if !self.admissible(p, q) || self.exhausted() {
            return None;
        }

        let order = ArimaOrder { p, d: self.d, q };
        let spec = ArmaSpec::new(p, q, self.d == 0);
        // every candidate conditions on the first max_p observations
        let fitted = fit_css_conditioned(self.data, spec, self.config.max_p, &self.optimizer);
        let outcome = match fitted {
            Ok(estimate) if estimate.converged && estimate.aic().is_finite() => Ok(estimate),
            Ok(estimate) => Err(format!(
                "CSS stopped after {} evaluations",
                estimate.evaluations
            )),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(estimate) => {
                let aic = estimate.aic();
                debug!(%order, aic, "evaluated candidate");
                self.candidates.push(CandidateScore { order, aic });
                self.visited.insert((p, q), Some(estimate));
                Some(aic)
            }
            Err(reason) => {
                debug!(%order, %reason, "skipping candidate");
                self.last_failure = Some(format!("{}: {}", order, reason));
                self.visited.insert((p, q), None);
                None
            }
        }
    }
}

impl FittedArima {
    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// Whether a constant was estimated (only when `d = 0`)
    pub fn has_constant(&self) -> bool {
        self.estimate.spec.include_mean
    }

    /// Named coefficient estimates
    pub fn coefficients(&self) -> Vec<(String, f64)> {
        self.estimate.named_coefficients()
    }

    /// Standard errors aligned with [`coefficients`](Self::coefficients)
    pub fn std_errors(&self) -> Option<Vec<f64>> {
        self.estimate.std_errors()
    }

    /// Innovation variance of the differenced log prices
    pub fn sigma2(&self) -> f64 {
        self.estimate.sigma2
    }

    pub fn log_likelihood(&self) -> f64 {
        self.estimate.log_likelihood
    }

    pub fn bic(&self) -> f64 {
        self.estimate.bic()
    }

    /// Candidates visited by the order search
    pub fn candidates(&self) -> &[CandidateScore] {
        &self.candidates
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last_date
    }

    /// Log-price mean path and standard errors `h = 1..=steps` ahead
    pub fn log_forecast(&self, steps: usize) -> (Vec<f64>, Vec<f64>) {
        let differenced_mean = self.estimate.forecast(steps);
        let mean = integrate(&differenced_mean, &self.anchors);

        let ar = integrated_ar(&self.estimate.params.ar, self.order.d);
        let psi = psi_weights(&ar, &self.estimate.params.ma, steps);
        let mut cumulative = 0.0;
        let std_errors = psi
            .iter()
            .map(|w| {
                cumulative += w * w;
                (self.estimate.sigma2 * cumulative).sqrt()
            })
            .collect();

        (mean, std_errors)
    }

    /// Price forecast for `steps` days with a `1 - alpha` interval
    pub fn forecast(&self, steps: usize, alpha: f64) -> Result<ForecastResult> {
        if steps == 0 {
            return Err(ForecastError::InvalidInput(
                "forecast steps must be at least 1".to_string(),
            ));
        }
        let (mean, std_errors) = self.log_forecast(steps);
        ForecastResult::from_log_space(self.label(), self.last_date, &mean, &std_errors, alpha)
    }
}

impl FittedModel for FittedArima {
    fn label(&self) -> String {
        self.order.to_string()
    }

    fn nobs(&self) -> usize {
        self.estimate.nobs
    }

    fn aic(&self) -> f64 {
        self.estimate.aic()
    }

    fn summary(&self) -> String {
        let mut out = format!(
            "{} on log prices, {} observations\n",
            self.order,
            self.estimate.nobs
        );
        out.push_str(&format!(
            "log-likelihood {:.3}  AIC {:.3}  BIC {:.3}  sigma2 {:.6e}\n",
            self.estimate.log_likelihood,
            self.estimate.aic(),
            self.estimate.bic(),
            self.estimate.sigma2
        ));
        let std_errors = self.std_errors();
        for (i, (name, value)) in self.coefficients().iter().enumerate() {
            match std_errors.as_ref().and_then(|se| se.get(i)) {
                Some(se) => out.push_str(&format!("  {:<8} {:>12.6} ({:.6})\n", name, value, se)),
                None => out.push_str(&format!("  {:<8} {:>12.6}\n", name, value)),
            }
        }
        out
    }
}
