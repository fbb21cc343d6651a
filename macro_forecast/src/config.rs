//! Run configuration

use crate::error::{ForecastError, Result};
use crate::models::var::IntervalMethod;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use ts_math::InformationCriterion;

/// Environment variable naming a JSON configuration file
pub const CONFIG_ENV_VAR: &str = "MACRO_FORECAST_CONFIG";

/// Settings for one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Column forecast by both models
    pub target: String,
    pub granger: GrangerConfig,
    pub var: VarConfig,
    pub arima: ArimaConfig,
    /// Forecast horizon in days
    pub steps: usize,
    /// Two-sided interval level is `1 - alpha`
    pub alpha: f64,
    pub data_path: PathBuf,
    pub output_path: PathBuf,
}

/// Pairwise causality settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrangerConfig {
    pub max_lag: usize,
    pub significance: f64,
}

/// Vector autoregression settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarConfig {
    pub max_lag: usize,
    pub criterion: InformationCriterion,
    pub interval_method: IntervalMethod,
}

/// Order-search bounds for the ARIMA model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArimaConfig {
    pub max_p: usize,
    pub max_q: usize,
    pub max_d: usize,
    /// Bound on `p + q`
    pub max_order: usize,
    /// Bound on candidate models evaluated by the stepwise search
    pub max_iterations: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target: "Bitcoin".to_string(),
            granger: GrangerConfig::default(),
            var: VarConfig::default(),
            arima: ArimaConfig::default(),
            steps: 30,
            alpha: 0.05,
            data_path: PathBuf::from("data/raw_prices.csv"),
            output_path: PathBuf::from("results/forecast_summary.csv"),
        }
    }
}

impl Default for GrangerConfig {
    fn default() -> Self {
        Self {
            max_lag: 5,
            significance: 0.05,
        }
    }
}

impl Default for VarConfig {
    fn default() -> Self {
        Self {
            max_lag: 15,
            criterion: InformationCriterion::Aic,
            interval_method: IntervalMethod::IndependentSteps,
        }
    }
}

impl Default for ArimaConfig {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_q: 5,
            max_d: 2,
            max_order: 5,
            max_iterations: 100,
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by [`CONFIG_ENV_VAR`], or fall back to defaults
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Reject settings no model can run with
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(ForecastError::Config("target column must be named".to_string()));
        }
        if self.steps == 0 {
            return Err(ForecastError::Config("steps must be at least 1".to_string()));
        }
        check_probability("alpha", self.alpha)?;
        check_probability("granger.significance", self.granger.significance)?;
        if self.granger.max_lag == 0 {
            return Err(ForecastError::Config("granger.max_lag must be at least 1".to_string()));
        }
        if self.var.max_lag == 0 {
            return Err(ForecastError::Config("var.max_lag must be at least 1".to_string()));
        }
        if self.arima.max_iterations == 0 {
            return Err(ForecastError::Config(
                "arima.max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ForecastError::Config(format!(
            "{} must lie strictly between 0 and 1, got {}",
            name, value
        )))
    }
}
