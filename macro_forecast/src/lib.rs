//! # Macro Forecast
//!
//! Predictability analysis of an asset price against macroeconomic reference
//! series, with competing ARIMA and VAR price forecasts.
//!
//! ## Features
//!
//! - Date-indexed price tables loaded from CSV or a polars DataFrame
//! - Log-return transform and return correlations
//! - Augmented Dickey-Fuller stationarity checks
//! - Pairwise Granger causality, tested in parallel
//! - ARIMA on log prices with stepwise order search and exact-likelihood refit
//! - VAR on the return system with lag selection by information criterion
//! - Combined forecast export as CSV
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use macro_forecast::config::AnalysisConfig;
//! use macro_forecast::data::DataLoader;
//! use macro_forecast::pipeline;
//!
//! let config = AnalysisConfig::default();
//! let prices = DataLoader::from_csv(&config.data_path)?;
//! let report = pipeline::run(&prices, &config)?;
//!
//! for record in report.granger_summary.iter().filter(|r| r.significant) {
//!     println!("{} -> {}", record.cause, record.effect);
//! }
//! report.combined_forecast()?.write_to_path(&config.output_path)?;
//! # Ok::<(), macro_forecast::ForecastError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod granger;
pub mod models;
pub mod pipeline;
pub mod returns;
pub mod stationarity;

// Re-export commonly used types
pub use crate::config::AnalysisConfig;
pub use crate::data::{DataLoader, PriceSeries, PriceTable, ReturnTable, TimeSeriesTable};
pub use crate::error::{ForecastError, Result};
pub use crate::models::{FittedModel, ForecastPoint, ForecastResult};
pub use crate::pipeline::{run, AnalysisReport};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
