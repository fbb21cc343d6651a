//! Batch run: load cached prices, analyse, forecast, export

use macro_forecast::config::AnalysisConfig;
use macro_forecast::data::DataLoader;
use macro_forecast::models::FittedModel;
use macro_forecast::pipeline;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,macro_forecast=info".into()),
        )
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AnalysisConfig::from_env()?;
    info!(path = %config.data_path.display(), target = %config.target, "loading prices");
    let prices = DataLoader::from_csv(&config.data_path)?;
    if let (Some(first), Some(last)) = (prices.dates().first(), prices.last_date()) {
        info!(%first, %last, rows = prices.len(), series = prices.n_columns(), "loaded prices");
    }

    let report = pipeline::run(&prices, &config)?;

    for result in &report.stationarity {
        info!(
            series = %result.series,
            statistic = result.statistic,
            p_value = result.p_value,
            verdict = %result.verdict,
            "ADF test on log returns"
        );
    }
    for record in report.granger_summary.iter().filter(|r| r.significant) {
        info!(
            cause = %record.cause,
            effect = %record.effect,
            p_value = ?record.min_p_value,
            "significant Granger causality"
        );
    }
    for diagnostic in &report.granger.diagnostics {
        warn!(%diagnostic, "Granger pair skipped");
    }

    if let Ok(outcome) = &report.arima {
        info!("\n{}", outcome.fitted.summary());
    }
    if let Ok(outcome) = &report.var {
        info!("\n{}", outcome.fitted.summary());
    }

    let combined = report.combined_forecast()?;
    combined.write_to_path(&config.output_path)?;
    info!(
        path = %config.output_path.display(),
        rows = combined.rows().len(),
        "saved forecast summary"
    );
    Ok(())
}
