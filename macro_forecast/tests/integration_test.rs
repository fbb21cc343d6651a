use chrono::{Days, NaiveDate};
use macro_forecast::config::AnalysisConfig;
use macro_forecast::export::{ARIMA_COLUMNS, VAR_COLUMNS};
use macro_forecast::stationarity::Verdict;
use macro_forecast::{pipeline, DataLoader, FittedModel, ForecastError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::fs;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};

// Bitcoin follows the previous day's SP500 return; Gold is independent
fn create_price_file(n: usize) -> NamedTempFile {
    let mut rng = StdRng::seed_from_u64(2024);
    let noise = Normal::<f64>::new(0.0, 0.01).unwrap();
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Date,Bitcoin,Gold,SP500").unwrap();

    let (mut btc, mut gold, mut spx) = (9000.0f64, 1500.0f64, 3200.0f64);
    let mut last_spx_return = 0.0;
    for i in 0..n {
        let spx_return = 0.0003 + noise.sample(&mut rng);
        let btc_return = 0.001 + 0.8 * last_spx_return + 2.0 * noise.sample(&mut rng);
        let gold_return = 0.5 * noise.sample(&mut rng);
        btc *= btc_return.exp();
        gold *= gold_return.exp();
        spx *= spx_return.exp();
        last_spx_return = spx_return;

        let date = start.checked_add_days(Days::new(i as u64)).unwrap();
        writeln!(file, "{},{:.4},{:.4},{:.4}", date, btc, gold, spx).unwrap();
    }
    file
}

fn test_config() -> AnalysisConfig {
    let mut config = AnalysisConfig::default();
    config.steps = 10;
    config.var.max_lag = 5;
    config
}

#[test]
fn test_full_analysis_workflow() {
    // 1. Load prices
    let data_file = create_price_file(400);
    let prices = DataLoader::from_csv(data_file.path()).unwrap();
    assert_eq!(prices.len(), 400);

    // 2. Run every stage
    let config = test_config();
    let report = pipeline::run(&prices, &config).unwrap();

    assert_eq!(report.returns.len(), 399);
    assert_eq!(report.stationarity.len(), 3);
    assert!(report
        .stationarity
        .iter()
        .all(|r| r.verdict == Verdict::Stationary));

    // 3. Causality: SP500 leads Bitcoin
    assert_eq!(report.granger.p_values.len(), 6);
    assert_eq!(report.granger_summary.len(), 6);
    let top = &report.granger_summary[0];
    assert_eq!((top.cause.as_str(), top.effect.as_str()), ("SP500", "Bitcoin"));
    assert!(top.significant);

    // 4. Both models forecast the target
    let arima = report.arima.as_ref().unwrap();
    assert_eq!(arima.forecast.len(), 10);
    assert!(arima.fitted.label().starts_with("ARIMA("));

    let var = report.var.as_ref().unwrap();
    assert_eq!(var.forecast.len(), 10);
    assert!(var.lag_selection.lag >= 1 && var.lag_selection.lag <= 5);
    assert_eq!(var.fitted.lag(), var.lag_selection.lag);

    let last = *prices.dates().last().unwrap();
    assert_eq!(arima.forecast.dates()[0], last.succ_opt().unwrap());
    assert_eq!(arima.forecast.dates(), var.forecast.dates());

    // 5. Export
    let dir = tempdir().unwrap();
    let output = dir.path().join("results").join("forecast_summary.csv");
    report
        .combined_forecast()
        .unwrap()
        .write_to_path(&output)
        .unwrap();

    let text = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 11);
    let header: Vec<&str> = lines[0].split(',').collect();
    assert_eq!(header[0], "Date");
    assert_eq!(&header[1..4], &ARIMA_COLUMNS);
    assert_eq!(&header[4..7], &VAR_COLUMNS);
    assert!(lines[1..].iter().all(|l| l.split(',').all(|cell| !cell.is_empty())));
}

#[test]
fn test_missing_target_column() {
    let data_file = create_price_file(60);
    let prices = DataLoader::from_csv(data_file.path()).unwrap();

    let mut config = test_config();
    config.target = "Oil".to_string();
    assert!(matches!(
        pipeline::run(&prices, &config),
        Err(ForecastError::InvalidInput(_))
    ));
}

#[test]
fn test_invalid_config_is_rejected_before_work() {
    let data_file = create_price_file(60);
    let prices = DataLoader::from_csv(data_file.path()).unwrap();

    let mut config = test_config();
    config.steps = 0;
    assert!(matches!(
        pipeline::run(&prices, &config),
        Err(ForecastError::Config(_))
    ));
}
