use macro_forecast::config::{AnalysisConfig, ArimaConfig, CONFIG_ENV_VAR};
use macro_forecast::error::ForecastError;
use macro_forecast::models::var::IntervalMethod;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use ts_math::InformationCriterion;

#[test]
fn test_defaults() {
    let config = AnalysisConfig::default();

    assert_eq!(config.target, "Bitcoin");
    assert_eq!(config.granger.max_lag, 5);
    assert_eq!(config.granger.significance, 0.05);
    assert_eq!(config.var.max_lag, 15);
    assert_eq!(config.var.criterion, InformationCriterion::Aic);
    assert_eq!(config.var.interval_method, IntervalMethod::IndependentSteps);
    assert_eq!(
        config.arima,
        ArimaConfig {
            max_p: 5,
            max_q: 5,
            max_d: 2,
            max_order: 5,
            max_iterations: 100,
        }
    );
    assert_eq!(config.steps, 30);
    assert_eq!(config.alpha, 0.05);
    assert_eq!(config.output_path, PathBuf::from("results/forecast_summary.csv"));
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_json_fills_defaults() {
    let config: AnalysisConfig = serde_json::from_str(
        r#"{ "target": "Gold", "var": { "interval_method": "full_covariance" }, "steps": 10 }"#,
    )
    .unwrap();

    assert_eq!(config.target, "Gold");
    assert_eq!(config.steps, 10);
    assert_eq!(config.var.interval_method, IntervalMethod::FullCovariance);
    assert_eq!(config.var.max_lag, 15);
    assert_eq!(config.arima, ArimaConfig::default());
}

#[rstest]
#[case(r#"{ "steps": 0 }"#)]
#[case(r#"{ "alpha": 1.0 }"#)]
#[case(r#"{ "target": " " }"#)]
#[case(r#"{ "granger": { "max_lag": 0 } }"#)]
#[case(r#"{ "granger": { "significance": 0.0 } }"#)]
#[case(r#"{ "var": { "max_lag": 0 } }"#)]
#[case(r#"{ "arima": { "max_iterations": 0 } }"#)]
fn test_validate_rejects(#[case] json: &str) {
    let config: AnalysisConfig = serde_json::from_str(json).unwrap();
    assert!(matches!(config.validate(), Err(ForecastError::Config(_))));
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{ "target": "SP500", "alpha": 0.1 }}"#).unwrap();

    let config = AnalysisConfig::from_file(file.path()).unwrap();
    assert_eq!(config.target, "SP500");
    assert_eq!(config.alpha, 0.1);
}

#[test]
fn test_from_file_errors() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();
    assert!(matches!(
        AnalysisConfig::from_file(file.path()),
        Err(ForecastError::Config(_))
    ));

    assert!(matches!(
        AnalysisConfig::from_file("missing/config.json"),
        Err(ForecastError::IoError(_))
    ));
}

#[test]
fn test_from_env() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{ "steps": 7 }}"#).unwrap();

    std::env::set_var(CONFIG_ENV_VAR, file.path());
    let config = AnalysisConfig::from_env().unwrap();
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.steps, 7);
    assert_eq!(AnalysisConfig::from_env().unwrap(), AnalysisConfig::default());
}
