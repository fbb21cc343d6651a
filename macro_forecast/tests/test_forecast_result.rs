use approx::assert_relative_eq;
use chrono::NaiveDate;
use macro_forecast::error::ForecastError;
use macro_forecast::models::{back_transform, future_dates, ForecastPoint, ForecastResult};

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[test]
fn test_back_transform_exponentiates_each_bound() {
    let (point, lower, upper) = back_transform(100.0f64.ln(), 0.1, 1.96);

    assert_relative_eq!(point, 100.0, epsilon = 1e-9);
    assert_relative_eq!(lower, 100.0 * (-0.196f64).exp(), epsilon = 1e-9);
    assert_relative_eq!(upper, 100.0 * 0.196f64.exp(), epsilon = 1e-9);
    // asymmetric around the point in price space
    assert!(upper - point > point - lower);
}

#[test]
fn test_future_dates_cross_month_end() {
    let dates = future_dates(date("2024-02-27"), 4).unwrap();
    assert_eq!(
        dates,
        vec![
            date("2024-02-28"),
            date("2024-02-29"),
            date("2024-03-01"),
            date("2024-03-02")
        ]
    );
}

#[test]
fn test_from_log_space() {
    let log_mean = [4.0, 4.1, 4.2];
    let log_se = [0.0, 0.05, 0.1];
    let result =
        ForecastResult::from_log_space("VAR(1)", date("2024-12-30"), &log_mean, &log_se, 0.05)
            .unwrap();

    assert_eq!(result.model(), "VAR(1)");
    assert_relative_eq!(result.confidence(), 0.95);
    assert_eq!(
        result.dates(),
        vec![date("2024-12-31"), date("2025-01-01"), date("2025-01-02")]
    );
    assert_relative_eq!(result.values()[1], 4.1f64.exp(), epsilon = 1e-9);

    let (lower, upper) = result.intervals()[0];
    assert_relative_eq!(lower, 4.0f64.exp(), epsilon = 1e-9);
    assert_relative_eq!(upper, 4.0f64.exp(), epsilon = 1e-9);

    let (lower, upper) = result.intervals()[2];
    assert_relative_eq!(lower, (4.2 - 1.959964 * 0.1f64).exp(), epsilon = 1e-4);
    assert_relative_eq!(upper, (4.2 + 1.959964 * 0.1f64).exp(), epsilon = 1e-4);
}

#[test]
fn test_from_log_space_length_mismatch() {
    let result = ForecastResult::from_log_space("x", date("2024-01-01"), &[1.0, 2.0], &[0.1], 0.05);
    assert!(matches!(
        result,
        Err(ForecastError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_new_requires_increasing_dates() {
    let point = |d: &str| ForecastPoint {
        date: date(d),
        forecast: 1.0,
        lower: 0.5,
        upper: 1.5,
        log_std_error: 0.1,
    };
    let result = ForecastResult::new(
        "ARIMA(0,1,0)",
        0.95,
        vec![point("2024-01-02"), point("2024-01-01")],
    );
    assert!(matches!(result, Err(ForecastError::InvalidInput(_))));
}
