use chrono::{Days, NaiveDate};
use macro_forecast::config::ArimaConfig;
use macro_forecast::data::PriceSeries;
use macro_forecast::error::ForecastError;
use macro_forecast::models::arima::ArimaForecaster;
use macro_forecast::models::FittedModel;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 6, 1).unwrap()
}

/// Geometric random walk with a small drift
fn price_walk(n: usize, seed: u64) -> PriceSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::<f64>::new(0.0005, 0.02).unwrap();
    let mut log_price = 10.0f64.ln();
    let values = (0..n)
        .map(|_| {
            log_price += normal.sample(&mut rng);
            log_price.exp()
        })
        .collect();
    let dates = (0..n as u64)
        .map(|i| start().checked_add_days(Days::new(i)).unwrap())
        .collect();
    PriceSeries::new("Bitcoin", dates, values).unwrap()
}

#[test]
fn test_forecast_before_fit() {
    let forecaster = ArimaForecaster::default();
    assert!(!forecaster.is_fitted());
    assert!(forecaster.selected_order().is_none());
    assert!(matches!(
        forecaster.forecast(10, 0.05),
        Err(ForecastError::NotFitted(_))
    ));
}

#[test]
fn test_refit_before_order_selection() {
    let mut forecaster = ArimaForecaster::default();
    assert!(matches!(
        forecaster.refit(),
        Err(ForecastError::NotFitted(_))
    ));
}

#[test]
fn test_seasonal_search_rejected() {
    let mut forecaster = ArimaForecaster::default();
    let result = forecaster.select_order(&price_walk(100, 1), true);
    assert!(matches!(result, Err(ForecastError::InvalidInput(_))));
    assert!(forecaster.selected_order().is_none());
}

#[test]
fn test_non_positive_prices_rejected() {
    let dates = (0..3u64)
        .map(|i| start().checked_add_days(Days::new(i)).unwrap())
        .collect();
    let series = PriceSeries::new("Bitcoin", dates, vec![10.0, 0.0, 11.0]).unwrap();
    let mut forecaster = ArimaForecaster::default();
    assert!(matches!(
        forecaster.fit(&series, false),
        Err(ForecastError::InvalidInput(_))
    ));
}

/// Prices whose log follows an integrated AR(1), with the log path multiplied by `scale`
fn ar1_log_prices(n: usize, seed: u64, scale: f64) -> PriceSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::<f64>::new(0.0, 0.02).unwrap();
    let mut log_price = 0.0f64;
    let mut last_return = 0.0;
    let values = (0..n)
        .map(|_| {
            last_return = 0.3 * last_return + normal.sample(&mut rng);
            log_price += last_return;
            (scale * log_price).exp()
        })
        .collect();
    let dates = (0..n as u64)
        .map(|i| start().checked_add_days(Days::new(i)).unwrap())
        .collect();
    PriceSeries::new("Gold", dates, values).unwrap()
}

#[test]
fn test_selected_order_ignores_log_scale() {
    let mut base = ArimaForecaster::default();
    let mut scaled = ArimaForecaster::default();

    let order = base.select_order(&ar1_log_prices(300, 11, 1.0), false).unwrap();
    let scaled_order = scaled
        .select_order(&ar1_log_prices(300, 11, 40.0), false)
        .unwrap();
    assert_eq!(order, scaled_order);
}

#[test]
fn test_selection_then_refit() {
    let prices = price_walk(300, 42);
    let mut forecaster = ArimaForecaster::default();

    let order = forecaster.select_order(&prices, false).unwrap();
    assert_eq!(forecaster.selected_order(), Some(order));
    assert!(!forecaster.is_fitted());
    assert!(matches!(
        forecaster.forecast(5, 0.05),
        Err(ForecastError::NotFitted(_))
    ));

    forecaster.refit().unwrap();
    assert!(forecaster.is_fitted());
    assert_eq!(forecaster.selected_order(), Some(order));

    // refitting an already fitted model is a no-op
    forecaster.refit().unwrap();
    assert!(forecaster.is_fitted());
}

#[test]
fn test_fit_and_forecast_random_walk() {
    let prices = price_walk(300, 7);
    let mut forecaster = ArimaForecaster::default();
    let order = forecaster.fit(&prices, false).unwrap();

    assert!(order.d <= 2);
    assert!(order.p + order.q <= 5);
    let fitted = forecaster.fitted().unwrap();
    assert_eq!(fitted.order(), order);
    assert_eq!(fitted.has_constant(), order.d == 0);
    assert!(fitted.sigma2() > 0.0);
    assert!(fitted.log_likelihood().is_finite());
    assert!(!fitted.candidates().is_empty());
    assert_eq!(fitted.last_date(), *prices.dates().last().unwrap());

    let result = forecaster.forecast(30, 0.05).unwrap();
    assert_eq!(result.len(), 30);
    assert_eq!(result.model(), order.to_string());
    assert!((result.confidence() - 0.95).abs() < 1e-12);

    let mut expected = fitted.last_date();
    for point in result.points() {
        expected = expected.succ_opt().unwrap();
        assert_eq!(point.date, expected);
        assert!(point.forecast > 0.0);
        assert!(point.lower <= point.forecast && point.forecast <= point.upper);
    }
    for pair in result.points().windows(2) {
        assert!(pair[1].log_std_error >= pair[0].log_std_error - 1e-12);
    }
}

#[test]
fn test_search_respects_bounds() {
    let config = ArimaConfig {
        max_p: 1,
        max_q: 1,
        max_order: 1,
        ..ArimaConfig::default()
    };
    let mut forecaster = ArimaForecaster::new(config);
    let order = forecaster.fit(&price_walk(250, 3), false).unwrap();

    assert!(order.p <= 1 && order.q <= 1 && order.p + order.q <= 1);
    for candidate in forecaster.fitted().unwrap().candidates() {
        assert!(candidate.order.p + candidate.order.q <= 1);
        assert!(candidate.aic.is_finite());
    }
}

#[test]
fn test_search_stops_after_max_iterations() {
    let config = ArimaConfig {
        max_iterations: 1,
        ..ArimaConfig::default()
    };
    let mut forecaster = ArimaForecaster::new(config);
    let order = forecaster.fit(&price_walk(250, 5), false).unwrap();

    assert_eq!((order.p, order.q), (0, 0));
    assert_eq!(forecaster.fitted().unwrap().candidates().len(), 1);
}

#[test]
fn test_summary_lists_estimates() {
    let mut forecaster = ArimaForecaster::default();
    forecaster.fit(&price_walk(200, 9), false).unwrap();
    let fitted = forecaster.into_fitted().unwrap();

    let summary = fitted.summary();
    assert!(summary.starts_with(&fitted.label()));
    assert!(summary.contains("AIC"));
    assert_eq!(fitted.nobs(), 200 - fitted.order().d);
    for (name, _) in fitted.coefficients() {
        assert!(summary.contains(&name));
    }
}

#[test]
fn test_zero_steps_rejected() {
    let mut forecaster = ArimaForecaster::default();
    forecaster.fit(&price_walk(150, 13), false).unwrap();
    assert!(matches!(
        forecaster.forecast(0, 0.05),
        Err(ForecastError::InvalidInput(_))
    ));
}
