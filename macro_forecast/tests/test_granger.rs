use approx::{assert_abs_diff_eq, assert_relative_eq};
use chrono::{Days, NaiveDate};
use macro_forecast::data::TimeSeriesTable;
use macro_forecast::error::ForecastError;
use macro_forecast::granger::{
    granger_test, min_observations, pairwise_test, summarize, summarize_matrix,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rstest::rstest;

/// `Leader` drives `Follower` with a one-day delay, `Other` is unrelated
fn lead_lag_table(n: usize, seed: u64) -> TimeSeriesTable {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::<f64>::new(0.0, 1.0).unwrap();
    let leader: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng)).collect();
    let other: Vec<f64> = (0..n).map(|_| normal.sample(&mut rng)).collect();
    let follower: Vec<f64> = (0..n)
        .map(|t| {
            let driven = if t > 0 { 0.6 * leader[t - 1] } else { 0.0 };
            driven + 0.5 * normal.sample(&mut rng)
        })
        .collect();

    table(vec![("Leader", leader), ("Follower", follower), ("Other", other)])
}

fn table(columns: Vec<(&str, Vec<f64>)>) -> TimeSeriesTable {
    let n = columns[0].1.len();
    let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
    let dates = (0..n as u64)
        .map(|i| start.checked_add_days(Days::new(i)).unwrap())
        .collect();
    let (names, values) = columns
        .into_iter()
        .map(|(name, v)| (name.to_string(), v))
        .unzip();
    TimeSeriesTable::new(dates, names, values).unwrap()
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(5)]
fn test_matrix_shape_and_p_value_range(#[case] max_lag: usize) {
    let data = lead_lag_table(300, 11);
    let matrix = pairwise_test(&data, max_lag, 0.05).unwrap();

    for name in data.columns() {
        assert!(matrix.p_values.get(name, name).is_none());
        assert!(matrix.significant.get(name, name).is_none());
    }
    assert_eq!(matrix.p_values.len(), 6);
    for (cause, effect, p) in matrix.p_values.iter() {
        assert_ne!(cause, effect);
        assert!((0.0..=1.0).contains(p));
        assert_eq!(matrix.significant.get(cause, effect), Some(&(*p < 0.05)));
    }
    assert!(matrix.diagnostics.is_empty());
}

#[test]
fn test_detects_lead_lag_relationship() {
    let data = lead_lag_table(300, 5);
    let matrix = pairwise_test(&data, 5, 0.05).unwrap();

    let p = *matrix.p_values.get("Leader", "Follower").unwrap();
    assert!(p < 1e-6);
    assert_eq!(matrix.significant.get("Leader", "Follower"), Some(&true));
}

#[test]
fn test_granger_test_reports_every_lag() {
    let data = lead_lag_table(200, 3);
    let tests = granger_test(
        data.column("Follower").unwrap(),
        data.column("Leader").unwrap(),
        4,
    )
    .unwrap();

    assert_eq!(tests.len(), 4);
    for (i, t) in tests.iter().enumerate() {
        assert_eq!(t.lag, i + 1);
        assert_eq!(t.df_num, i + 1);
        assert_eq!(t.df_den, 200 - (i + 1) - 2 * (i + 1) - 1);
        assert!(t.f_statistic > 0.0);
    }
}

#[test]
fn test_granger_test_matches_hand_computed_f_test() {
    let effect = [1.0, 3.0, 2.0, 5.0, 4.0, 6.0];
    let cause = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0];
    let tests = granger_test(&effect, &cause, 1).unwrap();

    // SSR 9.1 without the cause lag, 29/110 with it
    assert_eq!(tests.len(), 1);
    let t = &tests[0];
    assert_eq!((t.lag, t.df_num, t.df_den), (1, 1, 2));
    let f = 1944.0 / 29.0;
    assert_relative_eq!(t.f_statistic, f, max_relative = 1e-9);
    // F(1, 2) survival in closed form
    assert_abs_diff_eq!(t.p_value, 1.0 - (f / (f + 2.0)).sqrt(), epsilon = 1e-8);
}

#[test]
fn test_too_few_rows_leaves_cells_undefined() {
    let data = lead_lag_table(min_observations(5) - 1, 2);
    let matrix = pairwise_test(&data, 5, 0.05).unwrap();

    assert!(matrix.p_values.is_empty());
    assert!(matrix.significant.is_empty());
    assert_eq!(matrix.diagnostics.len(), 6);
    assert!(matrix.diagnostics.iter().all(|d| d.lag.is_none()));

    let direct = granger_test(data.column_at(0), data.column_at(1), 5);
    assert!(matches!(direct, Err(ForecastError::InvalidInput(_))));
}

#[test]
fn test_failed_pair_does_not_stop_the_matrix() {
    let base = lead_lag_table(150, 9);
    let flat = vec![0.0; base.len()];
    let data = table(vec![
        ("Leader", base.column("Leader").unwrap().to_vec()),
        ("Follower", base.column("Follower").unwrap().to_vec()),
        ("Flat", flat),
    ]);

    let matrix = pairwise_test(&data, 2, 0.05).unwrap();

    assert!(matrix.p_values.get("Leader", "Follower").is_some());
    assert!(matrix.p_values.get("Flat", "Leader").is_none());
    assert!(matrix.p_values.get("Leader", "Flat").is_none());
    assert_eq!(matrix.diagnostics.len(), 4);
    for diagnostic in &matrix.diagnostics {
        assert!(diagnostic.cause == "Flat" || diagnostic.effect == "Flat");
        assert_eq!(diagnostic.lag, Some(1));
        assert!(diagnostic.to_string().contains("at lag 1"));
    }

    // undefined pairs rank after every defined one
    let records = summarize_matrix(&matrix);
    assert_eq!(records.len(), 6);
    let first_undefined = records
        .iter()
        .position(|r| r.min_p_value.is_none())
        .unwrap();
    assert!(records[first_undefined..]
        .iter()
        .all(|r| r.min_p_value.is_none() && !r.significant));
}

#[test]
fn test_summary_sorted_significant_first_then_by_p_value() {
    let data = lead_lag_table(300, 21);
    let records = summarize(&data, 3, 0.05).unwrap();

    assert_eq!(records.len(), 6);
    assert_eq!(records[0].cause, "Leader");
    assert_eq!(records[0].effect, "Follower");
    assert!(records[0].significant);

    for pair in records.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(a.significant >= b.significant);
        if a.significant == b.significant {
            assert!(a.min_p_value.unwrap() <= b.min_p_value.unwrap());
        }
    }
}

#[test]
fn test_invalid_arguments() {
    let data = lead_lag_table(100, 1);
    assert!(matches!(
        pairwise_test(&data, 0, 0.05),
        Err(ForecastError::InvalidInput(_))
    ));
    assert!(matches!(
        pairwise_test(&data, 2, 1.5),
        Err(ForecastError::InvalidInput(_))
    ));
}
