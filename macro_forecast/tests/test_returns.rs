use approx::assert_abs_diff_eq;
use chrono::{Days, NaiveDate};
use macro_forecast::data::{PriceTable, TimeSeriesTable};
use macro_forecast::error::ForecastError;
use macro_forecast::returns::{correlation, log_returns};
use rstest::rstest;

fn prices(columns: Vec<(&str, Vec<f64>)>) -> PriceTable {
    let n = columns[0].1.len();
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let dates = (0..n as u64)
        .map(|i| start.checked_add_days(Days::new(i)).unwrap())
        .collect();
    let (names, values): (Vec<String>, Vec<Vec<f64>>) = columns
        .into_iter()
        .map(|(name, v)| (name.to_string(), v))
        .unzip();
    PriceTable::new(TimeSeriesTable::new(dates, names, values).unwrap())
}

#[test]
fn test_log_returns_known_values() {
    let table = prices(vec![(
        "Bitcoin",
        vec![100.0, 101.0, 99.0, 103.0, 102.0, 105.0, 108.0],
    )]);
    let returns = log_returns(&table).unwrap();

    assert_eq!(returns.len(), 6);
    assert_eq!(returns.dates(), &table.dates()[1..]);
    let r = returns.column("Bitcoin").unwrap();
    assert_abs_diff_eq!(r[0], (101.0f64 / 100.0).ln(), epsilon = 1e-12);
    assert_abs_diff_eq!(r.iter().sum::<f64>(), 1.08f64.ln(), epsilon = 1e-12);
}

#[test]
fn test_log_returns_keep_column_set() {
    let table = prices(vec![
        ("Bitcoin", vec![100.0, 110.0, 121.0]),
        ("Gold", vec![50.0, 50.0, 25.0]),
    ]);
    let returns = log_returns(&table).unwrap();

    assert_eq!(returns.columns(), table.columns());
    assert_abs_diff_eq!(returns.column("Gold").unwrap()[0], 0.0);
    assert_abs_diff_eq!(returns.column("Gold").unwrap()[1], 0.5f64.ln(), epsilon = 1e-12);
}

#[rstest]
#[case(vec![100.0, 0.0, 101.0])]
#[case(vec![100.0, 101.0, -3.0])]
fn test_log_returns_reject_non_positive_prices(#[case] values: Vec<f64>) {
    let table = prices(vec![("Bitcoin", values)]);
    match log_returns(&table) {
        Err(ForecastError::InvalidInput(msg)) => assert!(msg.contains("Bitcoin")),
        other => panic!("expected InvalidInput, got {:?}", other),
    }
}

#[test]
fn test_log_returns_need_two_rows() {
    let table = prices(vec![("Bitcoin", vec![100.0])]);
    assert!(matches!(
        log_returns(&table),
        Err(ForecastError::InvalidInput(_))
    ));
}

#[test]
fn test_correlation_matrix() {
    let table = prices(vec![
        ("A", vec![1.0, 2.0, 3.0, 4.0]),
        ("B", vec![2.0, 4.0, 6.0, 8.0]),
        ("C", vec![4.0, 3.0, 2.0, 1.0]),
    ]);
    let corr = correlation(&table);

    assert_abs_diff_eq!(corr.get("A", "A").unwrap(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(corr.get("A", "B").unwrap(), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(corr.get("A", "C").unwrap(), -1.0, epsilon = 1e-12);
    assert!(corr.get("A", "Z").is_none());
}
