//! Lag-polynomial helpers: differencing, integration, stationarity
//! reparameterisation and MA(∞) weights

use crate::{MathError, Result};

/// Difference a series `d` times
pub fn difference(data: &[f64], d: usize) -> Vec<f64> {
    let mut result = data.to_vec();
    for _ in 0..d {
        if result.len() < 2 {
            return Vec::new();
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Last value of each differencing level `0..d` of `data`
///
/// Entry `k` is the final observation of the `k`-times differenced series,
/// which is what [`integrate`] needs to undo the differencing of forecasts.
pub fn difference_anchors(data: &[f64], d: usize) -> Result<Vec<f64>> {
    let mut anchors = Vec::with_capacity(d);
    let mut level = data.to_vec();
    for k in 0..d {
        let last = *level.last().ok_or_else(|| {
            MathError::InsufficientData(format!("series too short for differencing order {}", k + 1))
        })?;
        anchors.push(last);
        level = difference(&level, 1);
    }
    Ok(anchors)
}

/// Undo `anchors.len()` orders of differencing on a forecast path
pub fn integrate(forecast: &[f64], anchors: &[f64]) -> Vec<f64> {
    let mut result = forecast.to_vec();
    for &start in anchors.iter().rev() {
        let mut running = start;
        for value in result.iter_mut() {
            running += *value;
            *value = running;
        }
    }
    result
}

/// Product of two polynomials given by coefficients in increasing power
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// AR coefficients of `phi(B) (1 - B)^d`
///
/// Returns `phi*` such that `y_t = sum phi*_i y_{t-i} + ...` for the
/// integrated process.
pub fn integrated_ar(ar: &[f64], d: usize) -> Vec<f64> {
    let mut poly: Vec<f64> = std::iter::once(1.0).chain(ar.iter().map(|c| -c)).collect();
    for _ in 0..d {
        poly = multiply(&poly, &[1.0, -1.0]);
    }
    poly.iter().skip(1).map(|c| -c).collect()
}

/// First `n` MA(∞) weights `psi_0 = 1, psi_1, ...` of `theta(B) / phi(B)`
pub fn psi_weights(ar: &[f64], ma: &[f64], n: usize) -> Vec<f64> {
    let mut psi = Vec::with_capacity(n);
    for j in 0..n {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let mut value = if j <= ma.len() { ma[j - 1] } else { 0.0 };
        for (i, phi) in ar.iter().enumerate().take(j) {
            value += phi * psi[j - i - 1];
        }
        psi.push(value);
    }
    psi
}

/// Map unconstrained reals to the coefficients of a stationary AR polynomial
///
/// Each input is squashed to a partial autocorrelation in (-1, 1) and the
/// Durbin-Levinson recursion builds the AR coefficients, so every input
/// vector yields a stationary model. Negating the output gives an
/// invertible MA polynomial.
pub fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let n = unconstrained.len();
    let r: Vec<f64> = unconstrained
        .iter()
        .map(|x| x / (1.0 + x * x).sqrt())
        .collect();
    let mut previous: Vec<f64> = Vec::with_capacity(n);
    for k in 0..n {
        let mut row = vec![0.0; k + 1];
        for i in 0..k {
            row[i] = previous[i] + r[k] * previous[k - i - 1];
        }
        row[k] = r[k];
        previous = row;
    }
    previous.iter().map(|y| -y).collect()
}

/// Inverse of [`constrain_stationary`]
pub fn unconstrain_stationary(constrained: &[f64]) -> Result<Vec<f64>> {
    let n = constrained.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut rows: Vec<Vec<f64>> = vec![Vec::new(); n];
    rows[n - 1] = constrained.iter().map(|c| -c).collect();
    for k in (1..n).rev() {
        let rk = rows[k][k];
        let denom = 1.0 - rk * rk;
        if denom <= 0.0 {
            return Err(MathError::InvalidInput(
                "coefficients do not describe a stationary polynomial".to_string(),
            ));
        }
        let row: Vec<f64> = (0..k)
            .map(|i| (rows[k][i] - rk * rows[k][k - i - 1]) / denom)
            .collect();
        rows[k - 1] = row;
    }

    rows.iter()
        .enumerate()
        .map(|(k, row)| {
            let r = row[k];
            if r.abs() >= 1.0 {
                Err(MathError::InvalidInput(format!(
                    "partial autocorrelation {} is outside (-1, 1)",
                    r
                )))
            } else {
                Ok(r / (1.0 - r * r).sqrt())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_difference_and_integrate_roundtrip() {
        let data = [1.0, 4.0, 9.0, 16.0, 25.0, 36.0];
        let d2 = difference(&data, 2);
        assert_eq!(d2, vec![2.0, 2.0, 2.0, 2.0]);

        // Continue the quadratic three steps ahead from its second differences
        let anchors = difference_anchors(&data, 2).unwrap();
        assert_eq!(anchors, vec![36.0, 11.0]);
        let path = integrate(&[2.0, 2.0, 2.0], &anchors);
        assert_eq!(path, vec![49.0, 64.0, 81.0]);
    }

    #[test]
    fn test_integrated_ar() {
        // (1 - 0.5B)(1 - B) = 1 - 1.5B + 0.5B^2
        let phi = integrated_ar(&[0.5], 1);
        assert_abs_diff_eq!(phi[0], 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(phi[1], -0.5, epsilon = 1e-12);
        assert_eq!(integrated_ar(&[], 1), vec![1.0]);
    }

    #[test]
    fn test_psi_weights_random_walk_and_ar1() {
        assert_eq!(psi_weights(&[1.0], &[], 4), vec![1.0, 1.0, 1.0, 1.0]);
        let psi = psi_weights(&[0.5], &[0.2], 3);
        assert_abs_diff_eq!(psi[1], 0.7, epsilon = 1e-12);
        assert_abs_diff_eq!(psi[2], 0.35, epsilon = 1e-12);
    }

    #[test]
    fn test_stationary_reparameterisation_roundtrip() {
        let raw = [0.4, -1.3, 2.0];
        let ar = constrain_stationary(&raw);
        let back = unconstrain_stationary(&ar).unwrap();
        for (a, b) in raw.iter().zip(back.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }

        let single = constrain_stationary(&[3.0]);
        assert!(single[0].abs() < 1.0);
    }
}
