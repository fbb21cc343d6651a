//! Derivative-free minimisation and finite-difference curvature
//!
//! Likelihood surfaces of ARMA models are smooth but have no cheap analytic
//! gradient, so estimation uses a bounded Nelder-Mead simplex search and the
//! parameter covariance comes from a central-difference Hessian.

use crate::{MathError, Result};
use nalgebra::DMatrix;

/// Nelder-Mead simplex minimiser
#[derive(Debug, Clone)]
pub struct NelderMead {
    /// Hard bound on objective evaluations
    pub max_evaluations: usize,
    /// Convergence tolerance on the simplex spread in parameter space
    pub x_tolerance: f64,
    /// Convergence tolerance on the spread of objective values
    pub f_tolerance: f64,
    /// Edge length used for zero-valued starting coordinates
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_evaluations: 5_000,
            x_tolerance: 1e-4,
            f_tolerance: 1e-4,
            initial_step: 0.1,
        }
    }
}

/// Outcome of a minimisation
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Best point found
    pub x: Vec<f64>,
    /// Objective value at `x`
    pub value: f64,
    /// Number of objective evaluations used
    pub evaluations: usize,
    /// Whether both tolerances were met before the evaluation bound
    pub converged: bool,
}

struct Counted<F> {
    f: F,
    evaluations: usize,
}

impl<F: FnMut(&[f64]) -> f64> Counted<F> {
    fn call(&mut self, x: &[f64]) -> f64 {
        self.evaluations += 1;
        let v = (self.f)(x);
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    }
}

impl NelderMead {
    /// Create a minimiser with a custom evaluation bound
    pub fn with_max_evaluations(max_evaluations: usize) -> Self {
        Self {
            max_evaluations,
            ..Self::default()
        }
    }

    /// Minimise `f` starting from `x0`
    pub fn minimize<F>(&self, f: F, x0: &[f64]) -> Result<Minimum>
    where
        F: FnMut(&[f64]) -> f64,
    {
        let mut objective = Counted { f, evaluations: 0 };
        let n = x0.len();

        if n == 0 {
            let value = objective.call(x0);
            return Ok(Minimum {
                x: Vec::new(),
                value,
                evaluations: objective.evaluations,
                converged: value.is_finite(),
            });
        }

        let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
        let f0 = objective.call(x0);
        simplex.push((x0.to_vec(), f0));
        for i in 0..n {
            let mut vertex = x0.to_vec();
            vertex[i] = if vertex[i].abs() > 1e-8 {
                vertex[i] * 1.05
            } else {
                self.initial_step
            };
            let fv = objective.call(&vertex);
            simplex.push((vertex, fv));
        }

        let mut converged = false;
        loop {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

            let best = simplex[0].1;
            let f_spread = simplex.iter().map(|(_, v)| (v - best).abs()).fold(0.0, f64::max);
            let x_spread = simplex
                .iter()
                .skip(1)
                .flat_map(|(x, _)| x.iter().zip(simplex[0].0.iter()).map(|(a, b)| (a - b).abs()))
                .fold(0.0, f64::max);
            if best.is_finite() && f_spread <= self.f_tolerance && x_spread <= self.x_tolerance {
                converged = true;
                break;
            }
            if objective.evaluations >= self.max_evaluations {
                break;
            }

            let mut centroid = vec![0.0; n];
            for (x, _) in simplex.iter().take(n) {
                for (c, xi) in centroid.iter_mut().zip(x) {
                    *c += xi / n as f64;
                }
            }
            let worst = simplex[n].clone();
            let along = |t: f64, target: &[f64]| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(target)
                    .map(|(c, w)| c + t * (w - c))
                    .collect()
            };

            let reflected = along(-1.0, &worst.0);
            let f_reflected = objective.call(&reflected);

            if f_reflected < simplex[0].1 {
                let expanded = along(-2.0, &worst.0);
                let f_expanded = objective.call(&expanded);
                simplex[n] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
                continue;
            }
            if f_reflected < simplex[n - 1].1 {
                simplex[n] = (reflected, f_reflected);
                continue;
            }

            let (contracted, accept_below) = if f_reflected < worst.1 {
                (along(-0.5, &worst.0), f_reflected)
            } else {
                (along(0.5, &worst.0), worst.1)
            };
            let f_contracted = objective.call(&contracted);
            if f_contracted < accept_below {
                simplex[n] = (contracted, f_contracted);
                continue;
            }

            // shrink towards the best vertex
            let anchor = simplex[0].0.clone();
            for vertex in simplex.iter_mut().skip(1) {
                let shrunk: Vec<f64> = anchor
                    .iter()
                    .zip(&vertex.0)
                    .map(|(a, x)| a + 0.5 * (x - a))
                    .collect();
                let fv = objective.call(&shrunk);
                *vertex = (shrunk, fv);
            }
        }

        let (x, value) = simplex.swap_remove(0);
        if !value.is_finite() {
            return Err(MathError::CalculationError(
                "objective is not finite anywhere on the simplex".to_string(),
            ));
        }

        Ok(Minimum {
            x,
            value,
            evaluations: objective.evaluations,
            converged,
        })
    }
}

/// Central-difference Hessian of `f` at `x`
pub fn numerical_hessian<F>(mut f: F, x: &[f64]) -> Result<DMatrix<f64>>
where
    F: FnMut(&[f64]) -> f64,
{
    let n = x.len();
    let steps: Vec<f64> = x
        .iter()
        .map(|v| f64::EPSILON.powf(0.25) * v.abs().max(1.0))
        .collect();
    let f0 = f(x);
    let mut hessian = DMatrix::zeros(n, n);
    let mut point = x.to_vec();

    let mut shifted = |point: &mut Vec<f64>, moves: &[(usize, f64)]| -> f64 {
        for &(i, d) in moves {
            point[i] += d;
        }
        let v = f(point.as_slice());
        for &(i, d) in moves {
            point[i] -= d;
        }
        v
    };

    for i in 0..n {
        let hi = steps[i];
        let plus = shifted(&mut point, &[(i, hi)]);
        let minus = shifted(&mut point, &[(i, -hi)]);
        hessian[(i, i)] = (plus - 2.0 * f0 + minus) / (hi * hi);

        for j in 0..i {
            let hj = steps[j];
            let pp = shifted(&mut point, &[(i, hi), (j, hj)]);
            let pm = shifted(&mut point, &[(i, hi), (j, -hj)]);
            let mp = shifted(&mut point, &[(i, -hi), (j, hj)]);
            let mm = shifted(&mut point, &[(i, -hi), (j, -hj)]);
            let value = (pp - pm - mp + mm) / (4.0 * hi * hj);
            hessian[(i, j)] = value;
            hessian[(j, i)] = value;
        }
    }

    if hessian.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Hessian contains non-finite entries".to_string(),
        ));
    }
    Ok(hessian)
}
