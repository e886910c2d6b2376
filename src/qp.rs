//! Dense ADMM solver for box-constrained quadratic programs,
//!
//! ```text
//! min 1/2 z'Pz + q'z   s.t.   l <= Az <= u
//! ```
//!
//! sized for the speed-profile problems this crate produces (a few
//! hundred variables). The KKT-like system is factored once and reused
//! across iterations; rows with `l == u` carry a boosted penalty so
//! boundary equalities pin down tightly.

use nalgebra::{Cholesky, DMatrix, DVector};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QpError {
    #[error("objective and constraint dimensions disagree")]
    DimensionMismatch,
    #[error("quadratic term could not be factored")]
    Factorization,
    #[error("no convergence within {0} iterations")]
    NotConverged(usize),
}

#[derive(Debug, Clone)]
pub struct QpSettings {
    pub max_iterations: usize,
    pub eps_abs: f64,
    pub sigma: f64,
    pub rho: f64,
}

impl Default for QpSettings {
    fn default() -> Self {
        QpSettings {
            max_iterations: 20_000,
            eps_abs: 1e-4,
            sigma: 1e-6,
            rho: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QpProblem {
    pub p: DMatrix<f64>,
    pub q: DVector<f64>,
    pub a: DMatrix<f64>,
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl QpProblem {
    pub fn solve(&self, settings: &QpSettings) -> Result<DVector<f64>, QpError> {
        let n = self.q.len();
        let m = self.lower.len();
        if self.p.nrows() != n
            || self.p.ncols() != n
            || self.a.nrows() != m
            || self.a.ncols() != n
            || self.upper.len() != m
        {
            return Err(QpError::DimensionMismatch);
        }

        let mut rho = DVector::from_element(m, settings.rho);
        for i in 0..m {
            if (self.upper[i] - self.lower[i]).abs() < 1e-12 {
                rho[i] = settings.rho * 1e3;
            }
        }

        let mut kkt = self.p.clone();
        for i in 0..n {
            kkt[(i, i)] += settings.sigma;
        }
        let mut scaled_a = self.a.clone();
        for i in 0..m {
            for j in 0..n {
                scaled_a[(i, j)] *= rho[i];
            }
        }
        kkt += self.a.transpose() * &scaled_a;
        let factor = Cholesky::new(kkt).ok_or(QpError::Factorization)?;

        let a_t = self.a.transpose();
        let mut x = DVector::<f64>::zeros(n);
        let mut z = DVector::<f64>::zeros(m);
        for i in 0..m {
            z[i] = 0.0_f64.clamp(self.lower[i], self.upper[i]);
        }
        let mut y = DVector::<f64>::zeros(m);

        for iteration in 0..settings.max_iterations {
            let mut w = DVector::<f64>::zeros(m);
            for i in 0..m {
                w[i] = rho[i] * z[i] - y[i];
            }
            let rhs = &x * settings.sigma - &self.q + &a_t * w;
            x = factor.solve(&rhs);

            let ax = &self.a * &x;
            for i in 0..m {
                let tentative = ax[i] + y[i] / rho[i];
                z[i] = tentative.clamp(self.lower[i], self.upper[i]);
                y[i] += rho[i] * (ax[i] - z[i]);
            }

            if iteration % 25 == 0 {
                let primal = (0..m)
                    .map(|i| (ax[i] - z[i]).abs())
                    .fold(0.0_f64, f64::max);
                let dual_vec = &self.p * &x + &self.q + &a_t * &y;
                let dual = dual_vec.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
                if primal < settings.eps_abs && dual < settings.eps_abs {
                    return Ok(x);
                }
            }
        }
        Err(QpError::NotConverged(settings.max_iterations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unconstrained_minimum_inside_the_box() {
        // min (x0 - 1)^2 + (x1 - 2)^2
        let problem = QpProblem {
            p: DMatrix::from_diagonal_element(2, 2, 2.0),
            q: DVector::from_vec(vec![-2.0, -4.0]),
            a: DMatrix::identity(2, 2),
            lower: DVector::from_element(2, -100.0),
            upper: DVector::from_element(2, 100.0),
        };
        let x = problem.solve(&QpSettings::default()).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-3);
    }

    #[test]
    fn active_bound_and_equality_row() {
        // min (x0 - 1)^2 + (x1 + 2)^2  s.t.  x0 + x1 = 1, x >= 0
        let mut a = DMatrix::zeros(3, 2);
        a[(0, 0)] = 1.0;
        a[(1, 1)] = 1.0;
        a[(2, 0)] = 1.0;
        a[(2, 1)] = 1.0;
        let problem = QpProblem {
            p: DMatrix::from_diagonal_element(2, 2, 2.0),
            q: DVector::from_vec(vec![-2.0, 4.0]),
            a,
            lower: DVector::from_vec(vec![0.0, 0.0, 1.0]),
            upper: DVector::from_vec(vec![10.0, 10.0, 1.0]),
        };
        let x = problem.solve(&QpSettings::default()).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-3);
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let problem = QpProblem {
            p: DMatrix::identity(2, 2),
            q: DVector::zeros(3),
            a: DMatrix::identity(2, 2),
            lower: DVector::zeros(2),
            upper: DVector::zeros(2),
        };
        assert!(matches!(
            problem.solve(&QpSettings::default()),
            Err(QpError::DimensionMismatch)
        ));
    }
}
