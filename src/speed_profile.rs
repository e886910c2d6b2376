//! Turns the coarse geometric path into a timed trajectory: velocity,
//! acceleration, and steering traces, either by plain finite differences
//! or by a piecewise-jerk quadratic program (S-curve).

use crate::config::PlannerConfig;
use crate::error::PlanningError;
use crate::qp::{QpProblem, QpSettings};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};

/// Planner output: parallel state sequences plus the per-step controls.
/// `|x| = |y| = |phi| = |v|`, `|a| = |steer| = |x| - 1`.
#[derive(Debug, Clone, Default)]
pub struct HybridAStarResult {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub phi: Vec<f64>,
    pub v: Vec<f64>,
    pub a: Vec<f64>,
    pub steer: Vec<f64>,
    pub accumulated_s: Vec<f64>,
}

pub struct SpeedProfiler {
    delta_t: f64,
    wheel_base: f64,
    step_size: f64,
    use_s_curve: bool,
    jerk_bound: f64,
    acc_lower: f64,
    acc_upper: f64,
    s_weight: f64,
    velocity_weight: f64,
    acc_weight: f64,
    jerk_weight: f64,
    ref_weight: f64,
}

impl SpeedProfiler {
    pub fn new(config: &PlannerConfig) -> Self {
        let s_curve = &config.warm_start.s_curve_config;
        SpeedProfiler {
            delta_t: config.delta_t,
            wheel_base: config.vehicle.wheel_base,
            step_size: config.warm_start.step_size,
            use_s_curve: config.use_s_curve_speed_smooth,
            jerk_bound: config.longitudinal_jerk_bound,
            acc_lower: config.max_deceleration,
            acc_upper: config.max_acceleration,
            s_weight: s_curve.s_weight,
            velocity_weight: s_curve.velocity_weight,
            acc_weight: s_curve.acc_weight,
            jerk_weight: s_curve.jerk_weight,
            ref_weight: s_curve.ref_weight,
        }
    }

    /// Fills `v`, `a`, `steer` (and `accumulated_s` in S-curve mode) from
    /// the geometric `x`, `y`, `phi` already present in `result`.
    pub fn generate(&self, result: &mut HybridAStarResult) -> Result<(), PlanningError> {
        if result.x.len() < 2 || result.y.len() < 2 || result.phi.len() < 2 {
            debug!("path of {} points is too short to profile", result.x.len());
            return Err(PlanningError::ProfileTooShort);
        }
        if self.use_s_curve {
            self.generate_s_curve(result)
        } else {
            self.generate_finite_difference(result);
            Ok(())
        }
    }

    fn discrete_velocity(&self, result: &HybridAStarResult, i: usize) -> f64 {
        ((result.x[i + 1] - result.x[i]) / self.delta_t) * result.phi[i].cos()
            + ((result.y[i + 1] - result.y[i]) / self.delta_t) * result.phi[i].sin()
    }

    fn steer_from_heading(&self, result: &HybridAStarResult, i: usize) -> f64 {
        let rate = (result.phi[i + 1] - result.phi[i]) * self.wheel_base / self.step_size;
        if result.v[i] > 0.0 {
            rate.atan()
        } else {
            (-rate).atan()
        }
    }

    fn generate_finite_difference(&self, result: &mut HybridAStarResult) {
        let n = result.x.len();
        for i in 0..n - 1 {
            let discrete_v = self.discrete_velocity(result, i);
            result.v.push(discrete_v);
        }
        result.v.push(0.0);

        for i in 0..n - 1 {
            result.a.push((result.v[i + 1] - result.v[i]) / self.delta_t);
        }
        for i in 0..n - 1 {
            let discrete_steer = self.steer_from_heading(result, i);
            result.steer.push(discrete_steer);
        }
    }

    fn generate_s_curve(&self, result: &mut HybridAStarResult) -> Result<(), PlanningError> {
        let n = result.x.len();

        // reference from finite differencing; the leading sample is at
        // rest, the trailing one is forced to rest
        let mut v_ref = vec![0.0];
        let mut s_ref = vec![0.0];
        let mut accumulated = 0.0;
        for i in 0..n - 1 {
            let dv = self.discrete_velocity(result, i);
            accumulated += dv * self.delta_t;
            v_ref.push(dv);
            s_ref.push(accumulated);
        }
        v_ref[n - 1] = 0.0;

        let init_acc = (v_ref[1] - v_ref[0]) / self.delta_t;
        let min_of = |vs: &[f64]| vs.iter().fold(f64::INFINITY, |m, &v| m.min(v));
        let max_of = |vs: &[f64]| vs.iter().fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        let s_bounds = (min_of(&s_ref) - 10.0, max_of(&s_ref) + 10.0);
        let v_bounds = (min_of(&v_ref) - 10.0, max_of(&v_ref) + 10.0);

        let problem = self.build_piecewise_jerk_problem(
            &s_ref,
            init_acc,
            s_bounds,
            v_bounds,
        );
        let solution = problem.solve(&QpSettings::default()).map_err(|err| {
            warn!("piecewise jerk speed optimization failed: {err}");
            PlanningError::from(err)
        })?;

        result.accumulated_s = solution.as_slice()[..n].to_vec();
        result.v = solution.as_slice()[n..2 * n].to_vec();
        result.a = solution.as_slice()[2 * n..3 * n - 1].to_vec();
        for i in 0..n - 1 {
            let discrete_steer = self.steer_from_heading(result, i);
            result.steer.push(discrete_steer);
        }
        Ok(())
    }

    /// Variables are stacked `[s_0..s_{n-1}, v_0..v_{n-1}, a_0..a_{n-1}]`
    /// with trapezoidal continuity equalities between stages, jerk
    /// expressed as the acceleration difference quotient.
    fn build_piecewise_jerk_problem(
        &self,
        s_ref: &[f64],
        init_acc: f64,
        s_bounds: (f64, f64),
        v_bounds: (f64, f64),
    ) -> QpProblem {
        let n = s_ref.len();
        let dt = self.delta_t;
        let i_s = |i: usize| i;
        let i_v = |i: usize| n + i;
        let i_a = |i: usize| 2 * n + i;

        let mut p = DMatrix::<f64>::zeros(3 * n, 3 * n);
        let mut q = DVector::<f64>::zeros(3 * n);
        let tracking = 2.0 * (self.s_weight + self.ref_weight);
        for i in 0..n {
            p[(i_s(i), i_s(i))] += tracking;
            q[i_s(i)] -= tracking * s_ref[i];
            p[(i_v(i), i_v(i))] += 2.0 * self.velocity_weight;
            p[(i_a(i), i_a(i))] += 2.0 * self.acc_weight;
        }
        let jerk_factor = 2.0 * self.jerk_weight / (dt * dt);
        for i in 0..n - 1 {
            p[(i_a(i), i_a(i))] += jerk_factor;
            p[(i_a(i + 1), i_a(i + 1))] += jerk_factor;
            p[(i_a(i), i_a(i + 1))] -= jerk_factor;
            p[(i_a(i + 1), i_a(i))] -= jerk_factor;
        }

        let m = 6 * n + 3;
        let mut a = DMatrix::<f64>::zeros(m, 3 * n);
        let mut lower = DVector::<f64>::zeros(m);
        let mut upper = DVector::<f64>::zeros(m);
        let mut row = 0;
        let mut bound_row = |a: &mut DMatrix<f64>,
                             lower: &mut DVector<f64>,
                             upper: &mut DVector<f64>,
                             row: &mut usize,
                             col: usize,
                             lo: f64,
                             hi: f64| {
            a[(*row, col)] = 1.0;
            lower[*row] = lo;
            upper[*row] = hi;
            *row += 1;
        };

        for i in 0..n {
            bound_row(&mut a, &mut lower, &mut upper, &mut row, i_s(i), s_bounds.0, s_bounds.1);
        }
        for i in 0..n {
            bound_row(&mut a, &mut lower, &mut upper, &mut row, i_v(i), v_bounds.0, v_bounds.1);
        }
        for i in 0..n {
            bound_row(&mut a, &mut lower, &mut upper, &mut row, i_a(i), self.acc_lower, self.acc_upper);
        }
        for i in 0..n - 1 {
            a[(row, i_a(i + 1))] = 1.0 / dt;
            a[(row, i_a(i))] = -1.0 / dt;
            lower[row] = -self.jerk_bound;
            upper[row] = self.jerk_bound;
            row += 1;
        }
        for i in 0..n - 1 {
            a[(row, i_s(i + 1))] = 1.0;
            a[(row, i_s(i))] = -1.0;
            a[(row, i_v(i))] = -dt;
            a[(row, i_a(i))] = -dt * dt / 3.0;
            a[(row, i_a(i + 1))] = -dt * dt / 6.0;
            row += 1;
        }
        for i in 0..n - 1 {
            a[(row, i_v(i + 1))] = 1.0;
            a[(row, i_v(i))] = -1.0;
            a[(row, i_a(i))] = -dt / 2.0;
            a[(row, i_a(i + 1))] = -dt / 2.0;
            row += 1;
        }
        // initial state (s, v, a) = (0, 0, init_acc)
        bound_row(&mut a, &mut lower, &mut upper, &mut row, i_s(0), 0.0, 0.0);
        bound_row(&mut a, &mut lower, &mut upper, &mut row, i_v(0), 0.0, 0.0);
        bound_row(&mut a, &mut lower, &mut upper, &mut row, i_a(0), init_acc, init_acc);
        // terminal state (s_end, 0, 0)
        bound_row(&mut a, &mut lower, &mut upper, &mut row, i_s(n - 1), s_ref[n - 1], s_ref[n - 1]);
        bound_row(&mut a, &mut lower, &mut upper, &mut row, i_v(n - 1), 0.0, 0.0);
        bound_row(&mut a, &mut lower, &mut upper, &mut row, i_a(n - 1), 0.0, 0.0);
        debug_assert_eq!(row, m);

        QpProblem {
            p,
            q,
            a,
            lower,
            upper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use approx::assert_relative_eq;

    fn straight_result(n: usize, spacing: f64) -> HybridAStarResult {
        HybridAStarResult {
            x: (0..n).map(|i| i as f64 * spacing).collect(),
            y: vec![0.0; n],
            phi: vec![0.0; n],
            ..HybridAStarResult::default()
        }
    }

    fn config() -> PlannerConfig {
        PlannerConfig {
            delta_t: 0.5,
            ..PlannerConfig::default()
        }
    }

    #[test]
    fn finite_difference_sizes_and_terminal_rest() {
        let mut result = straight_result(12, 0.5);
        SpeedProfiler::new(&config()).generate(&mut result).unwrap();

        assert_eq!(result.v.len(), result.x.len());
        assert_eq!(result.a.len(), result.x.len() - 1);
        assert_eq!(result.steer.len(), result.x.len() - 1);
        assert_relative_eq!(*result.v.last().unwrap(), 0.0);
        // straight path, constant spacing: v = spacing / dt until the end
        assert_relative_eq!(result.v[0], 1.0);
        assert!(result.steer.iter().all(|s| s.abs() < 1e-12));
    }

    #[test]
    fn finite_difference_signs_follow_direction() {
        let mut result = straight_result(6, 0.5);
        // drive the second half backwards
        for i in 3..6 {
            result.x[i] = result.x[2] - (i - 2) as f64 * 0.5;
        }
        SpeedProfiler::new(&config()).generate(&mut result).unwrap();
        assert!(result.v.iter().any(|&v| v > 0.0));
        assert!(result.v.iter().any(|&v| v < 0.0));
    }

    #[test]
    fn too_short_path_is_rejected() {
        let mut result = straight_result(1, 0.5);
        let err = SpeedProfiler::new(&config()).generate(&mut result);
        assert!(matches!(err, Err(PlanningError::ProfileTooShort)));
    }

    #[test]
    fn s_curve_tracks_the_reference_arc() {
        let mut config = config();
        config.use_s_curve_speed_smooth = true;
        let mut result = straight_result(14, 0.5);
        SpeedProfiler::new(&config).generate(&mut result).unwrap();

        let n = result.x.len();
        assert_eq!(result.accumulated_s.len(), n);
        assert_eq!(result.v.len(), n);
        assert_eq!(result.a.len(), n - 1);
        assert_eq!(result.steer.len(), n - 1);

        // boundary equalities, within solver tolerance
        assert_relative_eq!(result.accumulated_s[0], 0.0, epsilon = 1e-3);
        assert_relative_eq!(result.v[0], 0.0, epsilon = 1e-3);
        assert_relative_eq!(*result.v.last().unwrap(), 0.0, epsilon = 1e-3);
        // total arc equals the reference within tolerance
        let expected = 13.0 * 0.5;
        assert_relative_eq!(*result.accumulated_s.last().unwrap(), expected, epsilon = 1e-2);

        // monotone for an all-forward reference
        for pair in result.accumulated_s.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-3);
        }
        // acceleration window and jerk bound hold
        for &acc in &result.a {
            assert!(acc >= config.max_deceleration - 1e-3);
            assert!(acc <= config.max_acceleration + 1e-3);
        }
        for pair in result.a.windows(2) {
            let jerk = (pair[1] - pair[0]) / config.delta_t;
            assert!(jerk.abs() <= config.longitudinal_jerk_bound + 1e-3);
        }
    }
}
