//! Shortest Reeds-Shepp curve between two poses for a vehicle with a
//! bounded turning radius. Candidates are solved in normalized
//! coordinates (unit turning radius), the shortest is sampled densely and
//! transformed back to the world frame.

use crate::config::{VehicleParam, WarmStartConfig};
use crate::util::normalize_angle;
use std::f64::consts::PI;

const MAX_NORMALIZED_LENGTH: f64 = 1000.0;
const MIN_NORMALIZED_LENGTH: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegType {
    Straight,
    Left,
    Right,
}

impl SegType {
    fn mirrored(self) -> Self {
        match self {
            SegType::Left => SegType::Right,
            SegType::Right => SegType::Left,
            SegType::Straight => SegType::Straight,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReedsSheppPath {
    pub lengths: Vec<f64>, // [m] signed segment lengths, negative = reverse
    pub types: Vec<SegType>,
    pub total_length: f64, // [m]
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub phi: Vec<f64>,
    pub gear: Vec<bool>, // true = forward, per sample
}

/// Candidate curve in normalized units, before sampling.
#[derive(Debug, Clone)]
struct Candidate {
    lengths: Vec<f64>,
    types: Vec<SegType>,
    total: f64,
}

pub struct ReedsShepp {
    max_kappa: f64,
    step_size: f64,
}

impl ReedsShepp {
    pub fn new(vehicle: &VehicleParam, config: &WarmStartConfig) -> Self {
        ReedsShepp {
            max_kappa: vehicle.max_kappa(),
            step_size: config.step_size,
        }
    }

    /// Shortest curve from `from` to `to`, densely sampled, or `None`
    /// when no word family admits the pose pair.
    pub fn shortest_rsp(&self, from: (f64, f64, f64), to: (f64, f64, f64)) -> Option<ReedsSheppPath> {
        let candidates = generate_candidates(from, to, self.max_kappa);
        let best = candidates
            .into_iter()
            .min_by(|a, b| a.total.total_cmp(&b.total))?;
        Some(self.sample(&best, from))
    }

    fn sample(&self, candidate: &Candidate, from: (f64, f64, f64)) -> ReedsSheppPath {
        let step = self.step_size * self.max_kappa; // normalized arc per sample
        let first_forward = candidate
            .lengths
            .iter()
            .find(|l| l.abs() > 1e-12)
            .map_or(true, |&l| l > 0.0);
        let mut xs = vec![0.0];
        let mut ys = vec![0.0];
        let mut phis = vec![0.0];
        let mut gear = vec![first_forward];

        for (&length, &seg_type) in candidate.lengths.iter().zip(candidate.types.iter()) {
            if length.abs() < 1e-12 {
                continue; // degenerate segment, nothing to sample
            }
            let origin = (
                *xs.last().unwrap(),
                *ys.last().unwrap(),
                *phis.last().unwrap(),
            );
            let d = if length > 0.0 { step } else { -step };
            let mut arc = d;
            while arc.abs() < length.abs() {
                let (x, y, phi) = self.interpolate(arc, seg_type, origin);
                xs.push(x);
                ys.push(y);
                phis.push(phi);
                gear.push(length > 0.0);
                arc += d;
            }
            let (x, y, phi) = self.interpolate(length, seg_type, origin);
            xs.push(x);
            ys.push(y);
            phis.push(phi);
            gear.push(length > 0.0);
        }

        // local frame to world frame
        let (sx, sy, sphi) = from;
        let (cos_s, sin_s) = (sphi.cos(), sphi.sin());
        let x: Vec<f64> = xs
            .iter()
            .zip(ys.iter())
            .map(|(&ix, &iy)| ix * cos_s - iy * sin_s + sx)
            .collect();
        let y: Vec<f64> = xs
            .iter()
            .zip(ys.iter())
            .map(|(&ix, &iy)| ix * sin_s + iy * cos_s + sy)
            .collect();
        let phi: Vec<f64> = phis.iter().map(|&p| normalize_angle(p + sphi)).collect();

        ReedsSheppPath {
            lengths: candidate.lengths.iter().map(|l| l / self.max_kappa).collect(),
            types: candidate.types.clone(),
            total_length: candidate.total / self.max_kappa,
            x,
            y,
            phi,
            gear,
        }
    }

    /// Pose after driving a normalized arc `l` of one segment starting at
    /// `origin`. Positions come out in meters, headings in radians.
    fn interpolate(&self, l: f64, seg_type: SegType, origin: (f64, f64, f64)) -> (f64, f64, f64) {
        let (ox, oy, ophi) = origin;
        match seg_type {
            SegType::Straight => (
                ox + l / self.max_kappa * ophi.cos(),
                oy + l / self.max_kappa * ophi.sin(),
                ophi,
            ),
            SegType::Left | SegType::Right => {
                let ldx = l.sin() / self.max_kappa;
                let ldy = match seg_type {
                    SegType::Left => (1.0 - l.cos()) / self.max_kappa,
                    _ => -(1.0 - l.cos()) / self.max_kappa,
                };
                let x = ox + ophi.cos() * ldx - ophi.sin() * ldy;
                let y = oy + ophi.sin() * ldx + ophi.cos() * ldy;
                let phi = match seg_type {
                    SegType::Left => ophi + l,
                    _ => ophi - l,
                };
                (x, y, phi)
            }
        }
    }
}

fn generate_candidates(
    from: (f64, f64, f64),
    to: (f64, f64, f64),
    max_kappa: f64,
) -> Vec<Candidate> {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let dphi = to.2 - from.2;
    let c = from.2.cos();
    let s = from.2.sin();
    let x = (c * dx + s * dy) * max_kappa;
    let y = (-s * dx + c * dy) * max_kappa;

    let mut out = Vec::new();
    use SegType::{Left, Right, Straight};

    // straight-curve-straight admits no time-flip symmetry
    apply_family(x, y, dphi, sls, &[Straight, Left, Straight], false, false, &mut out);
    apply_family(x, y, dphi, lsl, &[Left, Straight, Left], true, false, &mut out);
    apply_family(x, y, dphi, lsr, &[Left, Straight, Right], true, false, &mut out);
    apply_family(x, y, dphi, lrl, &[Left, Right, Left], true, false, &mut out);
    apply_family(x, y, dphi, lrl, &[Left, Right, Left], true, true, &mut out);
    apply_family(x, y, dphi, lrlrn, &[Left, Right, Left, Right], true, false, &mut out);
    apply_family(x, y, dphi, lrlrp, &[Left, Right, Left, Right], true, false, &mut out);
    apply_family(x, y, dphi, lrsl, &[Left, Right, Straight, Left], true, false, &mut out);
    apply_family(x, y, dphi, lrsr, &[Left, Right, Straight, Right], true, false, &mut out);
    apply_family(x, y, dphi, lrsl, &[Left, Right, Straight, Left], true, true, &mut out);
    apply_family(x, y, dphi, lrsr, &[Left, Right, Straight, Right], true, true, &mut out);
    apply_family(
        x,
        y,
        dphi,
        lrslr,
        &[Left, Right, Straight, Left, Right],
        true,
        false,
        &mut out,
    );

    out
}

/// Runs one base solver through the reflection/time-flip symmetry group
/// and collects every valid variant. `backwards` drives the word in
/// reversed segment order against the flipped frame.
#[allow(clippy::too_many_arguments)]
fn apply_family(
    x: f64,
    y: f64,
    phi: f64,
    solver: fn(f64, f64, f64) -> Option<Vec<f64>>,
    types: &[SegType],
    time_flip: bool,
    backwards: bool,
    out: &mut Vec<Candidate>,
) {
    let (bx, by) = if backwards {
        (x * phi.cos() + y * phi.sin(), x * phi.sin() - y * phi.cos())
    } else {
        (x, y)
    };

    let variants: [(f64, f64, f64, bool, bool); 4] = [
        (bx, by, phi, false, false),
        (-bx, by, -phi, true, false),
        (bx, -by, -phi, false, true),
        (-bx, -by, phi, true, true),
    ];

    for (vx, vy, vphi, negate, mirror) in variants {
        if negate && !time_flip {
            continue;
        }
        let Some(mut lengths) = solver(vx, vy, vphi) else {
            continue;
        };
        if negate {
            for l in &mut lengths {
                *l = -*l;
            }
        }
        let mut seg_types = types.to_vec();
        if mirror {
            for t in &mut seg_types {
                *t = t.mirrored();
            }
        }
        if backwards {
            lengths.reverse();
            seg_types.reverse();
        }
        push_candidate(out, lengths, seg_types);
    }
}

fn push_candidate(out: &mut Vec<Candidate>, lengths: Vec<f64>, types: Vec<SegType>) {
    let total: f64 = lengths.iter().map(|l| l.abs()).sum();
    if !(MIN_NORMALIZED_LENGTH..MAX_NORMALIZED_LENGTH).contains(&total) {
        return;
    }
    let duplicate = out.iter().any(|c| {
        c.types == types
            && c.lengths
                .iter()
                .zip(lengths.iter())
                .map(|(a, b)| (a - b).abs())
                .sum::<f64>()
                < MIN_NORMALIZED_LENGTH
    });
    if duplicate {
        return;
    }
    out.push(Candidate {
        lengths,
        types,
        total,
    });
}

fn polar(x: f64, y: f64) -> (f64, f64) {
    (x.hypot(y), y.atan2(x))
}

fn mod_angle(theta: f64) -> f64 {
    let mut phi = theta % (2.0 * PI);
    if phi < -PI {
        phi += 2.0 * PI;
    }
    if phi > PI {
        phi -= 2.0 * PI;
    }
    phi
}

fn lsl(x: f64, y: f64, phi: f64) -> Option<Vec<f64>> {
    let (u, t) = polar(x - phi.sin(), y - 1.0 + phi.cos());
    if t >= 0.0 {
        let v = mod_angle(phi - t);
        if v >= 0.0 {
            return Some(vec![t, u, v]);
        }
    }
    None
}

fn lsr(x: f64, y: f64, phi: f64) -> Option<Vec<f64>> {
    let (u1, t1) = polar(x + phi.sin(), y - 1.0 - phi.cos());
    let u1 = u1.powi(2);
    if u1 >= 4.0 {
        let u = (u1 - 4.0).sqrt();
        let theta = 2.0_f64.atan2(u);
        let t = mod_angle(t1 + theta);
        let v = mod_angle(t - phi);
        if t >= 0.0 && v >= 0.0 {
            return Some(vec![t, u, v]);
        }
    }
    None
}

fn lrl(x: f64, y: f64, phi: f64) -> Option<Vec<f64>> {
    let (u1, t1) = polar(x - phi.sin(), y - 1.0 + phi.cos());
    if u1 <= 4.0 {
        let u = -2.0 * (0.25 * u1).asin();
        let t = mod_angle(t1 + 0.5 * u + PI);
        let v = mod_angle(phi - t + u);
        if t >= 0.0 && u <= 0.0 {
            return Some(vec![t, u, v]);
        }
    }
    None
}

fn sls(x: f64, y: f64, phi: f64) -> Option<Vec<f64>> {
    let phi = mod_angle(phi);
    if !(0.0 < phi && phi < PI * 0.99) {
        return None;
    }
    let xd = -y / phi.tan() + x;
    let t = xd - (phi / 2.0).tan();
    let u = phi;
    if y > 0.0 {
        let v = ((x - xd).powi(2) + y.powi(2)).sqrt() - (phi / 2.0).tan();
        Some(vec![t, u, v])
    } else if y < 0.0 {
        let v = -((x - xd).powi(2) + y.powi(2)).sqrt() - (phi / 2.0).tan();
        Some(vec![t, u, v])
    } else {
        None
    }
}

fn calc_tau_omega(u: f64, v: f64, xi: f64, eta: f64, phi: f64) -> (f64, f64) {
    let delta = mod_angle(u - v);
    let a = u.sin() - delta.sin();
    let b = u.cos() - delta.cos() - 1.0;
    let t1 = (eta * a - xi * b).atan2(xi * a + eta * b);
    let t2 = 2.0 * (delta.cos() - v.cos() - u.cos()) + 3.0;
    let tau = if t2 < 0.0 {
        mod_angle(t1 + PI)
    } else {
        mod_angle(t1)
    };
    let omega = mod_angle(tau - u + v - phi);
    (tau, omega)
}

fn lrlrn(x: f64, y: f64, phi: f64) -> Option<Vec<f64>> {
    let xi = x + phi.sin();
    let eta = y - 1.0 - phi.cos();
    let rho = 0.25 * (2.0 + (xi.powi(2) + eta.powi(2)).sqrt());
    if rho <= 1.0 {
        let u = rho.acos();
        let (t, v) = calc_tau_omega(u, -u, xi, eta, phi);
        if t >= 0.0 && v <= 0.0 {
            return Some(vec![t, u, -u, v]);
        }
    }
    None
}

fn lrlrp(x: f64, y: f64, phi: f64) -> Option<Vec<f64>> {
    let xi = x + phi.sin();
    let eta = y - 1.0 - phi.cos();
    let rho = (20.0 - xi.powi(2) - eta.powi(2)) / 16.0;
    if (0.0..=1.0).contains(&rho) {
        let u = -rho.acos();
        if u >= -0.5 * PI {
            let (t, v) = calc_tau_omega(u, u, xi, eta, phi);
            if t >= 0.0 && v >= 0.0 {
                return Some(vec![t, u, u, v]);
            }
        }
    }
    None
}

fn lrsl(x: f64, y: f64, phi: f64) -> Option<Vec<f64>> {
    let xi = x - phi.sin();
    let eta = y - 1.0 + phi.cos();
    let (rho, theta) = polar(xi, eta);
    if rho >= 2.0 {
        let r = (rho.powi(2) - 4.0).sqrt();
        let u = 2.0 - r;
        let t = mod_angle(theta + r.atan2(-2.0));
        let v = mod_angle(phi - 0.5 * PI - t);
        if t >= 0.0 && u <= 0.0 && v <= 0.0 {
            return Some(vec![t, -0.5 * PI, u, v]);
        }
    }
    None
}

fn lrsr(x: f64, y: f64, phi: f64) -> Option<Vec<f64>> {
    let xi = x + phi.sin();
    let eta = y - 1.0 - phi.cos();
    let (rho, theta) = polar(-eta, xi);
    if rho >= 2.0 {
        let t = theta;
        let u = 2.0 - rho;
        let v = mod_angle(t + 0.5 * PI - phi);
        if t >= 0.0 && u <= 0.0 && v <= 0.0 {
            return Some(vec![t, -0.5 * PI, u, v]);
        }
    }
    None
}

fn lrslr(x: f64, y: f64, phi: f64) -> Option<Vec<f64>> {
    let xi = x + phi.sin();
    let eta = y - 1.0 - phi.cos();
    let (rho, _) = polar(xi, eta);
    if rho >= 2.0 {
        let u = 4.0 - (rho.powi(2) - 4.0).sqrt();
        if u <= 0.0 {
            let t = mod_angle(((4.0 - u) * xi - 2.0 * eta).atan2(-2.0 * xi + (u - 4.0) * eta));
            let v = mod_angle(t - phi);
            if t >= 0.0 && v >= 0.0 {
                return Some(vec![t, -0.5 * PI, u, -0.5 * PI, v]);
            }
        }
    }
    None
}
