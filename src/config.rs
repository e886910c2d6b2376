use serde::{Deserialize, Serialize};

/// Footprint and steering geometry of the planned vehicle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VehicleParam {
    pub length: f64,              // [m] overall body length
    pub width: f64,               // [m] overall body width
    pub back_edge_to_center: f64, // [m] rear body edge to rear axle center
    pub wheel_base: f64,          // [m]
    pub max_steer_angle: f64,     // [rad] at the steering wheel
    pub steer_ratio: f64,         // steering wheel angle / road wheel angle
}

impl VehicleParam {
    /// Maximum road-wheel steering angle.
    pub fn max_front_wheel_angle(&self) -> f64 {
        self.max_steer_angle / self.steer_ratio
    }

    /// Maximum path curvature at full steering lock.
    pub fn max_kappa(&self) -> f64 {
        self.max_front_wheel_angle().tan() / self.wheel_base
    }
}

impl Default for VehicleParam {
    fn default() -> Self {
        VehicleParam {
            length: 4.933,
            width: 2.11,
            back_edge_to_center: 1.043,
            wheel_base: 2.8448,
            max_steer_angle: 8.20304748437,
            steer_ratio: 16.0,
        }
    }
}

/// Weights of the piecewise-jerk speed objective.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SCurveConfig {
    pub s_weight: f64,
    pub velocity_weight: f64,
    pub acc_weight: f64,
    pub jerk_weight: f64,
    pub ref_weight: f64,
}

impl Default for SCurveConfig {
    fn default() -> Self {
        SCurveConfig {
            s_weight: 1.0,
            velocity_weight: 0.0,
            acc_weight: 1.0,
            jerk_weight: 3.0,
            ref_weight: 100.0,
        }
    }
}

/// Tuning of the warm-start search itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmStartConfig {
    pub next_node_num: usize,          // motion primitives per expansion, even
    pub step_size: f64,                // [m] primitive integration substep
    pub xy_grid_resolution: f64,       // [m]
    pub phi_grid_resolution: f64,      // [rad]
    pub traj_forward_penalty: f64,     // per meter driven forward
    pub traj_back_penalty: f64,        // per meter driven in reverse
    pub traj_gear_switch_penalty: f64, // per direction change
    pub traj_steer_penalty: f64,       // per rad of steering
    pub traj_steer_change_penalty: f64, // per rad of steering change
    pub s_curve_config: SCurveConfig,
}

impl Default for WarmStartConfig {
    fn default() -> Self {
        WarmStartConfig {
            next_node_num: 10,
            step_size: 0.2,
            xy_grid_resolution: 0.3,
            phi_grid_resolution: 0.1,
            traj_forward_penalty: 1.0,
            traj_back_penalty: 5.0,
            traj_gear_switch_penalty: 10.0,
            traj_steer_penalty: 0.5,
            traj_steer_change_penalty: 1.0,
            s_curve_config: SCurveConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub vehicle: VehicleParam,
    pub warm_start: WarmStartConfig,
    pub delta_t: f64, // [s] discretization of the timed output
    pub use_s_curve_speed_smooth: bool,
    pub longitudinal_jerk_bound: f64, // [m/s^3] mode-B jerk cap
    pub max_deceleration: f64,        // [m/s^2] mode-B acceleration window, lower
    pub max_acceleration: f64,        // [m/s^2] mode-B acceleration window, upper
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            vehicle: VehicleParam::default(),
            warm_start: WarmStartConfig::default(),
            delta_t: 0.5,
            use_s_curve_speed_smooth: false,
            longitudinal_jerk_bound: 5.0,
            max_deceleration: -4.4,
            max_acceleration: 10.0,
        }
    }
}
