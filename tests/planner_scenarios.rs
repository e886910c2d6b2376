//! End-to-end planner scenarios: free-space driving, reverse maneuvers,
//! detours, infeasible seeds, unreachable goals, and the S-curve profile.

use open_space_planner::config::{PlannerConfig, VehicleParam, WarmStartConfig};
use open_space_planner::error::PlanningError;
use open_space_planner::geometry::{LineSegment2d, Vec2d};
use open_space_planner::node::Node3d;
use open_space_planner::speed_profile::HybridAStarResult;
use open_space_planner::util::normalize_angle;
use open_space_planner::HybridAStar;

/// A compact test vehicle: about a two meter turning radius, so
/// Reeds-Shepp maneuvers fit the small workspaces below.
fn test_config() -> PlannerConfig {
    PlannerConfig {
        vehicle: VehicleParam {
            length: 2.6,
            width: 1.4,
            back_edge_to_center: 0.4,
            wheel_base: 2.0,
            max_steer_angle: 0.785,
            steer_ratio: 1.0,
        },
        warm_start: WarmStartConfig {
            next_node_num: 10,
            step_size: 0.2,
            xy_grid_resolution: 0.5,
            phi_grid_resolution: 0.2,
            traj_forward_penalty: 1.0,
            traj_back_penalty: 2.0,
            traj_gear_switch_penalty: 5.0,
            traj_steer_penalty: 0.5,
            traj_steer_change_penalty: 0.5,
            ..WarmStartConfig::default()
        },
        delta_t: 0.5,
        use_s_curve_speed_smooth: false,
        ..PlannerConfig::default()
    }
}

fn closed_rectangle(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Vec<Vec2d> {
    vec![
        Vec2d::new(xmin, ymin),
        Vec2d::new(xmax, ymin),
        Vec2d::new(xmax, ymax),
        Vec2d::new(xmin, ymax),
        Vec2d::new(xmin, ymin),
    ]
}

fn assert_output_sizes(result: &HybridAStarResult) {
    let n = result.x.len();
    assert_eq!(result.y.len(), n);
    assert_eq!(result.phi.len(), n);
    assert_eq!(result.v.len(), n);
    assert_eq!(result.a.len(), n - 1);
    assert_eq!(result.steer.len(), n - 1);
}

fn assert_kinematic_steps(result: &HybridAStarResult, config: &PlannerConfig) {
    let step = config.warm_start.step_size;
    let max_dphi =
        step * config.vehicle.max_front_wheel_angle().tan() / config.vehicle.wheel_base;
    for i in 0..result.x.len() - 1 {
        let ds = (result.x[i + 1] - result.x[i]).hypot(result.y[i + 1] - result.y[i]);
        assert!(ds <= step + 1e-6, "step {i} moved {ds}");
        let dphi = normalize_angle(result.phi[i + 1] - result.phi[i]).abs();
        assert!(dphi <= max_dphi + 1e-6, "step {i} turned {dphi}");
    }
}

fn assert_collision_free(
    result: &HybridAStarResult,
    vehicle: &VehicleParam,
    obstacles: &[Vec<Vec2d>],
) {
    let segments: Vec<LineSegment2d> = obstacles
        .iter()
        .flat_map(|polyline| {
            polyline
                .windows(2)
                .map(|pair| LineSegment2d::new(pair[0], pair[1]))
                .collect::<Vec<_>>()
        })
        .collect();
    for i in 0..result.x.len() {
        let footprint =
            Node3d::bounding_box(vehicle, result.x[i], result.y[i], result.phi[i]);
        for segment in &segments {
            assert!(
                !footprint.has_overlap(segment),
                "pose {i} at ({}, {}) hits an obstacle",
                result.x[i],
                result.y[i]
            );
        }
    }
}

#[test]
fn s1_free_space_straight() {
    let config = test_config();
    let mut planner = HybridAStar::new(config.clone());
    let result = planner
        .plan(0.0, 0.0, 0.0, 5.0, 0.0, 0.0, [-10.0, 10.0, -10.0, 10.0], &[])
        .unwrap();

    assert_output_sizes(&result);
    assert_kinematic_steps(&result, &config);

    assert_eq!(result.x[0], 0.0);
    assert_eq!(result.y[0], 0.0);
    let last = result.x.len() - 1;
    assert!((result.x[last] - 5.0).abs() <= config.warm_start.xy_grid_resolution);
    assert!(result.y[last].abs() <= config.warm_start.xy_grid_resolution);

    assert_eq!(*result.v.last().unwrap(), 0.0);
    assert!(result.steer.iter().all(|s| s.abs() < 1e-6));
}

#[test]
fn s2_reverse_parking_switches_gear() {
    let config = test_config();
    let mut planner = HybridAStar::new(config.clone());
    let result = planner
        .plan(
            0.0,
            0.0,
            0.0,
            0.0,
            -2.0,
            std::f64::consts::FRAC_PI_2,
            [-5.0, 5.0, -5.0, 5.0],
            &[],
        )
        .unwrap();

    assert_output_sizes(&result);
    assert_kinematic_steps(&result, &config);

    let last = result.x.len() - 1;
    assert!((result.x[last] - 0.0).abs() <= 1e-4);
    assert!((result.y[last] + 2.0).abs() <= 1e-4);

    assert!(result.v.iter().any(|&v| v > 0.01));
    assert!(result.v.iter().any(|&v| v < -0.01));
}

#[test]
fn s3_blocked_direct_path_detours() {
    let config = test_config();
    let obstacles = vec![closed_rectangle(4.0, 6.0, -1.0, 1.0)];
    let mut planner = HybridAStar::new(config.clone());
    let result = planner
        .plan(
            0.0,
            0.0,
            0.0,
            10.0,
            0.0,
            0.0,
            [-2.0, 12.0, -6.0, 6.0],
            &obstacles,
        )
        .unwrap();

    assert_output_sizes(&result);
    assert_kinematic_steps(&result, &config);
    assert_collision_free(&result, &config.vehicle, &obstacles);

    assert_eq!(result.x[0], 0.0);
    let last = result.x.len() - 1;
    assert!((result.x[last] - 10.0).abs() <= 1e-4);
    assert!(result.y[last].abs() <= 1e-4);

    // the straight line is blocked, so the path must leave the x axis
    assert!(result.y.iter().any(|&y| y.abs() > 1.0));
}

#[test]
fn s4_start_in_collision_fails_fast() {
    let config = test_config();
    let obstacles = vec![closed_rectangle(4.0, 6.0, -1.0, 1.0)];
    let mut planner = HybridAStar::new(config);
    let planned = planner.plan(
        5.0,
        0.0,
        0.0,
        10.0,
        0.0,
        0.0,
        [-2.0, 12.0, -6.0, 6.0],
        &obstacles,
    );
    assert!(matches!(planned, Err(PlanningError::InvalidStart)));
}

#[test]
fn s5_enclosed_goal_exhausts_the_search() {
    let mut config = test_config();
    // coarse grid keeps the exhaustive sweep small
    config.warm_start.xy_grid_resolution = 1.0;
    config.warm_start.phi_grid_resolution = 0.6;
    let obstacles = vec![closed_rectangle(-3.0, 3.0, -3.0, 3.0)];
    let mut planner = HybridAStar::new(config);
    let planned = planner.plan(
        -4.2,
        -4.2,
        0.0,
        0.0,
        0.0,
        0.0,
        [-5.5, 5.5, -5.5, 5.5],
        &obstacles,
    );
    assert!(matches!(planned, Err(PlanningError::SearchExhausted)));
}

#[test]
fn s6_s_curve_profile_is_consistent() {
    let mut config = test_config();
    config.use_s_curve_speed_smooth = true;
    let mut planner = HybridAStar::new(config.clone());
    let result = planner
        .plan(0.0, 0.0, 0.0, 5.0, 0.0, 0.0, [-10.0, 10.0, -10.0, 10.0], &[])
        .unwrap();

    assert_output_sizes(&result);
    assert_eq!(result.accumulated_s.len(), result.x.len());

    for pair in result.accumulated_s.windows(2) {
        assert!(pair[1] >= pair[0] - 1e-3, "arc not monotone: {pair:?}");
    }
    let total = *result.accumulated_s.last().unwrap();
    assert!((total - 5.0).abs() <= config.warm_start.step_size + 1e-2);

    for &a in &result.a {
        assert!(a >= config.max_deceleration - 1e-3);
        assert!(a <= config.max_acceleration + 1e-3);
    }
    for pair in result.a.windows(2) {
        let jerk = (pair[1] - pair[0]) / config.delta_t;
        assert!(jerk.abs() <= config.longitudinal_jerk_bound + 1e-3);
    }
    // the path ends at rest with a settled acceleration
    assert!(result.v.last().unwrap().abs() <= 1e-3);
    assert!(
        result.a.last().unwrap().abs()
            <= config.longitudinal_jerk_bound * config.delta_t + 0.1
    );
}

#[test]
fn planning_twice_is_idempotent() {
    let config = test_config();
    let mut planner = HybridAStar::new(config);
    let obstacles = vec![closed_rectangle(4.0, 6.0, -1.0, 1.0)];
    let first = planner
        .plan(
            0.0,
            0.0,
            0.0,
            10.0,
            0.0,
            0.0,
            [-2.0, 12.0, -6.0, 6.0],
            &obstacles,
        )
        .unwrap();
    let second = planner
        .plan(
            0.0,
            0.0,
            0.0,
            10.0,
            0.0,
            0.0,
            [-2.0, 12.0, -6.0, 6.0],
            &obstacles,
        )
        .unwrap();

    assert_eq!(first.x, second.x);
    assert_eq!(first.y, second.y);
    assert_eq!(first.phi, second.phi);
    assert_eq!(first.v, second.v);
    assert_eq!(first.a, second.a);
    assert_eq!(first.steer, second.steer);
}
