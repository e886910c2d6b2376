use crate::config::{VehicleParam, WarmStartConfig};
use crate::geometry::{Box2d, Vec2d};
use crate::util::normalize_angle;

/// Discrete key of a search state: quantized `(x, y, phi)` of the final
/// pose of the edge arriving at the node.
pub type NodeIndex = (i64, i64, i64);

/// A Hybrid A* search state. Carries every intermediate pose traversed
/// along the edge that produced it; the last pose is the representative
/// one used for indexing and expansion.
#[derive(Debug, Clone)]
pub struct Node3d {
    xs: Vec<f64>,
    ys: Vec<f64>,
    phis: Vec<f64>,
    index: NodeIndex,
    pub parent: Option<usize>,
    pub forward: bool,
    pub steer: f64,
    pub traj_cost: f64,
    pub heu_cost: f64,
}

impl Node3d {
    pub fn new(
        xs: Vec<f64>,
        ys: Vec<f64>,
        phis: Vec<f64>,
        xy_bounds: &[f64; 4],
        config: &WarmStartConfig,
    ) -> Self {
        debug_assert!(!xs.is_empty());
        debug_assert_eq!(xs.len(), ys.len());
        debug_assert_eq!(xs.len(), phis.len());

        let x = *xs.last().unwrap();
        let y = *ys.last().unwrap();
        let phi = *phis.last().unwrap();
        let index = (
            ((x - xy_bounds[0]) / config.xy_grid_resolution).floor() as i64,
            ((y - xy_bounds[2]) / config.xy_grid_resolution).floor() as i64,
            (normalize_angle(phi) / config.phi_grid_resolution).floor() as i64,
        );

        Node3d {
            xs,
            ys,
            phis,
            index,
            parent: None,
            forward: true,
            steer: 0.0,
            traj_cost: 0.0,
            heu_cost: 0.0,
        }
    }

    pub fn from_pose(
        x: f64,
        y: f64,
        phi: f64,
        xy_bounds: &[f64; 4],
        config: &WarmStartConfig,
    ) -> Self {
        Node3d::new(vec![x], vec![y], vec![phi], xy_bounds, config)
    }

    pub fn index(&self) -> NodeIndex {
        self.index
    }

    /// Number of poses along the incoming edge.
    pub fn step_size(&self) -> usize {
        self.xs.len()
    }

    pub fn x(&self) -> f64 {
        *self.xs.last().unwrap()
    }

    pub fn y(&self) -> f64 {
        *self.ys.last().unwrap()
    }

    pub fn phi(&self) -> f64 {
        *self.phis.last().unwrap()
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn phis(&self) -> &[f64] {
        &self.phis
    }

    pub fn cost(&self) -> f64 {
        self.traj_cost + self.heu_cost
    }

    /// Footprint of the vehicle at a rear-axle pose. The body center sits
    /// ahead of the rear axle by `length/2 - back_edge_to_center`.
    pub fn bounding_box(vehicle: &VehicleParam, x: f64, y: f64, phi: f64) -> Box2d {
        let shift = vehicle.length / 2.0 - vehicle.back_edge_to_center;
        let center = Vec2d::new(x + shift * phi.cos(), y + shift * phi.sin());
        Box2d::new(center, phi, vehicle.length, vehicle.width)
    }
}
