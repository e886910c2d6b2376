//! Hybrid A* search over a 3D discretization of SE(2). Edges are short
//! constant-steering motion primitives integrated through the bicycle
//! model; every expansion also tries to connect straight to the goal with
//! a Reeds-Shepp curve.

use crate::config::PlannerConfig;
use crate::error::PlanningError;
use crate::geometry::{LineSegment2d, Vec2d};
use crate::grid_search::GridSearch;
use crate::node::{Node3d, NodeIndex};
use crate::reeds_shepp::{ReedsShepp, ReedsSheppPath};
use crate::speed_profile::{HybridAStarResult, SpeedProfiler};
use crate::util::normalize_angle;
use kdtree::KdTree;
use log::{debug, error};
use ordered_float::NotNan;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Spatial prefilter over obstacle segment midpoints. A footprint pose
/// only runs the exact overlap test against segments the radius query
/// returns.
struct SegmentFilter {
    tree: KdTree<f64, usize, [f64; 2]>,
    max_half_length: f64,
}

pub struct HybridAStar {
    config: PlannerConfig,
    next_node_num: usize,
    max_steer_angle: f64, // [rad] at the road wheels
    step_size: f64,
    xy_grid_resolution: f64,
    traj_forward_penalty: f64,
    traj_back_penalty: f64,
    traj_gear_switch_penalty: f64,
    traj_steer_penalty: f64,
    traj_steer_change_penalty: f64,
    reeds_shepp: ReedsShepp,
    grid_search: GridSearch,
    profiler: SpeedProfiler,

    // per-plan state, cleared on every call
    xy_bounds: [f64; 4],
    obstacles_segments: Vec<Vec<LineSegment2d>>,
    flat_segments: Vec<LineSegment2d>,
    segment_filter: Option<SegmentFilter>,
    arena: Vec<Node3d>,
    open_set: HashMap<NodeIndex, usize>,
    closed_set: HashMap<NodeIndex, usize>,
    open_pq: BinaryHeap<(Reverse<NotNan<f64>>, NodeIndex)>,
    final_node: Option<usize>,
}

impl HybridAStar {
    pub fn new(config: PlannerConfig) -> Self {
        let warm_start = config.warm_start.clone();
        let reeds_shepp = ReedsShepp::new(&config.vehicle, &warm_start);
        let grid_search = GridSearch::new(&warm_start);
        let profiler = SpeedProfiler::new(&config);
        HybridAStar {
            next_node_num: warm_start.next_node_num,
            max_steer_angle: config.vehicle.max_front_wheel_angle(),
            step_size: warm_start.step_size,
            xy_grid_resolution: warm_start.xy_grid_resolution,
            traj_forward_penalty: warm_start.traj_forward_penalty,
            traj_back_penalty: warm_start.traj_back_penalty,
            traj_gear_switch_penalty: warm_start.traj_gear_switch_penalty,
            traj_steer_penalty: warm_start.traj_steer_penalty,
            traj_steer_change_penalty: warm_start.traj_steer_change_penalty,
            reeds_shepp,
            grid_search,
            profiler,
            xy_bounds: [0.0; 4],
            obstacles_segments: Vec::new(),
            flat_segments: Vec::new(),
            segment_filter: None,
            arena: Vec::new(),
            open_set: HashMap::new(),
            closed_set: HashMap::new(),
            open_pq: BinaryHeap::new(),
            final_node: None,
            config,
        }
    }

    /// Plans a kinematically feasible trajectory from start to goal.
    ///
    /// `xy_bounds` is `[xmin, xmax, ymin, ymax]`. Each obstacle is an
    /// open polyline: `n` vertices contribute `n - 1` segments and no
    /// closing edge is synthesized, so a closed ring must repeat its
    /// first vertex.
    pub fn plan(
        &mut self,
        sx: f64,
        sy: f64,
        sphi: f64,
        ex: f64,
        ey: f64,
        ephi: f64,
        xy_bounds: [f64; 4],
        obstacles_vertices: &[Vec<Vec2d>],
    ) -> Result<HybridAStarResult, PlanningError> {
        self.arena.clear();
        self.open_set.clear();
        self.closed_set.clear();
        self.open_pq.clear();
        self.final_node = None;
        self.xy_bounds = xy_bounds;
        self.load_obstacles(obstacles_vertices);

        let start = Node3d::from_pose(
            sx,
            sy,
            normalize_angle(sphi),
            &self.xy_bounds,
            &self.config.warm_start,
        );
        let end = Node3d::from_pose(
            ex,
            ey,
            normalize_angle(ephi),
            &self.xy_bounds,
            &self.config.warm_start,
        );
        if !self.validity_check(&start) {
            debug!("start pose in collision or out of bounds");
            return Err(PlanningError::InvalidStart);
        }
        if !self.validity_check(&end) {
            debug!("end pose in collision or out of bounds");
            return Err(PlanningError::InvalidEnd);
        }
        let end_pose = (end.x(), end.y(), end.phi());

        self.grid_search
            .generate_dp_map(ex, ey, &self.xy_bounds, &self.obstacles_segments);

        let start_key = start.index();
        let start_cost = start.cost();
        self.arena.push(start);
        self.open_set.insert(start_key, 0);
        self.open_pq
            .push((Reverse(NotNan::new(start_cost).unwrap()), start_key));

        while let Some((_, key)) = self.open_pq.pop() {
            if self.closed_set.contains_key(&key) {
                continue; // stale queue entry
            }
            let current_idx = match self.open_set.get(&key) {
                Some(&idx) => idx,
                None => continue,
            };

            if self.analytic_expansion(current_idx, end_pose) {
                break;
            }
            self.closed_set.insert(key, current_idx);

            for primitive in 0..self.next_node_num {
                let Some(mut next) = self.next_node_generator(current_idx, primitive) else {
                    continue;
                };
                if self.closed_set.contains_key(&next.index()) {
                    continue;
                }
                if !self.validity_check(&next) {
                    continue;
                }
                if !self.open_set.contains_key(&next.index()) {
                    self.calculate_node_cost(current_idx, &mut next);
                    let next_key = next.index();
                    let next_cost = next.cost();
                    let slot = self.arena.len();
                    self.arena.push(next);
                    self.open_set.insert(next_key, slot);
                    self.open_pq
                        .push((Reverse(NotNan::new(next_cost).unwrap()), next_key));
                }
            }
        }

        let final_idx = self.final_node.ok_or_else(|| {
            debug!("open set ran out without reaching the goal");
            PlanningError::SearchExhausted
        })?;
        self.get_result(final_idx)
    }

    fn load_obstacles(&mut self, obstacles_vertices: &[Vec<Vec2d>]) {
        self.obstacles_segments = obstacles_vertices
            .iter()
            .map(|vertices| {
                vertices
                    .windows(2)
                    .map(|pair| LineSegment2d::new(pair[0], pair[1]))
                    .collect()
            })
            .collect();
        self.flat_segments = self.obstacles_segments.iter().flatten().copied().collect();

        self.segment_filter = if self.flat_segments.is_empty() {
            None
        } else {
            let mut tree = KdTree::new(2);
            let mut max_half_length: f64 = 0.0;
            for (i, segment) in self.flat_segments.iter().enumerate() {
                let center = segment.center();
                tree.add([center.x, center.y], i).unwrap();
                max_half_length = max_half_length.max(segment.length() / 2.0);
            }
            Some(SegmentFilter {
                tree,
                max_half_length,
            })
        };
    }

    /// Tries to connect `current` to the goal with the shortest
    /// Reeds-Shepp curve. On success the whole curve becomes the final
    /// node. Oracle failure is not fatal, the search just keeps going.
    fn analytic_expansion(&mut self, current_idx: usize, end_pose: (f64, f64, f64)) -> bool {
        let from = {
            let current = &self.arena[current_idx];
            (current.x(), current.y(), current.phi())
        };
        let Some(path) = self.reeds_shepp.shortest_rsp(from, end_pose) else {
            return false;
        };
        let ReedsSheppPath { x, y, phi, .. } = path;
        let mut node = Node3d::new(x, y, phi, &self.xy_bounds, &self.config.warm_start);
        if !self.validity_check(&node) {
            return false;
        }
        node.parent = Some(current_idx);
        let key = node.index();
        let slot = self.arena.len();
        self.arena.push(node);
        self.closed_set.insert(key, slot);
        self.final_node = Some(slot);
        debug!("analytic expansion reached the goal");
        true
    }

    /// Integrates one constant-steering primitive from the current node.
    /// The first half of the primitive set drives forward, the second
    /// half in reverse, each sweeping steering uniformly from full left
    /// to full right.
    fn next_node_generator(&self, current_idx: usize, next_node_index: usize) -> Option<Node3d> {
        let current = &self.arena[current_idx];
        let half = self.next_node_num / 2;
        let (local_index, traveled_distance) = if next_node_index < half {
            (next_node_index, self.step_size)
        } else {
            (next_node_index - half, -self.step_size)
        };
        let steering = -self.max_steer_angle
            + (2.0 * self.max_steer_angle / (half as f64 - 1.0)) * local_index as f64;

        // drive far enough to leave the current grid cell
        let arc = 2.0_f64.sqrt() * self.xy_grid_resolution;
        let substeps = (arc / self.step_size) as usize;
        let wheel_base = self.config.vehicle.wheel_base;

        let mut xs = vec![current.x()];
        let mut ys = vec![current.y()];
        let mut phis = vec![current.phi()];
        for _ in 0..substeps {
            let last_x = *xs.last().unwrap();
            let last_y = *ys.last().unwrap();
            let last_phi = *phis.last().unwrap();
            xs.push(last_x + traveled_distance * last_phi.cos());
            ys.push(last_y + traveled_distance * last_phi.sin());
            phis.push(normalize_angle(
                last_phi + traveled_distance / wheel_base * steering.tan(),
            ));
        }

        let last_x = *xs.last().unwrap();
        let last_y = *ys.last().unwrap();
        if last_x > self.xy_bounds[1]
            || last_x < self.xy_bounds[0]
            || last_y > self.xy_bounds[3]
            || last_y < self.xy_bounds[2]
        {
            return None;
        }

        let mut node = Node3d::new(xs, ys, phis, &self.xy_bounds, &self.config.warm_start);
        node.parent = Some(current_idx);
        node.forward = traveled_distance > 0.0;
        node.steer = steering;
        Some(node)
    }

    fn calculate_node_cost(&self, current_idx: usize, next: &mut Node3d) {
        let current = &self.arena[current_idx];
        next.traj_cost = current.traj_cost + self.trajectory_cost(current, next);
        next.heu_cost = self.grid_search.check_dp_map(next.x(), next.y());
    }

    fn trajectory_cost(&self, current: &Node3d, next: &Node3d) -> f64 {
        let mut piecewise_cost = 0.0;
        let distance = (next.step_size() - 1) as f64 * self.step_size;
        piecewise_cost += if next.forward {
            distance * self.traj_forward_penalty
        } else {
            distance * self.traj_back_penalty
        };
        // a start node has no incoming edge, so no gear to switch from
        if current.parent.is_some() && current.forward != next.forward {
            piecewise_cost += self.traj_gear_switch_penalty;
        }
        piecewise_cost += self.traj_steer_penalty * next.steer.abs();
        piecewise_cost += self.traj_steer_change_penalty * (next.steer - current.steer).abs();
        piecewise_cost
    }

    /// Bounds and footprint check over the node's traversed poses, walked
    /// in reverse. The skipped entry is the pose shared with the parent,
    /// which the parent's own check already covered; seeds of a single
    /// pose are checked in full.
    fn validity_check(&self, node: &Node3d) -> bool {
        let step_count = node.step_size();
        let last_check_index = if step_count == 1 { 1 } else { step_count - 1 };
        for i in 0..last_check_index {
            let x = node.xs()[step_count - 1 - i];
            let y = node.ys()[step_count - 1 - i];
            let phi = node.phis()[step_count - 1 - i];
            if x > self.xy_bounds[1]
                || x < self.xy_bounds[0]
                || y > self.xy_bounds[3]
                || y < self.xy_bounds[2]
            {
                return false;
            }
            if self.footprint_collides(x, y, phi) {
                return false;
            }
        }
        true
    }

    fn footprint_collides(&self, x: f64, y: f64, phi: f64) -> bool {
        let Some(filter) = &self.segment_filter else {
            return false;
        };
        let bounding_box = Node3d::bounding_box(&self.config.vehicle, x, y, phi);
        let center = bounding_box.center;
        let radius = bounding_box.circumradius() + filter.max_half_length + 1e-6;
        let nearby = filter
            .tree
            .within(&[center.x, center.y], radius, &|a, b| {
                ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
            })
            .unwrap();
        for (_, &segment_idx) in nearby {
            if bounding_box.has_overlap(&self.flat_segments[segment_idx]) {
                return true;
            }
        }
        false
    }

    /// Walks parent links from the final node back to the start,
    /// concatenating each node's traversal minus the pose it shares with
    /// its parent, then runs the speed profiler over the geometry.
    fn get_result(&self, final_idx: usize) -> Result<HybridAStarResult, PlanningError> {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut phis = Vec::new();

        let mut cursor = final_idx;
        while let Some(parent) = self.arena[cursor].parent {
            let node = &self.arena[cursor];
            if node.xs().is_empty() {
                error!("node with empty pose sequence in reconstruction");
                return Err(PlanningError::EmptyNodeSequence);
            }
            for i in (1..node.step_size()).rev() {
                xs.push(node.xs()[i]);
                ys.push(node.ys()[i]);
                phis.push(node.phis()[i]);
            }
            cursor = parent;
        }
        let start = &self.arena[cursor];
        xs.push(start.x());
        ys.push(start.y());
        phis.push(start.phi());
        xs.reverse();
        ys.reverse();
        phis.reverse();

        let mut result = HybridAStarResult {
            x: xs,
            y: ys,
            phi: phis,
            ..HybridAStarResult::default()
        };
        self.profiler.generate(&mut result)?;

        if result.x.len() != result.y.len()
            || result.x.len() != result.phi.len()
            || result.x.len() != result.v.len()
        {
            error!(
                "state sizes not equal: x {} y {} phi {} v {}",
                result.x.len(),
                result.y.len(),
                result.phi.len(),
                result.v.len()
            );
            return Err(PlanningError::SizeMismatch(format!(
                "states x={} y={} phi={} v={}",
                result.x.len(),
                result.y.len(),
                result.phi.len(),
                result.v.len()
            )));
        }
        if result.a.len() != result.steer.len() || result.x.len() - result.a.len() != 1 {
            error!(
                "control sizes not right: a {} steer {} x {}",
                result.a.len(),
                result.steer.len(),
                result.x.len()
            );
            return Err(PlanningError::SizeMismatch(format!(
                "controls a={} steer={} x={}",
                result.a.len(),
                result.steer.len(),
                result.x.len()
            )));
        }
        Ok(result)
    }
}
