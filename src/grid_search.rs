use crate::config::WarmStartConfig;
use crate::geometry::{Box2d, LineSegment2d, Vec2d};
use ordered_float::NotNan;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

type GridIndex = (i64, i64);

#[derive(Debug, Clone, Copy)]
struct GridNode {
    x: i64,
    y: i64,
    cost: f64,
}

/// Holonomic-with-obstacles heuristic: a goal-rooted shortest-path field
/// over a uniform 2D grid. Costs are metric, so `check_dp_map` lower
/// bounds the remaining trajectory cost of any node above the cell.
#[derive(Debug)]
pub struct GridSearch {
    xy_resolution: f64,
    xy_bounds: [f64; 4],
    dp_map: HashMap<GridIndex, f64>,
}

impl GridSearch {
    pub fn new(config: &WarmStartConfig) -> Self {
        GridSearch {
            xy_resolution: config.xy_grid_resolution,
            xy_bounds: [0.0; 4],
            dp_map: HashMap::new(),
        }
    }

    fn cell_of(&self, x: f64, y: f64) -> GridIndex {
        (
            ((x - self.xy_bounds[0]) / self.xy_resolution).floor() as i64,
            ((y - self.xy_bounds[2]) / self.xy_resolution).floor() as i64,
        )
    }

    fn cell_center(&self, cell: GridIndex) -> Vec2d {
        Vec2d::new(
            self.xy_bounds[0] + (cell.0 as f64 + 0.5) * self.xy_resolution,
            self.xy_bounds[2] + (cell.1 as f64 + 0.5) * self.xy_resolution,
        )
    }

    fn blocked_cells(
        &self,
        dim_x: i64,
        dim_y: i64,
        obstacles_segments: &[Vec<LineSegment2d>],
    ) -> HashSet<GridIndex> {
        let mut blocked = HashSet::new();
        for segments in obstacles_segments {
            for segment in segments {
                // rasterize only the cells the segment's bounding box
                // touches instead of sweeping the whole grid
                let (min_cx, min_cy) = self.cell_of(
                    segment.start.x.min(segment.end.x),
                    segment.start.y.min(segment.end.y),
                );
                let (max_cx, max_cy) = self.cell_of(
                    segment.start.x.max(segment.end.x),
                    segment.start.y.max(segment.end.y),
                );
                for cx in min_cx.max(0)..=max_cx.min(dim_x - 1) {
                    for cy in min_cy.max(0)..=max_cy.min(dim_y - 1) {
                        if blocked.contains(&(cx, cy)) {
                            continue;
                        }
                        let cell_box = Box2d::new(
                            self.cell_center((cx, cy)),
                            0.0,
                            self.xy_resolution,
                            self.xy_resolution,
                        );
                        if cell_box.has_overlap(segment) {
                            blocked.insert((cx, cy));
                        }
                    }
                }
            }
        }
        blocked
    }

    /// Runs Dijkstra from the goal cell over the 8-connected free grid and
    /// stores the cost of every reachable cell.
    pub fn generate_dp_map(
        &mut self,
        goal_x: f64,
        goal_y: f64,
        xy_bounds: &[f64; 4],
        obstacles_segments: &[Vec<LineSegment2d>],
    ) {
        self.xy_bounds = *xy_bounds;
        self.dp_map.clear();

        let dim_x = ((xy_bounds[1] - xy_bounds[0]) / self.xy_resolution).ceil() as i64;
        let dim_y = ((xy_bounds[3] - xy_bounds[2]) / self.xy_resolution).ceil() as i64;
        let blocked = self.blocked_cells(dim_x, dim_y, obstacles_segments);

        let straight = self.xy_resolution;
        let diagonal = self.xy_resolution * 2.0_f64.sqrt();
        let motions: [(i64, i64, f64); 8] = [
            (-1, 0, straight),
            (1, 0, straight),
            (0, -1, straight),
            (0, 1, straight),
            (-1, -1, diagonal),
            (-1, 1, diagonal),
            (1, -1, diagonal),
            (1, 1, diagonal),
        ];

        let goal = self.cell_of(goal_x, goal_y);
        let mut open_set: HashMap<GridIndex, GridNode> = HashMap::new();
        let mut pq = BinaryHeap::new();
        open_set.insert(
            goal,
            GridNode {
                x: goal.0,
                y: goal.1,
                cost: 0.0,
            },
        );
        pq.push((Reverse(NotNan::new(0.0).unwrap()), goal));

        while let Some((_, index)) = pq.pop() {
            let current = match open_set.remove(&index) {
                Some(node) => node,
                None => continue, // stale queue entry
            };
            self.dp_map.insert(index, current.cost);

            for &(dx, dy, step) in &motions {
                let nx = current.x + dx;
                let ny = current.y + dy;
                if nx < 0 || nx >= dim_x || ny < 0 || ny >= dim_y {
                    continue;
                }
                let neighbor = (nx, ny);
                if blocked.contains(&neighbor) || self.dp_map.contains_key(&neighbor) {
                    continue;
                }
                let cost = current.cost + step;
                match open_set.get_mut(&neighbor) {
                    Some(open_node) => {
                        if open_node.cost > cost {
                            open_node.cost = cost;
                            pq.push((Reverse(NotNan::new(cost).unwrap()), neighbor));
                        }
                    }
                    None => {
                        open_set.insert(
                            neighbor,
                            GridNode {
                                x: nx,
                                y: ny,
                                cost,
                            },
                        );
                        pq.push((Reverse(NotNan::new(cost).unwrap()), neighbor));
                    }
                }
            }
        }
    }

    /// Cost-to-goal of the cell containing `(x, y)`, or infinity when the
    /// cell was never reached.
    pub fn check_dp_map(&self, x: f64, y: f64) -> f64 {
        self.dp_map
            .get(&self.cell_of(x, y))
            .copied()
            .unwrap_or(f64::INFINITY)
    }
}
