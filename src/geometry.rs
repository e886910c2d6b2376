//! Planar geometry for footprint collision checks.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec2d {
    pub x: f64,
    pub y: f64,
}

impl Vec2d {
    pub fn new(x: f64, y: f64) -> Self {
        Vec2d { x, y }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LineSegment2d {
    pub start: Vec2d,
    pub end: Vec2d,
}

impl LineSegment2d {
    pub fn new(start: Vec2d, end: Vec2d) -> Self {
        LineSegment2d { start, end }
    }

    pub fn center(&self) -> Vec2d {
        Vec2d::new(
            (self.start.x + self.end.x) / 2.0,
            (self.start.y + self.end.y) / 2.0,
        )
    }

    pub fn length(&self) -> f64 {
        (self.end.x - self.start.x).hypot(self.end.y - self.start.y)
    }
}

/// An oriented rectangle, stored as center, heading, and half extents.
#[derive(Debug, Clone, Copy)]
pub struct Box2d {
    pub center: Vec2d,
    pub heading: f64,
    half_length: f64,
    half_width: f64,
    cos_heading: f64,
    sin_heading: f64,
}

impl Box2d {
    pub fn new(center: Vec2d, heading: f64, length: f64, width: f64) -> Self {
        Box2d {
            center,
            heading,
            half_length: length / 2.0,
            half_width: width / 2.0,
            cos_heading: heading.cos(),
            sin_heading: heading.sin(),
        }
    }

    /// Radius of the smallest circle around the center containing the box.
    pub fn circumradius(&self) -> f64 {
        self.half_length.hypot(self.half_width)
    }

    /// Corners in counterclockwise order, front-left first.
    pub fn corners(&self) -> [Vec2d; 4] {
        let dx = [self.half_length, -self.half_length];
        let dy = [self.half_width, -self.half_width];
        let corner = |l: f64, w: f64| {
            Vec2d::new(
                self.center.x + l * self.cos_heading - w * self.sin_heading,
                self.center.y + l * self.sin_heading + w * self.cos_heading,
            )
        };
        [
            corner(dx[0], dy[0]),
            corner(dx[1], dy[0]),
            corner(dx[1], dy[1]),
            corner(dx[0], dy[1]),
        ]
    }

    /// Exact overlap test against a segment, separating axes: the two box
    /// axes plus the segment normal. Degenerate segments reduce to a
    /// point-in-box test.
    pub fn has_overlap(&self, segment: &LineSegment2d) -> bool {
        let to_local = |p: &Vec2d| {
            let dx = p.x - self.center.x;
            let dy = p.y - self.center.y;
            (
                dx * self.cos_heading + dy * self.sin_heading,
                -dx * self.sin_heading + dy * self.cos_heading,
            )
        };
        let (x1, y1) = to_local(&segment.start);
        let (x2, y2) = to_local(&segment.end);

        // box axes: in the local frame the box is the AABB
        // [-hl, hl] x [-hw, hw]
        if x1.max(x2) < -self.half_length
            || x1.min(x2) > self.half_length
            || y1.max(y2) < -self.half_width
            || y1.min(y2) > self.half_width
        {
            return false;
        }

        // segment normal
        let nx = y1 - y2;
        let ny = x2 - x1;
        let separation = (nx * x1 + ny * y1).abs();
        let box_extent = self.half_length * nx.abs() + self.half_width * ny.abs();
        separation <= box_extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Box2d {
        Box2d::new(Vec2d::new(0.0, 0.0), 0.0, 2.0, 1.0)
    }

    #[test]
    fn crossing_segment_overlaps() {
        let segment = LineSegment2d::new(Vec2d::new(-2.0, 0.0), Vec2d::new(2.0, 0.0));
        assert!(unit_box().has_overlap(&segment));
    }

    #[test]
    fn distant_segment_does_not_overlap() {
        let segment = LineSegment2d::new(Vec2d::new(-2.0, 2.0), Vec2d::new(2.0, 2.0));
        assert!(!unit_box().has_overlap(&segment));
    }

    #[test]
    fn diagonal_segment_near_corner_is_rejected_by_normal_axis() {
        // the segment's AABB touches the box AABB, the segment itself
        // passes outside the corner
        let segment = LineSegment2d::new(Vec2d::new(0.9, 0.7), Vec2d::new(1.3, 0.3));
        assert!(!unit_box().has_overlap(&segment));
    }

    #[test]
    fn endpoint_inside_overlaps() {
        let segment = LineSegment2d::new(Vec2d::new(0.2, 0.1), Vec2d::new(5.0, 5.0));
        assert!(unit_box().has_overlap(&segment));
    }

    #[test]
    fn degenerate_segment_is_a_point_test() {
        let inside = LineSegment2d::new(Vec2d::new(0.5, 0.2), Vec2d::new(0.5, 0.2));
        let outside = LineSegment2d::new(Vec2d::new(1.5, 0.0), Vec2d::new(1.5, 0.0));
        assert!(unit_box().has_overlap(&inside));
        assert!(!unit_box().has_overlap(&outside));
    }

    #[test]
    fn rotated_box_overlap() {
        let rotated = Box2d::new(
            Vec2d::new(0.0, 0.0),
            std::f64::consts::FRAC_PI_4,
            2.0,
            1.0,
        );
        let along_diagonal = LineSegment2d::new(Vec2d::new(0.6, 0.6), Vec2d::new(2.0, 2.0));
        assert!(rotated.has_overlap(&along_diagonal));
        let axis_aligned = Box2d::new(Vec2d::new(0.0, 0.0), 0.0, 2.0, 1.0);
        assert!(!axis_aligned.has_overlap(&along_diagonal));
    }

    #[test]
    fn corners_span_the_extents() {
        let corners = unit_box().corners();
        let max_x = corners.iter().map(|c| c.x).fold(f64::NEG_INFINITY, f64::max);
        let max_y = corners.iter().map(|c| c.y).fold(f64::NEG_INFINITY, f64::max);
        assert!((max_x - 1.0).abs() < 1e-12);
        assert!((max_y - 0.5).abs() < 1e-12);
    }
}
