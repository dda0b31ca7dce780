//! Parallelogram shape.

use super::{
    HitResult, ShapeTrait, ShapeType, load_fixed_points, polygon_path, polyline_hit, save_points,
};
use crate::storage::Storage;
use kurbo::{BezPath, Point};

/// Four points where opposite sides stay parallel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parallelogram {
    points: [Point; 4],
}

impl Parallelogram {
    /// Build from three consecutive corners; the fourth is derived.
    pub fn from_three(p0: Point, p1: Point, p2: Point) -> Self {
        Self {
            points: [p0, p1, p2, p0 + (p2 - p1)],
        }
    }

    pub fn points(&self) -> [Point; 4] {
        self.points
    }
}

impl ShapeTrait for Parallelogram {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Parallel
    }

    fn point_count(&self) -> usize {
        4
    }

    fn point(&self, index: usize) -> Point {
        self.points[index % 4]
    }

    fn set_point(&mut self, index: usize, pt: Point) {
        self.points[index % 4] = pt;
    }

    /// Moving a corner keeps its opposite and the next corner in place.
    fn set_handle_point(&mut self, index: usize, pt: Point, _tol: f64) -> bool {
        if index >= 4 {
            return false;
        }
        self.points[index] = pt;
        let next = self.points[(index + 1) % 4];
        let opposite = self.points[(index + 2) % 4];
        self.points[(index + 3) % 4] = pt + (opposite - next);
        true
    }

    fn is_closed(&self) -> bool {
        true
    }

    fn hit_test(&self, pt: Point, _tol: f64) -> HitResult {
        polyline_hit(&self.points, true, pt)
    }

    fn to_path(&self) -> BezPath {
        polygon_path(&self.points, true)
    }

    fn save(&self, s: &mut dyn Storage) {
        save_points(s, "points", &self.points);
    }

    fn load(&mut self, s: &mut dyn Storage) -> bool {
        match load_fixed_points::<4>(s, "points") {
            Some(pts) => {
                self.points = pts;
                true
            }
            None => s.set_error("parallel: missing points"),
        }
    }

    fn clear(&mut self) {
        self.points = [Point::ZERO; 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourth_point_derived() {
        let p = Parallelogram::from_three(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(12.0, 5.0),
        );
        assert_eq!(p.points()[3], Point::new(2.0, 5.0));
    }

    #[test]
    fn test_handle_keeps_parallel() {
        let mut p = Parallelogram::from_three(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        );
        p.set_handle_point(2, Point::new(14.0, 10.0), 0.1);
        let pts = p.points();
        let side_a = pts[1] - pts[0];
        let side_b = pts[2] - pts[3];
        assert!((side_a.x - side_b.x).abs() < 1e-9);
        assert!((side_a.y - side_b.y).abs() < 1e-9);
    }
}
