//! Polyline and polygon shape.

use super::{HitResult, ShapeTrait, ShapeType, load_points, polygon_path, polyline_hit, save_points};
use crate::storage::Storage;
use kurbo::{BezPath, Point};

/// Open polyline or closed polygon.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lines {
    pub points: Vec<Point>,
    pub closed: bool,
}

impl Lines {
    pub fn new(points: Vec<Point>, closed: bool) -> Self {
        Self { points, closed }
    }

    /// Insert `pt` after vertex `segment`.
    pub fn insert_point(&mut self, segment: usize, pt: Point) -> bool {
        if segment >= self.points.len() {
            return false;
        }
        self.points.insert(segment + 1, pt);
        true
    }

    /// Remove a vertex, keeping at least two points.
    pub fn remove_point(&mut self, index: usize) -> bool {
        if index >= self.points.len() || self.points.len() < 3 {
            return false;
        }
        self.points.remove(index);
        true
    }

    pub fn add_point(&mut self, pt: Point) {
        self.points.push(pt);
    }

    pub fn set_closed(&mut self, closed: bool) {
        self.closed = closed;
    }
}

impl ShapeTrait for Lines {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Lines
    }

    fn point_count(&self) -> usize {
        self.points.len()
    }

    fn point(&self, index: usize) -> Point {
        self.points.get(index).copied().unwrap_or_default()
    }

    fn set_point(&mut self, index: usize, pt: Point) {
        if let Some(p) = self.points.get_mut(index) {
            *p = pt;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn hit_test(&self, pt: Point, _tol: f64) -> HitResult {
        polyline_hit(&self.points, self.closed, pt)
    }

    /// Move one segment when `segment >= 0`, else the whole shape.
    fn offset(&mut self, vec: kurbo::Vec2, segment: i32) -> bool {
        let n = self.points.len();
        if segment >= 0 && (segment as usize) < n && n > 1 {
            let i = segment as usize;
            self.points[i] += vec;
            let j = (i + 1) % n;
            if j != i && (self.closed || j > i) {
                self.points[j] += vec;
            }
        } else {
            for p in &mut self.points {
                *p += vec;
            }
        }
        true
    }

    fn to_path(&self) -> BezPath {
        polygon_path(&self.points, self.closed)
    }

    fn save(&self, s: &mut dyn Storage) {
        s.write_bool("closed", self.closed);
        s.write_int("count", self.points.len() as i32);
        save_points(s, "points", &self.points);
    }

    fn load(&mut self, s: &mut dyn Storage) -> bool {
        self.closed = s.read_bool("closed", false);
        match load_points(s, "points") {
            Some(pts) => {
                self.points = pts;
                true
            }
            None => s.set_error("lines: missing points"),
        }
    }

    fn clear(&mut self) {
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Lines {
        Lines::new(
            vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(0.0, 10.0)],
            true,
        )
    }

    #[test]
    fn test_insert_and_remove_point() {
        let mut l = triangle();
        assert!(l.insert_point(0, Point::new(5.0, 0.0)));
        assert_eq!(l.points[1], Point::new(5.0, 0.0));
        assert!(l.remove_point(1));
        assert_eq!(l.point_count(), 3);
        let mut two = Lines::new(vec![Point::ZERO, Point::new(1.0, 0.0)], false);
        assert!(!two.remove_point(0));
    }

    #[test]
    fn test_closed_hit_inside() {
        let res = triangle().hit_test(Point::new(2.0, 2.0), 1.0);
        assert!(res.inside);
        let mut open = triangle();
        open.set_closed(false);
        assert!(!open.hit_test(Point::new(2.0, 2.0), 1.0).inside);
    }

    #[test]
    fn test_segment_offset() {
        let mut l = triangle();
        l.offset(kurbo::Vec2::new(0.0, 1.0), 0);
        assert_eq!(l.points[0], Point::new(0.0, 1.0));
        assert_eq!(l.points[1], Point::new(10.0, 1.0));
        assert_eq!(l.points[2], Point::new(0.0, 10.0));
    }
}
