//! Line segment shape.

use super::{
    DrawContext, HandleType, HitResult, ShapeTrait, ShapeType, load_fixed_points, save_points,
    segment_nearest,
};
use crate::render::Surface;
use crate::storage::Storage;
use kurbo::{BezPath, Point};

/// A straight segment between two points.
///
/// Handles are the two endpoints plus a fixed midpoint handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub start: Point,
    pub end: Point,
}

impl Line {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    pub fn midpoint(&self) -> Point {
        self.start.midpoint(self.end)
    }

    pub fn angle(&self) -> f64 {
        let d = self.end - self.start;
        d.y.atan2(d.x)
    }

    /// Point the endpoint `index` towards `pt`, keeping the current length.
    pub fn rotate_end_to(&mut self, index: usize, pt: Point) -> bool {
        let (anchor, moving) = match index {
            0 => (self.end, &mut self.start),
            1 => (self.start, &mut self.end),
            _ => return false,
        };
        let len = anchor.distance(*moving);
        let dir = pt - anchor;
        let dir_len = dir.hypot();
        if dir_len < super::ZERO_TOL {
            return false;
        }
        *moving = anchor + dir * (len / dir_len);
        true
    }
}

impl ShapeTrait for Line {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Line
    }

    fn point_count(&self) -> usize {
        2
    }

    fn point(&self, index: usize) -> Point {
        if index == 0 { self.start } else { self.end }
    }

    fn set_point(&mut self, index: usize, pt: Point) {
        if index == 0 {
            self.start = pt;
        } else {
            self.end = pt;
        }
    }

    fn handle_count(&self) -> usize {
        3
    }

    fn handle_point(&self, index: usize) -> Point {
        match index {
            0 => self.start,
            1 => self.end,
            _ => self.midpoint(),
        }
    }

    fn is_handle_fixed(&self, index: usize) -> bool {
        index >= 2
    }

    fn handle_type(&self, index: usize) -> HandleType {
        if index >= 2 { HandleType::MidPoint } else { HandleType::Vertex }
    }

    fn hit_test(&self, pt: Point, _tol: f64) -> HitResult {
        let (dist, nearpt) = segment_nearest(pt, self.start, self.end);
        HitResult {
            dist,
            nearpt,
            segment: 0,
            inside: false,
        }
    }

    fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        path.move_to(self.start);
        path.line_to(self.end);
        path
    }

    fn draw(&self, surface: &mut dyn Surface, ctx: &DrawContext) {
        surface.draw_line(ctx, self.start, self.end);
    }

    fn save(&self, s: &mut dyn Storage) {
        save_points(s, "points", &[self.start, self.end]);
    }

    fn load(&mut self, s: &mut dyn Storage) -> bool {
        match load_fixed_points::<2>(s, "points") {
            Some([a, b]) => {
                self.start = a;
                self.end = b;
                true
            }
            None => s.set_error("line: missing points"),
        }
    }

    fn clear(&mut self) {
        self.start = Point::ZERO;
        self.end = Point::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_handles() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert_eq!(line.handle_count(), 3);
        assert_eq!(line.handle_point(2), Point::new(5.0, 0.0));
        assert!(line.is_handle_fixed(2));
        assert_eq!(line.handle_type(2), HandleType::MidPoint);
    }

    #[test]
    fn test_fixed_midpoint_cannot_move() {
        let mut line = Line::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert!(!line.set_handle_point(2, Point::new(5.0, 5.0), 0.1));
        assert!(line.set_handle_point(1, Point::new(10.0, 5.0), 0.1));
        assert_eq!(line.end, Point::new(10.0, 5.0));
    }

    #[test]
    fn test_line_hit_test() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let res = line.hit_test(Point::new(4.0, 2.0), 5.0);
        assert!((res.dist - 2.0).abs() < f64::EPSILON);
        assert_eq!(res.nearpt, Point::new(4.0, 0.0));
    }

    #[test]
    fn test_line_length_and_box() {
        let line = Line::new(Point::new(0.0, 0.0), Point::new(3.0, 4.0));
        assert!((line.length() - 5.0).abs() < f64::EPSILON);
        assert!(line.hit_test_box(kurbo::Rect::new(1.0, 1.0, 2.0, 2.0)));
        assert!(!line.hit_test_box(kurbo::Rect::new(3.0, 0.0, 4.0, 1.0)));
    }
}
