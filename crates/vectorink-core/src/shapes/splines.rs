//! Freehand curve through sampled points.

use super::{HitResult, ShapeTrait, ShapeType, load_points, polyline_hit, save_points};
use crate::storage::Storage;
use kurbo::{BezPath, Point};

/// Smooth curve passing through every sample point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Splines {
    pub points: Vec<Point>,
    pub closed: bool,
}

impl Splines {
    pub fn new(points: Vec<Point>) -> Self {
        Self {
            points,
            closed: false,
        }
    }

    /// Append a sample unless it coincides with the last one.
    pub fn add_point(&mut self, pt: Point, min_dist: f64) -> bool {
        if let Some(last) = self.points.last() {
            if last.distance(pt) < min_dist {
                return false;
            }
        }
        self.points.push(pt);
        true
    }

    pub fn remove_last(&mut self) -> Option<Point> {
        self.points.pop()
    }

    /// Length of the sample polyline.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

/// Catmull-Rom spline through `points`, as cubic segments.
fn catmull_rom_path(points: &[Point], closed: bool) -> BezPath {
    let mut path = BezPath::new();
    let n = points.len();
    let Some(first) = points.first() else {
        return path;
    };
    path.move_to(*first);
    if n < 3 {
        for p in &points[1..] {
            path.line_to(*p);
        }
        return path;
    }
    let seg_count = if closed { n } else { n - 1 };
    let at = |i: isize| -> Point {
        if closed {
            points[i.rem_euclid(n as isize) as usize]
        } else {
            points[i.clamp(0, n as isize - 1) as usize]
        }
    };
    for i in 0..seg_count as isize {
        let (p0, p1, p2, p3) = (at(i - 1), at(i), at(i + 1), at(i + 2));
        let c1 = p1 + (p2 - p0) / 6.0;
        let c2 = p2 - (p3 - p1) / 6.0;
        path.curve_to(c1, c2, p2);
    }
    if closed {
        path.close_path();
    }
    path
}

impl ShapeTrait for Splines {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Splines
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

    fn to_path(&self) -> BezPath {
        catmull_rom_path(&self.points, self.closed)
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
            None => s.set_error("splines: missing points"),
        }
    }

    fn clear(&mut self) {
        self.points.clear();
    }
}
