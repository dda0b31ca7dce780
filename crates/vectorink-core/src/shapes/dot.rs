//! Dot shape.

use super::{DrawContext, HitResult, ShapeTrait, ShapeType, load_fixed_points, save_points};
use crate::render::Surface;
use crate::storage::Storage;
use kurbo::{BezPath, Circle, Point, Shape as _};

/// A single point drawn as a small filled circle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dot {
    pub point: Point,
}

impl Dot {
    pub fn new(point: Point) -> Self {
        Self { point }
    }
}

impl ShapeTrait for Dot {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Dot
    }

    fn point_count(&self) -> usize {
        1
    }

    fn point(&self, _index: usize) -> Point {
        self.point
    }

    fn set_point(&mut self, _index: usize, pt: Point) {
        self.point = pt;
    }

    fn hit_test(&self, pt: Point, _tol: f64) -> HitResult {
        HitResult {
            dist: pt.distance(self.point),
            nearpt: self.point,
            segment: 0,
            inside: false,
        }
    }

    fn to_path(&self) -> BezPath {
        Circle::new(self.point, 0.5).to_path(0.1)
    }

    fn draw(&self, surface: &mut dyn Surface, ctx: &DrawContext) {
        let radius = ctx.line_width.max(1.0) / 2.0;
        let fill = ctx.with_fill(ctx.line_color);
        surface.draw_circle(&fill, self.point, radius);
    }

    fn save(&self, s: &mut dyn Storage) {
        save_points(s, "points", &[self.point]);
    }

    fn load(&mut self, s: &mut dyn Storage) -> bool {
        match load_fixed_points::<1>(s, "points") {
            Some([p]) => {
                self.point = p;
                true
            }
            None => s.set_error("dot: missing points"),
        }
    }

    fn clear(&mut self) {
        self.point = Point::ZERO;
    }
}
