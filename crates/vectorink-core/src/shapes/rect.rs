//! Rectangle-framed shapes: rectangle, ellipse and diamond.

use super::{
    DrawContext, HandleType, HitResult, ShapeTrait, ShapeType, ZERO_TOL, flatten_path,
    load_fixed_points, polygon_path, polyline_hit, save_points,
};
use crate::render::Surface;
use crate::selection::move_box_handle;
use crate::storage::Storage;
use kurbo::{Affine, BezPath, Ellipse, Point, Rect, Shape as _, Vec2};

/// Which outline a [`BaseRect`] draws inside its frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectKind {
    Rect,
    Ellipse,
    Diamond,
}

/// A possibly rotated rectangular frame.
///
/// Corners are stored in order left-top, right-top, right-bottom,
/// left-bottom of the local frame. Handles 0..4 are the corners and 4..8
/// the edge midpoints (top, right, bottom, left).
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRect {
    pub kind: RectKind,
    /// Keep width equal to height while editing.
    pub square: bool,
    corners: [Point; 4],
}

impl BaseRect {
    pub fn new(kind: RectKind) -> Self {
        Self {
            kind,
            square: false,
            corners: [Point::ZERO; 4],
        }
    }

    pub fn from_rect(kind: RectKind, rect: Rect) -> Self {
        let mut shape = Self::new(kind);
        shape.set_rect(rect);
        shape
    }

    /// Set an axis-aligned frame.
    pub fn set_rect(&mut self, rect: Rect) {
        let r = rect.abs();
        self.corners = [
            Point::new(r.x0, r.y0),
            Point::new(r.x1, r.y0),
            Point::new(r.x1, r.y1),
            Point::new(r.x0, r.y1),
        ];
    }

    /// Set a frame rotated by `angle` radians about its center.
    pub fn set_rect_with_angle(&mut self, rect: Rect, angle: f64) {
        self.set_rect(rect);
        let rot = Affine::rotate_about(angle, rect.center());
        for p in &mut self.corners {
            *p = rot * *p;
        }
    }

    pub fn corners(&self) -> [Point; 4] {
        self.corners
    }

    pub fn width(&self) -> f64 {
        self.corners[0].distance(self.corners[1])
    }

    pub fn height(&self) -> f64 {
        self.corners[0].distance(self.corners[3])
    }

    pub fn center(&self) -> Point {
        self.corners[0].midpoint(self.corners[2])
    }

    /// Rotation of the local x axis, in radians.
    pub fn angle(&self) -> f64 {
        let (ux, _) = self.axes();
        ux.y.atan2(ux.x)
    }

    pub fn is_empty(&self) -> bool {
        self.width() < ZERO_TOL || self.height() < ZERO_TOL
    }

    fn axes(&self) -> (Vec2, Vec2) {
        let vx = self.corners[1] - self.corners[0];
        let vy = self.corners[3] - self.corners[0];
        let (w, h) = (vx.hypot(), vy.hypot());
        let ux = if w > ZERO_TOL {
            vx / w
        } else if h > ZERO_TOL {
            let uy = vy / h;
            Vec2::new(uy.y, -uy.x)
        } else {
            Vec2::new(1.0, 0.0)
        };
        let uy = if h > ZERO_TOL {
            vy / h
        } else {
            Vec2::new(-ux.y, ux.x)
        };
        (ux, uy)
    }

    fn to_local(&self, pt: Point) -> Point {
        let (ux, uy) = self.axes();
        let v = pt - self.corners[0];
        Point::new(v.dot(ux), v.dot(uy))
    }

    fn set_local_rect(&mut self, r: Rect) {
        let (ux, uy) = self.axes();
        let origin = self.corners[0];
        let at = |x: f64, y: f64| origin + ux * x + uy * y;
        self.corners = [at(r.x0, r.y0), at(r.x1, r.y0), at(r.x1, r.y1), at(r.x0, r.y1)];
    }

    fn is_axis_aligned(&self) -> bool {
        let (ux, _) = self.axes();
        ux.y.abs() < ZERO_TOL && ux.x > 0.0
    }

    fn diamond_points(&self) -> [Point; 4] {
        let c = &self.corners;
        [
            c[0].midpoint(c[1]),
            c[1].midpoint(c[2]),
            c[2].midpoint(c[3]),
            c[3].midpoint(c[0]),
        ]
    }

    fn ellipse(&self) -> Ellipse {
        Ellipse::new(
            self.center(),
            Vec2::new(self.width() / 2.0, self.height() / 2.0),
            self.angle(),
        )
    }

    fn outline(&self) -> Vec<Point> {
        match self.kind {
            RectKind::Rect => self.corners.to_vec(),
            RectKind::Diamond => self.diamond_points().to_vec(),
            RectKind::Ellipse => flatten_path(&self.ellipse().to_path(0.05), 0.05)
                .into_iter()
                .next()
                .map(|(pts, _)| pts)
                .unwrap_or_default(),
        }
    }
}

impl ShapeTrait for BaseRect {
    fn shape_type(&self) -> ShapeType {
        match self.kind {
            RectKind::Rect => ShapeType::Rect,
            RectKind::Ellipse => ShapeType::Ellipse,
            RectKind::Diamond => ShapeType::Diamond,
        }
    }

    fn point_count(&self) -> usize {
        4
    }

    fn point(&self, index: usize) -> Point {
        self.corners[index % 4]
    }

    fn set_point(&mut self, index: usize, pt: Point) {
        self.corners[index % 4] = pt;
    }

    fn handle_count(&self) -> usize {
        8
    }

    fn handle_point(&self, index: usize) -> Point {
        let c = &self.corners;
        match index {
            0..=3 => c[index],
            4 => c[0].midpoint(c[1]),
            5 => c[1].midpoint(c[2]),
            6 => c[2].midpoint(c[3]),
            _ => c[3].midpoint(c[0]),
        }
    }

    fn set_handle_point(&mut self, index: usize, pt: Point, _tol: f64) -> bool {
        if index >= 8 {
            return false;
        }
        let local = self.to_local(pt);
        let rect = Rect::new(0.0, 0.0, self.width(), self.height());
        let moved = move_box_handle(rect, index, local, self.square);
        self.set_local_rect(moved);
        true
    }

    fn handle_type(&self, index: usize) -> HandleType {
        match (self.kind, index) {
            (_, 0..=3) => HandleType::Vertex,
            (RectKind::Ellipse, _) => HandleType::Quadrant,
            (RectKind::Diamond, _) => HandleType::Vertex,
            _ => HandleType::MidPoint,
        }
    }

    fn is_closed(&self) -> bool {
        true
    }

    fn hit_test(&self, pt: Point, _tol: f64) -> HitResult {
        polyline_hit(&self.outline(), true, pt)
    }

    fn to_path(&self) -> BezPath {
        match self.kind {
            RectKind::Rect => polygon_path(&self.corners, true),
            RectKind::Diamond => polygon_path(&self.diamond_points(), true),
            RectKind::Ellipse => self.ellipse().to_path(0.1),
        }
    }

    fn draw(&self, surface: &mut dyn Surface, ctx: &DrawContext) {
        match self.kind {
            RectKind::Rect if self.is_axis_aligned() => {
                surface.draw_rect(ctx, Rect::from_points(self.corners[0], self.corners[2]));
            }
            RectKind::Rect => surface.draw_polygon(ctx, &self.corners, true),
            RectKind::Ellipse if self.is_axis_aligned() => {
                surface.draw_ellipse(ctx, Rect::from_points(self.corners[0], self.corners[2]));
            }
            RectKind::Ellipse => surface.draw_path(ctx, &self.to_path()),
            RectKind::Diamond => surface.draw_polygon(ctx, &self.diamond_points(), true),
        }
    }

    fn save(&self, s: &mut dyn Storage) {
        save_points(s, "points", &self.corners);
        s.write_bool("square", self.square);
    }

    fn load(&mut self, s: &mut dyn Storage) -> bool {
        self.square = s.read_bool("square", false);
        match load_fixed_points::<4>(s, "points") {
            Some(pts) => {
                self.corners = pts;
                true
            }
            None => s.set_error("rect: missing points"),
        }
    }

    fn clear(&mut self) {
        self.corners = [Point::ZERO; 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_frame() {
        let r = BaseRect::from_rect(RectKind::Rect, Rect::new(0.0, 0.0, 10.0, 4.0));
        assert!((r.width() - 10.0).abs() < f64::EPSILON);
        assert!((r.height() - 4.0).abs() < f64::EPSILON);
        assert_eq!(r.center(), Point::new(5.0, 2.0));
        assert!(r.angle().abs() < f64::EPSILON);
        assert_eq!(r.handle_point(5), Point::new(10.0, 2.0));
    }

    #[test]
    fn test_corner_handle_resizes() {
        let mut r = BaseRect::from_rect(RectKind::Rect, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(r.set_handle_point(2, Point::new(20.0, 15.0), 0.1));
        assert_eq!(r.extent(), Rect::new(0.0, 0.0, 20.0, 15.0));
    }

    #[test]
    fn test_square_keeps_ratio() {
        let mut r = BaseRect::from_rect(RectKind::Rect, Rect::new(0.0, 0.0, 10.0, 10.0));
        r.square = true;
        r.set_handle_point(2, Point::new(20.0, 14.0), 0.1);
        assert!((r.width() - r.height()).abs() < 1e-9);
    }

    #[test]
    fn test_rotated_handle_stays_in_frame() {
        let mut r = BaseRect::new(RectKind::Rect);
        r.set_rect_with_angle(Rect::new(0.0, 0.0, 10.0, 10.0), std::f64::consts::FRAC_PI_4);
        let before = r.angle();
        r.set_handle_point(5, r.handle_point(5) + (r.corners()[1] - r.corners()[0]), 0.1);
        assert!((r.angle() - before).abs() < 1e-9);
        assert!((r.width() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_rect_hit_inside() {
        let r = BaseRect::from_rect(RectKind::Rect, Rect::new(0.0, 0.0, 10.0, 10.0));
        let res = r.hit_test(Point::new(7.0, 7.0), 1.0);
        assert!(res.inside);
        assert!((res.dist - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ellipse_and_diamond_outline() {
        let e = BaseRect::from_rect(RectKind::Ellipse, Rect::new(-5.0, -5.0, 5.0, 5.0));
        let res = e.hit_test(Point::new(5.0, 0.0), 1.0);
        assert!(res.dist < 0.1);
        assert_eq!(e.shape_type(), ShapeType::Ellipse);

        let d = BaseRect::from_rect(RectKind::Diamond, Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(!d.hit_test(Point::new(0.5, 0.5), 1.0).inside);
        assert!(d.hit_test(Point::new(5.0, 5.0), 1.0).inside);
    }
}
