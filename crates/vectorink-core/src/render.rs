//! Drawing surface contract consumed by shapes, commands and the snap engine.
//!
//! Coordinates passed to a surface are model coordinates; the caller sets up
//! the model-to-display transform on the backend side.

use crate::shapes::DrawContext;
use kurbo::{Arc, BezPath, Point, Rect, Shape as _, Size, Vec2};

/// Visual kind of a handle marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStyle {
    Vertex,
    /// Center, midpoint or other derived node.
    Node,
    Rotate,
    /// Highlighted snap target.
    Snap,
    /// Context action button.
    Action(u32),
}

/// Backend-agnostic drawing surface.
pub trait Surface {
    fn begin_paint(&mut self) -> bool {
        true
    }

    fn end_paint(&mut self) {}

    fn draw_line(&mut self, ctx: &DrawContext, from: Point, to: Point);

    fn draw_rect(&mut self, ctx: &DrawContext, rect: Rect);

    fn draw_ellipse(&mut self, ctx: &DrawContext, rect: Rect);

    fn draw_polygon(&mut self, ctx: &DrawContext, points: &[Point], closed: bool);

    fn draw_path(&mut self, ctx: &DrawContext, path: &BezPath);

    /// Draw cubic segments: `points[0]`, then three points per segment.
    fn draw_beziers(&mut self, ctx: &DrawContext, points: &[Point], closed: bool) {
        let Some(first) = points.first() else {
            return;
        };
        let mut path = BezPath::new();
        path.move_to(*first);
        for seg in points[1..].chunks_exact(3) {
            path.curve_to(seg[0], seg[1], seg[2]);
        }
        if closed {
            path.close_path();
        }
        self.draw_path(ctx, &path);
    }

    fn draw_handle(&mut self, point: Point, style: HandleStyle);

    fn draw_circle(&mut self, ctx: &DrawContext, center: Point, radius: f64) {
        let rect = Rect::from_center_size(center, Size::new(radius * 2.0, radius * 2.0));
        self.draw_ellipse(ctx, rect);
    }

    /// Angles in radians, sweep counter-clockwise for positive values.
    fn draw_arc(&mut self, ctx: &DrawContext, center: Point, radius: f64, start: f64, sweep: f64) {
        let arc = Arc::new(center, Vec2::new(radius, radius), start, sweep, 0.0);
        let path = arc.to_path(0.1);
        self.draw_path(ctx, &path);
    }
}

/// One recorded drawing call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Line(Point, Point),
    Rect(Rect),
    Ellipse(Rect),
    Polygon { points: Vec<Point>, closed: bool },
    Path(BezPath),
    Handle(Point, HandleStyle),
}

/// Surface that stores calls instead of rasterizing them.
///
/// Used to capture transient feedback (snap guides, in-progress shapes) and in tests.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    pub ops: Vec<DrawOp>,
    pub painting: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handles(&self) -> impl Iterator<Item = (Point, HandleStyle)> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Handle(p, s) => Some((*p, *s)),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl Surface for RecordingSurface {
    fn begin_paint(&mut self) -> bool {
        self.painting = true;
        true
    }

    fn end_paint(&mut self) {
        self.painting = false;
    }

    fn draw_line(&mut self, _ctx: &DrawContext, from: Point, to: Point) {
        self.ops.push(DrawOp::Line(from, to));
    }

    fn draw_rect(&mut self, _ctx: &DrawContext, rect: Rect) {
        self.ops.push(DrawOp::Rect(rect));
    }

    fn draw_ellipse(&mut self, _ctx: &DrawContext, rect: Rect) {
        self.ops.push(DrawOp::Ellipse(rect));
    }

    fn draw_polygon(&mut self, _ctx: &DrawContext, points: &[Point], closed: bool) {
        self.ops.push(DrawOp::Polygon {
            points: points.to_vec(),
            closed,
        });
    }

    fn draw_path(&mut self, _ctx: &DrawContext, path: &BezPath) {
        self.ops.push(DrawOp::Path(path.clone()));
    }

    fn draw_handle(&mut self, point: Point, style: HandleStyle) {
        self.ops.push(DrawOp::Handle(point, style));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_surface_collects_ops() {
        let ctx = DrawContext::default();
        let mut s = RecordingSurface::new();
        assert!(s.begin_paint());
        s.draw_line(&ctx, Point::ZERO, Point::new(1.0, 0.0));
        s.draw_circle(&ctx, Point::new(5.0, 5.0), 2.0);
        s.draw_handle(Point::new(1.0, 1.0), HandleStyle::Vertex);
        s.end_paint();

        assert_eq!(s.ops.len(), 3);
        assert_eq!(s.ops[1], DrawOp::Ellipse(Rect::new(3.0, 3.0, 7.0, 7.0)));
        assert_eq!(s.handles().count(), 1);
        assert!(!s.painting);
    }

    #[test]
    fn test_beziers_become_path() {
        let ctx = DrawContext::default();
        let mut s = RecordingSurface::new();
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 1.0),
            Point::new(3.0, 0.0),
        ];
        s.draw_beziers(&ctx, &pts, false);
        assert!(matches!(&s.ops[0], DrawOp::Path(p) if p.elements().len() == 2));
    }
}
