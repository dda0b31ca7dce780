//! View transform between model and display coordinates.

use crate::config::ViewConfig;
use kurbo::{Affine, Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

const MM_PER_INCH: f64 = 25.4;

/// Camera maps model coordinates to display pixels.
///
/// Display = model * zoom + offset. Millimeter tolerances are converted
/// through the device resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// Translation in display pixels.
    pub offset: Vec2,
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Dots per inch of the display.
    pub dpi: f64,
    /// Size of the view in display pixels.
    pub view_size: Size,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            zoom: 1.0,
            min_zoom: 0.05,
            max_zoom: 40.0,
            dpi: 96.0,
            view_size: Size::new(1024.0, 768.0),
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ViewConfig) -> Self {
        Self {
            dpi: config.dpi,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
            ..Self::default()
        }
    }

    /// Model to display transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.offset) * Affine::scale(self.zoom)
    }

    /// Display to model transform.
    pub fn inverse_transform(&self) -> Affine {
        Affine::scale(1.0 / self.zoom) * Affine::translate(-self.offset)
    }

    pub fn display_to_model(&self, point: Point) -> Point {
        self.inverse_transform() * point
    }

    pub fn model_to_display(&self, point: Point) -> Point {
        self.transform() * point
    }

    /// Pixels for a length in millimeters on screen.
    pub fn mm_to_display(&self, mm: f64) -> f64 {
        mm * self.dpi / MM_PER_INCH
    }

    pub fn display_to_model_len(&self, px: f64) -> f64 {
        px / self.zoom
    }

    /// Model length of `mm` millimeters on screen at the current zoom.
    pub fn display_mm_to_model(&self, mm: f64) -> f64 {
        self.display_to_model_len(self.mm_to_display(mm))
    }

    /// Visible view rectangle in display pixels.
    pub fn view_rect(&self) -> Rect {
        Rect::from_origin_size(Point::ZERO, self.view_size)
    }

    /// Visible area in model coordinates.
    pub fn model_window(&self) -> Rect {
        let r = self.view_rect();
        Rect::from_points(
            self.display_to_model(Point::new(r.x0, r.y0)),
            self.display_to_model(Point::new(r.x1, r.y1)),
        )
    }

    pub fn set_view_size(&mut self, size: Size) {
        self.view_size = size;
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Zoom keeping the given display point fixed.
    pub fn zoom_at(&mut self, display_point: Point, factor: f64) -> bool {
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        if (new_zoom - self.zoom).abs() < f64::EPSILON {
            return false;
        }
        let model_point = self.display_to_model(display_point);
        self.zoom = new_zoom;
        let moved = self.model_to_display(model_point);
        self.offset += display_point - moved;
        true
    }

    /// Zoom and center so that `bounds` fills the view with `padding` pixels.
    pub fn fit_to_bounds(&mut self, bounds: Rect, padding: f64) {
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            self.offset = Vec2::ZERO;
            self.zoom = 1.0;
            return;
        }
        let avail = Size::new(
            (self.view_size.width - padding * 2.0).max(1.0),
            (self.view_size.height - padding * 2.0).max(1.0),
        );
        self.zoom = (avail.width / bounds.width())
            .min(avail.height / bounds.height())
            .clamp(self.min_zoom, self.max_zoom);
        let view_center = self.view_rect().center();
        self.offset = view_center.to_vec2() - bounds.center().to_vec2() * self.zoom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut camera = Camera::new();
        camera.zoom = 2.0;
        camera.offset = Vec2::new(100.0, 50.0);
        let p = Point::new(10.0, 20.0);
        let d = camera.model_to_display(p);
        assert_eq!(d, Point::new(120.0, 90.0));
        let back = camera.display_to_model(d);
        assert!((back.x - p.x).abs() < 1e-9);
        assert!((back.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn test_mm_to_model() {
        let mut camera = Camera::new();
        assert!((camera.display_mm_to_model(25.4) - 96.0).abs() < 1e-9);
        camera.zoom = 4.0;
        assert!((camera.display_mm_to_model(25.4) - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_zoom_at_keeps_point() {
        let mut camera = Camera::new();
        let anchor = Point::new(300.0, 200.0);
        let before = camera.display_to_model(anchor);
        assert!(camera.zoom_at(anchor, 2.0));
        let after = camera.display_to_model(anchor);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
        camera.zoom = camera.max_zoom;
        assert!(!camera.zoom_at(anchor, 2.0));
    }

    #[test]
    fn test_model_window_and_fit() {
        let mut camera = Camera::new();
        camera.set_view_size(Size::new(200.0, 100.0));
        camera.fit_to_bounds(Rect::new(0.0, 0.0, 50.0, 50.0), 0.0);
        assert!((camera.zoom - 2.0).abs() < 1e-9);
        let window = camera.model_window();
        assert!((window.center().x - 25.0).abs() < 1e-9);
        assert!((window.height() - 50.0).abs() < 1e-9);
    }
}
