//! Bounding-box handles and transform helpers used when editing a selection.

use crate::snap::{ANGLE_SNAP_INCREMENT, snap_angle};
use kurbo::{Affine, Point, Rect, Vec2};

/// Number of handles on a selection box (4 corners, 4 edge midpoints).
pub const BOX_HANDLE_COUNT: usize = 8;

/// A handle position with its index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    pub position: Point,
    pub index: usize,
}

impl Handle {
    pub fn new(position: Point, index: usize) -> Self {
        Self { position, index }
    }
}

pub fn box_handle_point(rect: Rect, index: usize) -> Point {
    let c = rect.center();
    match index {
        0 => Point::new(rect.x0, rect.y0),
        1 => Point::new(rect.x1, rect.y0),
        2 => Point::new(rect.x1, rect.y1),
        3 => Point::new(rect.x0, rect.y1),
        4 => Point::new(c.x, rect.y0),
        5 => Point::new(rect.x1, c.y),
        6 => Point::new(c.x, rect.y1),
        7 => Point::new(rect.x0, c.y),
        _ => c,
    }
}

pub fn box_handles(rect: Rect) -> Vec<Handle> {
    (0..BOX_HANDLE_COUNT)
        .map(|i| Handle::new(box_handle_point(rect, i), i))
        .collect()
}

/// Rotate handle position: `offset` beyond the top edge.
pub fn rotate_handle_point(rect: Rect, offset: f64) -> Point {
    Point::new(rect.center().x, rect.y0 - offset)
}

/// Nearest box handle within `tol`.
///
/// Edge handles win over corners when their distance is within
/// `edge_bias` of the best corner.
pub fn hit_box_handle(rect: Rect, pt: Point, tol: f64, edge_bias: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for handle in box_handles(rect) {
        let mut dist = handle.position.distance(pt);
        if dist > tol {
            continue;
        }
        if handle.index >= 4 {
            dist -= edge_bias;
        }
        if best.is_none_or(|(_, d)| dist < d) {
            best = Some((handle.index, dist));
        }
    }
    best.map(|(index, _)| index)
}

/// Move one handle of `rect` to `pt`.
///
/// With `lock_ratio` corners keep the aspect ratio about the opposite
/// corner, and edges grow the other axis symmetrically.
pub fn move_box_handle(rect: Rect, index: usize, pt: Point, lock_ratio: bool) -> Rect {
    let (mut x0, mut y0, mut x1, mut y1) = (rect.x0, rect.y0, rect.x1, rect.y1);
    match index {
        0 => (x0, y0) = (pt.x, pt.y),
        1 => (x1, y0) = (pt.x, pt.y),
        2 => (x1, y1) = (pt.x, pt.y),
        3 => (x0, y1) = (pt.x, pt.y),
        4 => y0 = pt.y,
        5 => x1 = pt.x,
        6 => y1 = pt.y,
        7 => x0 = pt.x,
        _ => return rect,
    }

    if lock_ratio && rect.width().abs() > 0.0 && rect.height().abs() > 0.0 {
        let ratio = (rect.width() / rect.height()).abs();
        let mut w = x1 - x0;
        let mut h = y1 - y0;
        match index {
            0..=3 => {
                if h.abs() < f64::EPSILON || (w / h).abs() > ratio {
                    h = h.signum() * w.abs() / ratio;
                } else {
                    w = w.signum() * h.abs() * ratio;
                }
                match index {
                    0 => (x0, y0) = (x1 - w, y1 - h),
                    1 => (x1, y0) = (x0 + w, y1 - h),
                    2 => (x1, y1) = (x0 + w, y0 + h),
                    _ => (x0, y1) = (x1 - w, y0 + h),
                }
            }
            4 | 6 => {
                w = h.abs() * ratio;
                let cx = (x0 + x1) / 2.0;
                (x0, x1) = (cx - w / 2.0, cx + w / 2.0);
            }
            _ => {
                h = w.abs() / ratio;
                let cy = (y0 + y1) / 2.0;
                (y0, y1) = (cy - h / 2.0, cy + h / 2.0);
            }
        }
    }
    Rect::new(x0, y0, x1, y1).abs()
}

/// Affine map taking `from` onto `to`. `None` when `from` is degenerate.
pub fn rect_to_rect_transform(from: Rect, to: Rect) -> Option<Affine> {
    if from.width().abs() < f64::EPSILON || from.height().abs() < f64::EPSILON {
        return None;
    }
    let sx = to.width() / from.width();
    let sy = to.height() / from.height();
    Some(
        Affine::translate(to.origin().to_vec2())
            * Affine::scale_non_uniform(sx, sy)
            * Affine::translate(-from.origin().to_vec2()),
    )
}

/// Signed angle in radians swept from `from` to `to` around `center`.
pub fn rotation_angle(center: Point, from: Point, to: Point) -> f64 {
    let a: Vec2 = from - center;
    let b: Vec2 = to - center;
    b.y.atan2(b.x) - a.y.atan2(a.x)
}

/// Snap a rotation in radians to the nearest angle increment.
pub fn snap_rotation(angle: f64) -> f64 {
    let deg = snap_angle(angle.to_degrees(), ANGLE_SNAP_INCREMENT);
    let signed = if deg > 180.0 { deg - 360.0 } else { deg };
    signed.to_radians()
}

/// Clamp `rect` so it stays inside `limits` by translating it.
pub fn move_into_limits(rect: Rect, limits: Rect) -> Vec2 {
    let mut v = Vec2::ZERO;
    if rect.width() <= limits.width() {
        if rect.x0 < limits.x0 {
            v.x = limits.x0 - rect.x0;
        } else if rect.x1 > limits.x1 {
            v.x = limits.x1 - rect.x1;
        }
    }
    if rect.height() <= limits.height() {
        if rect.y0 < limits.y0 {
            v.y = limits.y0 - rect.y0;
        } else if rect.y1 > limits.y1 {
            v.y = limits.y1 - rect.y1;
        }
    }
    v
}
