//! Snapping of edited points to the grid and to features of other shapes.

use crate::config::SnapConfig;
use crate::render::{HandleStyle, Surface};
use crate::shapes::{
    DrawColor, DrawContext, HandleType, LineStyle, Shape, ShapeFlags, ShapeId, ShapeList,
    flatten_path, rects_overlap,
};
use kurbo::{Point, Rect, Size};

/// Angle snap increment in degrees.
pub const ANGLE_SNAP_INCREMENT: f64 = 15.0;

/// Snap an angle to the nearest increment.
/// Returns the snapped angle in degrees (0-360).
pub fn snap_angle(angle_degrees: f64, increment: f64) -> f64 {
    let snapped = (angle_degrees / increment).round() * increment;
    if snapped < 0.0 {
        snapped + 360.0
    } else if snapped >= 360.0 {
        snapped - 360.0
    } else {
        snapped
    }
}

/// Nearest grid intersection.
pub fn snap_to_grid(point: Point, grid: f64) -> Point {
    Point::new(
        (point.x / grid).round() * grid,
        (point.y / grid).round() * grid,
    )
}

/// Kind of feature a point snapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapType {
    #[default]
    None,
    SameX,
    SameY,
    GridX,
    GridY,
    Grid,
    Point,
    Center,
    MidPoint,
    Quadrant,
    Intersect,
    Perp,
    PerpNear,
    NearPt,
}

impl SnapType {
    /// Rank used to pick among candidates within tolerance; higher wins.
    ///
    /// Shape features outrank the grid, and exact features (vertices,
    /// centers, midpoints) outrank derived ones (intersections, feet, nearest
    /// point on an outline), which would otherwise always shadow them.
    pub fn priority(self) -> u8 {
        match self {
            SnapType::None => 0,
            SnapType::SameX | SnapType::SameY => 1,
            SnapType::GridX | SnapType::GridY => 2,
            SnapType::Grid => 3,
            SnapType::NearPt => 4,
            SnapType::PerpNear => 5,
            SnapType::Perp => 6,
            SnapType::Intersect => 7,
            SnapType::Center | SnapType::MidPoint | SnapType::Quadrant => 8,
            SnapType::Point => 9,
        }
    }

    /// Only one coordinate is corrected.
    pub fn is_axis(self) -> bool {
        matches!(
            self,
            SnapType::SameX | SnapType::SameY | SnapType::GridX | SnapType::GridY
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    kind: SnapType,
    /// Snapped point for point candidates, or the reference point for axes.
    point: Point,
    dist: f64,
    shape_id: ShapeId,
    handle: Option<usize>,
}

impl Candidate {
    fn beats(&self, other: &Candidate) -> bool {
        let (a, b) = (self.kind.priority(), other.kind.priority());
        a > b || (a == b && self.dist < other.dist)
    }
}

fn keep_best(slot: &mut Option<Candidate>, c: Candidate) {
    if slot.as_ref().is_none_or(|best| c.beats(best)) {
        *slot = Some(c);
    }
}

/// Last snap result, kept for feedback drawing and for callers that need
/// to know which handle was matched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SnapState {
    pub kind: SnapType,
    /// Feature the point snapped to (reference handle for axis snaps).
    pub from: Point,
    /// Corrected point.
    pub to: Point,
    /// Second axis snap, when x and y were corrected independently.
    pub kind_y: SnapType,
    pub from_y: Point,
    pub shape_id: ShapeId,
    pub handle: Option<usize>,
    /// Handle of the edited shape that was snapped.
    pub src_handle: Option<usize>,
}

/// Computes corrected points and remembers the last snap.
#[derive(Debug, Clone, Default)]
pub struct SnapEngine {
    options: SnapConfig,
    state: SnapState,
}

/// Segment of another shape's outline.
type Segment = (Point, Point, ShapeId);

impl SnapEngine {
    pub fn new(options: SnapConfig) -> Self {
        Self {
            options,
            state: SnapState::default(),
        }
    }

    pub fn options(&self) -> &SnapConfig {
        &self.options
    }

    pub fn set_options(&mut self, options: SnapConfig) {
        self.options = options;
        self.clear_snap();
    }

    pub fn clear_snap(&mut self) {
        self.state = SnapState::default();
    }

    pub fn snapped_type(&self) -> SnapType {
        self.state.kind
    }

    /// Reference feature and corrected point of the last snap.
    pub fn snapped_point(&self) -> (Point, Point) {
        (self.state.from, self.state.to)
    }

    /// `(shape id, handle, source handle)` of the last point snap.
    pub fn snapped_handle(&self) -> Option<(ShapeId, usize, Option<usize>)> {
        self.state
            .handle
            .map(|h| (self.state.shape_id, h, self.state.src_handle))
    }

    pub fn state(&self) -> &SnapState {
        &self.state
    }

    /// Correct `pt` against `shapes`.
    ///
    /// `editing` is the working copy being modified (it may also live in
    /// `shapes` under the same id, in which case the stored instance is
    /// ignored); `hot_handle` is its handle following the pointer. Shapes in
    /// `ignore_ids` are not snap targets.
    pub fn snap_point(
        &mut self,
        shapes: &ShapeList,
        tol: f64,
        pt: Point,
        editing: Option<&Shape>,
        hot_handle: Option<usize>,
        ignore_ids: &[ShapeId],
    ) -> Point {
        self.clear_snap();
        self.state.to = pt;
        if !self.options.enabled || tol <= 0.0 {
            return pt;
        }

        let editing_id = editing.map(|sp| sp.id()).unwrap_or(0);
        let skip = |sp: &Shape| {
            ignore_ids.contains(&sp.id())
                || (editing_id != 0 && sp.id() == editing_id)
                || sp.flags.contains(ShapeFlags::NO_SNAP)
        };
        let near_box = Rect::from_center_size(pt, Size::new(tol * 2.0, tol * 2.0));

        let mut best_point: Option<Candidate> = None;
        let mut best_x: Option<Candidate> = None;
        let mut best_y: Option<Candidate> = None;
        let mut segments: Vec<Segment> = Vec::new();

        // The previous vertex of the edited shape anchors perpendicular snaps.
        let perp_base = match (editing, hot_handle) {
            (Some(sp), Some(h)) if h > 0 && h <= sp.point_count() => Some(sp.point(h - 1)),
            _ => None,
        };

        if let Some(sp) = editing {
            for i in 0..sp.handle_count() {
                if Some(i) == hot_handle || sp.is_handle_fixed(i) {
                    continue;
                }
                if let Some(h) = hot_handle {
                    // Neighbors of the dragged vertex would collapse a segment.
                    if h < sp.point_count() && (i + 1 == h || i == h + 1) {
                        continue;
                    }
                }
                self.collect_handle(
                    sp,
                    i,
                    pt,
                    tol,
                    &mut best_point,
                    &mut best_x,
                    &mut best_y,
                );
            }
        }

        for sp in shapes.iter() {
            if skip(sp) {
                continue;
            }
            for i in 0..sp.handle_count() {
                self.collect_handle(sp, i, pt, tol, &mut best_point, &mut best_x, &mut best_y);
            }

            let extent = sp.extent();
            if !rects_overlap(extent.inflate(tol, tol), near_box) {
                continue;
            }

            if sp.is_closed() && self.options.points {
                let c = extent.center();
                let dist = c.distance(pt);
                if dist < tol {
                    keep_best(
                        &mut best_point,
                        Candidate {
                            kind: SnapType::Center,
                            point: c,
                            dist,
                            shape_id: sp.id(),
                            handle: None,
                        },
                    );
                }
            }

            if self.options.near {
                let res = sp.hit_test(pt, tol);
                if res.dist < tol {
                    keep_best(
                        &mut best_point,
                        Candidate {
                            kind: SnapType::NearPt,
                            point: res.nearpt,
                            dist: res.dist,
                            shape_id: sp.id(),
                            handle: None,
                        },
                    );
                }
            }

            if self.options.perpendicular || self.options.intersections {
                for (points, closed) in flatten_path(&sp.to_path(), 0.1) {
                    let n = points.len();
                    let count = if closed { n } else { n.saturating_sub(1) };
                    for i in 0..count {
                        segments.push((points[i], points[(i + 1) % n], sp.id()));
                    }
                }
            }
        }

        if let (Some(base), true) = (perp_base, self.options.perpendicular) {
            for (a, b, id) in &segments {
                if let Some((foot, within)) = perpendicular_foot(base, *a, *b) {
                    let dist = foot.distance(pt);
                    if dist < tol {
                        keep_best(
                            &mut best_point,
                            Candidate {
                                kind: if within { SnapType::Perp } else { SnapType::PerpNear },
                                point: foot,
                                dist,
                                shape_id: *id,
                                handle: None,
                            },
                        );
                    }
                }
            }
        }

        if self.options.intersections {
            let nearby: Vec<&Segment> = segments
                .iter()
                .filter(|(a, b, _)| {
                    rects_overlap(Rect::from_points(*a, *b), near_box)
                })
                .collect();
            for (i, s1) in nearby.iter().enumerate() {
                for s2 in &nearby[i + 1..] {
                    if s1.2 == s2.2 && (s1.1 == s2.0 || s1.0 == s2.1) {
                        continue;
                    }
                    if let Some(x) = segment_intersection(s1.0, s1.1, s2.0, s2.1) {
                        let dist = x.distance(pt);
                        if dist < tol {
                            keep_best(
                                &mut best_point,
                                Candidate {
                                    kind: SnapType::Intersect,
                                    point: x,
                                    dist,
                                    shape_id: s1.2,
                                    handle: None,
                                },
                            );
                        }
                    }
                }
            }
        }

        if let Some(grid) = self.options.grid.filter(|g| *g > 0.0) {
            let gp = snap_to_grid(pt, grid);
            let dist = gp.distance(pt);
            let grid_candidate = |kind, dist| Candidate {
                kind,
                point: gp,
                dist,
                shape_id: 0,
                handle: None,
            };
            if dist < tol {
                keep_best(&mut best_point, grid_candidate(SnapType::Grid, dist));
            }
            let dx = (gp.x - pt.x).abs();
            if dx < tol {
                keep_best(&mut best_x, grid_candidate(SnapType::GridX, dx));
            }
            let dy = (gp.y - pt.y).abs();
            if dy < tol {
                keep_best(&mut best_y, grid_candidate(SnapType::GridY, dy));
            }
        }

        let axis_rank = best_x
            .iter()
            .chain(best_y.iter())
            .map(|c| c.kind.priority())
            .max()
            .unwrap_or(0);

        match best_point {
            Some(c) if c.kind.priority() > axis_rank || (best_x.is_none() && best_y.is_none()) => {
                self.state.kind = c.kind;
                self.state.from = c.point;
                self.state.to = c.point;
                self.state.shape_id = c.shape_id;
                self.state.handle = c.handle;
                self.state.src_handle = hot_handle;
            }
            _ => {
                let mut result = pt;
                if let Some(cx) = best_x {
                    result.x = cx.point.x;
                    self.state.kind = cx.kind;
                    self.state.from = cx.point;
                    self.state.shape_id = cx.shape_id;
                }
                if let Some(cy) = best_y {
                    result.y = cy.point.y;
                    if best_x.is_none() {
                        self.state.kind = cy.kind;
                        self.state.from = cy.point;
                        self.state.shape_id = cy.shape_id;
                    } else {
                        self.state.kind_y = cy.kind;
                        self.state.from_y = cy.point;
                    }
                }
                self.state.to = result;
                self.state.src_handle = hot_handle;
            }
        }

        if self.state.kind != SnapType::None {
            log::trace!("snap {:?} {:?} -> {:?}", self.state.kind, pt, self.state.to);
        }
        self.state.to
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_handle(
        &self,
        sp: &Shape,
        index: usize,
        pt: Point,
        tol: f64,
        best_point: &mut Option<Candidate>,
        best_x: &mut Option<Candidate>,
        best_y: &mut Option<Candidate>,
    ) {
        let hp = sp.handle_point(index);
        let base = Candidate {
            kind: SnapType::None,
            point: hp,
            dist: 0.0,
            shape_id: sp.id(),
            handle: Some(index),
        };
        if self.options.points {
            let dist = hp.distance(pt);
            if dist < tol {
                let kind = match sp.handle_type(index) {
                    HandleType::Vertex => SnapType::Point,
                    HandleType::Center => SnapType::Center,
                    HandleType::MidPoint => SnapType::MidPoint,
                    HandleType::Quadrant => SnapType::Quadrant,
                };
                keep_best(best_point, Candidate { kind, dist, ..base });
            }
        }
        if self.options.same_axis {
            let dx = (hp.x - pt.x).abs();
            if dx < tol {
                keep_best(best_x, Candidate { kind: SnapType::SameX, dist: dx, ..base });
            }
            let dy = (hp.y - pt.y).abs();
            if dy < tol {
                keep_best(best_y, Candidate { kind: SnapType::SameY, dist: dy, ..base });
            }
        }
    }

    /// Draw guides for the last snap.
    pub fn draw_snap(&self, surface: &mut dyn Surface) -> bool {
        let state = &self.state;
        if state.kind == SnapType::None {
            return false;
        }
        let guide = DrawContext {
            line_width: 0.0,
            line_style: LineStyle::Dash,
            line_color: DrawColor::new(0, 128, 255, 200),
            fill_color: DrawColor::TRANSPARENT,
        };
        if state.kind.is_axis() {
            surface.draw_line(&guide, state.from, state.to);
            if state.kind_y != SnapType::None {
                surface.draw_line(&guide, state.from_y, state.to);
            }
        }
        surface.draw_handle(state.to, HandleStyle::Snap);
        true
    }
}

/// Foot of the perpendicular from `base` onto line `a`-`b`, and whether it
/// lies within the segment.
fn perpendicular_foot(base: Point, a: Point, b: Point) -> Option<(Point, bool)> {
    let d = b - a;
    let len2 = d.hypot2();
    if len2 < 1e-12 {
        return None;
    }
    let t = (base - a).dot(d) / len2;
    Some((a + d * t, (0.0..=1.0).contains(&t)))
}

fn segment_intersection(a: Point, b: Point, c: Point, d: Point) -> Option<Point> {
    let r = b - a;
    let s = d - c;
    let denom = r.cross(s);
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = (c - a).cross(s) / denom;
    let u = (c - a).cross(r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(a + r * t)
    } else {
        None
    }
}
