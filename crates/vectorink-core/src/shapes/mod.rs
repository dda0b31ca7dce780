//! Shape definitions for the document.
//!
//! Every geometry implements [`ShapeTrait`]; [`Shape`] adds identity, style,
//! flags and the change counter shared by all geometries.

mod dot;
mod group;
mod line;
mod lines;
mod list;
mod parallel;
mod rect;
mod splines;

pub use dot::Dot;
pub use group::Group;
pub use line::Line;
pub use lines::Lines;
pub use list::ShapeList;
pub use parallel::Parallelogram;
pub use rect::{BaseRect, RectKind};
pub use splines::Splines;

use crate::render::Surface;
use crate::storage::{Storage, read_floats};
use kurbo::{Affine, BezPath, PathEl, Point, Rect, Shape as _, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};

/// Shape identifier, unique within its container. 0 means unassigned.
pub type ShapeId = u32;

/// Identifier of a [`ShapeList`] instance, used as the non-owning parent link.
pub type ContainerId = u32;

/// Smallest extent a shape with points may have.
pub const MIN_TOL: f64 = 1e-4;

/// Distance comparison epsilon.
pub const ZERO_TOL: f64 = 1e-7;

/// Serialized type tag of a geometry (low 16 bits are written to storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ShapeType {
    Dot = 1,
    Line = 2,
    Rect = 3,
    Ellipse = 4,
    Diamond = 5,
    Parallel = 6,
    Lines = 7,
    Splines = 8,
    Group = 9,
}

impl ShapeType {
    pub fn tag(self) -> u32 {
        self as u32
    }

    pub fn from_tag(tag: u32) -> Option<Self> {
        match tag & 0xFFFF {
            1 => Some(Self::Dot),
            2 => Some(Self::Line),
            3 => Some(Self::Rect),
            4 => Some(Self::Ellipse),
            5 => Some(Self::Diamond),
            6 => Some(Self::Parallel),
            7 => Some(Self::Lines),
            8 => Some(Self::Splines),
            9 => Some(Self::Group),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dot => "dot",
            Self::Line => "line",
            Self::Rect => "rect",
            Self::Ellipse => "ellipse",
            Self::Diamond => "diamond",
            Self::Parallel => "parallel",
            Self::Lines => "lines",
            Self::Splines => "splines",
            Self::Group => "group",
        }
    }

    /// Empty geometry of this type (shape factory).
    pub fn create(self) -> ShapeKind {
        match self {
            Self::Dot => ShapeKind::Dot(Dot::default()),
            Self::Line => ShapeKind::Line(Line::default()),
            Self::Rect => ShapeKind::Rect(BaseRect::new(RectKind::Rect)),
            Self::Ellipse => ShapeKind::Rect(BaseRect::new(RectKind::Ellipse)),
            Self::Diamond => ShapeKind::Rect(BaseRect::new(RectKind::Diamond)),
            Self::Parallel => ShapeKind::Parallel(Parallelogram::default()),
            Self::Lines => ShapeKind::Lines(Lines::default()),
            Self::Splines => ShapeKind::Splines(Splines::default()),
            Self::Group => ShapeKind::Group(Group::default()),
        }
    }
}

/// Role of a handle point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleType {
    Vertex,
    Center,
    MidPoint,
    Quadrant,
}

/// Bit flags shared by all shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ShapeFlags(u32);

impl ShapeFlags {
    pub const LOCKED: Self = Self(1);
    pub const FIXED_LENGTH: Self = Self(1 << 1);
    pub const FIXED_SIZE: Self = Self(1 << 2);
    pub const ROTATE_DISABLED: Self = Self(1 << 3);
    pub const HIDE_CONTENT: Self = Self(1 << 4);
    pub const NO_SNAP: Self = Self(1 << 5);
    pub const NO_ACTION: Self = Self(1 << 6);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: Self, on: bool) {
        if on {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

/// Line dash style, serialized as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineStyle {
    #[default]
    Solid,
    Dash,
    Dot,
    DashDot,
    DashDotDot,
    Null,
}

impl LineStyle {
    pub fn code(self) -> i32 {
        match self {
            Self::Solid => 0,
            Self::Dash => 1,
            Self::Dot => 2,
            Self::DashDot => 3,
            Self::DashDotDot => 4,
            Self::Null => 5,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Dash,
            2 => Self::Dot,
            3 => Self::DashDot,
            4 => Self::DashDotDot,
            5 => Self::Null,
            _ => Self::Solid,
        }
    }
}

/// RGBA8 color with the packed ARGB storage form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrawColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl DrawColor {
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Packed as `b | g << 8 | r << 16 | a << 24`.
    pub fn argb(self) -> u32 {
        u32::from(self.b) | u32::from(self.g) << 8 | u32::from(self.r) << 16 | u32::from(self.a) << 24
    }

    pub fn from_argb(value: u32) -> Self {
        Self {
            b: (value & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            r: ((value >> 16) & 0xFF) as u8,
            a: ((value >> 24) & 0xFF) as u8,
        }
    }

    pub fn is_transparent(self) -> bool {
        self.a == 0
    }
}

impl From<Color> for DrawColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self::new(rgba.r, rgba.g, rgba.b, rgba.a)
    }
}

impl From<DrawColor> for Color {
    fn from(color: DrawColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Stroke and fill attributes of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawContext {
    /// Positive values are model units, 0 is a hairline.
    pub line_width: f64,
    pub line_style: LineStyle,
    pub line_color: DrawColor,
    pub fill_color: DrawColor,
}

impl Default for DrawContext {
    fn default() -> Self {
        Self {
            line_width: 0.0,
            line_style: LineStyle::Solid,
            line_color: DrawColor::BLACK,
            fill_color: DrawColor::TRANSPARENT,
        }
    }
}

impl DrawContext {
    pub fn with_fill(mut self, color: DrawColor) -> Self {
        self.fill_color = color;
        self
    }

    pub fn has_fill(&self) -> bool {
        !self.fill_color.is_transparent()
    }

    pub fn save(&self, s: &mut dyn Storage) {
        s.write_int("lineStyle", self.line_style.code());
        s.write_float("lineWidth", self.line_width);
        s.write_uint("lineColor", self.line_color.argb());
        s.write_uint("fillColor", self.fill_color.argb());
    }

    pub fn load(&mut self, s: &mut dyn Storage) {
        self.line_style = LineStyle::from_code(s.read_int("lineStyle", 0));
        self.line_width = s.read_float("lineWidth", 0.0);
        self.line_color = DrawColor::from_argb(s.read_uint("lineColor", 0xFF00_0000));
        self.fill_color = DrawColor::from_argb(s.read_uint("fillColor", 0));
    }
}

/// Outcome of a point hit test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    /// Distance from the tested point to the outline.
    pub dist: f64,
    pub nearpt: Point,
    /// Index of the nearest segment, -1 when not applicable.
    pub segment: i32,
    /// The tested point lies inside a closed outline.
    pub inside: bool,
}

impl HitResult {
    pub fn miss() -> Self {
        Self {
            dist: f64::MAX,
            nearpt: Point::ZERO,
            segment: -1,
            inside: false,
        }
    }
}

impl Default for HitResult {
    fn default() -> Self {
        Self::miss()
    }
}

/// Geometry capabilities every shape type provides.
pub trait ShapeTrait {
    fn shape_type(&self) -> ShapeType;

    fn point_count(&self) -> usize;

    fn point(&self, index: usize) -> Point;

    fn set_point(&mut self, index: usize, pt: Point);

    fn handle_count(&self) -> usize {
        self.point_count()
    }

    fn handle_point(&self, index: usize) -> Point {
        self.point(index)
    }

    /// Move a handle. Returns false when the handle cannot be moved.
    fn set_handle_point(&mut self, index: usize, pt: Point, _tol: f64) -> bool {
        if index < self.point_count() && !self.is_handle_fixed(index) {
            self.set_point(index, pt);
            true
        } else {
            false
        }
    }

    fn is_handle_fixed(&self, _index: usize) -> bool {
        false
    }

    fn handle_type(&self, _index: usize) -> HandleType {
        HandleType::Vertex
    }

    fn is_closed(&self) -> bool {
        false
    }

    /// Bounding box of the geometry, possibly degenerate.
    fn extent(&self) -> Rect {
        points_extent((0..self.point_count()).map(|i| self.point(i)))
    }

    fn hit_test(&self, pt: Point, tol: f64) -> HitResult;

    /// Whether any part of the outline lies within `rect`.
    fn hit_test_box(&self, rect: Rect) -> bool {
        let ext = self.extent();
        if !rects_overlap(rect, ext) {
            return false;
        }
        if rect.contains(ext.origin()) && rect.contains(Point::new(ext.x1, ext.y1)) {
            return true;
        }
        path_hits_rect(&self.to_path(), rect, self.is_closed())
    }

    fn transform(&mut self, affine: Affine) {
        for i in 0..self.point_count() {
            let pt = affine * self.point(i);
            self.set_point(i, pt);
        }
    }

    /// Move the shape (or one segment of it) by `vec`.
    fn offset(&mut self, vec: Vec2, _segment: i32) -> bool {
        self.transform(Affine::translate(vec));
        true
    }

    fn to_path(&self) -> BezPath;

    fn draw(&self, surface: &mut dyn Surface, ctx: &DrawContext) {
        surface.draw_path(ctx, &self.to_path());
    }

    fn save(&self, s: &mut dyn Storage);

    fn load(&mut self, s: &mut dyn Storage) -> bool;

    fn clear(&mut self);
}

/// Concrete geometry of a shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Dot(Dot),
    Line(Line),
    Rect(BaseRect),
    Parallel(Parallelogram),
    Lines(Lines),
    Splines(Splines),
    Group(Group),
}

impl ShapeKind {
    pub fn geom(&self) -> &dyn ShapeTrait {
        match self {
            ShapeKind::Dot(s) => s,
            ShapeKind::Line(s) => s,
            ShapeKind::Rect(s) => s,
            ShapeKind::Parallel(s) => s,
            ShapeKind::Lines(s) => s,
            ShapeKind::Splines(s) => s,
            ShapeKind::Group(s) => s,
        }
    }

    pub fn geom_mut(&mut self) -> &mut dyn ShapeTrait {
        match self {
            ShapeKind::Dot(s) => s,
            ShapeKind::Line(s) => s,
            ShapeKind::Rect(s) => s,
            ShapeKind::Parallel(s) => s,
            ShapeKind::Lines(s) => s,
            ShapeKind::Splines(s) => s,
            ShapeKind::Group(s) => s,
        }
    }
}

/// A shape in a document: geometry plus identity and attributes.
#[derive(Debug, Clone)]
pub struct Shape {
    pub(crate) id: ShapeId,
    pub(crate) parent: Option<ContainerId>,
    pub(crate) change_count: u32,
    pub tag: i32,
    pub context: DrawContext,
    pub flags: ShapeFlags,
    pub kind: ShapeKind,
}

impl Shape {
    /// Create an unattached shape with id 0.
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            id: 0,
            parent: None,
            change_count: 0,
            tag: 0,
            context: DrawContext::default(),
            flags: ShapeFlags::empty(),
            kind,
        }
    }

    pub fn from_type(ty: ShapeType) -> Self {
        Self::new(ty.create())
    }

    pub fn with_context(mut self, context: DrawContext) -> Self {
        self.context = context;
        self
    }

    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// The container this shape belongs to, if any.
    pub fn parent(&self) -> Option<ContainerId> {
        self.parent
    }

    pub fn change_count(&self) -> u32 {
        self.change_count
    }

    pub fn reset_change_count(&mut self, count: u32) {
        self.change_count = count;
    }

    /// Mark the shape as modified.
    pub fn update(&mut self) {
        self.change_count = self.change_count.wrapping_add(1);
    }

    pub fn geom(&self) -> &dyn ShapeTrait {
        self.kind.geom()
    }

    pub fn geom_mut(&mut self) -> &mut dyn ShapeTrait {
        self.kind.geom_mut()
    }

    pub fn shape_type(&self) -> ShapeType {
        self.geom().shape_type()
    }

    pub fn is_locked(&self) -> bool {
        self.flags.contains(ShapeFlags::LOCKED)
    }

    pub fn is_closed(&self) -> bool {
        self.geom().is_closed()
    }

    pub fn has_fill_color(&self) -> bool {
        self.context.has_fill() && self.is_closed()
    }

    pub fn point_count(&self) -> usize {
        self.geom().point_count()
    }

    pub fn point(&self, index: usize) -> Point {
        self.geom().point(index)
    }

    pub fn points(&self) -> Vec<Point> {
        (0..self.point_count()).map(|i| self.point(i)).collect()
    }

    pub fn set_point(&mut self, index: usize, pt: Point) {
        self.geom_mut().set_point(index, pt);
        self.update();
    }

    pub fn handle_count(&self) -> usize {
        self.geom().handle_count()
    }

    pub fn handle_point(&self, index: usize) -> Point {
        self.geom().handle_point(index)
    }

    pub fn handle_type(&self, index: usize) -> HandleType {
        self.geom().handle_type(index)
    }

    pub fn is_handle_fixed(&self, index: usize) -> bool {
        self.geom().is_handle_fixed(index)
    }

    /// Move a handle, honoring the fixed-length and fixed-size flags.
    pub fn set_handle_point(&mut self, index: usize, pt: Point, tol: f64) -> bool {
        if self.flags.contains(ShapeFlags::FIXED_SIZE) || self.flags.contains(ShapeFlags::FIXED_LENGTH) {
            let moved = if let ShapeKind::Line(line) = &mut self.kind {
                line.rotate_end_to(index, pt)
            } else {
                let from = self.geom().handle_point(index);
                self.geom_mut().offset(pt - from, -1)
            };
            if moved {
                self.update();
            }
            return moved;
        }
        let moved = self.geom_mut().set_handle_point(index, pt, tol);
        if moved {
            self.update();
        }
        moved
    }

    /// Bounding box, never degenerate when the shape has points.
    pub fn extent(&self) -> Rect {
        let rect = self.geom().extent();
        if self.point_count() > 0 && (rect.width() < MIN_TOL || rect.height() < MIN_TOL) {
            rect.inflate(MIN_TOL / 2.0, MIN_TOL / 2.0)
        } else {
            rect
        }
    }

    pub fn hit_test(&self, pt: Point, tol: f64) -> HitResult {
        self.geom().hit_test(pt, tol)
    }

    pub fn hit_test_box(&self, rect: Rect) -> bool {
        self.geom().hit_test_box(rect)
    }

    pub fn transform(&mut self, affine: Affine) {
        self.geom_mut().transform(affine);
        self.update();
    }

    pub fn offset(&mut self, vec: Vec2, segment: i32) -> bool {
        let moved = self.geom_mut().offset(vec, segment);
        if moved {
            self.update();
        }
        moved
    }

    pub fn to_path(&self) -> BezPath {
        self.geom().to_path()
    }

    pub fn draw(&self, surface: &mut dyn Surface) {
        if self.flags.contains(ShapeFlags::HIDE_CONTENT) {
            surface.draw_rect(&self.context, self.extent());
            return;
        }
        self.geom().draw(surface, &self.context);
    }

    pub fn as_group(&self) -> Option<&Group> {
        match &self.kind {
            ShapeKind::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn as_group_mut(&mut self) -> Option<&mut Group> {
        match &mut self.kind {
            ShapeKind::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Content equality, ignoring identity, parent and change count.
    pub fn equals(&self, other: &Shape) -> bool {
        self.tag == other.tag
            && self.flags == other.flags
            && self.context == other.context
            && self.kind == other.kind
    }

    /// Write the common attributes followed by the geometry.
    pub fn save(&self, s: &mut dyn Storage) {
        s.write_int("tag", self.tag);
        self.context.save(s);
        s.write_uint("flags", self.flags.bits());
        self.geom().save(s);
    }

    pub fn load(&mut self, s: &mut dyn Storage) -> bool {
        self.tag = s.read_int("tag", 0);
        self.context.load(s);
        self.flags = ShapeFlags::from_bits(s.read_uint("flags", 0));
        let ok = self.geom_mut().load(s);
        self.update();
        ok
    }
}

// Geometry helpers shared by the shape implementations.

pub(crate) fn points_extent(points: impl IntoIterator<Item = Point>) -> Rect {
    let mut iter = points.into_iter();
    let Some(first) = iter.next() else {
        return Rect::ZERO;
    };
    iter.fold(Rect::from_points(first, first), |r, p| r.union_pt(p))
}

pub(crate) fn rects_overlap(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

/// Distance from `pt` to segment `a`-`b` and the nearest point on it.
pub(crate) fn segment_nearest(pt: Point, a: Point, b: Point) -> (f64, Point) {
    let d = b - a;
    let len2 = d.hypot2();
    if len2 < ZERO_TOL * ZERO_TOL {
        return (pt.distance(a), a);
    }
    let t = ((pt - a).dot(d) / len2).clamp(0.0, 1.0);
    let near = a + d * t;
    (pt.distance(near), near)
}

/// Hit test against a polyline; `inside` is filled for closed outlines.
pub(crate) fn polyline_hit(points: &[Point], closed: bool, pt: Point) -> HitResult {
    let mut res = HitResult::miss();
    match points.len() {
        0 => return res,
        1 => {
            res.dist = pt.distance(points[0]);
            res.nearpt = points[0];
            res.segment = 0;
            return res;
        }
        _ => {}
    }
    let n = points.len();
    let seg_count = if closed { n } else { n - 1 };
    for i in 0..seg_count {
        let (dist, near) = segment_nearest(pt, points[i], points[(i + 1) % n]);
        if dist < res.dist {
            res.dist = dist;
            res.nearpt = near;
            res.segment = i as i32;
        }
    }
    if closed && n > 2 {
        res.inside = polygon_path(points, true).contains(pt);
    }
    res
}

pub(crate) fn polygon_path(points: &[Point], closed: bool) -> BezPath {
    let mut path = BezPath::new();
    if let Some(first) = points.first() {
        path.move_to(*first);
        for p in &points[1..] {
            path.line_to(*p);
        }
        if closed {
            path.close_path();
        }
    }
    path
}

/// Flatten a path into polylines (one per subpath) with closed flags.
pub(crate) fn flatten_path(path: &BezPath, tolerance: f64) -> Vec<(Vec<Point>, bool)> {
    let mut out: Vec<(Vec<Point>, bool)> = Vec::new();
    kurbo::flatten(path.iter(), tolerance, |el| match el {
        PathEl::MoveTo(p) => out.push((vec![p], false)),
        PathEl::LineTo(p) => {
            if let Some((pts, _)) = out.last_mut() {
                pts.push(p);
            }
        }
        PathEl::ClosePath => {
            if let Some((_, closed)) = out.last_mut() {
                *closed = true;
            }
        }
        _ => {}
    });
    out
}

/// Liang-Barsky clip test of segment `a`-`b` against `rect`.
pub(crate) fn segment_hits_rect(a: Point, b: Point, rect: Rect) -> bool {
    let d = b - a;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    let checks = [
        (-d.x, a.x - rect.x0),
        (d.x, rect.x1 - a.x),
        (-d.y, a.y - rect.y0),
        (d.y, rect.y1 - a.y),
    ];
    for (p, q) in checks {
        if p.abs() < ZERO_TOL {
            if q < 0.0 {
                return false;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return false;
            }
        }
    }
    true
}

pub(crate) fn path_hits_rect(path: &BezPath, rect: Rect, closed: bool) -> bool {
    for (points, sub_closed) in flatten_path(path, 0.1) {
        let n = points.len();
        if n == 1 && rect.contains(points[0]) {
            return true;
        }
        for i in 1..n {
            if segment_hits_rect(points[i - 1], points[i], rect) {
                return true;
            }
        }
        if (sub_closed || closed) && n > 2 {
            if segment_hits_rect(points[n - 1], points[0], rect) {
                return true;
            }
            if polygon_path(&points, true).contains(rect.center()) {
                return true;
            }
        }
    }
    false
}

pub(crate) fn save_points(s: &mut dyn Storage, name: &str, points: &[Point]) {
    let values: Vec<f64> = points.iter().flat_map(|p| [p.x, p.y]).collect();
    s.write_float_array(name, &values);
}

pub(crate) fn load_points(s: &mut dyn Storage, name: &str) -> Option<Vec<Point>> {
    let values = s.read_float_array(name)?;
    Some(
        values
            .chunks_exact(2)
            .map(|c| Point::new(c[0], c[1]))
            .collect(),
    )
}

pub(crate) fn load_fixed_points<const N: usize>(s: &mut dyn Storage, name: &str) -> Option<[Point; N]> {
    let values = s.read_float_array(name)?;
    if values.len() < N * 2 {
        return None;
    }
    let mut pts = [Point::ZERO; N];
    for (i, p) in pts.iter_mut().enumerate() {
        *p = Point::new(values[i * 2], values[i * 2 + 1]);
    }
    Some(pts)
}

pub(crate) fn save_rect(s: &mut dyn Storage, name: &str, rect: Rect) {
    s.write_float_array(name, &[rect.x0, rect.y0, rect.x1, rect.y1]);
}

pub(crate) fn load_rect(s: &mut dyn Storage, name: &str) -> Option<Rect> {
    read_floats::<4>(s, name).map(|v| Rect::new(v[0], v[1], v[2], v[3]))
}
