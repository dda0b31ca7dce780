//! The `select` command: picking, dragging and editing existing shapes.
//!
//! Dragging never touches the document directly. The selected shapes are
//! cloned when a touch begins, every move rebuilds the clones from the
//! originals and transforms them, and the touch end swaps the clones in
//! with [`ShapeList::update_shape`] only when their content differs.

use super::{CmdContext, Command, CommandParams};
use crate::camera::Camera;
use crate::config::SelectConfig;
use crate::doc::ShapeDoc;
use crate::input::{GestureState, Motion};
use crate::render::{HandleStyle, Surface};
use crate::selection::{
    BOX_HANDLE_COUNT, box_handle_point, hit_box_handle, move_box_handle, move_into_limits,
    rect_to_rect_transform, rotate_handle_point, rotation_angle, snap_rotation,
};
use crate::shapes::{
    DrawColor, DrawContext, Group, HitResult, LineStyle, Shape, ShapeFlags, ShapeId, ShapeKind,
    ShapeList, ShapeType, ZERO_TOL,
};
use crate::snap::{SnapEngine, SnapType};
use kurbo::{Affine, Point, Rect, Vec2};
use std::f64::consts::FRAC_PI_2;

/// Pick radius of the selection box handles.
const BOX_HANDLE_TOL_MM: f64 = 5.0;
/// A press-drag farther than this leaves copies behind instead of moving.
const CLONE_DRAG_MM: f64 = 5.0;
/// Smallest selection box side in display pixels.
const MIN_BOX_PX: f64 = 8.0;

/// What the current selection offers to context actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectState {
    None,
    OneShape,
    MultiShapes,
    /// Edit mode with a vertex of a polyline picked.
    Vertex,
    /// Edit mode without a picked vertex.
    Vertexes,
}

/// Shape type of the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectType {
    None,
    Single(ShapeType),
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Idle,
    Move,
    Vertex(usize),
    Scale { handle: usize, start_box: Rect },
    Rotate { start_box: Rect },
    /// Rubber band over empty space.
    Band,
}

/// The selection command.
#[derive(Debug, Clone)]
pub struct SelectCommand {
    options: SelectConfig,
    selected: Vec<ShapeId>,
    /// Most recently selected shape.
    id: ShapeId,
    hit: HitResult,
    /// Picked vertex of the current shape in edit mode.
    handle: Option<usize>,
    edit_mode: bool,
    clones: Vec<Shape>,
    drag: Drag,
    dragging: bool,
    start_pt: Point,
    band: Option<Rect>,
    /// Vertex inserted by a press-drag on a segment: `(index, point)`.
    inserted: Option<(usize, Point)>,
}

impl Default for SelectCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectCommand {
    pub const NAME: &'static str = "select";

    pub fn new() -> Self {
        Self {
            options: SelectConfig::default(),
            selected: Vec::new(),
            id: 0,
            hit: HitResult::miss(),
            handle: None,
            edit_mode: false,
            clones: Vec::new(),
            drag: Drag::Idle,
            dragging: false,
            start_pt: Point::ZERO,
            band: None,
            inserted: None,
        }
    }

    pub fn selected_ids(&self) -> &[ShapeId] {
        &self.selected
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// The most recently selected shape, 0 when nothing is selected.
    pub fn selected_id(&self) -> ShapeId {
        self.id
    }

    pub fn is_selected(&self, id: ShapeId) -> bool {
        self.selected.contains(&id)
    }

    pub fn hot_handle(&self) -> Option<usize> {
        self.handle
    }

    pub fn is_edit_mode(&self) -> bool {
        self.edit_mode && self.selected.len() == 1
    }

    fn current<'a>(&self, shapes: &'a ShapeList) -> Option<&'a Shape> {
        if self.selected.is_empty() {
            None
        } else {
            shapes.find_shape(self.id)
        }
    }

    fn select_only(&mut self, id: ShapeId, hit: HitResult) {
        self.selected.clear();
        if id != 0 {
            self.selected.push(id);
        }
        self.id = id;
        self.hit = hit;
        self.handle = None;
    }

    /// Drop selected ids that no longer exist. Returns true if any were dropped.
    pub fn sync_selection(&mut self, ctx: &mut CmdContext) -> bool {
        let shapes = ctx.doc.shapes();
        let before = self.selected.len();
        self.selected.retain(|id| shapes.contains(*id));
        if self.selected.len() == before {
            return false;
        }
        log::debug!("Dropped {} stale ids from the selection", before - self.selected.len());
        if !self.selected.contains(&self.id) {
            self.id = self.selected.last().copied().unwrap_or(0);
            self.handle = None;
        }
        self.clones.clear();
        self.drag = Drag::Idle;
        self.dragging = false;
        ctx.events.selection_changed();
        true
    }

    pub fn select_state(&self, shapes: &ShapeList) -> SelectState {
        if self.is_edit_mode() {
            let polyline = self.current(shapes).is_some_and(has_vertices);
            if self.handle.is_some() && polyline {
                SelectState::Vertex
            } else {
                SelectState::Vertexes
            }
        } else {
            match self.selected.len() {
                0 => SelectState::None,
                1 => SelectState::OneShape,
                _ => SelectState::MultiShapes,
            }
        }
    }

    pub fn select_type(&self, shapes: &ShapeList) -> SelectType {
        let mut ty = SelectType::None;
        for sp in self.selected.iter().filter_map(|id| shapes.find_shape(*id)) {
            match ty {
                SelectType::None => ty = SelectType::Single(sp.shape_type()),
                SelectType::Single(t) if t != sp.shape_type() => return SelectType::Mixed,
                _ => {}
            }
        }
        ty
    }

    /// Selection extent, inflated to a minimum on-screen size and kept
    /// inside the visible window. Empty when nothing is selected.
    pub fn bounding_box(&self, doc: &ShapeDoc, camera: &Camera) -> Rect {
        let shapes = doc.shapes();
        let Some(mut rect) = self
            .selected
            .iter()
            .filter_map(|id| shapes.find_shape(*id))
            .map(Shape::extent)
            .reduce(|a, b| a.union(b))
        else {
            return Rect::ZERO;
        };

        let min = camera.display_to_model_len(MIN_BOX_PX);
        if rect.width() < min {
            rect = rect.inflate(min / 2.0, 0.0);
        }
        if rect.height() < min {
            rect = rect.inflate(0.0, min / 2.0);
        }
        rect = rect.inflate(min / 8.0, min / 8.0);

        let window = camera.model_window();
        if window.area() <= 0.0 {
            return rect;
        }
        let mm = camera.display_mm_to_model(1.0);
        let view = window.inflate(-mm, -mm);
        let clamped = rect.intersect(view);
        let inner = rect.intersect(view.inflate(-12.0 * mm, -12.0 * mm));
        if inner.width() < 5.0 * mm || inner.height() < 5.0 * mm {
            clamped
        } else {
            inner
        }
    }

    fn can_select(&mut self, ctx: &CmdContext, sp: &Shape, pt: Point) -> bool {
        let tol = ctx.mm_to_model(self.options.hit_test_tol_mm);
        let res = sp.hit_test(pt, tol);
        let hit = res.dist <= tol || (sp.has_fill_color() && res.inside);
        if hit {
            self.hit = res;
        }
        hit || (self.is_edit_mode() && self.hit_test_handles(ctx, sp, pt).is_some())
    }

    fn hit_test_all(&self, ctx: &CmdContext, pt: Point) -> Option<(ShapeId, HitResult)> {
        let limits = ctx.mm_box(pt, self.options.hit_test_tol_mm);
        ctx.shapes().hit_test(limits, None)
    }

    /// Nearest movable handle of `sp` within the handle tolerance.
    fn hit_test_handles(&self, ctx: &CmdContext, sp: &Shape, pt: Point) -> Option<usize> {
        let tol = ctx.mm_to_model(self.options.handle_tol_mm);
        (0..sp.handle_count())
            .filter(|i| !sp.is_handle_fixed(*i))
            .map(|i| (i, sp.handle_point(i).distance(pt)))
            .filter(|(_, d)| *d < tol)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    fn box_drag_at(&self, ctx: &CmdContext, pt: Point) -> Option<Drag> {
        if self.is_edit_mode() || self.selected.is_empty() {
            return None;
        }
        let first = ctx.shapes().find_shape(self.selected[0])?;
        let start_box = self.bounding_box(&*ctx.doc, ctx.camera);
        if start_box.area() <= 0.0 {
            return None;
        }
        let tol = ctx.mm_to_model(BOX_HANDLE_TOL_MM);
        let mut best = None;
        let mut best_dist = tol;
        if can_scale(first) {
            if let Some(handle) = hit_box_handle(start_box, pt, tol, ctx.mm_to_model(1.0)) {
                best_dist = box_handle_point(start_box, handle).distance(pt);
                best = Some(Drag::Scale { handle, start_box });
            }
        }
        if self.options.can_rotate_handle && can_rotate(first) {
            let offset = ctx.mm_to_model(self.options.rotate_handle_offset_mm);
            if rotate_handle_point(start_box, offset).distance(pt) < best_dist {
                best = Some(Drag::Rotate { start_box });
            }
        }
        best
    }

    fn clone_shapes(&mut self, shapes: &ShapeList) {
        self.clones = self
            .selected
            .iter()
            .filter_map(|id| shapes.find_shape(*id))
            .cloned()
            .collect();
    }

    /// Rebuild every clone from its original.
    fn reset_clones(&mut self, shapes: &ShapeList) {
        for clone in &mut self.clones {
            if let Some(sp) = shapes.find_shape(clone.id()) {
                *clone = sp.clone();
            }
        }
        if let (Some((index, pt)), Some(clone)) = (self.inserted, self.clones.first_mut()) {
            if let Some((points, _)) = vertices_mut(clone) {
                points.insert(index, pt);
            }
        }
    }

    /// Commit or discard the clones.
    ///
    /// With `apply` the clones replace their originals as one edit when any
    /// of them differs; with `add_new` they are added as new shapes instead.
    /// Returns true if there were clones.
    fn apply_clones(&mut self, ctx: &mut CmdContext, apply: bool, add_new: bool) -> bool {
        let clones = std::mem::take(&mut self.clones);
        if clones.is_empty() {
            return false;
        }
        let shapes = ctx.doc.shapes();
        let changed = apply
            && !ctx.doc.is_read_only()
            && clones
                .iter()
                .any(|c| shapes.find_shape(c.id()).is_some_and(|old| !old.equals(c)));
        if !changed {
            ctx.events.redraw();
            return true;
        }

        if add_new {
            self.selected.clear();
            self.id = 0;
            for clone in &clones {
                let id = ctx.add_shape(clone);
                if id != 0 {
                    self.selected.push(id);
                    self.id = id;
                }
            }
            ctx.events.selection_changed();
        } else {
            let shapes = ctx.doc.shapes_mut();
            for clone in clones {
                let differs = shapes.find_shape(clone.id()).is_some_and(|old| !old.equals(&clone));
                if differs {
                    shapes.update_shape(clone);
                }
            }
            ctx.events.shapes_changed();
        }
        true
    }

    /// Smallest snap correction over the handles of `sp`.
    fn snap_offset(ctx: &mut CmdContext, sp: &Shape, ignore: &[ShapeId]) -> Option<(Point, Vec2)> {
        let mut best: Option<(Point, Vec2)> = None;
        for i in 0..sp.handle_count() {
            let hp = sp.handle_point(i);
            let to = ctx.snap_point(hp, None, None, ignore);
            if ctx.snap.snapped_type() == SnapType::None {
                continue;
            }
            let v = to - hp;
            if best.is_none_or(|(_, b)| v.hypot() < b.hypot()) {
                best = Some((hp, v));
            }
        }
        best
    }

    fn move_clones(&mut self, ctx: &mut CmdContext, delta: Vec2) {
        let segment = if self.is_edit_mode() { self.hit.segment } else { -1 };
        for clone in &mut self.clones {
            if !clone.is_locked() {
                clone.offset(delta, segment);
            }
        }

        let ignore = self.selected.clone();
        let mut best: Option<(Point, Vec2)> = None;
        for clone in self.clones.iter().filter(|c| !c.is_locked()) {
            if let Some((from, v)) = Self::snap_offset(ctx, clone, &ignore) {
                if best.is_none_or(|(_, b)| v.hypot() < b.hypot()) {
                    best = Some((from, v));
                }
            }
        }
        match best {
            Some((from, v)) => {
                // Leave the engine showing the snap that won.
                ctx.snap_point(from, None, None, &ignore);
                for clone in self.clones.iter_mut().filter(|c| !c.is_locked()) {
                    clone.offset(v, segment);
                }
            }
            None => ctx.snap.clear_snap(),
        }
    }

    fn keep_in_page(&mut self, page: Rect) {
        if page.area() <= 0.0 {
            return;
        }
        for clone in &mut self.clones {
            let v = move_into_limits(clone.extent(), page);
            if v != Vec2::ZERO {
                clone.offset(v, -1);
            }
        }
    }

    fn band_select(&mut self, ctx: &mut CmdContext, rect: Rect) {
        self.selected = ctx
            .shapes()
            .iter()
            .filter(|sp| !sp.is_locked() && sp.hit_test_box(rect))
            .map(Shape::id)
            .collect();
        self.id = self.selected.last().copied().unwrap_or(0);
        self.hit = HitResult::miss();
        self.band = Some(rect);
        ctx.events.redraw();
    }

    pub fn select_all(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        let old = self.selected.len();
        self.clones.clear();
        self.selected = ctx.shapes().ids().to_vec();
        self.id = self.selected.last().copied().unwrap_or(0);
        self.handle = None;
        self.inserted = None;
        self.hit = HitResult::miss();
        if old != self.selected.len() || !self.selected.is_empty() {
            ctx.events.selection_changed();
        }
        self.long_press(ctx, m);
        old != self.selected.len()
    }

    /// Delete the selected shapes except locked ones, as one edit.
    pub fn delete_selection(&mut self, ctx: &mut CmdContext) -> usize {
        if ctx.doc.is_read_only() || self.selected.is_empty() {
            return 0;
        }
        self.clones.clear();
        let shapes = ctx.doc.shapes_mut();
        let mut deleted = Vec::new();
        for id in &self.selected {
            if shapes.find_shape(*id).is_some_and(|sp| !sp.is_locked()) && shapes.remove_shape(*id).is_some() {
                deleted.push(*id);
            }
        }
        self.selected.clear();
        self.id = 0;
        self.handle = None;
        if !deleted.is_empty() {
            log::debug!("Deleted {} selected shapes", deleted.len());
            ctx.events.shapes_deleted(&deleted);
            ctx.events.selection_changed();
        }
        deleted.len()
    }

    /// Move the selected shapes into a new group placed on top.
    pub fn group_selection(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.selected.len() < 2 || ctx.doc.is_read_only() {
            return false;
        }
        self.clones.clear();
        let ids: Vec<ShapeId> = ctx
            .shapes()
            .ids()
            .iter()
            .copied()
            .filter(|id| self.selected.contains(id))
            .collect();
        let shapes = ctx.doc.shapes_mut();
        let mut members = ShapeList::new();
        for id in &ids {
            shapes.move_shape_to(*id, &mut members);
        }
        if members.is_empty() {
            return false;
        }
        let mut group = Shape::new(ShapeKind::Group(Group::from_list(members)));
        group.reset_change_count(1);
        let id = shapes.add_shape_direct(group);

        ctx.events.shapes_changed();
        ctx.events.deleted.extend_from_slice(&ids);
        ctx.events.added.push(id);
        self.select_only(id, HitResult::miss());
        ctx.events.selection_changed();
        self.long_press(ctx, m);
        true
    }

    /// Replace selected groups by their members, which become the selection.
    pub fn ungroup_selection(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if ctx.doc.is_read_only() {
            return false;
        }
        self.clones.clear();
        let groups: Vec<Shape> = self
            .selected
            .iter()
            .filter_map(|id| ctx.shapes().find_shape(*id))
            .filter(|sp| sp.as_group().is_some() && !sp.is_locked())
            .cloned()
            .collect();
        if groups.is_empty() {
            return false;
        }

        let shapes = ctx.doc.shapes_mut();
        let mut members = Vec::new();
        for sp in &groups {
            if let Some(group) = sp.as_group() {
                for child in group.shapes().iter() {
                    members.push(shapes.add_shape(child));
                }
            }
            shapes.remove_shape(sp.id());
        }
        ctx.events.shapes_changed();
        ctx.events.deleted.extend(groups.iter().map(Shape::id));
        ctx.events.added.extend_from_slice(&members);

        self.id = members.last().copied().unwrap_or(0);
        self.selected = members;
        self.handle = None;
        ctx.events.selection_changed();
        self.long_press(ctx, m);
        true
    }

    /// Add offset copies of the selection; the copies become the selection.
    pub fn clone_selection(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if ctx.doc.is_read_only() {
            return false;
        }
        self.clone_shapes(ctx.doc.shapes());
        if self.clones.is_empty() {
            return false;
        }
        let d = ctx.mm_to_model(self.options.clone_offset_mm);
        for clone in &mut self.clones {
            clone.offset(Vec2::new(d, d), -1);
        }
        let added = self.apply_clones(ctx, true, true) && !self.selected.is_empty();
        if added {
            self.long_press(ctx, m);
        }
        added
    }

    pub fn reset_selection(&mut self, ctx: &mut CmdContext) {
        let had = !self.selected.is_empty();
        self.apply_clones(ctx, false, false);
        self.select_only(0, HitResult::miss());
        if had {
            ctx.events.selection_changed();
        }
    }

    pub fn add_selection(&mut self, ctx: &mut CmdContext, id: ShapeId) -> bool {
        if !ctx.shapes().contains(id) {
            return false;
        }
        if !self.is_selected(id) {
            self.selected.push(id);
            self.id = id;
            self.hit = HitResult::miss();
            ctx.events.selection_changed();
        }
        true
    }

    /// Replace the current shape by an edited copy, as one document edit.
    /// Locked shapes are left alone.
    fn edit_current(&mut self, ctx: &mut CmdContext, edit: impl FnOnce(&mut Shape) -> bool) -> bool {
        if ctx.doc.is_read_only() {
            return false;
        }
        let Some(mut sp) = self.current(ctx.shapes()).cloned() else {
            return false;
        };
        if sp.is_locked() || !edit(&mut sp) {
            return false;
        }
        ctx.doc.shapes_mut().update_shape(sp);
        ctx.events.shapes_changed();
        true
    }

    pub fn delete_vertex(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        let Some(index) = self.handle else {
            return false;
        };
        let done = self.edit_current(ctx, |sp| {
            let min = if sp.is_closed() { 3 } else { 2 };
            match vertices_mut(sp) {
                Some((points, _)) if index < points.len() && points.len() > min => {
                    points.remove(index);
                    true
                }
                _ => false,
            }
        });
        if done {
            self.handle = None;
        }
        self.inserted = None;
        self.long_press(ctx, m);
        done
    }

    /// Insert a vertex at the last hit point of the current polyline.
    pub fn insert_vertex(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if !self.is_edit_mode() || self.hit.segment < 0 {
            return false;
        }
        let segment = self.hit.segment as usize;
        let pt = self.hit.nearpt;
        let min_dist = ctx.mm_to_model(1.0);
        let done = self.edit_current(ctx, |sp| match vertices_mut(sp) {
            Some((points, _)) if segment < points.len() && points[segment].distance(pt) > min_dist => {
                points.insert(segment + 1, pt);
                true
            }
            _ => false,
        });
        if done {
            self.handle = Some(segment + 1);
        }
        self.inserted = None;
        self.long_press(ctx, m);
        done
    }

    /// Toggle the current polyline between open and closed.
    pub fn switch_closed(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        let done = self.edit_current(ctx, |sp| match vertices_mut(sp) {
            Some((points, closed)) if points.len() > 2 || *closed => {
                *closed = !*closed;
                true
            }
            _ => false,
        });
        if done {
            self.long_press(ctx, m);
        }
        done
    }

    /// Mirror the current shape left to right about its visible center.
    pub fn overturn_polygon(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        let window = ctx.camera.model_window();
        let done = self.edit_current(ctx, |sp| {
            let extent = sp.extent();
            let visible = if window.area() > 0.0 { extent.intersect(window) } else { extent };
            if visible.area() <= 0.0 {
                return false;
            }
            let cx = visible.center().x;
            sp.transform(
                Affine::translate(Vec2::new(cx, 0.0))
                    * Affine::scale_non_uniform(-1.0, 1.0)
                    * Affine::translate(Vec2::new(-cx, 0.0)),
            );
            true
        });
        if done {
            self.long_press(ctx, m);
        }
        done
    }

    pub fn is_fixed_length(&self, shapes: &ShapeList) -> bool {
        self.current(shapes)
            .is_some_and(|sp| sp.flags.contains(ShapeFlags::FIXED_LENGTH))
    }

    pub fn is_locked(&self, shapes: &ShapeList) -> bool {
        self.current(shapes).is_some_and(Shape::is_locked)
    }

    /// Set a flag on every selected shape. Returns the number changed.
    fn set_flag(&mut self, ctx: &mut CmdContext, flag: ShapeFlags, on: bool) -> usize {
        if ctx.doc.is_read_only() {
            return 0;
        }
        let shapes = ctx.doc.shapes_mut();
        let mut count = 0;
        for id in &self.selected {
            let Some(mut sp) = shapes.find_shape(*id).cloned() else {
                continue;
            };
            if sp.flags.contains(flag) != on {
                sp.flags.set(flag, on);
                shapes.update_shape(sp);
                count += 1;
            }
        }
        if count > 0 {
            ctx.events.shapes_changed();
        }
        count
    }

    pub fn set_fixed_length(&mut self, ctx: &mut CmdContext, m: &Motion, fixed: bool) -> bool {
        let changed = self.set_flag(ctx, ShapeFlags::FIXED_LENGTH, fixed) > 0;
        if changed {
            self.long_press(ctx, m);
        }
        changed
    }

    pub fn set_locked(&mut self, ctx: &mut CmdContext, m: &Motion, locked: bool) -> bool {
        let changed = self.set_flag(ctx, ShapeFlags::LOCKED, locked) > 0;
        if changed {
            self.long_press(ctx, m);
        }
        changed
    }

    pub fn set_edit_mode(&mut self, ctx: &mut CmdContext, m: &Motion, edit_mode: bool) -> bool {
        self.edit_mode = edit_mode;
        self.handle = None;
        ctx.events.redraw();
        self.long_press(ctx, m);
        true
    }

    fn draw_style() -> DrawContext {
        DrawContext {
            line_width: 0.0,
            line_style: LineStyle::Dash,
            line_color: DrawColor::new(0, 120, 215, 180),
            fill_color: DrawColor::TRANSPARENT,
        }
    }
}

fn can_scale(sp: &Shape) -> bool {
    !sp.is_locked()
        && !sp.flags.contains(ShapeFlags::FIXED_LENGTH)
        && !sp.flags.contains(ShapeFlags::FIXED_SIZE)
}

fn can_rotate(sp: &Shape) -> bool {
    !sp.is_locked() && !sp.flags.contains(ShapeFlags::ROTATE_DISABLED)
}

fn has_vertices(sp: &Shape) -> bool {
    matches!(sp.kind, ShapeKind::Lines(_) | ShapeKind::Splines(_))
}

fn vertices_mut(sp: &mut Shape) -> Option<(&mut Vec<Point>, &mut bool)> {
    match &mut sp.kind {
        ShapeKind::Lines(l) => Some((&mut l.points, &mut l.closed)),
        ShapeKind::Splines(s) => Some((&mut s.points, &mut s.closed)),
        _ => None,
    }
}

/// One-axis stretch for a pinch whose fingers started nearly level or
/// nearly plumb, on shapes that cannot rotate. Translation is ignored.
fn axis_scale(m: &Motion, rotatable: bool) -> Option<Affine> {
    if rotatable {
        return None;
    }
    let a = (m.start_pt2_m - m.start_pt_m).atan2().abs() / FRAC_PI_2;
    if (a - a.round()).abs() >= 0.3 {
        return None;
    }
    let vertical = a.round() as i32 % 2 == 1;
    let d0 = m.start_pt2_m - m.start_pt_m;
    let d1 = m.point2_m - m.point_m;
    let ratio = |from: f64, to: f64| {
        if from.abs() < ZERO_TOL || to.abs() < ZERO_TOL { 1.0 } else { to.abs() / from.abs() }
    };
    Some(if vertical {
        Affine::scale_non_uniform(1.0, ratio(d0.y, d1.y))
    } else {
        Affine::scale_non_uniform(ratio(d0.x, d1.x), 1.0)
    })
}

fn about(center: Point, affine: Affine) -> Affine {
    Affine::translate(center.to_vec2()) * affine * Affine::translate(-center.to_vec2())
}

impl Command for SelectCommand {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, ctx: &mut CmdContext, params: &CommandParams) -> bool {
        self.options = ctx.config.select.clone();
        self.clones.clear();
        self.drag = Drag::Idle;
        self.dragging = false;
        self.band = None;
        self.edit_mode = false;

        let id = params.id.or(ctx.events.new_shape_id.take()).unwrap_or(0);
        if id != 0 && ctx.shapes().contains(id) {
            self.select_only(id, HitResult::miss());
            ctx.events.selection_changed();
            ctx.events.show_actions = true;
        } else {
            self.sync_selection(ctx);
        }
        true
    }

    /// Back out of up to three levels: drag, edit mode, selection.
    fn cancel(&mut self, ctx: &mut CmdContext) -> bool {
        let mut any = false;
        for _ in 0..3 {
            if !self.back_step(ctx) {
                break;
            }
            any = true;
        }
        any
    }

    fn back_step(&mut self, ctx: &mut CmdContext) -> bool {
        if !self.clones.is_empty() {
            self.clones.clear();
            self.drag = Drag::Idle;
            self.dragging = false;
            self.inserted = None;
            ctx.snap.clear_snap();
            ctx.events.redraw();
            return true;
        }
        if self.edit_mode {
            self.edit_mode = false;
            self.handle = None;
            ctx.events.redraw();
            return true;
        }
        if !self.selected.is_empty() {
            self.select_only(0, HitResult::miss());
            ctx.events.selection_changed();
            return true;
        }
        false
    }

    fn draw(&self, doc: &ShapeDoc, camera: &Camera, snap: &SnapEngine, surface: &mut dyn Surface) -> bool {
        let shapes = doc.shapes();
        let style = Self::draw_style();
        let mut drawn = false;

        if self.dragging {
            for clone in &self.clones {
                clone.draw(surface);
                drawn = true;
            }
        }
        if let Some(band) = self.band {
            surface.draw_rect(&style, band);
            drawn = true;
        }

        let live: Vec<&Shape> = self.selected.iter().filter_map(|id| shapes.find_shape(*id)).collect();
        if let Some(first) = live.first() {
            if self.is_edit_mode() {
                let sp = self
                    .clones
                    .first()
                    .filter(|_| self.dragging)
                    .unwrap_or(first);
                for i in (0..sp.handle_count()).filter(|i| !sp.is_handle_fixed(*i)) {
                    let style = if Some(i) == self.handle { HandleStyle::Snap } else { HandleStyle::Vertex };
                    surface.draw_handle(sp.handle_point(i), style);
                }
            } else if !self.dragging {
                let rect = self.bounding_box(doc, camera);
                surface.draw_rect(&style, rect);
                if can_scale(first) {
                    for i in 0..BOX_HANDLE_COUNT {
                        surface.draw_handle(box_handle_point(rect, i), HandleStyle::Node);
                    }
                }
                if self.options.can_rotate_handle && can_rotate(first) {
                    let offset = camera.display_mm_to_model(self.options.rotate_handle_offset_mm);
                    surface.draw_handle(rotate_handle_point(rect, offset), HandleStyle::Rotate);
                }
            }
            drawn = true;
        }
        snap.draw_snap(surface) || drawn
    }

    fn gather_shapes(&self, shapes: &mut ShapeList) -> usize {
        if !self.dragging {
            return 0;
        }
        for clone in &self.clones {
            shapes.add_shape(clone);
        }
        self.clones.len()
    }

    fn click(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.sync_selection(ctx);
        if m.press_drag {
            return false;
        }
        self.apply_clones(ctx, false, false);
        self.inserted = None;
        let pt = m.point_m;

        let again = self.selected.len() == 1
            && match ctx.shapes().find_shape(self.id).cloned() {
                Some(sp) => self.can_select(ctx, &sp, pt),
                None => false,
            };
        if again {
            self.handle = match self.current(ctx.shapes()) {
                Some(sp) if self.is_edit_mode() => self.hit_test_handles(ctx, sp, pt),
                _ => None,
            };
        } else {
            let (id, hit) = self.hit_test_all(ctx, pt).unwrap_or((0, HitResult::miss()));
            let changed = self.selected.len() != usize::from(id != 0) || id != self.id;
            self.select_only(id, hit);
            if changed {
                log::debug!("Selected shape #{}", id);
                ctx.events.selection_changed();
            }
        }
        ctx.events.redraw();
        ctx.events.show_actions = true;
        true
    }

    fn double_click(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.selected.len() != 1 {
            return self.long_press(ctx, m);
        }
        let edit = !self.is_edit_mode();
        self.set_edit_mode(ctx, m, edit)
    }

    fn long_press(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.selected.is_empty() {
            self.click(ctx, m);
        }
        if self.handle.is_some() {
            self.handle = match self.current(ctx.shapes()) {
                Some(sp) => self.hit_test_handles(ctx, sp, m.point_m),
                None => None,
            };
        }
        ctx.events.show_actions = true;
        ctx.events.redraw();
        true
    }

    fn touch_began(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.sync_selection(ctx);
        let pt = m.start_pt_m;

        if !m.switch_gesture {
            if let Some((id, hit)) = self.hit_test_all(ctx, pt) {
                let keep = match self.current(ctx.shapes()).cloned() {
                    Some(old) if self.selected.len() == 1 => self.can_select(ctx, &old, pt),
                    _ => false,
                };
                if id != self.id && !keep {
                    self.select_only(id, hit);
                    log::debug!("Selected shape #{} on touch", id);
                    ctx.events.selection_changed();
                }
            }
        }

        self.dragging = false;
        self.inserted = None;
        self.band = None;
        self.start_pt = pt;
        if !ctx.doc.is_read_only() {
            self.clone_shapes(ctx.doc.shapes());
        } else {
            self.clones.clear();
        }

        self.drag = if self.clones.is_empty() {
            if self.selected.is_empty() { Drag::Band } else { Drag::Idle }
        } else if self.is_edit_mode() {
            let sp = self.clones[0].clone();
            self.can_select(ctx, &sp, pt);
            match self.hit_test_handles(ctx, &sp, pt) {
                Some(h) => {
                    self.handle = Some(h);
                    self.start_pt = sp.handle_point(h);
                    Drag::Vertex(h)
                }
                None if m.press_drag && !sp.is_locked() && has_vertices(&sp) && self.hit.segment >= 0 => {
                    let index = self.hit.segment as usize + 1;
                    self.inserted = Some((index, self.hit.nearpt));
                    self.handle = Some(index);
                    self.start_pt = self.hit.nearpt;
                    Drag::Vertex(index)
                }
                None => Drag::Move,
            }
        } else {
            self.box_drag_at(ctx, pt).unwrap_or(Drag::Move)
        };
        ctx.events.redraw();
        true
    }

    fn touch_moved(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        let pt = m.point_m;
        if !self.dragging {
            self.dragging = pt.distance(m.start_pt_m) > ctx.mm_to_model(self.options.drag_threshold_mm);
            if !self.dragging {
                ctx.events.redraw();
                return true;
            }
        }

        if self.drag == Drag::Band {
            self.band_select(ctx, Rect::from_points(m.start_pt_m, pt));
            return true;
        }
        self.reset_clones(ctx.doc.shapes());

        match self.drag {
            Drag::Move => self.move_clones(ctx, pt - self.start_pt),
            Drag::Vertex(h) => {
                let tol = ctx.mm_to_model(3.0);
                if let Some(clone) = self.clones.first_mut().filter(|c| !c.is_locked()) {
                    let ignore = [clone.id()];
                    let snapped = ctx.snap_point(pt, Some(&*clone), Some(h), &ignore);
                    clone.set_handle_point(h, snapped, tol);
                }
            }
            Drag::Scale { handle, start_box } => {
                let new_box = move_box_handle(start_box, handle, pt, false);
                if let Some(affine) = rect_to_rect_transform(start_box, new_box) {
                    for clone in self.clones.iter_mut().filter(|c| can_scale(c)) {
                        clone.transform(affine);
                    }
                }
            }
            Drag::Rotate { start_box } => {
                let center = start_box.center();
                let offset = ctx.mm_to_model(self.options.rotate_handle_offset_mm);
                let from = rotate_handle_point(start_box, offset);
                let angle = snap_rotation(rotation_angle(center, from, pt));
                for clone in self.clones.iter_mut().filter(|c| can_rotate(c)) {
                    clone.transform(Affine::rotate_about(angle, center));
                }
            }
            Drag::Idle | Drag::Band => {}
        }
        self.keep_in_page(ctx.doc.page_extent);
        ctx.events.redraw();
        true
    }

    fn touch_ended(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        let pt = m.point_m;
        if let Some((_, inserted)) = self.inserted {
            // Dropping a new vertex back where it was created cancels it.
            if pt.distance(inserted) < ctx.mm_to_model(5.0) {
                self.clones.clear();
                self.handle = None;
            }
        }

        let clone_drag = !self.is_edit_mode()
            && self.drag == Drag::Move
            && m.press_drag
            && pt.distance(m.start_pt_m) > ctx.mm_to_model(CLONE_DRAG_MM);
        self.apply_clones(ctx, self.dragging, clone_drag);
        ctx.snap.clear_snap();

        if let Drag::Vertex(h) = self.drag {
            self.handle = self.current(ctx.shapes()).and_then(|sp| {
                if h < sp.handle_count() { Some(h) } else { None }
            });
        }
        if self.drag == Drag::Band {
            self.band = None;
            if !self.selected.is_empty() {
                ctx.events.selection_changed();
            }
        }
        self.inserted = None;
        self.drag = Drag::Idle;
        self.dragging = false;

        if !m.switch_gesture {
            self.long_press(ctx, m);
        }
        true
    }

    fn two_fingers_move(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        let dist = m.distance_m();
        match m.gesture_state {
            GestureState::Possible => !self.selected.is_empty() && dist > f64::EPSILON,
            GestureState::Began => {
                if self.selected.is_empty() || ctx.doc.is_read_only() {
                    return false;
                }
                self.clone_shapes(ctx.doc.shapes());
                self.dragging = true;
                self.clones.len() == self.selected.len() && dist > f64::EPSILON
            }
            GestureState::Moved if dist > f64::EPSILON => {
                self.reset_clones(ctx.doc.shapes());
                let start_dist = m.start_distance_m();
                let a0 = (m.start_pt2_m - m.start_pt_m).atan2();
                for clone in self.clones.iter_mut().filter(|c| !c.is_locked()) {
                    let mut affine = Affine::translate(m.point_m - m.start_pt_m);
                    if can_scale(clone) && start_dist > f64::EPSILON {
                        affine = match axis_scale(m, can_rotate(clone)) {
                            Some(scale) => about(m.start_center_m(), scale),
                            None => about(m.point_m, Affine::scale(dist / start_dist)) * affine,
                        };
                    }
                    if can_rotate(clone) {
                        // Whole degrees only.
                        let turn = ((m.point2_m - m.point_m).atan2() - a0).to_degrees().round();
                        affine = Affine::rotate_about(turn.to_radians(), m.point_m) * affine;
                    }
                    clone.transform(affine);
                }
                if self.clones.len() == 1 {
                    let ignore = self.selected.clone();
                    if let Some((from, v)) = Self::snap_offset(ctx, &self.clones[0], &ignore) {
                        ctx.snap_point(from, None, None, &ignore);
                        self.clones[0].offset(v, -1);
                    }
                }
                ctx.events.redraw();
                true
            }
            GestureState::Moved => true,
            GestureState::Ended | GestureState::Cancel => {
                self.apply_clones(ctx, m.gesture_state == GestureState::Ended, false);
                self.dragging = false;
                ctx.snap.clear_snap();
                if !m.switch_gesture {
                    self.long_press(ctx, m);
                }
                true
            }
        }
    }

    fn as_select(&self) -> Option<&SelectCommand> {
        Some(self)
    }

    fn as_select_mut(&mut self) -> Option<&mut SelectCommand> {
        Some(self)
    }
}
