//! Drawing commands: line, dot, framed shapes, parallelogram, polylines and freehand.

use super::draw::DrawState;
use super::manager::CommandFactory;
use super::{CmdContext, Command, CommandParams};
use crate::camera::Camera;
use crate::doc::ShapeDoc;
use crate::input::Motion;
use crate::render::Surface;
use crate::shapes::{
    BaseRect, DrawColor, DrawContext, LineStyle, RectKind, Shape, ShapeKind, ShapeList, ShapeType,
    Splines,
};
use crate::snap::SnapEngine;
use kurbo::{Point, Rect};

/// Feed `points` to a command as began/ended pairs.
fn seed_points(cmd: &mut dyn Command, ctx: &mut CmdContext, params: &CommandParams) {
    let points = params.model_points();
    if points.len() < 2 {
        return;
    }
    let scale = ctx.mm_to_model(1.0);
    for pair in points.chunks(2) {
        let mut m = Motion::at_model(pair[0], scale);
        cmd.touch_began(ctx, &m);
        m.move_to_model(*pair.last().unwrap_or(&pair[0]));
        cmd.touch_ended(ctx, &m);
    }
}

/// Draws a line segment in one drag.
#[derive(Debug)]
pub struct DrawLine {
    state: DrawState,
}

impl DrawLine {
    pub fn new() -> Self {
        Self {
            state: DrawState::new(Shape::from_type(ShapeType::Line)),
        }
    }

    fn set_end(&mut self, ctx: &mut CmdContext, m: &Motion) {
        let pt = self.state.snap_point(ctx, m, false);
        self.state.shape.geom_mut().set_point(1, pt);
    }
}

impl Command for DrawLine {
    fn name(&self) -> &str {
        "line"
    }

    fn initialize(&mut self, ctx: &mut CmdContext, params: &CommandParams) -> bool {
        self.state.reset(ctx, "line");
        seed_points(self, ctx, params);
        true
    }

    fn cancel(&mut self, ctx: &mut CmdContext) -> bool {
        self.state.cancel(ctx)
    }

    fn back_step(&mut self, ctx: &mut CmdContext) -> bool {
        self.state.back_step(ctx)
    }

    fn draw(&self, _doc: &ShapeDoc, _camera: &Camera, snap: &SnapEngine, surface: &mut dyn Surface) -> bool {
        self.state.draw(snap, surface)
    }

    fn gather_shapes(&self, shapes: &mut ShapeList) -> usize {
        self.state.gather_shapes(shapes)
    }

    fn click(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.step == 0 && self.state.click_idle(ctx, m, "line")
    }

    fn touch_began(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.step = 1;
        let pt = self.state.snap_point(ctx, m, true);
        self.state.set_step_point(0, pt);
        self.state.shape.context = ctx.doc.context.clone();
        ctx.events.redraw();
        true
    }

    fn touch_moved(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.state.step == 0 {
            return false;
        }
        self.set_end(ctx, m);
        ctx.events.redraw();
        true
    }

    fn touch_ended(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.state.step == 0 {
            return false;
        }
        self.set_end(ctx, m);
        let tol = ctx.mm_to_model(ctx.config.draw.min_length_mm);
        let long_enough = match &self.state.shape.kind {
            ShapeKind::Line(line) => line.length() > tol,
            _ => false,
        };
        if long_enough {
            self.state.commit(ctx);
        }
        self.state.step = 0;
        self.state.touch_ended(ctx)
    }

    fn is_drawing_command(&self) -> bool {
        true
    }
}

/// Places a dot on release.
#[derive(Debug)]
pub struct DrawDot {
    state: DrawState,
}

impl DrawDot {
    pub fn new() -> Self {
        Self {
            state: DrawState::new(Shape::from_type(ShapeType::Dot)),
        }
    }

    fn follow(&mut self, ctx: &mut CmdContext, m: &Motion, first_step: bool) {
        let pt = self.state.snap_point(ctx, m, first_step);
        self.state.shape.geom_mut().set_point(0, pt);
    }
}

impl Command for DrawDot {
    fn name(&self) -> &str {
        "dot"
    }

    fn initialize(&mut self, ctx: &mut CmdContext, params: &CommandParams) -> bool {
        self.state.reset(ctx, "dot");
        seed_points(self, ctx, params);
        true
    }

    fn cancel(&mut self, ctx: &mut CmdContext) -> bool {
        self.state.cancel(ctx)
    }

    fn draw(&self, _doc: &ShapeDoc, _camera: &Camera, snap: &SnapEngine, surface: &mut dyn Surface) -> bool {
        self.state.draw(snap, surface)
    }

    fn gather_shapes(&self, shapes: &mut ShapeList) -> usize {
        self.state.gather_shapes(shapes)
    }

    fn click(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.touch_began(ctx, m) && self.touch_ended(ctx, m)
    }

    fn touch_began(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.step = 1;
        self.state.shape.context = ctx.doc.context.clone();
        self.follow(ctx, m, true);
        ctx.events.redraw();
        true
    }

    fn touch_moved(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.state.step == 0 {
            return false;
        }
        self.follow(ctx, m, false);
        ctx.events.redraw();
        true
    }

    fn touch_ended(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.state.step == 0 {
            return false;
        }
        self.follow(ctx, m, false);
        self.state.commit(ctx);
        self.state.step = 0;
        self.state.touch_ended(ctx)
    }

    fn is_drawing_command(&self) -> bool {
        true
    }
}

/// Drags out a rectangle frame: rect, square, ellipse, circle or diamond.
#[derive(Debug)]
pub struct DrawRect {
    name: &'static str,
    square: bool,
    state: DrawState,
    start: Point,
}

impl DrawRect {
    pub fn new(name: &'static str, kind: RectKind, square: bool) -> Self {
        let mut frame = BaseRect::new(kind);
        frame.square = square;
        Self {
            name,
            square,
            state: DrawState::new(Shape::new(ShapeKind::Rect(frame))),
            start: Point::ZERO,
        }
    }

    /// Frame from the start point to `pt`, squared when required.
    fn frame_to(&self, pt: Point) -> Rect {
        if !self.square {
            return Rect::from_points(self.start, pt);
        }
        let d = pt - self.start;
        let side = d.x.abs().max(d.y.abs());
        let sx = if d.x < 0.0 { -1.0 } else { 1.0 };
        let sy = if d.y < 0.0 { -1.0 } else { 1.0 };
        Rect::from_points(self.start, self.start + kurbo::Vec2::new(side * sx, side * sy))
    }

    fn follow(&mut self, ctx: &mut CmdContext, m: &Motion) {
        // The frame's own handles move with the pointer and are not snap targets.
        let pt = ctx.snap_point(m.point_m, None, None, &[]);
        let rect = self.frame_to(pt);
        if let ShapeKind::Rect(frame) = &mut self.state.shape.kind {
            frame.set_rect(rect);
        }
    }
}

impl Command for DrawRect {
    fn name(&self) -> &str {
        self.name
    }

    fn initialize(&mut self, ctx: &mut CmdContext, params: &CommandParams) -> bool {
        self.state.reset(ctx, self.name);
        seed_points(self, ctx, params);
        true
    }

    fn cancel(&mut self, ctx: &mut CmdContext) -> bool {
        self.state.cancel(ctx)
    }

    fn draw(&self, _doc: &ShapeDoc, _camera: &Camera, snap: &SnapEngine, surface: &mut dyn Surface) -> bool {
        if self.state.is_active() {
            if let ShapeKind::Rect(frame) = &self.state.shape.kind {
                if frame.kind != RectKind::Rect {
                    let guide = DrawContext {
                        line_width: 0.0,
                        line_style: LineStyle::Dash,
                        line_color: DrawColor::new(0, 0, 255, 128),
                        fill_color: DrawColor::TRANSPARENT,
                    };
                    surface.draw_rect(&guide, self.state.shape.extent());
                }
            }
        }
        self.state.draw(snap, surface)
    }

    fn gather_shapes(&self, shapes: &mut ShapeList) -> usize {
        self.state.gather_shapes(shapes)
    }

    fn click(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.step == 0 && self.state.click_idle(ctx, m, self.name)
    }

    fn touch_began(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.step = 1;
        self.state.shape.context = ctx.doc.context.clone();
        self.start = self.state.snap_point(ctx, m, true);
        let start = self.start;
        if let ShapeKind::Rect(frame) = &mut self.state.shape.kind {
            frame.set_rect(Rect::from_points(start, start));
        }
        ctx.events.redraw();
        true
    }

    fn touch_moved(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.state.step == 0 {
            return false;
        }
        self.follow(ctx, m);
        ctx.events.redraw();
        true
    }

    fn touch_ended(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.state.step == 0 {
            return false;
        }
        self.follow(ctx, m);
        let tol = ctx.mm_to_model(ctx.config.draw.min_length_mm);
        let ext = self.state.shape.geom().extent();
        if ext.width() > tol || ext.height() > tol {
            self.state.commit(ctx);
        } else {
            self.state.shape.geom_mut().clear();
        }
        self.state.step = 0;
        self.state.touch_ended(ctx)
    }

    fn is_drawing_command(&self) -> bool {
        true
    }
}

/// Parallelogram from three corners, placed one drag at a time.
#[derive(Debug)]
pub struct DrawParallel {
    state: DrawState,
}

impl DrawParallel {
    const MAX_STEP: usize = 3;

    pub fn new() -> Self {
        Self {
            state: DrawState::new(Shape::from_type(ShapeType::Parallel)),
        }
    }
}

impl Command for DrawParallel {
    fn name(&self) -> &str {
        "parallel"
    }

    fn initialize(&mut self, ctx: &mut CmdContext, params: &CommandParams) -> bool {
        self.state.reset(ctx, "parallel");
        seed_points(self, ctx, params);
        true
    }

    fn cancel(&mut self, ctx: &mut CmdContext) -> bool {
        self.state.cancel(ctx)
    }

    fn back_step(&mut self, ctx: &mut CmdContext) -> bool {
        self.state.back_step(ctx)
    }

    fn draw(&self, _doc: &ShapeDoc, _camera: &Camera, snap: &SnapEngine, surface: &mut dyn Surface) -> bool {
        self.state.draw(snap, surface)
    }

    fn gather_shapes(&self, shapes: &mut ShapeList) -> usize {
        self.state.gather_shapes(shapes)
    }

    fn click(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.state.step == 0 {
            self.state.click_idle(ctx, m, "parallel")
        } else {
            self.touch_began(ctx, m) && self.touch_ended(ctx, m)
        }
    }

    fn touch_began(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.touch_began_step(ctx, m)
    }

    fn touch_moved(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.touch_moved_step(ctx, m)
    }

    fn touch_ended(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.touch_ended_step(ctx, m, Self::MAX_STEP)
    }

    fn mouse_hover(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.is_active() && self.state.touch_moved_step(ctx, m)
    }

    fn is_drawing_command(&self) -> bool {
        true
    }
}

/// Polyline (`lines`) or polygon (`polygon`) built vertex by vertex.
///
/// The last point of the scratch shape follows the pointer; a double click
/// finishes, and a polygon also finishes when released on its first vertex.
#[derive(Debug)]
pub struct DrawLines {
    name: &'static str,
    closed: bool,
    state: DrawState,
}

impl DrawLines {
    pub fn new(name: &'static str, closed: bool) -> Self {
        let mut shape = Shape::from_type(ShapeType::Lines);
        if let ShapeKind::Lines(lines) = &mut shape.kind {
            lines.set_closed(closed);
        }
        Self {
            name,
            closed,
            state: DrawState::new(shape),
        }
    }

    fn points_mut(&mut self) -> Option<&mut Vec<Point>> {
        match &mut self.state.shape.kind {
            ShapeKind::Lines(lines) => Some(&mut lines.points),
            _ => None,
        }
    }

    /// Drop the live point and points closer than `tol` to their predecessor,
    /// then commit when enough vertices remain.
    fn finish(&mut self, ctx: &mut CmdContext) -> bool {
        if self.state.step == 0 {
            return false;
        }
        let tol = ctx.mm_to_model(ctx.config.draw.min_length_mm);
        let min_points = if self.closed { 3 } else { 2 };
        let step = self.state.step;
        let enough = match self.points_mut() {
            Some(points) => {
                points.truncate(step.max(1));
                points.dedup_by(|b, a| a.distance(*b) <= tol);
                points.len() >= min_points
            }
            None => false,
        };
        self.state.step = 0;
        if enough {
            self.state.commit(ctx);
        } else {
            self.state.shape.geom_mut().clear();
        }
        self.state.touch_ended(ctx)
    }
}

impl Command for DrawLines {
    fn name(&self) -> &str {
        self.name
    }

    fn initialize(&mut self, ctx: &mut CmdContext, params: &CommandParams) -> bool {
        self.state.reset(ctx, self.name);
        seed_points(self, ctx, params);
        if self.state.is_active() && !params.points.is_empty() {
            self.finish(ctx);
        }
        true
    }

    fn cancel(&mut self, ctx: &mut CmdContext) -> bool {
        self.state.cancel(ctx)
    }

    /// Remove the last fixed vertex.
    fn back_step(&mut self, ctx: &mut CmdContext) -> bool {
        let step = self.state.step;
        if step < 2 {
            return false;
        }
        if let Some(points) = self.points_mut() {
            points.remove(step - 1);
        }
        self.state.step -= 1;
        ctx.events.redraw();
        true
    }

    fn draw(&self, _doc: &ShapeDoc, _camera: &Camera, snap: &SnapEngine, surface: &mut dyn Surface) -> bool {
        self.state.draw(snap, surface)
    }

    fn gather_shapes(&self, shapes: &mut ShapeList) -> usize {
        self.state.gather_shapes(shapes)
    }

    fn click(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.state.step == 0 && self.state.click_idle(ctx, m, self.name) {
            return true;
        }
        self.touch_began(ctx, m) && self.touch_ended(ctx, m)
    }

    fn double_click(&mut self, ctx: &mut CmdContext, _m: &Motion) -> bool {
        self.finish(ctx)
    }

    fn touch_began(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.touch_began_step(ctx, m)
    }

    fn touch_moved(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.touch_moved_step(ctx, m)
    }

    fn touch_ended(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        let step = self.state.step;
        if step == 0 {
            return false;
        }
        let pt = self.state.snap_point(ctx, m, false);
        let tol = ctx.mm_to_model(ctx.config.draw.min_length_mm);
        self.state.set_step_point(step, pt);

        let first = self.state.shape.point(0);
        let prev = self.state.shape.point(step - 1);
        if self.closed && step >= 3 && pt.distance(first) <= tol {
            return self.finish(ctx);
        }
        if pt.distance(prev) > tol {
            self.state.step += 1;
            self.state.set_step_point(step + 1, pt);
        }
        self.state.touch_ended(ctx)
    }

    fn mouse_hover(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.is_active() && self.state.touch_moved_step(ctx, m)
    }

    fn is_drawing_command(&self) -> bool {
        true
    }
}

/// Freehand stroke sampled while dragging.
#[derive(Debug)]
pub struct DrawSplines {
    state: DrawState,
}

impl DrawSplines {
    /// Minimum spacing of samples, in millimeters on screen.
    const SAMPLE_MM: f64 = 0.5;

    pub fn new() -> Self {
        Self {
            state: DrawState::new(Shape::new(ShapeKind::Splines(Splines::default()))),
        }
    }

    fn splines_mut(&mut self) -> Option<&mut Splines> {
        match &mut self.state.shape.kind {
            ShapeKind::Splines(sp) => Some(sp),
            _ => None,
        }
    }
}

impl Command for DrawSplines {
    fn name(&self) -> &str {
        "splines"
    }

    fn initialize(&mut self, ctx: &mut CmdContext, params: &CommandParams) -> bool {
        self.state.reset(ctx, "splines");
        seed_points(self, ctx, params);
        true
    }

    fn cancel(&mut self, ctx: &mut CmdContext) -> bool {
        self.state.cancel(ctx)
    }

    fn back_step(&mut self, ctx: &mut CmdContext) -> bool {
        if self.state.step == 0 {
            return false;
        }
        let removed = self.splines_mut().and_then(Splines::remove_last).is_some();
        if removed {
            ctx.events.redraw();
        }
        removed
    }

    fn draw(&self, _doc: &ShapeDoc, _camera: &Camera, snap: &SnapEngine, surface: &mut dyn Surface) -> bool {
        self.state.draw(snap, surface)
    }

    fn gather_shapes(&self, shapes: &mut ShapeList) -> usize {
        self.state.gather_shapes(shapes)
    }

    fn click(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.step == 0 && self.state.click_idle(ctx, m, "splines")
    }

    fn touch_began(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.state.step = 1;
        self.state.shape.context = ctx.doc.context.clone();
        let start = m.start_pt_m;
        if let Some(sp) = self.splines_mut() {
            sp.points.clear();
            sp.points.push(start);
        }
        ctx.events.redraw();
        true
    }

    fn touch_moved(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.state.step == 0 {
            return false;
        }
        let min_dist = ctx.mm_to_model(Self::SAMPLE_MM);
        let pt = m.point_m;
        if self.splines_mut().is_some_and(|sp| sp.add_point(pt, min_dist)) {
            ctx.events.redraw();
        }
        true
    }

    fn touch_ended(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.state.step == 0 {
            return false;
        }
        let tol = ctx.mm_to_model(ctx.config.draw.min_length_mm);
        let pt = m.point_m;
        let length = self
            .splines_mut()
            .map(|sp| {
                sp.add_point(pt, 0.0);
                sp.length()
            })
            .unwrap_or(0.0);
        if length > tol {
            self.state.commit(ctx);
        } else {
            self.state.shape.geom_mut().clear();
        }
        self.state.step = 0;
        self.state.touch_ended(ctx)
    }

    fn is_drawing_command(&self) -> bool {
        true
    }
}

/// Factories of every built-in drawing command, by name.
pub fn builtin_draw_commands() -> Vec<(&'static str, CommandFactory)> {
    vec![
        ("line", || Box::new(DrawLine::new())),
        ("dot", || Box::new(DrawDot::new())),
        ("rect", || Box::new(DrawRect::new("rect", RectKind::Rect, false))),
        ("square", || Box::new(DrawRect::new("square", RectKind::Rect, true))),
        ("ellipse", || Box::new(DrawRect::new("ellipse", RectKind::Ellipse, false))),
        ("circle", || Box::new(DrawRect::new("circle", RectKind::Ellipse, true))),
        ("diamond", || Box::new(DrawRect::new("diamond", RectKind::Diamond, false))),
        ("parallel", || Box::new(DrawParallel::new())),
        ("lines", || Box::new(DrawLines::new("lines", false))),
        ("polygon", || Box::new(DrawLines::new("polygon", true))),
        ("splines", || Box::new(DrawSplines::new())),
    ]
}
