//! Step machinery shared by the drawing commands.

use super::CmdContext;
use crate::input::Motion;
use crate::render::Surface;
use crate::shapes::{Parallelogram, Shape, ShapeId, ShapeKind, ShapeList};
use crate::snap::SnapEngine;
use kurbo::Point;

/// In-progress state of a drawing command.
///
/// `step` is 0 while idle; otherwise it is the index of the point that
/// follows the pointer. The scratch shape never belongs to the document.
#[derive(Debug, Clone)]
pub struct DrawState {
    pub step: usize,
    pub shape: Shape,
    /// Return to `select` after one shape is committed.
    pub one_shape_end: bool,
}

impl DrawState {
    pub fn new(shape: Shape) -> Self {
        Self {
            step: 0,
            shape,
            one_shape_end: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.step > 0
    }

    /// Reset for a fresh start and pick up the document style.
    pub fn reset(&mut self, ctx: &CmdContext, name: &str) {
        self.step = 0;
        self.shape.geom_mut().clear();
        self.shape.context = ctx.doc.context.clone();
        self.one_shape_end = ctx.config.draw.is_one_shape(name);
    }

    pub fn cancel(&mut self, ctx: &mut CmdContext) -> bool {
        if self.step == 0 {
            return false;
        }
        self.step = 0;
        self.shape.geom_mut().clear();
        ctx.snap.clear_snap();
        ctx.events.redraw();
        true
    }

    pub fn back_step(&mut self, ctx: &mut CmdContext) -> bool {
        if self.step > 1 {
            self.step -= 1;
            ctx.events.redraw();
            true
        } else {
            false
        }
    }

    /// Snap the start point (first step) or the current point.
    pub fn snap_point(&self, ctx: &mut CmdContext, m: &Motion, first_step: bool) -> Point {
        if first_step {
            ctx.snap_point(m.start_pt_m, None, None, &[])
        } else {
            self.snap_at(ctx, m.point_m)
        }
    }

    pub fn snap_at(&self, ctx: &mut CmdContext, pt: Point) -> Point {
        ctx.snap_point(pt, Some(&self.shape), Some(self.step), &[])
    }

    /// Place the point of `step`, keeping the geometry consistent for the shape kind.
    pub fn set_step_point(&mut self, step: usize, pt: Point) {
        match &mut self.shape.kind {
            ShapeKind::Parallel(p) => {
                let pts = p.points();
                *p = match step {
                    0 => Parallelogram::from_three(pt, pt, pt),
                    1 => Parallelogram::from_three(pts[0], pt, pt),
                    _ => Parallelogram::from_three(pts[0], pts[1], pt),
                };
            }
            ShapeKind::Lines(lines) => {
                while lines.points.len() <= step {
                    lines.points.push(pt);
                }
                lines.points[step] = pt;
            }
            _ => {
                if step == 0 {
                    for i in 0..self.shape.point_count() {
                        self.shape.geom_mut().set_point(i, pt);
                    }
                } else {
                    self.shape.geom_mut().set_handle_point(step, pt, 0.0);
                }
            }
        }
    }

    pub fn touch_began_step(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        self.shape.context = ctx.doc.context.clone();
        if self.step == 0 {
            self.step = 1;
            let pt = self.snap_point(ctx, m, true);
            self.set_step_point(0, pt);
            self.set_step_point(1, pt);
        } else {
            let pt = self.snap_point(ctx, m, false);
            self.set_step_point(self.step, pt);
        }
        ctx.events.redraw();
        true
    }

    pub fn touch_moved_step(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        if self.step > 0 {
            let pt = self.snap_point(ctx, m, false);
            self.set_step_point(self.step, pt);
        }
        ctx.events.redraw();
        true
    }

    /// Fix the current step point and advance. Commits once `max_step` is reached.
    pub fn touch_ended_step(&mut self, ctx: &mut CmdContext, m: &Motion, max_step: usize) -> bool {
        if self.step == 0 {
            return false;
        }
        let pt = self.snap_point(ctx, m, false);
        let tol = ctx.mm_to_model(ctx.config.draw.min_length_mm);
        self.set_step_point(self.step, pt);

        if pt.distance(self.shape.point(self.step - 1)) > tol {
            self.step += 1;
            if self.step >= max_step {
                self.step = 0;
                let ext = self.shape.geom().extent();
                if ext.width() > tol || ext.height() > tol {
                    self.commit(ctx);
                } else {
                    self.shape.geom_mut().clear();
                }
            } else {
                self.set_step_point(self.step, pt);
            }
        }
        self.touch_ended(ctx)
    }

    pub fn touch_ended(&mut self, ctx: &mut CmdContext) -> bool {
        ctx.snap.clear_snap();
        ctx.events.redraw();
        true
    }

    /// Add the scratch shape to the document and clear it.
    pub fn commit(&mut self, ctx: &mut CmdContext) -> ShapeId {
        let id = ctx.add_shape(&self.shape);
        self.shape.geom_mut().clear();
        self.shape.context = ctx.doc.context.clone();
        if self.one_shape_end && id != 0 {
            ctx.events.new_shape_id = Some(id);
            ctx.events.request_command("select");
        }
        id
    }

    /// Click while idle: switch to `select` when a shape was clicked.
    pub fn click_idle(&mut self, ctx: &mut CmdContext, m: &Motion, name: &str) -> bool {
        let limits = ctx.mm_box(m.point_m, ctx.config.select.hit_test_tol_mm);
        match ctx.shapes().hit_test(limits, None) {
            Some((id, _)) => {
                log::debug!("Command ({}) cancelled after the shape #{} clicked", name, id);
                ctx.events.new_shape_id = Some(id);
                ctx.events.request_command("select");
                true
            }
            None => false,
        }
    }

    pub fn draw(&self, snap: &SnapEngine, surface: &mut dyn Surface) -> bool {
        let drawn = self.step > 0 && self.shape.point_count() > 0;
        if drawn {
            self.shape.draw(surface);
        }
        snap.draw_snap(surface) || drawn
    }

    pub fn gather_shapes(&self, shapes: &mut ShapeList) -> usize {
        if self.step > 0 && self.shape.point_count() > 0 {
            shapes.add_shape(&self.shape);
            1
        } else {
            0
        }
    }
}
