//! Gesture-driven commands.
//!
//! A command is a small state machine fed with [`Motion`] events by the
//! [`CmdManager`]. Commands never reach global state: everything they may
//! touch is passed in a [`CmdContext`].

mod actions;
mod basic;
mod draw;
mod manager;
mod select;

pub use actions::{ActionButton, ContextAction, layout_actions};
pub use basic::{DrawLines, DrawParallel, DrawRect, DrawSplines, DrawDot, DrawLine, builtin_draw_commands};
pub use draw::DrawState;
pub use manager::{CmdManager, CommandFactory};
pub use select::{SelectCommand, SelectState, SelectType};

use crate::camera::Camera;
use crate::config::EngineConfig;
use crate::doc::ShapeDoc;
use crate::input::Motion;
use crate::render::Surface;
use crate::shapes::{Shape, ShapeId, ShapeList};
use crate::snap::SnapEngine;
use kurbo::{Point, Rect, Size};
use serde::Deserialize;

/// Notifications produced while a command runs, drained by the view.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CmdEvents {
    /// Committed document edits.
    pub changes: u32,
    /// The document changed and must be republished.
    pub regen: bool,
    /// Only transient feedback changed.
    pub redraw: bool,
    pub added: Vec<ShapeId>,
    pub deleted: Vec<ShapeId>,
    pub selection_changed: bool,
    /// Command switch requested by the running command.
    pub next_command: Option<String>,
    /// Shape to select after switching to `select`.
    pub new_shape_id: Option<ShapeId>,
    /// Context actions should be shown for the current selection.
    pub show_actions: bool,
}

impl CmdEvents {
    pub fn shape_added(&mut self, id: ShapeId) {
        self.changes += 1;
        self.regen = true;
        self.added.push(id);
    }

    /// One committed edit of existing shapes.
    pub fn shapes_changed(&mut self) {
        self.changes += 1;
        self.regen = true;
    }

    pub fn shapes_deleted(&mut self, ids: &[ShapeId]) {
        if ids.is_empty() {
            return;
        }
        self.changes += 1;
        self.regen = true;
        self.deleted.extend_from_slice(ids);
    }

    pub fn redraw(&mut self) {
        self.redraw = true;
    }

    pub fn selection_changed(&mut self) {
        self.selection_changed = true;
        self.redraw = true;
    }

    pub fn request_command(&mut self, name: &str) {
        self.next_command = Some(name.to_string());
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn take(&mut self) -> CmdEvents {
        std::mem::take(self)
    }
}

/// Everything a command may read or modify during one call.
pub struct CmdContext<'a> {
    pub doc: &'a mut ShapeDoc,
    pub camera: &'a Camera,
    pub snap: &'a mut SnapEngine,
    pub config: &'a EngineConfig,
    pub events: &'a mut CmdEvents,
}

impl CmdContext<'_> {
    /// Model length of `mm` millimeters on screen.
    pub fn mm_to_model(&self, mm: f64) -> f64 {
        self.camera.display_mm_to_model(mm)
    }

    /// Square of half-size `mm` around `pt`, in model units.
    pub fn mm_box(&self, pt: Point, mm: f64) -> Rect {
        let d = self.mm_to_model(mm) * 2.0;
        Rect::from_center_size(pt, Size::new(d, d))
    }

    pub fn shapes(&self) -> &ShapeList {
        self.doc.shapes()
    }

    /// Snap `pt` against the document with the configured tolerance.
    pub fn snap_point(
        &mut self,
        pt: Point,
        editing: Option<&Shape>,
        hot_handle: Option<usize>,
        ignore_ids: &[ShapeId],
    ) -> Point {
        let tol = self.camera.display_mm_to_model(self.config.snap.tolerance_mm);
        self.snap
            .snap_point(self.doc.shapes(), tol, pt, editing, hot_handle, ignore_ids)
    }

    /// Add a copy of `shape` to the current layer. Returns 0 when read-only.
    pub fn add_shape(&mut self, shape: &Shape) -> ShapeId {
        if self.doc.is_read_only() {
            log::debug!("document is read-only, shape discarded");
            return 0;
        }
        let id = self.doc.shapes_mut().add_shape(shape);
        self.events.shape_added(id);
        id
    }
}

/// Initialization parameters of a command, given as JSON.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct CommandParams {
    /// Model points fed as began/ended pairs to seed drawing.
    pub points: Vec<[f64; 2]>,
    /// Shape to select initially.
    pub id: Option<ShapeId>,
}

impl CommandParams {
    /// Parse parameter text. Malformed text yields defaults.
    pub fn parse(text: Option<&str>) -> Self {
        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            return Self::default();
        };
        serde_json::from_str(text).unwrap_or_else(|e| {
            log::warn!("Ignoring invalid command params: {}", e);
            Self::default()
        })
    }

    pub fn model_points(&self) -> Vec<Point> {
        self.points.iter().map(|p| Point::new(p[0], p[1])).collect()
    }
}

/// Gesture responder implementing one interactive tool.
///
/// Handlers return true when they consumed the event.
#[allow(unused_variables)]
pub trait Command {
    fn name(&self) -> &str;

    fn initialize(&mut self, ctx: &mut CmdContext, params: &CommandParams) -> bool {
        true
    }

    /// Abandon work in progress. Calling it when idle is a no-op returning false.
    fn cancel(&mut self, ctx: &mut CmdContext) -> bool;

    /// Undo the last step of the work in progress.
    fn back_step(&mut self, ctx: &mut CmdContext) -> bool {
        false
    }

    /// Draw transient feedback. `doc` is the document being edited.
    fn draw(&self, doc: &ShapeDoc, camera: &Camera, snap: &SnapEngine, surface: &mut dyn Surface) -> bool;

    /// Copy in-progress shapes into `shapes` for dynamic rendering.
    fn gather_shapes(&self, shapes: &mut ShapeList) -> usize {
        0
    }

    fn click(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        false
    }

    fn double_click(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        false
    }

    fn long_press(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        false
    }

    fn touch_began(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        false
    }

    fn touch_moved(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        false
    }

    fn touch_ended(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        false
    }

    fn mouse_hover(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        false
    }

    fn two_fingers_move(&mut self, ctx: &mut CmdContext, m: &Motion) -> bool {
        false
    }

    /// Creates shapes; remembered as the target of `@draw`.
    fn is_drawing_command(&self) -> bool {
        false
    }

    fn as_select(&self) -> Option<&SelectCommand> {
        None
    }

    fn as_select_mut(&mut self) -> Option<&mut SelectCommand> {
        None
    }
}
