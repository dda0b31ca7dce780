//! The engine facade driven by a platform view.
//!
//! [`CoreView`] owns the back document and runs on the command thread. It
//! feeds gestures to the command manager, publishes the document to the
//! shared [`FrontBuffers`], records undo and playback journals and reports
//! what changed to a [`ViewCallback`].

use crate::buffer::FrontBuffers;
use crate::camera::Camera;
use crate::commands::{ActionButton, CmdContext, CmdEvents, CmdManager, CommandParams, ContextAction};
use crate::config::EngineConfig;
use crate::doc::ShapeDoc;
use crate::input::{GestureDispatcher, GestureState, GestureType, Motion, Route};
use crate::record::{RecordError, RecordShapes};
use crate::render::Surface;
use crate::shapes::{ShapeId, ShapeList};
use crate::snap::SnapEngine;
use kurbo::{Point, Size};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Observer of view notifications. Every method defaults to doing nothing.
#[allow(unused_variables)]
pub trait ViewCallback {
    /// The whole document must be re-rendered. `changed` tells whether its content changed.
    fn regen_all(&mut self, changed: bool) {}

    /// One shape was appended on top.
    fn regen_append(&mut self, id: ShapeId) {}

    /// Only transient feedback changed.
    fn redraw(&mut self) {}

    fn selection_changed(&mut self) {}

    fn content_changed(&mut self) {}

    fn command_changed(&mut self, name: &str) {}

    /// Buttons to show next to the selection; empty to hide them.
    fn show_actions(&mut self, buttons: &[ActionButton]) {}
}

#[derive(Debug, Default)]
struct Pending {
    regen: bool,
    appended: Vec<ShapeId>,
    redraw: bool,
    changed: bool,
    selection: bool,
    command: bool,
    actions: bool,
}

/// State handed to commands, split from the manager so both can be borrowed.
struct Editing {
    doc: ShapeDoc,
    camera: Camera,
    snap: SnapEngine,
    config: EngineConfig,
    events: CmdEvents,
}

impl Editing {
    fn ctx(&mut self) -> CmdContext<'_> {
        CmdContext {
            doc: &mut self.doc,
            camera: &self.camera,
            snap: &mut self.snap,
            config: &self.config,
            events: &mut self.events,
        }
    }
}

/// Document view driven by gestures on the command thread.
pub struct CoreView {
    ed: Editing,
    cmds: CmdManager,
    front: Arc<FrontBuffers>,
    motion: Motion,
    gestures: GestureDispatcher,
    /// In-progress shapes of the running command, as last submitted.
    dyn_shapes: ShapeList,
    undo_rec: Option<RecordShapes>,
    play_rec: Option<RecordShapes>,
    change_count: AtomicI64,
    start_pause_tick: AtomicI64,
    clock: Box<dyn Fn() -> i64>,
    lock_depth: u32,
    pending: Pending,
    callback: Option<Box<dyn ViewCallback>>,
    actions_visible: bool,
    /// Camera when a two-finger view zoom started.
    pinch_base: Option<Camera>,
    view_panning: bool,
    /// Scale of button sizes for high-density screens.
    pub pixel_factor: f64,
}

impl Default for CoreView {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl CoreView {
    pub fn new(config: EngineConfig) -> Self {
        let doc = ShapeDoc::new();
        let front = Arc::new(FrontBuffers::new(&doc));
        let started = Instant::now();
        Self {
            ed: Editing {
                doc,
                camera: Camera::from_config(&config.view),
                snap: SnapEngine::new(config.snap.clone()),
                config,
                events: CmdEvents::default(),
            },
            cmds: CmdManager::new(),
            front,
            motion: Motion::new(),
            gestures: GestureDispatcher::new(),
            dyn_shapes: ShapeList::new(),
            undo_rec: None,
            play_rec: None,
            change_count: AtomicI64::new(0),
            start_pause_tick: AtomicI64::new(0),
            clock: Box::new(move || started.elapsed().as_millis() as i64),
            lock_depth: 0,
            pending: Pending::default(),
            callback: None,
            actions_visible: false,
            pinch_base: None,
            view_panning: false,
            pixel_factor: 1.0,
        }
    }

    pub fn set_callback(&mut self, callback: Option<Box<dyn ViewCallback>>) {
        self.callback = callback;
    }

    /// Replace the millisecond clock used for journal ticks.
    pub fn set_clock(&mut self, clock: impl Fn() -> i64 + 'static) {
        self.clock = Box::new(clock);
    }

    fn now(&self) -> i64 {
        (self.clock)()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ed.config
    }

    pub fn camera(&self) -> &Camera {
        &self.ed.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        self.pending.redraw = true;
        &mut self.ed.camera
    }

    pub fn set_view_size(&mut self, size: Size) {
        self.ed.camera.set_view_size(size);
        self.pending.redraw = true;
        self.flush_if_unlocked();
    }

    /// Fit the whole document in the view, `padding` pixels from its edges.
    /// Returns false for an empty document.
    pub fn zoom_to_extent(&mut self, padding: f64) -> bool {
        let extent = self.ed.doc.extent();
        if extent.area() <= 0.0 {
            return false;
        }
        self.ed.camera.fit_to_bounds(extent, padding);
        self.pending.redraw = true;
        self.flush_if_unlocked();
        true
    }

    /// The document edited on the command thread.
    pub fn back_doc(&self) -> &ShapeDoc {
        &self.ed.doc
    }

    pub fn commands(&self) -> &CmdManager {
        &self.cmds
    }

    pub fn commands_mut(&mut self) -> &mut CmdManager {
        &mut self.cmds
    }

    /// Batch notifications until the returned guard is dropped.
    pub fn lock_draw(&mut self) -> DrawLocker<'_> {
        self.lock_depth += 1;
        DrawLocker { view: self }
    }

    // Gestures

    /// Feed one gesture event in display coordinates.
    ///
    /// Returns whether the command or the view consumed it.
    pub fn on_gesture(
        &mut self,
        gesture_type: GestureType,
        gesture_state: GestureState,
        pt: Point,
        pt2: Option<Point>,
    ) -> bool {
        let d = self.gestures.dispatch(gesture_type, gesture_state);
        self.motion.update(&self.ed.camera, gesture_type, gesture_state, pt, pt2);

        let handled = match d.route {
            Route::TouchMoved | Route::TouchEnded if self.view_panning => {
                self.pan_view();
                if d.route == Route::TouchEnded {
                    self.view_panning = false;
                }
                true
            }
            Route::TwoFingersMove if self.pinch_base.is_some() => self.zoom_view(),
            route => {
                let handled = self.cmds.dispatch(&mut self.ed.ctx(), &self.motion, route);
                match route {
                    _ if handled => true,
                    Route::TouchBegan => {
                        self.view_panning = true;
                        true
                    }
                    Route::TwoFingersMove => self.zoom_view(),
                    _ => false,
                }
            }
        };
        if d.route == Route::Cancel {
            self.view_panning = false;
            self.pinch_base = None;
        }
        self.process_events();
        handled
    }

    /// Shortcut for a two-finger event.
    pub fn two_fingers_move(&mut self, gesture_state: GestureState, pt1: Point, pt2: Point) -> bool {
        self.on_gesture(GestureType::TwoFingersMove, gesture_state, pt1, Some(pt2))
    }

    /// Hover with a mouse: feedback only, never edits.
    pub fn mouse_hover(&mut self, pt: Point) -> bool {
        self.motion.update(&self.ed.camera, GestureType::Pan, GestureState::Possible, pt, None);
        let ret = self.cmds.mouse_hover(&mut self.ed.ctx(), &self.motion);
        self.process_events();
        ret
    }

    fn pan_view(&mut self) {
        let delta = self.motion.point - self.motion.last_pt;
        self.ed.camera.pan(delta);
        self.pending.redraw = true;
    }

    fn zoom_view(&mut self) -> bool {
        let m = &self.motion;
        match m.gesture_state {
            GestureState::Possible | GestureState::Began => {
                self.pinch_base = Some(self.ed.camera.clone());
                true
            }
            GestureState::Moved => {
                let Some(base) = &self.pinch_base else {
                    return false;
                };
                let start_center = m.start_pt.midpoint(m.start_pt2);
                let d0 = m.start_pt.distance(m.start_pt2);
                let d = m.point.distance(m.point2);
                let mut camera = base.clone();
                if d0 > 1.0 && d > 1.0 {
                    camera.zoom_at(start_center, d / d0);
                }
                camera.pan(m.point.midpoint(m.point2) - start_center);
                self.ed.camera = camera;
                self.pending.redraw = true;
                true
            }
            GestureState::Ended | GestureState::Cancel => self.pinch_base.take().is_some(),
        }
    }

    // Commands

    /// Switch commands. `params` is optional JSON, see [`CommandParams`].
    pub fn set_command(&mut self, name: &str, params: Option<&str>) -> bool {
        let params = CommandParams::parse(params);
        let old = self.cmds.command_name().to_string();
        let ret = self.cmds.set_command(&mut self.ed.ctx(), Some(name), &params);
        if old != self.cmds.command_name() {
            self.pending.command = true;
        }
        self.process_events();
        ret
    }

    pub fn command_name(&self) -> &str {
        self.cmds.command_name()
    }

    pub fn switch_command(&mut self) -> bool {
        let ret = self.cmds.switch_command(&mut self.ed.ctx());
        self.pending.command = true;
        self.process_events();
        ret
    }

    pub fn do_context_action(&mut self, action: ContextAction) -> bool {
        let ret = self.cmds.do_context_action(&mut self.ed.ctx(), &self.motion, action);
        self.process_events();
        ret
    }

    pub fn action_buttons(&self) -> &[ActionButton] {
        self.cmds.action_buttons()
    }

    pub fn selected_shape_count(&self) -> usize {
        self.cmds.selected_count()
    }

    /// Id of the current selected shape, 0 when none.
    pub fn selected_shape_id(&self) -> ShapeId {
        self.cmds.selected_id()
    }

    pub fn shape_count(&self) -> usize {
        self.ed.doc.shape_count()
    }

    /// Committed edits so far, bumped by each content change.
    pub fn change_count(&self) -> i64 {
        self.change_count.load(Ordering::Acquire)
    }

    // Buffers

    /// Buffers shared with render threads.
    pub fn front_buffers(&self) -> Arc<FrontBuffers> {
        Arc::clone(&self.front)
    }

    pub fn submit_back_doc(&self) {
        self.front.submit_back_doc(&self.ed.doc);
    }

    /// Gather the running command's in-progress shapes and queue them for
    /// render threads. Returns whether they changed.
    pub fn submit_dynamic_shapes(&mut self) -> bool {
        let mut shapes = ShapeList::new();
        let count = self.cmds.command().map_or(0, |cmd| cmd.gather_shapes(&mut shapes));
        if count == 0 && self.dyn_shapes.is_empty() {
            return false;
        }
        self.dyn_shapes = shapes;
        self.front.submit_dynamic_shapes(&self.dyn_shapes);
        true
    }

    pub fn acquire_front_doc(&self) -> Arc<ShapeDoc> {
        self.front.acquire_front_doc()
    }

    pub fn release_doc(doc: Arc<ShapeDoc>) {
        FrontBuffers::release_doc(doc);
    }

    pub fn acquire_dynamic_shapes(&self) -> Arc<ShapeList> {
        self.front.acquire_dynamic_shapes()
    }

    pub fn release_shapes(shapes: Arc<ShapeList>) {
        FrontBuffers::release_shapes(shapes);
    }

    /// Draw the published document.
    pub fn draw_all(&self, surface: &mut dyn Surface) -> usize {
        self.front.draw_all(surface)
    }

    /// Draw in-progress shapes, or the command's own feedback when it has none.
    pub fn dyn_draw(&self, surface: &mut dyn Surface) -> usize {
        self.front.apply_dynamic_shapes();
        let count = self.front.dyn_draw(surface);
        if count > 0 {
            self.ed.snap.draw_snap(surface);
        } else if let Some(cmd) = self.cmds.command() {
            cmd.draw(&self.ed.doc, &self.ed.camera, &self.ed.snap, surface);
        }
        count
    }

    pub fn stop_drawing(&self, stop: bool) {
        self.front.stop_drawing(stop);
    }

    // Recording

    /// Start an undo journal (`for_undo`) or a playback journal in `path`.
    ///
    /// A playback journal first saves the document as `0.vg`.
    pub fn start_record(&mut self, path: &Path, for_undo: bool) -> bool {
        if let Err(e) = std::fs::create_dir_all(path) {
            log::error!("Fail to create record path {}: {}", path.display(), e);
            return false;
        }
        if !for_undo {
            let snapshot = RecordShapes::step_file(path, false, 0);
            if let Err(e) = self.ed.doc.save_to_file(&snapshot, self.ed.config.record.pretty) {
                log::error!("Fail to save playback snapshot: {}", e);
                return false;
            }
        }
        let rec = RecordShapes::with_options(
            path,
            Some(&self.ed.doc),
            for_undo,
            self.now(),
            self.ed.config.record.clone(),
        );
        self.install_recorder(rec, for_undo);
        log::debug!("Start recording {} in {}", if for_undo { "undo" } else { "playback" }, path.display());
        true
    }

    /// Resume a journal left by an earlier session at step `index` of `count`.
    pub fn restore_record(&mut self, path: &Path, for_undo: bool, index: usize, count: usize, tick: i64) -> bool {
        if !path.is_dir() {
            log::error!("No record path {}", path.display());
            return false;
        }
        let now = self.now();
        let mut rec =
            RecordShapes::with_options(path, Some(&self.ed.doc), for_undo, now, self.ed.config.record.clone());
        rec.restore(index, count, tick, now);
        self.install_recorder(rec, for_undo);
        true
    }

    fn install_recorder(&mut self, rec: RecordShapes, for_undo: bool) {
        let slot = if for_undo { &mut self.undo_rec } else { &mut self.play_rec };
        if let Some(mut old) = slot.replace(rec) {
            old.stop();
        }
    }

    pub fn stop_record(&mut self, for_undo: bool) {
        let slot = if for_undo { &mut self.undo_rec } else { &mut self.play_rec };
        if let Some(mut rec) = slot.take() {
            rec.stop();
            log::debug!("Stop recording in {}", rec.path().display());
        }
    }

    pub fn is_recording(&self, for_undo: bool) -> bool {
        if for_undo { self.undo_rec.is_some() } else { self.play_rec.is_some() }
    }

    /// Record the current document in every active journal.
    pub fn record_shapes(&mut self) -> bool {
        self.record_steps(true, true)
    }

    fn record_steps(&mut self, undo: bool, playback: bool) -> bool {
        let now = self.now();
        let paused = self.paused_ticks(now);
        let change_count = self.change_count();
        let doc = &self.ed.doc;
        let mut recorded = false;

        let targets = [
            (undo, self.undo_rec.as_mut(), None),
            (playback, self.play_rec.as_mut(), Some(&self.dyn_shapes)),
        ];
        for (wanted, rec, dyns) in targets {
            let Some(rec) = rec.filter(|_| wanted) else {
                continue;
            };
            let tick = rec.current_tick(now) - paused;
            match rec.record_step(tick, change_count, doc, dyns) {
                Ok(written) => recorded |= written,
                Err(RecordError::Busy) => log::debug!("Journal busy, step skipped"),
                Err(e) => log::error!("Fail to record shapes: {}", e),
            }
        }
        recorded
    }

    pub fn can_undo(&self) -> bool {
        self.undo_rec.as_ref().is_some_and(RecordShapes::can_undo)
    }

    pub fn can_redo(&self) -> bool {
        self.undo_rec.as_ref().is_some_and(RecordShapes::can_redo)
    }

    pub fn undo(&mut self) -> bool {
        self.load_step(true)
    }

    pub fn redo(&mut self) -> bool {
        self.load_step(false)
    }

    fn load_step(&mut self, back: bool) -> bool {
        if self.undo_rec.is_none() {
            return false;
        }
        self.cmds.cancel(&mut self.ed.ctx());
        let Some(rec) = self.undo_rec.as_mut() else {
            return false;
        };
        let result = if back { rec.undo(&mut self.ed.doc) } else { rec.redo(&mut self.ed.doc) };

        let ok = match result {
            Ok(change_count) => {
                if let Some(count) = change_count {
                    self.change_count.store(count, Ordering::Release);
                }
                self.cmds.sync_selection(&mut self.ed.ctx());
                self.cmds.hide_actions();
                self.submit_back_doc();
                self.pending.regen = true;
                self.pending.changed = true;
                self.record_steps(false, true);
                true
            }
            Err(e) => {
                log::debug!("{} failed: {}", if back { "Undo" } else { "Redo" }, e);
                false
            }
        };
        self.process_events();
        ok
    }

    // Pause and resume

    /// Start a pause. Returns false when already paused.
    pub fn on_pause(&self) -> bool {
        let now = self.now().max(1);
        self.start_pause_tick
            .compare_exchange(0, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// End a pause, shifting journal ticks by its length.
    pub fn on_resume(&mut self) -> bool {
        let start = self.start_pause_tick.swap(0, Ordering::AcqRel);
        if start == 0 {
            return false;
        }
        let ticks = self.now() - start;
        let mut ok = true;
        for rec in [self.undo_rec.as_mut(), self.play_rec.as_mut()].into_iter().flatten() {
            if !rec.on_resume(ticks) {
                log::error!("Fail to resume recording, ticks={}", ticks);
                ok = false;
            }
        }
        ok
    }

    fn paused_ticks(&self, now: i64) -> i64 {
        match self.start_pause_tick.load(Ordering::Acquire) {
            0 => 0,
            start => now - start,
        }
    }

    /// Milliseconds recorded so far in a journal, not counting pauses.
    pub fn record_tick(&self, for_undo: bool) -> i64 {
        let rec = if for_undo { &self.undo_rec } else { &self.play_rec };
        let now = self.now();
        rec.as_ref().map_or(0, |rec| rec.current_tick(now) - self.paused_ticks(now))
    }

    // Content

    pub fn save_to_file(&self, path: &Path) -> bool {
        match self.ed.doc.save_to_file(path, self.ed.config.record.pretty) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Fail to save {}: {}", path.display(), e);
                false
            }
        }
    }

    pub fn load_from_file(&mut self, path: &Path, read_only: bool) -> bool {
        let mut doc = ShapeDoc::new();
        match doc.load_from_file(path) {
            Ok(()) => {
                doc.set_read_only(read_only);
                self.replace_doc(doc);
                log::debug!("Load {} shapes from {}", self.shape_count(), path.display());
                true
            }
            Err(e) => {
                log::error!("Fail to load {}: {}", path.display(), e);
                false
            }
        }
    }

    /// The document as JSON text, empty on failure.
    pub fn content(&self) -> String {
        self.ed.doc.to_json(false).unwrap_or_else(|e| {
            log::error!("Fail to save content: {}", e);
            String::new()
        })
    }

    pub fn set_content(&mut self, content: &str) -> bool {
        let mut doc = ShapeDoc::new();
        match doc.load_from_json(content) {
            Ok(()) => {
                self.replace_doc(doc);
                true
            }
            Err(e) => {
                log::error!("Fail to load content: {}", e);
                false
            }
        }
    }

    /// Remove every shape.
    pub fn clear(&mut self) -> bool {
        let mut doc = self.ed.doc.clone();
        doc.clear();
        self.replace_doc(doc);
        true
    }

    fn replace_doc(&mut self, mut doc: ShapeDoc) {
        self.cmds.cancel(&mut self.ed.ctx());
        carry_change_counts(self.ed.doc.shapes(), doc.shapes_mut());
        self.ed.doc = doc;
        self.cmds.sync_selection(&mut self.ed.ctx());
        self.ed.events.shapes_changed();
        self.process_events();
    }

    // Notifications

    fn process_events(&mut self) {
        let ev = self.ed.events.take();
        if ev.changes > 0 {
            self.change_count.fetch_add(i64::from(ev.changes), Ordering::AcqRel);
            self.pending.changed = true;
        }
        if ev.regen {
            self.submit_back_doc();
            let single_append = ev.changes == 1 && ev.added.len() == 1 && ev.deleted.is_empty();
            if single_append && !self.pending.regen {
                self.pending.appended.extend(ev.added.iter().copied());
            } else {
                self.pending.regen = true;
            }
        }
        if ev.redraw || ev.regen {
            self.pending.redraw = true;
        }
        if ev.selection_changed {
            self.pending.selection = true;
        }
        if ev.show_actions {
            self.cmds.show_actions(&self.ed.doc, &self.ed.camera, self.pixel_factor);
        }
        let showing = !self.cmds.action_buttons().is_empty();
        if ev.show_actions || showing != self.actions_visible {
            self.actions_visible = showing;
            self.pending.actions = true;
        }

        let dyn_changed = self.submit_dynamic_shapes();
        if ev.changes > 0 {
            self.record_steps(true, true);
        } else if dyn_changed {
            self.record_steps(false, true);
        }
        self.flush_if_unlocked();
    }

    fn flush_if_unlocked(&mut self) {
        if self.lock_depth == 0 {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        let Some(cb) = self.callback.as_mut() else {
            return;
        };
        if pending.regen {
            cb.regen_all(pending.changed);
        } else {
            for id in &pending.appended {
                cb.regen_append(*id);
            }
        }
        if pending.redraw && !pending.regen && pending.appended.is_empty() {
            cb.redraw();
        }
        if pending.selection {
            cb.selection_changed();
        }
        if pending.changed {
            cb.content_changed();
        }
        if pending.command {
            cb.command_changed(self.cmds.command_name());
        }
        if pending.actions {
            cb.show_actions(self.cmds.action_buttons());
        }
    }
}

impl Drop for CoreView {
    fn drop(&mut self) {
        self.stop_record(false);
        self.stop_record(true);
    }
}

/// Give loaded shapes that reuse an id of a different old shape a newer
/// change count, so journals see them as edited.
fn carry_change_counts(old: &ShapeList, new: &mut ShapeList) {
    let bumps: Vec<(ShapeId, u32)> = new
        .iter()
        .filter_map(|sp| {
            let prev = old.find_shape(sp.id())?;
            (!prev.equals(sp)).then(|| (sp.id(), prev.change_count().wrapping_add(1)))
        })
        .collect();
    for (id, count) in bumps {
        new.set_change_count(id, count);
    }
}

/// Holds back view notifications; they are sent once the last locker is dropped.
pub struct DrawLocker<'a> {
    view: &'a mut CoreView,
}

impl Deref for DrawLocker<'_> {
    type Target = CoreView;

    fn deref(&self) -> &CoreView {
        self.view
    }
}

impl DerefMut for DrawLocker<'_> {
    fn deref_mut(&mut self) -> &mut CoreView {
        self.view
    }
}

impl Drop for DrawLocker<'_> {
    fn drop(&mut self) {
        self.view.lock_depth = self.view.lock_depth.saturating_sub(1);
        self.view.flush_if_unlocked();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingSurface;
    use crate::shapes::{BaseRect, RectKind, Shape, ShapeKind, ShapeType};
    use kurbo::Rect;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Model units to display pixels at the test zoom.
    const ZOOM: f64 = 10.0;

    fn view() -> CoreView {
        let mut view = CoreView::default();
        view.camera_mut().zoom = ZOOM;
        view
    }

    fn px(x: f64, y: f64) -> Point {
        Point::new(x * ZOOM, y * ZOOM)
    }

    fn drag(view: &mut CoreView, points: &[Point]) {
        let (first, rest) = points.split_first().unwrap();
        view.on_gesture(GestureType::Pan, GestureState::Began, *first, None);
        for pt in rest {
            view.on_gesture(GestureType::Pan, GestureState::Moved, *pt, None);
        }
        let last = points.last().unwrap();
        view.on_gesture(GestureType::Pan, GestureState::Ended, *last, None);
    }

    fn rects_content(rects: &[Rect]) -> String {
        let mut doc = ShapeDoc::new();
        for rect in rects {
            let sp = Shape::new(ShapeKind::Rect(BaseRect::from_rect(RectKind::Rect, *rect)));
            doc.shapes_mut().add_shape(&sp);
        }
        doc.to_json(false).unwrap()
    }

    #[derive(Clone, Default)]
    struct Log(Rc<RefCell<Vec<String>>>);

    impl ViewCallback for Log {
        fn regen_all(&mut self, changed: bool) {
            self.0.borrow_mut().push(format!("regen_all {}", changed));
        }

        fn regen_append(&mut self, id: ShapeId) {
            self.0.borrow_mut().push(format!("regen_append {}", id));
        }

        fn redraw(&mut self) {
            self.0.borrow_mut().push("redraw".to_string());
        }

        fn command_changed(&mut self, name: &str) {
            self.0.borrow_mut().push(format!("command {}", name));
        }
    }

    #[test]
    fn test_draw_line_gesture() {
        let mut v = view();
        assert!(v.set_command("line", None));
        drag(&mut v, &[px(0.0, 0.0), px(5.0, 0.0), px(10.0, 0.0)]);

        let doc = v.back_doc();
        assert_eq!(doc.shape_count(), 1);
        let sp = doc.shapes().first().unwrap();
        assert_eq!(sp.shape_type(), ShapeType::Line);
        let pts = sp.points();
        assert!(pts[0].distance(Point::ZERO) < 1e-9);
        assert!(pts[1].distance(Point::new(10.0, 0.0)) < 1e-9);
        assert_eq!(sp.change_count(), 1);
        assert_eq!(v.change_count(), 1);
        assert_eq!(v.acquire_front_doc().shape_count(), 1);
    }

    #[test]
    fn test_drag_selected_rect() {
        let mut v = view();
        assert!(v.set_content(&rects_content(&[Rect::new(0.0, 0.0, 10.0, 10.0)])));
        let id = v.back_doc().shapes().first().unwrap().id();
        let before = v.change_count();
        v.set_command("select", None);

        drag(&mut v, &[px(3.0, 4.0), px(4.5, 5.5), px(6.0, 7.0)]);
        let sp = v.back_doc().shapes().find_shape(id).unwrap();
        let ext = sp.extent();
        assert!((ext.x0 - 3.0).abs() < 1e-9 && (ext.y0 - 3.0).abs() < 1e-9);
        assert!((ext.x1 - 13.0).abs() < 1e-9 && (ext.y1 - 13.0).abs() < 1e-9);
        assert_eq!(v.change_count(), before + 1);
        assert_eq!(v.selected_shape_id(), id);
    }

    #[test]
    fn test_drag_without_net_movement() {
        let mut v = view();
        v.set_content(&rects_content(&[Rect::new(0.0, 0.0, 10.0, 10.0)]));
        let id = v.back_doc().shapes().first().unwrap().id();
        let count = v.back_doc().shapes().find_shape(id).unwrap().change_count();
        let before = v.change_count();
        v.set_command("select", None);

        drag(&mut v, &[px(3.0, 4.0), px(8.0, 4.0), px(3.0, 4.0)]);
        assert_eq!(v.back_doc().shapes().find_shape(id).unwrap().change_count(), count);
        assert_eq!(v.change_count(), before);
    }

    #[test]
    fn test_undo_through_view() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = view();
        assert!(v.start_record(dir.path(), true));
        assert!(!v.can_undo());

        v.set_content(&rects_content(&[Rect::new(0.0, 0.0, 10.0, 10.0)]));
        let after_first = v.content();
        v.set_command("select", None);
        drag(&mut v, &[px(3.0, 4.0), px(4.5, 5.5), px(6.0, 7.0)]);
        v.clear();
        assert_eq!(v.shape_count(), 0);
        assert!(v.can_undo());

        assert!(v.undo());
        assert_eq!(v.shape_count(), 1);
        assert!(v.undo());
        assert_eq!(v.content(), after_first);
        assert!(v.can_redo());
        assert!(v.redo());
        assert_eq!(v.acquire_front_doc().shapes().first().unwrap().extent(), Rect::new(3.0, 3.0, 13.0, 13.0));
    }

    #[test]
    fn test_failed_save_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let target = blocker.join("doc.vg");

        let mut v = view();
        v.set_content(&rects_content(&[Rect::new(0.0, 0.0, 10.0, 10.0)]));
        let content = v.content();
        let count = v.change_count();

        assert!(!v.save_to_file(&target));
        assert!(!target.exists());
        assert_eq!(v.content(), content);
        assert_eq!(v.change_count(), count);

        let good = dir.path().join("doc.vg");
        assert!(v.save_to_file(&good));
        let mut other = view();
        assert!(other.load_from_file(&good, false));
        assert_eq!(other.content(), content);
        assert!(!other.load_from_file(&dir.path().join("missing.vg"), false));
        assert_eq!(other.content(), content);
    }

    #[test]
    fn test_set_content_with_reused_ids_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let mut v = view();
        v.set_content(&rects_content(&[Rect::new(0.0, 0.0, 10.0, 10.0)]));
        assert!(v.start_record(dir.path(), true));

        v.set_content(&rects_content(&[Rect::new(50.0, 50.0, 60.0, 60.0)]));
        assert!(v.can_undo());
        assert!(v.undo());
        assert_eq!(v.back_doc().shapes().first().unwrap().extent(), Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_draw_locker_batches_notifications() {
        let log = Log::default();
        let mut v = view();
        v.set_callback(Some(Box::new(log.clone())));
        {
            let mut locked = v.lock_draw();
            locked.set_command("line", None);
            drag(&mut locked, &[px(0.0, 0.0), px(10.0, 0.0)]);
            assert!(log.0.borrow().is_empty());
        }
        let events = log.0.borrow().clone();
        assert_eq!(events.iter().filter(|e| e.starts_with("regen")).count(), 1);
        assert!(events.contains(&"command line".to_string()));

        log.0.borrow_mut().clear();
        v.set_content(&rects_content(&[Rect::new(0.0, 0.0, 10.0, 10.0)]));
        assert_eq!(log.0.borrow().first().map(String::as_str), Some("regen_all true"));
    }

    #[test]
    fn test_pause_excluded_from_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Rc::new(AtomicI64::new(1000));
        let mut v = view();
        let c = Rc::clone(&clock);
        v.set_clock(move || c.load(Ordering::Relaxed));
        assert!(v.start_record(dir.path(), false));
        assert!(RecordShapes::step_file(dir.path(), false, 0).exists());

        clock.store(1500, Ordering::Relaxed);
        assert_eq!(v.record_tick(false), 500);
        assert!(v.on_pause());
        assert!(!v.on_pause());
        clock.store(2500, Ordering::Relaxed);
        assert_eq!(v.record_tick(false), 500);
        assert!(v.on_resume());
        assert!(!v.on_resume());
        clock.store(2600, Ordering::Relaxed);
        assert_eq!(v.record_tick(false), 600);
        assert_eq!(v.record_tick(true), 0);
    }

    #[test]
    fn test_view_zooms_when_command_declines() {
        let mut v = view();
        v.set_command("select", None);
        let offset = v.camera().offset;
        v.two_fingers_move(GestureState::Began, Point::new(100.0, 100.0), Point::new(200.0, 100.0));
        v.two_fingers_move(GestureState::Moved, Point::new(50.0, 100.0), Point::new(250.0, 100.0));
        v.two_fingers_move(GestureState::Ended, Point::new(50.0, 100.0), Point::new(250.0, 100.0));
        assert!((v.camera().zoom - ZOOM * 2.0).abs() < 1e-9);
        assert!((v.camera().offset - offset).hypot() > 0.0);
    }

    #[test]
    fn test_zoom_to_extent() {
        let mut v = view();
        assert!(!v.zoom_to_extent(20.0));
        v.set_content(&rects_content(&[Rect::new(0.0, 0.0, 100.0, 200.0)]));
        assert!(v.zoom_to_extent(20.0));
        let camera = v.camera();
        assert!((camera.zoom - (768.0 - 40.0) / 200.0).abs() < 1e-3);
        let center = camera.model_to_display(Point::new(50.0, 100.0));
        assert!((center - camera.view_rect().center()).hypot() < 1e-3);
    }

    #[test]
    fn test_draw_buffers() {
        let mut v = view();
        v.set_content(&rects_content(&[Rect::new(0.0, 0.0, 10.0, 10.0), Rect::new(5.0, 5.0, 15.0, 15.0)]));
        let mut surface = RecordingSurface::new();
        assert_eq!(v.draw_all(&mut surface), 2);
        v.stop_drawing(true);
        assert_eq!(v.draw_all(&mut surface), 0);
        v.stop_drawing(false);

        let front = v.acquire_front_doc();
        v.clear();
        assert_eq!(front.shape_count(), 2);
        CoreView::release_doc(front);
        assert_eq!(v.acquire_front_doc().shape_count(), 0);
    }
}
