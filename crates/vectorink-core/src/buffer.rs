//! Front buffers read by render threads while the command thread edits.
//!
//! The command thread owns the back document and publishes it with
//! [`FrontBuffers::submit_back_doc`], which swaps in a shallow copy: shapes
//! are shared `Arc`s that are never mutated once published. Render threads
//! take an `Arc` snapshot with `acquire_*` and give it back with `release_*`;
//! a snapshot stays valid however the back document changes meanwhile.

use crate::doc::ShapeDoc;
use crate::record::{Applied, RecordResult, RecordShapes};
use crate::render::Surface;
use crate::shapes::ShapeList;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Published document and dynamic shapes.
#[derive(Debug)]
pub struct FrontBuffers {
    doc: RwLock<Arc<ShapeDoc>>,
    dyn_shapes: RwLock<Arc<ShapeList>>,
    /// Dynamic shapes submitted but not yet applied.
    pending: Mutex<Option<ShapeList>>,
    stop: AtomicBool,
    drawing: AtomicU32,
}

impl Default for FrontBuffers {
    fn default() -> Self {
        Self::new(&ShapeDoc::new())
    }
}

impl FrontBuffers {
    pub fn new(doc: &ShapeDoc) -> Self {
        Self {
            doc: RwLock::new(Arc::new(doc.shallow_copy())),
            dyn_shapes: RwLock::new(Arc::new(ShapeList::new())),
            pending: Mutex::new(None),
            stop: AtomicBool::new(false),
            drawing: AtomicU32::new(0),
        }
    }

    /// Snapshot of the published document. Pair with [`FrontBuffers::release_doc`].
    pub fn acquire_front_doc(&self) -> Arc<ShapeDoc> {
        Arc::clone(&self.doc.read())
    }

    pub fn release_doc(doc: Arc<ShapeDoc>) {
        drop(doc);
    }

    /// Snapshot of the published dynamic shapes. Pair with [`FrontBuffers::release_shapes`].
    pub fn acquire_dynamic_shapes(&self) -> Arc<ShapeList> {
        Arc::clone(&self.dyn_shapes.read())
    }

    pub fn release_shapes(shapes: Arc<ShapeList>) {
        drop(shapes);
    }

    /// Publish a shallow copy of `back`. Call from the thread owning `back`.
    pub fn submit_back_doc(&self, back: &ShapeDoc) {
        let front = Arc::new(back.shallow_copy());
        *self.doc.write() = front;
    }

    /// Queue dynamic shapes; they become visible on [`FrontBuffers::apply_dynamic_shapes`].
    pub fn submit_dynamic_shapes(&self, shapes: &ShapeList) {
        *self.pending.lock() = Some(shapes.shallow_copy());
    }

    /// Publish the queued dynamic shapes. Returns false when none were queued.
    pub fn apply_dynamic_shapes(&self) -> bool {
        let Some(shapes) = self.pending.lock().take() else {
            return false;
        };
        *self.dyn_shapes.write() = Arc::new(shapes);
        true
    }

    /// Abort (`true`) or allow (`false`) full redraws. Checked between shapes.
    pub fn stop_drawing(&self, stop: bool) {
        self.stop.store(stop, Ordering::Release);
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Whether a render thread is inside [`FrontBuffers::draw_all`].
    pub fn is_drawing(&self) -> bool {
        self.drawing.load(Ordering::Acquire) > 0
    }

    /// Draw the published document. Returns the number of shapes drawn.
    pub fn draw_all(&self, surface: &mut dyn Surface) -> usize {
        let doc = self.acquire_front_doc();
        self.drawing.fetch_add(1, Ordering::AcqRel);
        let mut count = 0;
        if surface.begin_paint() {
            count = doc.draw(surface, &self.stop);
            surface.end_paint();
        }
        self.drawing.fetch_sub(1, Ordering::AcqRel);
        Self::release_doc(doc);
        count
    }

    /// Draw the published dynamic shapes.
    pub fn dyn_draw(&self, surface: &mut dyn Surface) -> usize {
        let shapes = self.acquire_dynamic_shapes();
        let mut count = 0;
        for sp in shapes.iter() {
            if self.is_stopping() {
                break;
            }
            sp.draw(surface);
            count += 1;
        }
        Self::release_shapes(shapes);
        count
    }
}

/// Buffers of a playback session: the player thread fills the back side
/// from journal frames and publishes it to render threads.
#[derive(Debug, Default)]
pub struct Playing {
    front: FrontBuffers,
    back_doc: ShapeDoc,
    back_shapes: ShapeList,
    stopping: AtomicBool,
}

impl Playing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn front(&self) -> &FrontBuffers {
        &self.front
    }

    pub fn back_doc(&self) -> &ShapeDoc {
        &self.back_doc
    }

    pub fn back_doc_mut(&mut self) -> &mut ShapeDoc {
        &mut self.back_doc
    }

    /// Back dynamic shapes, emptied or reset to what is published.
    pub fn get_back_shapes(&mut self, need_clear: bool) -> &mut ShapeList {
        self.back_shapes = if need_clear {
            ShapeList::new()
        } else {
            self.front.acquire_dynamic_shapes().shallow_copy()
        };
        &mut self.back_shapes
    }

    pub fn submit_back_doc(&self) {
        self.front.submit_back_doc(&self.back_doc);
    }

    pub fn submit_back_shapes(&self) {
        self.front.submit_dynamic_shapes(&self.back_shapes);
        self.front.apply_dynamic_shapes();
    }

    /// Apply the next frame of `rec` and publish whatever it changed.
    pub fn play_frame(&mut self, rec: &mut RecordShapes) -> RecordResult<Applied> {
        self.get_back_shapes(true);
        let applied = rec.play_next(&mut self.back_doc, Some(&mut self.back_shapes))?;
        if applied.result & (RecordShapes::STD_CHANGED | RecordShapes::APPEND) != 0 {
            self.submit_back_doc();
        }
        if applied.result & RecordShapes::DYN_CHANGED != 0 {
            self.submit_back_shapes();
        }
        Ok(applied)
    }

    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        self.front.stop_drawing(true);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingSurface;
    use crate::shapes::{BaseRect, Dot, RectKind, Shape, ShapeKind};
    use kurbo::{Point, Rect, Vec2};

    fn rect_shape(rect: Rect) -> Shape {
        Shape::new(ShapeKind::Rect(BaseRect::from_rect(RectKind::Rect, rect)))
    }

    #[test]
    fn test_acquired_doc_survives_submit() {
        let mut back = ShapeDoc::new();
        let id = back.shapes_mut().add_shape(&rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let buffers = FrontBuffers::new(&back);

        let front = buffers.acquire_front_doc();
        let mut moved = back.shapes().find_shape(id).unwrap().clone();
        moved.offset(Vec2::new(5.0, 0.0), -1);
        back.shapes_mut().update_shape(moved);
        back.shapes_mut().add_shape(&rect_shape(Rect::new(20.0, 20.0, 30.0, 30.0)));
        buffers.submit_back_doc(&back);

        assert_eq!(front.shape_count(), 1);
        assert_eq!(front.shapes().find_shape(id).unwrap().extent(), Rect::new(0.0, 0.0, 10.0, 10.0));
        FrontBuffers::release_doc(front);

        let front = buffers.acquire_front_doc();
        assert_eq!(front.shape_count(), 2);
        assert_eq!(front.shapes().find_shape(id).unwrap().extent(), Rect::new(5.0, 0.0, 15.0, 10.0));
    }

    #[test]
    fn test_submit_shares_shapes() {
        let mut back = ShapeDoc::new();
        let id = back.shapes_mut().add_shape(&rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let buffers = FrontBuffers::new(&ShapeDoc::new());
        buffers.submit_back_doc(&back);
        let front = buffers.acquire_front_doc();
        assert!(Arc::ptr_eq(
            front.shapes().find_arc(id).unwrap(),
            back.shapes().find_arc(id).unwrap()
        ));
    }

    #[test]
    fn test_dynamic_shapes_need_apply() {
        let buffers = FrontBuffers::default();
        let mut dyns = ShapeList::new();
        dyns.add_shape(&Shape::new(ShapeKind::Dot(Dot::new(Point::new(1.0, 2.0)))));

        buffers.submit_dynamic_shapes(&dyns);
        assert!(buffers.acquire_dynamic_shapes().is_empty());
        assert!(buffers.apply_dynamic_shapes());
        assert_eq!(buffers.acquire_dynamic_shapes().len(), 1);
        assert!(!buffers.apply_dynamic_shapes());
    }

    #[test]
    fn test_stop_drawing() {
        let mut back = ShapeDoc::new();
        for i in 0..3 {
            let x = i as f64 * 20.0;
            back.shapes_mut().add_shape(&rect_shape(Rect::new(x, 0.0, x + 10.0, 10.0)));
        }
        let buffers = FrontBuffers::new(&back);
        let mut surface = RecordingSurface::new();
        assert_eq!(buffers.draw_all(&mut surface), 3);
        assert!(!buffers.is_drawing());

        buffers.stop_drawing(true);
        surface.clear();
        assert_eq!(buffers.draw_all(&mut surface), 0);
        buffers.stop_drawing(false);
        assert_eq!(buffers.draw_all(&mut surface), 3);
    }

    #[test]
    fn test_play_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = ShapeDoc::new();
        {
            let mut rec = RecordShapes::new(dir.path(), Some(&doc), false, 0);
            let mut dyns = ShapeList::new();
            dyns.add_shape(&Shape::new(ShapeKind::Dot(Dot::new(Point::new(4.0, 4.0)))));
            doc.shapes_mut().add_shape(&rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
            assert!(rec.record_step(40, 1, &doc, Some(&dyns)).unwrap());
            doc.shapes_mut().add_shape(&rect_shape(Rect::new(20.0, 0.0, 30.0, 10.0)));
            assert!(rec.record_step(80, 2, &doc, None).unwrap());
            rec.stop();
        }

        let mut playing = Playing::new();
        let mut rec = RecordShapes::new(dir.path(), None, false, 0);
        let first = playing.play_frame(&mut rec).unwrap();
        assert_eq!(first.tick, Some(40));
        assert_eq!(playing.front().acquire_front_doc().shape_count(), 1);
        assert_eq!(playing.front().acquire_dynamic_shapes().len(), 1);

        let second = playing.play_frame(&mut rec).unwrap();
        assert_eq!(second.result, RecordShapes::APPEND);
        assert_eq!(playing.front().acquire_front_doc().shape_count(), 2);
        assert!(playing.play_frame(&mut rec).is_err());

        playing.stop();
        assert!(playing.is_stopping());
        assert!(playing.front().is_stopping());
    }
}
