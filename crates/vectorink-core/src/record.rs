//! On-disk journal of document changes, for undo/redo and playback.
//!
//! Every recorded step diffs the current layer against the change counts
//! remembered at the previous step and writes two delta files: `{n}.vgr`
//! moves the document forward over step `n`, `{n}.vgu` moves it back.
//! A playback journal also starts with a full snapshot `0.vg` and may carry
//! dynamic shapes in its forward files. `records.json` indexes the steps.
//!
//! Applying a delta reads and validates the whole file before touching the
//! document, so a failed undo or redo leaves the document and the step
//! position unchanged.

use crate::config::RecordConfig;
use crate::doc::ShapeDoc;
use crate::shapes::{Shape, ShapeId, ShapeList, load_rect, save_rect};
use crate::storage::{
    JsonStorage, Storage, StorageError, read_floats, read_json_file, write_file_atomic,
};
use kurbo::Affine;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// Journal errors.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("journal is loading another step")]
    Busy,
    #[error("no step to {0}")]
    NoHistory(&'static str),
    #[error("IO error: {0}")]
    Io(String),
    #[error("journal is opened for playing")]
    Playing,
    #[error("nothing applied from {0}")]
    NothingApplied(String),
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Index entry of one recorded step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub index: usize,
    pub tick: i64,
    pub flags: u32,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecordsIndex {
    records: Vec<RecordEntry>,
}

/// Outcome of applying one journal file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    /// Combination of [`RecordShapes::STD_CHANGED`], [`RecordShapes::APPEND`]
    /// and [`RecordShapes::DYN_CHANGED`].
    pub result: u32,
    pub tick: Option<i64>,
    pub change_count: Option<i64>,
    /// The added shape when the step only appended one.
    pub new_id: Option<ShapeId>,
}

/// Marks the journal as loading for the lifetime of the guard.
struct LoadingGuard<'a>(&'a AtomicU32);

impl<'a> LoadingGuard<'a> {
    fn enter(loading: &'a AtomicU32) -> RecordResult<Self> {
        if loading.fetch_add(1, Ordering::AcqRel) > 0 {
            loading.fetch_sub(1, Ordering::AcqRel);
            return Err(RecordError::Busy);
        }
        Ok(Self(loading))
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A journal directory being recorded, undone, redone or played.
#[derive(Debug)]
pub struct RecordShapes {
    path: PathBuf,
    for_undo: bool,
    options: RecordConfig,
    /// Change count of every shape as of the last step.
    versions: BTreeMap<ShapeId, u32>,
    /// Position in the step sequence; the next step is written at this index.
    file_count: usize,
    /// Highest position reached, the redo ceiling.
    max_count: usize,
    loading: AtomicU32,
    /// Shapes as of the last step, for the reverse deltas. `None` while playing.
    last: Option<ShapeList>,
    start_tick: i64,
    tick: i64,
    flags: u32,
    index: BTreeMap<usize, RecordEntry>,
    stopped: bool,
}

impl RecordShapes {
    pub const ADD: u32 = 1;
    pub const EDIT: u32 = 2;
    pub const DEL: u32 = 4;
    pub const DYN: u32 = 8;

    pub const STD_CHANGED: u32 = 1;
    pub const APPEND: u32 = 2;
    pub const DYN_CHANGED: u32 = 4;

    const INDEX_FILE: &'static str = "records.json";

    /// Open a journal at `path`.
    ///
    /// With a document the journal records changes made after this call;
    /// without one it is opened for playing. `cur_tick` is the caller's
    /// clock in milliseconds.
    pub fn new(path: impl Into<PathBuf>, doc: Option<&ShapeDoc>, for_undo: bool, cur_tick: i64) -> Self {
        Self::with_options(path, doc, for_undo, cur_tick, RecordConfig::default())
    }

    pub fn with_options(
        path: impl Into<PathBuf>,
        doc: Option<&ShapeDoc>,
        for_undo: bool,
        cur_tick: i64,
        options: RecordConfig,
    ) -> Self {
        Self {
            path: path.into(),
            for_undo,
            options,
            versions: doc.map(|d| versions_of(d.shapes())).unwrap_or_default(),
            file_count: 0,
            max_count: 0,
            loading: AtomicU32::new(0),
            last: doc.map(|d| d.shapes().shallow_copy()),
            start_tick: cur_tick,
            tick: 0,
            flags: 0,
            index: BTreeMap::new(),
            stopped: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_for_undo(&self) -> bool {
        self.for_undo
    }

    pub fn is_playing(&self) -> bool {
        self.last.is_none()
    }

    /// Tick of the last recorded or applied step.
    pub fn file_tick(&self) -> i64 {
        self.tick
    }

    /// Forward flags of the last recorded step.
    pub fn file_flags(&self) -> u32 {
        self.flags
    }

    pub fn file_count(&self) -> usize {
        self.file_count
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Milliseconds since recording started, net of resumed pauses.
    pub fn current_tick(&self, cur_tick: i64) -> i64 {
        cur_tick - self.start_tick
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire) > 0
    }

    /// Mark a load in progress elsewhere; undo and redo are rejected meanwhile.
    pub fn set_loading(&self, loading: bool) {
        if loading {
            self.loading.fetch_add(1, Ordering::AcqRel);
        } else {
            let _ = self
                .loading
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        }
    }

    pub fn can_undo(&self) -> bool {
        self.file_count > 1 && !self.is_loading()
    }

    pub fn can_redo(&self) -> bool {
        self.file_count < self.max_count && !self.is_loading()
    }

    /// `{path}/0.vg`, `{path}/{n}.vgr` or `{path}/{n}.vgu`.
    pub fn file_name(&self, back: bool, index: usize) -> PathBuf {
        Self::step_file(&self.path, back, index)
    }

    pub fn step_file(path: &Path, back: bool, index: usize) -> PathBuf {
        let name = match (index, back) {
            (0, _) => "0.vg".to_string(),
            (n, true) => format!("{}.vgu", n),
            (n, false) => format!("{}.vgr", n),
        };
        path.join(name)
    }

    /// Full snapshot a playback journal starts from.
    pub fn snapshot_file(&self) -> PathBuf {
        self.file_name(false, 0)
    }

    /// Resume a journal written by an earlier session.
    pub fn restore(&mut self, index: usize, count: usize, tick: i64, cur_tick: i64) {
        self.file_count = index;
        self.max_count = count.max(index);
        self.tick = tick;
        self.start_tick = cur_tick - tick;
        match Self::load_index(&self.path) {
            Ok(entries) => {
                self.index = entries
                    .into_iter()
                    .filter(|e| e.index < self.max_count)
                    .map(|e| (e.index, e))
                    .collect();
            }
            Err(e) => log::debug!("No records index restored: {}", e),
        }
        log::debug!("Restored journal {}: {}/{}, tick={}", self.path.display(), index, count, tick);
    }

    /// Shift the start tick past a pause of `paused_ticks` milliseconds.
    pub fn on_resume(&mut self, paused_ticks: i64) -> bool {
        if paused_ticks < 0 {
            return false;
        }
        self.start_tick += paused_ticks;
        true
    }

    /// Record the changes of `doc` since the previous step.
    ///
    /// Returns `Ok(false)` when nothing changed and no file was written.
    pub fn record_step(
        &mut self,
        tick: i64,
        change_count: i64,
        doc: &ShapeDoc,
        dyn_shapes: Option<&ShapeList>,
    ) -> RecordResult<bool> {
        if self.is_loading() {
            return Err(RecordError::Busy);
        }
        let Some(last) = self.last.as_ref() else {
            return Err(RecordError::Playing);
        };
        if self.max_count == 0 {
            self.max_count = 1;
            self.file_count = 1;
        }

        let shapes = doc.shapes();
        let mut fwd = begin_step(tick);
        let mut rev = begin_step(tick);
        let mut fwd_flags = 0;
        let mut rev_flags = 0;
        let mut fwd_count = 0;
        let mut rev_count = 0;
        let mut added = Vec::new();
        let mut gone: BTreeSet<ShapeId> = self.versions.keys().copied().collect();

        fwd.write_node("shapes", -1, false);
        rev.write_node("shapes", -1, false);

        for sp in shapes.iter() {
            let id = sp.id();
            match self.versions.get(&id) {
                None => {
                    added.push(id);
                    ShapeList::save_shape(&mut fwd, sp, fwd_count);
                    fwd_count += 1;
                    fwd_flags |= if fwd_flags != 0 { Self::EDIT } else { Self::ADD };
                }
                Some(ver) => {
                    gone.remove(&id);
                    if *ver != sp.change_count() {
                        ShapeList::save_shape(&mut fwd, sp, fwd_count);
                        fwd_count += 1;
                        fwd_flags |= Self::EDIT;
                        if let Some(old) = last.find_shape(id) {
                            ShapeList::save_shape(&mut rev, old, rev_count);
                            rev_count += 1;
                        }
                        rev_flags |= Self::EDIT;
                    }
                }
            }
        }
        fwd.write_node("shapes", -1, true);

        if !gone.is_empty() {
            fwd_flags |= Self::DEL;
            rev_flags |= Self::ADD;
            fwd.write_node("delete", -1, false);
            for (j, id) in gone.iter().enumerate() {
                fwd.write_uint(&format!("d{}", j), *id);
                if let Some(old) = last.find_shape(*id) {
                    ShapeList::save_shape(&mut rev, old, rev_count);
                    rev_count += 1;
                }
            }
            fwd.write_node("delete", -1, true);
        }
        rev.write_node("shapes", -1, true);

        if !added.is_empty() {
            rev_flags |= Self::DEL;
            write_delete(&mut rev, &added);
        }

        if !self.for_undo {
            if let Some(dyns) = dyn_shapes.filter(|d| !d.is_empty()) {
                fwd_flags |= Self::DYN;
                fwd.write_node("dynamic", -1, false);
                dyns.save(&mut fwd);
                fwd.write_node("dynamic", -1, true);
            }
        }

        fwd.write_int("count", fwd_count + gone.len() as i32);
        rev.write_int("count", rev_count + added.len() as i32);
        fwd.write_uint("flags", fwd_flags);
        rev.write_uint("flags", rev_flags);
        for s in [&mut fwd, &mut rev] {
            s.write_long("changeCount", change_count);
            save_view_state(&mut *s, doc);
            s.write_node("record", -1, true);
        }

        if fwd_flags == 0 && rev_flags == 0 {
            return Ok(false);
        }
        let index = self.file_count;
        if fwd_flags != 0 {
            self.write_step(&fwd, self.file_name(false, index))?;
        }
        if rev_flags != 0 {
            self.write_step(&rev, self.file_name(true, index))?;
        }

        self.versions = versions_of(shapes);
        self.last = Some(shapes.shallow_copy());
        self.tick = tick;
        self.flags = fwd_flags;
        self.file_count += 1;
        self.max_count = self.file_count;
        if fwd_flags != Self::DYN || fwd_count > 1 {
            log::debug!("Record {:03}: tick={}, flags={}, count={}", index, tick, fwd_flags, fwd_count);
        }

        self.index.retain(|k, _| *k < index);
        self.index.insert(index, RecordEntry { index, tick, flags: fwd_flags });
        let interval = self.options.index_interval.max(1) as usize;
        if index % interval == 0 && fwd_flags != Self::DYN {
            if let Err(e) = self.save_index() {
                log::error!("Fail to save records index: {}", e);
            }
        }
        Ok(true)
    }

    fn write_step(&self, s: &JsonStorage, path: PathBuf) -> RecordResult<()> {
        let text = s.to_json(self.options.pretty)?;
        write_file_atomic(&path, &text).map_err(|e| {
            log::error!("Fail to record shapes: {}", e);
            RecordError::from(e)
        })
    }

    /// Step back over the last recorded step. Returns the recorded change count.
    pub fn undo(&mut self, doc: &mut ShapeDoc) -> RecordResult<Option<i64>> {
        if self.last.is_none() {
            return Err(RecordError::Playing);
        }
        let applied = {
            let _guard = LoadingGuard::enter(&self.loading)?;
            if self.file_count <= 1 {
                return Err(RecordError::NoHistory("undo"));
            }
            let path = Self::step_file(&self.path, true, self.file_count - 1);
            Self::apply_file(&path, Some(doc), None)?
        };

        self.file_count -= 1;
        self.after_load(doc, applied);
        log::debug!("Undo {}", self.file_count);
        Ok(applied.change_count)
    }

    /// Replay the step undone last. Returns the recorded change count.
    pub fn redo(&mut self, doc: &mut ShapeDoc) -> RecordResult<Option<i64>> {
        if self.last.is_none() {
            return Err(RecordError::Playing);
        }
        let applied = {
            let _guard = LoadingGuard::enter(&self.loading)?;
            if self.file_count >= self.max_count {
                return Err(RecordError::NoHistory("redo"));
            }
            let path = Self::step_file(&self.path, false, self.file_count);
            Self::apply_file(&path, Some(doc), None)?
        };

        self.file_count += 1;
        self.after_load(doc, applied);
        log::debug!("Redo {}", self.file_count);
        Ok(applied.change_count)
    }

    fn after_load(&mut self, doc: &ShapeDoc, applied: Applied) {
        self.versions = versions_of(doc.shapes());
        self.last = Some(doc.shapes().shallow_copy());
        if let Some(tick) = applied.tick {
            self.tick = tick;
        }
    }

    /// Forget the remembered shapes and compare the next step against `doc`.
    pub fn reset_doc(&mut self, doc: &ShapeDoc) {
        self.versions = versions_of(doc.shapes());
        self.last = Some(doc.shapes().shallow_copy());
    }

    /// Play the next forward file of a playback journal into `doc` and `dyns`.
    pub fn play_next(&mut self, doc: &mut ShapeDoc, dyns: Option<&mut ShapeList>) -> RecordResult<Applied> {
        let _guard = LoadingGuard::enter(&self.loading)?;
        let index = self.file_count.max(1);
        let path = Self::step_file(&self.path, false, index);
        // An empty frame still advances playback.
        let applied = match Self::apply_file(&path, Some(doc), dyns) {
            Err(RecordError::NothingApplied(_)) => Applied::default(),
            result => result?,
        };
        self.file_count = index + 1;
        self.max_count = self.max_count.max(self.file_count);
        if let Some(tick) = applied.tick {
            self.tick = tick;
        }
        Ok(applied)
    }

    /// Apply one journal file to `doc` and/or `dyns`.
    ///
    /// The file is parsed and applied to copies first; the targets change
    /// only when the whole file was applied.
    pub fn apply_file(path: &Path, doc: Option<&mut ShapeDoc>, dyns: Option<&mut ShapeList>) -> RecordResult<Applied> {
        let mut s = read_json_file(path)?;
        if !s.read_node("record", -1, false) {
            return Err(StorageError::MissingNode(format!("record in {}", path.display())).into());
        }
        let mut applied = Applied::default();

        if let Some(doc) = doc {
            let mut layer = doc.shapes().shallow_copy();
            let flags = s.read_uint("flags", 0);

            if flags & (Self::ADD | Self::EDIT) != 0 {
                if !layer.load(&mut s, true) {
                    let msg = s.error().unwrap_or("invalid shapes").to_string();
                    return Err(StorageError::Serialization(format!("{}: {}", path.display(), msg)).into());
                }
                if flags == Self::ADD {
                    applied.result |= Self::APPEND;
                    applied.new_id = layer.last().map(Shape::id);
                } else {
                    applied.result |= Self::STD_CHANGED;
                }
            }
            if s.read_node("delete", -1, false) {
                for i in 0.. {
                    let sid = s.read_uint(&format!("d{}", i), 0);
                    if sid == 0 {
                        break;
                    }
                    if layer.remove_shape(sid).is_some() {
                        applied.result |= Self::STD_CHANGED;
                    }
                }
                s.read_node("delete", -1, true);
            }

            let view = load_view_state(&mut s);
            std::mem::swap(doc.shapes_mut(), &mut layer);
            if let Some((transform, page, scale)) = view {
                doc.transform = transform;
                if let Some(page) = page {
                    doc.page_extent = page;
                }
                doc.view_scale = scale;
            }
        }

        if let Some(dyns) = dyns {
            if s.read_node("dynamic", -1, false) {
                let mut list = ShapeList::new();
                if list.load(&mut s, false) {
                    *dyns = list;
                    applied.result |= Self::DYN_CHANGED;
                }
                s.read_node("dynamic", -1, true);
            }
        }

        if applied.result == 0 {
            return Err(RecordError::NothingApplied(path.display().to_string()));
        }
        applied.tick = Some(s.read_long("tick", 0));
        applied.change_count = Some(s.read_long("changeCount", 0));
        s.read_node("record", -1, true);
        Ok(applied)
    }

    /// Read the step index of a journal directory.
    pub fn load_index(path: &Path) -> RecordResult<Vec<RecordEntry>> {
        let file = path.join(Self::INDEX_FILE);
        let text = std::fs::read_to_string(&file)
            .map_err(|e| RecordError::Io(format!("Failed to read {}: {}", file.display(), e)))?;
        let index: RecordsIndex =
            serde_json::from_str(&text).map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(index.records)
    }

    fn save_index(&self) -> RecordResult<()> {
        let index = RecordsIndex {
            records: self.index.values().copied().collect(),
        };
        let text = if self.options.pretty {
            serde_json::to_string_pretty(&index)
        } else {
            serde_json::to_string(&index)
        }
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let file = self.path.join(Self::INDEX_FILE);
        write_file_atomic(&file, &text)?;
        log::debug!("Save records: {}", file.display());
        Ok(())
    }

    /// Flush the index. Further steps may still be recorded.
    pub fn stop(&mut self) {
        self.stopped = true;
        if self.index.is_empty() {
            return;
        }
        if let Err(e) = self.save_index() {
            log::error!("Fail to save records index: {}", e);
        }
    }
}

impl Drop for RecordShapes {
    fn drop(&mut self) {
        if !self.stopped {
            self.stop();
        }
    }
}

fn versions_of(shapes: &ShapeList) -> BTreeMap<ShapeId, u32> {
    shapes.iter().map(|sp| (sp.id(), sp.change_count())).collect()
}

fn begin_step(tick: i64) -> JsonStorage {
    let mut s = JsonStorage::new();
    s.write_node("record", -1, false);
    s.write_long("tick", tick);
    s
}

fn write_delete(s: &mut dyn Storage, ids: &[ShapeId]) {
    s.write_node("delete", -1, false);
    for (j, id) in ids.iter().enumerate() {
        s.write_uint(&format!("d{}", j), *id);
    }
    s.write_node("delete", -1, true);
}

fn save_view_state(s: &mut dyn Storage, doc: &ShapeDoc) {
    s.write_float_array("transform", &doc.transform.as_coeffs());
    save_rect(s, "pageExtent", doc.page_extent);
    s.write_float("viewScale", doc.view_scale);
}

fn load_view_state(s: &mut dyn Storage) -> Option<(Affine, Option<kurbo::Rect>, f64)> {
    let coeffs = read_floats::<6>(s, "transform")?;
    let page = load_rect(s, "pageExtent");
    let scale = s.read_float("viewScale", 1.0);
    Some((Affine::new(coeffs), page, scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{BaseRect, Dot, RectKind, ShapeKind};
    use kurbo::{Point, Rect, Vec2};

    fn rect_shape(rect: Rect) -> Shape {
        Shape::new(ShapeKind::Rect(BaseRect::from_rect(RectKind::Rect, rect)))
    }

    fn content(doc: &ShapeDoc) -> String {
        let mut s = JsonStorage::new();
        assert!(doc.shapes().save(&mut s));
        s.to_json(false).unwrap()
    }

    fn move_shape(doc: &mut ShapeDoc, id: ShapeId, by: Vec2) {
        let mut sp = doc.shapes().find_shape(id).unwrap().clone();
        sp.offset(by, -1);
        assert!(doc.shapes_mut().update_shape(sp));
    }

    struct Journal {
        _dir: tempfile::TempDir,
        rec: RecordShapes,
        doc: ShapeDoc,
        tick: i64,
    }

    impl Journal {
        fn new(for_undo: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let doc = ShapeDoc::new();
            let rec = RecordShapes::new(dir.path(), Some(&doc), for_undo, 0);
            Self {
                _dir: dir,
                rec,
                doc,
                tick: 0,
            }
        }

        fn step(&mut self) -> bool {
            self.tick += 100;
            self.rec.record_step(self.tick, self.tick, &self.doc, None).unwrap()
        }
    }

    #[test]
    fn test_step_files_and_flags() {
        let mut j = Journal::new(true);
        let id = j.doc.shapes_mut().add_shape(&rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        assert!(j.step());
        assert_eq!(j.rec.file_flags(), RecordShapes::ADD);
        assert!(j.rec.file_name(false, 1).exists());
        assert!(j.rec.file_name(true, 1).exists());
        assert_eq!(j.rec.file_count(), 2);

        move_shape(&mut j.doc, id, Vec2::new(1.0, 0.0));
        assert!(j.step());
        assert_eq!(j.rec.file_flags(), RecordShapes::EDIT);

        j.doc.shapes_mut().remove_shape(id);
        assert!(j.step());
        assert_eq!(j.rec.file_flags(), RecordShapes::DEL);
        assert_eq!(j.rec.file_count(), 4);
        assert!(j.rec.can_undo());
        assert!(!j.rec.can_redo());
    }

    #[test]
    fn test_unchanged_document_writes_nothing() {
        let mut j = Journal::new(true);
        assert!(!j.step());
        assert_eq!(j.rec.file_count(), 1);
        assert!(!j.rec.can_undo());
    }

    #[test]
    fn test_undo_twice_restores_first_edit() {
        let mut j = Journal::new(true);
        let id = j.doc.shapes_mut().add_shape(&rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        j.step();
        let after_first = content(&j.doc);

        move_shape(&mut j.doc, id, Vec2::new(5.0, 5.0));
        j.step();
        j.doc.shapes_mut().remove_shape(id);
        j.step();
        assert!(j.doc.shapes().is_empty());

        j.rec.undo(&mut j.doc).unwrap();
        assert_eq!(j.doc.shapes().find_shape(id).unwrap().extent(), Rect::new(5.0, 5.0, 15.0, 15.0));
        j.rec.undo(&mut j.doc).unwrap();
        assert_eq!(content(&j.doc), after_first);
        assert_eq!(j.rec.file_count(), 2);
        assert!(j.rec.can_redo());
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut j = Journal::new(true);
        let a = j.doc.shapes_mut().add_shape(&rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        j.step();
        let b = j.doc.shapes_mut().add_shape(&Shape::new(ShapeKind::Dot(Dot::new(Point::new(3.0, 4.0)))));
        j.step();
        move_shape(&mut j.doc, a, Vec2::new(2.0, -1.0));
        j.step();
        j.doc.shapes_mut().remove_shape(b);
        j.step();
        let final_content = content(&j.doc);

        for _ in 0..4 {
            j.rec.undo(&mut j.doc).unwrap();
        }
        assert!(j.doc.shapes().is_empty());
        assert!(!j.rec.can_undo());
        assert!(matches!(j.rec.undo(&mut j.doc), Err(RecordError::NoHistory(_))));

        for _ in 0..4 {
            j.rec.redo(&mut j.doc).unwrap();
        }
        assert_eq!(content(&j.doc), final_content);
        assert!(!j.rec.can_redo());
    }

    #[test]
    fn test_new_step_after_undo_drops_redo() {
        let mut j = Journal::new(true);
        let id = j.doc.shapes_mut().add_shape(&rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        j.step();
        move_shape(&mut j.doc, id, Vec2::new(1.0, 1.0));
        j.step();
        j.rec.undo(&mut j.doc).unwrap();
        assert!(j.rec.can_redo());

        move_shape(&mut j.doc, id, Vec2::new(0.0, 3.0));
        assert!(j.step());
        assert!(!j.rec.can_redo());
        assert_eq!(j.rec.max_count(), 3);
    }

    #[test]
    fn test_busy_journal_rejects_undo() {
        let mut j = Journal::new(true);
        j.doc.shapes_mut().add_shape(&rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        j.step();
        j.rec.set_loading(true);
        assert!(!j.rec.can_undo());
        let before = content(&j.doc);
        assert!(matches!(j.rec.undo(&mut j.doc), Err(RecordError::Busy)));
        assert_eq!(content(&j.doc), before);
        j.rec.set_loading(false);
        assert!(j.rec.can_undo());
    }

    #[test]
    fn test_missing_file_leaves_state() {
        let mut j = Journal::new(true);
        j.doc.shapes_mut().add_shape(&rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        j.step();
        std::fs::remove_file(j.rec.file_name(true, 1)).unwrap();
        let before = content(&j.doc);
        assert!(matches!(
            j.rec.undo(&mut j.doc),
            Err(RecordError::Storage(StorageError::NotFound(_)))
        ));
        assert_eq!(j.rec.file_count(), 2);
        assert_eq!(content(&j.doc), before);
    }

    #[test]
    fn test_playback_journal() {
        let mut j = Journal::new(false);
        let mut dyns = ShapeList::new();
        dyns.add_shape(&Shape::new(ShapeKind::Dot(Dot::new(Point::new(1.0, 1.0)))));
        j.doc.shapes_mut().add_shape(&rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        j.tick = 250;
        assert!(j.rec.record_step(j.tick, 1, &j.doc, Some(&dyns)).unwrap());
        assert_eq!(j.rec.file_flags(), RecordShapes::ADD | RecordShapes::DYN);
        j.rec.stop();

        let entries = RecordShapes::load_index(j.rec.path()).unwrap();
        assert_eq!(entries, vec![RecordEntry { index: 1, tick: 250, flags: RecordShapes::ADD | RecordShapes::DYN }]);

        let mut player = RecordShapes::new(j.rec.path(), None, false, 0);
        assert!(player.is_playing());
        let mut doc = ShapeDoc::new();
        let mut played = ShapeList::new();
        let applied = player.play_next(&mut doc, Some(&mut played)).unwrap();
        assert_eq!(applied.result, RecordShapes::STD_CHANGED | RecordShapes::DYN_CHANGED);
        assert_eq!(applied.tick, Some(250));
        assert_eq!(content(&doc), content(&j.doc));
        assert_eq!(played.len(), 1);
        assert_eq!(player.file_tick(), 250);
        assert!(matches!(player.record_step(0, 0, &doc, None), Err(RecordError::Playing)));
    }

    #[test]
    fn test_restore_and_resume_ticks() {
        let mut j = Journal::new(true);
        j.rec.restore(3, 5, 1000, 4000);
        assert_eq!(j.rec.file_count(), 3);
        assert!(j.rec.can_undo());
        assert!(j.rec.can_redo());
        assert_eq!(j.rec.current_tick(4500), 1500);
        assert!(j.rec.on_resume(200));
        assert_eq!(j.rec.current_tick(4500), 1300);
        assert!(!j.rec.on_resume(-1));
    }
}
