//! Document holding shape layers and the view state saved with them.

use crate::render::Surface;
use crate::shapes::{DrawContext, ShapeList, load_rect, save_rect};
use crate::storage::{
    JsonStorage, Storage, StorageError, StorageResult, read_floats, read_json_file,
    write_file_atomic,
};
use kurbo::{Affine, Rect};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// A document: ordered layers of shapes plus the model transform and page.
#[derive(Debug, Clone)]
pub struct ShapeDoc {
    /// Unique document identifier.
    pub id: String,
    layers: Vec<ShapeList>,
    current_layer: usize,
    /// Model to world transform saved with the document.
    pub transform: Affine,
    pub page_extent: Rect,
    pub view_scale: f64,
    /// Style given to newly drawn shapes.
    pub context: DrawContext,
    read_only: bool,
}

impl Default for ShapeDoc {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeDoc {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            layers: vec![ShapeList::new()],
            current_layer: 0,
            transform: Affine::IDENTITY,
            page_extent: Rect::ZERO,
            view_scale: 1.0,
            context: DrawContext::default(),
            read_only: false,
        }
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: usize) -> Option<&ShapeList> {
        self.layers.get(index)
    }

    pub fn current_layer(&self) -> usize {
        self.current_layer
    }

    pub fn set_current_layer(&mut self, index: usize) -> bool {
        if index < self.layers.len() {
            self.current_layer = index;
            true
        } else {
            false
        }
    }

    /// Append an empty layer and make it current. Returns its index.
    pub fn add_layer(&mut self) -> usize {
        self.layers.push(ShapeList::new());
        self.current_layer = self.layers.len() - 1;
        self.current_layer
    }

    /// Shapes of the current layer.
    pub fn shapes(&self) -> &ShapeList {
        &self.layers[self.current_layer]
    }

    pub fn shapes_mut(&mut self) -> &mut ShapeList {
        &mut self.layers[self.current_layer]
    }

    /// Number of shapes over all layers.
    pub fn shape_count(&self) -> usize {
        self.layers.iter().map(ShapeList::len).sum()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn extent(&self) -> Rect {
        self.layers
            .iter()
            .filter(|l| !l.is_empty())
            .map(ShapeList::extent)
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO)
    }

    /// Remove every shape and extra layer.
    pub fn clear(&mut self) {
        self.layers.truncate(1);
        self.layers[0].clear();
        self.current_layer = 0;
    }

    /// Copy sharing every shape instance, for publishing to readers.
    pub fn shallow_copy(&self) -> ShapeDoc {
        Self {
            id: self.id.clone(),
            layers: self.layers.iter().map(ShapeList::shallow_copy).collect(),
            current_layer: self.current_layer,
            transform: self.transform,
            page_extent: self.page_extent,
            view_scale: self.view_scale,
            context: self.context.clone(),
            read_only: self.read_only,
        }
    }

    /// Draw all layers bottom to top. Stops between shapes once `stop` is set.
    ///
    /// Returns the number of shapes drawn.
    pub fn draw(&self, surface: &mut dyn Surface, stop: &AtomicBool) -> usize {
        let mut count = 0;
        for layer in &self.layers {
            for sp in layer.iter() {
                if stop.load(Ordering::Acquire) {
                    return count;
                }
                sp.draw(surface);
                count += 1;
            }
        }
        count
    }

    pub fn save(&self, s: &mut dyn Storage) -> bool {
        s.write_string("id", &self.id);
        s.write_float_array("transform", &self.transform.as_coeffs());
        save_rect(s, "pageExtent", self.page_extent);
        s.write_float("viewScale", self.view_scale);
        s.write_bool("readOnly", self.read_only);
        s.write_int("currentLayer", self.current_layer as i32);

        s.write_node("context", -1, false);
        self.context.save(s);
        s.write_node("context", -1, true);

        s.write_int("layerCount", self.layers.len() as i32);
        let mut ok = true;
        for (index, layer) in self.layers.iter().enumerate() {
            s.write_node("layer", index as i32, false);
            ok &= layer.save(s);
            s.write_node("layer", index as i32, true);
        }
        ok
    }

    /// Read a document node. On failure the document is left unchanged.
    pub fn load(&mut self, s: &mut dyn Storage) -> bool {
        let mut doc = Self::new();
        if let Some(id) = s.read_string("id") {
            doc.id = id;
        }
        if let Some(c) = read_floats::<6>(s, "transform") {
            doc.transform = Affine::new(c);
        }
        if let Some(rect) = load_rect(s, "pageExtent") {
            doc.page_extent = rect;
        }
        doc.view_scale = s.read_float("viewScale", 1.0);
        doc.read_only = s.read_bool("readOnly", false);
        if s.read_node("context", -1, false) {
            doc.context.load(s);
            s.read_node("context", -1, true);
        }

        let count = s.read_int("layerCount", 0).max(0) as usize;
        if count == 0 {
            // Single unlayered shape list.
            if !doc.layers[0].load(s, false) {
                return false;
            }
        } else {
            doc.layers.clear();
            for index in 0..count {
                if !s.read_node("layer", index as i32, false) {
                    return s.set_error(&format!("missing layer {}", index));
                }
                let mut layer = ShapeList::new();
                let ok = layer.load(s, false);
                s.read_node("layer", index as i32, true);
                if !ok {
                    return false;
                }
                doc.layers.push(layer);
            }
        }
        let current = s.read_int("currentLayer", 0).max(0) as usize;
        doc.current_layer = current.min(doc.layers.len() - 1);

        *self = doc;
        true
    }

    /// Serialize to JSON text.
    pub fn to_json(&self, pretty: bool) -> StorageResult<String> {
        let mut s = JsonStorage::new();
        if !self.save(&mut s) {
            return Err(StorageError::Serialization(
                s.error().unwrap_or("save failed").to_string(),
            ));
        }
        s.to_json(pretty)
    }

    /// Save through a temporary sibling file; a failed save leaves no file behind.
    pub fn save_to_file(&self, path: &Path, pretty: bool) -> StorageResult<()> {
        let text = self.to_json(pretty)?;
        write_file_atomic(path, &text)
    }

    pub fn load_from_json(&mut self, text: &str) -> StorageResult<()> {
        let mut s = JsonStorage::from_json(text)?;
        self.load_storage(&mut s)
    }

    pub fn load_from_file(&mut self, path: &Path) -> StorageResult<()> {
        let mut s = read_json_file(path)?;
        self.load_storage(&mut s)
    }

    fn load_storage(&mut self, s: &mut JsonStorage) -> StorageResult<()> {
        if self.load(s) {
            Ok(())
        } else {
            Err(StorageError::Serialization(
                s.error().unwrap_or("invalid document").to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RecordingSurface;
    use crate::shapes::{BaseRect, Line, RectKind, Shape, ShapeKind};
    use kurbo::Point;

    fn sample_doc() -> ShapeDoc {
        let mut doc = ShapeDoc::new();
        doc.page_extent = Rect::new(0.0, 0.0, 210.0, 297.0);
        doc.transform = Affine::scale(2.0);
        doc.shapes_mut().add_shape(&Shape::new(ShapeKind::Line(Line::new(
            Point::ZERO,
            Point::new(10.0, 0.0),
        ))));
        doc.shapes_mut().add_shape(&Shape::new(ShapeKind::Rect(BaseRect::from_rect(
            RectKind::Ellipse,
            Rect::new(0.0, 0.0, 4.0, 2.0),
        ))));
        doc
    }

    #[test]
    fn test_json_round_trip() {
        let doc = sample_doc();
        let text = doc.to_json(false).unwrap();
        let mut loaded = ShapeDoc::new();
        loaded.load_from_json(&text).unwrap();
        assert_eq!(loaded.id, doc.id);
        assert_eq!(loaded.page_extent, doc.page_extent);
        assert_eq!(loaded.transform, doc.transform);
        assert_eq!(loaded.shapes(), doc.shapes());
        assert_eq!(loaded.to_json(false).unwrap(), text);
    }

    #[test]
    fn test_failed_load_keeps_document() {
        let mut doc = sample_doc();
        let before = doc.to_json(false).unwrap();
        let bad = r#"{"layerCount": 2, "layer0": {"shapes": {}}}"#;
        assert!(doc.load_from_json(bad).is_err());
        assert_eq!(doc.to_json(false).unwrap(), before);
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.vg");
        let doc = sample_doc();
        doc.save_to_file(&path, true).unwrap();
        let mut loaded = ShapeDoc::new();
        loaded.load_from_file(&path).unwrap();
        assert_eq!(loaded.shape_count(), 2);

        let missing = dir.path().join("nope").join("doc.vg");
        assert!(doc.save_to_file(&missing, false).is_err());
        assert!(!missing.exists());
        assert!(matches!(
            loaded.load_from_file(&missing),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_shallow_copy_and_layers() {
        let mut doc = sample_doc();
        let copy = doc.shallow_copy();
        assert_eq!(copy.shapes().id(), doc.shapes().id());
        assert_eq!(doc.add_layer(), 1);
        assert_eq!(doc.layer_count(), 2);
        assert!(doc.shapes().is_empty());
        assert_eq!(copy.layer_count(), 1);
        doc.clear();
        assert_eq!(doc.layer_count(), 1);
        assert_eq!(doc.shape_count(), 0);
    }

    #[test]
    fn test_draw_stops_on_flag() {
        let doc = sample_doc();
        let mut surface = RecordingSurface::new();
        let stop = AtomicBool::new(false);
        assert_eq!(doc.draw(&mut surface, &stop), 2);
        stop.store(true, Ordering::Release);
        assert_eq!(doc.draw(&mut surface, &stop), 0);
    }
}
