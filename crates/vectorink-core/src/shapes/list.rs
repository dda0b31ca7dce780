//! Ordered, id-indexed shape container.

use super::{ContainerId, HitResult, Shape, ShapeId, ShapeType, ZERO_TOL, save_rect};
use crate::storage::Storage;
use kurbo::{Affine, Rect};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_CONTAINER_ID: AtomicU32 = AtomicU32::new(1);

fn next_container_id() -> ContainerId {
    NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Shapes in z-order (last is topmost), indexed by id.
///
/// Shapes are shared through `Arc` so snapshots can reference them; a
/// published shape is never mutated in place, edits go through
/// [`ShapeList::update_shape`] with a modified clone.
#[derive(Debug)]
pub struct ShapeList {
    id: ContainerId,
    shapes: HashMap<ShapeId, Arc<Shape>>,
    z_order: Vec<ShapeId>,
    /// Next candidate for id assignment.
    new_shape_id: ShapeId,
}

impl Default for ShapeList {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep copy into a new container; shapes keep their ids.
impl Clone for ShapeList {
    fn clone(&self) -> Self {
        let mut list = Self::new();
        list.new_shape_id = self.new_shape_id;
        for sp in self.iter() {
            let mut copy = sp.clone();
            copy.parent = Some(list.id);
            list.shapes.insert(copy.id, Arc::new(copy));
            list.z_order.push(sp.id);
        }
        list
    }
}

/// Content equality in z-order, ignoring container identity.
impl PartialEq for ShapeList {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a.equals(b))
    }
}

impl ShapeList {
    pub fn new() -> Self {
        Self {
            id: next_container_id(),
            shapes: HashMap::new(),
            z_order: Vec::new(),
            new_shape_id: 1,
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.z_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.z_order.is_empty()
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains_key(&id)
    }

    /// Shape ids in z-order.
    pub fn ids(&self) -> &[ShapeId] {
        &self.z_order
    }

    /// Shapes from bottom to top.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Shape> + '_ {
        self.z_order
            .iter()
            .filter_map(move |id| self.shapes.get(id).map(|sp| sp.as_ref()))
    }

    pub fn iter_arcs(&self) -> impl Iterator<Item = &Arc<Shape>> + '_ {
        self.z_order.iter().filter_map(move |id| self.shapes.get(id))
    }

    pub fn find_shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id).map(|sp| sp.as_ref())
    }

    pub fn find_arc(&self, id: ShapeId) -> Option<&Arc<Shape>> {
        self.shapes.get(&id)
    }

    pub fn find_shape_by_tag(&self, tag: i32) -> Option<&Shape> {
        if tag == 0 {
            return None;
        }
        self.iter().find(|sp| sp.tag == tag)
    }

    pub fn find_shape_by_type(&self, ty: ShapeType) -> Option<&Shape> {
        self.iter().find(|sp| sp.shape_type() == ty)
    }

    pub fn index_of(&self, id: ShapeId) -> Option<usize> {
        self.z_order.iter().position(|sid| *sid == id)
    }

    pub fn first(&self) -> Option<&Shape> {
        self.iter().next()
    }

    pub fn last(&self) -> Option<&Shape> {
        self.iter().next_back()
    }

    /// Resolve the id for a new shape: `sid` if free, else the next free
    /// value of the monotonic counter.
    fn get_new_id(&mut self, sid: ShapeId) -> ShapeId {
        if sid != 0 && !self.contains(sid) {
            return sid;
        }
        while self.contains(self.new_shape_id) || self.new_shape_id == 0 {
            self.new_shape_id = self.new_shape_id.wrapping_add(1);
        }
        let id = self.new_shape_id;
        self.new_shape_id = self.new_shape_id.wrapping_add(1);
        id
    }

    fn insert(&mut self, mut shape: Shape) -> ShapeId {
        let id = self.get_new_id(shape.id);
        shape.id = id;
        shape.parent = Some(self.id);
        self.shapes.insert(id, Arc::new(shape));
        self.z_order.push(id);
        id
    }

    /// Add a copy of `shape` on top. Returns the id given to the copy.
    pub fn add_shape(&mut self, shape: &Shape) -> ShapeId {
        let mut copy = shape.clone();
        copy.change_count = 1;
        self.insert(copy)
    }

    /// Take ownership of `shape` and add it on top, keeping its change count.
    pub fn add_shape_direct(&mut self, shape: Shape) -> ShapeId {
        self.insert(shape)
    }

    /// Replace the shape with the same id, keeping its z-position.
    ///
    /// The new change count is the old one plus one.
    pub fn update_shape(&mut self, mut shape: Shape) -> bool {
        let Some(old) = self.shapes.get(&shape.id) else {
            return false;
        };
        shape.change_count = old.change_count.wrapping_add(1);
        shape.parent = Some(self.id);
        self.shapes.insert(shape.id, Arc::new(shape));
        true
    }

    /// Overwrite the change count of a stored shape. Shared instances are copied first.
    pub(crate) fn set_change_count(&mut self, id: ShapeId, count: u32) -> bool {
        match self.shapes.get_mut(&id) {
            Some(sp) => {
                Arc::make_mut(sp).change_count = count;
                true
            }
            None => false,
        }
    }

    pub fn remove_shape(&mut self, id: ShapeId) -> Option<Arc<Shape>> {
        let removed = self.shapes.remove(&id)?;
        self.z_order.retain(|sid| *sid != id);
        Some(removed)
    }

    /// Move a shape into another container. Returns its id there.
    pub fn move_shape_to(&mut self, id: ShapeId, dest: &mut ShapeList) -> Option<ShapeId> {
        let sp = self.remove_shape(id)?;
        let shape = Arc::try_unwrap(sp).unwrap_or_else(|shared| (*shared).clone());
        Some(dest.add_shape_direct(shape))
    }

    /// Add copies of every shape to `dest`. Returns the number copied.
    pub fn copy_shapes_to(&self, dest: &mut ShapeList) -> usize {
        let mut count = 0;
        for sp in self.iter() {
            dest.add_shape(sp);
            count += 1;
        }
        count
    }

    pub fn bring_to_front(&mut self, id: ShapeId) -> bool {
        let Some(pos) = self.index_of(id) else {
            return false;
        };
        let sid = self.z_order.remove(pos);
        self.z_order.push(sid);
        true
    }

    pub fn extent(&self) -> Rect {
        self.iter()
            .map(Shape::extent)
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO)
    }

    /// Find the topmost shape near `limits.center()`.
    ///
    /// Locked shapes are skipped. Unfilled shapes are hit within half the
    /// limits width, filled shapes anywhere inside. On near-equal distances
    /// the later (higher) shape wins.
    pub fn hit_test(
        &self,
        limits: Rect,
        filter: Option<&dyn Fn(&Shape) -> bool>,
    ) -> Option<(ShapeId, HitResult)> {
        let pt = limits.center();
        let mut best: Option<(ShapeId, HitResult)> = None;

        for sp in self.iter() {
            if sp.is_locked() || filter.is_some_and(|f| !f(sp)) {
                continue;
            }
            let extent = sp.extent();
            if !super::rects_overlap(extent, limits) {
                continue;
            }
            let filled = sp.has_fill_color();
            let tol = if filled {
                (extent.width().hypot(extent.height()) / 2.0).max(limits.width() / 2.0)
            } else {
                limits.width() / 2.0
            };
            let mut res = sp.hit_test(pt, tol);
            if filled && res.inside {
                res.dist = 0.0;
            }
            if res.dist > tol {
                continue;
            }
            let better = match &best {
                Some((_, b)) => b.dist > res.dist - ZERO_TOL,
                None => true,
            };
            if better {
                best = Some((sp.id, res));
            }
        }
        best
    }

    /// Visit shapes of a type (all shapes when `None`), descending into groups.
    pub fn traverse_by_type(&self, ty: Option<ShapeType>, visitor: &mut dyn FnMut(&Shape)) -> usize {
        let mut count = 0;
        for sp in self.iter() {
            if ty.is_none_or(|t| t == sp.shape_type()) {
                visitor(sp);
                count += 1;
            }
            if let Some(group) = sp.as_group() {
                count += group.shapes().traverse_by_type(ty, visitor);
            }
        }
        count
    }

    /// Copy sharing every shape instance, keeping this container's identity.
    pub fn shallow_copy(&self) -> ShapeList {
        Self {
            id: self.id,
            shapes: self.shapes.clone(),
            z_order: self.z_order.clone(),
            new_shape_id: self.new_shape_id,
        }
    }

    pub fn clear(&mut self) {
        self.shapes.clear();
        self.z_order.clear();
    }

    /// Transform every shape, cloning shared instances first.
    pub fn transform_all(&mut self, affine: Affine) {
        for sp in self.shapes.values_mut() {
            Arc::make_mut(sp).transform(affine);
        }
    }

    /// Write a `shapes` node with one `shape{i}` child per shape.
    pub fn save(&self, s: &mut dyn Storage) -> bool {
        if !s.write_node("shapes", -1, false) {
            return false;
        }
        save_rect(s, "extent", self.extent());
        s.write_int("count", self.len() as i32);
        for (index, sp) in self.iter().enumerate() {
            Self::save_shape(s, sp, index as i32);
        }
        s.write_node("shapes", -1, true)
    }

    /// Write one `shape{index}` node inside an opened `shapes` node.
    pub fn save_shape(s: &mut dyn Storage, sp: &Shape, index: i32) {
        s.write_node("shape", index, false);
        s.write_uint("type", sp.shape_type().tag() & 0xFFFF);
        s.write_uint("id", sp.id);
        save_rect(s, "extent", sp.extent());
        sp.save(s);
        s.write_node("shape", index, true);
    }

    /// Read a `shapes` node.
    ///
    /// With `add_only` the current shapes are kept, and shapes whose id
    /// already exists replace the old instance through `update_shape`.
    pub fn load(&mut self, s: &mut dyn Storage, add_only: bool) -> bool {
        if !s.read_node("shapes", -1, false) {
            return s.set_error("missing shapes node");
        }
        if !add_only {
            self.clear();
        }
        let mut ok = true;
        let mut index = 0;
        while s.read_node("shape", index, false) {
            let tag = s.read_uint("type", 0);
            let id = s.read_uint("id", 0);
            match ShapeType::from_tag(tag) {
                Some(ty) => {
                    let mut shape = Shape::from_type(ty);
                    shape.id = id;
                    if shape.load(s) {
                        if add_only && self.contains(id) {
                            self.update_shape(shape);
                        } else {
                            shape.change_count = 1;
                            self.add_shape_direct(shape);
                        }
                    } else {
                        ok = false;
                    }
                }
                None => {
                    ok = s.set_error(&format!("unknown shape type {}", tag));
                }
            }
            s.read_node("shape", index, true);
            index += 1;
        }
        s.read_node("shapes", -1, true);
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{BaseRect, DrawColor, Dot, Line, RectKind, ShapeKind};
    use crate::storage::JsonStorage;
    use kurbo::{Point, Size};
    use std::collections::HashSet;

    fn rect_shape(rect: Rect) -> Shape {
        Shape::new(ShapeKind::Rect(BaseRect::from_rect(RectKind::Rect, rect)))
    }

    fn filled(rect: Rect) -> Shape {
        let mut sp = rect_shape(rect);
        sp.context.fill_color = DrawColor::new(200, 0, 0, 255);
        sp
    }

    fn limits(pt: Point, tol: f64) -> Rect {
        Rect::from_center_size(pt, Size::new(tol * 2.0, tol * 2.0))
    }

    fn assert_parents(list: &ShapeList) {
        for sp in list.iter() {
            assert_eq!(sp.parent(), Some(list.id()));
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let mut list = ShapeList::new();
        let mut dot = Shape::new(ShapeKind::Dot(Dot::new(Point::ZERO)));
        dot.id = 5;
        let a = list.add_shape(&dot);
        let b = list.add_shape(&dot);
        let c = list.add_shape(&Shape::from_type(ShapeType::Line));
        assert_eq!(a, 5);
        assert_ne!(a, b);
        let ids: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(&0));

        list.remove_shape(b);
        let d = list.add_shape(&dot);
        let all: HashSet<_> = list.ids().iter().copied().collect();
        assert_eq!(all.len(), list.len());
        assert!(list.contains(d));
    }

    #[test]
    fn test_parent_invariant() {
        let mut list = ShapeList::new();
        let a = list.add_shape(&rect_shape(Rect::new(0.0, 0.0, 1.0, 1.0)));
        let b = list.add_shape_direct(Shape::from_type(ShapeType::Line));
        assert_parents(&list);

        let mut edited = list.find_shape(a).unwrap().clone();
        edited.offset(kurbo::Vec2::new(1.0, 0.0), -1);
        assert!(list.update_shape(edited));
        assert_parents(&list);

        list.remove_shape(b);
        assert_parents(&list);

        let mut other = ShapeList::new();
        let moved = list.move_shape_to(a, &mut other).unwrap();
        assert_eq!(other.find_shape(moved).unwrap().parent(), Some(other.id()));
        assert!(list.is_empty());
    }

    #[test]
    fn test_find_by_tag_and_type_and_copy() {
        let mut list = ShapeList::new();
        let mut tagged = rect_shape(Rect::new(0.0, 0.0, 1.0, 1.0));
        tagged.tag = 7;
        let a = list.add_shape(&tagged);
        let b = list.add_shape_direct(Shape::from_type(ShapeType::Line));

        assert_eq!(list.find_shape_by_tag(7).map(Shape::id), Some(a));
        assert!(list.find_shape_by_tag(0).is_none());
        assert!(list.find_shape_by_tag(8).is_none());
        assert_eq!(list.find_shape_by_type(ShapeType::Line).map(Shape::id), Some(b));
        assert!(list.find_shape_by_type(ShapeType::Dot).is_none());

        let mut other = ShapeList::new();
        assert_eq!(list.copy_shapes_to(&mut other), 2);
        assert_eq!(list.len(), 2);
        assert_eq!(other.len(), 2);
        assert_parents(&other);
        assert_eq!(other.find_shape_by_tag(7).unwrap().extent(), Rect::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_update_keeps_position_and_bumps_count() {
        let mut list = ShapeList::new();
        let a = list.add_shape(&rect_shape(Rect::new(0.0, 0.0, 1.0, 1.0)));
        let b = list.add_shape(&rect_shape(Rect::new(2.0, 2.0, 3.0, 3.0)));
        assert_eq!(list.find_shape(a).unwrap().change_count(), 1);

        let mut edited = list.find_shape(a).unwrap().clone();
        edited.transform(Affine::translate((5.0, 0.0)));
        edited.transform(Affine::translate((5.0, 0.0)));
        assert!(list.update_shape(edited));
        assert_eq!(list.ids(), &[a, b]);
        assert_eq!(list.find_shape(a).unwrap().change_count(), 2);

        let mut stranger = Shape::from_type(ShapeType::Dot);
        stranger.id = 99;
        assert!(!list.update_shape(stranger));
    }

    #[test]
    fn test_hit_test_later_shape_wins() {
        let mut list = ShapeList::new();
        let _r1 = list.add_shape(&rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0)));
        let r2 = list.add_shape(&rect_shape(Rect::new(5.0, 5.0, 15.0, 15.0)));
        let (hit, _) = list.hit_test(limits(Point::new(7.0, 7.0), 5.0), None).unwrap();
        assert_eq!(hit, r2);
    }

    #[test]
    fn test_hit_test_filled_overlap_prefers_top() {
        let mut list = ShapeList::new();
        let a = list.add_shape(&filled(Rect::new(0.0, 0.0, 20.0, 20.0)));
        let b = list.add_shape(&filled(Rect::new(5.0, 5.0, 15.0, 15.0)));
        let p = limits(Point::new(10.0, 10.0), 1.0);
        assert_eq!(list.hit_test(p, None).unwrap().0, b);

        list.bring_to_front(a);
        assert_eq!(list.hit_test(p, None).unwrap().0, a);
    }

    #[test]
    fn test_hit_test_skips_locked_and_far() {
        let mut list = ShapeList::new();
        let mut locked = rect_shape(Rect::new(0.0, 0.0, 10.0, 10.0));
        locked.flags.set(crate::shapes::ShapeFlags::LOCKED, true);
        list.add_shape(&locked);
        assert!(list.hit_test(limits(Point::new(0.0, 5.0), 1.0), None).is_none());

        let line = list.add_shape(&Shape::new(ShapeKind::Line(Line::new(
            Point::new(0.0, 20.0),
            Point::new(10.0, 20.0),
        ))));
        assert!(list.hit_test(limits(Point::new(5.0, 23.0), 2.0), None).is_none());
        assert_eq!(list.hit_test(limits(Point::new(5.0, 21.0), 2.0), None).unwrap().0, line);

        let only_dots = |sp: &Shape| sp.shape_type() == ShapeType::Dot;
        assert!(list.hit_test(limits(Point::new(5.0, 21.0), 2.0), Some(&only_dots)).is_none());
    }

    #[test]
    fn test_traverse_into_groups() {
        let mut inner = ShapeList::new();
        inner.add_shape(&Shape::from_type(ShapeType::Line));
        inner.add_shape(&Shape::from_type(ShapeType::Dot));
        let mut list = ShapeList::new();
        list.add_shape(&Shape::from_type(ShapeType::Line));
        list.add_shape_direct(Shape::new(ShapeKind::Group(crate::shapes::Group::from_list(inner))));

        let mut lines = 0;
        assert_eq!(list.traverse_by_type(Some(ShapeType::Line), &mut |_| lines += 1), 2);
        assert_eq!(lines, 2);
        assert_eq!(list.traverse_by_type(None, &mut |_| {}), 4);
    }

    #[test]
    fn test_shallow_copy_shares_shapes() {
        let mut list = ShapeList::new();
        let a = list.add_shape(&rect_shape(Rect::new(0.0, 0.0, 1.0, 1.0)));
        let copy = list.shallow_copy();
        assert_eq!(copy.id(), list.id());
        assert!(Arc::ptr_eq(copy.find_arc(a).unwrap(), list.find_arc(a).unwrap()));

        let deep = list.clone();
        assert_ne!(deep.id(), list.id());
        assert!(!Arc::ptr_eq(deep.find_arc(a).unwrap(), list.find_arc(a).unwrap()));
        assert_eq!(deep, list);
        assert_parents(&deep);
    }

    #[test]
    fn test_save_load() {
        let mut list = ShapeList::new();
        list.add_shape(&rect_shape(Rect::new(0.0, 0.0, 4.0, 3.0)));
        list.add_shape(&Shape::new(ShapeKind::Line(Line::new(Point::ZERO, Point::new(1.0, 1.0)))));

        let mut s = JsonStorage::new();
        assert!(list.save(&mut s));
        let mut loaded = ShapeList::new();
        assert!(loaded.load(&mut s, false));
        assert_eq!(loaded, list);
        assert_eq!(loaded.ids(), list.ids());
        assert_parents(&loaded);
    }

    #[test]
    fn test_load_add_only_updates_existing() {
        let mut list = ShapeList::new();
        let a = list.add_shape(&rect_shape(Rect::new(0.0, 0.0, 4.0, 3.0)));
        let mut changed = list.clone();
        let mut moved = changed.find_shape(a).unwrap().clone();
        moved.transform(Affine::translate((1.0, 1.0)));
        changed.update_shape(moved);

        let mut s = JsonStorage::new();
        changed.save(&mut s);
        assert!(list.load(&mut s, true));
        assert_eq!(list.len(), 1);
        assert_eq!(list.find_shape(a).unwrap().change_count(), 2);
        assert_eq!(list, changed);
    }

    #[test]
    fn test_load_rejects_unknown_type() {
        let mut s = JsonStorage::from_json(r#"{"shapes": {"shape0": {"type": 999, "id": 1}}}"#).unwrap();
        let mut list = ShapeList::new();
        assert!(!list.load(&mut s, false));
        assert!(list.is_empty());
        assert!(s.error().is_some());
    }
}
