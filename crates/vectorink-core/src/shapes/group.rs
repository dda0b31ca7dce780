//! Composite shape holding its own shape list.

use super::{DrawContext, HitResult, ShapeList, ShapeTrait, ShapeType};
use crate::render::Surface;
use crate::selection::{move_box_handle, rect_to_rect_transform};
use crate::storage::Storage;
use kurbo::{Affine, BezPath, Point, Rect};

/// A group of shapes edited as one.
///
/// Points and handles are the corners of the children's bounding box.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    shapes: ShapeList,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_list(shapes: ShapeList) -> Self {
        Self { shapes }
    }

    pub fn shapes(&self) -> &ShapeList {
        &self.shapes
    }

    pub fn shapes_mut(&mut self) -> &mut ShapeList {
        &mut self.shapes
    }

    pub fn into_shapes(self) -> ShapeList {
        self.shapes
    }

    fn corner(rect: Rect, index: usize) -> Point {
        match index % 4 {
            0 => Point::new(rect.x0, rect.y0),
            1 => Point::new(rect.x1, rect.y0),
            2 => Point::new(rect.x1, rect.y1),
            _ => Point::new(rect.x0, rect.y1),
        }
    }
}

impl ShapeTrait for Group {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Group
    }

    fn point_count(&self) -> usize {
        if self.shapes.is_empty() { 0 } else { 4 }
    }

    fn point(&self, index: usize) -> Point {
        Self::corner(self.shapes.extent(), index)
    }

    fn set_point(&mut self, index: usize, pt: Point) {
        self.set_handle_point(index, pt, 0.0);
    }

    /// Dragging a corner scales all children.
    fn set_handle_point(&mut self, index: usize, pt: Point, _tol: f64) -> bool {
        let old = self.shapes.extent();
        if index >= 4 || old.width() <= 0.0 || old.height() <= 0.0 {
            return false;
        }
        let new = move_box_handle(old, index, pt, true);
        match rect_to_rect_transform(old, new) {
            Some(affine) => {
                self.shapes.transform_all(affine);
                true
            }
            None => false,
        }
    }

    fn extent(&self) -> Rect {
        self.shapes.extent()
    }

    fn hit_test(&self, pt: Point, tol: f64) -> HitResult {
        let mut best = HitResult::miss();
        for shape in self.shapes.iter() {
            let mut res = shape.hit_test(pt, tol);
            if res.inside && shape.has_fill_color() {
                res.dist = 0.0;
            }
            if res.dist < best.dist {
                best = res;
            }
            best.inside |= res.inside;
        }
        best
    }

    fn hit_test_box(&self, rect: Rect) -> bool {
        self.shapes.iter().any(|s| s.hit_test_box(rect))
    }

    fn transform(&mut self, affine: Affine) {
        self.shapes.transform_all(affine);
    }

    fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        for shape in self.shapes.iter() {
            let sub = shape.to_path();
            path.extend(sub.iter());
        }
        path
    }

    fn draw(&self, surface: &mut dyn Surface, _ctx: &DrawContext) {
        for shape in self.shapes.iter() {
            shape.draw(surface);
        }
    }

    fn save(&self, s: &mut dyn Storage) {
        self.shapes.save(s);
    }

    fn load(&mut self, s: &mut dyn Storage) -> bool {
        self.shapes.load(s, false)
    }

    fn clear(&mut self) {
        self.shapes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Line, Shape, ShapeKind};

    fn assert_rect_near(a: Rect, b: Rect) {
        assert!((a.x0 - b.x0).abs() < 1e-3, "{a:?} != {b:?}");
        assert!((a.y0 - b.y0).abs() < 1e-3, "{a:?} != {b:?}");
        assert!((a.x1 - b.x1).abs() < 1e-3, "{a:?} != {b:?}");
        assert!((a.y1 - b.y1).abs() < 1e-3, "{a:?} != {b:?}");
    }

    fn two_lines() -> Group {
        let mut list = ShapeList::new();
        list.add_shape(&Shape::new(ShapeKind::Line(Line::new(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
        ))));
        list.add_shape(&Shape::new(ShapeKind::Line(Line::new(
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
        ))));
        Group::from_list(list)
    }

    #[test]
    fn test_group_extent_and_hit() {
        let g = two_lines();
        assert_rect_near(g.extent(), Rect::new(0.0, 0.0, 10.0, 10.0));
        let res = g.hit_test(Point::new(5.0, 9.0), 2.0);
        assert!((res.dist - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_group_corner_scales_children() {
        let mut g = two_lines();
        assert!(g.set_handle_point(2, Point::new(20.0, 20.0), 0.1));
        assert_rect_near(g.extent(), Rect::new(0.0, 0.0, 20.0, 20.0));
    }

    #[test]
    fn test_group_transform() {
        let mut g = two_lines();
        g.transform(Affine::translate((1.0, 2.0)));
        assert_rect_near(g.extent(), Rect::new(1.0, 2.0, 11.0, 12.0));
    }
}
