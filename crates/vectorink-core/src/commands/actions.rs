//! Context actions offered around the selection.

use super::select::{SelectCommand, SelectState};
use crate::shapes::{ShapeKind, ShapeList};
use kurbo::{Point, Rect, Size, Vec2};
use serde::{Deserialize, Serialize};

/// At most this many buttons are placed around a selection.
pub const MAX_ACTIONS: usize = 8;

/// Side of an action button in display pixels (before scaling).
pub const BUTTON_SIZE: f64 = 32.0;

/// Action shown as a button next to the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextAction {
    SelectAll,
    ResetSelection,
    /// Switch back to the last drawing command.
    Draw,
    Cancel,
    Delete,
    Clone,
    FixedLength,
    FreeLength,
    Lock,
    Unlock,
    EditVertex,
    HideVertex,
    Close,
    Open,
    AddVertex,
    DeleteVertex,
    Group,
    Ungroup,
    Overturn,
}

impl ContextAction {
    const ALL: [ContextAction; 19] = [
        Self::SelectAll,
        Self::ResetSelection,
        Self::Draw,
        Self::Cancel,
        Self::Delete,
        Self::Clone,
        Self::FixedLength,
        Self::FreeLength,
        Self::Lock,
        Self::Unlock,
        Self::EditVertex,
        Self::HideVertex,
        Self::Close,
        Self::Open,
        Self::AddVertex,
        Self::DeleteVertex,
        Self::Group,
        Self::Ungroup,
        Self::Overturn,
    ];

    /// Stable positive code handed to platform views.
    pub fn code(self) -> u32 {
        Self::ALL.iter().position(|a| *a == self).map_or(0, |i| i as u32 + 1)
    }

    pub fn from_code(code: u32) -> Option<Self> {
        code.checked_sub(1).and_then(|i| Self::ALL.get(i as usize)).copied()
    }

    /// Actions that apply to the current selection, most useful first.
    pub fn available(select: &SelectCommand, shapes: &ShapeList) -> Vec<ContextAction> {
        let mut actions = Vec::new();
        let current = shapes.find_shape(select.selected_id());
        let polyline = current.is_some_and(|sp| matches!(sp.kind, ShapeKind::Lines(_) | ShapeKind::Splines(_)));
        let closed = current.is_some_and(|sp| sp.is_closed());

        match select.select_state(shapes) {
            SelectState::None => {
                if !shapes.is_empty() {
                    actions.push(Self::SelectAll);
                }
                actions.push(Self::Draw);
            }
            SelectState::OneShape | SelectState::MultiShapes => {
                let multi = select.selected_count() > 1;
                actions.push(Self::Delete);
                actions.push(Self::Clone);
                if multi {
                    actions.push(Self::Group);
                }
                let has_group = select
                    .selected_ids()
                    .iter()
                    .filter_map(|id| shapes.find_shape(*id))
                    .any(|sp| sp.as_group().is_some());
                if has_group {
                    actions.push(Self::Ungroup);
                }
                actions.push(if select.is_fixed_length(shapes) { Self::FreeLength } else { Self::FixedLength });
                actions.push(if select.is_locked(shapes) { Self::Unlock } else { Self::Lock });
                if !multi {
                    if current.is_some_and(|sp| sp.handle_count() > 0) {
                        actions.push(Self::EditVertex);
                    }
                    actions.push(Self::Overturn);
                }
                actions.push(Self::ResetSelection);
            }
            SelectState::Vertex => {
                actions.push(Self::DeleteVertex);
                actions.push(if closed { Self::Open } else { Self::Close });
                actions.push(Self::HideVertex);
            }
            SelectState::Vertexes => {
                if polyline {
                    actions.push(Self::AddVertex);
                    actions.push(if closed { Self::Open } else { Self::Close });
                }
                actions.push(Self::HideVertex);
            }
        }
        actions.truncate(MAX_ACTIONS);
        actions
    }
}

/// A positioned action button, in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionButton {
    pub action: ContextAction,
    pub center: Point,
}

impl ActionButton {
    pub fn rect(&self, factor: f64) -> Rect {
        let side = BUTTON_SIZE * factor;
        Rect::from_center_size(self.center, Size::new(side, side))
    }
}

/// Place up to [`MAX_ACTIONS`] buttons around `selbox`, shifted to stay inside `view`.
///
/// `selbox` and `view` are display rectangles; `factor` scales pixel sizes
/// for high-density screens.
pub fn layout_actions(actions: &[ContextAction], selbox: Rect, view: Rect, factor: f64) -> Vec<ActionButton> {
    let n = actions.len().min(MAX_ACTIONS);
    if n == 0 {
        return Vec::new();
    }

    let mut frame = selbox.inflate(12.0 * factor, 18.0 * factor);
    let min_h = if n < 7 { 40.0 } else { 80.0 } * factor;
    if selbox.height() < min_h {
        frame = frame.inflate(0.0, (min_h - selbox.height()) / 2.0);
    }
    let min_w = if n == 3 || n > 4 { 120.0 } else { 40.0 } * factor;
    if selbox.width() < min_w {
        frame = frame.inflate((min_w - selbox.width()) / 2.0, 0.0);
    }

    let c = frame.center();
    let slots: Vec<Point> = (0..n)
        .map(|i| match (i, n) {
            (0, 1) | (1, 3) | (4, _) => Point::new(c.x, frame.y0),
            (0, _) => Point::new(frame.x0, frame.y0),
            (1, _) | (2, 3) => Point::new(frame.x1, frame.y0),
            (2, _) => Point::new(frame.x1, frame.y1),
            (3, _) => Point::new(frame.x0, frame.y1),
            (5, _) => Point::new(c.x, frame.y1),
            (6, _) => Point::new(frame.x1, c.y),
            _ => Point::new(frame.x0, c.y),
        })
        .collect();

    let side = BUTTON_SIZE * factor;
    let bounds = slots
        .iter()
        .map(|p| Rect::from_center_size(*p, Size::new(side, side)))
        .reduce(|a, b| a.union(b))
        .unwrap_or(Rect::ZERO);
    let off = shift_into_view(bounds, view);

    actions
        .iter()
        .zip(slots)
        .map(|(action, center)| ActionButton {
            action: *action,
            center: center + off,
        })
        .collect()
}

fn shift_into_view(rect: Rect, view: Rect) -> Vec2 {
    let mut off = Vec2::ZERO;
    if rect.area() <= 0.0 || view.contains_rect(rect) {
        return off;
    }
    if rect.x0 < view.x0 {
        off.x = view.x0 - rect.x0;
    } else if rect.x1 > view.x1 {
        off.x = view.x1 - rect.x1;
    }
    if rect.y0 < view.y0 {
        off.y = view.y0 - rect.y0;
    } else if rect.y1 > view.y1 {
        off.y = view.y1 - rect.y1;
    }
    off
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW: Rect = Rect::new(0.0, 0.0, 800.0, 600.0);

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ContextAction::SelectAll.code(), 1);
        for action in ContextAction::ALL {
            assert_eq!(ContextAction::from_code(action.code()), Some(action));
        }
        assert_eq!(ContextAction::from_code(0), None);
        assert_eq!(ContextAction::from_code(99), None);
    }

    #[test]
    fn test_single_button_centered_above() {
        let selbox = Rect::new(300.0, 300.0, 500.0, 400.0);
        let buttons = layout_actions(&[ContextAction::Delete], selbox, VIEW, 1.0);
        assert_eq!(buttons.len(), 1);
        assert_eq!(buttons[0].center, Point::new(400.0, 282.0));
    }

    #[test]
    fn test_small_box_is_widened() {
        let selbox = Rect::new(395.0, 295.0, 405.0, 305.0);
        let actions = [ContextAction::Delete, ContextAction::Clone, ContextAction::Lock];
        let buttons = layout_actions(&actions, selbox, VIEW, 1.0);
        // Three buttons need a 120px wide frame: left, middle, right along the top.
        assert!((buttons[0].center.x - (400.0 - 72.0)).abs() < 1e-9);
        assert!((buttons[1].center.x - 400.0).abs() < 1e-9);
        assert!((buttons[2].center.x - (400.0 + 72.0)).abs() < 1e-9);
        assert!((buttons[0].center.y - (300.0 - 38.0)).abs() < 1e-9);
    }

    #[test]
    fn test_buttons_stay_in_view() {
        let selbox = Rect::new(-50.0, -40.0, 30.0, 20.0);
        let actions = [
            ContextAction::Delete,
            ContextAction::Clone,
            ContextAction::Lock,
            ContextAction::Group,
            ContextAction::Overturn,
        ];
        for b in layout_actions(&actions, selbox, VIEW, 1.0) {
            assert!(VIEW.contains_rect(b.rect(1.0)), "{:?} outside view", b);
        }
    }

    #[test]
    fn test_layout_caps_at_eight() {
        let actions = [ContextAction::Delete; 10];
        let selbox = Rect::new(300.0, 200.0, 500.0, 400.0);
        assert_eq!(layout_actions(&actions, selbox, VIEW, 1.0).len(), MAX_ACTIONS);
    }
}
