//! Gesture events and their routing to command handlers.

use crate::camera::Camera;
use kurbo::{Point, Rect, Vec2};

/// Recognized gesture kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureType {
    #[default]
    Unknown,
    Pan,
    Tap,
    DoubleTap,
    Press,
    TwoFingersMove,
}

/// Phase of a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureState {
    /// The recognizer asks whether the gesture may start.
    #[default]
    Possible,
    Began,
    Moved,
    Ended,
    Cancel,
}

impl GestureState {
    /// First event of a sequence; start points are reset.
    pub fn is_beginning(self) -> bool {
        matches!(self, GestureState::Possible | GestureState::Began)
    }

    pub fn is_final(self) -> bool {
        matches!(self, GestureState::Ended | GestureState::Cancel)
    }
}

/// Per-event gesture data, reused across one gesture sequence.
#[derive(Debug, Clone)]
pub struct Motion {
    pub gesture_type: GestureType,
    pub gesture_state: GestureState,
    /// Current point in display pixels.
    pub point: Point,
    /// Current point in model coordinates.
    pub point_m: Point,
    pub last_pt: Point,
    pub last_pt_m: Point,
    pub start_pt: Point,
    pub start_pt_m: Point,
    /// Second finger, for two-finger gestures.
    pub point2: Point,
    pub point2_m: Point,
    pub start_pt2: Point,
    pub start_pt2_m: Point,
    /// A long press turned into a drag.
    pub press_drag: bool,
    /// The recognizer switched gesture type mid-sequence.
    pub switch_gesture: bool,
    /// Model units per millimeter on screen.
    pub mm_to_model: f64,
    /// Visible area in model coordinates.
    pub view_rect_m: Rect,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            gesture_type: GestureType::Unknown,
            gesture_state: GestureState::Possible,
            point: Point::ZERO,
            point_m: Point::ZERO,
            last_pt: Point::ZERO,
            last_pt_m: Point::ZERO,
            start_pt: Point::ZERO,
            start_pt_m: Point::ZERO,
            point2: Point::ZERO,
            point2_m: Point::ZERO,
            start_pt2: Point::ZERO,
            start_pt2_m: Point::ZERO,
            press_drag: false,
            switch_gesture: false,
            mm_to_model: 1.0,
            view_rect_m: Rect::ZERO,
        }
    }
}

impl Motion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw event: converts to model space and maintains start/last points.
    pub fn update(
        &mut self,
        camera: &Camera,
        gesture_type: GestureType,
        gesture_state: GestureState,
        pt: Point,
        pt2: Option<Point>,
    ) {
        self.switch_gesture = !gesture_state.is_beginning() && gesture_type != self.gesture_type;
        self.gesture_type = gesture_type;
        self.gesture_state = gesture_state;
        self.mm_to_model = camera.display_mm_to_model(1.0);
        self.view_rect_m = camera.model_window();

        let pm = camera.display_to_model(pt);
        let p2 = pt2.unwrap_or(pt);
        let p2m = camera.display_to_model(p2);

        if gesture_state.is_beginning() {
            self.start_pt = pt;
            self.start_pt_m = pm;
            self.last_pt = pt;
            self.last_pt_m = pm;
            self.start_pt2 = p2;
            self.start_pt2_m = p2m;
            self.press_drag = false;
        } else {
            self.last_pt = self.point;
            self.last_pt_m = self.point_m;
        }
        self.point = pt;
        self.point_m = pm;
        self.point2 = p2;
        self.point2_m = p2m;
    }

    /// Build a motion directly in model space (mm scale given), for tests and replay.
    pub fn at_model(point_m: Point, mm_to_model: f64) -> Self {
        Self {
            point: point_m,
            point_m,
            last_pt: point_m,
            last_pt_m: point_m,
            start_pt: point_m,
            start_pt_m: point_m,
            point2: point_m,
            point2_m: point_m,
            start_pt2: point_m,
            start_pt2_m: point_m,
            mm_to_model,
            ..Self::default()
        }
    }

    /// Move to a new model point, keeping the start point.
    pub fn move_to_model(&mut self, point_m: Point) {
        self.last_pt = self.point;
        self.last_pt_m = self.point_m;
        self.point = point_m;
        self.point_m = point_m;
    }

    pub fn display_mm_to_model(&self, mm: f64) -> f64 {
        mm * self.mm_to_model
    }

    /// Model offset since the gesture started.
    pub fn drag_vec_m(&self) -> Vec2 {
        self.point_m - self.start_pt_m
    }

    pub fn start_center_m(&self) -> Point {
        self.start_pt_m.midpoint(self.start_pt2_m)
    }

    pub fn center_m(&self) -> Point {
        self.point_m.midpoint(self.point2_m)
    }

    pub fn start_distance_m(&self) -> f64 {
        self.start_pt_m.distance(self.start_pt2_m)
    }

    pub fn distance_m(&self) -> f64 {
        self.point_m.distance(self.point2_m)
    }
}

/// Command handler chosen for a gesture event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Answer whether the gesture may begin.
    Accept,
    TouchBegan,
    TouchMoved,
    TouchEnded,
    Click,
    DoubleClick,
    LongPress,
    TwoFingersMove,
    Cancel,
    Unsupported,
}

/// Rows of `(gesture type or any, state, route)`; the first matching row wins.
const TRANSITIONS: &[(Option<GestureType>, GestureState, Route)] = &[
    (None, GestureState::Cancel, Route::Cancel),
    (Some(GestureType::TwoFingersMove), GestureState::Possible, Route::TwoFingersMove),
    (Some(GestureType::TwoFingersMove), GestureState::Began, Route::TwoFingersMove),
    (Some(GestureType::TwoFingersMove), GestureState::Moved, Route::TwoFingersMove),
    (Some(GestureType::TwoFingersMove), GestureState::Ended, Route::TwoFingersMove),
    (None, GestureState::Possible, Route::Accept),
    (Some(GestureType::Pan), GestureState::Began, Route::TouchBegan),
    (Some(GestureType::Pan), GestureState::Moved, Route::TouchMoved),
    (Some(GestureType::Pan), GestureState::Ended, Route::TouchEnded),
    (Some(GestureType::Tap), GestureState::Began, Route::Click),
    (Some(GestureType::Tap), GestureState::Ended, Route::Click),
    (Some(GestureType::DoubleTap), GestureState::Began, Route::DoubleClick),
    (Some(GestureType::DoubleTap), GestureState::Ended, Route::DoubleClick),
    (Some(GestureType::Press), GestureState::Began, Route::LongPress),
];

/// Look up the handler for an event.
pub fn route_for(gesture_type: GestureType, gesture_state: GestureState) -> Route {
    TRANSITIONS
        .iter()
        .find(|(ty, state, _)| {
            *state == gesture_state && ty.is_none_or(|t| t == gesture_type)
        })
        .map(|(_, _, route)| *route)
        .unwrap_or(Route::Unsupported)
}

/// Sequence phase tracked by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Tracking(GestureType),
}

/// Routing decision for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub route: Route,
    /// First event of a sequence.
    pub starts_sequence: bool,
    /// The event arrived without a preceding begin.
    pub out_of_sequence: bool,
}

/// Gesture state machine: Idle -> Tracking on begin, back to Idle on end or cancel.
#[derive(Debug, Clone, Default)]
pub struct GestureDispatcher {
    phase: Phase,
}

impl GestureDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn dispatch(&mut self, gesture_type: GestureType, gesture_state: GestureState) -> Dispatch {
        let route = route_for(gesture_type, gesture_state);
        let starts_sequence = gesture_state.is_beginning();
        let out_of_sequence = matches!(gesture_state, GestureState::Moved | GestureState::Ended)
            && self.phase == Phase::Idle
            && !matches!(gesture_type, GestureType::Tap | GestureType::DoubleTap);

        if route == Route::Unsupported {
            log::debug!("unsupported gesture {:?} in state {:?}", gesture_type, gesture_state);
        }
        if out_of_sequence {
            log::debug!("gesture {:?} {:?} without begin", gesture_type, gesture_state);
        }

        self.phase = if gesture_state.is_final() {
            Phase::Idle
        } else {
            Phase::Tracking(gesture_type)
        };

        Dispatch {
            route,
            starts_sequence,
            out_of_sequence,
        }
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table() {
        assert_eq!(route_for(GestureType::Pan, GestureState::Began), Route::TouchBegan);
        assert_eq!(route_for(GestureType::Pan, GestureState::Moved), Route::TouchMoved);
        assert_eq!(route_for(GestureType::Pan, GestureState::Ended), Route::TouchEnded);
        assert_eq!(route_for(GestureType::Pan, GestureState::Possible), Route::Accept);
        assert_eq!(route_for(GestureType::Tap, GestureState::Ended), Route::Click);
        assert_eq!(route_for(GestureType::DoubleTap, GestureState::Ended), Route::DoubleClick);
        assert_eq!(route_for(GestureType::Press, GestureState::Began), Route::LongPress);
        assert_eq!(route_for(GestureType::Tap, GestureState::Cancel), Route::Cancel);
        assert_eq!(
            route_for(GestureType::TwoFingersMove, GestureState::Possible),
            Route::TwoFingersMove
        );
        assert_eq!(route_for(GestureType::Unknown, GestureState::Moved), Route::Unsupported);
        assert_eq!(route_for(GestureType::Press, GestureState::Moved), Route::Unsupported);
    }

    #[test]
    fn test_dispatcher_phases() {
        let mut d = GestureDispatcher::new();
        let first = d.dispatch(GestureType::Pan, GestureState::Began);
        assert!(first.starts_sequence);
        assert_eq!(d.phase(), Phase::Tracking(GestureType::Pan));
        let moved = d.dispatch(GestureType::Pan, GestureState::Moved);
        assert!(!moved.starts_sequence);
        assert!(!moved.out_of_sequence);
        d.dispatch(GestureType::Pan, GestureState::Ended);
        assert_eq!(d.phase(), Phase::Idle);

        let stray = d.dispatch(GestureType::Pan, GestureState::Moved);
        assert!(stray.out_of_sequence);
        assert_eq!(stray.route, Route::TouchMoved);
    }

    #[test]
    fn test_motion_tracks_points() {
        let mut camera = Camera::new();
        camera.zoom = 2.0;
        let mut m = Motion::new();
        m.update(&camera, GestureType::Pan, GestureState::Began, Point::new(10.0, 10.0), None);
        assert_eq!(m.start_pt_m, Point::new(5.0, 5.0));
        m.update(&camera, GestureType::Pan, GestureState::Moved, Point::new(20.0, 10.0), None);
        assert_eq!(m.last_pt_m, Point::new(5.0, 5.0));
        assert_eq!(m.point_m, Point::new(10.0, 5.0));
        assert_eq!(m.drag_vec_m(), Vec2::new(5.0, 0.0));
        assert!((m.display_mm_to_model(25.4) - 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_finger_metrics() {
        let camera = Camera::new();
        let mut m = Motion::new();
        m.update(
            &camera,
            GestureType::TwoFingersMove,
            GestureState::Began,
            Point::new(0.0, 0.0),
            Some(Point::new(10.0, 0.0)),
        );
        m.update(
            &camera,
            GestureType::TwoFingersMove,
            GestureState::Moved,
            Point::new(-5.0, 0.0),
            Some(Point::new(15.0, 0.0)),
        );
        assert!((m.start_distance_m() - 10.0).abs() < 1e-9);
        assert!((m.distance_m() - 20.0).abs() < 1e-9);
        assert_eq!(m.center_m(), Point::new(5.0, 0.0));
    }
}
