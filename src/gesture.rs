// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Hit-testing and the pointer gesture state machine.
//!
//! Pointer events are interpreted against the screen rectangle the image is
//! drawn into. The engine never touches annotation state itself; it answers
//! with [`GestureAction`]s that the owning surface applies. Time is carried
//! by the events (seconds) so long-press deletion needs no timer thread.

use crate::config::SurfaceConfig;
use crate::models::annotation::Point;
use crate::models::mask::StrokeMode;
use crate::util::geometry::{in_unit_square, normalized_to_screen, screen_to_normalized};
use egui::{PointerButton, Pos2, Rect};

/// Current drawing tool selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Point,
    Brush,
    Eraser,
}

impl Tool {
    /// Compositing rule for painting tools.
    pub fn stroke_mode(self) -> Option<StrokeMode> {
        match self {
            Tool::Point => None,
            Tool::Brush => Some(StrokeMode::Paint),
            Tool::Eraser => Some(StrokeMode::Erase),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEventKind {
    Down(PointerButton),
    Move,
    Up,
}

/// A pointer event in screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub pos: Pos2,
    /// Seconds on any monotonic clock.
    pub time: f64,
}

impl PointerEvent {
    pub fn down(pos: Pos2, button: PointerButton, time: f64) -> Self {
        Self {
            kind: PointerEventKind::Down(button),
            pos,
            time,
        }
    }

    pub fn moved(pos: Pos2, time: f64) -> Self {
        Self {
            kind: PointerEventKind::Move,
            pos,
            time,
        }
    }

    pub fn up(pos: Pos2, time: f64) -> Self {
        Self {
            kind: PointerEventKind::Up,
            pos,
            time,
        }
    }
}

/// Hit-test radii and gesture thresholds, in screen pixels and seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitConfig {
    pub hit_radius: f32,
    pub secondary_hit_radius: f32,
    pub delete_offset: f32,
    pub delete_radius: f32,
    pub long_press: Option<f64>,
    pub drag_threshold: f32,
}

impl From<&SurfaceConfig> for HitConfig {
    fn from(config: &SurfaceConfig) -> Self {
        Self {
            hit_radius: config.hit_radius,
            secondary_hit_radius: config.secondary_hit_radius,
            delete_offset: config.delete_offset,
            delete_radius: config.delete_radius,
            long_press: config.long_press_secs(),
            drag_threshold: config.drag_threshold,
        }
    }
}

/// Gesture state machine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    /// A marker is pressed; movement beyond the threshold starts a drag.
    Pressed { index: usize, origin: Pos2 },
    /// Like `Pressed`, but the marker is deleted once `deadline` passes.
    LongPressPending {
        index: usize,
        origin: Pos2,
        deadline: f64,
    },
    Dragging { index: usize },
    /// A brush or eraser stroke; `last` is the previous normalized position.
    Painting { last: (f64, f64), mode: StrokeMode },
}

/// What the owning surface should do in response to an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureAction {
    AddPoint { x: f64, y: f64 },
    RemovePoint(usize),
    BeginDrag(usize),
    MovePoint { index: usize, x: f64, y: f64 },
    EndDrag(usize),
    BeginStroke { at: (f64, f64), mode: StrokeMode },
    ExtendStroke {
        from: (f64, f64),
        to: (f64, f64),
        mode: StrokeMode,
    },
    EndStroke,
}

/// Screen position of a marker's delete affordance.
pub fn delete_anchor(point: &Point, rect: Rect, offset: f32) -> Pos2 {
    normalized_to_screen(point.x, point.y, rect) + egui::vec2(offset, -offset)
}

/// Nearest marker whose delete affordance lies within the affordance radius.
pub fn hit_delete_affordance(points: &[Point], rect: Rect, pos: Pos2, config: &HitConfig) -> Option<usize> {
    nearest_within(points, pos, config.delete_radius, |p| {
        delete_anchor(p, rect, config.delete_offset)
    })
}

/// Nearest marker within `radius` screen pixels of `pos`.
pub fn hit_marker(points: &[Point], rect: Rect, pos: Pos2, radius: f32) -> Option<usize> {
    nearest_within(points, pos, radius, |p| normalized_to_screen(p.x, p.y, rect))
}

fn nearest_within(
    points: &[Point],
    pos: Pos2,
    radius: f32,
    anchor: impl Fn(&Point) -> Pos2,
) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, point) in points.iter().enumerate() {
        let distance = anchor(point).distance(pos);
        if distance >= radius {
            continue;
        }
        // Strict comparison keeps the lower index on ties
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

/// Interprets pointer events for one drawing surface.
#[derive(Debug, Clone)]
pub struct GestureEngine {
    config: HitConfig,
    state: GestureState,
}

impl GestureEngine {
    pub fn new(config: HitConfig) -> Self {
        Self {
            config,
            state: GestureState::Idle,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    /// Whether a press, drag or stroke is in progress.
    pub fn is_active(&self) -> bool {
        self.state != GestureState::Idle
    }

    /// Pending long-press deadline, for scheduling the next tick.
    pub fn deadline(&self) -> Option<f64> {
        match self.state {
            GestureState::LongPressPending { deadline, .. } => Some(deadline),
            _ => None,
        }
    }

    /// Feed one pointer event.
    pub fn handle(
        &mut self,
        event: &PointerEvent,
        rect: Rect,
        points: &[Point],
        tool: Tool,
    ) -> Vec<GestureAction> {
        let mut actions = self.tick(event.time);

        match event.kind {
            PointerEventKind::Down(button) => {
                if self.is_active() {
                    // The matching release never reached us
                    actions.extend(self.finish());
                }
                actions.extend(self.press(event, button, rect, points, tool));
            }
            PointerEventKind::Move => actions.extend(self.motion(event.pos, rect)),
            PointerEventKind::Up => actions.extend(self.finish()),
        }
        actions
    }

    /// Advance time. Fires a pending long-press deletion once its deadline
    /// has passed.
    pub fn tick(&mut self, now: f64) -> Vec<GestureAction> {
        if let GestureState::LongPressPending { index, deadline, .. } = self.state {
            if now >= deadline {
                log::debug!("Long press deleted point {}", index);
                self.state = GestureState::Idle;
                return vec![GestureAction::RemovePoint(index)];
            }
        }
        Vec::new()
    }

    /// Abort whatever is in progress, ending drags and strokes cleanly.
    pub fn cancel(&mut self) -> Vec<GestureAction> {
        self.finish()
    }

    fn press(
        &mut self,
        event: &PointerEvent,
        button: PointerButton,
        rect: Rect,
        points: &[Point],
        tool: Tool,
    ) -> Vec<GestureAction> {
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Vec::new();
        }
        let (x, y) = screen_to_normalized(event.pos, rect);
        if !in_unit_square(x, y) {
            return Vec::new();
        }

        if let Some(mode) = tool.stroke_mode() {
            if button != PointerButton::Primary {
                return Vec::new();
            }
            self.state = GestureState::Painting { last: (x, y), mode };
            return vec![GestureAction::BeginStroke { at: (x, y), mode }];
        }

        // Delete affordance first: it sits right next to the marker body
        let affordance = hit_delete_affordance(points, rect, event.pos, &self.config);
        if button == PointerButton::Secondary {
            let target = affordance
                .or_else(|| hit_marker(points, rect, event.pos, self.config.secondary_hit_radius));
            return target.map(GestureAction::RemovePoint).into_iter().collect();
        }
        if button != PointerButton::Primary {
            return Vec::new();
        }
        if let Some(index) = affordance {
            return vec![GestureAction::RemovePoint(index)];
        }

        match hit_marker(points, rect, event.pos, self.config.hit_radius) {
            Some(index) => {
                self.state = match self.config.long_press {
                    Some(hold) => GestureState::LongPressPending {
                        index,
                        origin: event.pos,
                        deadline: event.time + hold,
                    },
                    None => GestureState::Pressed {
                        index,
                        origin: event.pos,
                    },
                };
                log::debug!("Pressed point {}", index);
                Vec::new()
            }
            None => vec![GestureAction::AddPoint { x, y }],
        }
    }

    fn motion(&mut self, pos: Pos2, rect: Rect) -> Vec<GestureAction> {
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return Vec::new();
        }
        let (x, y) = screen_to_normalized(pos, rect);

        match self.state {
            GestureState::Idle => Vec::new(),
            GestureState::Pressed { index, origin }
            | GestureState::LongPressPending { index, origin, .. } => {
                if pos.distance(origin) <= self.config.drag_threshold {
                    return Vec::new();
                }
                log::debug!("Dragging point {}", index);
                self.state = GestureState::Dragging { index };
                vec![
                    GestureAction::BeginDrag(index),
                    GestureAction::MovePoint {
                        index,
                        x: x.clamp(0.0, 1.0),
                        y: y.clamp(0.0, 1.0),
                    },
                ]
            }
            GestureState::Dragging { index } => vec![GestureAction::MovePoint {
                index,
                x: x.clamp(0.0, 1.0),
                y: y.clamp(0.0, 1.0),
            }],
            GestureState::Painting { last, mode } => {
                self.state = GestureState::Painting { last: (x, y), mode };
                vec![GestureAction::ExtendStroke {
                    from: last,
                    to: (x, y),
                    mode,
                }]
            }
        }
    }

    fn finish(&mut self) -> Vec<GestureAction> {
        let actions = match self.state {
            GestureState::Dragging { index } => vec![GestureAction::EndDrag(index)],
            GestureState::Painting { .. } => vec![GestureAction::EndStroke],
            _ => Vec::new(),
        };
        self.state = GestureState::Idle;
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> Rect {
        Rect::from_min_size(egui::pos2(100.0, 50.0), egui::vec2(400.0, 300.0))
    }

    fn screen(x: f64, y: f64) -> Pos2 {
        normalized_to_screen(x, y, rect())
    }

    fn config(long_press: Option<f64>) -> HitConfig {
        HitConfig {
            hit_radius: 15.0,
            secondary_hit_radius: 20.0,
            delete_offset: 9.0,
            delete_radius: 8.0,
            long_press,
            drag_threshold: 5.0,
        }
    }

    #[test]
    fn test_press_outside_image_is_rejected() {
        let mut engine = GestureEngine::new(config(None));
        let pos = egui::pos2(90.0, 60.0);
        let actions = engine.handle(&PointerEvent::down(pos, PointerButton::Primary, 0.0), rect(), &[], Tool::Point);
        assert!(actions.is_empty());
        assert_eq!(engine.state(), GestureState::Idle);
    }

    #[test]
    fn test_primary_press_on_empty_area_adds_point() {
        let mut engine = GestureEngine::new(config(None));
        let actions = engine.handle(
            &PointerEvent::down(screen(0.5, 0.5), PointerButton::Primary, 0.0),
            rect(),
            &[],
            Tool::Point,
        );
        assert_eq!(actions, vec![GestureAction::AddPoint { x: 0.5, y: 0.5 }]);
        assert_eq!(engine.state(), GestureState::Idle);
    }

    #[test]
    fn test_delete_affordance_beats_drag() {
        let points = vec![Point::new(0.5, 0.5)];
        let mut engine = GestureEngine::new(config(None));
        // 4px right and 4px up: inside the marker's 15px hit radius and the
        // affordance's 8px radius (anchor at +9,-9)
        let pos = screen(0.5, 0.5) + egui::vec2(4.0, -4.0);

        let actions = engine.handle(&PointerEvent::down(pos, PointerButton::Primary, 0.0), rect(), &points, Tool::Point);

        assert_eq!(actions, vec![GestureAction::RemovePoint(0)]);
        assert_eq!(engine.state(), GestureState::Idle);
    }

    #[test]
    fn test_secondary_press_near_marker_deletes() {
        let points = vec![Point::new(0.2, 0.2), Point::new(0.5, 0.5)];
        let mut engine = GestureEngine::new(config(None));
        let pos = screen(0.5, 0.5) + egui::vec2(-12.0, 10.0);

        let actions = engine.handle(&PointerEvent::down(pos, PointerButton::Secondary, 0.0), rect(), &points, Tool::Point);
        assert_eq!(actions, vec![GestureAction::RemovePoint(1)]);
    }

    #[test]
    fn test_secondary_press_on_empty_area_does_nothing() {
        let mut engine = GestureEngine::new(config(None));
        let actions = engine.handle(
            &PointerEvent::down(screen(0.5, 0.5), PointerButton::Secondary, 0.0),
            rect(),
            &[Point::new(0.1, 0.1)],
            Tool::Point,
        );
        assert!(actions.is_empty());
    }

    #[test]
    fn test_nearest_marker_wins() {
        let points = vec![Point::new(0.5, 0.5), Point::new(0.52, 0.5)];
        let pos = screen(0.52, 0.5) + egui::vec2(-2.0, 0.0);
        assert_eq!(hit_marker(&points, rect(), pos, 15.0), Some(1));
    }

    #[test]
    fn test_equal_distance_keeps_lower_index() {
        let points = vec![Point::new(0.5, 0.5), Point::new(0.5, 0.5)];
        assert_eq!(hit_marker(&points, rect(), screen(0.5, 0.5), 15.0), Some(0));
    }

    #[test]
    fn test_drag_starts_after_threshold_and_clamps() {
        let points = vec![Point::new(0.5, 0.5)];
        let mut engine = GestureEngine::new(config(None));
        let origin = screen(0.5, 0.5) + egui::vec2(-3.0, 3.0);

        assert!(engine
            .handle(&PointerEvent::down(origin, PointerButton::Primary, 0.0), rect(), &points, Tool::Point)
            .is_empty());
        assert!(engine
            .handle(&PointerEvent::moved(origin + egui::vec2(2.0, 0.0), 0.1), rect(), &points, Tool::Point)
            .is_empty());

        let far = egui::pos2(10_000.0, -10_000.0);
        let actions = engine.handle(&PointerEvent::moved(far, 0.2), rect(), &points, Tool::Point);
        assert_eq!(
            actions,
            vec![
                GestureAction::BeginDrag(0),
                GestureAction::MovePoint { index: 0, x: 1.0, y: 0.0 },
            ]
        );

        let actions = engine.handle(&PointerEvent::up(far, 0.3), rect(), &points, Tool::Point);
        assert_eq!(actions, vec![GestureAction::EndDrag(0)]);
        assert_eq!(engine.state(), GestureState::Idle);
    }

    #[test]
    fn test_long_press_deletes_when_still() {
        let points = vec![Point::new(0.5, 0.5)];
        let mut engine = GestureEngine::new(config(Some(1.0)));
        let origin = screen(0.5, 0.5) + egui::vec2(-3.0, 3.0);

        engine.handle(&PointerEvent::down(origin, PointerButton::Primary, 10.0), rect(), &points, Tool::Point);
        assert_eq!(engine.deadline(), Some(11.0));
        assert!(engine.tick(10.5).is_empty());
        assert_eq!(engine.tick(11.0), vec![GestureAction::RemovePoint(0)]);

        // Later motion and release are inert
        assert!(engine
            .handle(&PointerEvent::moved(origin + egui::vec2(50.0, 0.0), 11.1), rect(), &points, Tool::Point)
            .is_empty());
        assert!(engine.handle(&PointerEvent::up(origin, 11.2), rect(), &points, Tool::Point).is_empty());
    }

    #[test]
    fn test_movement_cancels_long_press() {
        let points = vec![Point::new(0.5, 0.5)];
        let mut engine = GestureEngine::new(config(Some(1.0)));
        let origin = screen(0.5, 0.5);

        engine.handle(&PointerEvent::down(origin, PointerButton::Primary, 0.0), rect(), &points, Tool::Point);
        let actions = engine.handle(
            &PointerEvent::moved(origin + egui::vec2(20.0, 0.0), 0.3),
            rect(),
            &points,
            Tool::Point,
        );
        assert_eq!(actions[0], GestureAction::BeginDrag(0));
        assert_eq!(engine.deadline(), None);
        assert!(engine.tick(5.0).is_empty());
    }

    #[test]
    fn test_release_before_deadline_cancels_long_press() {
        let points = vec![Point::new(0.5, 0.5)];
        let mut engine = GestureEngine::new(config(Some(1.0)));
        let origin = screen(0.5, 0.5);

        engine.handle(&PointerEvent::down(origin, PointerButton::Primary, 0.0), rect(), &points, Tool::Point);
        assert!(engine.handle(&PointerEvent::up(origin, 0.2), rect(), &points, Tool::Point).is_empty());
        assert!(engine.tick(2.0).is_empty());
    }

    #[test]
    fn test_late_event_fires_overdue_long_press_first() {
        let points = vec![Point::new(0.5, 0.5)];
        let mut engine = GestureEngine::new(config(Some(1.0)));
        let origin = screen(0.5, 0.5);

        engine.handle(&PointerEvent::down(origin, PointerButton::Primary, 0.0), rect(), &points, Tool::Point);
        let actions = engine.handle(
            &PointerEvent::moved(origin + egui::vec2(30.0, 0.0), 1.5),
            rect(),
            &points,
            Tool::Point,
        );
        assert_eq!(actions, vec![GestureAction::RemovePoint(0)]);
    }

    #[test]
    fn test_brush_stroke_lifecycle() {
        let mut engine = GestureEngine::new(config(None));
        let start = screen(0.25, 0.5);

        let actions = engine.handle(&PointerEvent::down(start, PointerButton::Primary, 0.0), rect(), &[], Tool::Brush);
        assert_eq!(
            actions,
            vec![GestureAction::BeginStroke { at: (0.25, 0.5), mode: StrokeMode::Paint }]
        );

        let actions = engine.handle(&PointerEvent::moved(screen(0.5, 0.5), 0.1), rect(), &[], Tool::Brush);
        assert_eq!(
            actions,
            vec![GestureAction::ExtendStroke {
                from: (0.25, 0.5),
                to: (0.5, 0.5),
                mode: StrokeMode::Paint,
            }]
        );

        let actions = engine.handle(&PointerEvent::up(screen(0.5, 0.5), 0.2), rect(), &[], Tool::Brush);
        assert_eq!(actions, vec![GestureAction::EndStroke]);
    }

    #[test]
    fn test_eraser_ignores_points_and_secondary() {
        let points = vec![Point::new(0.5, 0.5)];
        let mut engine = GestureEngine::new(config(None));

        let actions = engine.handle(
            &PointerEvent::down(screen(0.5, 0.5), PointerButton::Secondary, 0.0),
            rect(),
            &points,
            Tool::Eraser,
        );
        assert!(actions.is_empty());

        let actions = engine.handle(
            &PointerEvent::down(screen(0.5, 0.5), PointerButton::Primary, 0.0),
            rect(),
            &points,
            Tool::Eraser,
        );
        assert_eq!(
            actions,
            vec![GestureAction::BeginStroke { at: (0.5, 0.5), mode: StrokeMode::Erase }]
        );
    }

    #[test]
    fn test_press_while_active_finishes_previous_gesture() {
        let mut engine = GestureEngine::new(config(None));
        engine.handle(&PointerEvent::down(screen(0.2, 0.2), PointerButton::Primary, 0.0), rect(), &[], Tool::Brush);

        let actions = engine.handle(&PointerEvent::down(screen(0.4, 0.4), PointerButton::Primary, 0.5), rect(), &[], Tool::Brush);
        assert_eq!(actions[0], GestureAction::EndStroke);
        assert!(matches!(actions[1], GestureAction::BeginStroke { .. }));
    }
}
