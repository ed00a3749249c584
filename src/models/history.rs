// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Bounded undo history for the modal editor.

use super::annotation::AnnotationState;

/// Default number of snapshots kept.
pub const DEFAULT_CAPACITY: usize = 20;

/// Undo stack of `(points, mask)` snapshots.
#[derive(Debug, Clone)]
pub struct History {
    /// Past states, oldest first
    undo_stack: Vec<AnnotationState>,
    /// Maximum history size
    max_size: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History {
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            max_size: max_size.max(1),
        }
    }

    /// Save the current state before making a change. Mask rasters are
    /// shared with `state` until one side paints.
    pub fn push(&mut self, state: &AnnotationState) {
        self.undo_stack.push(state.clone());
        if self.undo_stack.len() > self.max_size {
            self.undo_stack.remove(0);
        }
    }

    /// Pop the most recent snapshot.
    pub fn undo(&mut self) -> Option<AnnotationState> {
        self.undo_stack.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Number of snapshots held.
    pub fn depth(&self) -> usize {
        self.undo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::mask::StrokeMode;

    fn state_with(n: usize) -> AnnotationState {
        let mut state = AnnotationState::default();
        for i in 0..n {
            state.add_point(0.1 * i as f64, 0.5, None);
        }
        state
    }

    #[test]
    fn test_undo_returns_latest_snapshot() {
        let mut history = History::new(5);
        history.push(&state_with(1));
        history.push(&state_with(2));

        assert_eq!(history.undo().map(|s| s.points().len()), Some(2));
        assert_eq!(history.undo().map(|s| s.points().len()), Some(1));
        assert!(history.undo().is_none());
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut history = History::new(3);
        for n in 0..5 {
            history.push(&state_with(n));
        }

        assert_eq!(history.depth(), 3);
        let remaining: Vec<usize> = std::iter::from_fn(|| history.undo())
            .map(|s| s.points().len())
            .collect();
        assert_eq!(remaining, vec![4, 3, 2]);
    }

    #[test]
    fn test_snapshot_shares_unchanged_mask() {
        let mut state = AnnotationState::default();
        state.ensure_mask(64, 64);
        let mut history = History::default();

        history.push(&state);
        state.add_point(0.5, 0.5, None);
        history.push(&state);
        state.paint_stroke((8.0, 8.0), (8.0, 8.0), 4.0, egui::Color32::RED, StrokeMode::Paint);

        let latest = history.undo().and_then(|s| s.mask().cloned());
        let first = history.undo().and_then(|s| s.mask().cloned());
        let (Some(latest), Some(first)) = (latest, first) else {
            panic!("snapshots lost their mask");
        };
        assert!(latest.shares_pixels(&first));
        assert!(latest.is_empty());
        assert!(state.mask().is_some_and(|m| !m.shares_pixels(&latest)));
    }
}
