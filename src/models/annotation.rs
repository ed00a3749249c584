// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation data structures.
//!
//! This module defines the point markers and the in-memory annotation state
//! (points plus mask raster) that one node instance or one editor session
//! owns.

use super::mask::{MaskLayer, StrokeMode};
use crate::util::geometry::in_unit_square;
use serde::{Deserialize, Serialize};

/// A point marker with normalized coordinates (0.0 to 1.0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Point {
    /// Create a point without an explicit color.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, color: None }
    }

    pub fn with_color(mut self, color: Option<String>) -> Self {
        self.color = color;
        self
    }
}

/// A point marker as persisted, in integer pixel space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: u32,
    pub y: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Points and mask of one annotation session.
///
/// Every mutating call that actually changes something sets the dirty flag;
/// the owner consumes it with [`AnnotationState::take_dirty`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationState {
    points: Vec<Point>,
    mask: Option<MaskLayer>,
    dirty: bool,
}

impl AnnotationState {
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn mask(&self) -> Option<&MaskLayer> {
        self.mask.as_ref()
    }

    /// Append a point. Coordinates outside the image are rejected.
    pub fn add_point(&mut self, x: f64, y: f64, color: Option<String>) -> bool {
        if !in_unit_square(x, y) {
            return false;
        }
        self.points.push(Point::new(x, y).with_color(color));
        self.dirty = true;
        true
    }

    /// Move a point, clamping the target into the image. Stale indices are
    /// ignored.
    pub fn move_point(&mut self, index: usize, x: f64, y: f64) -> bool {
        let Some(point) = self.points.get_mut(index) else {
            return false;
        };
        let (x, y) = (clamp_unit(x), clamp_unit(y));
        if point.x != x || point.y != y {
            point.x = x;
            point.y = y;
            self.dirty = true;
        }
        true
    }

    /// Remove a point. Stale indices are ignored.
    pub fn remove_point(&mut self, index: usize) -> Option<Point> {
        if index >= self.points.len() {
            return None;
        }
        self.dirty = true;
        Some(self.points.remove(index))
    }

    /// Replace the whole point list.
    pub fn set_points(&mut self, points: Vec<Point>) {
        if self.points != points {
            self.points = points;
            self.dirty = true;
        }
    }

    pub fn clear_points(&mut self) {
        if !self.points.is_empty() {
            self.points.clear();
            self.dirty = true;
        }
    }

    /// Make every mask pixel transparent, keeping the allocation.
    pub fn clear_mask(&mut self) {
        if let Some(mask) = self.mask.as_mut() {
            if !mask.is_empty() {
                mask.clear();
                self.dirty = true;
            }
        }
    }

    pub fn clear_all(&mut self) {
        self.clear_points();
        self.clear_mask();
    }

    /// Replace (or drop) the mask raster.
    pub fn set_mask(&mut self, mask: Option<MaskLayer>) {
        if self.mask != mask {
            self.mask = mask;
            self.dirty = true;
        }
    }

    /// Make sure a mask of exactly `width` x `height` exists.
    pub fn ensure_mask(&mut self, width: u32, height: u32) {
        let matches = self
            .mask
            .as_ref()
            .is_some_and(|m| m.dimensions() == (width, height));
        if !matches {
            self.mask = Some(MaskLayer::new(width, height));
            self.dirty = true;
        }
    }

    /// Apply a brush or eraser segment in mask pixel space. Without a mask
    /// this does nothing.
    pub fn paint_stroke(
        &mut self,
        from: (f64, f64),
        to: (f64, f64),
        size: f32,
        color: egui::Color32,
        mode: StrokeMode,
    ) -> bool {
        let Some(mask) = self.mask.as_mut() else {
            return false;
        };
        let covered = mask.paint_stroke(from, to, size, color, mode);
        if covered {
            self.dirty = true;
        }
        covered
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Return and reset the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
