// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! This module provides utilities for coordinate transformations between
//! pixel coordinates, normalized coordinates and screen space, plus the
//! letterbox fit used by every drawing surface.

use crate::models::annotation::Point;

/// How a list of stored coordinates is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateEncoding {
    /// Integer positions in source-image pixel space.
    Pixel,
    /// Fractions of the image width/height.
    Normalized,
}

/// Convert normalized coordinates to integer pixel coordinates.
pub fn to_pixel(point: &Point, width: u32, height: u32) -> (u32, u32) {
    let x = (point.x * width as f64).round().max(0.0);
    let y = (point.y * height as f64).round().max(0.0);
    (x as u32, y as u32)
}

/// Convert pixel coordinates to normalized coordinates (0.0 to 1.0).
///
/// No clamping happens here, range validity is up to the caller.
pub fn to_normalized(pixel_x: f64, pixel_y: f64, width: u32, height: u32) -> Point {
    Point::new(pixel_x / width as f64, pixel_y / height as f64)
}

/// Guess the encoding of a stored point list.
///
/// A list is pixel-encoded as soon as one coordinate exceeds 1.0. An empty
/// list is reported as normalized.
pub fn classify_encoding<'a>(points: impl IntoIterator<Item = &'a Point>) -> CoordinateEncoding {
    if points.into_iter().any(|p| p.x > 1.0 || p.y > 1.0) {
        CoordinateEncoding::Pixel
    } else {
        CoordinateEncoding::Normalized
    }
}

/// Fit an image of the given native size into `area`, keeping its aspect
/// ratio and centering it.
pub fn fit_rect(area: egui::Rect, img_width: u32, img_height: u32) -> egui::Rect {
    if img_width == 0 || img_height == 0 || area.width() <= 0.0 || area.height() <= 0.0 {
        return area;
    }

    let img_aspect = img_width as f32 / img_height as f32;
    let area_aspect = area.width() / area.height();

    let (display_width, display_height) = if img_aspect > area_aspect {
        // Image is wider - fit to width
        let width = area.width();
        (width, width / img_aspect)
    } else {
        // Image is taller - fit to height
        let height = area.height();
        (height * img_aspect, height)
    };

    let x_offset = (area.width() - display_width) / 2.0;
    let y_offset = (area.height() - display_height) / 2.0;

    egui::Rect::from_min_size(
        area.min + egui::vec2(x_offset, y_offset),
        egui::vec2(display_width, display_height),
    )
}

/// Map a screen position into normalized space relative to `rect`.
pub fn screen_to_normalized(pos: egui::Pos2, rect: egui::Rect) -> (f64, f64) {
    let x = (pos.x - rect.min.x) / rect.width();
    let y = (pos.y - rect.min.y) / rect.height();
    (x as f64, y as f64)
}

/// Map normalized coordinates into screen space for `rect`.
pub fn normalized_to_screen(x: f64, y: f64, rect: egui::Rect) -> egui::Pos2 {
    egui::pos2(
        rect.min.x + x as f32 * rect.width(),
        rect.min.y + y as f32 * rect.height(),
    )
}

/// Whether both normalized components lie inside the image.
pub fn in_unit_square(x: f64, y: f64) -> bool {
    (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y)
}
