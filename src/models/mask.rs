// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Freehand mask raster.
//!
//! The mask always has the native pixel size of the source image it belongs
//! to. Brush strokes are rasterized as round-capped segments directly into
//! the RGBA buffer. The raster is shared copy-on-write, so undo snapshots
//! only hold their own copy once a stroke actually changes pixels.

use egui::Color32;
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Compositing rule for a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokeMode {
    /// Source-over with an opaque brush color.
    Paint,
    /// Erase to full transparency.
    Erase,
}

/// RGBA raster painted with brush and eraser strokes.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskLayer {
    pixels: Arc<RgbaImage>,
    /// Number of pixels with non-zero alpha.
    coverage: usize,
    /// Unique per content change. Restoring a snapshot restores its revision,
    /// so caches keyed on it never confuse two different contents.
    revision: u64,
}

impl MaskLayer {
    /// Create a fully transparent mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_image(RgbaImage::new(width, height))
    }

    /// Wrap an existing raster.
    pub fn from_image(pixels: RgbaImage) -> Self {
        let coverage = pixels.pixels().filter(|p| p.0[3] != 0).count();
        Self {
            pixels: Arc::new(pixels),
            coverage,
            revision: next_revision(),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of pixels with non-zero alpha.
    pub fn coverage(&self) -> usize {
        self.coverage
    }

    /// True when no pixel carries any coverage.
    pub fn is_empty(&self) -> bool {
        self.coverage == 0
    }

    /// Whether two layers share one raster allocation.
    #[cfg(test)]
    pub(crate) fn shares_pixels(&self, other: &MaskLayer) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// Reset every pixel to transparent.
    pub fn clear(&mut self) {
        let (width, height) = self.dimensions();
        self.pixels = Arc::new(RgbaImage::new(width, height));
        self.coverage = 0;
        self.revision = next_revision();
    }

    /// Rasterize a round-capped segment between two pixel positions.
    ///
    /// Returns whether any pixel of the mask was covered.
    pub fn paint_stroke(
        &mut self,
        from: (f64, f64),
        to: (f64, f64),
        size: f32,
        color: Color32,
        mode: StrokeMode,
    ) -> bool {
        let (width, height) = self.dimensions();
        if width == 0 || height == 0 {
            return false;
        }

        let radius = (size as f64 / 2.0).max(0.5);
        let min_x = (from.0.min(to.0) - radius).floor().max(0.0);
        let min_y = (from.1.min(to.1) - radius).floor().max(0.0);
        let max_x = (from.0.max(to.0) + radius).ceil().min(width as f64 - 1.0);
        let max_y = (from.1.max(to.1) + radius).ceil().min(height as f64 - 1.0);
        if min_x > max_x || min_y > max_y {
            return false;
        }

        let value = match mode {
            StrokeMode::Paint => Rgba([color.r(), color.g(), color.b(), 255]),
            StrokeMode::Erase => Rgba([0, 0, 0, 0]),
        };

        let mut covered = false;
        let pixels = Arc::make_mut(&mut self.pixels);
        for py in min_y as u32..=max_y as u32 {
            for px in min_x as u32..=max_x as u32 {
                let center = (px as f64 + 0.5, py as f64 + 0.5);
                if distance_to_segment(center, from, to) <= radius {
                    let pixel = pixels.get_pixel_mut(px, py);
                    match (pixel.0[3] != 0, value.0[3] != 0) {
                        (false, true) => self.coverage += 1,
                        (true, false) => self.coverage -= 1,
                        _ => {}
                    }
                    *pixel = value;
                    covered = true;
                }
            }
        }

        if covered {
            self.revision = next_revision();
        }
        covered
    }
}

fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let ab = (b.0 - a.0, b.1 - a.1);
    let ap = (p.0 - a.0, p.1 - a.1);
    let len_sq = ab.0 * ab.0 + ab.1 * ab.1;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        ((ap.0 * ab.0 + ap.1 * ab.1) / len_sq).clamp(0.0, 1.0)
    };
    let closest = (a.0 + ab.0 * t, a.1 + ab.1 * t);
    ((p.0 - closest.0).powi(2) + (p.1 - closest.1).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_mask_is_empty() {
        let mask = MaskLayer::new(20, 10);
        assert_eq!(mask.dimensions(), (20, 10));
        assert!(mask.is_empty());
    }

    #[test]
    fn test_paint_stroke_covers_segment_only() {
        let mut mask = MaskLayer::new(50, 50);
        let before = mask.revision();

        assert!(mask.paint_stroke((10.0, 10.0), (30.0, 10.0), 4.0, Color32::RED, StrokeMode::Paint));

        assert_eq!(mask.pixels().get_pixel(20, 10).0, [255, 0, 0, 255]);
        assert_eq!(mask.pixels().get_pixel(20, 20).0[3], 0);
        assert_ne!(mask.revision(), before);
        assert!(!mask.is_empty());
    }

    #[test]
    fn test_round_cap_extends_past_endpoint() {
        let mut mask = MaskLayer::new(50, 50);
        mask.paint_stroke((10.0, 10.0), (30.0, 10.0), 6.0, Color32::WHITE, StrokeMode::Paint);

        // 2px beyond the end point, inside the 3px cap radius
        assert_eq!(mask.pixels().get_pixel(31, 9).0[3], 255);
        // Corner of the bounding square lies outside the cap
        assert_eq!(mask.pixels().get_pixel(33, 13).0[3], 0);
    }

    #[test]
    fn test_press_without_motion_lays_a_dot() {
        let mut mask = MaskLayer::new(20, 20);
        assert!(mask.paint_stroke((5.0, 5.0), (5.0, 5.0), 4.0, Color32::BLACK, StrokeMode::Paint));
        assert_eq!(mask.pixels().get_pixel(5, 5).0[3], 255);
    }

    #[test]
    fn test_erase_clears_to_transparent() {
        let mut mask = MaskLayer::new(50, 50);
        mask.paint_stroke((10.0, 10.0), (30.0, 10.0), 4.0, Color32::RED, StrokeMode::Paint);
        mask.paint_stroke((0.0, 10.0), (49.0, 10.0), 8.0, Color32::RED, StrokeMode::Erase);

        assert!(mask.is_empty());
    }

    #[test]
    fn test_stroke_outside_raster_is_ignored() {
        let mut mask = MaskLayer::new(10, 10);
        assert!(!mask.paint_stroke((-50.0, -50.0), (-40.0, -40.0), 4.0, Color32::RED, StrokeMode::Paint));
        assert!(mask.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut mask = MaskLayer::new(10, 10);
        mask.paint_stroke((0.0, 0.0), (9.0, 9.0), 3.0, Color32::RED, StrokeMode::Paint);
        mask.clear();
        assert!(mask.is_empty());
        assert_eq!(mask.pixels().get_pixel(5, 5).0[3], 0);
    }

    #[test]
    fn test_coverage_tracks_paint_and_erase() {
        let mut mask = MaskLayer::new(20, 20);
        mask.paint_stroke((5.0, 5.0), (5.0, 5.0), 4.0, Color32::RED, StrokeMode::Paint);
        let painted = mask.coverage();
        assert_eq!(painted, mask.pixels().pixels().filter(|p| p.0[3] != 0).count());

        // Repainting covered pixels does not count them twice
        mask.paint_stroke((5.0, 5.0), (5.0, 5.0), 4.0, Color32::BLUE, StrokeMode::Paint);
        assert_eq!(mask.coverage(), painted);

        mask.paint_stroke((5.0, 5.0), (5.0, 5.0), 2.0, Color32::RED, StrokeMode::Erase);
        assert!(mask.coverage() < painted);
        assert_eq!(mask.coverage(), mask.pixels().pixels().filter(|p| p.0[3] != 0).count());
    }

    #[test]
    fn test_from_image_counts_existing_coverage() {
        let mut pixels = RgbaImage::new(4, 4);
        pixels.put_pixel(1, 1, Rgba([255, 255, 255, 128]));
        pixels.put_pixel(2, 3, Rgba([0, 0, 0, 255]));
        assert_eq!(MaskLayer::from_image(pixels).coverage(), 2);
    }

    #[test]
    fn test_clone_shares_raster_until_painted() {
        let mut mask = MaskLayer::new(10, 10);
        let snapshot = mask.clone();
        assert!(mask.shares_pixels(&snapshot));

        mask.paint_stroke((2.0, 2.0), (2.0, 2.0), 2.0, Color32::RED, StrokeMode::Paint);

        assert!(!mask.shares_pixels(&snapshot));
        assert!(snapshot.is_empty());
        assert!(!mask.is_empty());
    }
}
