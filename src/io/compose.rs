// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Node outputs.
//!
//! Turns the source image and the two persisted fields into what the
//! annotation node hands downstream: the fully annotated image, the mask
//! plane, the image with only the mask, the image with only the markers and
//! the point list as JSON.

use crate::io::serialization::{
    decode_mask, decode_points, encode_points, fit_mask, round_pixel_points, to_pixel_points,
};
use crate::models::annotation::PixelPoint;
use crate::models::workflow::PersistedFields;
use crate::util::geometry::{classify_encoding, CoordinateEncoding};
use anyhow::{Context, Result};
use image::{ImageBuffer, Luma, Rgb, RgbImage, RgbaImage};
use std::path::Path;

/// Side length of the placeholder outputs when no image is selected.
pub const EMPTY_SIZE: u32 = 512;

/// Single channel mask with coverage in 0.0..=1.0.
pub type MaskPlane = ImageBuffer<Luma<f32>, Vec<f32>>;

const MARKER_FILL: Rgb<u8> = Rgb([255, 0, 0]);
const MARKER_INK: Rgb<u8> = Rgb([255, 255, 255]);

/// Everything one evaluation of the node produces.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutputs {
    /// Base image, mask blended over it, numbered markers on top.
    pub images: RgbImage,
    /// Mask alpha scaled to 0..1.
    pub mask: MaskPlane,
    /// Base image with the mask only.
    pub image_doodle: RgbImage,
    /// Base image with the markers only.
    pub image_points: RgbImage,
    /// Pixel points as JSON.
    pub json_points: String,
}

impl NodeOutputs {
    /// Black placeholder outputs.
    pub fn empty() -> Self {
        let image = RgbImage::new(EMPTY_SIZE, EMPTY_SIZE);
        Self {
            images: image.clone(),
            mask: MaskPlane::new(EMPTY_SIZE, EMPTY_SIZE),
            image_doodle: image.clone(),
            image_points: image,
            json_points: "[]".to_string(),
        }
    }

    /// Write every output into `dir` as PNG files plus `points.json`.
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        self.images.save(dir.join("images.png"))?;
        self.image_doodle.save(dir.join("image_doodle.png"))?;
        self.image_points.save(dir.join("image_points.png"))?;

        let mask: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_fn(self.mask.width(), self.mask.height(), |x, y| {
                Luma([(self.mask.get_pixel(x, y).0[0] * 255.0).round() as u8])
            });
        mask.save(dir.join("mask.png"))?;

        std::fs::write(dir.join("points.json"), &self.json_points)?;
        log::info!("Wrote node outputs to {}", dir.display());
        Ok(())
    }
}

/// Evaluate the node. Malformed fields degrade to no points or no mask.
pub fn process(base: Option<&RgbaImage>, fields: &PersistedFields) -> NodeOutputs {
    let Some(base) = base else {
        return NodeOutputs::empty();
    };
    let (width, height) = base.dimensions();
    let base_rgb = to_rgb(base);

    let doodle = match decode_mask(&fields.mask_data) {
        Ok(Some(mask)) => Some(fit_mask(mask, width, height)),
        Ok(None) => None,
        Err(e) => {
            log::warn!("Ignoring undecodable mask_data: {:#}", e);
            None
        }
    };

    let points = pixel_points(&fields.points_data, width, height);
    let json_points = encode_points(&points).unwrap_or_else(|_| "[]".to_string());

    let (image_doodle, mask) = match &doodle {
        Some(doodle) => (blend(&base_rgb, doodle), mask_plane(doodle)),
        None => (base_rgb.clone(), MaskPlane::new(width, height)),
    };

    let mut images = image_doodle.clone();
    draw_markers(&mut images, &points);
    let mut image_points = base_rgb;
    draw_markers(&mut image_points, &points);

    NodeOutputs {
        images,
        mask,
        image_doodle,
        image_points,
        json_points,
    }
}

/// Stored points in pixel space. Normalized lists are scaled to the image.
fn pixel_points(data: &str, width: u32, height: u32) -> Vec<PixelPoint> {
    let points = match decode_points(data) {
        Ok(points) => points,
        Err(e) => {
            log::warn!("Ignoring malformed points_data: {:#}", e);
            return Vec::new();
        }
    };
    match classify_encoding(&points) {
        CoordinateEncoding::Pixel => round_pixel_points(&points),
        CoordinateEncoding::Normalized => to_pixel_points(&points, width, height),
    }
}

fn to_rgb(image: &RgbaImage) -> RgbImage {
    ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        Rgb([r, g, b])
    })
}

fn blend(base: &RgbImage, doodle: &RgbaImage) -> RgbImage {
    ImageBuffer::from_fn(base.width(), base.height(), |x, y| {
        let [fr, fg, fb, fa] = doodle.get_pixel(x, y).0;
        let alpha = fa as f32 / 255.0;
        let bg = base.get_pixel(x, y).0;
        let mix = |f: u8, b: u8| (f as f32 * alpha + b as f32 * (1.0 - alpha)) as u8;
        Rgb([mix(fr, bg[0]), mix(fg, bg[1]), mix(fb, bg[2])])
    })
}

fn mask_plane(doodle: &RgbaImage) -> MaskPlane {
    ImageBuffer::from_fn(doodle.width(), doodle.height(), |x, y| {
        Luma([doodle.get_pixel(x, y).0[3] as f32 / 255.0])
    })
}

/// Marker radius for an image: 1.5% of the short side, at least 10px.
pub fn marker_radius(width: u32, height: u32) -> i64 {
    ((width.min(height) as f64 * 0.015) as i64).max(10)
}

/// Draw red numbered discs with a white ring at every point.
fn draw_markers(canvas: &mut RgbImage, points: &[PixelPoint]) {
    let radius = marker_radius(canvas.width(), canvas.height());
    let ring = ((radius as f64 * 0.15) as i64).max(1) as f64;
    let cell = ((radius as f64 * 0.18).round() as i64).max(1);

    for (i, point) in points.iter().enumerate() {
        let (cx, cy) = (point.x as i64, point.y as i64);
        let outer = radius as f64 + ring / 2.0;
        let inner = radius as f64 - ring / 2.0;
        let reach = outer.ceil() as i64;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let distance = ((dx * dx + dy * dy) as f64).sqrt();
                let color = if distance >= inner && distance <= outer {
                    MARKER_INK
                } else if distance < inner {
                    MARKER_FILL
                } else {
                    continue;
                };
                put(canvas, cx + dx, cy + dy, color);
            }
        }
        draw_number(canvas, cx, cy, i + 1, cell);
    }
}

/// 3x5 digit bitmaps, one row per entry, most significant bit on the left.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b010, 0b010, 0b010],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// Draw `number` centered on `(cx, cy)` with square cells of `cell` px.
fn draw_number(canvas: &mut RgbImage, cx: i64, cy: i64, number: usize, cell: i64) {
    let digits: Vec<usize> = number
        .to_string()
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect();
    let count = digits.len() as i64;
    let text_width = (count * 4 - 1) * cell;
    let left = cx - text_width / 2;
    let top = cy - 5 * cell / 2;

    for (n, digit) in digits.iter().enumerate() {
        let origin = left + n as i64 * 4 * cell;
        for (row, bits) in DIGITS[*digit].iter().enumerate() {
            for col in 0..3 {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                let x0 = origin + col * cell;
                let y0 = top + row as i64 * cell;
                for y in y0..y0 + cell {
                    for x in x0..x0 + cell {
                        put(canvas, x, y, MARKER_INK);
                    }
                }
            }
        }
    }
}

fn put(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < canvas.width() as i64 && y < canvas.height() as i64 {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}
