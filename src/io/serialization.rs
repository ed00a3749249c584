// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Persisted encodings.
//!
//! This module converts points to and from the `points_data` JSON array,
//! masks to and from `mask_data` data URIs, and exports/imports workflow
//! records in YAML and JSON formats.

use crate::models::annotation::{PixelPoint, Point};
use crate::models::mask::MaskLayer;
use crate::models::workflow::WorkflowData;
use crate::util::geometry::to_pixel;
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::{imageops, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Every accepted mask URI starts with this.
pub const MASK_URI_PREFIX: &str = "data:image";

/// Convert normalized points to persisted pixel points.
pub fn to_pixel_points(points: &[Point], width: u32, height: u32) -> Vec<PixelPoint> {
    points
        .iter()
        .map(|p| {
            let (x, y) = to_pixel(p, width, height);
            PixelPoint {
                x,
                y,
                color: p.color.clone(),
            }
        })
        .collect()
}

/// Round points that already hold pixel values (pending rehydration).
pub fn round_pixel_points(points: &[Point]) -> Vec<PixelPoint> {
    points
        .iter()
        .map(|p| PixelPoint {
            x: p.x.round().max(0.0) as u32,
            y: p.y.round().max(0.0) as u32,
            color: p.color.clone(),
        })
        .collect()
}

/// Serialize pixel points as the `points_data` JSON array.
pub fn encode_points(points: &[PixelPoint]) -> Result<String> {
    Ok(serde_json::to_string(points)?)
}

/// Parse `points_data`. Empty input is an empty list; values are returned
/// as stored, the caller classifies their encoding.
pub fn decode_points(data: &str) -> Result<Vec<Point>> {
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    let points = serde_json::from_str(data).context("points_data is not a point array")?;
    Ok(points)
}

/// Encode a mask as a PNG data URI. A mask without coverage encodes to "".
pub fn encode_mask(mask: &MaskLayer) -> Result<String> {
    if mask.is_empty() {
        return Ok(String::new());
    }
    let mut bytes = Vec::new();
    mask.pixels()
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("Failed to encode mask as PNG")?;
    Ok(format!("data:image/png;base64,{}", BASE64_STANDARD.encode(bytes)))
}

/// Decode a `mask_data` string. "" means no mask.
pub fn decode_mask(data: &str) -> Result<Option<RgbaImage>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if !data.starts_with(MASK_URI_PREFIX) {
        bail!("mask_data is not an image data URI");
    }
    let Some((_, encoded)) = data.split_once(',') else {
        bail!("mask_data has no payload");
    };
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .context("mask_data payload is not base64")?;
    let image = image::load_from_memory(&bytes).context("Failed to decode mask image")?;
    Ok(Some(image.to_rgba8()))
}

/// Resample a decoded mask to the native size of its image if needed.
pub fn fit_mask(mask: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if mask.dimensions() == (width, height) {
        mask
    } else {
        imageops::resize(&mask, width, height, imageops::FilterType::Triangle)
    }
}

/// Export a workflow record to YAML format.
pub fn export_yaml(data: &WorkflowData, path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(data)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

/// Export a workflow record to JSON format.
pub fn export_json(data: &WorkflowData, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Import a workflow record from YAML format.
pub fn import_yaml(path: &Path) -> Result<WorkflowData> {
    let yaml = std::fs::read_to_string(path)?;
    let data = serde_yaml::from_str(&yaml)?;
    Ok(data)
}

/// Import a workflow record from JSON format.
pub fn import_json(path: &Path) -> Result<WorkflowData> {
    let json = std::fs::read_to_string(path)?;
    let data = serde_json::from_str(&json)?;
    Ok(data)
}
