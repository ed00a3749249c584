// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application configuration.
//!
//! Every field has a default, so a YAML file only needs to name the values
//! it changes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where source images come from and where the editor saves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the image server. When unset, images are read from
    /// `input_dir`.
    pub base_url: Option<String>,
    /// Local input directory.
    pub input_dir: PathBuf,
    /// Remote save endpoint for the modal editor. When unset, saving commits
    /// locally.
    pub save_endpoint: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            input_dir: PathBuf::from("input"),
            save_endpoint: None,
        }
    }
}

/// Geometry and timing of one drawing surface. Distances are screen pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Marker circle radius.
    pub marker_radius: f32,
    /// Marker label font size.
    pub label_size: f32,
    /// Distance within which a primary press grabs a marker.
    pub hit_radius: f32,
    /// Distance within which a secondary press deletes a marker.
    pub secondary_hit_radius: f32,
    /// Offset of the delete affordance from the marker center, applied as
    /// `(+offset, -offset)`.
    pub delete_offset: f32,
    /// Hit radius of the delete affordance.
    pub delete_radius: f32,
    /// Radius of the drawn delete glyph.
    pub delete_glyph_radius: f32,
    /// Hold time after which a pressed marker is deleted. `None` disables
    /// long-press deletion.
    pub long_press_ms: Option<u64>,
    /// Movement that turns a press into a drag.
    pub drag_threshold: f32,
    /// Default marker fill, `#rrggbb`.
    pub marker_color: String,
    /// Show the pixel-space coordinate readout.
    pub show_coordinates: bool,
}

impl SurfaceConfig {
    /// Compact surface drawn on the node body.
    pub fn inline() -> Self {
        Self {
            marker_radius: 10.0,
            label_size: 10.0,
            hit_radius: 15.0,
            secondary_hit_radius: 20.0,
            delete_offset: 9.0,
            delete_radius: 8.0,
            delete_glyph_radius: 6.0,
            long_press_ms: Some(1000),
            drag_threshold: 5.0,
            marker_color: "#ff0000".to_string(),
            show_coordinates: false,
        }
    }

    /// Enlarged modal editor surface.
    pub fn editor() -> Self {
        Self {
            marker_radius: 15.0,
            label_size: 14.0,
            hit_radius: 25.0,
            secondary_hit_radius: 25.0,
            delete_offset: 13.0,
            delete_radius: 12.0,
            delete_glyph_radius: 8.0,
            long_press_ms: None,
            drag_threshold: 2.0,
            marker_color: "#ff0000".to_string(),
            show_coordinates: true,
        }
    }

    pub fn long_press_secs(&self) -> Option<f64> {
        self.long_press_ms.map(|ms| ms as f64 / 1000.0)
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self::inline()
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub inline: SurfaceConfig,
    pub editor: SurfaceConfig,
    /// Translucency of the mask overlay.
    pub mask_alpha: f32,
    /// Undo snapshots kept by the modal editor.
    pub history_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            inline: SurfaceConfig::inline(),
            editor: SurfaceConfig::editor(),
            mask_alpha: 0.7,
            history_capacity: crate::models::history::DEFAULT_CAPACITY,
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&yaml).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse configuration. A partial `editor` section is completed from the
    /// editor defaults rather than the inline ones.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        if let Some(editor) = value.get_mut("editor") {
            let overrides = std::mem::replace(editor, serde_yaml::Value::Null);
            let mut merged = serde_yaml::to_value(SurfaceConfig::editor())?;
            merge_mapping(&mut merged, overrides);
            *editor = merged;
        }
        Ok(serde_yaml::from_value(value)?)
    }
}

fn merge_mapping(base: &mut serde_yaml::Value, overrides: serde_yaml::Value) {
    match overrides {
        serde_yaml::Value::Null => {}
        serde_yaml::Value::Mapping(overrides) => {
            if let serde_yaml::Value::Mapping(base) = base {
                for (key, value) in overrides {
                    base.insert(key, value);
                }
            } else {
                *base = serde_yaml::Value::Mapping(overrides);
            }
        }
        other => *base = other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(AppConfig::from_yaml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = "
server:
  base_url: http://127.0.0.1:8188
editor:
  long_press_ms: 600
history_capacity: 5
";
        let config = AppConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.server.base_url.as_deref(), Some("http://127.0.0.1:8188"));
        assert_eq!(config.server.input_dir, PathBuf::from("input"));
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.editor.long_press_secs(), Some(0.6));
        assert_eq!(config.editor.marker_radius, SurfaceConfig::editor().marker_radius);
        assert_eq!(config.inline, SurfaceConfig::inline());
        assert_eq!(config.mask_alpha, 0.7);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(AppConfig::from_yaml("history_capacity: [1, 2").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "mask_alpha: 0.5\n").unwrap();

        assert_eq!(AppConfig::load(&path).unwrap().mask_alpha, 0.5);
        assert!(AppConfig::load(&dir.path().join("missing.yaml")).is_err());
    }
}
