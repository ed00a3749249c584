// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Persisted node state.
//!
//! These are the string fields the host stores for an annotation node, and
//! the workflow record the host harness saves to disk.

use serde::{Deserialize, Serialize};

/// Widget field names as the downstream processing node expects them.
pub const POINTS_FIELD: &str = "points_data";
pub const MASK_FIELD: &str = "mask_data";

/// The two persisted string fields of an annotation node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedFields {
    /// JSON array of pixel-space points.
    #[serde(default = "empty_points")]
    pub points_data: String,
    /// Empty, or a `data:image/...;base64,` URI.
    #[serde(default)]
    pub mask_data: String,
}

fn empty_points() -> String {
    "[]".to_string()
}

impl Default for PersistedFields {
    fn default() -> Self {
        Self {
            points_data: empty_points(),
            mask_data: String::new(),
        }
    }
}

/// Complete node record for workflow files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowData {
    /// Source image reference, if one is selected.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(flatten)]
    pub fields: PersistedFields,
}

impl WorkflowData {
    pub fn new(image: Option<String>, fields: PersistedFields) -> Self {
        Self { image, fields }
    }
}
