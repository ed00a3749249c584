// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Data model: point markers, mask raster, undo history and the persisted
//! node fields.

pub mod annotation;
pub mod history;
pub mod mask;
pub mod workflow;
