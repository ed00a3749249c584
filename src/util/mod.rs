// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Small helpers shared by the models, the render pipeline and the UI.

pub mod color;
pub mod geometry;
