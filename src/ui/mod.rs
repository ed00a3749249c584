// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! egui widgets for the node body and the modal editor.

pub mod canvas;
pub mod properties;
pub mod toolbar;
