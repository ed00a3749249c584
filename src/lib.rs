// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Point and mask annotation node.
//!
//! An image annotation tool made of two drawing surfaces: a compact inline
//! preview owned by an [`node::AnnotationNode`] and an enlarged
//! [`editor::ModalEditor`] that works on a copy of the node's state. Points
//! and masks are persisted as the `points_data` and `mask_data` string
//! fields a downstream processing node consumes.

pub mod config;
pub mod editor;
pub mod error;
pub mod gesture;
pub mod io;
pub mod models;
pub mod node;
pub mod render;
pub mod ui;
pub mod util;
