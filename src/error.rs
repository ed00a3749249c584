// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! User-visible rejections.

use thiserror::Error;

/// Reasons an editor action is refused. None of them changes any state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnnotateError {
    #[error("Please select an image first")]
    NoImage,
    #[error("Image {0} is still loading")]
    ImageNotLoaded(String),
    #[error("A save is already in progress")]
    SaveInProgress,
}
