// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! I/O: image sources, persisted encodings, node outputs and the remote
//! save endpoint.

pub mod compose;
pub mod media;
pub mod remote;
pub mod serialization;
