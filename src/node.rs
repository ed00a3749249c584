// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! The annotation node.
//!
//! An [`AnnotationNode`] owns the live annotation state of one node
//! instance, its inline drawing surface and the bridge to the host's
//! persisted widget fields. Persisted points are pixel integers, so they
//! can only be turned back into normalized coordinates once the source
//! image has loaded; until then they are kept pending.

use crate::config::{AppConfig, SurfaceConfig};
use crate::gesture::{GestureAction, GestureEngine, HitConfig, PointerEvent, PointerEventKind, Tool};
use crate::io::media::{ImageLoader, LoadResult, LoadedImage};
use crate::io::serialization::{
    decode_mask, decode_points, encode_mask, encode_points, fit_mask, round_pixel_points,
    to_pixel_points,
};
use crate::models::annotation::{AnnotationState, PixelPoint, Point};
use crate::models::mask::MaskLayer;
use crate::models::workflow::PersistedFields;
use crate::render::{compose, CursorPreview, DrawCommand, Scene};
use crate::util::geometry::{classify_encoding, fit_rect, to_normalized, CoordinateEncoding};
use anyhow::Result;
use egui::{Pos2, Rect};
use std::sync::Arc;

/// Notifications for the host.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// The surface needs repainting.
    RedrawRequested,
    /// The persisted fields were rewritten; the host bumps its graph version.
    Changed(PersistedFields),
}

/// A drawing surface the host embeds.
pub trait AnnotationSurface {
    /// Display list for the surface laid out in `area`.
    fn draw(&self, area: Rect, hover: Option<Pos2>) -> Vec<DrawCommand>;

    /// Feed a pointer event. Returns whether anything changed.
    fn handle_pointer_event(&mut self, event: &PointerEvent, area: Rect) -> bool;

    /// Current persisted form of the surface state.
    fn serialize(&mut self) -> PersistedFields;

    /// Restore the surface state from persisted fields.
    fn deserialize(&mut self, fields: &PersistedFields);
}

type Listener = Box<dyn FnMut(&NodeEvent)>;

/// One annotation node instance.
pub struct AnnotationNode {
    surface: SurfaceConfig,
    mask_alpha: f32,
    image_ref: Option<String>,
    /// Source image; gives the native size all conversions use.
    image: Option<Arc<LoadedImage>>,
    /// Preview returned by a remote save, shown instead of the source.
    display: Option<Arc<LoadedImage>>,
    load_error: Option<String>,
    state: AnnotationState,
    /// Pixel-encoded points waiting for the image size.
    pending_points: Option<Vec<Point>>,
    /// Mask URI waiting for the image to load.
    pending_mask: Option<String>,
    /// Last persisted values.
    fields: PersistedFields,
    mask_cache: Option<(u64, String)>,
    gestures: GestureEngine,
    loader: Option<ImageLoader>,
    listeners: Vec<Listener>,
}

impl AnnotationNode {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            surface: config.inline.clone(),
            mask_alpha: config.mask_alpha,
            image_ref: None,
            image: None,
            display: None,
            load_error: None,
            state: AnnotationState::default(),
            pending_points: None,
            pending_mask: None,
            fields: PersistedFields::default(),
            mask_cache: None,
            gestures: GestureEngine::new(HitConfig::from(&config.inline)),
            loader: None,
            listeners: Vec::new(),
        }
    }

    /// Attach the background loader used to resolve image references.
    pub fn with_loader(mut self, loader: ImageLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Register a listener for [`NodeEvent`]s.
    pub fn subscribe(&mut self, listener: impl FnMut(&NodeEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, event: NodeEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    pub fn image_reference(&self) -> Option<&str> {
        self.image_ref.as_deref()
    }

    pub fn image(&self) -> Option<&Arc<LoadedImage>> {
        self.image.as_ref()
    }

    /// The raster to draw as the base layer.
    pub fn display_image(&self) -> Option<&Arc<LoadedImage>> {
        self.display.as_ref().or(self.image.as_ref())
    }

    pub fn state(&self) -> &AnnotationState {
        &self.state
    }

    pub fn points(&self) -> &[Point] {
        self.state.points()
    }

    pub fn mask(&self) -> Option<&MaskLayer> {
        self.state.mask()
    }

    pub fn pending_points(&self) -> Option<&[Point]> {
        self.pending_points.as_deref()
    }

    /// Last persisted field values.
    pub fn fields(&self) -> &PersistedFields {
        &self.fields
    }

    pub fn mask_alpha(&self) -> f32 {
        self.mask_alpha
    }

    pub fn is_loading(&self) -> bool {
        self.image_ref.is_some() && self.image.is_none() && self.load_error.is_none()
    }

    /// Short description of the image state for the node body.
    pub fn status(&self) -> Option<String> {
        let name = self.image_ref.as_deref()?;
        if let Some(error) = &self.load_error {
            Some(format!("Failed to load {}: {}", name, error))
        } else if self.image.is_none() {
            Some(format!("Loading {}...", name))
        } else {
            None
        }
    }

    /// Next long-press deadline, if one is running.
    pub fn deadline(&self) -> Option<f64> {
        self.gestures.deadline()
    }

    /// Screen rectangle of the image inside `area`.
    pub fn image_rect(&self, area: Rect) -> Option<Rect> {
        let image = self.image.as_ref()?;
        Some(fit_rect(area, image.width(), image.height()))
    }

    /// Select a different source image. Everything tied to the old image is
    /// dropped and both persisted fields are reset before the load starts.
    pub fn set_image_reference(&mut self, name: Option<String>) {
        if name == self.image_ref {
            return;
        }
        log::info!("Image reference changed to {:?}", name);

        self.gestures.cancel();
        self.state = AnnotationState::default();
        self.pending_points = None;
        self.pending_mask = None;
        self.fields = PersistedFields::default();
        self.mask_cache = None;
        self.switch_image(name);

        let fields = self.fields.clone();
        self.emit(NodeEvent::Changed(fields));
        self.emit(NodeEvent::RedrawRequested);
    }

    /// Restore the node from host storage.
    pub fn configure(&mut self, fields: &PersistedFields, image: Option<String>) {
        if image != self.image_ref {
            self.gestures.cancel();
            self.switch_image(image);
        }
        self.deserialize_fields(fields);
    }

    fn switch_image(&mut self, name: Option<String>) {
        self.image_ref = name;
        self.image = None;
        self.display = None;
        self.load_error = None;

        if let (Some(name), Some(loader)) = (self.image_ref.as_deref(), self.loader.as_ref()) {
            loader.request(name);
        }
    }

    /// Apply every background load that finished.
    pub fn poll(&mut self) {
        let results = match self.loader.as_ref() {
            Some(loader) => loader.drain(),
            None => return,
        };
        for result in results {
            self.apply_load(result);
        }
    }

    /// Apply one finished load. Results for a superseded reference are
    /// dropped.
    pub fn apply_load(&mut self, result: LoadResult) {
        if self.image_ref.as_deref() != Some(result.name.as_str()) {
            log::debug!("Ignoring stale load of {}", result.name);
            return;
        }
        match result.image {
            Ok(image) => self.on_image_loaded(image),
            Err(error) => {
                log::error!("Failed to load image {}: {}", result.name, error);
                self.image = None;
                self.load_error = Some(error);
                self.emit(NodeEvent::RedrawRequested);
            }
        }
    }

    fn on_image_loaded(&mut self, image: Arc<LoadedImage>) {
        let (width, height) = image.dimensions();
        self.image = Some(image);
        self.load_error = None;

        if let Some(pending) = self.pending_points.take() {
            let points = pending
                .iter()
                .map(|p| to_normalized(p.x, p.y, width, height).with_color(p.color.clone()))
                .collect();
            self.state.set_points(points);
        }

        if let Some(data) = self.pending_mask.take() {
            self.state.set_mask(load_mask(&data, width, height));
        } else if self.state.mask().is_some_and(|m| m.dimensions() != (width, height)) {
            self.state.set_mask(None);
        }

        self.state.take_dirty();
        self.persist_pixel_points();
        self.emit(NodeEvent::RedrawRequested);
    }

    /// Rewrite `points_data` in integer pixel form once the image size is
    /// known. Normalized input is only ever accepted, never persisted.
    fn persist_pixel_points(&mut self) {
        let Some(image) = self.image.as_ref() else {
            return;
        };
        let (width, height) = image.dimensions();
        let points_data = encode_or(
            &to_pixel_points(self.state.points(), width, height),
            &self.fields.points_data,
        );
        if points_data != self.fields.points_data {
            log::debug!("Rewriting points_data in pixel space");
            self.fields.points_data = points_data;
            let fields = self.fields.clone();
            self.emit(NodeEvent::Changed(fields));
        }
    }

    fn deserialize_fields(&mut self, fields: &PersistedFields) {
        self.fields = fields.clone();

        let points = match decode_points(&fields.points_data) {
            Ok(points) => points,
            Err(e) => {
                log::warn!("Discarding malformed points_data: {:#}", e);
                self.fields.points_data = PersistedFields::default().points_data;
                Vec::new()
            }
        };

        let size = self.image.as_ref().map(|image| image.dimensions());
        self.pending_points = None;
        match (classify_encoding(&points), size) {
            (CoordinateEncoding::Normalized, _) => self.state.set_points(points),
            (CoordinateEncoding::Pixel, Some((width, height))) => {
                let points = points
                    .into_iter()
                    .map(|p| to_normalized(p.x, p.y, width, height).with_color(p.color))
                    .collect();
                self.state.set_points(points);
            }
            (CoordinateEncoding::Pixel, None) => {
                self.state.clear_points();
                self.pending_points = Some(points);
            }
        }

        self.pending_mask = None;
        match size {
            Some((width, height)) => {
                let mask = load_mask(&fields.mask_data, width, height);
                if mask.is_none() && !fields.mask_data.trim().is_empty() {
                    self.fields.mask_data = String::new();
                }
                self.state.set_mask(mask);
            }
            None => {
                self.state.set_mask(None);
                if !fields.mask_data.trim().is_empty() {
                    self.pending_mask = Some(fields.mask_data.clone());
                }
            }
        }

        self.state.take_dirty();
        self.persist_pixel_points();
        self.emit(NodeEvent::RedrawRequested);
    }

    fn serialize_fields(&mut self) -> PersistedFields {
        let Some(image) = self.image.as_ref() else {
            // Without the image size nothing can be converted; keep what is
            // known instead of overwriting it.
            let points_data = match self.pending_points.as_deref() {
                Some(pending) => encode_or(&round_pixel_points(pending), &self.fields.points_data),
                None => self.fields.points_data.clone(),
            };
            let mask_data = self
                .pending_mask
                .clone()
                .unwrap_or_else(|| self.fields.mask_data.clone());
            return PersistedFields {
                points_data,
                mask_data,
            };
        };

        let (width, height) = image.dimensions();
        let points_data = encode_or(
            &to_pixel_points(self.state.points(), width, height),
            &self.fields.points_data,
        );
        let mask_data = match self.state.mask() {
            Some(mask) => match encode_mask_cached(&mut self.mask_cache, mask) {
                Ok(data) => data,
                Err(e) => {
                    log::error!("Failed to encode mask: {:#}", e);
                    self.fields.mask_data.clone()
                }
            },
            None => String::new(),
        };
        PersistedFields {
            points_data,
            mask_data,
        }
    }

    /// Write the current state to the persisted fields and notify the host.
    pub fn sync(&mut self) {
        self.fields = self.serialize_fields();
        self.state.take_dirty();
        let fields = self.fields.clone();
        self.emit(NodeEvent::Changed(fields));
        self.emit(NodeEvent::RedrawRequested);
    }

    /// Remove every point and clear the mask.
    pub fn clear_all(&mut self) {
        log::info!("Clearing all annotations");
        self.gestures.cancel();
        self.pending_points = None;
        self.pending_mask = None;
        self.state.clear_points();
        self.state.clear_mask();
        self.fields = PersistedFields::default();
        self.sync();
    }

    /// Replace the live state with an edited copy and sync it.
    pub fn commit(&mut self, state: AnnotationState) {
        log::info!("Committing {} points", state.points().len());
        self.gestures.cancel();
        self.state = state;
        if let Some(image) = self.image.as_ref() {
            let size = image.dimensions();
            if self.state.mask().is_some_and(|m| m.dimensions() != size) {
                self.state.set_mask(None);
            }
        }
        self.pending_points = None;
        self.pending_mask = None;
        self.sync();
    }

    /// Show `preview` in place of the source image. Points and mask stay.
    pub fn set_display_image(&mut self, preview: Arc<LoadedImage>) {
        log::info!("Showing preview {}", preview.name);
        self.display = Some(preview);
        self.emit(NodeEvent::RedrawRequested);
    }

    /// Advance gesture time; fires a due long-press deletion.
    pub fn tick(&mut self, now: f64) -> bool {
        let actions = self.gestures.tick(now);
        self.apply(actions)
    }

    fn apply(&mut self, actions: Vec<GestureAction>) -> bool {
        let mut changed = false;
        for action in actions {
            match action {
                GestureAction::AddPoint { x, y } => {
                    if self.state.add_point(x, y, None) {
                        log::info!("Added point {} at ({:.3}, {:.3})", self.state.points().len(), x, y);
                        self.sync();
                        changed = true;
                    }
                }
                GestureAction::RemovePoint(index) => {
                    if self.state.remove_point(index).is_some() {
                        log::info!("Removed point {}", index + 1);
                        self.sync();
                        changed = true;
                    }
                }
                GestureAction::MovePoint { index, x, y } => {
                    if self.state.move_point(index, x, y) {
                        self.emit(NodeEvent::RedrawRequested);
                        changed = true;
                    }
                }
                GestureAction::EndDrag(_) => {
                    if self.state.is_dirty() {
                        self.sync();
                    }
                }
                // The inline surface only has the point tool
                GestureAction::BeginDrag(_)
                | GestureAction::BeginStroke { .. }
                | GestureAction::ExtendStroke { .. }
                | GestureAction::EndStroke => {}
            }
        }
        changed
    }
}

impl AnnotationSurface for AnnotationNode {
    fn draw(&self, area: Rect, hover: Option<Pos2>) -> Vec<DrawCommand> {
        let Some(image) = self.image.as_ref() else {
            return Vec::new();
        };
        let scene = Scene {
            rect: fit_rect(area, image.width(), image.height()),
            image_size: image.dimensions(),
            points: self.state.points(),
            has_mask: self.state.mask().is_some_and(|m| !m.is_empty()),
            mask_alpha: self.mask_alpha,
            surface: &self.surface,
            cursor: hover.map(|pos| CursorPreview {
                pos,
                tool: Tool::Point,
                brush_size: 0.0,
            }),
            status: None,
        };
        compose(&scene)
    }

    fn handle_pointer_event(&mut self, event: &PointerEvent, area: Rect) -> bool {
        let Some(rect) = self.image_rect(area) else {
            if event.kind == PointerEventKind::Up {
                self.gestures.cancel();
            }
            return false;
        };
        let actions = self.gestures.handle(event, rect, self.state.points(), Tool::Point);
        self.apply(actions)
    }

    fn serialize(&mut self) -> PersistedFields {
        self.serialize_fields()
    }

    fn deserialize(&mut self, fields: &PersistedFields) {
        self.deserialize_fields(fields);
    }
}

fn encode_or(points: &[PixelPoint], previous: &str) -> String {
    match encode_points(points) {
        Ok(data) => data,
        Err(e) => {
            log::error!("Failed to encode points: {:#}", e);
            previous.to_string()
        }
    }
}

fn encode_mask_cached(cache: &mut Option<(u64, String)>, mask: &MaskLayer) -> Result<String> {
    if let Some((revision, data)) = cache.as_ref() {
        if *revision == mask.revision() {
            return Ok(data.clone());
        }
    }
    let data = encode_mask(mask)?;
    *cache = Some((mask.revision(), data.clone()));
    Ok(data)
}

/// Decode a persisted mask for an image of the given size.
fn load_mask(data: &str, width: u32, height: u32) -> Option<MaskLayer> {
    match decode_mask(data) {
        Ok(Some(pixels)) => Some(MaskLayer::from_image(fit_mask(pixels, width, height))),
        Ok(None) => None,
        Err(e) => {
            log::warn!("Discarding malformed mask_data: {:#}", e);
            None
        }
    }
}
