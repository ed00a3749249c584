// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! The modal editor.
//!
//! A [`ModalEditor`] is created each time the user opens the editor and is
//! dropped when it closes. It works on a deep copy of the node's points and
//! mask at the image's native resolution; the node only changes when the
//! session is saved.

use crate::config::{AppConfig, SurfaceConfig};
use crate::error::AnnotateError;
use crate::gesture::{GestureAction, GestureEngine, HitConfig, PointerEvent, PointerEventKind, Tool};
use crate::io::media::{ImageSource, LoadedImage};
use crate::io::remote::{RemoteSaveJob, RemoteSaveOutcome, SaveEndpoint, SaveRequest};
use crate::io::serialization::{encode_mask, to_pixel_points};
use crate::models::annotation::AnnotationState;
use crate::models::history::History;
use crate::models::mask::MaskLayer;
use crate::node::AnnotationNode;
use crate::render::{compose, CursorPreview, DrawCommand, Scene};
use crate::util::geometry::fit_rect;
use egui::{Color32, Pos2, Rect};
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Brush colors offered by the toolbar.
pub const BRUSH_PALETTE: [Color32; 5] = [
    Color32::BLACK,
    Color32::WHITE,
    Color32::from_rgb(255, 0, 0),
    Color32::from_rgb(0, 255, 0),
    Color32::from_rgb(0, 0, 255),
];

/// Brush diameter bounds, native pixels.
pub const BRUSH_SIZE_RANGE: RangeInclusive<u32> = 1..=100;
pub const DEFAULT_BRUSH_SIZE: u32 = 20;

enum SaveState {
    Idle,
    Saving(RemoteSaveJob),
    Failed(String),
}

/// One editing session.
pub struct ModalEditor {
    surface: SurfaceConfig,
    mask_alpha: f32,
    image: Arc<LoadedImage>,
    state: AnnotationState,
    history: History,
    tool: Tool,
    brush_size: u32,
    brush_color: Color32,
    gestures: GestureEngine,
    save: SaveState,
}

impl ModalEditor {
    /// Start a session on a copy of the node's state. The node needs a
    /// loaded source image.
    pub fn open(node: &AnnotationNode, config: &AppConfig) -> Result<Self, AnnotateError> {
        let name = node.image_reference().ok_or(AnnotateError::NoImage)?;
        let image = node
            .image()
            .cloned()
            .ok_or_else(|| AnnotateError::ImageNotLoaded(name.to_string()))?;

        let mut state = node.state().clone();
        state.ensure_mask(image.width(), image.height());
        state.take_dirty();

        log::info!(
            "Opened editor for {} ({}x{}) with {} points",
            name,
            image.width(),
            image.height(),
            state.points().len()
        );

        Ok(Self {
            surface: config.editor.clone(),
            mask_alpha: config.mask_alpha,
            image,
            state,
            history: History::new(config.history_capacity),
            tool: Tool::Point,
            brush_size: DEFAULT_BRUSH_SIZE,
            brush_color: Color32::WHITE,
            gestures: GestureEngine::new(HitConfig::from(&config.editor)),
            save: SaveState::Idle,
        })
    }

    pub fn image(&self) -> &Arc<LoadedImage> {
        &self.image
    }

    pub fn state(&self) -> &AnnotationState {
        &self.state
    }

    pub fn mask(&self) -> Option<&MaskLayer> {
        self.state.mask()
    }

    pub fn mask_alpha(&self) -> f32 {
        self.mask_alpha
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if tool != self.tool {
            self.gestures.cancel();
            self.tool = tool;
        }
    }

    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush_size = size.clamp(*BRUSH_SIZE_RANGE.start(), *BRUSH_SIZE_RANGE.end());
    }

    pub fn brush_color(&self) -> Color32 {
        self.brush_color
    }

    pub fn set_brush_color(&mut self, color: Color32) {
        self.brush_color = color;
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn is_saving(&self) -> bool {
        matches!(self.save, SaveState::Saving(_))
    }

    pub fn clear_mask(&mut self) {
        self.history.push(&self.state);
        self.state.clear_mask();
    }

    pub fn clear_points(&mut self) {
        self.history.push(&self.state);
        self.state.clear_points();
    }

    pub fn clear_all(&mut self) {
        self.history.push(&self.state);
        self.state.clear_all();
    }

    /// Restore the previous snapshot. Returns false with nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.undo() else {
            return false;
        };
        self.gestures.cancel();
        self.state = previous;
        self.state.mark_dirty();
        log::debug!("Undo, {} snapshots left", self.history.depth());
        true
    }

    /// Feed a pointer event. Returns whether the surface needs a redraw.
    pub fn handle_pointer_event(&mut self, event: &PointerEvent, area: Rect) -> bool {
        if self.is_saving() {
            if event.kind == PointerEventKind::Up {
                self.gestures.cancel();
            }
            return false;
        }
        let rect = fit_rect(area, self.image.width(), self.image.height());
        let actions = self
            .gestures
            .handle(event, rect, self.state.points(), self.tool);
        self.apply(actions)
    }

    /// Advance gesture time.
    pub fn tick(&mut self, now: f64) -> bool {
        let actions = self.gestures.tick(now);
        self.apply(actions)
    }

    pub fn deadline(&self) -> Option<f64> {
        self.gestures.deadline()
    }

    fn apply(&mut self, actions: Vec<GestureAction>) -> bool {
        let (width, height) = (self.image.width() as f64, self.image.height() as f64);
        let size = self.brush_size as f32;

        for action in actions {
            match action {
                GestureAction::AddPoint { x, y } => {
                    self.history.push(&self.state);
                    self.state.add_point(x, y, None);
                }
                GestureAction::RemovePoint(index) => {
                    if index < self.state.points().len() {
                        self.history.push(&self.state);
                        self.state.remove_point(index);
                    }
                }
                GestureAction::BeginDrag(_) => self.history.push(&self.state),
                GestureAction::MovePoint { index, x, y } => {
                    self.state.move_point(index, x, y);
                }
                GestureAction::BeginStroke { at, mode } => {
                    self.history.push(&self.state);
                    let at = (at.0 * width, at.1 * height);
                    self.state.paint_stroke(at, at, size, self.brush_color, mode);
                }
                GestureAction::ExtendStroke { from, to, mode } => {
                    let from = (from.0 * width, from.1 * height);
                    let to = (to.0 * width, to.1 * height);
                    self.state.paint_stroke(from, to, size, self.brush_color, mode);
                }
                GestureAction::EndDrag(_) | GestureAction::EndStroke => {}
            }
        }
        self.state.take_dirty()
    }

    /// Status line text.
    pub fn status(&self) -> String {
        match &self.save {
            SaveState::Saving(_) => "Saving...".to_string(),
            SaveState::Failed(reason) => format!("Save failed: {}", reason),
            SaveState::Idle => {
                let points = self.state.points().len();
                match self.tool {
                    Tool::Point => format!("Point tool, {} points", points),
                    Tool::Brush => format!("Brush {}px", self.brush_size),
                    Tool::Eraser => format!("Eraser {}px", self.brush_size),
                }
            }
        }
    }

    /// Display list for the editor surface laid out in `area`.
    pub fn draw(&self, area: Rect, hover: Option<Pos2>) -> Vec<DrawCommand> {
        let status = self.status();
        let scene = Scene {
            rect: fit_rect(area, self.image.width(), self.image.height()),
            image_size: self.image.dimensions(),
            points: self.state.points(),
            has_mask: self.state.mask().is_some_and(|m| !m.is_empty()),
            mask_alpha: self.mask_alpha,
            surface: &self.surface,
            cursor: hover.map(|pos| CursorPreview {
                pos,
                tool: self.tool,
                brush_size: self.brush_size as f32,
            }),
            status: Some(&status),
        };
        compose(&scene)
    }

    /// Commit the session to the node and end it.
    pub fn save(self, node: &mut AnnotationNode) {
        node.commit(self.state);
    }

    /// End the session without touching the node.
    pub fn close(self) {
        log::info!("Editor closed without saving");
    }

    /// Body for the remote save endpoint.
    pub fn save_request(&self) -> SaveRequest {
        let mask_data = match self.state.mask() {
            Some(mask) => encode_mask(mask).unwrap_or_else(|e| {
                log::error!("Failed to encode mask: {:#}", e);
                String::new()
            }),
            None => String::new(),
        };
        SaveRequest {
            image: self.image.name.clone(),
            points: to_pixel_points(self.state.points(), self.image.width(), self.image.height())
                .into_iter()
                .map(|mut p| {
                    p.color = None;
                    p
                })
                .collect(),
            mask_data,
        }
    }

    /// Start saving through the remote endpoint.
    pub fn begin_remote_save(
        &mut self,
        endpoint: Arc<dyn SaveEndpoint>,
        source: Arc<dyn ImageSource>,
    ) -> Result<(), AnnotateError> {
        if self.is_saving() {
            return Err(AnnotateError::SaveInProgress);
        }
        self.gestures.cancel();
        log::info!("Saving {} remotely", self.image.name);
        self.save = SaveState::Saving(RemoteSaveJob::spawn(endpoint, source, self.save_request()));
        Ok(())
    }

    /// Check on a remote save. Returns true once the session was committed
    /// to the node; the caller then drops the editor. On failure the editor
    /// stays open and the status line shows why.
    pub fn poll_remote_save(&mut self, node: &mut AnnotationNode) -> bool {
        let SaveState::Saving(job) = &self.save else {
            return false;
        };
        let Some(result) = job.poll() else {
            return false;
        };

        match result {
            Ok(RemoteSaveOutcome::Saved { preview }) => {
                self.save = SaveState::Idle;
                node.commit(self.state.clone());
                if let Some(preview) = preview {
                    node.set_display_image(preview);
                }
                true
            }
            Ok(RemoteSaveOutcome::Rejected(reason)) | Err(reason) => {
                log::error!("Remote save failed: {}", reason);
                self.save = SaveState::Failed(reason);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::media::{DirImageSource, LoadResult};
    use crate::io::remote::SaveResponse;
    use crate::models::workflow::PersistedFields;
    use anyhow::Result;
    use egui::PointerButton;
    use image::RgbaImage;
    use std::time::{Duration, Instant};

    fn area() -> Rect {
        Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(400.0, 300.0))
    }

    fn loaded_node(width: u32, height: u32) -> AnnotationNode {
        let mut node = AnnotationNode::new(&AppConfig::default());
        node.set_image_reference(Some("cat.png".to_string()));
        node.apply_load(LoadResult {
            name: "cat.png".to_string(),
            image: Ok(Arc::new(LoadedImage::new("cat.png", RgbaImage::new(width, height)))),
        });
        node
    }

    fn click(editor: &mut ModalEditor, pos: Pos2, button: PointerButton) {
        editor.handle_pointer_event(&PointerEvent::down(pos, button, 0.0), area());
        editor.handle_pointer_event(&PointerEvent::up(pos, 0.1), area());
    }

    struct FixedEndpoint(SaveResponse);

    impl SaveEndpoint for FixedEndpoint {
        fn save(&self, _request: &SaveRequest) -> Result<SaveResponse> {
            Ok(self.0.clone())
        }
    }

    fn wait_for_save(editor: &mut ModalEditor, node: &mut AnnotationNode) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while editor.is_saving() {
            if editor.poll_remote_save(node) {
                return true;
            }
            assert!(Instant::now() < deadline, "remote save never finished");
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_open_requires_loaded_image() {
        let config = AppConfig::default();
        let mut node = AnnotationNode::new(&config);
        assert_eq!(ModalEditor::open(&node, &config).err(), Some(AnnotateError::NoImage));

        node.set_image_reference(Some("cat.png".to_string()));
        assert_eq!(
            ModalEditor::open(&node, &config).err(),
            Some(AnnotateError::ImageNotLoaded("cat.png".to_string()))
        );
    }

    #[test]
    fn test_open_allocates_native_mask() {
        let node = loaded_node(80, 60);
        let editor = ModalEditor::open(&node, &AppConfig::default()).unwrap();
        assert_eq!(editor.mask().map(|m| m.dimensions()), Some((80, 60)));
        assert!(!editor.can_undo());
    }

    #[test]
    fn test_undo_after_three_additions_leaves_two() {
        let node = loaded_node(800, 600);
        let mut editor = ModalEditor::open(&node, &AppConfig::default()).unwrap();

        click(&mut editor, egui::pos2(100.0, 100.0), PointerButton::Primary);
        click(&mut editor, egui::pos2(200.0, 100.0), PointerButton::Primary);
        click(&mut editor, egui::pos2(300.0, 100.0), PointerButton::Primary);
        assert_eq!(editor.state().points().len(), 3);

        assert!(editor.undo());
        assert_eq!(editor.state().points().len(), 2);
        // The node never saw any of it
        assert!(node.points().is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let node = loaded_node(800, 600);
        let config = AppConfig {
            history_capacity: 2,
            ..AppConfig::default()
        };
        let mut editor = ModalEditor::open(&node, &config).unwrap();

        for x in [50.0, 150.0, 250.0] {
            click(&mut editor, egui::pos2(x, 100.0), PointerButton::Primary);
        }

        assert!(editor.undo());
        assert!(editor.undo());
        assert!(!editor.undo());
        assert_eq!(editor.state().points().len(), 1);
    }

    #[test]
    fn test_save_commits_and_close_discards() {
        let mut node = loaded_node(800, 600);
        let config = AppConfig::default();

        let mut editor = ModalEditor::open(&node, &config).unwrap();
        click(&mut editor, egui::pos2(200.0, 150.0), PointerButton::Primary);
        editor.close();
        assert!(node.points().is_empty());
        assert_eq!(node.fields(), &PersistedFields::default());

        let mut editor = ModalEditor::open(&node, &config).unwrap();
        click(&mut editor, egui::pos2(200.0, 150.0), PointerButton::Primary);
        editor.save(&mut node);
        assert_eq!(node.fields().points_data, r#"[{"x":400,"y":300}]"#);
    }

    #[test]
    fn test_secondary_click_deletes() {
        let node = loaded_node(800, 600);
        let mut editor = ModalEditor::open(&node, &AppConfig::default()).unwrap();
        click(&mut editor, egui::pos2(200.0, 150.0), PointerButton::Primary);

        click(&mut editor, egui::pos2(210.0, 160.0), PointerButton::Secondary);

        assert!(editor.state().points().is_empty());
        assert!(editor.undo());
        assert_eq!(editor.state().points().len(), 1);
    }

    #[test]
    fn test_brush_paints_in_native_pixels() {
        let node = loaded_node(80, 60);
        let mut editor = ModalEditor::open(&node, &AppConfig::default()).unwrap();
        editor.set_tool(Tool::Brush);
        editor.set_brush_size(4);
        editor.set_brush_color(BRUSH_PALETTE[2]);

        // 400x300 area shows the 80x60 image at 5x
        let start = egui::pos2(100.0, 150.0);
        let end = egui::pos2(300.0, 150.0);
        editor.handle_pointer_event(&PointerEvent::down(start, PointerButton::Primary, 0.0), area());
        editor.handle_pointer_event(&PointerEvent::moved(end, 0.1), area());
        editor.handle_pointer_event(&PointerEvent::up(end, 0.2), area());

        let mask = editor.mask().unwrap();
        assert_eq!(mask.pixels().get_pixel(40, 30).0, [255, 0, 0, 255]);
        assert_eq!(mask.pixels().get_pixel(40, 5).0[3], 0);

        editor.set_tool(Tool::Eraser);
        editor.handle_pointer_event(&PointerEvent::down(egui::pos2(200.0, 150.0), PointerButton::Primary, 1.0), area());
        editor.handle_pointer_event(&PointerEvent::up(egui::pos2(200.0, 150.0), 1.1), area());
        assert_eq!(editor.mask().unwrap().pixels().get_pixel(40, 30).0[3], 0);

        assert!(editor.undo());
        assert_eq!(editor.mask().unwrap().pixels().get_pixel(40, 30).0[3], 255);
    }

    #[test]
    fn test_clear_all_is_undoable() {
        let node = loaded_node(800, 600);
        let mut editor = ModalEditor::open(&node, &AppConfig::default()).unwrap();
        click(&mut editor, egui::pos2(200.0, 150.0), PointerButton::Primary);

        editor.clear_all();
        assert!(editor.state().points().is_empty());
        assert!(editor.undo());
        assert_eq!(editor.state().points().len(), 1);
    }

    #[test]
    fn test_clear_mask_then_save_empties_mask_data() {
        let mut node = loaded_node(80, 60);
        let config = AppConfig::default();
        let stroke = |editor: &mut ModalEditor| {
            editor.set_tool(Tool::Brush);
            let (start, end) = (egui::pos2(100.0, 150.0), egui::pos2(300.0, 150.0));
            editor.handle_pointer_event(&PointerEvent::down(start, PointerButton::Primary, 0.0), area());
            editor.handle_pointer_event(&PointerEvent::moved(end, 0.1), area());
            editor.handle_pointer_event(&PointerEvent::up(end, 0.2), area());
        };

        let mut editor = ModalEditor::open(&node, &config).unwrap();
        stroke(&mut editor);
        editor.save(&mut node);
        assert!(node.fields().mask_data.starts_with("data:image/png;base64,"));

        let mut editor = ModalEditor::open(&node, &config).unwrap();
        stroke(&mut editor);
        editor.clear_mask();
        assert!(editor.mask().is_some_and(|m| m.is_empty()));
        editor.save(&mut node);

        assert_eq!(node.fields().mask_data, "");
        assert!(node.mask().map_or(true, |m| m.is_empty()));
    }

    #[test]
    fn test_brush_size_is_clamped() {
        let node = loaded_node(80, 60);
        let mut editor = ModalEditor::open(&node, &AppConfig::default()).unwrap();
        editor.set_brush_size(0);
        assert_eq!(editor.brush_size(), 1);
        editor.set_brush_size(500);
        assert_eq!(editor.brush_size(), 100);
    }

    #[test]
    fn test_save_request_uses_pixel_points() {
        let node = loaded_node(800, 600);
        let mut editor = ModalEditor::open(&node, &AppConfig::default()).unwrap();
        click(&mut editor, egui::pos2(100.0, 75.0), PointerButton::Primary);

        let request = editor.save_request();
        assert_eq!(request.image, "cat.png");
        assert_eq!((request.points[0].x, request.points[0].y), (200, 150));
        assert_eq!(request.mask_data, "");
    }

    #[test]
    fn test_remote_save_success_commits_and_shows_preview() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::new(800, 600).save(dir.path().join("preview.png")).unwrap();
        let endpoint = FixedEndpoint(SaveResponse {
            status: "success".to_string(),
            preview_name: Some("preview.png".to_string()),
            message: None,
        });

        let mut node = loaded_node(800, 600);
        let mut editor = ModalEditor::open(&node, &AppConfig::default()).unwrap();
        click(&mut editor, egui::pos2(200.0, 150.0), PointerButton::Primary);

        editor
            .begin_remote_save(Arc::new(endpoint), Arc::new(DirImageSource::new(dir.path())))
            .unwrap();
        assert_eq!(editor.status(), "Saving...");

        assert!(wait_for_save(&mut editor, &mut node));
        assert_eq!(node.points().len(), 1);
        assert_eq!(node.display_image().map(|i| i.name.as_str()), Some("preview.png"));
    }

    #[test]
    fn test_remote_save_failure_keeps_editor_open() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = FixedEndpoint(SaveResponse {
            status: "error".to_string(),
            preview_name: None,
            message: Some("Image not found".to_string()),
        });

        let mut node = loaded_node(800, 600);
        let mut editor = ModalEditor::open(&node, &AppConfig::default()).unwrap();
        click(&mut editor, egui::pos2(200.0, 150.0), PointerButton::Primary);

        editor
            .begin_remote_save(Arc::new(endpoint), Arc::new(DirImageSource::new(dir.path())))
            .unwrap();

        assert!(!wait_for_save(&mut editor, &mut node));
        assert_eq!(editor.status(), "Save failed: Image not found");
        assert!(node.points().is_empty());
        assert_eq!(editor.state().points().len(), 1);
    }
}
