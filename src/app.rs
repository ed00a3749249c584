// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Host application and egui App implementation.
//!
//! The host owns one annotation node, shows its body, opens the modal
//! editor in a window and keeps the graph version counter the node's change
//! events bump. Workflow files carry the node's persisted fields.

use annotate_node::config::AppConfig;
use annotate_node::editor::ModalEditor;
use annotate_node::io::compose::process;
use annotate_node::io::media::{DirImageSource, HttpImageSource, ImageLoader, ImageSource};
use annotate_node::io::remote::{HttpSaveEndpoint, SaveEndpoint};
use annotate_node::io::serialization::{export_json, export_yaml, import_json, import_yaml};
use annotate_node::models::workflow::WorkflowData;
use annotate_node::node::{AnnotationNode, NodeEvent};
use annotate_node::ui::canvas::{self, TextureCache};
use annotate_node::ui::{properties, toolbar};
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::time::Duration;

/// How often background work is polled while something is in flight.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Main application state.
pub struct AnnotateApp {
    config: AppConfig,
    node: AnnotationNode,
    /// Events the node emitted since the last frame
    events: Receiver<NodeEvent>,
    /// Bumped on every persisted change, like a graph serialization version
    graph_version: u64,
    source: Arc<dyn ImageSource>,
    save_endpoint: Option<Arc<dyn SaveEndpoint>>,
    /// Selectable image references
    images: Vec<String>,
    editor: Option<ModalEditor>,
    /// Message shown in a small modal window
    notice: Option<String>,
    node_textures: TextureCache,
    editor_textures: TextureCache,
}

impl AnnotateApp {
    pub fn new(config: AppConfig, initial_image: Option<String>) -> Self {
        let source: Arc<dyn ImageSource> = match &config.server.base_url {
            Some(url) => Arc::new(HttpImageSource::new(url.as_str())),
            None => Arc::new(DirImageSource::new(config.server.input_dir.clone())),
        };
        let save_endpoint = config
            .server
            .save_endpoint
            .as_ref()
            .map(|url| Arc::new(HttpSaveEndpoint::new(url.as_str())) as Arc<dyn SaveEndpoint>);

        let (sender, events) = channel();
        let mut node = AnnotationNode::new(&config).with_loader(ImageLoader::new(Arc::clone(&source)));
        node.subscribe(move |event| {
            let _ = sender.send(event.clone());
        });
        if initial_image.is_some() {
            node.set_image_reference(initial_image);
        }

        let mut app = Self {
            config,
            node,
            events,
            graph_version: 0,
            source,
            save_endpoint,
            images: Vec::new(),
            editor: None,
            notice: None,
            node_textures: TextureCache::default(),
            editor_textures: TextureCache::default(),
        };
        app.refresh_images();
        app
    }

    fn refresh_images(&mut self) {
        match self.source.list() {
            Ok(images) => {
                log::info!("Found {} images", images.len());
                self.images = images;
            }
            Err(e) => log::error!("Failed to list images: {:#}", e),
        }
    }

    fn open_editor(&mut self) {
        match ModalEditor::open(&self.node, &self.config) {
            Ok(editor) => self.editor = Some(editor),
            Err(e) => {
                log::warn!("Cannot open editor: {}", e);
                self.notice = Some(e.to_string());
            }
        }
    }

    fn save_editor(&mut self) {
        let Some(mut editor) = self.editor.take() else {
            return;
        };
        match &self.save_endpoint {
            Some(endpoint) => {
                if let Err(e) = editor.begin_remote_save(Arc::clone(endpoint), Arc::clone(&self.source)) {
                    self.notice = Some(e.to_string());
                }
                self.editor = Some(editor);
            }
            None => editor.save(&mut self.node),
        }
    }

    fn close_editor(&mut self) {
        if let Some(editor) = self.editor.take() {
            editor.close();
        }
    }

    /// Export the node's image reference and persisted fields.
    fn export_workflow(&self, path: &Path) {
        let data = WorkflowData::new(
            self.node.image_reference().map(str::to_string),
            self.node.fields().clone(),
        );
        let extension = path.extension().and_then(|s| s.to_str());
        let result = match extension {
            Some("yaml") | Some("yml") => export_yaml(&data, path),
            Some("json") => export_json(&data, path),
            _ => {
                log::error!("Unsupported file extension: {:?}", extension);
                return;
            }
        };

        match result {
            Ok(_) => log::info!("Exported workflow to {}", path.display()),
            Err(e) => log::error!("Failed to export workflow: {:#}", e),
        }
    }

    /// Evaluate the node on its persisted fields and write the outputs.
    fn export_outputs(&mut self, dir: &Path) {
        let base = self.node.image().map(|image| &image.pixels);
        match process(base, self.node.fields()).write_to(dir) {
            Ok(()) => self.notice = Some(format!("Outputs written to {}", dir.display())),
            Err(e) => {
                log::error!("Failed to write outputs: {:#}", e);
                self.notice = Some(format!("Failed to write outputs: {:#}", e));
            }
        }
    }

    /// Restore the node from a workflow file, the same way a host reload
    /// would.
    fn import_workflow(&mut self, path: &Path) {
        match read_workflow(path) {
            Ok(data) => {
                log::info!("Imported workflow from {}", path.display());
                self.close_editor();
                self.node.configure(&data.fields, data.image);
            }
            Err(e) => {
                log::error!("Failed to import workflow: {:#}", e);
                self.notice = Some(format!("Failed to import workflow: {:#}", e));
            }
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        for event in self.events.try_iter() {
            match event {
                NodeEvent::Changed(_) => {
                    self.graph_version += 1;
                    log::debug!("Graph version {}", self.graph_version);
                }
                NodeEvent::RedrawRequested => ctx.request_repaint(),
            }
        }
    }

    /// Advance gesture timers and schedule the next frame for pending
    /// deadlines and background work.
    fn schedule(&mut self, ctx: &egui::Context) {
        let now = ctx.input(|i| i.time);
        self.node.tick(now);
        if let Some(editor) = self.editor.as_mut() {
            editor.tick(now);
        }

        let deadline = [
            self.node.deadline(),
            self.editor.as_ref().and_then(|e| e.deadline()),
        ]
        .into_iter()
        .flatten()
        .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.min(d))));
        if let Some(deadline) = deadline {
            ctx.request_repaint_after(Duration::from_secs_f64((deadline - now).max(0.0)));
        }

        let saving = self.editor.as_ref().is_some_and(|e| e.is_saving());
        if self.node.is_loading() || saving {
            ctx.request_repaint_after(POLL_INTERVAL);
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Load Workflow...").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Workflow", &["yaml", "yml", "json"])
                            .pick_file()
                        {
                            self.import_workflow(&path);
                        }
                        ui.close_menu();
                    }
                    ui.menu_button("Save Workflow", |ui| {
                        if ui.button("Save as YAML...").clicked() {
                            if let Some(path) = save_dialog("YAML", &["yaml", "yml"], "workflow.yaml") {
                                self.export_workflow(&path);
                            }
                            ui.close_menu();
                        }
                        if ui.button("Save as JSON...").clicked() {
                            if let Some(path) = save_dialog("JSON", &["json"], "workflow.json") {
                                self.export_workflow(&path);
                            }
                            ui.close_menu();
                        }
                    });
                    if ui.button("Export Outputs...").clicked() {
                        if let Some(dir) = rfd::FileDialog::new().pick_folder() {
                            self.export_outputs(&dir);
                        }
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Refresh Images").clicked() {
                        self.refresh_images();
                        ui.close_menu();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.menu_button("Edit", |ui| {
                    let can_undo = self.editor.as_ref().is_some_and(|e| e.can_undo());
                    if ui.add_enabled(can_undo, egui::Button::new("Undo (Ctrl+Z)")).clicked() {
                        if let Some(editor) = self.editor.as_mut() {
                            editor.undo();
                        }
                        ui.close_menu();
                    }
                    if ui.button("Open Editor").clicked() {
                        self.open_editor();
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn editor_window(&mut self, ctx: &egui::Context) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };

        let mut open = true;
        let mut action = toolbar::ToolbarAction::None;
        egui::Window::new("Annotation Editor")
            .open(&mut open)
            .collapsible(false)
            .resizable(true)
            .default_size([960.0, 720.0])
            .show(ctx, |ui| {
                action = toolbar::show(ui, editor);
                ui.separator();

                let size = egui::vec2(ui.available_width().max(480.0), ui.available_height().max(360.0));
                let (input, painter) = canvas::allocate(ui, size);
                for event in &input.events {
                    editor.handle_pointer_event(event, input.area);
                }

                let commands = editor.draw(input.area, input.hover);
                let base = Some(self.editor_textures.base(ctx, editor.image()));
                let mask = editor.mask().map(|mask| self.editor_textures.mask(ctx, mask));
                canvas::paint(&painter, &commands, base, mask);
            });

        if !open {
            action = toolbar::ToolbarAction::Close;
        }
        match action {
            toolbar::ToolbarAction::Save => self.save_editor(),
            toolbar::ToolbarAction::Close => self.close_editor(),
            toolbar::ToolbarAction::None => {}
        }
    }

    fn editor_keys(&mut self, ctx: &egui::Context) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        if ctx.input(|i| i.modifiers.command && i.key_pressed(egui::Key::Z) && !i.modifiers.shift) {
            editor.undo();
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.close_editor();
        }
    }

    fn notice_window(&mut self, ctx: &egui::Context) {
        let Some(message) = self.notice.clone() else {
            return;
        };
        egui::Window::new("Notice")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("OK").clicked() {
                    self.notice = None;
                }
            });
    }
}

impl eframe::App for AnnotateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.node.poll();
        if let Some(editor) = self.editor.as_mut() {
            if editor.poll_remote_save(&mut self.node) {
                self.editor = None;
            }
        }
        self.schedule(ctx);

        self.menu_bar(ctx);

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("Graph version: {}", self.graph_version));
                ui.separator();
                ui.label(format!("Images: {}", self.images.len()));
            });
        });

        let action = egui::CentralPanel::default()
            .show(ctx, |ui| {
                egui::Frame::group(ui.style())
                    .show(ui, |ui| {
                        ui.set_max_width(560.0);
                        properties::show(ui, &mut self.node, &self.images, &mut self.node_textures)
                    })
                    .inner
            })
            .inner;

        match action {
            properties::NodeAction::SelectImage(name) => {
                self.close_editor();
                self.node.set_image_reference(name);
            }
            properties::NodeAction::OpenEditor => self.open_editor(),
            properties::NodeAction::ClearAll => self.node.clear_all(),
            properties::NodeAction::None => {}
        }

        self.editor_window(ctx);
        self.editor_keys(ctx);
        self.notice_window(ctx);
        self.drain_events(ctx);
    }
}

fn read_workflow(path: &Path) -> Result<WorkflowData> {
    let extension = path.extension().and_then(|s| s.to_str());
    match extension {
        Some("yaml") | Some("yml") => import_yaml(path),
        Some("json") => import_json(path),
        _ => bail!("Unsupported file extension: {:?}", extension),
    }
}

fn save_dialog(name: &str, extensions: &[&str], file_name: &str) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .add_filter(name, extensions)
        .set_file_name(file_name)
        .save_file()
}

