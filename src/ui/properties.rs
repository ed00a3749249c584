// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Node body.
//!
//! Shows the widgets of an annotation node (image selector, persisted
//! fields, buttons) and its inline preview surface.

use super::canvas::{self, TextureCache};
use crate::node::{AnnotationNode, AnnotationSurface};
use crate::models::workflow::{MASK_FIELD, POINTS_FIELD};

/// Inline preview height.
const PREVIEW_HEIGHT: f32 = 320.0;

/// Result of node panel interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAction {
    None,
    SelectImage(Option<String>),
    OpenEditor,
    ClearAll,
}

/// Display the node and route pointer input to its inline surface.
pub fn show(
    ui: &mut egui::Ui,
    node: &mut AnnotationNode,
    images: &[String],
    textures: &mut TextureCache,
) -> NodeAction {
    let mut action = NodeAction::None;

    ui.heading("Point & Mask Annotation");
    ui.separator();

    let current = node.image_reference().map(str::to_string);
    egui::ComboBox::from_label("image")
        .selected_text(current.as_deref().unwrap_or("(none)"))
        .width(240.0)
        .show_ui(ui, |ui| {
            if ui.selectable_label(current.is_none(), "(none)").clicked() {
                action = NodeAction::SelectImage(None);
            }
            for name in images {
                let selected = current.as_deref() == Some(name.as_str());
                if ui.selectable_label(selected, name).clicked() && !selected {
                    action = NodeAction::SelectImage(Some(name.clone()));
                }
            }
        });

    if let Some(status) = node.status() {
        ui.horizontal(|ui| {
            if node.is_loading() {
                ui.spinner();
            }
            ui.label(egui::RichText::new(status).weak());
        });
    }

    ui.add_space(4.0);
    ui.horizontal(|ui| {
        if ui.button("Open Editor").clicked() {
            action = NodeAction::OpenEditor;
        }
        if ui.button("Clear All").clicked() {
            action = NodeAction::ClearAll;
        }
        ui.label(format!("{} points", node.points().len()));
    });

    ui.add_space(4.0);
    let size = egui::vec2(ui.available_width(), PREVIEW_HEIGHT);
    let (input, painter) = canvas::allocate(ui, size);
    for event in &input.events {
        node.handle_pointer_event(event, input.area);
    }

    let commands = node.draw(input.area, input.hover);
    if !commands.is_empty() {
        let ctx = ui.ctx().clone();
        let base = node.display_image().map(|image| textures.base(&ctx, image));
        let mask = node.mask().map(|mask| textures.mask(&ctx, mask));
        canvas::paint(&painter, &commands, base, mask);
    } else if node.image_reference().is_none() {
        painter.text(
            input.area.center(),
            egui::Align2::CENTER_CENTER,
            "Select an image to annotate",
            egui::FontId::proportional(14.0),
            egui::Color32::from_gray(150),
        );
    }

    ui.add_space(4.0);
    egui::CollapsingHeader::new("Persisted fields")
        .default_open(false)
        .show(ui, |ui| {
            let fields = node.fields();
            ui.label(egui::RichText::new(POINTS_FIELD).strong());
            let mut points = fields.points_data.clone();
            ui.add(
                egui::TextEdit::multiline(&mut points)
                    .code_editor()
                    .desired_rows(3)
                    .interactive(false),
            );
            ui.label(egui::RichText::new(MASK_FIELD).strong());
            ui.label(mask_summary(&fields.mask_data));
            if let Some(mask) = node.mask().filter(|m| !m.is_empty()) {
                ui.label(egui::RichText::new(format!("{} px painted", mask.coverage())).weak());
            }
        });

    action
}

fn mask_summary(mask_data: &str) -> String {
    if mask_data.is_empty() {
        "(empty)".to_string()
    } else {
        format!("{} bytes", mask_data.len())
    }
}
