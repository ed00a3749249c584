// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Modal editor toolbar.
//!
//! Tool selection, brush settings, the clear buttons and the session
//! buttons (undo, save, close).

use crate::editor::{ModalEditor, BRUSH_PALETTE, BRUSH_SIZE_RANGE};
use crate::gesture::Tool;
use crate::util::color::to_hex;

/// Session-level requests the host has to carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarAction {
    None,
    Save,
    Close,
}

/// Display the toolbar. Tool and brush changes apply to `editor` directly.
pub fn show(ui: &mut egui::Ui, editor: &mut ModalEditor) -> ToolbarAction {
    let mut action = ToolbarAction::None;
    let saving = editor.is_saving();

    ui.horizontal_wrapped(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;
        ui.add_enabled_ui(!saving, |ui| {
            let current = editor.tool();
            for (tool, label) in [
                (Tool::Point, "⊕ Point"),
                (Tool::Brush, "🖌 Brush"),
                (Tool::Eraser, "⌫ Eraser"),
            ] {
                if ui.selectable_label(current == tool, label).clicked() {
                    editor.set_tool(tool);
                }
            }

            ui.separator();

            let mut size = editor.brush_size();
            ui.label("Size:");
            if ui
                .add(egui::Slider::new(&mut size, BRUSH_SIZE_RANGE).suffix(" px"))
                .changed()
            {
                editor.set_brush_size(size);
            }

            for color in BRUSH_PALETTE {
                let selected = editor.brush_color() == color;
                let (rect, response) =
                    ui.allocate_exact_size(egui::vec2(18.0, 18.0), egui::Sense::click());
                let stroke = if selected {
                    egui::Stroke::new(2.0, ui.visuals().selection.stroke.color)
                } else {
                    egui::Stroke::new(1.0, egui::Color32::GRAY)
                };
                ui.painter().rect(rect, 3.0, color, stroke);
                if response.on_hover_text(to_hex(color)).clicked() {
                    editor.set_brush_color(color);
                }
            }

            ui.separator();

            if ui.button("Clear Mask").clicked() {
                editor.clear_mask();
            }
            if ui.button("Clear Points").clicked() {
                editor.clear_points();
            }
            if ui.button("Clear All").clicked() {
                editor.clear_all();
            }

            ui.separator();

            if ui
                .add_enabled(editor.can_undo(), egui::Button::new("Undo (Ctrl+Z)"))
                .clicked()
            {
                editor.undo();
            }
            if ui.button("💾 Save").clicked() {
                action = ToolbarAction::Save;
            }
        });

        if ui.button("Close").clicked() {
            action = ToolbarAction::Close;
        }
        if saving {
            ui.spinner();
        }
    });

    ui.label(egui::RichText::new(tool_hint(editor.tool())).italics().weak());

    action
}

fn tool_hint(tool: Tool) -> &'static str {
    match tool {
        Tool::Point => "Click to add a point, drag to move it, right-click or click ✖ to delete",
        Tool::Brush => "Drag to paint the mask",
        Tool::Eraser => "Drag to erase the mask",
    }
}
