// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Drawing surface plumbing.
//!
//! Allocates the painter area of an annotation surface, turns raw egui
//! input into [`PointerEvent`]s and paints display lists.

use crate::gesture::PointerEvent;
use crate::io::media::LoadedImage;
use crate::models::mask::MaskLayer;
use crate::render::{DrawCommand, ImageLayer};
use egui::{Color32, FontId, Pos2, Rect, Stroke, TextureHandle, TextureId};

/// GPU textures of one surface. The base image is keyed by name and size,
/// the mask by revision, so unchanged layers are never re-uploaded.
#[derive(Default)]
pub struct TextureCache {
    base: Option<(String, (u32, u32), TextureHandle)>,
    mask: Option<(u64, TextureHandle)>,
}

impl TextureCache {
    pub fn base(&mut self, ctx: &egui::Context, image: &LoadedImage) -> TextureId {
        let size = image.dimensions();
        match &self.base {
            Some((name, cached, texture)) if *name == image.name && *cached == size => texture.id(),
            _ => {
                let texture = ctx.load_texture(
                    format!("base_{}", image.name),
                    color_image(image.pixels.as_raw(), size),
                    egui::TextureOptions::LINEAR,
                );
                let id = texture.id();
                self.base = Some((image.name.clone(), size, texture));
                id
            }
        }
    }

    pub fn mask(&mut self, ctx: &egui::Context, mask: &MaskLayer) -> TextureId {
        match &self.mask {
            Some((revision, texture)) if *revision == mask.revision() => texture.id(),
            _ => {
                let texture = ctx.load_texture(
                    "mask",
                    color_image(mask.pixels().as_raw(), mask.dimensions()),
                    egui::TextureOptions::LINEAR,
                );
                let id = texture.id();
                self.mask = Some((mask.revision(), texture));
                id
            }
        }
    }
}

fn color_image(rgba: &[u8], (width, height): (u32, u32)) -> egui::ColorImage {
    egui::ColorImage::from_rgba_unmultiplied([width as usize, height as usize], rgba)
}

/// Input gathered for a surface in one frame.
pub struct SurfaceInput {
    /// Area the surface occupies.
    pub area: Rect,
    pub hover: Option<Pos2>,
    pub events: Vec<PointerEvent>,
}

/// Allocate a surface of `size` and collect its pointer events. Presses
/// count only over the surface; moves and releases are forwarded wherever
/// they happen so drags and strokes always end.
pub fn allocate(ui: &mut egui::Ui, size: egui::Vec2) -> (SurfaceInput, egui::Painter) {
    let (response, painter) = ui.allocate_painter(size, egui::Sense::click_and_drag());
    painter.rect_filled(response.rect, 0.0, Color32::from_gray(40));

    let hovered = response.hovered();
    let (time, raw) = ui.input(|i| (i.time, i.events.clone()));

    let mut events = Vec::new();
    for event in raw {
        match event {
            egui::Event::PointerButton {
                pos,
                button,
                pressed: true,
                ..
            } if hovered => events.push(PointerEvent::down(pos, button, time)),
            egui::Event::PointerButton { pos, pressed: false, .. } => {
                events.push(PointerEvent::up(pos, time))
            }
            egui::Event::PointerMoved(pos) => events.push(PointerEvent::moved(pos, time)),
            _ => {}
        }
    }

    let input = SurfaceInput {
        area: response.rect,
        hover: response.hover_pos(),
        events,
    };
    (input, painter)
}

/// Paint a display list. Image commands for layers without a texture are
/// skipped.
pub fn paint(
    painter: &egui::Painter,
    commands: &[DrawCommand],
    base: Option<TextureId>,
    mask: Option<TextureId>,
) {
    let uv = Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));

    for command in commands {
        match command {
            DrawCommand::Image { layer, rect, alpha } => {
                let texture = match layer {
                    ImageLayer::Base => base,
                    ImageLayer::Mask => mask,
                };
                if let Some(texture) = texture {
                    painter.image(texture, *rect, uv, Color32::WHITE.gamma_multiply(*alpha));
                }
            }
            DrawCommand::Circle {
                center,
                radius,
                fill,
                stroke,
            } => {
                painter.circle(*center, *radius, *fill, *stroke);
            }
            DrawCommand::DashedCircle {
                center,
                radius,
                stroke,
            } => dashed_circle(painter, *center, *radius, *stroke),
            DrawCommand::Line { from, to, stroke } => {
                painter.line_segment([*from, *to], *stroke);
            }
            DrawCommand::Text {
                pos,
                anchor,
                text,
                size,
                color,
            } => {
                // One-pixel drop shadow
                let font = FontId::proportional(*size);
                painter.text(*pos + egui::vec2(1.0, 1.0), *anchor, text, font.clone(), Color32::BLACK);
                painter.text(*pos, *anchor, text, font, *color);
            }
        }
    }
}

fn dashed_circle(painter: &egui::Painter, center: Pos2, radius: f32, stroke: Stroke) {
    const SEGMENTS: usize = 32;
    let point = |i: usize| {
        let angle = i as f32 / SEGMENTS as f32 * std::f32::consts::TAU;
        center + radius * egui::vec2(angle.cos(), angle.sin())
    };
    for i in (0..SEGMENTS).step_by(2) {
        painter.line_segment([point(i), point(i + 1)], stroke);
    }
}
