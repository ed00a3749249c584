// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Layered drawing of an annotation surface.
//!
//! [`compose`] turns the state of a surface into a display list. It draws
//! nothing itself; the UI layer paints the commands with an egui painter,
//! which keeps the layering testable without a GPU context.

use crate::config::SurfaceConfig;
use crate::gesture::{delete_anchor, Tool};
use crate::models::annotation::Point;
use crate::util::color::parse_hex;
use crate::util::geometry::{normalized_to_screen, to_pixel};
use egui::{Align2, Color32, Pos2, Rect, Stroke};

/// Raster layers referenced by [`DrawCommand::Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayer {
    Base,
    Mask,
}

/// One primitive of the display list, in screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Image {
        layer: ImageLayer,
        rect: Rect,
        alpha: f32,
    },
    Circle {
        center: Pos2,
        radius: f32,
        fill: Color32,
        stroke: Stroke,
    },
    DashedCircle {
        center: Pos2,
        radius: f32,
        stroke: Stroke,
    },
    Line {
        from: Pos2,
        to: Pos2,
        stroke: Stroke,
    },
    Text {
        pos: Pos2,
        anchor: Align2,
        text: String,
        size: f32,
        color: Color32,
    },
}

/// Pointer feedback to draw on top of everything else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorPreview {
    pub pos: Pos2,
    pub tool: Tool,
    /// Brush diameter in native image pixels.
    pub brush_size: f32,
}

/// Everything [`compose`] needs to know about a surface.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    /// Where the image is drawn.
    pub rect: Rect,
    /// Native image size.
    pub image_size: (u32, u32),
    pub points: &'a [Point],
    pub has_mask: bool,
    pub mask_alpha: f32,
    pub surface: &'a SurfaceConfig,
    pub cursor: Option<CursorPreview>,
    pub status: Option<&'a str>,
}

const DELETE_GLYPH_FILL: Color32 = Color32::from_rgb(40, 40, 40);
const OVERLAY_TEXT: Color32 = Color32::from_gray(230);
const OVERLAY_SIZE: f32 = 12.0;

/// Build the display list for one frame. Layers, bottom to top: base image,
/// mask, markers, cursor, text overlays.
pub fn compose(scene: &Scene) -> Vec<DrawCommand> {
    let (width, height) = scene.image_size;
    if width == 0 || height == 0 || scene.rect.width() <= 0.0 || scene.rect.height() <= 0.0 {
        return Vec::new();
    }

    let mut commands = vec![DrawCommand::Image {
        layer: ImageLayer::Base,
        rect: scene.rect,
        alpha: 1.0,
    }];

    if scene.has_mask {
        commands.push(DrawCommand::Image {
            layer: ImageLayer::Mask,
            rect: scene.rect,
            alpha: scene.mask_alpha,
        });
    }

    let default_color = parse_hex(&scene.surface.marker_color).unwrap_or(Color32::RED);
    for (index, point) in scene.points.iter().enumerate() {
        push_marker(&mut commands, scene, index, point, default_color);
    }

    if let Some(cursor) = scene.cursor {
        if scene.rect.contains(cursor.pos) {
            push_cursor(&mut commands, scene, cursor);
        }
    }

    push_overlays(&mut commands, scene);
    commands
}

fn push_marker(
    commands: &mut Vec<DrawCommand>,
    scene: &Scene,
    index: usize,
    point: &Point,
    default_color: Color32,
) {
    let surface = scene.surface;
    let center = normalized_to_screen(point.x, point.y, scene.rect);
    let fill = point
        .color
        .as_deref()
        .and_then(parse_hex)
        .unwrap_or(default_color);

    commands.push(DrawCommand::Circle {
        center,
        radius: surface.marker_radius,
        fill,
        stroke: Stroke::new(2.0, Color32::WHITE),
    });
    commands.push(DrawCommand::Text {
        pos: center,
        anchor: Align2::CENTER_CENTER,
        text: (index + 1).to_string(),
        size: surface.label_size,
        color: Color32::WHITE,
    });

    let glyph = delete_anchor(point, scene.rect, surface.delete_offset);
    let r = surface.delete_glyph_radius;
    commands.push(DrawCommand::Circle {
        center: glyph,
        radius: r,
        fill: DELETE_GLYPH_FILL,
        stroke: Stroke::new(1.0, Color32::WHITE),
    });
    let arm = r * 0.5;
    let cross = Stroke::new(1.5, Color32::WHITE);
    commands.push(DrawCommand::Line {
        from: glyph + egui::vec2(-arm, -arm),
        to: glyph + egui::vec2(arm, arm),
        stroke: cross,
    });
    commands.push(DrawCommand::Line {
        from: glyph + egui::vec2(arm, -arm),
        to: glyph + egui::vec2(-arm, arm),
        stroke: cross,
    });
}

fn push_cursor(commands: &mut Vec<DrawCommand>, scene: &Scene, cursor: CursorPreview) {
    let stroke = Stroke::new(1.0, Color32::WHITE);
    match cursor.tool {
        Tool::Point => {
            let rect = scene.rect;
            commands.push(DrawCommand::Line {
                from: egui::pos2(rect.left(), cursor.pos.y),
                to: egui::pos2(rect.right(), cursor.pos.y),
                stroke,
            });
            commands.push(DrawCommand::Line {
                from: egui::pos2(cursor.pos.x, rect.top()),
                to: egui::pos2(cursor.pos.x, rect.bottom()),
                stroke,
            });
        }
        Tool::Brush | Tool::Eraser => {
            let scale = scene.rect.width() / scene.image_size.0 as f32;
            let radius = (cursor.brush_size * scale / 2.0).max(1.0);
            commands.push(if cursor.tool == Tool::Brush {
                DrawCommand::Circle {
                    center: cursor.pos,
                    radius,
                    fill: Color32::TRANSPARENT,
                    stroke,
                }
            } else {
                DrawCommand::DashedCircle {
                    center: cursor.pos,
                    radius,
                    stroke,
                }
            });
        }
    }
}

fn push_overlays(commands: &mut Vec<DrawCommand>, scene: &Scene) {
    let (width, height) = scene.image_size;
    let rect = scene.rect;

    commands.push(DrawCommand::Text {
        pos: rect.left_bottom() + egui::vec2(4.0, -4.0),
        anchor: Align2::LEFT_BOTTOM,
        text: format!("{} × {}", width, height),
        size: OVERLAY_SIZE,
        color: OVERLAY_TEXT,
    });

    if scene.surface.show_coordinates {
        for (index, point) in scene.points.iter().enumerate() {
            let (x, y) = to_pixel(point, width, height);
            commands.push(DrawCommand::Text {
                pos: rect.left_top() + egui::vec2(4.0, 4.0 + index as f32 * (OVERLAY_SIZE + 2.0)),
                anchor: Align2::LEFT_TOP,
                text: format!("#{}: ({}, {})", index + 1, x, y),
                size: OVERLAY_SIZE,
                color: OVERLAY_TEXT,
            });
        }
    }

    if let Some(status) = scene.status {
        commands.push(DrawCommand::Text {
            pos: rect.right_bottom() + egui::vec2(-4.0, -4.0),
            anchor: Align2::RIGHT_BOTTOM,
            text: status.to_string(),
            size: OVERLAY_SIZE,
            color: OVERLAY_TEXT,
        });
    }
}
