// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! CSS-style hex color strings as used in persisted point colors and the
//! brush palette.

use egui::Color32;

/// Parse `#rgb` or `#rrggbb` (leading `#` optional).
pub fn parse_hex(value: &str) -> Option<Color32> {
    let hex = value.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();

    match hex.len() {
        3 => {
            let r = channel(&hex[0..1])?;
            let g = channel(&hex[1..2])?;
            let b = channel(&hex[2..3])?;
            Some(Color32::from_rgb(r * 17, g * 17, b * 17))
        }
        6 => Some(Color32::from_rgb(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        _ => None,
    }
}

/// Format a color as `#rrggbb`, dropping alpha.
pub fn to_hex(color: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_and_long_forms() {
        assert_eq!(parse_hex("#f00"), Some(Color32::from_rgb(255, 0, 0)));
        assert_eq!(parse_hex("#FF6600"), Some(Color32::from_rgb(255, 102, 0)));
        assert_eq!(parse_hex("00ff00"), Some(Color32::from_rgb(0, 255, 0)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_hex("red"), None);
        assert_eq!(parse_hex("#12345"), None);
        assert_eq!(parse_hex("#zzzzzz"), None);
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(Color32::from_rgb(255, 102, 0)), "#ff6600");
    }
}
