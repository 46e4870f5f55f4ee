//! Theme loading: btop-style `theme[key]="value"` files, block tints and colour blending.

use crate::Palette;
use crate::block::Tint;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Block colours plus UI colours, One Dark by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub addition: Color,
    pub subtraction: Color,
    pub multiplication: Color,
    pub division: Color,
    pub penalty: Color,
    /// Hint overlay.
    pub hint: Color,
    /// Marker on special and time-stop blocks.
    pub accent: Color,
    /// Board background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, level).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    pub inactive_fg: Color,
    /// Wrong answers and game over.
    pub alert: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    /// One Dark hex values from onedark.theme.
    pub const fn onedark_default() -> Self {
        Self {
            addition: rgb(0x98C379),
            subtraction: rgb(0x61AFEF),
            multiplication: rgb(0xC678DD),
            division: rgb(0xE5C07B),
            penalty: rgb(0x5C6370),
            hint: rgb(0x56B6C2),
            accent: rgb(0xD19A66),
            bg: rgb(0x31353F),
            div_line: rgb(0x3F444F),
            main_fg: rgb(0xABB2BF),
            title: rgb(0xE5C07B),
            inactive_fg: rgb(0x5C6370),
            alert: rgb(0xE06C75),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark if path is None or the file is missing.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => {
                let s = std::fs::read_to_string(p)?;
                Self::from_map(&parse_theme_file(&s))
            }
            _ => Self::onedark_default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Override the operator colours for high-contrast or colorblind play.
    pub fn apply_palette(&mut self, palette: Palette) {
        let [addition, subtraction, multiplication, division, hint] = match palette {
            Palette::Normal => return,
            Palette::HighContrast => [0x00FF00, 0x0088FF, 0xFF00FF, 0xFFFF00, 0x00FFFF],
            // Paul Tol's vibrant scheme; no red/green pair.
            Palette::Colorblind => [0x0077BB, 0xEE7733, 0x009988, 0xBBBB00, 0xEE3377],
        };
        self.addition = rgb(addition);
        self.subtraction = rgb(subtraction);
        self.multiplication = rgb(multiplication);
        self.division = rgb(division);
        self.hint = rgb(hint);
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |keys: &[&str], fallback: Color| {
            keys.iter()
                .find_map(|k| map.get(*k).and_then(|v| parse_hex(v).ok()))
                .unwrap_or(fallback)
        };
        let d = Self::onedark_default();
        Self {
            addition: get(&["mem_box", "cpu_start"], d.addition),
            subtraction: get(&["cpu_box"], d.subtraction),
            multiplication: get(&["net_box"], d.multiplication),
            division: get(&["title", "cpu_mid"], d.division),
            penalty: get(&["inactive_fg"], d.penalty),
            hint: get(&["hi_fg", "proc_misc"], d.hint),
            accent: get(&["selected_bg", "temp_mid"], d.accent),
            bg: get(&["meter_bg"], d.bg),
            div_line: get(&["div_line"], d.div_line),
            main_fg: get(&["main_fg"], d.main_fg),
            title: get(&["title"], d.title),
            inactive_fg: get(&["inactive_fg"], d.inactive_fg),
            alert: get(&["cpu_end", "temp_end"], d.alert),
        }
    }

    pub fn tint_color(&self, tint: Tint) -> Color {
        match tint {
            Tint::Addition => self.addition,
            Tint::Subtraction => self.subtraction,
            Tint::Multiplication => self.multiplication,
            Tint::Division => self.division,
            Tint::Penalty => self.penalty,
            Tint::Hint => self.hint,
        }
    }
}

/// Linear mix of two RGB colours; `t = 0` is `from`, `t = 1` is `to`.
/// Non-RGB colours snap at the halfway point.
pub fn blend(from: Color, to: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    match (from, to) {
        (Color::Rgb(r1, g1, b1), Color::Rgb(r2, g2, b2)) => {
            let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
            Color::Rgb(mix(r1, r2), mix(g1, g2), mix(b1, b2))
        }
        _ if t < 0.5 => from,
        _ => to,
    }
}

/// Scale an RGB colour's brightness.
pub fn shade(color: Color, factor: f32) -> Color {
    match color {
        Color::Rgb(r, g, b) => {
            let scale = |c: u8| (f32::from(c) * factor).clamp(0.0, 255.0) as u8;
            Color::Rgb(scale(r), scale(g), scale(b))
        }
        other => other,
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some((key, rest)) = stripped.split_once(']') else {
            continue;
        };
        let Some((_, value)) = rest.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        if !value.is_empty() {
            map.insert(key.trim().to_string(), value.to_string());
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(invalid)
    };
    match s.len() {
        6 => Ok(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        3 => Ok(Color::Rgb(
            channel(0..1)? * 17,
            channel(1..2)? * 17,
            channel(2..3)? * 17,
        )),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#98C379").unwrap();
        assert!(matches!(c, Color::Rgb(0x98, 0xC3, 0x79)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
    }

    #[test]
    fn test_parse_hex_invalid() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#GGGGGG").is_err());
        assert!(parse_hex("#ÿÿÿ").is_err());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[meter_bg]="#31353F""##);
        assert_eq!(map.get("meter_bg"), Some(&"#31353F".to_string()));
    }

    #[test]
    fn test_theme_from_file_contents() {
        let map = parse_theme_file(
            "# comment\ntheme[mem_box]='#112233'\ntheme[cpu_end]=\"#ABC\"\ntheme[main_fg]=\"\"\n",
        );
        let theme = Theme::from_map(&map);
        assert_eq!(theme.addition, Color::Rgb(0x11, 0x22, 0x33));
        assert_eq!(theme.alert, Color::Rgb(0xAA, 0xBB, 0xCC));
        assert_eq!(theme.main_fg, Theme::onedark_default().main_fg);
    }

    #[test]
    fn test_palette_changes_operator_colours() {
        let mut theme = Theme::default();
        theme.apply_palette(Palette::Colorblind);
        assert_eq!(theme.addition, Color::Rgb(0x00, 0x77, 0xBB));
        assert_eq!(theme.bg, Theme::onedark_default().bg);
        assert_eq!(theme.tint_color(Tint::Hint), theme.hint);
    }

    #[test]
    fn test_blend_and_shade() {
        let black = Color::Rgb(0, 0, 0);
        let white = Color::Rgb(255, 255, 255);
        assert_eq!(blend(black, white, 0.0), black);
        assert_eq!(blend(black, white, 1.0), white);
        assert_eq!(blend(black, white, 0.5), Color::Rgb(128, 128, 128));
        assert_eq!(shade(white, 0.5), Color::Rgb(127, 127, 127));
        assert_eq!(shade(Color::Red, 0.5), Color::Red);
    }
}
