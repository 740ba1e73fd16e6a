//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::board::BlockColor;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Block colours and UI colours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Block colours, indexed by `BlockColor::index`.
    pub blocks: [Color; 5],
    /// Screen background.
    pub bg: Color,
    /// Empty board cells.
    pub board_bg: Color,
    /// Borders.
    pub border: Color,
    /// Text (score, legend).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("unknown theme key: {0}")]
    UnknownKey(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::sanrio_default()
    }
}

impl Theme {
    /// Pastel defaults: one colour per character, pink background.
    pub fn sanrio_default() -> Self {
        Self {
            blocks: [
                Color::Rgb(255, 105, 180), // Hello Kitty bow pink
                Color::Rgb(186, 85, 211),  // My Melody purple
                Color::Rgb(50, 205, 50),   // Keroppi green
                Color::Rgb(173, 216, 230), // Cinnamoroll light blue
                Color::Rgb(255, 215, 0),   // Pompompurin yellow
            ],
            bg: Color::Rgb(255, 182, 193),
            board_bg: Color::Rgb(255, 228, 235),
            border: Color::Rgb(219, 112, 147),
            main_fg: Color::Rgb(90, 40, 60),
            title: Color::Rgb(199, 21, 133),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// No path means the default theme. Keys missing from the file keep their default.
    /// `palette` then overrides block colours for high-contrast or colorblind play.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) => {
                let s = std::fs::read_to_string(p)?;
                Self::from_map(&parse_theme_file(&s))?
            }
            None => Self::default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Override block colours for high-contrast or colorblind.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.blocks = [
                    Color::Rgb(0xFF, 0x00, 0x80), // hot pink
                    Color::Rgb(0x80, 0x00, 0xFF), // violet
                    Color::Rgb(0x00, 0xC0, 0x00), // green
                    Color::Rgb(0x00, 0xC0, 0xFF), // sky
                    Color::Rgb(0xFF, 0xD0, 0x00), // yellow
                ];
                self.board_bg = Color::Rgb(0x20, 0x20, 0x20);
            }
            crate::Palette::Colorblind => {
                // Okabe-Ito: distinguishable without red/green
                self.blocks = [
                    Color::Rgb(0xCC, 0x79, 0xA7), // reddish purple
                    Color::Rgb(0x00, 0x72, 0xB2), // blue
                    Color::Rgb(0x00, 0x9E, 0x73), // bluish green
                    Color::Rgb(0x56, 0xB4, 0xE9), // sky blue
                    Color::Rgb(0xE6, 0x9F, 0x00), // orange
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Result<Self, ThemeError> {
        let mut theme = Self::default();
        for (key, value) in map {
            let color = parse_hex(value)?;
            let slot = match key.as_str() {
                "hello_kitty" => &mut theme.blocks[0],
                "my_melody" => &mut theme.blocks[1],
                "keroppi" => &mut theme.blocks[2],
                "cinnamoroll" => &mut theme.blocks[3],
                "pompompurin" => &mut theme.blocks[4],
                "background" => &mut theme.bg,
                "board_bg" => &mut theme.board_bg,
                "border" => &mut theme.border,
                "text" => &mut theme.main_fg,
                "title" => &mut theme.title,
                _ => return Err(ThemeError::UnknownKey(key.clone())),
            };
            *slot = color;
        }
        Ok(theme)
    }

    #[inline]
    pub fn block_color(&self, color: BlockColor) -> Color {
        self.blocks[color.index()]
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
        if let Some(stripped) = line.strip_prefix("theme[") {
            if let Some(end) = stripped.find(']') {
                let key = stripped[..end].trim();
                let rest = stripped[end + 1..].trim();
                if let Some(eq) = rest.find('=') {
                    let value = rest[eq + 1..]
                        .trim()
                        .trim_matches('"')
                        .trim_matches('\'')
                        .to_string();
                    if !value.is_empty() {
                        map.insert(key.to_string(), value);
                    }
                }
            }
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
    let (r, g, b) = match s.len() {
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?),
        3 => (channel(0..1)? * 17, channel(1..2)? * 17, channel(2..3)? * 17),
        _ => return Err(invalid()),
    };
    Ok(Color::Rgb(r, g, b))
}
