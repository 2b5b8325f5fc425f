//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Block colours and UI colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Unit colours by colour id (0..=5): green, yellow, red, blue, magenta, cyan.
    pub blocks: [Color; 6],
    /// Board background.
    pub bg: Color,
    /// Alternate cell shade and borders.
    pub grid: Color,
    pub main_fg: Color,
    /// Titles and labels.
    pub title: Color,
    /// Cursor outline and blocked-placement marks.
    pub cursor: Color,
    /// Empty slots of occupied cells, secondary text.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const ONEDARK_BLOCKS: [Color; 6] = [
    Color::from_u32(0x0098_C379), // green
    Color::from_u32(0x00E5_C07B), // yellow
    Color::from_u32(0x00E0_6C75), // red
    Color::from_u32(0x0061_AFEF), // blue
    Color::from_u32(0x00C6_78DD), // magenta
    Color::from_u32(0x0056_B6C2), // cyan
];

const HIGH_CONTRAST_BLOCKS: [Color; 6] = [
    Color::from_u32(0x0000_FF00),
    Color::from_u32(0x00FF_FF00),
    Color::from_u32(0x00FF_0000),
    Color::from_u32(0x0000_88FF),
    Color::from_u32(0x00FF_00FF),
    Color::from_u32(0x0000_FFFF),
];

/// Paul Tol's bright scheme, ordered so neighbours in the palette stay distinct.
const COLORBLIND_BLOCKS: [Color; 6] = [
    Color::from_u32(0x0000_77BB),
    Color::from_u32(0x00EE_7733),
    Color::from_u32(0x0000_9988),
    Color::from_u32(0x00CC_3311),
    Color::from_u32(0x00EE_3377),
    Color::from_u32(0x00BB_BB00),
];

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    /// One Dark values from onedark.theme.
    pub fn onedark_default() -> Self {
        Self {
            blocks: ONEDARK_BLOCKS,
            bg: Color::from_u32(0x0028_2C34),
            grid: Color::from_u32(0x0031_353F),
            main_fg: Color::from_u32(0x00AB_B2BF),
            title: Color::from_u32(0x00E5_C07B),
            cursor: Color::from_u32(0x00DC_DFE4),
            inactive_fg: Color::from_u32(0x005C_6370),
        }
    }

    /// Load a btop-style file. A missing path falls back to One Dark.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
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

    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => self.blocks = HIGH_CONTRAST_BLOCKS,
            crate::Palette::Colorblind => self.blocks = COLORBLIND_BLOCKS,
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |keys: &[&str]| keys.iter().find_map(|k| map.get(*k).and_then(|v| parse_hex(v).ok()));
        let base = Self::onedark_default();
        Self {
            blocks: [
                get(&["mem_box", "cpu_start"]).unwrap_or(base.blocks[0]),
                get(&["title", "cpu_mid"]).unwrap_or(base.blocks[1]),
                get(&["cpu_end", "temp_end"]).unwrap_or(base.blocks[2]),
                get(&["cpu_box"]).unwrap_or(base.blocks[3]),
                get(&["net_box"]).unwrap_or(base.blocks[4]),
                get(&["hi_fg", "proc_misc"]).unwrap_or(base.blocks[5]),
            ],
            bg: get(&["main_bg"]).unwrap_or(base.bg),
            grid: get(&["meter_bg", "div_line"]).unwrap_or(base.grid),
            main_fg: get(&["main_fg"]).unwrap_or(base.main_fg),
            title: get(&["title"]).unwrap_or(base.title),
            cursor: get(&["selected_fg", "hi_fg"]).unwrap_or(base.cursor),
            inactive_fg: get(&["inactive_fg"]).unwrap_or(base.inactive_fg),
        }
    }

    /// Colour for a unit colour id; ids past the table wrap around.
    #[inline]
    pub fn block_color(&self, id: u8) -> Color {
        self.blocks[usize::from(id) % self.blocks.len()]
    }
}

/// `theme[key]="value"` lines into a key → value map. Comments and junk lines are skipped.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let rest = line.strip_prefix("theme[")?;
            let (key, rest) = rest.split_once(']')?;
            let (_, value) = rest.split_once('=')?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (!value.is_empty()).then(|| (key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Parse "#RRGGBB" or "#RGB".
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let digits = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(digits.to_string());
    let value = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
    match digits.len() {
        6 => Ok(Color::from_u32(value)),
        3 => {
            let expand = |shift: u32| ((value >> shift) & 0xF) * 0x11;
            Ok(Color::Rgb(expand(8) as u8, expand(4) as u8, expand(0) as u8))
        }
        _ => Err(invalid()),
    }
}
