//! Terminal color representation supporting default, 16-color, 256-color,
//! and truecolor, each carrying (or able to resolve) its RGB value.

/// A terminal color. Every variant can resolve to RGB so a renderer never
/// needs a side table to paint a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// The pen's default foreground/background (theme-dependent).
    Default,
    /// One of the 16 standard ANSI colors (0..=15).
    Standard(u8),
    /// One of the 256-color palette indices (0..=255).
    Palette(u8),
    /// 24-bit truecolor.
    TrueColor(u8, u8, u8),
}

impl Default for Color {
    fn default() -> Self {
        Color::Default
    }
}

impl Color {
    /// Resolve to RGB against the caller's theme default fg/bg.
    pub fn to_rgb(self, default_fg: (u8, u8, u8), default_bg: (u8, u8, u8), is_fg: bool) -> (u8, u8, u8) {
        match self {
            Color::Default => {
                if is_fg {
                    default_fg
                } else {
                    default_bg
                }
            }
            Color::Standard(i) => indexed_to_rgb(i & 0x0f),
            Color::Palette(i) => indexed_to_rgb(i),
            Color::TrueColor(r, g, b) => (r, g, b),
        }
    }

    /// Build a `Color` from a basic SGR color code: 30-37/90-97 (foreground)
    /// or 40-47/100-107 (background). Extended codes (38/39/48/49 and their
    /// sub-parameter forms) are handled by the SGR walker in `parser.rs`.
    pub fn from_sgr_basic(code: u16) -> Option<Color> {
        match code {
            30..=37 => Some(Color::Standard((code - 30) as u8)),
            40..=47 => Some(Color::Standard((code - 40) as u8)),
            90..=97 => Some(Color::Standard((code - 90 + 8) as u8)),
            100..=107 => Some(Color::Standard((code - 100 + 8) as u8)),
            _ => None,
        }
    }

    /// The SGR parameter sequence that reproduces this color as a foreground.
    pub fn to_sgr_fg(self) -> Vec<u16> {
        match self {
            Color::Default => vec![39],
            Color::Standard(i) if i < 8 => vec![30 + i as u16],
            Color::Standard(i) => vec![90 + (i - 8) as u16],
            Color::Palette(i) => vec![38, 5, i as u16],
            Color::TrueColor(r, g, b) => vec![38, 2, r as u16, g as u16, b as u16],
        }
    }

    /// The SGR parameter sequence that reproduces this color as a background.
    pub fn to_sgr_bg(self) -> Vec<u16> {
        match self {
            Color::Default => vec![49],
            Color::Standard(i) if i < 8 => vec![40 + i as u16],
            Color::Standard(i) => vec![100 + (i - 8) as u16],
            Color::Palette(i) => vec![48, 5, i as u16],
            Color::TrueColor(r, g, b) => vec![48, 2, r as u16, g as u16, b as u16],
        }
    }
}

/// Convert a 256-color index to an RGB tuple.
/// 0-15 are the standard ANSI colors (theme-dependent in a real frontend;
/// fixed here as a Tokyo Night palette), 16-231 are a 6x6x6 color cube,
/// 232-255 a grayscale ramp.
pub fn indexed_to_rgb(index: u8) -> (u8, u8, u8) {
    match index {
        0 => (0x15, 0x16, 0x1e),
        1 => (0xf7, 0x76, 0x8e),
        2 => (0x9e, 0xce, 0x6a),
        3 => (0xe0, 0xaf, 0x68),
        4 => (0x7a, 0xa2, 0xf7),
        5 => (0xbb, 0x9a, 0xf7),
        6 => (0x7d, 0xcf, 0xff),
        7 => (0xa9, 0xb1, 0xd6),
        8 => (0x41, 0x48, 0x68),
        9 => (0xff, 0x9e, 0x9e),
        10 => (0xb9, 0xf2, 0x7c),
        11 => (0xff, 0x9e, 0x64),
        12 => (0x82, 0xaa, 0xff),
        13 => (0xd4, 0xb0, 0xff),
        14 => (0xa9, 0xe1, 0xff),
        15 => (0xc0, 0xca, 0xf5),
        16..=231 => {
            let idx = index - 16;
            let r = idx / 36;
            let g = (idx % 36) / 6;
            let b = idx % 6;
            let to_val = |v: u8| if v == 0 { 0 } else { 55 + 40 * v };
            (to_val(r), to_val(g), to_val(b))
        }
        232..=255 => {
            let v = 8 + 10 * (index - 232);
            (v, v, v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_sgr_round_trip() {
        for code in [30u16, 37, 90, 97, 40, 47, 100, 107] {
            let c = Color::from_sgr_basic(code).unwrap();
            let back = if code < 40 || (90..100).contains(&code) {
                c.to_sgr_fg()
            } else {
                c.to_sgr_bg()
            };
            assert_eq!(back[0], code);
        }
    }

    #[test]
    fn truecolor_round_trip() {
        let c = Color::TrueColor(10, 20, 30);
        assert_eq!(c.to_sgr_fg(), vec![38, 2, 10, 20, 30]);
        assert_eq!(c.to_sgr_bg(), vec![48, 2, 10, 20, 30]);
    }

    #[test]
    fn palette_round_trip() {
        let c = Color::Palette(200);
        assert_eq!(c.to_sgr_fg(), vec![38, 5, 200]);
    }
}
