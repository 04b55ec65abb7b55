//! A single grid position and its style attributes.

use bitflags::bitflags;

use super::color::Color;

bitflags! {
    /// Boolean style flags for a cell. Underline is tracked separately via
    /// `Cell::underline_style` since it has more than two states.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct CellFlags: u16 {
        const BOLD          = 1 << 0;
        const ITALIC        = 1 << 1;
        const UNDERLINE     = 1 << 2;
        const REVERSE       = 1 << 3;
        const BLINK         = 1 << 4;
        const STRIKETHROUGH = 1 << 5;
        /// This cell holds the trailing half of a wide/flex-width character.
        const WIDE_SPACER   = 1 << 6;
        const X_FLIP        = 1 << 7;
        const Y_FLIP        = 1 << 8;
    }
}

/// Underline rendering style, selected via the SGR 4 sub-parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum UnderlineStyle {
    #[default]
    None,
    Single,
    Double,
    Curly,
    Dotted,
    Dashed,
}

impl UnderlineStyle {
    pub fn from_sgr_sub(n: u16) -> Self {
        match n {
            1 => UnderlineStyle::Single,
            2 => UnderlineStyle::Double,
            3 => UnderlineStyle::Curly,
            4 => UnderlineStyle::Dotted,
            5 => UnderlineStyle::Dashed,
            _ => UnderlineStyle::None,
        }
    }
}

/// A single cell in the screen grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Base code point. `0` or `' '` means blank.
    pub char: char,
    /// Zero or more combining code points appended to `char`.
    pub combining: String,
    pub foreground: Color,
    pub background: Color,
    pub flags: CellFlags,
    pub underline_style: UnderlineStyle,
    pub underline_color: Option<Color>,
    /// When true, `cell_width` carries an East-Asian-Width-derived visual
    /// width instead of the implicit 1.0.
    pub flex_width: bool,
    pub cell_width: f32,
    /// Base glyph palette; -1 means "derive from foreground SGR".
    pub bgp: i32,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            char: ' ',
            combining: String::new(),
            foreground: Color::Default,
            background: Color::Default,
            flags: CellFlags::empty(),
            underline_style: UnderlineStyle::None,
            underline_color: None,
            flex_width: false,
            cell_width: 1.0,
            bgp: -1,
        }
    }
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        (self.char == '\0' || self.char == ' ') && self.combining.is_empty()
    }

    pub fn wide_spacer(bg: Color) -> Self {
        Self {
            char: ' ',
            background: bg,
            flags: CellFlags::WIDE_SPACER,
            ..Default::default()
        }
    }

    pub fn x_flip(&self) -> bool {
        self.flags.contains(CellFlags::X_FLIP)
    }

    pub fn y_flip(&self) -> bool {
        self.flags.contains(CellFlags::Y_FLIP)
    }
}

/// The "pen": style state applied to subsequent writes. Distinct from `Cell`
/// because it never carries a `char`/`combining` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Pen {
    pub foreground: Color,
    pub background: Color,
    pub flags: CellFlags,
    pub underline_style: UnderlineStyle,
    pub underline_color: Option<Color>,
    pub bgp: i32,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            foreground: Color::Default,
            background: Color::Default,
            flags: CellFlags::empty(),
            underline_style: UnderlineStyle::None,
            underline_color: None,
            bgp: -1,
        }
    }
}

impl Pen {
    pub fn reset(&mut self) {
        *self = Pen::default();
    }

    /// Build a blank `Cell` carrying this pen's style (used as a line/screen
    /// default cell, and as the basis for a freshly written cell before the
    /// `char`/`cell_width` fields are filled in).
    pub fn to_default_cell(&self) -> Cell {
        Cell {
            char: ' ',
            combining: String::new(),
            foreground: self.foreground,
            background: self.background,
            flags: self.flags,
            underline_style: self.underline_style,
            underline_color: self.underline_color,
            flex_width: false,
            cell_width: 1.0,
            bgp: self.bgp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cell_is_blank() {
        assert!(Cell::default().is_blank());
    }

    #[test]
    fn pen_default_cell_carries_style() {
        let mut pen = Pen::default();
        pen.flags.insert(CellFlags::BOLD);
        pen.foreground = Color::Standard(1);
        let cell = pen.to_default_cell();
        assert!(cell.flags.contains(CellFlags::BOLD));
        assert_eq!(cell.foreground, Color::Standard(1));
        assert!(cell.is_blank());
    }
}
