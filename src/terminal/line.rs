//! Variable-length lines. Unlike a fixed-width `Row`, a `Line` grows as
//! characters are written and is never truncated by resize; positions past
//! the stored length fall back to `LineInfo::default_cell`.

use super::cell::Cell;

/// Double-width / double-height line attribute set by `ESC#3/4/5/6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineAttribute {
    #[default]
    Normal,
    DoubleWidth,
    DoubleTopHalf,
    DoubleBottomHalf,
}

/// Per-logical-line metadata.
#[derive(Debug, Clone)]
pub struct LineInfo {
    pub attribute: LineAttribute,
    /// Cell returned for any column past the stored line length. Carries the
    /// pen snapshot active when the line was last cleared/created, so a
    /// line-wide background color persists past its content.
    pub default_cell: Cell,
    /// True if this line's content was produced by an auto-wrap (as opposed
    /// to an explicit newline); used by `save_scrollback_ans` to avoid
    /// re-inserting a hard break that would change re-parsed layout.
    pub wrapped: bool,
}

impl Default for LineInfo {
    fn default() -> Self {
        Self {
            attribute: LineAttribute::Normal,
            default_cell: Cell::default(),
            wrapped: false,
        }
    }
}

/// An ordered, variable-length sequence of cells.
#[derive(Debug, Clone, Default)]
pub struct Line {
    pub cells: Vec<Cell>,
}

impl Line {
    pub fn new() -> Self {
        Self { cells: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Ensure the line has at least `len` cells, padding with `fill`.
    pub fn ensure_len(&mut self, len: usize, fill: &Cell) {
        if self.cells.len() < len {
            self.cells.resize(len, fill.clone());
        }
    }

    pub fn truncate(&mut self, len: usize) {
        self.cells.truncate(len);
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Fetch a cell at `x`, falling back to `line_info.default_cell` past
    /// the stored length.
    pub fn get(&self, x: usize, info: &LineInfo) -> Cell {
        self.cells.get(x).cloned().unwrap_or_else(|| info.default_cell.clone())
    }

    /// Trailing run of plain-space/NUL cells trimmed off for text export.
    pub fn trimmed_text(&self) -> String {
        let mut s: String = self
            .cells
            .iter()
            .map(|c| {
                let mut cs = String::new();
                if c.char != '\0' {
                    cs.push(c.char);
                } else {
                    cs.push(' ');
                }
                cs.push_str(&c.combining);
                cs
            })
            .collect();
        while matches!(s.chars().last(), Some(' ') | Some('\0')) {
            s.pop();
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_len_pads_with_default() {
        let mut line = Line::new();
        let mut info = LineInfo::default();
        info.default_cell.background = super::super::color::Color::Standard(2);
        line.ensure_len(3, &info.default_cell);
        assert_eq!(line.len(), 3);
        assert_eq!(line.cells[0].background, super::super::color::Color::Standard(2));
    }

    #[test]
    fn trimmed_text_drops_trailing_spaces() {
        let mut line = Line::new();
        line.cells.push(Cell { char: 'h', ..Default::default() });
        line.cells.push(Cell { char: 'i', ..Default::default() });
        line.cells.push(Cell { char: ' ', ..Default::default() });
        assert_eq!(line.trimmed_text(), "hi");
    }
}
