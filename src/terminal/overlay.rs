//! Sprite/glyph overlay state: palettes, custom glyphs, sprites, crop
//! rectangles, and screen splits. New territory with no teacher analog;
//! grounded on the OSC-dispatch pattern in the teacher's
//! `terminal/state.rs::handle_osc` (small numbered sub-command tables keyed
//! on the first `;`-separated OSC argument).

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// One entry of a palette.
#[derive(Debug, Clone, Copy, PartialEq, Hash)]
pub enum PaletteEntry {
    Color { rgb: (u8, u8, u8), dim: bool },
    Transparent,
    DefaultFg { dim: bool },
}

/// An ordered palette used by custom glyphs and sprites.
#[derive(Debug, Clone, Default)]
pub struct Palette {
    pub entries: Vec<PaletteEntry>,
    /// Cached flags used by a frontend glyph cache to decide whether `fg`/
    /// `bg` must be folded into the cache key (see `DESIGN.md`).
    pub uses_default_fg: bool,
    pub uses_transparent: bool,
}

impl Palette {
    pub fn new(len: usize) -> Self {
        Self {
            entries: vec![PaletteEntry::Transparent; len],
            uses_default_fg: false,
            uses_transparent: len > 0,
        }
    }

    pub fn set(&mut self, index: usize, entry: PaletteEntry) {
        if index >= self.entries.len() {
            self.entries.resize(index + 1, PaletteEntry::Transparent);
        }
        self.entries[index] = entry;
        self.recompute_flags();
    }

    fn recompute_flags(&mut self) {
        self.uses_default_fg = self
            .entries
            .iter()
            .any(|e| matches!(e, PaletteEntry::DefaultFg { .. }));
        self.uses_transparent = self
            .entries
            .iter()
            .any(|e| matches!(e, PaletteEntry::Transparent));
    }

    /// Resolve a palette index to RGB given the surrounding cell's
    /// foreground color and background color, per the fallback policy in
    /// the spec glossary (index 0 = cell background for glyphs, but callers
    /// that resolve sprite index 0 as transparent pass `None` for `bg`).
    pub fn resolve(&self, index: u8, fg_rgb: (u8, u8, u8), bg_rgb: Option<(u8, u8, u8)>) -> Option<(u8, u8, u8)> {
        match self.entries.get(index as usize) {
            Some(PaletteEntry::Color { rgb, dim }) => {
                if *dim {
                    Some(((rgb.0 as u16 * 6 / 10) as u8, (rgb.1 as u16 * 6 / 10) as u8, (rgb.2 as u16 * 6 / 10) as u8))
                } else {
                    Some(*rgb)
                }
            }
            Some(PaletteEntry::Transparent) => bg_rgb,
            Some(PaletteEntry::DefaultFg { dim }) => {
                if *dim {
                    Some(((fg_rgb.0 as u16 * 6 / 10) as u8, (fg_rgb.1 as u16 * 6 / 10) as u8, (fg_rgb.2 as u16 * 6 / 10) as u8))
                } else {
                    Some(fg_rgb)
                }
            }
            None => bg_rgb,
        }
    }

    pub fn compute_hash(&self) -> u64 {
        let mut h = DefaultHasher::new();
        for e in &self.entries {
            e.hash(&mut h);
        }
        h.finish()
    }
}

/// A user-defined glyph: a palette-indexed pixel grid.
#[derive(Debug, Clone)]
pub struct CustomGlyph {
    pub width: u32,
    pub height: u32,
    /// Row-major indices into the active palette.
    pub pixels: Vec<u8>,
}

impl CustomGlyph {
    pub fn new(width: u32, pixels: Vec<u8>) -> Self {
        let height = if width == 0 { 0 } else { pixels.len() as u32 / width };
        Self { width, height, pixels }
    }

    pub fn compute_hash(&self) -> u64 {
        let mut h = DefaultHasher::new();
        self.width.hash(&mut h);
        self.pixels.hash(&mut h);
        h.finish()
    }
}

/// Horizontal/vertical mirroring applied to a sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlipState {
    pub x: bool,
    pub y: bool,
}

impl FlipState {
    pub fn from_code(code: u16) -> Self {
        Self {
            x: code & 0b01 != 0,
            y: code & 0b10 != 0,
        }
    }
}

/// A positioned grid of code points, rendered as an overlay above or below
/// text depending on `z`.
#[derive(Debug, Clone)]
pub struct Sprite {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Foreground palette number, or -1 to use the cell's foreground SGR.
    pub fgp: i32,
    pub flip: FlipState,
    pub x_scale: f32,
    pub y_scale: f32,
    /// Crop rectangle id, or -1 for none.
    pub crop: i32,
    /// Rows of code points, newline-delimited in the wire format.
    pub runes: Vec<Vec<char>>,
}

impl Sprite {
    pub fn is_behind_text(&self) -> bool {
        self.z < 0
    }
}

/// Pixel-space crop rectangle referenced by sprites.
#[derive(Debug, Clone, Copy)]
pub struct CropRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

/// A region that repaints part of the logical screen at an independent
/// origin, fine-scroll offset, and scale.
#[derive(Debug, Clone, Copy)]
pub struct ScreenSplit {
    pub id: u32,
    pub screen_y: u16,
    /// 0-indexed source row/col within the buffer; 0 means inherit.
    pub buf_row: i32,
    pub buf_col: i32,
    /// Sub-cell fine-scroll offsets.
    pub top_fine: i32,
    pub left_fine: i32,
    pub char_width_scale: f32,
    pub line_density: Option<super::modes::LineDensity>,
}

/// All overlay state grouped for `Buffer`.
#[derive(Debug, Clone, Default)]
pub struct OverlayState {
    pub palettes: HashMap<u32, Palette>,
    pub custom_glyphs: HashMap<u32, CustomGlyph>,
    pub sprites: HashMap<u32, Sprite>,
    pub crop_rects: HashMap<u32, CropRect>,
    pub screen_splits: HashMap<u32, ScreenSplit>,
    pub sprite_unit_x: u32,
    pub sprite_unit_y: u32,
    pub width_crop: i32,
    pub height_crop: i32,
    pub split_content_width: u32,
}

impl OverlayState {
    pub fn new() -> Self {
        Self {
            sprite_unit_x: 8,
            sprite_unit_y: 8,
            width_crop: -1,
            height_crop: -1,
            ..Default::default()
        }
    }

    /// Split sprites/crop-rects/palettes into (behind-text, in-front) render
    /// lists, sorted by z-index ascending within each group.
    pub fn sprites_for_rendering(&self) -> (Vec<&Sprite>, Vec<&Sprite>) {
        let mut behind: Vec<&Sprite> = self.sprites.values().filter(|s| s.is_behind_text()).collect();
        let mut front: Vec<&Sprite> = self.sprites.values().filter(|s| !s.is_behind_text()).collect();
        behind.sort_by_key(|s| s.z);
        front.sort_by_key(|s| s.z);
        (behind, front)
    }

    pub fn screen_splits_sorted(&self) -> Vec<&ScreenSplit> {
        let mut v: Vec<&ScreenSplit> = self.screen_splits.values().collect();
        v.sort_by_key(|s| s.screen_y);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_resolve_transparent_falls_back_to_bg() {
        let mut p = Palette::new(1);
        p.set(0, PaletteEntry::Transparent);
        assert_eq!(p.resolve(0, (1, 2, 3), Some((9, 9, 9))), Some((9, 9, 9)));
        assert_eq!(p.resolve(0, (1, 2, 3), None), None);
    }

    #[test]
    fn palette_hash_changes_on_mutation() {
        let mut p = Palette::new(1);
        let h1 = p.compute_hash();
        p.set(0, PaletteEntry::Color { rgb: (1, 2, 3), dim: false });
        let h2 = p.compute_hash();
        assert_ne!(h1, h2);
    }

    #[test]
    fn sprite_z_index_splits_behind_and_front() {
        let mut st = OverlayState::new();
        st.sprites.insert(1, Sprite { id: 1, x: 0, y: 0, z: -1, fgp: -1, flip: FlipState::default(), x_scale: 1.0, y_scale: 1.0, crop: -1, runes: vec![] });
        st.sprites.insert(2, Sprite { id: 2, x: 0, y: 0, z: 1, fgp: -1, flip: FlipState::default(), x_scale: 1.0, y_scale: 1.0, crop: -1, runes: vec![] });
        let (behind, front) = st.sprites_for_rendering();
        assert_eq!(behind.len(), 1);
        assert_eq!(front.len(), 1);
        assert_eq!(behind[0].id, 1);
        assert_eq!(front[0].id, 2);
    }
}
