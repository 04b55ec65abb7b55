pub mod buffer;
pub mod cell;
pub mod color;
pub mod export;
pub mod line;
pub mod modes;
pub mod overlay;
pub mod parser;
pub mod selection;
pub mod width;

pub use buffer::{Buffer, BufferOptions, CursorShape, HorizMemo};
pub use cell::{Cell, CellFlags, Pen, UnderlineStyle};
pub use color::Color;
pub use line::{Line, LineAttribute, LineInfo};
pub use modes::{AmbiguousWidthMode, LineDensity, Modes};
pub use overlay::{CropRect, CustomGlyph, FlipState, OverlayState, Palette, PaletteEntry, ScreenSplit, Sprite};
pub use parser::EscapeParser;
pub use selection::{BufferPoint, Selection};
