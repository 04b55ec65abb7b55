//! Byte-oriented escape-sequence parser. Wraps `vte::Parser` (already the
//! teacher's choice in `terminal/state.rs`) and implements `vte::Perform` to
//! dispatch CSI/SGR/OSC/DCS/ESC sequences into `Buffer` mutations.
//!
//! Invalid or unrecognized sequences are absorbed silently (traced at
//! `trace`/`debug`) per the no-error-return parsing policy; `vte` itself
//! already returns to its Ground state on any byte it can't place.

use vte::{Params, Perform};

use super::buffer::{Buffer, CursorShape, HorizMemo};
use super::cell::UnderlineStyle;
use super::color::Color;
use super::modes::{AmbiguousWidthMode, LineDensity};
use super::overlay::{CropRect, FlipState, PaletteEntry, ScreenSplit, Sprite};

pub struct EscapeParser {
    inner: vte::Parser,
}

impl Default for EscapeParser {
    fn default() -> Self {
        Self { inner: vte::Parser::new() }
    }
}

impl EscapeParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes from the PTY (or a replayed capture) into the
    /// buffer. Call under the buffer's write lock.
    pub fn feed(&mut self, buffer: &mut Buffer, bytes: &[u8]) {
        let mut performer = Performer { buffer };
        for &b in bytes {
            self.inner.advance(&mut performer, b);
        }
    }
}

struct Performer<'a> {
    buffer: &'a mut Buffer,
}

fn params_iter(params: &Params) -> impl Iterator<Item = u16> + '_ {
    params.iter().map(|sub| *sub.first().unwrap_or(&0))
}

/// Parameter value where `0` is meaningful (not a "use default" sentinel);
/// `default` only applies when the parameter is absent entirely.
fn param_at(params: &Params, idx: usize, default: u16) -> u16 {
    params_iter(params).nth(idx).unwrap_or(default)
}

fn param_or(params: &Params, idx: usize, default: u16) -> u16 {
    match params_iter(params).nth(idx) {
        Some(0) | None => default,
        Some(v) => v,
    }
}

impl<'a> Perform for Performer<'a> {
    fn print(&mut self, c: char) {
        self.buffer.write_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x08 => self.buffer.backspace(),
            0x09 => self.buffer.tab(),
            0x0A | 0x0B | 0x0C => self.buffer.linefeed(),
            0x0D => self.buffer.carriage_return(),
            0x07 => {} // BEL: no terminal-bell modeling in this core
            _ => tracing::trace!(byte, "dropped unrecognized C0 control"),
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {
        tracing::trace!("dropped unsupported DCS sequence");
    }

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        let Some(&kind) = params.first() else { return };
        let kind_str = std::str::from_utf8(kind).unwrap_or("");
        match kind_str {
            "7000" => self.handle_osc_palette(&params[1..]),
            "7001" => self.handle_osc_glyph(&params[1..]),
            "7002" => self.handle_osc_sprite(&params[1..]),
            "7003" => self.handle_osc_split(&params[1..]),
            _ => tracing::trace!(kind = kind_str, "dropped unrecognized OSC"),
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        if !intermediates.is_empty() {
            self.csi_with_intermediate(params, intermediates, action);
            return;
        }
        let b = &mut *self.buffer;
        match action {
            'A' => b.cursor_up(param_or(params, 0, 1)),
            'B' => b.cursor_down(param_or(params, 0, 1)),
            'C' => b.cursor_forward(param_or(params, 0, 1)),
            'D' => b.cursor_backward(param_or(params, 0, 1)),
            'E' => {
                b.cursor_down(param_or(params, 0, 1));
                b.carriage_return();
            }
            'F' => {
                b.cursor_up(param_or(params, 0, 1));
                b.carriage_return();
            }
            'G' => b.cursor_x_abs(param_or(params, 0, 1).saturating_sub(1)),
            'd' => b.cursor_y_abs(param_or(params, 0, 1).saturating_sub(1)),
            'H' | 'f' => {
                let row = param_or(params, 0, 1).saturating_sub(1);
                let col = param_or(params, 1, 1).saturating_sub(1);
                b.cursor_pos(row, col);
            }
            'J' => b.erase_display(param_at(params, 0, 0)),
            'K' => b.erase_line(param_at(params, 0, 0)),
            'L' => b.insert_lines(param_or(params, 0, 1)),
            'M' => b.delete_lines(param_or(params, 0, 1)),
            'P' => b.delete_chars(param_or(params, 0, 1)),
            '@' => b.insert_blank_chars(param_or(params, 0, 1)),
            'X' => b.erase_chars(param_or(params, 0, 1)),
            'S' => b.scroll_up_n(param_or(params, 0, 1)),
            'T' => b.scroll_down_n(param_or(params, 0, 1)),
            's' => b.save_cursor(),
            'u' => b.restore_cursor(),
            'm' => Self::sgr(b, params),
            'h' => Self::private_mode(b, params, true),
            'l' => Self::private_mode(b, params, false),
            't' => Self::window_op(b, params),
            _ => tracing::trace!(action = %action, "dropped unrecognized CSI final byte"),
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        let b = &mut *self.buffer;
        match (intermediates, byte) {
            ([], b'c') => b.reset(),
            ([], b'D') => b.linefeed(),
            ([], b'M') => b.reverse_index(),
            ([], b'E') => b.nel(),
            ([], b'7') => b.save_cursor(),
            ([], b'8') => b.restore_cursor(),
            ([b'#'], b'3') => b.dec_line_attr(3),
            ([b'#'], b'4') => b.dec_line_attr(4),
            ([b'#'], b'5') => b.dec_line_attr(5),
            ([b'#'], b'6') => b.dec_line_attr(6),
            ([b'#'], b'8') => b.dec_line_attr(8),
            _ => tracing::trace!(byte, "dropped unrecognized ESC sequence"),
        }
    }
}

impl<'a> Performer<'a> {
    fn csi_with_intermediate(&mut self, params: &Params, intermediates: &[u8], action: char) {
        let b = &mut self.buffer;
        match (intermediates, action) {
            ([b'?'], 'h') => Self::private_mode(b, params, true),
            ([b'?'], 'l') => Self::private_mode(b, params, false),
            ([b' '], 'q') => {
                let n = param_at(params, 0, 0);
                match n {
                    0 | 1 | 2 => b.set_cursor_shape(CursorShape::Block),
                    3 | 4 => b.set_cursor_shape(CursorShape::Underline),
                    5 | 6 => b.set_cursor_shape(CursorShape::Bar),
                    _ => {}
                }
                b.set_cursor_blink_fast(matches!(n, 1 | 3 | 5));
            }
            _ => tracing::trace!(?intermediates, action = %action, "dropped unrecognized CSI with intermediate"),
        }
    }

    fn private_mode(b: &mut Buffer, params: &Params, enable: bool) {
        for code in params_iter(params) {
            match code {
                3 => b.set_column_mode_132(enable),
                5 => b.set_dark_theme(enable),
                7 => b.set_auto_wrap(enable),
                12 => b.set_cursor_blink_fast(enable),
                25 => b.set_cursor_visible(enable),
                1049 => {
                    // Alt-screen switch: out of scope for this core's single
                    // buffer model (see spec Non-goals); track nothing.
                }
                2004 => b.set_bracketed_paste(enable),
                2027 => b.set_flex_width(enable),
                2028 => b.set_visual_width_wrap(enable),
                // Turning off reverts to Auto only if this mode was the one
                // in effect; otherwise it leaves the other one alone.
                2029 => {
                    if enable {
                        b.set_ambiguous_width_mode(AmbiguousWidthMode::Narrow);
                    } else if b.modes().ambiguous_width == AmbiguousWidthMode::Narrow {
                        b.set_ambiguous_width_mode(AmbiguousWidthMode::Auto);
                    }
                }
                2030 => {
                    if enable {
                        b.set_ambiguous_width_mode(AmbiguousWidthMode::Wide);
                    } else if b.modes().ambiguous_width == AmbiguousWidthMode::Wide {
                        b.set_ambiguous_width_mode(AmbiguousWidthMode::Auto);
                    }
                }
                7700 => b.set_scrollback_disabled(enable),
                7701 => b.set_auto_scroll_disabled(enable),
                7702 => b.set_smart_word_wrap(enable),
                _ => tracing::trace!(code, enable, "dropped unrecognized DEC private mode"),
            }
        }
    }

    fn window_op(b: &mut Buffer, params: &Params) {
        let op = param_at(params, 0, 0);
        match op {
            8 => {
                let rows = param_at(params, 1, 0);
                let cols = param_at(params, 2, 0);
                b.set_logical_size(rows, cols);
            }
            9 => {
                let sub = param_at(params, 1, 0);
                match sub {
                    40 => b.set_column_mode_40(param_at(params, 2, 0) != 0),
                    _ => {
                        if let Some(density) = LineDensity::from_n(sub) {
                            b.set_line_density(density);
                        }
                    }
                }
            }
            _ => tracing::trace!(op, "dropped unrecognized window-manipulation op"),
        }
    }

    fn sgr(b: &mut Buffer, params: &Params) {
        let mut subparams = params.iter().peekable();
        while let Some(sub) = subparams.next() {
            let code = *sub.first().unwrap_or(&0);
            match code {
                0 => b.reset_pen(),
                1 => b.set_bold(true),
                3 => b.set_italic(true),
                4 => {
                    let style_n = sub.get(1).copied().unwrap_or(1);
                    b.set_underline_style(UnderlineStyle::from_sgr_sub(style_n));
                }
                5 | 6 => b.set_blink(true),
                7 => b.set_reverse(true),
                9 => b.set_strikethrough(true),
                22 => b.set_bold(false),
                23 => b.set_italic(false),
                24 => b.set_underline(false),
                25 => b.set_blink(false),
                27 => b.set_reverse(false),
                29 => b.set_strikethrough(false),
                30..=37 | 90..=97 => {
                    if let Some(c) = Color::from_sgr_basic(code) {
                        b.set_foreground(c);
                    }
                }
                39 => b.set_foreground(Color::Default),
                40..=47 | 100..=107 => {
                    if let Some(c) = Color::from_sgr_basic(code) {
                        b.set_background(c);
                    }
                }
                49 => b.set_background(Color::Default),
                38 => {
                    if let Some(c) = Self::extended_color(sub, &mut subparams) {
                        b.set_foreground(c);
                    }
                }
                48 => {
                    if let Some(c) = Self::extended_color(sub, &mut subparams) {
                        b.set_background(c);
                    }
                }
                58 => {
                    if let Some(c) = Self::extended_color(sub, &mut subparams) {
                        b.set_underline_color(Some(c));
                    }
                }
                59 => b.set_underline_color(None),
                150 => b.set_bgp(-1),
                151..=153 => b.set_bgp((code - 151) as i32),
                158 => b.set_x_flip(true),
                159 => b.set_y_flip(true),
                _ => tracing::trace!(code, "dropped unrecognized SGR code"),
            }
        }
    }

    /// Parse `38`/`48`/`58`'s extended forms. Supports both the colon
    /// sub-parameter style (`38:2::R:G:B`, all in one `Params` slot) and the
    /// legacy semicolon style (`38;2;R;G;B`, each a separate slot consumed
    /// from the shared iterator).
    fn extended_color<'p, I>(sub: &[u16], rest: &mut std::iter::Peekable<I>) -> Option<Color>
    where
        I: Iterator<Item = &'p [u16]>,
    {
        if sub.len() > 1 {
            return match sub[1] {
                // `38:2:R:G:B` (no colorspace) and `38:2:Cs:R:G:B` / `38:2::R:G:B`
                // (colorspace present or defaulted to 0) both end in R,G,B.
                2 if sub.len() >= 5 => {
                    let rgb = &sub[sub.len() - 3..];
                    Some(Color::TrueColor(rgb[0] as u8, rgb[1] as u8, rgb[2] as u8))
                }
                5 if sub.len() >= 3 => Some(Color::Palette(sub[sub.len() - 1] as u8)),
                _ => None,
            };
        }
        let mode = *rest.next()?.first()?;
        match mode {
            2 => {
                let r = *rest.next()?.first()?;
                let g = *rest.next()?.first()?;
                let bl = *rest.next()?.first()?;
                Some(Color::TrueColor(r as u8, g as u8, bl as u8))
            }
            5 => {
                let idx = *rest.next()?.first()?;
                Some(Color::Palette(idx as u8))
            }
            _ => None,
        }
    }

    fn handle_osc_palette(&mut self, args: &[&[u8]]) {
        let parts = osc_str_parts(args);
        if parts.len() < 2 {
            return;
        }
        let Ok(id) = parts[0].parse::<u32>() else { return };
        let Ok(index) = parts[1].parse::<usize>() else { return };
        let kind = parts.get(2).and_then(|s| s.parse::<u8>().ok()).unwrap_or(0);
        let entry = match kind {
            0 => PaletteEntry::Transparent,
            1 | 2 => {
                if parts.len() < 6 {
                    return;
                }
                let (Ok(r), Ok(g), Ok(bl)) = (parts[3].parse(), parts[4].parse(), parts[5].parse()) else { return };
                PaletteEntry::Color { rgb: (r, g, bl), dim: kind == 2 }
            }
            3 => {
                let dim = parts.get(3).map(|s| *s == "1").unwrap_or(false);
                PaletteEntry::DefaultFg { dim }
            }
            _ => return,
        };
        self.buffer.palette_set(id, index, entry);
    }

    fn handle_osc_glyph(&mut self, args: &[&[u8]]) {
        let parts = osc_str_parts(args);
        if parts.len() < 3 {
            return;
        }
        let Ok(rune) = parts[0].parse::<u32>() else { return };
        let Ok(width) = parts[1].parse::<u32>() else { return };
        let pixels: Vec<u8> = parts.get(3).map(|s| s.split(',').filter_map(|p| p.parse().ok()).collect()).unwrap_or_default();
        self.buffer.glyph_set(rune, width, pixels);
    }

    fn handle_osc_sprite(&mut self, args: &[&[u8]]) {
        let parts = osc_str_parts(args);
        let Some(sub) = parts.first().and_then(|s| s.parse::<u8>().ok()) else { return };
        match sub {
            1 => {
                if parts.len() < 10 {
                    return;
                }
                let p = |i: usize| parts[i].parse::<i32>().unwrap_or(0);
                let sprite = Sprite {
                    id: p(1) as u32,
                    x: p(2),
                    y: p(3),
                    z: p(4),
                    fgp: p(5),
                    flip: FlipState::from_code(p(6) as u16),
                    x_scale: p(7) as f32 / 1000.0,
                    y_scale: p(8) as f32 / 1000.0,
                    crop: p(9),
                    runes: Vec::new(),
                };
                self.buffer.sprite_set(sprite);
            }
            2 => {
                if parts.len() < 4 {
                    return;
                }
                let (Ok(id), Ok(x), Ok(y)) = (parts[1].parse(), parts[2].parse(), parts[3].parse()) else { return };
                self.buffer.sprite_move(id, x, y);
            }
            3 => {
                if let Some(id) = parts.get(1).and_then(|s| s.parse().ok()) {
                    self.buffer.sprite_delete(id);
                }
            }
            4 => self.buffer.sprite_delete_all(),
            5 => {
                if parts.len() < 6 {
                    return;
                }
                let (Ok(id), Ok(min_x), Ok(min_y), Ok(max_x), Ok(max_y)) =
                    (parts[1].parse(), parts[2].parse(), parts[3].parse(), parts[4].parse(), parts[5].parse())
                else {
                    return;
                };
                self.buffer.crop_set(id, CropRect { min_x, min_y, max_x, max_y });
            }
            6 => {
                if let Some(id) = parts.get(1).and_then(|s| s.parse().ok()) {
                    self.buffer.crop_delete(id);
                }
            }
            7 => self.buffer.crop_delete_all(),
            8 => {
                if parts.len() < 3 {
                    return;
                }
                let (Ok(x), Ok(y)) = (parts[1].parse(), parts[2].parse()) else { return };
                self.buffer.set_sprite_units(x, y);
            }
            _ => {}
        }
    }

    fn handle_osc_split(&mut self, args: &[&[u8]]) {
        let parts = osc_str_parts(args);
        let Some(sub) = parts.first().and_then(|s| s.parse::<u8>().ok()) else { return };
        match sub {
            1 => {
                if parts.len() < 3 {
                    return;
                }
                let (Ok(w), Ok(h)) = (parts[1].parse(), parts[2].parse()) else { return };
                self.buffer.set_screen_crop(w, h);
            }
            2 => {
                if parts.len() < 9 {
                    return;
                }
                let p = |i: usize| parts[i].parse::<i32>().unwrap_or(0);
                let density_n = parts[8].parse::<u16>().unwrap_or(0);
                let split = ScreenSplit {
                    id: p(1) as u32,
                    screen_y: p(2) as u16,
                    buf_row: p(3),
                    buf_col: p(4),
                    top_fine: p(5),
                    left_fine: p(6),
                    char_width_scale: p(7) as f32 / 1000.0,
                    line_density: LineDensity::from_n(density_n),
                };
                self.buffer.split_set(split);
            }
            3 => {
                if let Some(id) = parts.get(1).and_then(|s| s.parse().ok()) {
                    self.buffer.split_delete(id);
                }
            }
            4 => self.buffer.split_delete_all(),
            _ => {}
        }
    }
}

fn osc_str_parts<'b>(args: &[&'b [u8]]) -> Vec<&'b str> {
    args.iter().map(|a| std::str::from_utf8(a).unwrap_or("")).collect()
}

/// Populate a `HorizMemo` for `screen_y` by scanning the visible row for
/// where the cursor's column sits relative to the rendered column range.
/// Host renderers call this (or their own equivalent) after painting a row;
/// provided here as the reference implementation described in the spec.
pub fn record_horiz_memo(buffer: &mut Buffer, screen_y: u16, left_col: i64, right_col: i64, cursor_x: i64) {
    let cursor_located = cursor_x >= left_col && cursor_x <= right_col;
    let distance_to_left = if cursor_x < left_col { Some(left_col - cursor_x) } else { None };
    let distance_to_right = if cursor_x > right_col { Some(cursor_x - right_col) } else { None };
    buffer.set_horiz_memo(
        screen_y,
        HorizMemo { left_col, right_col, cursor_located, distance_to_left, distance_to_right },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::buffer::BufferOptions;

    fn feed_bytes(buffer: &mut Buffer, parser: &mut EscapeParser, bytes: &[u8]) {
        parser.feed(buffer, bytes);
    }

    #[test]
    fn plain_text_writes_chars() {
        let mut b = Buffer::new(BufferOptions { cols: 20, rows: 5, max_scrollback: 10 });
        let mut p = EscapeParser::new();
        feed_bytes(&mut b, &mut p, b"Hello");
        assert_eq!(b.get_visible_cell(0, 0).char, 'H');
        assert_eq!(b.get_cursor(), (5, 0));
    }

    #[test]
    fn csi_cursor_position_is_one_indexed() {
        let mut b = Buffer::new(BufferOptions { cols: 20, rows: 5, max_scrollback: 10 });
        let mut p = EscapeParser::new();
        feed_bytes(&mut b, &mut p, b"\x1b[3;4H");
        assert_eq!(b.get_cursor(), (3, 2));
    }

    #[test]
    fn sgr_bold_and_truecolor_fg() {
        let mut b = Buffer::new(BufferOptions { cols: 20, rows: 5, max_scrollback: 10 });
        let mut p = EscapeParser::new();
        feed_bytes(&mut b, &mut p, b"\x1b[1;38;2;10;20;30mX");
        let cell = b.get_visible_cell(0, 0);
        assert!(cell.flags.contains(super::super::cell::CellFlags::BOLD));
        assert_eq!(cell.foreground, Color::TrueColor(10, 20, 30));
    }

    #[test]
    fn sgr_truecolor_colon_subparams() {
        let mut b = Buffer::new(BufferOptions { cols: 20, rows: 5, max_scrollback: 10 });
        let mut p = EscapeParser::new();
        feed_bytes(&mut b, &mut p, b"\x1b[38:2::10:20:30mX");
        assert_eq!(b.get_visible_cell(0, 0).foreground, Color::TrueColor(10, 20, 30));
    }

    #[test]
    fn sgr_truecolor_colon_subparams_without_colorspace() {
        let mut b = Buffer::new(BufferOptions { cols: 20, rows: 5, max_scrollback: 10 });
        let mut p = EscapeParser::new();
        feed_bytes(&mut b, &mut p, b"\x1b[38:2:10:20:30mX");
        assert_eq!(b.get_visible_cell(0, 0).foreground, Color::TrueColor(10, 20, 30));
    }

    #[test]
    fn dec_private_mode_ambiguous_width_reverts_to_auto() {
        use super::super::modes::AmbiguousWidthMode;
        let mut b = Buffer::new(BufferOptions { cols: 20, rows: 5, max_scrollback: 10 });
        let mut p = EscapeParser::new();
        feed_bytes(&mut b, &mut p, b"\x1b[?2029h");
        assert_eq!(b.modes().ambiguous_width, AmbiguousWidthMode::Narrow);
        feed_bytes(&mut b, &mut p, b"\x1b[?2029l");
        assert_eq!(b.modes().ambiguous_width, AmbiguousWidthMode::Auto);

        feed_bytes(&mut b, &mut p, b"\x1b[?2030h");
        assert_eq!(b.modes().ambiguous_width, AmbiguousWidthMode::Wide);
        // Disabling the mode that isn't active is a no-op.
        feed_bytes(&mut b, &mut p, b"\x1b[?2029l");
        assert_eq!(b.modes().ambiguous_width, AmbiguousWidthMode::Wide);
        feed_bytes(&mut b, &mut p, b"\x1b[?2030l");
        assert_eq!(b.modes().ambiguous_width, AmbiguousWidthMode::Auto);
    }

    #[test]
    fn erase_display_mode_2_clears_screen_and_homes_cursor() {
        let mut b = Buffer::new(BufferOptions { cols: 20, rows: 5, max_scrollback: 10 });
        let mut p = EscapeParser::new();
        feed_bytes(&mut b, &mut p, b"hello\x1b[2J");
        assert_eq!(b.get_cursor(), (0, 0));
        assert_eq!(b.get_visible_cell(0, 0).char, ' ');
    }

    #[test]
    fn dec_private_mode_bracketed_paste() {
        let mut b = Buffer::new(BufferOptions { cols: 20, rows: 5, max_scrollback: 10 });
        let mut p = EscapeParser::new();
        feed_bytes(&mut b, &mut p, b"\x1b[?2004h");
        assert!(b.is_bracketed_paste_mode_enabled());
        feed_bytes(&mut b, &mut p, b"\x1b[?2004l");
        assert!(!b.is_bracketed_paste_mode_enabled());
    }

    #[test]
    fn logical_size_window_op() {
        let mut b = Buffer::new(BufferOptions { cols: 20, rows: 5, max_scrollback: 10 });
        let mut p = EscapeParser::new();
        feed_bytes(&mut b, &mut p, b"\x1b[8;50;20t");
        assert_eq!(b.get_logical_size(), (20, 50));
    }

    #[test]
    fn malformed_csi_is_absorbed_without_panic() {
        let mut b = Buffer::new(BufferOptions { cols: 20, rows: 5, max_scrollback: 10 });
        let mut p = EscapeParser::new();
        feed_bytes(&mut b, &mut p, b"\x1b[9999999999999;zzzq\x1b[999Z");
        feed_bytes(&mut b, &mut p, b"still alive");
        assert_eq!(b.get_visible_cell(0, 0).char, 's');
    }

    #[test]
    fn vendor_osc_palette_round_trips_through_export() {
        let mut b = Buffer::new(BufferOptions { cols: 20, rows: 5, max_scrollback: 10 });
        let mut p = EscapeParser::new();
        feed_bytes(&mut b, &mut p, b"\x1b]7000;3;0;1;10;20;30\x07");
        let palette = b.get_palette(3).expect("palette set");
        assert_eq!(palette.entries[0], PaletteEntry::Color { rgb: (10, 20, 30), dim: false });
    }
}
