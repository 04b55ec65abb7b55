//! A variable-width terminal screen buffer with scrollback and a
//! byte-oriented VT/ANSI escape-sequence parser.
//!
//! This crate owns the grid, cursor, selection, and overlay state and the
//! parser that mutates them. It does not spawn processes, open a
//! pseudo-terminal, or render pixels — see [`pty::PtyHandle`] for the
//! contract a host adapter implements to supply bytes from a real shell.

pub mod pty;
pub mod terminal;

use std::sync::Arc;

use parking_lot::RwLock;

pub use terminal::{Buffer, BufferOptions, EscapeParser};

/// Top-level handle combining the shared buffer and its parser. Cloning is
/// cheap (an `Arc` bump) and all clones see the same buffer.
#[derive(Clone)]
pub struct Terminal {
    buffer: Arc<RwLock<Buffer>>,
    parser: Arc<parking_lot::Mutex<EscapeParser>>,
    on_scale_change: Arc<RwLock<Option<Box<dyn Fn() + Send + Sync>>>>,
    on_theme_change: Arc<RwLock<Option<Box<dyn Fn(bool) + Send + Sync>>>>,
}

impl Terminal {
    pub fn new(options: BufferOptions) -> Self {
        Self {
            buffer: Arc::new(RwLock::new(Buffer::new(options))),
            parser: Arc::new(parking_lot::Mutex::new(EscapeParser::new())),
            on_scale_change: Arc::new(RwLock::new(None)),
            on_theme_change: Arc::new(RwLock::new(None)),
        }
    }

    /// A clone of the shared buffer handle, for a host adapter that needs to
    /// read cells from its own render thread.
    pub fn buffer_handle(&self) -> Arc<RwLock<Buffer>> {
        Arc::clone(&self.buffer)
    }

    /// Register the dirty callback, invoked synchronously by the buffer
    /// while the write lock is still held (see spec §5: cheap repaint
    /// scheduling, not a place to do real work).
    pub fn set_on_dirty(&self, cb: impl FnMut() + Send + Sync + 'static) {
        self.buffer.write().set_on_dirty(cb);
    }

    /// Register the scale-change callback, fired with the write lock
    /// released (column/logical-size/line-density changes).
    pub fn set_on_scale_change(&self, cb: impl Fn() + Send + Sync + 'static) {
        *self.on_scale_change.write() = Some(Box::new(cb));
    }

    /// Register the theme-change callback, fired with the write lock
    /// released, carrying the new `dark_theme` value.
    pub fn set_on_theme_change(&self, cb: impl Fn(bool) + Send + Sync + 'static) {
        *self.on_theme_change.write() = Some(Box::new(cb));
    }

    /// Feed bytes from a PTY (or a replayed `save_scrollback_ans` capture)
    /// through the parser into the buffer.
    pub fn feed(&self, bytes: &[u8]) {
        {
            let mut buffer = self.buffer.write();
            let mut parser = self.parser.lock();
            parser.feed(&mut buffer, bytes);
        }
        self.fire_pending_callbacks();
    }

    pub fn resize(&self, cols: u16, rows: u16) {
        self.buffer.write().resize(cols, rows);
        self.fire_pending_callbacks();
    }

    pub fn note_keyboard_activity(&self) {
        let mut buffer = self.buffer.write();
        buffer.note_keyboard_activity();
        buffer.check_cursor_auto_scroll();
    }

    /// Run a read-only query against the buffer (cell lookups, cursor
    /// position, scroll state, export).
    pub fn with_buffer<R>(&self, f: impl FnOnce(&Buffer) -> R) -> R {
        f(&self.buffer.read())
    }

    /// Run a mutation against the buffer directly (selection, scroll,
    /// mode toggles driven by the host rather than the parser), then fire
    /// any scale/theme callbacks the mutation queued.
    pub fn with_buffer_mut<R>(&self, f: impl FnOnce(&mut Buffer) -> R) -> R {
        let result = f(&mut self.buffer.write());
        self.fire_pending_callbacks();
        result
    }

    fn fire_pending_callbacks(&self) {
        let (scale_changed, theme_changed) = {
            let mut buffer = self.buffer.write();
            (buffer.take_pending_scale_change(), buffer.take_pending_theme_change())
        };
        if scale_changed {
            if let Some(cb) = self.on_scale_change.read().as_ref() {
                cb();
            }
        }
        if let Some(dark) = theme_changed {
            if let Some(cb) = self.on_theme_change.read().as_ref() {
                cb(dark);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn feed_writes_through_to_buffer() {
        let term = Terminal::new(BufferOptions::default());
        term.feed(b"hi");
        term.with_buffer(|b| {
            assert_eq!(b.get_visible_cell(0, 0).char, 'h');
        });
    }

    #[test]
    fn dirty_callback_fires_while_mutating() {
        let term = Terminal::new(BufferOptions::default());
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);
        term.set_on_dirty(move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        term.feed(b"x");
        assert!(count.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn scale_change_callback_fires_after_logical_resize() {
        let term = Terminal::new(BufferOptions::default());
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = Arc::clone(&fired);
        term.set_on_scale_change(move || fired2.store(true, Ordering::SeqCst));
        term.feed(b"\x1b[8;50;100t");
        assert!(fired.load(Ordering::SeqCst));
    }
}
