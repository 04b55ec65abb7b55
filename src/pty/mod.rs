//! PTY transport contract.
//!
//! Spawning a shell, reading its output, and wiring signals belongs to an
//! external host (see `DESIGN.md`); this crate only defines the trait a host
//! adapter implements and the error taxonomy `Terminal::feed_from` surfaces
//! when a host-supplied read/write fails. Generalizes the shape of the
//! teacher's `pty::session::Session` (master handle + writer + child) down to
//! the minimal interface the buffer/parser pair actually needs.

use thiserror::Error;

/// Failure spawning or operating an OS-level pseudo-terminal. A host adapter
/// maps its platform's error (e.g. `portable-pty`'s `anyhow::Error`, or a
/// raw `nix`/`winpty` errno) onto one of these variants.
#[derive(Debug, Error)]
pub enum OSResourceError {
    #[error("failed to allocate a pseudo-terminal: {0}")]
    Spawn(#[from] SpawnError),
    #[error("I/O error communicating with the pseudo-terminal: {0}")]
    Io(#[from] IOError),
}

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("no shell executable could be located")]
    ShellNotFound,
    #[error("failed to open a pseudo-terminal device: {0}")]
    OpenFailed(String),
    #[error("failed to spawn child process: {0}")]
    ChildSpawnFailed(String),
}

#[derive(Debug, Error)]
pub enum IOError {
    #[error("read from pseudo-terminal failed: {0}")]
    ReadFailed(String),
    #[error("write to pseudo-terminal failed: {0}")]
    WriteFailed(String),
    #[error("resize of pseudo-terminal failed: {0}")]
    ResizeFailed(String),
    #[error("pseudo-terminal closed")]
    Closed,
}

/// The contract a PTY host adapter fulfills. The core never implements this
/// itself — only a GUI/CLI host with access to process-spawning APIs can.
pub trait PtyHandle: Send {
    /// Write bytes typed by the user (or pasted, or produced by a response
    /// sequence such as DSR) to the child process's stdin.
    fn write_input(&mut self, data: &[u8]) -> Result<(), IOError>;

    /// Inform the pseudo-terminal (and, transitively, the child's controlling
    /// terminal) of a physical size change so `SIGWINCH`-style notifications
    /// fire correctly.
    fn resize(&mut self, cols: u16, rows: u16) -> Result<(), IOError>;

    /// Best-effort termination of the child process tree.
    fn kill(&mut self);
}
