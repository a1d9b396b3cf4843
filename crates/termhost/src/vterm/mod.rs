//! The virtual terminal emulator.
//!
//! [`Vt`] interprets a child process's byte stream the way a VT100/ECMA-48
//! terminal would, maintains the screen grid, and produces outbound byte
//! sequences for queries and keyboard events.
//!
//! # Key Types
//!
//! - [`Vt`] - The emulator facade; every entry point is serialized by an
//!   internal mutex that is never held across blocking I/O
//! - [`ScreenShot`] - Immutable capture of the grid and cursor
//! - [`Cell`] / [`CellAttrs`] / [`Color`] - The cell model
//! - [`Key`] / [`Modifier`] - Keyboard encoder inputs
//! - [`OutputReader`] - Blocking reader over the emulator's outbound bytes
//!
//! # Example
//!
//! ```
//! use termhost::vterm::{Pos, Vt};
//!
//! let vt = Vt::new(2, 10);
//! vt.write(b"hi").ok();
//! let cell = vt.cell(Pos::new(0, 0));
//! assert_eq!(cell.map(|c| c.runes), Some(vec!['h']));
//! ```

mod cell;
mod color;
mod keyboard;
mod output;
mod parser;
mod screen;
mod screenshot;

pub use cell::{Baseline, Cell, CellAttrs, CursorShape, Dhl, Underline};
pub use color::{Color, ColorType};
pub use keyboard::{Key, Modifier};
pub use output::OutputReader;
pub use screenshot::{Pos, ScreenShot};

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Error;
use output::OutputPipe;
use parser::Parser;
use screen::Screen;

/// Largest write the emulator accepts in one call.
const MAX_INPUT_LEN: usize = isize::MAX as usize;

struct Inner {
    parser: Parser,
    screen: Screen,
}

/// A virtual terminal: parser, screen grid, and keyboard encoder.
///
/// All methods take `&self`; state is guarded by an internal mutex so the
/// emulator can be shared between the PTY input pump and request handlers.
pub struct Vt {
    inner: Mutex<Inner>,
    out: Arc<OutputPipe>,
}

impl Vt {
    /// Create an emulator with the given grid size. Values below 1 are
    /// clamped up.
    pub fn new(rows: u16, cols: u16) -> Self {
        let out = Arc::new(OutputPipe::default());
        let screen = Screen::new(usize::from(rows.max(1)), usize::from(cols.max(1)), Arc::clone(&out));
        Self {
            inner: Mutex::new(Inner {
                parser: Parser::new(),
                screen,
            }),
            out,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(err) => panic!("emulator state poisoned: {err}"),
        }
    }

    /// Feed bytes from the child into the parser.
    ///
    /// Consumes the whole slice or, past the platform input ceiling, rejects
    /// the write without touching any state.
    pub fn write(&self, bytes: &[u8]) -> Result<usize, Error> {
        if bytes.len() > MAX_INPUT_LEN {
            return Err(Error::InputTooLarge);
        }

        let mut inner = self.lock();
        let Inner { parser, screen } = &mut *inner;
        for &byte in bytes {
            parser.advance(screen, byte);
        }
        Ok(bytes.len())
    }

    /// Blocking reader over bytes the emulator wants to send to the child
    /// (query responses and keyboard encodings).
    pub fn output(&self) -> OutputReader {
        OutputReader::new(Arc::clone(&self.out))
    }

    /// Signal end of stream to [`Vt::output`] readers. Later keyboard and
    /// query output is discarded.
    pub fn close_output(&self) {
        self.out.close();
    }

    /// The cell at `pos`, or `None` when the position is outside the grid.
    pub fn cell(&self, pos: Pos) -> Option<Cell> {
        self.lock().screen.cell(pos)
    }

    /// Snapshot the whole grid plus cursor state.
    pub fn capture(&self) -> ScreenShot {
        self.lock().screen.capture()
    }

    /// Like [`Vt::capture`], with every color resolved to concrete RGB.
    pub fn capture_rgb(&self) -> ScreenShot {
        self.lock().screen.capture_rgb()
    }

    /// Resize the grid; values below 1 are clamped up. With reflow enabled,
    /// soft-wrapped text re-wraps to the new width.
    pub fn set_size(&self, rows: u16, cols: u16) {
        self.lock()
            .screen
            .set_size(usize::from(rows.max(1)), usize::from(cols.max(1)));
    }

    /// Current grid size as `(rows, cols)`.
    pub fn size(&self) -> (u16, u16) {
        let (rows, cols) = self.lock().screen.size();
        (rows as u16, cols as u16)
    }

    /// Set what the default foreground and background resolve to. The
    /// default markers are applied to the stored colors.
    pub fn set_default_color(&self, fg: Color, bg: Color) {
        self.lock().screen.set_default_color(fg, bg);
    }

    /// Override one of the sixteen ANSI palette entries. Higher indices
    /// follow the fixed cube/grayscale layout and cannot be overridden.
    pub fn set_palette_color(&self, idx: u8, color: Color) {
        self.lock().screen.set_palette_color(idx, color);
    }

    /// Resolve an indexed or default-marked color through the current
    /// palette and default settings.
    pub fn convert_color_to_rgb(&self, color: Color) -> Color {
        self.lock().screen.convert_to_rgb(color)
    }

    /// Allow or forbid alt-screen switching by the child.
    pub fn set_altscreen(&self, enabled: bool) {
        self.lock().screen.set_altscreen(enabled);
    }

    /// Enable re-wrapping of soft-wrapped text on resize.
    pub fn set_reflow(&self, enabled: bool) {
        self.lock().screen.set_reflow(enabled);
    }

    pub fn set_utf8(&self, enabled: bool) {
        self.lock().screen.set_utf8(enabled);
    }

    pub fn utf8(&self) -> bool {
        self.lock().screen.utf8()
    }

    /// Queue the encoding of a printable rune with modifiers.
    pub fn keyboard_rune(&self, c: char, modifier: Modifier) {
        // The lock serializes concurrent keyboard calls so output bytes
        // appear in acquisition order.
        let _guard = self.lock();
        keyboard::encode_rune(&self.out, c, modifier);
    }

    /// Queue the encoding of a named key with modifiers.
    pub fn keyboard_key(&self, key: Key, modifier: Modifier) {
        let inner = self.lock();
        keyboard::encode_key(&self.out, inner.screen.input_modes, key, modifier);
    }
}
