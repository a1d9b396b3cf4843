//! Platform PTY abstraction.
//!
//! The core consumes PTYs through a small capability set: a [`Terminal`] is
//! the master side of the pair, a [`Session`] binds the slave side with a
//! window size and can start the child process, and a [`Child`] is the
//! running process handle. The native implementation rides on
//! `portable-pty` (Unix PTY or Windows ConPTY); tests substitute the
//! in-memory [`MockTerminal`] through the same constructor-function seam.

pub mod mock;
mod native;

pub use mock::{MockComputer, MockFailures, MockTerminal};

use std::sync::Arc;

use crate::error::Error;

/// A window size in character cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Size {
    pub row: u16,
    pub col: u16,
}

/// Largest dimension the platform accepts.
#[cfg(windows)]
pub const MAX_DIM: u16 = 0x7FFF;
/// Largest dimension the platform accepts.
#[cfg(not(windows))]
pub const MAX_DIM: u16 = u16::MAX;

impl Size {
    pub fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }

    /// Reject sizes outside the platform's valid range.
    pub fn validate(self) -> Result<(), Error> {
        if !(1..=MAX_DIM).contains(&self.row) || !(1..=MAX_DIM).contains(&self.col) {
            return Err(Error::InvalidSize { size: self });
        }
        Ok(())
    }
}

/// A command to start on the slave side of a PTY.
///
/// `args` does not repeat the program path; the platform passes `path` as
/// the zeroth argument itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cmd {
    pub path: String,
    pub args: Vec<String>,
}

/// The master side of a PTY pair.
///
/// Implementations are shared between the pump threads and the session
/// owner, so every method takes `&self`. `read` blocks until bytes arrive or
/// the terminal is closed, in which case it returns [`Error::Closed`].
pub trait Terminal: Send + Sync {
    fn read(&self, buf: &mut [u8]) -> Result<usize, Error>;
    fn write(&self, buf: &[u8]) -> Result<usize, Error>;
    /// Bind a session to the slave side with the given initial window size.
    fn session(&self, size: Size) -> Result<Box<dyn Session>, Error>;
    /// Release both ends of the pair. Unblocks pending reads.
    fn close(&self) -> Result<(), Error>;
}

/// A session binding the PTY slave: window size control and child startup.
pub trait Session: Send + Sync {
    /// Spawn the child attached to the slave as its controlling terminal.
    fn start_process(&self, cmd: &Cmd) -> Result<Box<dyn Child>, Error>;
    fn get_size(&self) -> Result<Size, Error>;
    fn set_size(&self, size: Size) -> Result<(), Error>;
    /// Release session resources. On Windows this closes the pseudo-console.
    fn close(&self) -> Result<(), Error>;
}

/// A running child process.
pub trait Child: Send {
    /// Poll for exit; `Some(code)` once the process has been reaped.
    fn try_wait(&mut self) -> Result<Option<u32>, Error>;
    fn kill(&mut self) -> Result<(), Error>;
    fn process_id(&self) -> Option<u32>;
}

/// Constructor seam for the PTY implementation; tests plug the mock in here.
pub type OpenFn = Arc<dyn Fn() -> Result<Arc<dyn Terminal>, Error> + Send + Sync>;

/// Allocate a native PTY pair.
pub fn open() -> Result<Arc<dyn Terminal>, Error> {
    native::open()
}
