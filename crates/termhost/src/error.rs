//! Error taxonomy for the terminal host.
//!
//! Every recoverable failure is a variant of [`Error`] and is returned as a
//! value. Contract violations (double close, pump I/O failures that are not
//! the closed condition) are not represented here; they abort the process.

use crate::pty::Size;

/// Boxed source error carried by PTY-layer variants.
pub type Source = Box<dyn std::error::Error + Send + Sync>;

/// Expected errors surfaced by the emulator, the PTY layer, and the codec.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An emulator write larger than the platform input ceiling.
    #[error("input data too large")]
    InputTooLarge,

    /// A window size outside the platform's valid range.
    #[error("attempt to set invalid terminal winsize ({}, {})", .size.row, .size.col)]
    InvalidSize {
        /// The rejected size.
        size: Size,
    },

    /// The keyboard encoder rejected the key or rune.
    #[error("invalid key")]
    InvalidKey,

    /// Operation on a resource that has been closed.
    #[error("terminal is closed")]
    Closed,

    /// The platform failed to allocate a PTY pair.
    #[error("failed to open terminal")]
    TerminalOpen(#[source] Source),

    /// The platform failed to bind a session to the PTY slave.
    #[error("failed to open session")]
    SessionOpen(#[source] Source),

    /// The child process could not be started on the session.
    #[error("failed to start process")]
    StartProcess(#[source] Source),

    /// An I/O failure on the PTY byte stream.
    #[error("pty i/o failed")]
    Io(#[from] std::io::Error),

    /// A malformed snapshot encoding.
    #[error("malformed snapshot encoding")]
    Codec,
}

impl Error {
    /// Whether this error is the closed condition, which pump loops treat as
    /// orderly shutdown rather than a fault.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}
