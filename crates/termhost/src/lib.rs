//! Termhost: a headless terminal host.
//!
//! This crate hosts a single interactive child process on a pseudo-terminal,
//! interprets its byte stream with an in-crate VT100/ECMA-48 emulator, and
//! exposes the resulting screen as immutable, serializable snapshots. Keyboard
//! events travel the other way: they are encoded into the byte sequences the
//! child expects and written back to the PTY.
//!
//! # Key Types
//!
//! - [`vterm::Vt`] - The terminal emulator: byte-stream parser, screen grid,
//!   and keyboard encoder
//! - [`pty::Terminal`] / [`pty::Session`] - The platform PTY capability set
//!   (native or in-memory mock)
//! - [`term::Term`] - One running terminal session: PTY, child process,
//!   emulator, and the two byte pumps wiring them together
//! - [`term::TermSlot`] - Single-tenant, lazily-started holder of a [`term::Term`]
//!
//! # Key Operations
//!
//! - [`term::TermSlot::keyboard`] - Deliver a key event, starting the session
//!   on first use
//! - [`term::TermSlot::capture`] - Snapshot the screen, starting the session
//!   on first use
//! - [`term::TermSlot::stop`] - Tear the session down
//! - [`codec::encode_screen_body`] - Serialize a snapshot for the wire

#![forbid(unsafe_code)]
// Library documentation is in progress. Public API types have docs;
// internal types will be documented in future releases.
#![allow(missing_docs)]

pub mod codec;
pub mod error;
pub mod pty;
pub mod term;
pub mod vterm;

pub use crate::error::Error;
