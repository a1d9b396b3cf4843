//! The single-tenant terminal slot and the wire form of key events.

use std::sync::{Mutex, MutexGuard};

use tracing::info;

use crate::error::Error;
use crate::term::{Term, TermConfig};
use crate::vterm::{Key as VtKey, Modifier, ScreenShot};

/// A key event as it arrives on the wire: either the name of a
/// non-printable key (`Enter`, `ArrowUp`, `KP+`, ...) or a single Unicode
/// scalar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Key(String);

impl Key {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token as a single rune, when it is exactly one.
    pub fn rune(&self) -> Option<char> {
        let mut chars = self.0.chars();
        match (chars.next(), chars.next()) {
            (Some(rune), None) => Some(rune),
            _ => None,
        }
    }

    /// The token as a named key, when it is one.
    pub fn vt_key(&self) -> Option<VtKey> {
        let key = match self.0.as_str() {
            "Enter" => VtKey::Enter,
            "Tab" => VtKey::Tab,
            "Backspace" => VtKey::Backspace,
            "Escape" => VtKey::Escape,
            "ArrowUp" => VtKey::Up,
            "ArrowDown" => VtKey::Down,
            "ArrowLeft" => VtKey::Left,
            "ArrowRight" => VtKey::Right,
            "Insert" => VtKey::Insert,
            "Delete" => VtKey::Delete,
            "Home" => VtKey::Home,
            "End" => VtKey::End,
            "PageUp" => VtKey::PageUp,
            "PageDown" => VtKey::PageDown,
            "F1" => VtKey::Function(1),
            "F2" => VtKey::Function(2),
            "F3" => VtKey::Function(3),
            "F4" => VtKey::Function(4),
            "F5" => VtKey::Function(5),
            "F6" => VtKey::Function(6),
            "F7" => VtKey::Function(7),
            "F8" => VtKey::Function(8),
            "F9" => VtKey::Function(9),
            "F10" => VtKey::Function(10),
            "F11" => VtKey::Function(11),
            "F12" => VtKey::Function(12),
            "KP0" => VtKey::Kp0,
            "KP1" => VtKey::Kp1,
            "KP2" => VtKey::Kp2,
            "KP3" => VtKey::Kp3,
            "KP4" => VtKey::Kp4,
            "KP5" => VtKey::Kp5,
            "KP6" => VtKey::Kp6,
            "KP7" => VtKey::Kp7,
            "KP8" => VtKey::Kp8,
            "KP9" => VtKey::Kp9,
            "KP*" => VtKey::KpMult,
            "KP+" => VtKey::KpPlus,
            "KP," => VtKey::KpComma,
            "KP-" => VtKey::KpMinus,
            "KP." => VtKey::KpPeriod,
            "KP/" => VtKey::KpDivide,
            "KPEnter" => VtKey::KpEnter,
            "KP=" => VtKey::KpEqual,
            _ => return None,
        };
        Some(key)
    }
}

/// Single-tenant holder of at most one [`Term`], started on demand.
///
/// Every operation holds the slot mutex for its whole duration, so
/// keyboard, capture, and stop serialize with each other and start/stop is
/// atomic.
pub struct TermSlot {
    cfg: TermConfig,
    term: Mutex<Option<Term>>,
}

impl TermSlot {
    pub fn new(cfg: TermConfig) -> Self {
        Self {
            cfg,
            term: Mutex::new(None),
        }
    }

    /// Deliver a key event, starting the terminal first if none is running.
    pub fn keyboard(&self, key: &Key, modifier: Modifier) -> Result<(), Error> {
        let mut guard = self.lock();
        self.ensure_started(&mut guard)?;
        let Some(term) = guard.as_ref() else {
            return Err(Error::Closed);
        };

        if term.keyboard(key, modifier) {
            Ok(())
        } else {
            Err(Error::InvalidKey)
        }
    }

    /// Snapshot the screen, starting the terminal first if none is running.
    pub fn capture(&self) -> Result<ScreenShot, Error> {
        let mut guard = self.lock();
        self.ensure_started(&mut guard)?;
        let Some(term) = guard.as_ref() else {
            return Err(Error::Closed);
        };

        Ok(term.capture())
    }

    /// Close and clear the current terminal, if any.
    pub fn stop(&self) {
        let mut guard = self.lock();
        if let Some(term) = guard.take() {
            term.close();
            info!(id = %term.id(), "terminal session stopped");
        }
    }

    fn ensure_started(&self, guard: &mut Option<Term>) -> Result<(), Error> {
        if guard.is_none() {
            *guard = Some(Term::new(self.cfg.clone())?);
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Term>> {
        match self.term.lock() {
            Ok(guard) => guard,
            Err(err) => panic!("term slot poisoned: {err}"),
        }
    }
}

impl Drop for TermSlot {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_as_single_rune() {
        assert_eq!(Key::new("A").rune(), Some('A'));
        assert_eq!(Key::new("あ").rune(), Some('あ'));
        assert_eq!(Key::new("\u{FFFD}").rune(), Some('\u{FFFD}'));
        assert_eq!(Key::new("").rune(), None);
        assert_eq!(Key::new("AA").rune(), None);
    }

    #[test]
    fn key_as_named_key() {
        assert_eq!(Key::new("Enter").vt_key(), Some(VtKey::Enter));
        assert_eq!(Key::new("ArrowUp").vt_key(), Some(VtKey::Up));
        assert_eq!(Key::new("F12").vt_key(), Some(VtKey::Function(12)));
        assert_eq!(Key::new("KP=").vt_key(), Some(VtKey::KpEqual));
        assert_eq!(Key::new("").vt_key(), None);
        assert_eq!(Key::new("enter").vt_key(), None);
    }
}
