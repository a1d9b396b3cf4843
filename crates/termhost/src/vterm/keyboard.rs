//! Keyboard encoder: (key, modifiers) to the byte sequences a child process
//! expects on its input.
//!
//! The mapping reproduces the encoding of widely deployed pseudoterminal
//! emulators bit for bit: plain runes as UTF-8, Alt as an ESC prefix, Ctrl
//! folded onto the C0 range where representable, and the CSI-u form for
//! every combination with no classic representation.

use bitflags::bitflags;

use crate::vterm::output::OutputPipe;

bitflags! {
    /// Keyboard modifier set.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifier: u8 {
        const SHIFT = 1 << 0;
        const ALT = 1 << 1;
        const CTRL = 1 << 2;
    }
}

/// A named (non-printable) key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Backspace,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    /// Function key F1..=F12; other numbers encode nothing.
    Function(u8),
    Kp0,
    Kp1,
    Kp2,
    Kp3,
    Kp4,
    Kp5,
    Kp6,
    Kp7,
    Kp8,
    Kp9,
    KpMult,
    KpPlus,
    KpComma,
    KpMinus,
    KpPeriod,
    KpDivide,
    KpEnter,
    KpEqual,
}

/// Terminal modes that change how keys are encoded.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct InputModes {
    /// DECCKM: cursor keys send SS3 sequences.
    pub cursor_keys: bool,
    /// DECKPAM: keypad sends application sequences.
    pub keypad_app: bool,
    /// LNM: Enter sends CR LF.
    pub newline: bool,
}

const ESC: u8 = 0x1B;

/// Encode a printable rune with modifiers.
pub(crate) fn encode_rune(out: &OutputPipe, c: char, modifier: Modifier) {
    let mut modifier = modifier;

    // Shift never matters for a rune that already names its shifted form,
    // with Space as the lone exception.
    if c != ' ' {
        modifier.remove(Modifier::SHIFT);
    }

    if modifier.is_empty() {
        let mut buf = [0u8; 4];
        out.write(c.encode_utf8(&mut buf).as_bytes());
        return;
    }

    let needs_csi_u = match c {
        // Ctrl forms of these collide with Tab, LF, CR, and ESC.
        'i' | 'j' | 'm' | '[' => true,
        // Ctrl-\ ] ^ _ have classic C0 encodings.
        '\\' | ']' | '^' | '_' => false,
        ' ' => modifier.contains(Modifier::SHIFT),
        _ => !c.is_ascii_lowercase(),
    };

    if needs_csi_u && modifier.intersects(Modifier::SHIFT | Modifier::CTRL) {
        write_csi_u(out, u32::from(c), modifier);
        return;
    }

    let c = if modifier.contains(Modifier::CTRL) {
        char::from((u32::from(c) & 0x1F) as u8)
    } else {
        c
    };

    let mut seq = Vec::with_capacity(5);
    if modifier.contains(Modifier::ALT) {
        seq.push(ESC);
    }
    let mut buf = [0u8; 4];
    seq.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    out.write(&seq);
}

/// Encode a named key with modifiers. Unknown function numbers are no-ops.
pub(crate) fn encode_key(out: &OutputPipe, modes: InputModes, key: Key, modifier: Modifier) {
    let modifier = modifier & (Modifier::SHIFT | Modifier::ALT | Modifier::CTRL);

    match key {
        Key::Enter => {
            if modes.newline {
                out.write(b"\r\n");
            } else {
                write_literal(out, b'\r', modifier);
            }
        }
        Key::Tab => {
            if modifier == Modifier::SHIFT {
                out.write(b"\x1B[Z");
            } else if modifier.contains(Modifier::SHIFT) {
                out.write(format!("\x1B[1;{}Z", modifier.bits() + 1).as_bytes());
            } else {
                write_literal(out, b'\t', modifier);
            }
        }
        Key::Backspace => write_literal(out, 0x7F, modifier),
        Key::Escape => write_literal(out, ESC, modifier),
        Key::Up => write_cursor(out, modes, b'A', modifier),
        Key::Down => write_cursor(out, modes, b'B', modifier),
        Key::Left => write_cursor(out, modes, b'D', modifier),
        Key::Right => write_cursor(out, modes, b'C', modifier),
        Key::Home => write_cursor(out, modes, b'H', modifier),
        Key::End => write_cursor(out, modes, b'F', modifier),
        Key::Insert => write_csi_num(out, 2, modifier),
        Key::Delete => write_csi_num(out, 3, modifier),
        Key::PageUp => write_csi_num(out, 5, modifier),
        Key::PageDown => write_csi_num(out, 6, modifier),
        Key::Function(n) => match n {
            1..=4 => write_ss3(out, b'P' + (n - 1), modifier),
            5 => write_csi_num(out, 15, modifier),
            6 => write_csi_num(out, 17, modifier),
            7 => write_csi_num(out, 18, modifier),
            8 => write_csi_num(out, 19, modifier),
            9 => write_csi_num(out, 20, modifier),
            10 => write_csi_num(out, 21, modifier),
            11 => write_csi_num(out, 23, modifier),
            12 => write_csi_num(out, 24, modifier),
            _ => {}
        },
        Key::Kp0 => write_keypad(out, modes, b'0', b'p', modifier),
        Key::Kp1 => write_keypad(out, modes, b'1', b'q', modifier),
        Key::Kp2 => write_keypad(out, modes, b'2', b'r', modifier),
        Key::Kp3 => write_keypad(out, modes, b'3', b's', modifier),
        Key::Kp4 => write_keypad(out, modes, b'4', b't', modifier),
        Key::Kp5 => write_keypad(out, modes, b'5', b'u', modifier),
        Key::Kp6 => write_keypad(out, modes, b'6', b'v', modifier),
        Key::Kp7 => write_keypad(out, modes, b'7', b'w', modifier),
        Key::Kp8 => write_keypad(out, modes, b'8', b'x', modifier),
        Key::Kp9 => write_keypad(out, modes, b'9', b'y', modifier),
        Key::KpMult => write_keypad(out, modes, b'*', b'j', modifier),
        Key::KpPlus => write_keypad(out, modes, b'+', b'k', modifier),
        Key::KpComma => write_keypad(out, modes, b',', b'l', modifier),
        Key::KpMinus => write_keypad(out, modes, b'-', b'm', modifier),
        Key::KpPeriod => write_keypad(out, modes, b'.', b'n', modifier),
        Key::KpDivide => write_keypad(out, modes, b'/', b'o', modifier),
        Key::KpEnter => write_keypad(out, modes, b'\r', b'M', modifier),
        Key::KpEqual => write_keypad(out, modes, b'=', b'X', modifier),
    }
}

fn write_csi_u(out: &OutputPipe, codepoint: u32, modifier: Modifier) {
    out.write(format!("\x1B[{};{}u", codepoint, modifier.bits() + 1).as_bytes());
}

fn write_literal(out: &OutputPipe, literal: u8, modifier: Modifier) {
    if modifier.intersects(Modifier::CTRL | Modifier::SHIFT) {
        write_csi_u(out, u32::from(literal), modifier);
    } else if modifier.contains(Modifier::ALT) {
        out.write(&[ESC, literal]);
    } else {
        out.write(&[literal]);
    }
}

fn write_ss3(out: &OutputPipe, ch: u8, modifier: Modifier) {
    if modifier.is_empty() {
        out.write(&[ESC, b'O', ch]);
    } else {
        write_csi_letter(out, ch, modifier);
    }
}

fn write_csi_letter(out: &OutputPipe, ch: u8, modifier: Modifier) {
    if modifier.is_empty() {
        out.write(&[ESC, b'[', ch]);
    } else {
        out.write(format!("\x1B[1;{}{}", modifier.bits() + 1, char::from(ch)).as_bytes());
    }
}

fn write_csi_num(out: &OutputPipe, num: u16, modifier: Modifier) {
    if modifier.is_empty() {
        out.write(format!("\x1B[{num}~").as_bytes());
    } else {
        out.write(format!("\x1B[{};{}~", num, modifier.bits() + 1).as_bytes());
    }
}

fn write_cursor(out: &OutputPipe, modes: InputModes, ch: u8, modifier: Modifier) {
    if modes.cursor_keys {
        write_ss3(out, ch, modifier);
    } else {
        write_csi_letter(out, ch, modifier);
    }
}

fn write_keypad(out: &OutputPipe, modes: InputModes, literal: u8, app: u8, modifier: Modifier) {
    if modes.keypad_app {
        write_ss3(out, app, modifier);
    } else {
        write_literal(out, literal, modifier);
    }
}
