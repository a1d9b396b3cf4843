// Test module - relaxed lint rules
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

//! Keyboard encoder: byte-exact sequences for runes and named keys.

use std::io::Read;

use termhost::vterm::{Key, Modifier, Vt};

fn rune_bytes(setup: &[u8], c: char, modifier: Modifier) -> Vec<u8> {
    let vt = Vt::new(30, 120);
    vt.write(setup).unwrap();
    vt.keyboard_rune(c, modifier);
    vt.close_output();

    let mut out = Vec::new();
    vt.output().read_to_end(&mut out).unwrap();
    out
}

fn key_bytes(setup: &[u8], key: Key, modifier: Modifier) -> Vec<u8> {
    let vt = Vt::new(30, 120);
    vt.write(setup).unwrap();
    vt.keyboard_key(key, modifier);
    vt.close_output();

    let mut out = Vec::new();
    vt.output().read_to_end(&mut out).unwrap();
    out
}

// =============================================================================
// Runes
// =============================================================================

#[test]
fn plain_rune_is_utf8() {
    assert_eq!(rune_bytes(b"", ' ', Modifier::empty()), b" ");
    assert_eq!(rune_bytes(b"", 'a', Modifier::empty()), b"a");
    assert_eq!(rune_bytes(b"", 'あ', Modifier::empty()), "あ".as_bytes());
}

#[test]
fn shift_space_uses_csi_u() {
    assert_eq!(rune_bytes(b"", ' ', Modifier::SHIFT), b"\x1B[32;2u");
}

#[test]
fn alt_rune_gets_escape_prefix() {
    assert_eq!(rune_bytes(b"", ' ', Modifier::ALT), b"\x1B ");
    assert_eq!(rune_bytes(b"", 'x', Modifier::ALT), b"\x1Bx");
}

#[test]
fn ctrl_folds_to_c0() {
    assert_eq!(rune_bytes(b"", ' ', Modifier::CTRL), b"\x00");
    assert_eq!(rune_bytes(b"", 'a', Modifier::CTRL), b"\x01");
    assert_eq!(rune_bytes(b"", 'z', Modifier::CTRL), b"\x1A");
}

#[test]
fn ctrl_collisions_use_csi_u() {
    // Ctrl-i/j/m/[ would collide with Tab, LF, CR, ESC.
    assert_eq!(rune_bytes(b"", 'i', Modifier::CTRL), b"\x1B[105;5u");
    assert_eq!(rune_bytes(b"", 'j', Modifier::CTRL), b"\x1B[106;5u");
    assert_eq!(rune_bytes(b"", 'm', Modifier::CTRL), b"\x1B[109;5u");
    assert_eq!(rune_bytes(b"", '[', Modifier::CTRL), b"\x1B[91;5u");
}

#[test]
fn ctrl_backslash_family_stays_c0() {
    assert_eq!(rune_bytes(b"", '\\', Modifier::CTRL), b"\x1C");
    assert_eq!(rune_bytes(b"", ']', Modifier::CTRL), b"\x1D");
    assert_eq!(rune_bytes(b"", '^', Modifier::CTRL), b"\x1E");
    assert_eq!(rune_bytes(b"", '_', Modifier::CTRL), b"\x1F");
}

#[test]
fn shift_is_dropped_for_plain_runes() {
    assert_eq!(rune_bytes(b"", 'A', Modifier::SHIFT), b"A");
}

#[test]
fn ctrl_alt_combines_prefix_and_fold() {
    assert_eq!(
        rune_bytes(b"", 'a', Modifier::CTRL | Modifier::ALT),
        b"\x1B\x01"
    );
}

#[test]
fn ctrl_uppercase_uses_csi_u() {
    assert_eq!(rune_bytes(b"", 'A', Modifier::CTRL), b"\x1B[65;5u");
}

// =============================================================================
// Named keys
// =============================================================================

#[test]
fn enter_variants() {
    assert_eq!(key_bytes(b"", Key::Enter, Modifier::empty()), b"\r");
    assert_eq!(key_bytes(b"", Key::Enter, Modifier::SHIFT), b"\x1B[13;2u");
    assert_eq!(key_bytes(b"", Key::Enter, Modifier::ALT), b"\x1B\r");
    assert_eq!(key_bytes(b"", Key::Enter, Modifier::CTRL), b"\x1B[13;5u");
}

#[test]
fn enter_in_newline_mode_sends_crlf() {
    assert_eq!(key_bytes(b"\x1B[20h", Key::Enter, Modifier::empty()), b"\r\n");
}

#[test]
fn tab_variants() {
    assert_eq!(key_bytes(b"", Key::Tab, Modifier::empty()), b"\t");
    assert_eq!(key_bytes(b"", Key::Tab, Modifier::SHIFT), b"\x1B[Z");
    assert_eq!(key_bytes(b"", Key::Tab, Modifier::ALT), b"\x1B\t");
    assert_eq!(
        key_bytes(b"", Key::Tab, Modifier::SHIFT | Modifier::CTRL),
        b"\x1B[1;6Z"
    );
}

#[test]
fn backspace_and_escape() {
    assert_eq!(key_bytes(b"", Key::Backspace, Modifier::empty()), b"\x7F");
    assert_eq!(key_bytes(b"", Key::Backspace, Modifier::ALT), b"\x1B\x7F");
    assert_eq!(key_bytes(b"", Key::Backspace, Modifier::CTRL), b"\x1B[127;5u");
    assert_eq!(key_bytes(b"", Key::Escape, Modifier::empty()), b"\x1B");
}

#[test]
fn arrows_without_modifiers() {
    assert_eq!(key_bytes(b"", Key::Up, Modifier::empty()), b"\x1B[A");
    assert_eq!(key_bytes(b"", Key::Down, Modifier::empty()), b"\x1B[B");
    assert_eq!(key_bytes(b"", Key::Right, Modifier::empty()), b"\x1B[C");
    assert_eq!(key_bytes(b"", Key::Left, Modifier::empty()), b"\x1B[D");
}

#[test]
fn arrows_with_modifiers() {
    assert_eq!(key_bytes(b"", Key::Up, Modifier::SHIFT), b"\x1B[1;2A");
    assert_eq!(key_bytes(b"", Key::Left, Modifier::CTRL), b"\x1B[1;5D");
}

#[test]
fn arrows_in_application_mode_use_ss3() {
    assert_eq!(key_bytes(b"\x1B[?1h", Key::Up, Modifier::empty()), b"\x1BOA");
    // Modifiers fall back to the CSI form.
    assert_eq!(key_bytes(b"\x1B[?1h", Key::Up, Modifier::SHIFT), b"\x1B[1;2A");
}

#[test]
fn editing_keys() {
    assert_eq!(key_bytes(b"", Key::Insert, Modifier::empty()), b"\x1B[2~");
    assert_eq!(key_bytes(b"", Key::Delete, Modifier::empty()), b"\x1B[3~");
    assert_eq!(key_bytes(b"", Key::Home, Modifier::empty()), b"\x1B[H");
    assert_eq!(key_bytes(b"", Key::End, Modifier::empty()), b"\x1B[F");
    assert_eq!(key_bytes(b"", Key::PageUp, Modifier::empty()), b"\x1B[5~");
    assert_eq!(key_bytes(b"", Key::PageDown, Modifier::empty()), b"\x1B[6~");
    assert_eq!(key_bytes(b"", Key::Delete, Modifier::SHIFT), b"\x1B[3;2~");
}

#[test]
fn function_keys() {
    assert_eq!(key_bytes(b"", Key::Function(1), Modifier::empty()), b"\x1BOP");
    assert_eq!(key_bytes(b"", Key::Function(4), Modifier::empty()), b"\x1BOS");
    assert_eq!(key_bytes(b"", Key::Function(5), Modifier::empty()), b"\x1B[15~");
    assert_eq!(key_bytes(b"", Key::Function(12), Modifier::empty()), b"\x1B[24~");
    assert_eq!(key_bytes(b"", Key::Function(1), Modifier::CTRL), b"\x1B[1;5P");
    assert_eq!(key_bytes(b"", Key::Function(5), Modifier::CTRL), b"\x1B[15;5~");
}

#[test]
fn unknown_function_numbers_are_no_ops() {
    assert_eq!(key_bytes(b"", Key::Function(0), Modifier::empty()), b"");
    assert_eq!(key_bytes(b"", Key::Function(13), Modifier::empty()), b"");
}

#[test]
fn keypad_literal_mode() {
    assert_eq!(key_bytes(b"", Key::Kp0, Modifier::empty()), b"0");
    assert_eq!(key_bytes(b"", Key::Kp9, Modifier::empty()), b"9");
    assert_eq!(key_bytes(b"", Key::KpMult, Modifier::empty()), b"*");
    assert_eq!(key_bytes(b"", Key::KpEnter, Modifier::empty()), b"\r");
    assert_eq!(key_bytes(b"", Key::KpEqual, Modifier::empty()), b"=");
}

#[test]
fn keypad_application_mode_uses_ss3() {
    assert_eq!(key_bytes(b"\x1B=", Key::Kp0, Modifier::empty()), b"\x1BOp");
    assert_eq!(key_bytes(b"\x1B=", Key::Kp9, Modifier::empty()), b"\x1BOy");
    assert_eq!(key_bytes(b"\x1B=", Key::KpEnter, Modifier::empty()), b"\x1BOM");
    // ESC > leaves application mode again.
    assert_eq!(key_bytes(b"\x1B=\x1B>", Key::Kp0, Modifier::empty()), b"0");
}

// =============================================================================
// Output stream semantics
// =============================================================================

#[test]
fn keyboard_bytes_preserve_program_order() {
    let vt = Vt::new(30, 120);
    vt.keyboard_rune('a', Modifier::empty());
    vt.keyboard_rune('b', Modifier::empty());
    vt.close_output();

    let mut out = Vec::new();
    vt.output().read_to_end(&mut out).unwrap();
    assert_eq!(out, b"ab");
}

#[test]
fn keyboard_after_close_is_dropped() {
    let vt = Vt::new(30, 120);
    vt.close_output();
    vt.keyboard_rune('a', Modifier::empty());

    let mut buf = [0u8; 8];
    let n = vt.output().read(&mut buf).unwrap();
    assert_eq!(n, 0);
}
