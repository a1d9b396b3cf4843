//! Snapshot wire encoding.
//!
//! A [`crate::vterm::ScreenShot`] serializes to a deterministic
//! little-endian byte layout: cursor fields, stride, then every cell in
//! row-major order with a fixed attribute ordering. The transport forbids
//! embedded NUL, so the encoded buffer is passed through a two-character
//! escape ([`escape_zero`]) before the signature is prepended.

use crate::error::Error;
use crate::vterm::{Cell, Color, ScreenShot};

/// Leading signature of the `/screen` response body.
pub const SIGNATURE: &[u8; 8] = b"%SWTSCRN";

/// Serialize a snapshot to its raw (unescaped) wire layout.
pub fn encode_screenshot(shot: &ScreenShot) -> Vec<u8> {
    let mut buf = Vec::new();

    push_bool(&mut buf, shot.cursor_visible);
    push_bool(&mut buf, shot.cursor_blink);
    buf.push(shot.cursor_shape as u8);
    push_i64(&mut buf, shot.cursor_pos.row);
    push_i64(&mut buf, shot.cursor_pos.col);

    let (rows, cols) = shot.size();
    push_i64(&mut buf, cols);
    for row in 0..rows {
        for col in 0..cols {
            let cell = shot.at(crate::vterm::Pos::new(row, col));
            encode_cell(&mut buf, &cell);
        }
    }

    buf
}

/// The full HTTP body: signature plus the zero-escaped encoding.
pub fn encode_screen_body(shot: &ScreenShot) -> Vec<u8> {
    let mut body = SIGNATURE.to_vec();
    body.extend_from_slice(&escape_zero(&encode_screenshot(shot)));
    body
}

fn encode_cell(buf: &mut Vec<u8>, cell: &Cell) {
    push_bool(buf, cell.attrs.bold);
    buf.push(cell.attrs.underline as u8);
    push_bool(buf, cell.attrs.italic);
    push_bool(buf, cell.attrs.blink);
    push_bool(buf, cell.attrs.reverse);
    push_bool(buf, cell.attrs.conceal);
    push_bool(buf, cell.attrs.strike);
    buf.push(cell.attrs.font);
    push_bool(buf, cell.attrs.dwl);
    buf.push(cell.attrs.dhl as u8);
    push_bool(buf, cell.attrs.small);
    buf.push(cell.attrs.baseline as u8);

    encode_color(buf, cell.fg);
    encode_color(buf, cell.bg);

    buf.push(cell.width);
    let runes: String = cell.runes.iter().collect();
    push_i64(buf, runes.len() as i64);
    buf.extend_from_slice(runes.as_bytes());
}

fn encode_color(buf: &mut Vec<u8>, color: Color) {
    buf.push(color.ty.bits());

    let mut channels = [0u8; 3];
    if color.is_indexed() {
        channels[0] = color.idx;
    } else {
        channels = [color.red, color.green, color.blue];
    }
    buf.extend_from_slice(&channels);
}

fn push_bool(buf: &mut Vec<u8>, value: bool) {
    buf.push(u8::from(value));
}

fn push_i64(buf: &mut Vec<u8>, value: i64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Escape NUL and backslash so the buffer carries no zero bytes:
/// `0x00` becomes `\0` and `\` becomes `\\`.
pub fn escape_zero(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            0x00 => out.extend_from_slice(b"\\0"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            _ => out.push(byte),
        }
    }
    out
}

/// Invert [`escape_zero`]. Dangling or unknown escapes are malformed.
pub fn unescape_zero(bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter();
    while let Some(&byte) = iter.next() {
        if byte != b'\\' {
            out.push(byte);
            continue;
        }
        match iter.next() {
            Some(b'0') => out.push(0x00),
            Some(b'\\') => out.push(b'\\'),
            _ => return Err(Error::Codec),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_removes_every_zero_byte() {
        let escaped = escape_zero(&[0x00, b'a', b'\\', 0x00]);
        assert_eq!(escaped, b"\\0a\\\\\\0");
        assert!(!escaped.contains(&0x00));
    }

    #[test]
    fn escape_round_trips() {
        let cases: [&[u8]; 4] = [b"", b"plain", b"\x00\x5C\x00", b"mixed\\data\x00end"];
        for case in cases {
            let back = unescape_zero(&escape_zero(case));
            assert_eq!(back.ok().as_deref(), Some(case));
        }
    }

    #[test]
    fn unescape_rejects_malformed_input() {
        assert!(unescape_zero(b"\\").is_err());
        assert!(unescape_zero(b"\\x").is_err());
    }
}
