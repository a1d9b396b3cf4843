//! Byte-oriented control-sequence recognizer.
//!
//! The parser turns the child's byte stream into calls on
//! [`Screen`]: printable characters, C0 controls, and complete
//! ESC/CSI/OSC/DCS sequences. Malformed sequences are discarded up to the
//! next re-sync point (a final byte, CAN, or SUB). UTF-8 decoding happens
//! here when the emulator has UTF-8 mode enabled; invalid sequences become
//! U+FFFD.

use crate::vterm::screen::{Params, Screen, MISSING};

const REPLACEMENT: char = '\u{FFFD}';
const MAX_PARAMS: usize = 16;
const MAX_INTERMEDIATES: usize = 2;
const MAX_PARAM_VALUE: i64 = 65535;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    EscapeIntermediate,
    Csi,
    CsiIgnore,
    Osc,
    OscEscape,
    Dcs,
    DcsEscape,
}

pub(crate) struct Parser {
    state: State,
    intermediates: Vec<u8>,
    params: Params,
    private: Option<u8>,
    utf8_buf: [u8; 4],
    utf8_len: usize,
    utf8_need: usize,
}

impl Parser {
    pub(crate) fn new() -> Self {
        Self {
            state: State::Ground,
            intermediates: Vec::with_capacity(MAX_INTERMEDIATES),
            params: Params::new(),
            private: None,
            utf8_buf: [0; 4],
            utf8_len: 0,
            utf8_need: 0,
        }
    }

    pub(crate) fn advance(&mut self, screen: &mut Screen, byte: u8) {
        match self.state {
            State::Ground => self.ground(screen, byte),
            State::Escape => self.escape(screen, byte),
            State::EscapeIntermediate => self.escape_intermediate(screen, byte),
            State::Csi => self.csi(screen, byte),
            State::CsiIgnore => self.csi_ignore(screen, byte),
            State::Osc => self.string_body(byte, State::OscEscape),
            State::OscEscape => self.string_escape(screen, byte),
            State::Dcs => self.string_body(byte, State::DcsEscape),
            State::DcsEscape => self.string_escape(screen, byte),
        }
    }

    fn enter_escape(&mut self) {
        self.intermediates.clear();
        self.state = State::Escape;
    }

    fn start_csi(&mut self) {
        self.intermediates.clear();
        self.params.clear();
        self.private = None;
        self.state = State::Csi;
    }

    // ------------------------------------------------------------------
    // Ground: text, C0, and UTF-8 accumulation
    // ------------------------------------------------------------------

    fn ground(&mut self, screen: &mut Screen, byte: u8) {
        if self.utf8_need > 0 {
            if (0x80..=0xBF).contains(&byte) {
                self.utf8_buf[self.utf8_len] = byte;
                self.utf8_len += 1;
                if self.utf8_len == self.utf8_need {
                    let ch = std::str::from_utf8(&self.utf8_buf[..self.utf8_len])
                        .ok()
                        .and_then(|s| s.chars().next())
                        .unwrap_or(REPLACEMENT);
                    self.utf8_need = 0;
                    self.utf8_len = 0;
                    screen.print(ch);
                }
                return;
            }
            // The sequence broke off; emit a replacement and reprocess.
            self.utf8_need = 0;
            self.utf8_len = 0;
            screen.print(REPLACEMENT);
        }

        match byte {
            0x1B => self.enter_escape(),
            0x00..=0x1A | 0x1C..=0x1F => screen.control(byte),
            0x20..=0x7E => screen.print(char::from(byte)),
            0x7F => {}
            0x80..=0xFF => {
                if screen.utf8() {
                    self.start_utf8(screen, byte);
                } else if byte <= 0x9F {
                    self.c1(screen, byte);
                } else {
                    screen.print(char::from(byte));
                }
            }
        }
    }

    fn start_utf8(&mut self, screen: &mut Screen, byte: u8) {
        let need = if byte & 0xE0 == 0xC0 {
            2
        } else if byte & 0xF0 == 0xE0 {
            3
        } else if byte & 0xF8 == 0xF0 {
            4
        } else {
            0
        };
        if need == 0 {
            screen.print(REPLACEMENT);
        } else {
            self.utf8_buf[0] = byte;
            self.utf8_len = 1;
            self.utf8_need = need;
        }
    }

    /// 8-bit C1 controls, recognized only outside UTF-8 mode.
    fn c1(&mut self, screen: &mut Screen, byte: u8) {
        match byte {
            0x84 => screen.esc_dispatch(&[], b'D'),
            0x85 => screen.esc_dispatch(&[], b'E'),
            0x88 => screen.esc_dispatch(&[], b'H'),
            0x8D => screen.esc_dispatch(&[], b'M'),
            0x90 => self.state = State::Dcs,
            0x9B => self.start_csi(),
            0x9D => self.state = State::Osc,
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Escape sequences
    // ------------------------------------------------------------------

    fn escape(&mut self, screen: &mut Screen, byte: u8) {
        match byte {
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => self.enter_escape(),
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => screen.control(byte),
            0x20..=0x2F => {
                self.push_intermediate(byte);
                self.state = State::EscapeIntermediate;
            }
            b'[' => self.start_csi(),
            b']' => self.state = State::Osc,
            b'P' => self.state = State::Dcs,
            0x30..=0x7E => {
                self.state = State::Ground;
                screen.esc_dispatch(&[], byte);
            }
            _ => self.state = State::Ground,
        }
    }

    fn escape_intermediate(&mut self, screen: &mut Screen, byte: u8) {
        match byte {
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => self.enter_escape(),
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => screen.control(byte),
            0x20..=0x2F => self.push_intermediate(byte),
            0x30..=0x7E => {
                let intermediates = std::mem::take(&mut self.intermediates);
                self.state = State::Ground;
                screen.esc_dispatch(&intermediates, byte);
            }
            _ => self.state = State::Ground,
        }
    }

    // ------------------------------------------------------------------
    // CSI sequences
    // ------------------------------------------------------------------

    fn csi(&mut self, screen: &mut Screen, byte: u8) {
        match byte {
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => self.enter_escape(),
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => screen.control(byte),
            b'0'..=b'9' => self.param_digit(i64::from(byte - b'0')),
            b';' => self.param_next(),
            b':' => self.param_sub(),
            0x3C..=0x3F => {
                if self.params.is_empty()
                    && self.intermediates.is_empty()
                    && self.private.is_none()
                {
                    self.private = Some(byte);
                } else {
                    self.state = State::CsiIgnore;
                }
            }
            0x20..=0x2F => self.push_intermediate(byte),
            0x40..=0x7E => {
                let params = std::mem::take(&mut self.params);
                let intermediates = std::mem::take(&mut self.intermediates);
                let private = self.private.take();
                self.state = State::Ground;
                screen.csi_dispatch(private, &intermediates, &params, byte);
            }
            0x7F => {}
            _ => self.state = State::CsiIgnore,
        }
    }

    fn csi_ignore(&mut self, screen: &mut Screen, byte: u8) {
        match byte {
            0x18 | 0x1A => self.state = State::Ground,
            0x1B => self.enter_escape(),
            0x00..=0x17 | 0x19 | 0x1C..=0x1F => screen.control(byte),
            0x40..=0x7E => self.state = State::Ground,
            _ => {}
        }
    }

    fn ensure_param(&mut self) {
        if self.params.is_empty() {
            self.params.push(vec![MISSING]);
        }
    }

    fn param_digit(&mut self, digit: i64) {
        self.ensure_param();
        if let Some(value) = self.params.last_mut().and_then(|param| param.last_mut()) {
            if *value == MISSING {
                *value = digit;
            } else {
                *value = (*value * 10 + digit).min(MAX_PARAM_VALUE);
            }
        }
    }

    fn param_next(&mut self) {
        self.ensure_param();
        if self.params.len() < MAX_PARAMS {
            self.params.push(vec![MISSING]);
        }
    }

    fn param_sub(&mut self) {
        self.ensure_param();
        if let Some(param) = self.params.last_mut() {
            if param.len() < MAX_PARAMS {
                param.push(MISSING);
            }
        }
    }

    fn push_intermediate(&mut self, byte: u8) {
        if self.intermediates.len() < MAX_INTERMEDIATES {
            self.intermediates.push(byte);
        }
    }

    // ------------------------------------------------------------------
    // OSC / DCS string bodies, consumed to BEL or ST
    // ------------------------------------------------------------------

    fn string_body(&mut self, byte: u8, escape_state: State) {
        match byte {
            0x07 | 0x18 | 0x1A => self.state = State::Ground,
            0x1B => self.state = escape_state,
            _ => {}
        }
    }

    fn string_escape(&mut self, screen: &mut Screen, byte: u8) {
        if byte == b'\\' {
            self.state = State::Ground;
            return;
        }
        // An ESC that does not terminate the string aborts it.
        self.enter_escape();
        if byte != 0x1B {
            self.advance(screen, byte);
        }
    }
}
