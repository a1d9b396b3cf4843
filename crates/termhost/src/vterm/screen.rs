//! Screen state: the cell grids, cursor, pen, modes, and palette, plus every
//! mutation the control-sequence dispatcher can apply to them.
//!
//! The byte-level state machine lives in [`crate::vterm::parser`]; it calls
//! into this module once it has recognized a printable character, a C0
//! control, or a complete escape/CSI sequence.

use std::sync::Arc;

use unicode_width::UnicodeWidthChar;

use crate::vterm::cell::{
    Baseline, Cell, CellAttrs, CursorShape, Dhl, Underline, MAX_RUNES_PER_CELL,
};
use crate::vterm::color::{extended_palette_rgb, Color, ColorType, ANSI_PALETTE};
use crate::vterm::keyboard::InputModes;
use crate::vterm::output::OutputPipe;
use crate::vterm::screenshot::{Pos, ScreenShot};

/// Parameter list of a CSI sequence: one entry per parameter, each holding
/// its colon-separated sub-parameters. Missing values are `MISSING`.
pub(crate) type Params = Vec<Vec<i64>>;

/// Sentinel for an omitted CSI parameter.
pub(crate) const MISSING: i64 = -1;

/// One grid row plus its DEC line attributes and soft-wrap marker.
#[derive(Clone, Debug)]
struct Row {
    cells: Vec<Cell>,
    /// This row continues the soft-wrapped line above it.
    cont: bool,
    dwl: bool,
    dhl: Dhl,
}

/// Current writing attributes and colors.
#[derive(Clone, Copy, Debug)]
struct Pen {
    attrs: CellAttrs,
    fg: Color,
    bg: Color,
}

#[derive(Clone, Copy, Debug)]
struct Cursor {
    row: usize,
    col: usize,
    /// The cursor sits on the last column with a wrap owed to the next
    /// printable character.
    pending_wrap: bool,
    visible: bool,
    blink: bool,
    shape: CursorShape,
}

pub(crate) struct Screen {
    rows: usize,
    cols: usize,
    primary: Vec<Row>,
    alt: Vec<Row>,
    on_alt: bool,
    altscreen_enabled: bool,
    reflow: bool,
    utf8: bool,
    autowrap: bool,
    insert_mode: bool,
    /// Scroll region as a half-open row range.
    scroll_top: usize,
    scroll_bottom: usize,
    tab_stops: Vec<bool>,
    cursor: Cursor,
    saved_cursor: Option<(usize, usize, Pen)>,
    pen: Pen,
    default_fg: Color,
    default_bg: Color,
    palette: [(u8, u8, u8); 16],
    pub(crate) input_modes: InputModes,
    /// Position of the most recently written base character, for combining
    /// marks.
    last_write: Option<(usize, usize)>,
    out: Arc<OutputPipe>,
}

impl Screen {
    pub(crate) fn new(rows: usize, cols: usize, out: Arc<OutputPipe>) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);

        let default_fg = Color::rgb(0xC4, 0xC4, 0xC4).with_marker(ColorType::DEFAULT_FG);
        let default_bg = Color::rgb(0, 0, 0).with_marker(ColorType::DEFAULT_BG);
        let pen = Pen {
            attrs: CellAttrs::default(),
            fg: default_fg,
            bg: default_bg,
        };

        let blank_row = Row {
            cells: vec![Cell::blank(default_fg, default_bg); cols],
            cont: false,
            dwl: false,
            dhl: Dhl::Off,
        };

        Self {
            rows,
            cols,
            primary: vec![blank_row.clone(); rows],
            alt: vec![blank_row; rows],
            on_alt: false,
            altscreen_enabled: false,
            reflow: false,
            utf8: false,
            autowrap: true,
            insert_mode: false,
            scroll_top: 0,
            scroll_bottom: rows,
            tab_stops: default_tab_stops(cols),
            cursor: Cursor {
                row: 0,
                col: 0,
                pending_wrap: false,
                visible: true,
                blink: true,
                shape: CursorShape::Block,
            },
            saved_cursor: None,
            pen,
            default_fg,
            default_bg,
            palette: ANSI_PALETTE,
            input_modes: InputModes::default(),
            last_write: None,
            out,
        }
    }

    pub(crate) fn size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub(crate) fn utf8(&self) -> bool {
        self.utf8
    }

    pub(crate) fn set_utf8(&mut self, utf8: bool) {
        self.utf8 = utf8;
    }

    pub(crate) fn set_reflow(&mut self, reflow: bool) {
        self.reflow = reflow;
    }

    pub(crate) fn set_altscreen(&mut self, enabled: bool) {
        self.altscreen_enabled = enabled;
        if !enabled && self.on_alt {
            self.on_alt = false;
        }
    }

    fn blank_cell(&self) -> Cell {
        Cell::blank(self.pen.fg, self.pen.bg)
    }

    fn blank_row(&self) -> Row {
        Row {
            cells: vec![self.blank_cell(); self.cols],
            cont: false,
            dwl: false,
            dhl: Dhl::Off,
        }
    }

    fn active(&self) -> &[Row] {
        if self.on_alt {
            &self.alt
        } else {
            &self.primary
        }
    }

    fn active_mut(&mut self) -> &mut Vec<Row> {
        if self.on_alt {
            &mut self.alt
        } else {
            &mut self.primary
        }
    }

    // ------------------------------------------------------------------
    // Printing
    // ------------------------------------------------------------------

    pub(crate) fn print(&mut self, ch: char) {
        let width = match UnicodeWidthChar::width(ch) {
            Some(0) => {
                self.combine(ch);
                return;
            }
            Some(2) => 2usize,
            _ => 1usize,
        };

        if self.cursor.pending_wrap && self.autowrap {
            self.cursor.pending_wrap = false;
            self.cursor.col = 0;
            self.wrap_line();
        }

        if width == 2 && self.cursor.col + 1 >= self.cols {
            // A wide glyph never straddles the right margin: it wraps to the
            // next line before being placed.
            if self.autowrap && self.cols >= 2 {
                self.cursor.col = 0;
                self.wrap_line();
            } else if self.cols >= 2 {
                self.cursor.col = self.cols - 2;
            } else {
                return;
            }
        }

        let (row, col) = (self.cursor.row, self.cursor.col);
        if self.insert_mode {
            let cols = self.cols;
            let blank = self.blank_cell();
            let line = &mut self.active_mut()[row];
            for _ in 0..width {
                line.cells.insert(col, blank.clone());
            }
            line.cells.truncate(cols);
        }
        self.put_cell(
            row,
            col,
            Cell {
                runes: vec![ch],
                width: width as u8,
                attrs: self.pen.attrs,
                fg: self.pen.fg,
                bg: self.pen.bg,
            },
        );
        if width == 2 {
            self.put_cell(
                row,
                col + 1,
                Cell {
                    runes: Vec::new(),
                    width: 0,
                    attrs: self.pen.attrs,
                    fg: self.pen.fg,
                    bg: self.pen.bg,
                },
            );
        }
        self.last_write = Some((row, col));

        let next = col + width;
        if next >= self.cols {
            self.cursor.col = self.cols - 1;
            self.cursor.pending_wrap = self.autowrap;
        } else {
            self.cursor.col = next;
        }
    }

    fn combine(&mut self, ch: char) {
        let (row, col) = match self.last_write {
            Some(pos) => pos,
            None => {
                let row = self.cursor.row;
                let mut col = self.cursor.col;
                if col > 0 {
                    col -= 1;
                    // Step over the continuation half of a wide glyph.
                    if self.active()[row].cells[col].width == 0 && col > 0 {
                        col -= 1;
                    }
                }
                (row, col)
            }
        };

        let cell = &mut self.active_mut()[row].cells[col];
        if cell.runes.len() < MAX_RUNES_PER_CELL {
            cell.runes.push(ch);
        }
    }

    fn put_cell(&mut self, row: usize, col: usize, cell: Cell) {
        let cols = self.cols;
        let blank = self.blank_cell();
        let line = &mut self.active_mut()[row];

        // Writing over either half of a wide glyph voids the other half.
        if line.cells[col].width == 0 && col > 0 && line.cells[col - 1].width == 2 {
            line.cells[col - 1] = blank.clone();
        }
        if line.cells[col].width == 2 && col + 1 < cols {
            line.cells[col + 1] = blank;
        }
        line.cells[col] = cell;
    }

    /// Soft-wrap onto the next row, scrolling at the bottom margin.
    fn wrap_line(&mut self) {
        self.linefeed_motion();
        let row = self.cursor.row;
        self.active_mut()[row].cont = true;
    }

    // ------------------------------------------------------------------
    // C0 controls
    // ------------------------------------------------------------------

    pub(crate) fn control(&mut self, byte: u8) {
        match byte {
            0x08 => {
                self.cursor.pending_wrap = false;
                self.cursor.col = self.cursor.col.saturating_sub(1);
                self.last_write = None;
            }
            0x09 => {
                self.cursor.pending_wrap = false;
                self.cursor.col = self.next_tab_stop(self.cursor.col);
                self.last_write = None;
            }
            0x0A | 0x0B | 0x0C => self.linefeed(),
            0x0D => {
                self.cursor.pending_wrap = false;
                self.cursor.col = 0;
                self.last_write = None;
            }
            // BEL, SO/SI charset shifts, and the rest have no visible effect.
            _ => {}
        }
    }

    fn linefeed(&mut self) {
        self.cursor.pending_wrap = false;
        self.last_write = None;
        self.linefeed_motion();
    }

    /// Move down one row, scrolling when the cursor sits on the scroll
    /// region's bottom margin.
    fn linefeed_motion(&mut self) {
        if self.cursor.row + 1 == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor.row + 1 < self.rows {
            self.cursor.row += 1;
        }
    }

    // ------------------------------------------------------------------
    // ESC dispatch
    // ------------------------------------------------------------------

    pub(crate) fn esc_dispatch(&mut self, intermediates: &[u8], byte: u8) {
        match (intermediates, byte) {
            ([], b'7') => self.save_cursor(),
            ([], b'8') => self.restore_cursor(),
            ([], b'D') => self.linefeed(),
            ([], b'E') => {
                self.cursor.col = 0;
                self.linefeed();
            }
            ([], b'H') => self.set_tab_stop(),
            ([], b'M') => self.reverse_index(),
            ([], b'c') => self.reset(),
            ([], b'=') => self.input_modes.keypad_app = true,
            ([], b'>') => self.input_modes.keypad_app = false,
            // S7C1T / S8C1T select the control transmission form; responses
            // here are always 7-bit.
            ([b' '], b'F' | b'G') => {}
            ([b'#'], b'3') => self.set_line_attrs(true, Dhl::Top),
            ([b'#'], b'4') => self.set_line_attrs(true, Dhl::Bottom),
            ([b'#'], b'5') => self.set_line_attrs(false, Dhl::Off),
            ([b'#'], b'6') => self.set_line_attrs(true, Dhl::Off),
            ([b'#'], b'8') => self.screen_alignment(),
            _ => {}
        }
    }

    fn save_cursor(&mut self) {
        self.saved_cursor = Some((self.cursor.row, self.cursor.col, self.pen));
    }

    fn restore_cursor(&mut self) {
        if let Some((row, col, pen)) = self.saved_cursor {
            self.cursor.row = row.min(self.rows - 1);
            self.cursor.col = col.min(self.cols - 1);
            self.pen = pen;
        }
        self.cursor.pending_wrap = false;
        self.last_write = None;
    }

    fn reverse_index(&mut self) {
        self.cursor.pending_wrap = false;
        self.last_write = None;
        if self.cursor.row == self.scroll_top {
            self.scroll_down(1);
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
        }
    }

    fn set_line_attrs(&mut self, dwl: bool, dhl: Dhl) {
        let row = self.cursor.row;
        let line = &mut self.active_mut()[row];
        line.dwl = dwl;
        line.dhl = dhl;
    }

    fn screen_alignment(&mut self) {
        let cell = Cell {
            runes: vec!['E'],
            width: 1,
            attrs: CellAttrs::default(),
            fg: self.default_fg,
            bg: self.default_bg,
        };
        for line in self.active_mut() {
            line.cells.fill(cell.clone());
            line.cont = false;
            line.dwl = false;
            line.dhl = Dhl::Off;
        }
        self.cursor.row = 0;
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
        self.last_write = None;
    }

    fn reset(&mut self) {
        let blank = self.blank_row_with_defaults();
        self.primary = vec![blank.clone(); self.rows];
        self.alt = vec![blank; self.rows];
        self.on_alt = false;
        self.autowrap = true;
        self.insert_mode = false;
        self.scroll_top = 0;
        self.scroll_bottom = self.rows;
        self.tab_stops = default_tab_stops(self.cols);
        self.input_modes = InputModes::default();
        self.pen = Pen {
            attrs: CellAttrs::default(),
            fg: self.default_fg,
            bg: self.default_bg,
        };
        self.cursor = Cursor {
            row: 0,
            col: 0,
            pending_wrap: false,
            visible: true,
            blink: true,
            shape: CursorShape::Block,
        };
        self.saved_cursor = None;
        self.last_write = None;
    }

    fn blank_row_with_defaults(&self) -> Row {
        Row {
            cells: vec![Cell::blank(self.default_fg, self.default_bg); self.cols],
            cont: false,
            dwl: false,
            dhl: Dhl::Off,
        }
    }

    // ------------------------------------------------------------------
    // CSI dispatch
    // ------------------------------------------------------------------

    pub(crate) fn csi_dispatch(
        &mut self,
        private: Option<u8>,
        intermediates: &[u8],
        params: &Params,
        byte: u8,
    ) {
        match private {
            Some(b'?') => match byte {
                b'h' => self.dec_modes(params, true),
                b'l' => self.dec_modes(params, false),
                _ => {}
            },
            Some(_) => {}
            None => match (intermediates, byte) {
                ([], b'A') => self.move_cursor(-(arg(params, 0, 1)), 0),
                ([], b'B') => self.move_cursor(arg(params, 0, 1), 0),
                ([], b'C') => self.move_cursor(0, arg(params, 0, 1)),
                ([], b'D') => self.move_cursor(0, -(arg(params, 0, 1))),
                ([], b'G' | b'`') => self.goto_col(arg(params, 0, 1) - 1),
                ([], b'd') => self.goto_row(arg(params, 0, 1) - 1),
                ([], b'H' | b'f') => {
                    self.goto(arg(params, 0, 1) - 1, arg(params, 1, 1) - 1);
                }
                ([], b'J') => self.erase_display(arg(params, 0, 0)),
                ([], b'K') => self.erase_line(arg(params, 0, 0)),
                ([], b'L') => self.insert_lines(arg(params, 0, 1)),
                ([], b'M') => self.delete_lines(arg(params, 0, 1)),
                ([], b'P') => self.delete_chars(arg(params, 0, 1)),
                ([], b'@') => self.insert_chars(arg(params, 0, 1)),
                ([], b'X') => self.erase_chars(arg(params, 0, 1)),
                ([], b'I') => self.tab_forward(arg(params, 0, 1)),
                ([], b'Z') => self.tab_backward(arg(params, 0, 1)),
                ([], b'g') => self.clear_tab_stops(arg(params, 0, 0)),
                ([], b'S') => self.scroll_up(clamp_count(arg(params, 0, 1))),
                ([], b'T') => self.scroll_down(clamp_count(arg(params, 0, 1))),
                ([], b'r') => self.set_scroll_region(params),
                ([], b'c') => {
                    if arg(params, 0, 0) == 0 {
                        self.device_attributes();
                    }
                }
                ([], b'm') => self.sgr(params),
                ([], b'h') => self.ansi_modes(params, true),
                ([], b'l') => self.ansi_modes(params, false),
                ([b' '], b'q') => self.cursor_style(arg(params, 0, 0)),
                _ => {}
            },
        }
    }

    fn device_attributes(&self) {
        // DA: VT100 with advanced video option.
        self.out.write(b"\x1B[?1;2c");
    }

    fn ansi_modes(&mut self, params: &Params, set: bool) {
        for param in params {
            match param.first().copied().unwrap_or(MISSING) {
                4 => self.insert_mode = set,
                20 => self.input_modes.newline = set,
                _ => {}
            }
        }
    }

    fn dec_modes(&mut self, params: &Params, set: bool) {
        for param in params {
            match param.first().copied().unwrap_or(MISSING) {
                1 => self.input_modes.cursor_keys = set,
                7 => {
                    self.autowrap = set;
                    if !set {
                        self.cursor.pending_wrap = false;
                    }
                }
                12 => self.cursor.blink = set,
                25 => self.cursor.visible = set,
                47 => self.switch_altscreen(set, false, false),
                1047 => self.switch_altscreen(set, true, false),
                1049 => self.switch_altscreen(set, true, true),
                _ => {}
            }
        }
    }

    fn switch_altscreen(&mut self, on: bool, clear: bool, save: bool) {
        if !self.altscreen_enabled || on == self.on_alt {
            return;
        }

        if on {
            if save {
                self.save_cursor();
            }
            self.on_alt = true;
            if clear {
                let blank = self.blank_row();
                self.alt = vec![blank; self.rows];
            }
        } else {
            self.on_alt = false;
            if save {
                self.restore_cursor();
            }
        }
        self.cursor.pending_wrap = false;
        self.last_write = None;
    }

    fn cursor_style(&mut self, param: i64) {
        if !(0..=6).contains(&param) {
            return;
        }
        // Odd values (and the default 0) select blinking cursors, even
        // values steady ones.
        self.cursor.blink = param == 0 || param % 2 == 1;
        self.cursor.shape = match param {
            3 | 4 => CursorShape::Underline,
            5 | 6 => CursorShape::BarLeft,
            _ => CursorShape::Block,
        };
    }

    // ------------------------------------------------------------------
    // Cursor movement
    // ------------------------------------------------------------------

    fn move_cursor(&mut self, d_row: i64, d_col: i64) {
        let row = self.cursor.row as i64 + d_row;
        let col = self.cursor.col as i64 + d_col;
        self.goto(row, col);
    }

    fn goto(&mut self, row: i64, col: i64) {
        self.cursor.row = clamp_index(row, self.rows);
        self.cursor.col = clamp_index(col, self.cols);
        self.cursor.pending_wrap = false;
        self.last_write = None;
    }

    fn goto_col(&mut self, col: i64) {
        self.goto(self.cursor.row as i64, col);
    }

    fn goto_row(&mut self, row: i64) {
        self.goto(row, self.cursor.col as i64);
    }

    // ------------------------------------------------------------------
    // Erase / insert / delete / scroll
    // ------------------------------------------------------------------

    fn erase_display(&mut self, mode: i64) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        match mode {
            0 => {
                self.erase_cols(row, col, self.cols);
                for r in row + 1..self.rows {
                    self.erase_full_row(r);
                }
            }
            1 => {
                for r in 0..row {
                    self.erase_full_row(r);
                }
                self.erase_cols(row, 0, col + 1);
            }
            2 => {
                for r in 0..self.rows {
                    self.erase_full_row(r);
                }
            }
            _ => {}
        }
        self.last_write = None;
    }

    fn erase_line(&mut self, mode: i64) {
        let (row, col) = (self.cursor.row, self.cursor.col);
        match mode {
            0 => self.erase_cols(row, col, self.cols),
            1 => self.erase_cols(row, 0, col + 1),
            2 => self.erase_cols(row, 0, self.cols),
            _ => {}
        }
        self.last_write = None;
    }

    fn erase_cols(&mut self, row: usize, from: usize, to: usize) {
        let blank = self.blank_cell();
        let cols = self.cols;
        let line = &mut self.active_mut()[row];
        line.cells[from..to.min(cols)].fill(blank);
    }

    fn erase_full_row(&mut self, row: usize) {
        let blank = self.blank_cell();
        let line = &mut self.active_mut()[row];
        line.cells.fill(blank);
        line.cont = false;
        line.dwl = false;
        line.dhl = Dhl::Off;
    }

    fn insert_lines(&mut self, n: i64) {
        let row = self.cursor.row;
        if row < self.scroll_top || row >= self.scroll_bottom {
            return;
        }

        let n = clamp_count(n).min(self.scroll_bottom - row);
        let bottom = self.scroll_bottom;
        let blank = self.blank_row();
        let grid = self.active_mut();
        for _ in 0..n {
            grid.remove(bottom - 1);
            grid.insert(row, blank.clone());
        }
        self.cursor.pending_wrap = false;
        self.last_write = None;
    }

    fn delete_lines(&mut self, n: i64) {
        let row = self.cursor.row;
        if row < self.scroll_top || row >= self.scroll_bottom {
            return;
        }

        let n = clamp_count(n).min(self.scroll_bottom - row);
        let bottom = self.scroll_bottom;
        let blank = self.blank_row();
        let grid = self.active_mut();
        for _ in 0..n {
            grid.remove(row);
            grid.insert(bottom - 1, blank.clone());
        }
        self.cursor.pending_wrap = false;
        self.last_write = None;
    }

    fn insert_chars(&mut self, n: i64) {
        let n = clamp_count(n).min(self.cols - self.cursor.col);
        let col = self.cursor.col;
        let cols = self.cols;
        let row = self.cursor.row;
        let blank = self.blank_cell();
        let line = &mut self.active_mut()[row];
        for _ in 0..n {
            line.cells.insert(col, blank.clone());
        }
        line.cells.truncate(cols);
        self.last_write = None;
    }

    fn delete_chars(&mut self, n: i64) {
        let n = clamp_count(n).min(self.cols - self.cursor.col);
        let col = self.cursor.col;
        let row = self.cursor.row;
        let blank = self.blank_cell();
        let line = &mut self.active_mut()[row];
        for _ in 0..n {
            line.cells.remove(col);
            line.cells.push(blank.clone());
        }
        self.last_write = None;
    }

    fn erase_chars(&mut self, n: i64) {
        let n = clamp_count(n).min(self.cols - self.cursor.col);
        let col = self.cursor.col;
        self.erase_cols(self.cursor.row, col, col + n);
        self.last_write = None;
    }

    fn scroll_up(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let n = n.min(bottom - top);
        let blank = self.blank_row();
        let grid = self.active_mut();
        for _ in 0..n {
            grid.remove(top);
            grid.insert(bottom - 1, blank.clone());
        }
        self.last_write = None;
    }

    fn scroll_down(&mut self, n: usize) {
        let (top, bottom) = (self.scroll_top, self.scroll_bottom);
        let n = n.min(bottom - top);
        let blank = self.blank_row();
        let grid = self.active_mut();
        for _ in 0..n {
            grid.remove(bottom - 1);
            grid.insert(top, blank.clone());
        }
        self.last_write = None;
    }

    /// DECSTBM. The region must span at least two rows; the cursor homes.
    fn set_scroll_region(&mut self, params: &Params) {
        let top = (arg(params, 0, 1).max(1) as usize) - 1;
        let mut bottom = arg(params, 1, self.rows as i64);
        if bottom <= 0 {
            bottom = self.rows as i64;
        }
        let bottom = (bottom as usize).min(self.rows);
        if bottom <= top + 1 {
            return;
        }

        self.scroll_top = top;
        self.scroll_bottom = bottom;
        self.goto(0, 0);
    }

    // ------------------------------------------------------------------
    // Tab stops
    // ------------------------------------------------------------------

    fn next_tab_stop(&self, col: usize) -> usize {
        (col + 1..self.cols)
            .find(|&c| self.tab_stops[c])
            .unwrap_or(self.cols - 1)
    }

    fn prev_tab_stop(&self, col: usize) -> usize {
        (0..col).rev().find(|&c| self.tab_stops[c]).unwrap_or(0)
    }

    fn set_tab_stop(&mut self) {
        let col = self.cursor.col;
        self.tab_stops[col] = true;
    }

    fn clear_tab_stops(&mut self, mode: i64) {
        match mode {
            0 => {
                let col = self.cursor.col;
                self.tab_stops[col] = false;
            }
            3 => self.tab_stops.fill(false),
            _ => {}
        }
    }

    fn tab_forward(&mut self, n: i64) {
        for _ in 0..clamp_count(n) {
            self.cursor.col = self.next_tab_stop(self.cursor.col);
        }
        self.cursor.pending_wrap = false;
        self.last_write = None;
    }

    fn tab_backward(&mut self, n: i64) {
        for _ in 0..clamp_count(n) {
            self.cursor.col = self.prev_tab_stop(self.cursor.col);
        }
        self.cursor.pending_wrap = false;
        self.last_write = None;
    }

    // ------------------------------------------------------------------
    // SGR
    // ------------------------------------------------------------------

    fn sgr(&mut self, params: &Params) {
        if params.is_empty() {
            self.sgr_reset();
            return;
        }

        let mut i = 0;
        while i < params.len() {
            let param = &params[i];
            let value = param.first().copied().unwrap_or(MISSING).max(0);
            match value {
                0 => self.sgr_reset(),
                1 => self.pen.attrs.bold = true,
                3 => self.pen.attrs.italic = true,
                4 => {
                    self.pen.attrs.underline = match param.get(1).copied() {
                        Some(0) => Underline::Off,
                        Some(2) => Underline::Double,
                        Some(3) => Underline::Curly,
                        _ => Underline::Single,
                    };
                }
                5 => self.pen.attrs.blink = true,
                7 => self.pen.attrs.reverse = true,
                8 => self.pen.attrs.conceal = true,
                9 => self.pen.attrs.strike = true,
                10..=19 => self.pen.attrs.font = (value - 10) as u8,
                21 => self.pen.attrs.underline = Underline::Double,
                22 => self.pen.attrs.bold = false,
                23 => self.pen.attrs.italic = false,
                24 => self.pen.attrs.underline = Underline::Off,
                25 => self.pen.attrs.blink = false,
                27 => self.pen.attrs.reverse = false,
                28 => self.pen.attrs.conceal = false,
                29 => self.pen.attrs.strike = false,
                30..=37 => self.pen.fg = Color::indexed((value - 30) as u8),
                38 => {
                    if let Some(color) = parse_extended_color(params, &mut i) {
                        self.pen.fg = color;
                    }
                }
                39 => self.pen.fg = self.default_fg,
                40..=47 => self.pen.bg = Color::indexed((value - 40) as u8),
                48 => {
                    if let Some(color) = parse_extended_color(params, &mut i) {
                        self.pen.bg = color;
                    }
                }
                49 => self.pen.bg = self.default_bg,
                73 => {
                    self.pen.attrs.small = true;
                    self.pen.attrs.baseline = Baseline::Raise;
                }
                74 => {
                    self.pen.attrs.small = true;
                    self.pen.attrs.baseline = Baseline::Lower;
                }
                75 => {
                    self.pen.attrs.small = false;
                    self.pen.attrs.baseline = Baseline::Normal;
                }
                90..=97 => self.pen.fg = Color::indexed((value - 90 + 8) as u8),
                100..=107 => self.pen.bg = Color::indexed((value - 100 + 8) as u8),
                _ => {}
            }
            i += 1;
        }
    }

    fn sgr_reset(&mut self) {
        self.pen = Pen {
            attrs: CellAttrs::default(),
            fg: self.default_fg,
            bg: self.default_bg,
        };
    }

    // ------------------------------------------------------------------
    // Colors
    // ------------------------------------------------------------------

    pub(crate) fn set_default_color(&mut self, fg: Color, bg: Color) {
        let fg = fg.with_marker(ColorType::DEFAULT_FG);
        let bg = bg.with_marker(ColorType::DEFAULT_BG);

        for line in self.primary.iter_mut().chain(self.alt.iter_mut()) {
            for cell in &mut line.cells {
                if cell.fg.is_default_fg() {
                    cell.fg = fg;
                }
                if cell.bg.is_default_bg() {
                    cell.bg = bg;
                }
            }
        }
        if self.pen.fg.is_default_fg() {
            self.pen.fg = fg;
        }
        if self.pen.bg.is_default_bg() {
            self.pen.bg = bg;
        }
        self.default_fg = fg;
        self.default_bg = bg;
    }

    pub(crate) fn set_palette_color(&mut self, idx: u8, color: Color) {
        if idx > 15 {
            return;
        }
        self.palette[usize::from(idx)] = (color.red, color.green, color.blue);
    }

    pub(crate) fn convert_to_rgb(&self, color: Color) -> Color {
        if color.is_indexed() {
            let (red, green, blue) = if color.idx < 16 {
                self.palette[usize::from(color.idx)]
            } else {
                extended_palette_rgb(color.idx)
            };
            Color::rgb(red, green, blue)
        } else {
            Color::rgb(color.red, color.green, color.blue)
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub(crate) fn cell(&self, pos: Pos) -> Option<Cell> {
        if pos.row < 0 || pos.col < 0 {
            return None;
        }
        let (row, col) = (pos.row as usize, pos.col as usize);
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(self.cell_at(row, col))
    }

    fn cell_at(&self, row: usize, col: usize) -> Cell {
        let line = &self.active()[row];
        let mut cell = line.cells[col].clone();
        if line.dwl {
            cell.attrs.dwl = true;
        }
        if line.dhl != Dhl::Off {
            cell.attrs.dwl = true;
            cell.attrs.dhl = line.dhl;
        }
        cell
    }

    pub(crate) fn capture(&self) -> ScreenShot {
        let mut cells = Vec::with_capacity(self.rows * self.cols);
        for row in 0..self.rows {
            for col in 0..self.cols {
                cells.push(self.cell_at(row, col));
            }
        }

        ScreenShot {
            stride: self.cols as i64,
            cells,
            cursor_pos: Pos::new(self.cursor.row as i64, self.cursor.col as i64),
            cursor_visible: self.cursor.visible,
            cursor_blink: self.cursor.blink,
            cursor_shape: self.cursor.shape,
        }
    }

    pub(crate) fn capture_rgb(&self) -> ScreenShot {
        let mut shot = self.capture();
        for cell in &mut shot.cells {
            cell.fg = self.convert_to_rgb(cell.fg);
            cell.bg = self.convert_to_rgb(cell.bg);
        }
        shot
    }

    // ------------------------------------------------------------------
    // Resize
    // ------------------------------------------------------------------

    pub(crate) fn set_size(&mut self, rows: usize, cols: usize) {
        let rows = rows.max(1);
        let cols = cols.max(1);
        if rows == self.rows && cols == self.cols {
            return;
        }

        if self.reflow && !self.on_alt {
            self.reflow_primary(rows, cols);
        } else {
            let blank = self.blank_cell();
            clip_grid(&mut self.primary, rows, cols, &blank);
        }
        let blank = self.blank_cell();
        clip_grid(&mut self.alt, rows, cols, &blank);
        if self.on_alt {
            // Primary keeps its clipped shape too when alt is active.
            clip_grid(&mut self.primary, rows, cols, &blank);
        }

        let old_cols = self.tab_stops.len();
        self.tab_stops.resize(cols, false);
        for col in old_cols..cols {
            self.tab_stops[col] = col % 8 == 0;
        }

        self.rows = rows;
        self.cols = cols;
        self.scroll_top = 0;
        self.scroll_bottom = rows;
        self.cursor.row = self.cursor.row.min(rows - 1);
        self.cursor.col = self.cursor.col.min(cols - 1);
        self.cursor.pending_wrap = false;
        self.last_write = None;
    }

    /// Re-wrap the primary buffer's soft-wrapped lines to a new width.
    fn reflow_primary(&mut self, rows: usize, cols: usize) {
        let old = std::mem::take(&mut self.primary);
        let cursor = (self.cursor.row, self.cursor.col);

        // Rebuild logical lines, remembering where the cursor lands.
        let mut lines: Vec<Vec<Cell>> = Vec::new();
        let mut cursor_line: Option<(usize, usize)> = None;
        for (ri, row) in old.into_iter().enumerate() {
            if !row.cont || lines.is_empty() {
                lines.push(Vec::new());
            }
            let li = lines.len() - 1;
            if ri == cursor.0 {
                cursor_line = Some((li, lines[li].len() + cursor.1));
            }
            lines[li].extend(row.cells);
        }

        // Trailing unwritten cells are padding, not content.
        for line in &mut lines {
            while line
                .last()
                .is_some_and(|cell| cell.runes.is_empty() && cell.width == 1)
            {
                line.pop();
            }
        }

        let blank = self.blank_cell();
        let mut grid: Vec<Row> = Vec::new();
        let mut new_cursor: Option<(usize, usize)> = None;
        for (li, line) in lines.iter().enumerate() {
            let mut idx = 0;
            let mut first = true;
            loop {
                let mut cells: Vec<Cell> = Vec::with_capacity(cols);
                while cells.len() < cols && idx < line.len() {
                    if line[idx].width == 2 && cells.len() + 1 == cols {
                        if cols == 1 {
                            // A wide glyph cannot exist on a one-column
                            // grid; drop it and its continuation.
                            idx += 1;
                            if idx < line.len() && line[idx].width == 0 {
                                idx += 1;
                            }
                            continue;
                        }
                        break;
                    }
                    if cursor_line == Some((li, idx)) {
                        new_cursor = Some((grid.len(), cells.len()));
                    }
                    cells.push(line[idx].clone());
                    idx += 1;
                }
                // A cursor that sat in trimmed trailing padding lands just
                // past the re-wrapped content.
                if new_cursor.is_none()
                    && idx >= line.len()
                    && cursor_line.is_some_and(|(cl, ci)| cl == li && ci >= line.len())
                {
                    new_cursor = Some((grid.len(), cells.len().min(cols - 1)));
                }
                cells.resize(cols, blank.clone());
                grid.push(Row {
                    cells,
                    cont: !first,
                    dwl: false,
                    dhl: Dhl::Off,
                });
                first = false;
                if idx >= line.len() {
                    break;
                }
            }
        }

        // Fit the re-wrapped content into the new height, dropping from the
        // top like a scroll when it no longer fits.
        let mut dropped = 0usize;
        if grid.len() > rows {
            dropped = grid.len() - rows;
            grid.drain(..dropped);
        }
        while grid.len() < rows {
            grid.push(Row {
                cells: vec![blank.clone(); cols],
                cont: false,
                dwl: false,
                dhl: Dhl::Off,
            });
        }

        if let Some((row, col)) = new_cursor {
            let row = row.saturating_sub(dropped);
            self.cursor.row = row.min(rows - 1);
            self.cursor.col = col.min(cols - 1);
        }
        self.primary = grid;
    }
}

fn default_tab_stops(cols: usize) -> Vec<bool> {
    (0..cols).map(|col| col % 8 == 0).collect()
}

fn clip_grid(grid: &mut Vec<Row>, rows: usize, cols: usize, blank: &Cell) {
    for row in grid.iter_mut() {
        if row.cells.len() > cols {
            row.cells.truncate(cols);
            // A wide glyph cut in half by the new margin is voided.
            if row.cells.last().is_some_and(|cell| cell.width == 2) {
                if let Some(last) = row.cells.last_mut() {
                    *last = blank.clone();
                }
            }
        } else {
            row.cells.resize(cols, blank.clone());
        }
    }
    if grid.len() > rows {
        grid.truncate(rows);
    } else {
        while grid.len() < rows {
            grid.push(Row {
                cells: vec![blank.clone(); cols],
                cont: false,
                dwl: false,
                dhl: Dhl::Off,
            });
        }
    }
}

/// The `i`th parameter's primary value, or `default` when omitted.
fn arg(params: &Params, i: usize, default: i64) -> i64 {
    match params.get(i).and_then(|param| param.first()).copied() {
        Some(MISSING) | None => default,
        Some(0) if default == 1 => 1,
        Some(value) => value,
    }
}

fn clamp_count(n: i64) -> usize {
    n.max(0) as usize
}

fn clamp_index(value: i64, len: usize) -> usize {
    value.clamp(0, len as i64 - 1) as usize
}

/// Parse the indexed/RGB forms of SGR 38/48, in both the semicolon and the
/// colon sub-parameter notations. Advances `i` past consumed parameters in
/// the semicolon form.
fn parse_extended_color(params: &Params, i: &mut usize) -> Option<Color> {
    let param = &params[*i];
    if param.len() > 1 {
        match param.get(1).copied() {
            Some(5) => {
                let idx = param.get(2).copied().unwrap_or(0).clamp(0, 255);
                Some(Color::indexed(idx as u8))
            }
            Some(2) => {
                // A six-element form carries a colorspace id before the
                // channels.
                let offset = if param.len() >= 6 { 3 } else { 2 };
                let channel = |n: usize| param.get(offset + n).copied().unwrap_or(0).clamp(0, 255);
                Some(Color::rgb(
                    channel(0) as u8,
                    channel(1) as u8,
                    channel(2) as u8,
                ))
            }
            _ => None,
        }
    } else {
        match params.get(*i + 1).and_then(|p| p.first()).copied() {
            Some(5) => {
                let idx = params
                    .get(*i + 2)
                    .and_then(|p| p.first())
                    .copied()
                    .unwrap_or(0)
                    .clamp(0, 255);
                *i += 2;
                Some(Color::indexed(idx as u8))
            }
            Some(2) => {
                let channel = |n: usize| {
                    params
                        .get(*i + 2 + n)
                        .and_then(|p| p.first())
                        .copied()
                        .unwrap_or(0)
                        .clamp(0, 255)
                };
                let color = Color::rgb(channel(0) as u8, channel(1) as u8, channel(2) as u8);
                *i += 4;
                Some(color)
            }
            _ => None,
        }
    }
}
