//! Screen cell model: glyph cluster, rendition attributes, cursor shape.

use crate::vterm::color::Color;

/// Underline rendition of a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Underline {
    #[default]
    Off = 0,
    Single = 1,
    Double = 2,
    Curly = 3,
}

/// Double-height-line half carried by a cell's row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Dhl {
    #[default]
    Off = 0,
    Top = 1,
    Bottom = 2,
}

/// Baseline shift of small (superscript/subscript) text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Baseline {
    #[default]
    Normal = 0,
    Raise = 1,
    Lower = 2,
}

/// Cursor glyph shape selected via DECSCUSR.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum CursorShape {
    /// Zero value carried by the zero snapshot; captures never produce it.
    #[default]
    Unset = 0,
    Block = 1,
    Underline = 2,
    BarLeft = 3,
}

/// Independent rendition flags of one cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellAttrs {
    pub bold: bool,
    pub underline: Underline,
    pub italic: bool,
    pub blink: bool,
    pub reverse: bool,
    pub conceal: bool,
    pub strike: bool,
    /// Selected font, 0..=9; 0 is the primary font.
    pub font: u8,
    pub dwl: bool,
    pub dhl: Dhl,
    pub small: bool,
    pub baseline: Baseline,
}

/// Cap on scalars stored in one cell; further combining marks are dropped.
pub(crate) const MAX_RUNES_PER_CELL: usize = 6;

/// One cell of the grid: a grapheme cluster with rendition and colors.
///
/// Empty `runes` mean the cell is unwritten, or (when `width` is zero) the
/// continuation half of a preceding wide glyph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    /// Unicode scalars of the cluster: a base character plus any combining
    /// marks, or empty.
    pub runes: Vec<char>,
    /// Display width: 1 narrow, 2 wide, 0 continuation.
    pub width: u8,
    pub attrs: CellAttrs,
    pub fg: Color,
    pub bg: Color,
}

impl Cell {
    /// An unwritten cell carrying the given colors.
    pub(crate) fn blank(fg: Color, bg: Color) -> Self {
        Self {
            runes: Vec::new(),
            width: 1,
            attrs: CellAttrs::default(),
            fg,
            bg,
        }
    }
}
