//! Terminal color model.
//!
//! A [`Color`] is either palette-indexed or a concrete RGB triple, and may
//! additionally carry the default-foreground / default-background markers.
//! The kind and the markers live together in a [`ColorType`] bit set so a
//! color fits in four bytes on the wire.

use bitflags::bitflags;

bitflags! {
    /// Kind and default-marker bits of a [`Color`].
    ///
    /// Bit 0 selects the kind (indexed when set, RGB when clear); bits 1 and
    /// 2 mark the color as the terminal's default foreground or background.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ColorType: u8 {
        const INDEXED = 1 << 0;
        const DEFAULT_FG = 1 << 1;
        const DEFAULT_BG = 1 << 2;
    }
}

impl ColorType {
    /// Mask covering the kind bit.
    pub const TYPE_MASK: Self = Self::INDEXED;
    /// Mask covering both default markers.
    pub const DEFAULT_MASK: Self = Self::DEFAULT_FG.union(Self::DEFAULT_BG);
}

/// A terminal color: palette index or RGB triple, plus default markers.
///
/// Only the channels selected by the kind bit are meaningful; equality
/// ignores the others. The default markers are always significant.
#[derive(Clone, Copy, Debug, Default)]
pub struct Color {
    pub ty: ColorType,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub idx: u8,
}

impl Color {
    /// A concrete RGB color.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            ty: ColorType::empty(),
            red,
            green,
            blue,
            idx: 0,
        }
    }

    /// A palette-indexed color.
    pub fn indexed(idx: u8) -> Self {
        Self {
            ty: ColorType::INDEXED,
            red: 0,
            green: 0,
            blue: 0,
            idx,
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.ty.intersection(ColorType::TYPE_MASK) == ColorType::INDEXED
    }

    pub fn is_rgb(&self) -> bool {
        self.ty.intersection(ColorType::TYPE_MASK).is_empty()
    }

    pub fn is_default_fg(&self) -> bool {
        self.ty.contains(ColorType::DEFAULT_FG)
    }

    pub fn is_default_bg(&self) -> bool {
        self.ty.contains(ColorType::DEFAULT_BG)
    }

    /// This color with the given markers added.
    pub(crate) fn with_marker(mut self, marker: ColorType) -> Self {
        self.ty |= marker;
        self
    }
}

impl PartialEq for Color {
    fn eq(&self, other: &Self) -> bool {
        if self.ty != other.ty {
            return false;
        }
        if self.is_indexed() {
            self.idx == other.idx
        } else {
            (self.red, self.green, self.blue) == (other.red, other.green, other.blue)
        }
    }
}

impl Eq for Color {}

/// The ANSI 16-color defaults: the standard eight plus the high-intensity
/// set used by widely deployed pseudoterminal emulators.
pub(crate) const ANSI_PALETTE: [(u8, u8, u8); 16] = [
    (0, 0, 0),
    (224, 0, 0),
    (0, 224, 0),
    (224, 224, 0),
    (0, 0, 224),
    (224, 0, 224),
    (0, 224, 224),
    (224, 224, 224),
    (128, 128, 128),
    (255, 64, 64),
    (64, 255, 64),
    (255, 255, 64),
    (64, 64, 255),
    (255, 64, 255),
    (64, 255, 255),
    (255, 255, 255),
];

/// Channel ramp for the 6x6x6 color cube (indices 16..=231).
const RAMP_CUBE: [u8; 6] = [0x00, 0x5F, 0x87, 0xAF, 0xD7, 0xFF];

/// Resolve a palette index above the overridable range (16..=255) to RGB.
pub(crate) fn extended_palette_rgb(idx: u8) -> (u8, u8, u8) {
    if idx >= 232 {
        // 24-step grayscale ramp.
        let level = (idx - 232) * 10 + 8;
        (level, level, level)
    } else {
        let n = idx - 16;
        (
            RAMP_CUBE[usize::from(n / 36)],
            RAMP_CUBE[usize::from((n / 6) % 6)],
            RAMP_CUBE[usize::from(n % 6)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_kind_irrelevant_channels() {
        let a = Color {
            ty: ColorType::empty(),
            red: 1,
            green: 2,
            blue: 3,
            idx: 4,
        };
        let b = Color {
            ty: ColorType::empty(),
            red: 1,
            green: 2,
            blue: 3,
            idx: 5,
        };
        assert_eq!(a, b);

        let a = Color {
            ty: ColorType::INDEXED,
            red: 1,
            green: 2,
            blue: 3,
            idx: 4,
        };
        let b = Color {
            ty: ColorType::INDEXED,
            red: 5,
            green: 6,
            blue: 7,
            idx: 4,
        };
        assert_eq!(a, b);
    }

    #[test]
    fn equality_distinguishes_kind_and_channels() {
        assert_ne!(Color::rgb(1, 2, 3), Color::indexed(1));
        assert_ne!(Color::rgb(1, 2, 3), Color::rgb(5, 2, 3));
        assert_ne!(Color::rgb(1, 2, 3), Color::rgb(1, 5, 3));
        assert_ne!(Color::rgb(1, 2, 3), Color::rgb(1, 2, 5));
        assert_ne!(Color::indexed(4), Color::indexed(5));
    }

    #[test]
    fn equality_honors_default_markers() {
        let plain = Color::indexed(7);
        let marked = Color::indexed(7).with_marker(ColorType::DEFAULT_FG);
        assert_ne!(plain, marked);
        assert_eq!(marked, Color::indexed(7).with_marker(ColorType::DEFAULT_FG));
    }

    #[test]
    fn cube_and_grayscale_resolution() {
        assert_eq!(extended_palette_rgb(16), (0x00, 0x00, 0x00));
        // 196 is cube entry (5, 0, 0), the bright red of the 256-color set.
        assert_eq!(extended_palette_rgb(196), (0xFF, 0x00, 0x00));
        assert_eq!(extended_palette_rgb(21), (0x00, 0x00, 0xFF));
        assert_eq!(extended_palette_rgb(46), (0x00, 0xFF, 0x00));
        assert_eq!(extended_palette_rgb(110), (0x87, 0xAF, 0xD7));
        assert_eq!(extended_palette_rgb(231), (0xFF, 0xFF, 0xFF));
        assert_eq!(extended_palette_rgb(232), (0x08, 0x08, 0x08));
        assert_eq!(extended_palette_rgb(255), (0xEE, 0xEE, 0xEE));
    }
}
