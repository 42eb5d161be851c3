//! Fixed named palettes.
//!
//! Static data; order within a palette only matters for tie-breaking in
//! nearest-color search (first minimum wins).

use image::Rgb;

use crate::color::Color;

#[derive(Debug, Clone, Copy)]
pub struct NamedPalette {
    pub key: &'static str,
    pub label: &'static str,
    pub colors: &'static [Color],
}

const fn c(hex: u32) -> Color {
    Rgb([(hex >> 16) as u8, (hex >> 8) as u8, hex as u8])
}

const PICO8: &[Color] = &[
    c(0x000000), c(0x1D2B53), c(0x7E2553), c(0x008751),
    c(0xAB5236), c(0x5F574F), c(0xC2C3C7), c(0xFFF1E8),
    c(0xFF004D), c(0xFFA300), c(0xFFEC27), c(0x00E436),
    c(0x29ADFF), c(0x83769C), c(0xFF77A8), c(0xFFCCAA),
];

const GAMEBOY: &[Color] = &[c(0x0F380F), c(0x306230), c(0x8BAC0F), c(0x9BBC0F)];

const CGA: &[Color] = &[c(0x000000), c(0x55FFFF), c(0xFF55FF), c(0xFFFFFF)];

const C64: &[Color] = &[
    c(0x000000), c(0xFFFFFF), c(0x68372B), c(0x70A4B2),
    c(0x6F3D86), c(0x588D43), c(0x352879), c(0xB8C76F),
    c(0x6F4F25), c(0x433900), c(0x9A6759), c(0x444444),
    c(0x6C6C6C), c(0x9AD284), c(0x6C5EB5), c(0x959595),
];

const SWEETIE16: &[Color] = &[
    c(0x1A1C2C), c(0x5D275D), c(0xB13E53), c(0xEF7D57),
    c(0xFFCD75), c(0xA7F070), c(0x38B764), c(0x257179),
    c(0x29366F), c(0x3B5DC9), c(0x41A6F6), c(0x73EFF7),
    c(0xF4F4F4), c(0x94B0C2), c(0x566C86), c(0x333C57),
];

const GRAYSCALE4: &[Color] = &[c(0x000000), c(0x555555), c(0xAAAAAA), c(0xFFFFFF)];

const ONE_BIT: &[Color] = &[c(0x000000), c(0xFFFFFF)];

pub const PALETTES: &[NamedPalette] = &[
    NamedPalette { key: "pico8", label: "PICO-8", colors: PICO8 },
    NamedPalette { key: "gameboy", label: "Game Boy", colors: GAMEBOY },
    NamedPalette { key: "cga", label: "CGA", colors: CGA },
    NamedPalette { key: "c64", label: "Commodore 64", colors: C64 },
    NamedPalette { key: "sweetie16", label: "Sweetie 16", colors: SWEETIE16 },
    NamedPalette { key: "grayscale", label: "Grayscale (4)", colors: GRAYSCALE4 },
    NamedPalette { key: "1bit", label: "1-Bit", colors: ONE_BIT },
];

/// Key meaning "no fixed palette"
pub const NO_PALETTE: &str = "none";

/// Look up a palette by key; `"none"` and unknown keys return `None`
pub fn lookup(key: &str) -> Option<&'static NamedPalette> {
    PALETTES.iter().find(|p| p.key.eq_ignore_ascii_case(key))
}
