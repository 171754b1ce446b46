use image::Rgba;

/// An ordered list of RGBA colors. Lookups wrap around instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette(Vec<Rgba<u8>>);

impl Palette {
    pub fn new(colors: Vec<Rgba<u8>>) -> Self {
        Palette(colors)
    }

    /// Convert a slice of big-endian RGB555 entries into a palette.
    ///
    /// A trailing odd byte is ignored.
    pub fn from_rgb555_be(data: &[u8]) -> Self {
        let colors = data
            .chunks_exact(2)
            .map(|color| rgb555(u16::from_be_bytes([color[0], color[1]])))
            .collect();

        Palette(colors)
    }

    /// Evenly spaced gray ramp, used when an indexed image has no palette of its own.
    pub fn grayscale(entries: usize) -> Self {
        let max = entries.saturating_sub(1).max(1) as u32;
        let colors = (0..entries as u32)
            .map(|i| {
                let level = expand_channel(i, max);
                Rgba([level, level, level, 255])
            })
            .collect();

        Palette(colors)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn colors(&self) -> &[Rgba<u8>] {
        &self.0
    }

    /// Look up `palette[index % len]`. An empty palette yields transparent black.
    pub fn get(&self, index: usize) -> Rgba<u8> {
        if self.0.is_empty() {
            return Rgba([0, 0, 0, 0]);
        }

        self.0[index % self.0.len()]
    }
}

/// Scale a `max`-ranged channel value to 8 bits.
pub const fn expand_channel(value: u32, max: u32) -> u8 {
    ((value * 255) / max) as u8
}

/// `0RRRRRGGGGGBBBBB`, the top bit is ignored.
pub const fn rgb555(value: u16) -> Rgba<u8> {
    let value = value as u32;
    let r = (value >> 10) & 0x1F;
    let g = (value >> 5) & 0x1F;
    let b = value & 0x1F;

    Rgba([
        expand_channel(r, 0x1F),
        expand_channel(g, 0x1F),
        expand_channel(b, 0x1F),
        255,
    ])
}

/// `RRRGGGBB`
pub const fn rgb332(value: u8) -> Rgba<u8> {
    let value = value as u32;
    let r = (value >> 5) & 0x07;
    let g = (value >> 2) & 0x07;
    let b = value & 0x03;

    Rgba([
        expand_channel(r, 0x07),
        expand_channel(g, 0x07),
        expand_channel(b, 0x03),
        255,
    ])
}

/// Parse `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(text: &str) -> Option<Rgba<u8>> {
    let hex = text.strip_prefix('#').unwrap_or(text);
    if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
        return None;
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };

    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}
