use crate::cel::{BitDepth, DecodeError};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::Palette;
use image::{Rgba, RgbaImage};

/// Layout of `DecodedImage::pixel_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Palette indices, one byte per pixel (two big-endian bytes at 16bpp).
    Indexed(BitDepth),
    /// Final colors, four bytes per pixel.
    Rgba32,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Indexed(depth) => depth.bytes_per_index(),
            PixelFormat::Rgba32 => 4,
        }
    }
}

/// The result of unpacking one bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixel_data: Vec<u8>,
    /// `true` marks a pixel that renders nothing.
    pub transparency: Option<Vec<bool>>,
    /// AMV brightness multipliers (0-7) for 8bpp coded pixels.
    pub shading: Option<Vec<u8>>,
    pub palette: Option<Palette>,
    pub diagnostics: Vec<Diagnostic>,
}

impl DecodedImage {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel()
    }

    /// Palette index of pixel `i`, for indexed images.
    pub fn index_at(&self, i: usize) -> Option<usize> {
        match self.format {
            PixelFormat::Indexed(BitDepth::Sixteen) => {
                let bytes = self.pixel_data.get(i * 2..i * 2 + 2)?;
                Some(u16::from_be_bytes([bytes[0], bytes[1]]) as usize)
            }
            PixelFormat::Indexed(_) => self.pixel_data.get(i).map(|&index| index as usize),
            PixelFormat::Rgba32 => None,
        }
    }

    pub fn is_transparent(&self, i: usize) -> bool {
        self.transparency
            .as_ref()
            .and_then(|mask| mask.get(i).copied())
            .unwrap_or(false)
    }

    pub fn is_truncated(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.kind == DiagnosticKind::Truncated)
    }

    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = Some(palette);
        self
    }

    /// Render with the image's own palette.
    pub fn to_rgba(&self) -> Result<RgbaImage, DecodeError> {
        self.to_rgba_with(self.palette.as_ref())
    }

    /// Render with an explicit palette.
    ///
    /// Direct color data is copied through. Indexed data needs a palette,
    /// indices past its end wrap around and shading scales each channel by
    /// `shade / 7`.
    pub fn to_rgba_with(&self, palette: Option<&Palette>) -> Result<RgbaImage, DecodeError> {
        if self.format == PixelFormat::Rgba32 {
            return RgbaImage::from_raw(self.width, self.height, self.pixel_data.clone())
                .ok_or(DecodeError::InvalidDimensions {
                    width: self.width as i64,
                    height: self.height as i64,
                });
        }

        let palette = palette.ok_or(DecodeError::MissingPalette)?;

        Ok(RgbaImage::from_fn(self.width, self.height, |x, y| {
            let i = y as usize * self.width as usize + x as usize;
            if self.is_transparent(i) {
                return Rgba([0, 0, 0, 0]);
            }

            let color = palette.get(self.index_at(i).unwrap_or(0));
            match self.shading.as_ref().and_then(|shading| shading.get(i)) {
                Some(&shade) => shade_color(color, shade),
                None => color,
            }
        }))
    }
}

/// Multiply each color channel by `shade / 7`.
pub fn shade_color(color: Rgba<u8>, shade: u8) -> Rgba<u8> {
    let scale = f32::from(shade.min(7)) / 7.0;
    let [r, g, b, a] = color.0;
    let channel = |value: u8| (f32::from(value) * scale) as u8;

    Rgba([channel(r), channel(g), channel(b), a])
}
