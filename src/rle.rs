//! Byte oriented run-length codecs used by sprite formats of other engines.

mod agos;
mod fugger2;
mod saga;

pub use agos::decode_vertical;
pub use fugger2::decode_icon;
pub use saga::decode_sprite;

use crate::cel::{BitDepth, Geometry};
use crate::diagnostic::{DecodeStage, Diagnostic};
use crate::raster::{DecodedImage, PixelFormat};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RleCodec {
    /// Column-major runs with a signed count byte.
    Agos,
    /// Row-major pairs of transparent and literal runs.
    Saga,
    /// Row-major icons with transparent, repeat and literal control bytes.
    Fugger2,
}

impl RleCodec {
    pub fn decode(self, src: &[u8], geometry: Geometry) -> DecodedImage {
        match self {
            RleCodec::Agos => decode_vertical(src, geometry),
            RleCodec::Saga => decode_sprite(src, geometry),
            RleCodec::Fugger2 => decode_icon(src, geometry),
        }
    }
}

/// Eight bit index buffer shared by the byte codecs.
struct ByteCanvas {
    geometry: Geometry,
    pixels: Vec<u8>,
    transparency: Option<Vec<bool>>,
    written: usize,
}

impl ByteCanvas {
    fn new(geometry: Geometry, with_mask: bool) -> Self {
        let count = geometry.pixel_count();
        Self {
            geometry,
            pixels: vec![0; count],
            transparency: with_mask.then(|| vec![true; count]),
            written: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.written >= self.pixels.len()
    }

    fn finish(self, truncated: bool) -> DecodedImage {
        let diagnostics = if truncated {
            let diagnostic = Diagnostic::truncated(
                DecodeStage::Rows,
                format!(
                    "source ended after {} of {} pixels",
                    self.written,
                    self.pixels.len()
                ),
            );
            diagnostic.log();
            vec![diagnostic]
        } else {
            Vec::new()
        };

        DecodedImage {
            width: self.geometry.width,
            height: self.geometry.height,
            format: PixelFormat::Indexed(BitDepth::Eight),
            pixel_data: self.pixels,
            transparency: self.transparency,
            shading: None,
            palette: None,
            diagnostics,
        }
    }
}
