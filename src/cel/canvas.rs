use super::packet::{PixelSink, Position};
use super::{BitDepth, FormatDescriptor, Geometry};
use crate::palette::{rgb332, rgb555};
use crate::raster::{DecodedImage, PixelFormat};

/// Palette index destination. Starts out fully transparent.
#[derive(Debug, Clone)]
pub struct IndexedCanvas {
    geometry: Geometry,
    depth: BitDepth,
    pixels: Vec<u8>,
    transparency: Vec<bool>,
    shading: Option<Vec<u8>>,
}

impl IndexedCanvas {
    pub fn new(geometry: Geometry, depth: BitDepth, with_shading: bool) -> Self {
        let count = geometry.pixel_count();

        Self {
            geometry,
            depth,
            pixels: vec![0; count * depth.bytes_per_index()],
            transparency: vec![true; count],
            shading: with_shading.then(|| vec![0; count]),
        }
    }

    fn index_of(&self, pos: Position) -> Option<usize> {
        (pos.col < self.geometry.width as usize && pos.row < self.geometry.height as usize)
            .then(|| pos.row * self.geometry.width as usize + pos.col)
    }
}

impl PixelSink for IndexedCanvas {
    fn opaque(&mut self, pos: Position, value: u32) {
        let Some(i) = self.index_of(pos) else {
            return;
        };

        let index = match &mut self.shading {
            Some(shading) => {
                let (shade, index) = split_amv(value as u8);
                shading[i] = shade;
                index as u32
            }
            None => value,
        };

        match self.depth.bytes_per_index() {
            2 => self.pixels[i * 2..i * 2 + 2].copy_from_slice(&(index as u16).to_be_bytes()),
            _ => self.pixels[i] = index as u8,
        }
        self.transparency[i] = false;
    }

    fn transparent(&mut self, pos: Position) {
        if let Some(i) = self.index_of(pos) {
            self.transparency[i] = true;
        }
    }
}

/// Split an 8bpp coded pixel into its AMV shade and five bit palette index.
pub const fn split_amv(value: u8) -> (u8, u8) {
    (value >> 5, value & 0x1F)
}

/// Direct color destination. Pixels never written keep zero alpha.
#[derive(Debug, Clone)]
pub struct RgbaCanvas {
    geometry: Geometry,
    depth: BitDepth,
    rgba: Vec<u8>,
}

impl RgbaCanvas {
    pub fn new(geometry: Geometry, depth: BitDepth) -> Self {
        assert!(
            matches!(depth, BitDepth::Eight | BitDepth::Sixteen),
            "uncoded pixels must be 8 or 16 bits, got {}",
            depth.bits()
        );

        Self {
            geometry,
            depth,
            rgba: vec![0; geometry.pixel_count() * 4],
        }
    }
}

impl PixelSink for RgbaCanvas {
    fn opaque(&mut self, pos: Position, value: u32) {
        if pos.col >= self.geometry.width as usize || pos.row >= self.geometry.height as usize {
            return;
        }

        let color = match self.depth {
            BitDepth::Eight => rgb332(value as u8),
            _ => rgb555(value as u16),
        };

        let i = (pos.row * self.geometry.width as usize + pos.col) * 4;
        self.rgba[i..i + 4].copy_from_slice(&color.0);
    }

    fn transparent(&mut self, _pos: Position) {}
}

/// The destination a format decodes into.
#[derive(Debug, Clone)]
pub enum Canvas {
    Indexed(IndexedCanvas),
    Rgba(RgbaCanvas),
}

impl Canvas {
    pub fn for_format(format: FormatDescriptor, geometry: Geometry) -> Self {
        if format.coded {
            Canvas::Indexed(IndexedCanvas::new(geometry, format.depth, format.has_shading()))
        } else {
            Canvas::Rgba(RgbaCanvas::new(geometry, format.depth))
        }
    }

    /// Turn the canvas into an image. Without `keep_mask` the transparency
    /// mask is dropped, for formats where every pixel is written.
    pub fn finish(self, keep_mask: bool) -> DecodedImage {
        match self {
            Canvas::Indexed(canvas) => DecodedImage {
                width: canvas.geometry.width,
                height: canvas.geometry.height,
                format: PixelFormat::Indexed(canvas.depth),
                pixel_data: canvas.pixels,
                transparency: keep_mask.then_some(canvas.transparency),
                shading: canvas.shading,
                palette: None,
                diagnostics: Vec::new(),
            },
            Canvas::Rgba(canvas) => DecodedImage {
                width: canvas.geometry.width,
                height: canvas.geometry.height,
                format: PixelFormat::Rgba32,
                pixel_data: canvas.rgba,
                transparency: None,
                shading: None,
                palette: None,
                diagnostics: Vec::new(),
            },
        }
    }
}

impl PixelSink for Canvas {
    fn opaque(&mut self, pos: Position, value: u32) {
        match self {
            Canvas::Indexed(canvas) => canvas.opaque(pos, value),
            Canvas::Rgba(canvas) => canvas.opaque(pos, value),
        }
    }

    fn transparent(&mut self, pos: Position) {
        match self {
            Canvas::Indexed(canvas) => canvas.transparent(pos),
            Canvas::Rgba(canvas) => canvas.transparent(pos),
        }
    }
}

/// Rows of unknown length, used while the dimensions are still being detected.
#[derive(Debug, Clone, Default)]
pub struct RowCollector {
    rows: Vec<Vec<Option<u32>>>,
}

impl RowCollector {
    fn slot(&mut self, pos: Position) -> &mut Option<u32> {
        if self.rows.len() <= pos.row {
            self.rows.resize_with(pos.row + 1, Vec::new);
        }
        let row = &mut self.rows[pos.row];
        if row.len() <= pos.col {
            row.resize(pos.col + 1, None);
        }
        &mut row[pos.col]
    }

    /// Note that `row` exists even if none of its pixels were written.
    pub fn touch_row(&mut self, row: usize) {
        if self.rows.len() <= row {
            self.rows.resize_with(row + 1, Vec::new);
        }
    }

    pub fn geometry(&self) -> Geometry {
        let width = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        Geometry::new(width as u32, self.rows.len() as u32)
    }

    pub fn replay<S: PixelSink + ?Sized>(&self, sink: &mut S) {
        for (row, pixels) in self.rows.iter().enumerate() {
            for (col, pixel) in pixels.iter().enumerate() {
                let pos = Position::new(row, col);
                match pixel {
                    Some(value) => sink.opaque(pos, *value),
                    None => sink.transparent(pos),
                }
            }
        }
    }
}

impl PixelSink for RowCollector {
    fn opaque(&mut self, pos: Position, value: u32) {
        *self.slot(pos) = Some(value);
    }

    fn transparent(&mut self, pos: Position) {
        *self.slot(pos) = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amv_split() {
        assert_eq!(split_amv(0xA3), (5, 3));
        assert_eq!(split_amv(0x1F), (0, 31));
        assert_eq!(split_amv(0xE0), (7, 0));
    }

    #[test]
    fn transparent_keeps_color_bytes() {
        let mut canvas = IndexedCanvas::new(Geometry::new(2, 1), BitDepth::Four, false);
        canvas.opaque(Position::new(0, 0), 7);
        canvas.transparent(Position::new(0, 0));

        let image = Canvas::Indexed(canvas).finish(true);
        assert_eq!(image.pixel_data, vec![7, 0]);
        assert_eq!(image.transparency, Some(vec![true, true]));
    }

    #[test]
    fn sixteen_bit_indices_are_big_endian() {
        let mut canvas = IndexedCanvas::new(Geometry::new(1, 1), BitDepth::Sixteen, false);
        canvas.opaque(Position::new(0, 0), 0x0123);
        assert_eq!(canvas.pixels, vec![0x01, 0x23]);
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut canvas = RgbaCanvas::new(Geometry::new(1, 1), BitDepth::Sixteen);
        canvas.opaque(Position::new(0, 1), 0x7FFF);
        canvas.opaque(Position::new(1, 0), 0x7FFF);
        assert_eq!(canvas.rgba, vec![0; 4]);
    }

    #[test]
    fn collector_geometry() {
        let mut collector = RowCollector::default();
        collector.opaque(Position::new(0, 2), 1);
        collector.touch_row(2);

        assert_eq!(collector.geometry(), Geometry::new(3, 3));
    }
}
