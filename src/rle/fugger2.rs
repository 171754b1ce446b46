use super::ByteCanvas;
use crate::cel::Geometry;
use crate::raster::DecodedImage;

const END_OF_ROW: u8 = 0x00;
const RUN: u8 = 0x80;
const REPEAT: u8 = 0x40;
const RUN_COUNT_MASK: u8 = 0x3F;

/// Decode a Fugger 2 icon: rows of control bytes, each row closed by `0x00`.
///
/// `0x01..=0x7F` copies that many literal bytes, `0x80..=0xBF` leaves
/// `(c & 0x3F) + 1` pixels transparent and `0xC0..=0xFF` repeats the next
/// byte `(c & 0x3F) + 1` times. Pixels past the row width are dropped.
pub fn decode_icon(src: &[u8], geometry: Geometry) -> DecodedImage {
    let mut canvas = ByteCanvas::new(geometry, true);
    let mut src = src.iter().copied();

    let truncated = 'rows: {
        for row in 0..geometry.height as usize {
            let mut col = 0;

            loop {
                let Some(control) = src.next() else {
                    break 'rows true;
                };

                match control {
                    END_OF_ROW => break,
                    count if count & RUN == 0 => {
                        for _ in 0..count {
                            let Some(value) = src.next() else {
                                break 'rows true;
                            };
                            canvas.put(row, col, value);
                            col += 1;
                        }
                    }
                    run => {
                        let count = usize::from(run & RUN_COUNT_MASK) + 1;
                        if run & REPEAT != 0 {
                            let Some(value) = src.next() else {
                                break 'rows true;
                            };
                            (col..col + count).for_each(|col| canvas.put(row, col, value));
                        }
                        col += count;
                    }
                }
            }
        }

        false
    };

    canvas.finish(truncated)
}

impl ByteCanvas {
    fn put(&mut self, row: usize, col: usize, value: u8) {
        let width = self.geometry.width as usize;
        if col >= width {
            return;
        }

        let i = row * width + col;
        self.pixels[i] = value;
        if let Some(mask) = &mut self.transparency {
            mask[i] = false;
        }
        self.written = self.written.max(i + 1);
    }
}
