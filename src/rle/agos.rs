use super::ByteCanvas;
use crate::cel::Geometry;

/// Decode a column-major run-length stream.
///
/// A count byte `n` read as signed selects a run of the next byte repeated
/// `n + 1` times when `n >= 0`, or `-n` literal bytes otherwise. Columns are
/// filled top to bottom, left to right.
pub fn decode_vertical(src: &[u8], geometry: Geometry) -> crate::DecodedImage {
    let mut canvas = ByteCanvas::new(geometry, false);
    let mut src = src.iter().copied();
    let mut truncated = false;

    while !canvas.is_full() {
        let Some(count) = src.next() else {
            truncated = true;
            break;
        };

        let count = count as i8;
        if count >= 0 {
            let Some(value) = src.next() else {
                truncated = true;
                break;
            };
            for _ in 0..=count {
                canvas.push_column_major(value);
            }
        } else {
            for _ in 0..count.unsigned_abs() {
                let Some(value) = src.next() else {
                    truncated = true;
                    break;
                };
                canvas.push_column_major(value);
            }
        }
    }

    canvas.finish(truncated)
}

impl ByteCanvas {
    fn push_column_major(&mut self, value: u8) {
        if self.is_full() {
            return;
        }

        let height = self.geometry.height as usize;
        let (col, row) = (self.written / height, self.written % height);
        self.pixels[row * self.geometry.width as usize + col] = value;
        self.written += 1;
    }
}
