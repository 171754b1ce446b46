use super::ByteCanvas;
use crate::cel::Geometry;

/// Decode a sprite stream of `(transparent run, literal run)` byte pairs,
/// each followed by the literal bytes, filling rows left to right.
pub fn decode_sprite(src: &[u8], geometry: Geometry) -> crate::DecodedImage {
    let mut canvas = ByteCanvas::new(geometry, true);
    let mut src = src.iter().copied();
    let mut truncated = false;

    'runs: while !canvas.is_full() {
        let (Some(background), Some(foreground)) = (src.next(), src.next()) else {
            truncated = true;
            break;
        };

        for _ in 0..background {
            canvas.skip();
        }

        for _ in 0..foreground {
            let Some(value) = src.next() else {
                truncated = true;
                break 'runs;
            };
            canvas.push_row_major(value);
        }
    }

    canvas.finish(truncated)
}

impl ByteCanvas {
    fn skip(&mut self) {
        self.written = (self.written + 1).min(self.pixels.len());
    }

    fn push_row_major(&mut self, value: u8) {
        if self.is_full() {
            return;
        }

        let i = self.written;
        self.pixels[i] = value;
        if let Some(mask) = &mut self.transparency {
            mask[i] = false;
        }
        self.written += 1;
    }
}
