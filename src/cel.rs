//! 3DO CEL pixel data: packed and unpacked rows, coded and uncoded pixels.

mod canvas;
pub mod container;
mod error;
mod format;
pub mod packet;

pub use canvas::{split_amv, Canvas, IndexedCanvas, RgbaCanvas, RowCollector};
pub use error::DecodeError;
pub use format::{
    aligned_row_words, should_force_packed, BitDepth, DecodePolicy, FormatDescriptor, Geometry,
    RowStrategy, MAX_HEIGHT, MAX_WIDTH,
};
pub use packet::{Packet, PacketType, PixelSink, Position, RowDecoder, RowEnd};

use crate::bits::BitReader;
use crate::diagnostic::{DecodeStage, Diagnostic, DiagnosticKind, Severity};
use crate::raster::DecodedImage;

/// Raw pixel data plus everything known about its layout.
#[derive(Debug, Clone, Copy)]
pub struct CelSource<'a> {
    pub data: &'a [u8],
    pub format: FormatDescriptor,
    pub geometry: Option<Geometry>,
    /// Words per unpacked row when the header states it.
    pub row_stride_words: Option<usize>,
}

impl<'a> CelSource<'a> {
    pub fn new(data: &'a [u8], format: FormatDescriptor) -> Self {
        Self {
            data,
            format,
            geometry: None,
            row_stride_words: None,
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_row_stride(mut self, words: usize) -> Self {
        self.row_stride_words = Some(words).filter(|&words| words > 0);
        self
    }

    /// The format after the packed-size heuristic has been applied.
    pub fn effective_format(&self, policy: &DecodePolicy) -> FormatDescriptor {
        match self.geometry {
            Some(geometry) if !self.format.packed => {
                let expected = self.format.unpacked_len(geometry, self.row_stride_words);
                self.format
                    .corrected(expected, self.data.len(), policy.packed_threshold)
            }
            _ => self.format,
        }
    }
}

/// Decode a CEL pixel payload into an image.
///
/// # Panics
///
/// If the format asks for uncoded pixels at a depth other than 8 or 16 bits.
pub fn decode(source: &CelSource, policy: &DecodePolicy) -> Result<DecodedImage, DecodeError> {
    assert!(
        source.format.is_valid(),
        "uncoded pixels need 8 or 16 bits per pixel, got {}",
        source.format.depth.bits()
    );

    if let Some(geometry) = source.geometry {
        geometry.validate()?;
    }

    let mut diagnostics = Vec::new();

    let format = source.effective_format(policy);
    if format != source.format {
        diagnostics.push(format_corrected(source.data.len()));
    }

    let mut reader = BitReader::new(source.data);
    let decoder = RowDecoder::new(format.depth, policy.max_packets_per_row);

    let mut image = match (format.strategy(), source.geometry) {
        (RowStrategy::Unpacked, None) => return Err(DecodeError::UnknownDimensions),
        (RowStrategy::Unpacked, Some(geometry)) => {
            let mut canvas = Canvas::for_format(format, geometry);
            let stride = source
                .row_stride_words
                .unwrap_or_else(|| aligned_row_words(geometry.width, format.depth));
            let truncated =
                decode_unpacked(&mut reader, format.depth, geometry, stride, &mut canvas);
            // rows that were never reached stay transparent
            let keep_mask = truncated.is_some();
            diagnostics.extend(truncated);
            canvas.finish(keep_mask)
        }
        (_, Some(geometry)) => {
            let mut canvas = Canvas::for_format(format, geometry);
            diagnostics.extend(decode_packed(&mut reader, &decoder, geometry, &mut canvas));
            canvas.finish(true)
        }
        (_, None) => {
            let mut collector = RowCollector::default();
            diagnostics.extend(detect_packed(&mut reader, &decoder, policy, &mut collector));

            let geometry = collector.geometry().validate()?;
            diagnostics.push(Diagnostic::new(
                DecodeStage::Dispatch,
                Severity::Info,
                DiagnosticKind::DimensionsDetected,
                format!("detected {}x{} from the row stream", geometry.width, geometry.height),
            ));

            let mut canvas = Canvas::for_format(format, geometry);
            collector.replay(&mut canvas);
            canvas.finish(true)
        }
    };

    diagnostics.iter().for_each(Diagnostic::log);
    image.diagnostics = diagnostics;

    Ok(image)
}

fn decode_packed<S: PixelSink + ?Sized>(
    reader: &mut BitReader,
    decoder: &RowDecoder,
    geometry: Geometry,
    sink: &mut S,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for row in 0..geometry.height as usize {
        if !reader.has_more_data() {
            diagnostics.push(Diagnostic::truncated(
                DecodeStage::Rows,
                format!("pixel data ends before row {row} of {}", geometry.height),
            ));
            break;
        }

        let outcome = decoder.decode_row(reader, row, geometry.width as usize, sink);
        match outcome.termination {
            RowEnd::Exhausted => {
                diagnostics.push(Diagnostic::truncated(
                    DecodeStage::Rows,
                    format!("pixel data ends inside row {row} of {}", geometry.height),
                ));
                break;
            }
            RowEnd::PacketLimit => diagnostics.push(packet_limit(row)),
            _ => {}
        }
    }

    diagnostics
}

/// Decode rows until the data runs out or zero padding starts.
fn detect_packed(
    reader: &mut BitReader,
    decoder: &RowDecoder,
    policy: &DecodePolicy,
    collector: &mut RowCollector,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for row in 0..MAX_HEIGHT as usize {
        if !reader.has_more_data() || reader.peek_word() == 0 {
            break;
        }

        collector.touch_row(row);
        let width = policy.max_detected_width.min(MAX_WIDTH) as usize;
        let outcome = decoder.decode_row(reader, row, width, collector);
        match outcome.termination {
            RowEnd::Exhausted => {
                diagnostics.push(Diagnostic::truncated(
                    DecodeStage::Rows,
                    format!("pixel data ends inside row {row}"),
                ));
                break;
            }
            RowEnd::PacketLimit => diagnostics.push(packet_limit(row)),
            _ => {}
        }
    }

    diagnostics
}

fn decode_unpacked<S: PixelSink + ?Sized>(
    reader: &mut BitReader,
    depth: BitDepth,
    geometry: Geometry,
    stride_words: usize,
    sink: &mut S,
) -> Option<Diagnostic> {
    let bits = depth.bits();
    let row_bits = geometry.width as usize * bits as usize;

    for row in 0..geometry.height as usize {
        reader.seek_to_word(row * stride_words);
        if reader.remaining_bits() < row_bits {
            return Some(Diagnostic::truncated(
                DecodeStage::Rows,
                format!("pixel data ends before row {row} of {}", geometry.height),
            ));
        }

        for col in 0..geometry.width as usize {
            sink.opaque(Position::new(row, col), reader.read_bits(bits));
        }
    }

    None
}

pub(crate) fn format_corrected(len: usize) -> Diagnostic {
    Diagnostic::new(
        DecodeStage::Dispatch,
        Severity::Info,
        DiagnosticKind::FormatCorrected,
        format!("{len} bytes of pixel data is too small for unpacked rows, decoding as packed"),
    )
}

fn packet_limit(row: usize) -> Diagnostic {
    Diagnostic::new(
        DecodeStage::Rows,
        Severity::Warning,
        DiagnosticKind::PacketLimit,
        format!("row {row} exceeded the packet limit and was cut short"),
    )
}
