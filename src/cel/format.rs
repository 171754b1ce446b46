use super::DecodeError;
use serde::Deserialize;

/// Pixel depths a CEL can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    One,
    Two,
    Four,
    Six,
    Eight,
    Sixteen,
}

impl BitDepth {
    pub const fn bits(self) -> u32 {
        match self {
            BitDepth::One => 1,
            BitDepth::Two => 2,
            BitDepth::Four => 4,
            BitDepth::Six => 6,
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(BitDepth::One),
            2 => Some(BitDepth::Two),
            4 => Some(BitDepth::Four),
            6 => Some(BitDepth::Six),
            8 => Some(BitDepth::Eight),
            16 => Some(BitDepth::Sixteen),
            _ => None,
        }
    }

    /// Decode the three bit depth field of PRE0.
    pub fn from_preamble_code(code: u32) -> Result<Self, DecodeError> {
        match code {
            1 => Ok(BitDepth::One),
            2 => Ok(BitDepth::Two),
            3 => Ok(BitDepth::Four),
            4 => Ok(BitDepth::Six),
            5 => Ok(BitDepth::Eight),
            6 => Ok(BitDepth::Sixteen),
            n => Err(DecodeError::InvalidDepthCode(n)),
        }
    }

    /// Width of the row offset field at the start of every packed row.
    pub const fn row_offset_bits(self) -> u32 {
        match self {
            BitDepth::Eight | BitDepth::Sixteen => 10,
            _ => 8,
        }
    }

    /// Bytes one pixel occupies in an indexed pixel buffer.
    pub const fn bytes_per_index(self) -> usize {
        match self {
            BitDepth::Sixteen => 2,
            _ => 1,
        }
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = DecodeError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        BitDepth::from_bits(bits).ok_or(DecodeError::InvalidDepthCode(bits))
    }
}

/// How the pixels of one CEL are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatDescriptor {
    /// Pixel values are palette indices.
    pub coded: bool,
    /// Rows are packet encoded with a row offset header.
    pub packed: bool,
    pub depth: BitDepth,
}

/// The row decoding approach a format resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStrategy {
    PackedIndexed,
    PackedRgb,
    Unpacked,
}

impl FormatDescriptor {
    pub const fn new(coded: bool, packed: bool, depth: BitDepth) -> Self {
        Self {
            coded,
            packed,
            depth,
        }
    }

    pub const fn strategy(&self) -> RowStrategy {
        match (self.packed, self.coded) {
            (true, true) => RowStrategy::PackedIndexed,
            (true, false) => RowStrategy::PackedRgb,
            (false, _) => RowStrategy::Unpacked,
        }
    }

    /// 8bpp coded pixels carry a three bit AMV next to a five bit index.
    pub const fn has_shading(&self) -> bool {
        self.coded && matches!(self.depth, BitDepth::Eight)
    }

    /// Uncoded pixels only exist as RGB332 and RGB555.
    pub const fn is_valid(&self) -> bool {
        self.coded || matches!(self.depth, BitDepth::Eight | BitDepth::Sixteen)
    }

    /// Size in bytes of `geometry` stored unpacked with word aligned rows.
    pub fn unpacked_len(&self, geometry: Geometry, row_stride_words: Option<usize>) -> usize {
        let stride = row_stride_words
            .unwrap_or_else(|| aligned_row_words(geometry.width, self.depth));
        stride * 4 * geometry.height as usize
    }

    /// Apply the packed-size heuristic: an unpacked claim whose payload is
    /// well below the size unpacked rows would need is treated as packed.
    pub fn corrected(self, expected_unpacked: usize, actual: usize, threshold: f64) -> Self {
        if !self.packed && should_force_packed(expected_unpacked, actual, threshold) {
            Self {
                packed: true,
                ..self
            }
        } else {
            self
        }
    }
}

pub fn should_force_packed(expected_unpacked: usize, actual: usize, threshold: f64) -> bool {
    expected_unpacked > 0 && (actual as f64) < (expected_unpacked as f64) * threshold
}

pub fn aligned_row_words(width: u32, depth: BitDepth) -> usize {
    (width as usize * depth.bits() as usize).div_ceil(32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

/// Widest cel the 11 bit TLHPCNT field of PRE1 can describe.
pub const MAX_WIDTH: u32 = 2048;
/// Tallest cel the 10 bit VCNT field of PRE0 can describe.
pub const MAX_HEIGHT: u32 = 1024;

impl Geometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Reject empty dimensions and anything a CEL header cannot describe.
    pub fn validate(self) -> Result<Self, DecodeError> {
        let fits =
            (1..=MAX_WIDTH).contains(&self.width) && (1..=MAX_HEIGHT).contains(&self.height);
        if !fits {
            return Err(DecodeError::InvalidDimensions {
                width: self.width as i64,
                height: self.height as i64,
            });
        }

        Ok(self)
    }

    pub const fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Tunables of the decoder that have no authoritative value in the format.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DecodePolicy {
    /// Fraction of the expected unpacked size below which data is assumed packed.
    pub packed_threshold: f64,
    /// Packets decoded per row before the row is cut off.
    pub max_packets_per_row: usize,
    /// Widest row accepted while detecting dimensions.
    pub max_detected_width: u32,
}

impl Default for DecodePolicy {
    fn default() -> Self {
        Self {
            packed_threshold: 0.75,
            max_packets_per_row: 1000,
            max_detected_width: 2048,
        }
    }
}
