use super::{
    decode, format_corrected, BitDepth, CelSource, DecodeError, DecodePolicy, FormatDescriptor,
    Geometry,
};
use crate::raster::{DecodedImage, PixelFormat};
use crate::Palette;
use std::fmt;

/// Chunk header: four byte tag and big-endian length covering the header itself.
pub const CHUNK_HEADER_LEN: usize = 8;
const CCB_PAYLOAD_LEN: usize = 72;

pub const CCB_PACKED: u32 = 0x0000_0200;
/// The preamble words live in the CCB instead of in front of the pixel data.
pub const CCB_CCBPRE: u32 = 0x0040_0000;

pub const PRE0_BPP_MASK: u32 = 0x0000_0007;
pub const PRE0_UNCODED: u32 = 0x0000_0010;
pub const PRE0_VCNT_SHIFT: u32 = 6;
pub const PRE0_VCNT_MASK: u32 = 0x3FF;
pub const PRE1_TLHPCNT_MASK: u32 = 0x7FF;
pub const PRE1_WOFFSET8_SHIFT: u32 = 24;
pub const PRE1_WOFFSET8_MASK: u32 = 0xFF;
pub const PRE1_WOFFSET10_SHIFT: u32 = 16;
pub const PRE1_WOFFSET10_MASK: u32 = 0x3FF;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkTag(pub [u8; 4]);

impl ChunkTag {
    pub const CCB: ChunkTag = ChunkTag(*b"CCB ");
    pub const PLUT: ChunkTag = ChunkTag(*b"PLUT");
    pub const PDAT: ChunkTag = ChunkTag(*b"PDAT");
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            let c = if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '.'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkTag('{self}')")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub offset: usize,
    pub tag: ChunkTag,
    pub length: u32,
    /// Chunk contents after the header.
    pub payload: &'a [u8],
}

/// Sequential walk over the chunks of a file. Stops after the first error.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

pub fn chunks(data: &[u8]) -> Chunks<'_> {
    Chunks {
        data,
        offset: 0,
        failed: false,
    }
}

impl<'a> Chunks<'a> {
    fn next_chunk(&mut self) -> Result<Option<Chunk<'a>>, DecodeError> {
        let rest = &self.data[self.offset..];
        if rest.is_empty() {
            return Ok(None);
        }

        if rest.len() < CHUNK_HEADER_LEN {
            if rest.iter().all(|&byte| byte == 0) {
                return Ok(None);
            }
            return Err(DecodeError::TruncatedChunk {
                offset: self.offset,
                tag: ChunkTag(padded_tag(rest)).to_string(),
            });
        }

        let tag = ChunkTag([rest[0], rest[1], rest[2], rest[3]]);
        let length = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]);

        if (length as usize) < CHUNK_HEADER_LEN {
            return Err(DecodeError::ChunkTooSmall {
                offset: self.offset,
                length,
            });
        }
        if length as usize > rest.len() {
            return Err(DecodeError::TruncatedChunk {
                offset: self.offset,
                tag: tag.to_string(),
            });
        }

        let chunk = Chunk {
            offset: self.offset,
            tag,
            length,
            payload: &rest[CHUNK_HEADER_LEN..length as usize],
        };
        self.offset += length as usize;

        Ok(Some(chunk))
    }
}

fn padded_tag(bytes: &[u8]) -> [u8; 4] {
    let mut tag = [b' '; 4];
    bytes
        .iter()
        .take(4)
        .enumerate()
        .for_each(|(i, &byte)| tag[i] = byte);
    tag
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Result<Chunk<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.next_chunk() {
            Ok(chunk) => chunk.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

fn be_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// The fields of a `CCB ` chunk the decoder needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcbHeader {
    pub version: u32,
    pub flags: u32,
    pub pixc: u32,
    pub pre0: u32,
    pub pre1: u32,
    pub width: i32,
    pub height: i32,
}

impl CcbHeader {
    /// Parse the payload of a `CCB ` chunk.
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        if payload.len() < CCB_PAYLOAD_LEN {
            return Err(DecodeError::ShortChunk {
                tag: ChunkTag::CCB.to_string(),
                length: payload.len() + CHUNK_HEADER_LEN,
            });
        }

        Ok(Self {
            version: be_u32(payload, 0),
            flags: be_u32(payload, 4),
            pixc: be_u32(payload, 52),
            pre0: be_u32(payload, 56),
            pre1: be_u32(payload, 60),
            width: be_u32(payload, 64) as i32,
            height: be_u32(payload, 68) as i32,
        })
    }

    pub fn is_packed(&self) -> bool {
        self.flags & CCB_PACKED != 0
    }

    pub fn preamble_in_header(&self) -> bool {
        self.flags & CCB_CCBPRE != 0
    }

    pub fn geometry(&self) -> Result<Geometry, DecodeError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(DecodeError::InvalidDimensions {
                width: self.width as i64,
                height: self.height as i64,
            });
        }

        Geometry::new(self.width as u32, self.height as u32).validate()
    }
}

/// The PRE0/PRE1 words describing the pixel data layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    pub pre0: u32,
    pub pre1: Option<u32>,
}

impl Preamble {
    pub fn depth(&self) -> Result<BitDepth, DecodeError> {
        BitDepth::from_preamble_code(self.pre0 & PRE0_BPP_MASK)
    }

    pub fn coded(&self) -> bool {
        self.pre0 & PRE0_UNCODED == 0
    }

    pub fn height(&self) -> u32 {
        ((self.pre0 >> PRE0_VCNT_SHIFT) & PRE0_VCNT_MASK) + 1
    }

    pub fn width(&self) -> Option<u32> {
        self.pre1.map(|pre1| (pre1 & PRE1_TLHPCNT_MASK) + 1)
    }

    /// Words per unpacked row, as stored in PRE1.
    pub fn row_stride_words(&self, depth: BitDepth) -> Option<usize> {
        let pre1 = self.pre1?;
        let offset = match depth {
            BitDepth::Eight | BitDepth::Sixteen => {
                (pre1 >> PRE1_WOFFSET10_SHIFT) & PRE1_WOFFSET10_MASK
            }
            _ => (pre1 >> PRE1_WOFFSET8_SHIFT) & PRE1_WOFFSET8_MASK,
        };
        Some(offset as usize + 2)
    }
}

/// What a container file turned out to hold.
#[derive(Debug, Clone)]
pub enum Extracted {
    Cels(Vec<DecodedImage>),
    /// A file with a PLUT chunk but no pixel data.
    PaletteOnly(Palette),
}

/// Parse the payload of a `PLUT` chunk: an entry count and RGB555 entries.
pub fn parse_plut(payload: &[u8]) -> Result<Palette, DecodeError> {
    if payload.len() < 4 {
        return Err(DecodeError::ShortChunk {
            tag: ChunkTag::PLUT.to_string(),
            length: payload.len() + CHUNK_HEADER_LEN,
        });
    }

    let count = be_u32(payload, 0) as usize;
    let entries = &payload[4..];
    let available = entries.len() / 2;
    if available < count {
        log::warn!("PLUT declares {count} entries but holds {available}");
    }

    Ok(Palette::from_rgb555_be(&entries[..count.min(available) * 2]))
}

struct PendingCel<'a> {
    header: CcbHeader,
    payload: &'a [u8],
    palette: Option<Palette>,
}

/// Walk a CEL file and decode every `PDAT` chunk with the `CCB ` before it.
///
/// Each cel gets the most recent `PLUT` at its position, or the last `PLUT`
/// of the file when none came before it.
pub fn parse(data: &[u8], policy: &DecodePolicy) -> Result<Extracted, DecodeError> {
    let mut header = None;
    let mut palette: Option<Palette> = None;
    let mut pending = Vec::new();

    for chunk in chunks(data) {
        let chunk = chunk?;
        log::debug!(
            "chunk '{}' at {:#x}, {} bytes",
            chunk.tag,
            chunk.offset,
            chunk.length
        );

        match chunk.tag {
            ChunkTag::CCB => header = Some(CcbHeader::parse(chunk.payload)?),
            ChunkTag::PLUT => palette = Some(parse_plut(chunk.payload)?),
            ChunkTag::PDAT => pending.push(PendingCel {
                header: header.ok_or(DecodeError::MissingHeader)?,
                payload: chunk.payload,
                palette: palette.clone(),
            }),
            _ => {}
        }
    }

    if pending.is_empty() {
        return palette
            .map(Extracted::PaletteOnly)
            .ok_or(DecodeError::NoImageData);
    }

    let cels = pending
        .into_iter()
        .map(|cel| {
            let image = decode_pdat(&cel.header, cel.payload, policy)?;
            Ok(match (image.format, cel.palette.or_else(|| palette.clone())) {
                (PixelFormat::Indexed(_), Some(palette)) => image.with_palette(palette),
                _ => image,
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    Ok(Extracted::Cels(cels))
}

/// Decode one `PDAT` payload described by `header`.
pub fn decode_pdat(
    header: &CcbHeader,
    payload: &[u8],
    policy: &DecodePolicy,
) -> Result<DecodedImage, DecodeError> {
    let geometry = header.geometry()?;
    let packed = header.is_packed();

    let (preamble, preamble_words) = if header.preamble_in_header() {
        let pre1 = (!packed).then_some(header.pre1);
        (Preamble { pre0: header.pre0, pre1 }, 0)
    } else {
        let words = if packed { 1 } else { 2 };
        if payload.len() < words * 4 {
            return Err(DecodeError::MissingPreamble);
        }
        let pre1 = (!packed).then(|| be_u32(payload, 4));
        (Preamble { pre0: be_u32(payload, 0), pre1 }, words)
    };

    let depth = preamble.depth()?;
    let coded = preamble.coded();
    if !coded && !matches!(depth, BitDepth::Eight | BitDepth::Sixteen) {
        return Err(DecodeError::UncodedDepth(depth.bits()));
    }
    if preamble.height() != geometry.height {
        log::debug!(
            "preamble height {} differs from CCB height {}",
            preamble.height(),
            geometry.height
        );
    }

    let claimed = FormatDescriptor::new(coded, packed, depth);
    let mut source =
        CelSource::new(&payload[preamble_words * 4..], claimed).with_geometry(geometry);
    if let Some(stride) = preamble.row_stride_words(depth) {
        source = source.with_row_stride(stride);
    }

    let format = source.effective_format(policy);
    if format == claimed {
        return decode(&source, policy);
    }

    // A packed payload only carries PRE0, so the second word is pixel data.
    let data = &payload[preamble_words.min(1) * 4..];
    let source = CelSource {
        data,
        format,
        row_stride_words: None,
        ..source
    };

    let mut image = decode(&source, policy)?;
    let diagnostic = format_corrected(payload.len());
    diagnostic.log();
    image.diagnostics.insert(0, diagnostic);

    Ok(image)
}
