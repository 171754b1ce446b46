use super::BitDepth;
use crate::bits::BitReader;

/// The 2-bit tag in front of every packet in a packed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    EndOfLine,
    Literal,
    Transparent,
    Repeat,
}

impl PacketType {
    pub const fn from_tag(tag: u32) -> Self {
        match tag & 0b11 {
            0 => PacketType::EndOfLine,
            1 => PacketType::Literal,
            2 => PacketType::Transparent,
            _ => PacketType::Repeat,
        }
    }

    pub const fn tag(self) -> u32 {
        match self {
            PacketType::EndOfLine => 0,
            PacketType::Literal => 1,
            PacketType::Transparent => 2,
            PacketType::Repeat => 3,
        }
    }
}

/// Counts are stored as `n - 1` in six bits.
pub const MAX_RUN: usize = 64;
const COUNT_BITS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    EndOfLine,
    Literal(Vec<u32>),
    Transparent(usize),
    Repeat { count: usize, value: u32 },
}

/// Location of the next pixel a packet writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub const fn advance(self, count: usize) -> Self {
        Self {
            row: self.row,
            col: self.col + count,
        }
    }
}

/// Destination of decoded pixel values.
pub trait PixelSink {
    fn opaque(&mut self, pos: Position, value: u32);
    fn transparent(&mut self, pos: Position);
}

impl Packet {
    /// Read one packet. Returns `None` when the source ends before the packet does.
    pub fn read(reader: &mut BitReader, depth: BitDepth) -> Option<Self> {
        if reader.remaining_bits() < 2 {
            return None;
        }

        let kind = PacketType::from_tag(reader.read_bits(2));
        if kind == PacketType::EndOfLine {
            return Some(Packet::EndOfLine);
        }

        if reader.remaining_bits() < COUNT_BITS as usize {
            return None;
        }
        let count = reader.read_bits(COUNT_BITS) as usize + 1;

        let bits = depth.bits();
        let needed = match kind {
            PacketType::Literal => count * bits as usize,
            PacketType::Repeat => bits as usize,
            _ => 0,
        };
        if reader.remaining_bits() < needed {
            return None;
        }

        let packet = match kind {
            PacketType::Literal => {
                Packet::Literal((0..count).map(|_| reader.read_bits(bits)).collect())
            }
            PacketType::Transparent => Packet::Transparent(count),
            PacketType::Repeat => Packet::Repeat {
                count,
                value: reader.read_bits(bits),
            },
            PacketType::EndOfLine => unreachable!(),
        };

        Some(packet)
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::EndOfLine => PacketType::EndOfLine,
            Packet::Literal(_) => PacketType::Literal,
            Packet::Transparent(_) => PacketType::Transparent,
            Packet::Repeat { .. } => PacketType::Repeat,
        }
    }

    pub fn pixel_count(&self) -> usize {
        match self {
            Packet::EndOfLine => 0,
            Packet::Literal(values) => values.len(),
            Packet::Transparent(count) | Packet::Repeat { count, .. } => *count,
        }
    }

    /// Write the packet's pixels from `pos` onwards, clipped at `width`,
    /// and return the position after the last pixel written.
    pub fn apply<S: PixelSink + ?Sized>(
        &self,
        sink: &mut S,
        pos: Position,
        width: usize,
    ) -> Position {
        let visible = self.pixel_count().min(width.saturating_sub(pos.col));

        match self {
            Packet::EndOfLine => {}
            Packet::Literal(values) => values
                .iter()
                .take(visible)
                .enumerate()
                .for_each(|(i, &value)| sink.opaque(pos.advance(i), value)),
            Packet::Transparent(_) => (0..visible).for_each(|i| sink.transparent(pos.advance(i))),
            Packet::Repeat { value, .. } => {
                (0..visible).for_each(|i| sink.opaque(pos.advance(i), *value))
            }
        }

        pos.advance(visible)
    }
}

/// Why a row stopped decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowEnd {
    Filled,
    EndOfLine,
    /// The cursor reached the next row's start.
    RowLimit,
    PacketLimit,
    /// The source ended inside the row.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOutcome {
    pub next_row_word: usize,
    pub end: Position,
    pub termination: RowEnd,
}

/// Decodes single packed rows: a row offset header followed by packets.
#[derive(Debug, Clone, Copy)]
pub struct RowDecoder {
    depth: BitDepth,
    max_packets: usize,
}

impl RowDecoder {
    pub fn new(depth: BitDepth, max_packets: usize) -> Self {
        Self { depth, max_packets }
    }

    /// Decode the row starting at the reader's next word boundary.
    ///
    /// Whatever the packets do, the reader is left at the row's declared end.
    pub fn decode_row<S: PixelSink + ?Sized>(
        &self,
        reader: &mut BitReader,
        row: usize,
        width: usize,
        sink: &mut S,
    ) -> RowOutcome {
        reader.align_to_word();
        let start_word = reader.word_position();
        let mut pos = Position::new(row, 0);

        let offset_bits = self.depth.row_offset_bits();
        if reader.remaining_bits() < 16 {
            reader.seek_to_word(usize::MAX);
            return RowOutcome {
                next_row_word: reader.word_position(),
                end: pos,
                termination: RowEnd::Exhausted,
            };
        }

        // 10 bit offsets sit in the low bits of a 16 bit field
        reader.skip_bits((16 - offset_bits as usize) % 8);
        let offset = reader.read_bits(offset_bits) as usize;
        let next_row_word = start_word + offset + 2;
        let limit = next_row_word * 32;

        let mut packets = 0;
        let termination = loop {
            if pos.col >= width {
                break RowEnd::Filled;
            }
            if reader.bit_position() >= limit {
                break RowEnd::RowLimit;
            }
            if packets == self.max_packets {
                break RowEnd::PacketLimit;
            }
            packets += 1;

            let Some(packet) = Packet::read(reader, self.depth) else {
                break RowEnd::Exhausted;
            };
            log::trace!("row {row}: {:?} x{}", packet.packet_type(), packet.pixel_count());

            if packet == Packet::EndOfLine {
                break RowEnd::EndOfLine;
            }
            pos = packet.apply(sink, pos, width);
        };

        reader.seek_to_word(next_row_word);

        RowOutcome {
            next_row_word,
            end: pos,
            termination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        pixels: Vec<(Position, Option<u32>)>,
    }

    impl PixelSink for Recorder {
        fn opaque(&mut self, pos: Position, value: u32) {
            self.pixels.push((pos, Some(value)));
        }

        fn transparent(&mut self, pos: Position) {
            self.pixels.push((pos, None));
        }
    }

    #[test]
    fn literal_count_is_stored_minus_one() {
        // 01 000101, then six 4 bit values
        let data = [0b0100_0101, 0x12, 0x34, 0x56, 0x00];
        let mut reader = BitReader::new(&data);

        let packet = Packet::read(&mut reader, BitDepth::Four).unwrap();
        assert_eq!(packet, Packet::Literal(vec![1, 2, 3, 4, 5, 6]));
        assert_eq!(packet.pixel_count(), 6);
    }

    #[test]
    fn repeat_and_transparent_packets() {
        // 11 000010 10101010 | 10 000000
        let data = [0b1100_0010, 0b1010_1010, 0b1000_0000];
        let mut reader = BitReader::new(&data);

        let repeat = Packet::read(&mut reader, BitDepth::Eight).unwrap();
        assert_eq!(repeat, Packet::Repeat { count: 3, value: 0xAA });

        let transparent = Packet::read(&mut reader, BitDepth::Eight).unwrap();
        assert_eq!(transparent, Packet::Transparent(1));
    }

    #[test]
    fn short_source_yields_no_packet() {
        // literal of 4 pixels at 8bpp needs 32 bits after the header
        let data = [0b0100_0011, 0xFF];
        let mut reader = BitReader::new(&data);
        assert_eq!(Packet::read(&mut reader, BitDepth::Eight), None);
    }

    #[test]
    fn apply_returns_next_position() {
        let mut sink = Recorder::default();
        let start = Position::new(2, 1);

        let next = Packet::Repeat { count: 3, value: 9 }.apply(&mut sink, start, 10);
        assert_eq!(next, Position::new(2, 4));

        let next = Packet::Transparent(2).apply(&mut sink, next, 10);
        assert_eq!(next, Position::new(2, 6));
        assert_eq!(sink.pixels.len(), 5);
        assert_eq!(sink.pixels[4], (Position::new(2, 5), None));
    }

    #[test]
    fn apply_clips_at_width() {
        let mut sink = Recorder::default();
        let next = Packet::Literal(vec![1, 2, 3, 4]).apply(&mut sink, Position::new(0, 2), 4);

        assert_eq!(next, Position::new(0, 4));
        assert_eq!(
            sink.pixels,
            vec![
                (Position::new(0, 2), Some(1)),
                (Position::new(0, 3), Some(2)),
            ]
        );
    }

    #[test]
    fn row_stops_at_declared_end() {
        // offset 0 -> row spans two words; the repeat packets run on past its end
        let data = [0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xAB, 0xCD, 0xEF, 0x01];
        let mut reader = BitReader::new(&data);
        let mut sink = Recorder::default();

        let decoder = RowDecoder::new(BitDepth::Two, 1000);
        let outcome = decoder.decode_row(&mut reader, 0, 1000, &mut sink);

        assert_eq!(outcome.next_row_word, 2);
        assert_eq!(outcome.termination, RowEnd::RowLimit);
        assert_eq!(reader.bit_position(), 64);
        assert_eq!(reader.peek_word(), 0xABCD_EF01);
    }

    #[test]
    fn packet_limit_cuts_row() {
        // 8bpp: 6 unused bits, 10 bit offset of 1, then transparent packets of one pixel
        let data = [0x00, 0x01, 0x80, 0x80, 0x80, 0x00, 0x00, 0x00];
        let mut reader = BitReader::new(&data);
        let mut sink = Recorder::default();

        let decoder = RowDecoder::new(BitDepth::Eight, 2);
        let outcome = decoder.decode_row(&mut reader, 0, 100, &mut sink);

        assert_eq!(outcome.termination, RowEnd::PacketLimit);
        assert_eq!(outcome.end.col, 2);
        assert_eq!(outcome.next_row_word, 3);
        assert_eq!(reader.bit_position(), 64);
    }
}
