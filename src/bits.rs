/// MSB-first bit cursor over a byte slice, addressed in 32-bit words.
///
/// Reads past the end of the buffer produce zero bits instead of failing, the
/// packet decoders rely on this near the end of truncated streams. The cursor
/// itself never moves beyond the end of the buffer.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}

const WORD_BITS: usize = 32;

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn len_bits(&self) -> usize {
        self.data.len() * 8
    }

    pub fn bit_position(&self) -> usize {
        self.position
    }

    pub fn word_position(&self) -> usize {
        self.position / WORD_BITS
    }

    pub fn remaining_bits(&self) -> usize {
        self.len_bits() - self.position
    }

    pub fn has_more_data(&self) -> bool {
        self.position < self.len_bits()
    }

    pub fn is_word_aligned(&self) -> bool {
        self.position % WORD_BITS == 0
    }

    /// Read `n` bits (1..=32) as an unsigned integer.
    pub fn read_bits(&mut self, n: u32) -> u32 {
        assert!((1..=32).contains(&n), "read_bits: unsupported width {n}");

        let byte = self.position / 8;
        let offset = (self.position % 8) as u32;

        // offset + n never exceeds 39, so five bytes always cover the read
        let window = (0..5).fold(0u64, |acc, i| {
            (acc << 8) | u64::from(self.data.get(byte + i).copied().unwrap_or(0))
        });
        let value = (window >> (40 - offset - n)) & ((1u64 << n) - 1);

        self.skip_bits(n as usize);
        value as u32
    }

    pub fn skip_bits(&mut self, n: usize) {
        self.position = (self.position + n).min(self.len_bits());
    }

    pub fn align_to_word(&mut self) {
        let misalignment = self.position % WORD_BITS;
        if misalignment != 0 {
            self.skip_bits(WORD_BITS - misalignment);
        }
    }

    pub fn seek_to_word(&mut self, word: usize) {
        self.position = word.saturating_mul(WORD_BITS).min(self.len_bits());
    }

    /// The next word-aligned big-endian word, without moving the cursor.
    pub fn peek_word(&self) -> u32 {
        let byte = self.position.div_ceil(WORD_BITS) * 4;
        (0..4).fold(0u32, |acc, i| {
            (acc << 8) | u32::from(self.data.get(byte + i).copied().unwrap_or(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_across_byte_boundary() {
        let data = [0xF0, 0x0F];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(12), 0xF00);
        assert_eq!(reader.read_bits(4), 0xF);
        assert!(!reader.has_more_data());
    }

    #[test]
    fn reads_mixed_widths() {
        let data = [0b1011_0100, 0b1100_1010, 0xDE, 0xAD, 0xBE, 0xEF];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(2), 0b10);
        assert_eq!(reader.read_bits(6), 0b11_0100);
        assert_eq!(reader.read_bits(3), 0b110);
        assert_eq!(reader.read_bits(5), 0b0_1010);
        assert_eq!(reader.read_bits(32), 0xDEAD_BEEF);
    }

    #[test]
    fn full_word_at_odd_offset() {
        let data = [0x80, 0x00, 0x00, 0x00, 0x01];
        let mut reader = BitReader::new(&data);

        reader.skip_bits(7);
        assert_eq!(reader.read_bits(32), 0x0000_0000);
        assert_eq!(reader.read_bits(1), 1);
    }

    #[test]
    fn past_end_reads_zero() {
        let data = [0xFF];
        let mut reader = BitReader::new(&data);

        assert_eq!(reader.read_bits(4), 0xF);
        assert_eq!(reader.read_bits(8), 0xF0);
        assert_eq!(reader.bit_position(), 8);
        assert_eq!(reader.read_bits(16), 0);
        assert_eq!(reader.bit_position(), 8);
    }

    #[test]
    fn align_is_idempotent() {
        let data = [0u8; 12];
        let mut reader = BitReader::new(&data);

        reader.skip_bits(5);
        reader.align_to_word();
        assert_eq!(reader.bit_position(), 32);
        reader.align_to_word();
        assert_eq!(reader.bit_position(), 32);
        assert!(reader.is_word_aligned());
    }

    #[test]
    fn seek_and_peek() {
        let data = [0, 0, 0, 1, 0x12, 0x34, 0x56, 0x78];
        let mut reader = BitReader::new(&data);

        reader.skip_bits(3);
        assert_eq!(reader.peek_word(), 0x1234_5678);
        assert_eq!(reader.bit_position(), 3);

        reader.seek_to_word(0);
        assert_eq!(reader.peek_word(), 1);

        reader.seek_to_word(5);
        assert_eq!(reader.bit_position(), 64);
        assert!(!reader.has_more_data());
        assert_eq!(reader.peek_word(), 0);
    }
}
