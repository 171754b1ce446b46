use thiserror::Error;

const MAGIC: &[u8; 3] = b"FAB";
const HEADER_LEN: usize = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FabError {
    #[error("Data does not start with a FAB header")]
    InvalidHeader,
    #[error("Invalid shift value {0}, expected 10 to 13")]
    InvalidShift(u8),
    #[error("Passed the end of the input at offset {0:#x}")]
    InputExhausted(usize),
    #[error("Output exceeds the expected {0} bytes")]
    OutputOverflow(usize),
    #[error("Back reference {back} reaches before the start of the output at {position}")]
    InvalidBackref { back: usize, position: usize },
}

/// LZ decompressor for MADS `FAB` streams.
///
/// Control bits come LSB first from 16-bit little-endian words, interleaved
/// with the literal and offset bytes they describe.
#[derive(Debug, Clone)]
pub struct FabDecompressor<'a> {
    src: &'a [u8],
    dst: Vec<u8>,
    max_len: usize,

    /// index of the next byte to read
    read_index: usize,
    bit_buffer: u32,
    bits_left: u32,

    copy_ofs_shift: u32,
    copy_ofs_mask: u32,
    copy_len_mask: u32,
}

impl<'a> FabDecompressor<'a> {
    pub fn new(src: &'a [u8], max_len: usize) -> Result<Self, FabError> {
        if src.len() < HEADER_LEN || &src[..3] != MAGIC {
            return Err(FabError::InvalidHeader);
        }

        let shift = src[3];
        if !(10..=13).contains(&shift) {
            return Err(FabError::InvalidShift(shift));
        }
        let shift = u32::from(shift);
        let copy_ofs_shift = 16 - shift;

        Ok(Self {
            src,
            dst: Vec::with_capacity(max_len),
            max_len,

            read_index: HEADER_LEN,
            bit_buffer: u32::from(u16::from_le_bytes([src[4], src[5]])),
            bits_left: 16,

            copy_ofs_shift,
            copy_ofs_mask: (0xFF << (shift - 8)) & 0xFF,
            copy_len_mask: (1 << copy_ofs_shift) - 1,
        })
    }

    pub fn decompress(mut self) -> Result<Vec<u8>, FabError> {
        loop {
            if self.bit()? {
                let value = self.read()?;
                self.push(value)?;
                continue;
            }

            let (count, back) = if !self.bit()? {
                let count = ((u32::from(self.bit()?) << 1) | u32::from(self.bit()?)) + 2;
                let back = 0x100 - usize::from(self.read()?);
                (count, back)
            } else {
                let low = u32::from(self.read()?);
                let high = u32::from(self.read()?);

                let offset = (((high >> self.copy_ofs_shift) | self.copy_ofs_mask) << 8) | low;
                let back = 0x10000 - offset as usize;

                let count = match high & self.copy_len_mask {
                    0 => match self.read()? {
                        0 => break,
                        1 => continue,
                        n => u32::from(n) + 1,
                    },
                    n => n + 2,
                };
                (count, back)
            };

            self.copy_back(count as usize, back)?;
        }

        log::debug!(
            "FAB: {} bytes in, {} bytes out",
            self.read_index,
            self.dst.len()
        );
        Ok(self.dst)
    }

    fn read(&mut self) -> Result<u8, FabError> {
        let value = *self
            .src
            .get(self.read_index)
            .ok_or(FabError::InputExhausted(self.read_index))?;
        self.read_index += 1;
        Ok(value)
    }

    fn bit(&mut self) -> Result<bool, FabError> {
        self.bits_left -= 1;
        if self.bits_left == 0 {
            let low = self.read()?;
            let high = self.read()?;
            self.bit_buffer =
                (u32::from(u16::from_le_bytes([low, high])) << 1) | (self.bit_buffer & 1);
            self.bits_left = 16;
        }

        let bit = self.bit_buffer & 1;
        self.bit_buffer >>= 1;
        Ok(bit != 0)
    }

    fn push(&mut self, value: u8) -> Result<(), FabError> {
        if self.dst.len() == self.max_len {
            return Err(FabError::OutputOverflow(self.max_len));
        }
        self.dst.push(value);
        Ok(())
    }

    fn copy_back(&mut self, count: usize, back: usize) -> Result<(), FabError> {
        if back == 0 || back > self.dst.len() {
            return Err(FabError::InvalidBackref {
                back,
                position: self.dst.len(),
            });
        }

        for _ in 0..count {
            let value = self.dst[self.dst.len() - back];
            self.push(value)?;
        }

        Ok(())
    }
}

/// Decompress a whole FAB stream expected to produce at most `max_len` bytes.
pub fn decompress(src: &[u8], max_len: usize) -> Result<Vec<u8>, FabError> {
    FabDecompressor::new(src, max_len)?.decompress()
}
