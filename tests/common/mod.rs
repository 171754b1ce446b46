#![allow(dead_code)]

use celrip::cel::packet::MAX_RUN;

/// MSB-first bit packer matching the CEL bit order.
#[derive(Debug, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: usize,
}

impl BitWriter {
    pub fn write(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            if self.bits % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> i) & 1 != 0 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> (self.bits % 8);
            }
            self.bits += 1;
        }
    }

    pub fn align_to_word(&mut self) {
        while self.bits % 32 != 0 {
            self.write(0, 1);
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encode one packed row: offset header, packets and an end of line marker.
pub fn encode_row(row: &[Option<u32>], bpp: u32) -> Vec<u8> {
    let header_bits = if bpp >= 8 { 16 } else { 8 };

    let mut writer = BitWriter::default();
    writer.write(0, header_bits);

    let mut i = 0;
    while i < row.len() {
        match row[i] {
            None => {
                let run = row[i..]
                    .iter()
                    .take(MAX_RUN)
                    .take_while(|pixel| pixel.is_none())
                    .count();
                writer.write(0b10, 2);
                writer.write(run as u32 - 1, 6);
                i += run;
            }
            Some(value) => {
                let same = row[i..]
                    .iter()
                    .take(MAX_RUN)
                    .take_while(|&&pixel| pixel == Some(value))
                    .count();
                if same >= 2 {
                    writer.write(0b11, 2);
                    writer.write(same as u32 - 1, 6);
                    writer.write(value, bpp);
                    i += same;
                    continue;
                }

                let literal: Vec<u32> = row[i..]
                    .iter()
                    .take(MAX_RUN)
                    .map_while(|&pixel| pixel)
                    .collect();
                writer.write(0b01, 2);
                writer.write(literal.len() as u32 - 1, 6);
                for &value in &literal {
                    writer.write(value, bpp);
                }
                i += literal.len();
            }
        }
    }

    writer.write(0b00, 2);
    writer.align_to_word();
    let mut bytes = writer.into_bytes();
    if bytes.len() < 8 {
        bytes.resize(8, 0);
    }

    let offset = bytes.len() / 4 - 2;
    if bpp >= 8 {
        bytes[0] |= (offset >> 8) as u8 & 0b11;
        bytes[1] = offset as u8;
    } else {
        bytes[0] = offset as u8;
    }

    bytes
}

pub fn encode_rows(rows: &[Vec<Option<u32>>], bpp: u32) -> Vec<u8> {
    rows.iter().flat_map(|row| encode_row(row, bpp)).collect()
}

pub fn solid_rows(width: usize, height: usize, value: u32) -> Vec<Vec<Option<u32>>> {
    vec![vec![Some(value); width]; height]
}

pub fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut data = tag.to_vec();
    data.extend_from_slice(&(payload.len() as u32 + 8).to_be_bytes());
    data.extend_from_slice(payload);
    data
}

pub fn ccb(flags: u32, pre0: u32, pre1: u32, width: u32, height: u32) -> Vec<u8> {
    let mut payload = vec![0u8; 72];
    let mut put = |offset: usize, value: u32| {
        payload[offset..offset + 4].copy_from_slice(&value.to_be_bytes())
    };
    put(4, flags);
    put(52, 0x1F00_1F00);
    put(56, pre0);
    put(60, pre1);
    put(64, width);
    put(68, height);

    chunk(b"CCB ", &payload)
}

pub fn plut(colors: &[u16]) -> Vec<u8> {
    let mut payload = (colors.len() as u32).to_be_bytes().to_vec();
    for color in colors {
        payload.extend_from_slice(&color.to_be_bytes());
    }
    chunk(b"PLUT", &payload)
}

/// PRE0 for a coded depth code and row count.
pub fn pre0(depth_code: u32, uncoded: bool, height: u32) -> u32 {
    depth_code | if uncoded { 0x10 } else { 0 } | ((height - 1) << 6)
}

/// PRE1 for 8 and 16bpp rows: row stride in words and width.
pub fn pre1_wide(stride_words: u32, width: u32) -> u32 {
    ((stride_words - 2) << 16) | (width - 1)
}
