//! Bit-packed record format.
//!
//! A record is `varint(block_index)` followed by `batch_count` offsets of
//! `offset_bits` each. Records are packed back to back with no alignment;
//! only the end of a layer is padded (with zero bits) to a byte boundary.
//! Bits are written most-significant first.
//!
//! Varint: 8-bit groups, lowest 7 payload bits first. Each group is a
//! continuation bit (1 = another group follows) then 7 payload bits.

use lid_core::{LidError, Match, Result, BATCH_SIZE};

/// Longest varint accepted for a `u64`.
pub const MAX_VARINT_GROUPS: u32 = 10;
pub const MAX_VARINT_BITS: u64 = MAX_VARINT_GROUPS as u64 * 8;

#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    acc: u8,
    pending: u32,
    total_bits: u64,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `n` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u64, n: u32) {
        debug_assert!(n <= 64);
        for i in (0..n).rev() {
            let bit = ((value >> i) & 1) as u8;
            self.acc = (self.acc << 1) | bit;
            self.pending += 1;
            if self.pending == 8 {
                self.bytes.push(self.acc);
                self.acc = 0;
                self.pending = 0;
            }
        }
        self.total_bits += n as u64;
    }

    pub fn bit_len(&self) -> u64 {
        self.total_bits
    }

    /// Drain completed bytes, keeping any sub-byte remainder.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    /// Drain everything, zero-padding the remainder to a full byte.
    pub fn finish(mut self) -> Vec<u8> {
        if self.pending > 0 {
            self.bytes.push(self.acc << (8 - self.pending));
        }
        self.bytes
    }
}

/// Bit cursor over a growable byte buffer.
#[derive(Debug, Default, Clone)]
pub struct BitReader {
    bytes: Vec<u8>,
    pos: u64,
}

impl BitReader {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn extend(&mut self, more: &[u8]) {
        let consumed = (self.pos / 8) as usize;
        if consumed > 0 {
            self.bytes.drain(..consumed);
            self.pos -= consumed as u64 * 8;
        }
        self.bytes.extend_from_slice(more);
    }

    pub fn remaining_bits(&self) -> u64 {
        self.bytes.len() as u64 * 8 - self.pos
    }

    pub fn read_bits(&mut self, n: u32) -> Result<u64> {
        if (n as u64) > self.remaining_bits() {
            return Err(LidError::CorruptArtifact(format!(
                "needed {n} bits, only {} left",
                self.remaining_bits()
            )));
        }
        let mut value = 0u64;
        for _ in 0..n {
            let byte = self.bytes[(self.pos / 8) as usize];
            let bit = (byte >> (7 - (self.pos % 8))) & 1;
            value = (value << 1) | bit as u64;
            self.pos += 1;
        }
        Ok(value)
    }
}

/// Append `value` as a varint; returns the bits written.
pub fn write_varint(writer: &mut BitWriter, mut value: u64) -> u64 {
    let mut bits = 0;
    loop {
        let group = value & 0x7f;
        value >>= 7;
        let more = value != 0;
        writer.write_bits(more as u64, 1);
        writer.write_bits(group, 7);
        bits += 8;
        if !more {
            return bits;
        }
    }
}

/// Read a varint; returns the value and the bits it occupied.
pub fn read_varint(reader: &mut BitReader) -> Result<(u64, u64)> {
    let mut value = 0u64;
    for group_index in 0..MAX_VARINT_GROUPS {
        let more = reader
            .read_bits(1)
            .map_err(|_| LidError::CorruptArtifact("truncated varint".into()))?;
        let group = reader
            .read_bits(7)
            .map_err(|_| LidError::CorruptArtifact("truncated varint".into()))?;
        let shift = group_index * 7;
        if shift == 63 && group > 1 {
            return Err(LidError::CorruptArtifact("varint overflows 64 bits".into()));
        }
        value |= group << shift;
        if more == 0 {
            return Ok((value, (group_index as u64 + 1) * 8));
        }
    }
    Err(LidError::CorruptArtifact("varint longer than 10 groups".into()))
}

pub fn varint_bits(mut value: u64) -> u64 {
    let mut bits = 8;
    while value >= 0x80 {
        value >>= 7;
        bits += 8;
    }
    bits
}

/// A decoded record: one block and one offset per batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub block_index: u64,
    pub offsets: Vec<u32>,
}

impl Record {
    pub fn matches(&self) -> Vec<Match> {
        self.offsets.iter().map(|&o| Match::new(self.block_index, o)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordCodec {
    pub batch_count: usize,
    pub offset_bits: u32,
}

impl RecordCodec {
    pub fn new(batch_count: usize, offset_bits: u32) -> Self {
        Self { batch_count, offset_bits }
    }

    pub fn dictionary_size(&self) -> usize {
        1usize << self.offset_bits
    }

    /// Highest offset whose two-byte window fits in the dictionary.
    pub fn last_valid_offset(&self) -> u64 {
        (self.dictionary_size() - BATCH_SIZE) as u64
    }

    /// Upper bound on the bits of one record.
    pub fn max_record_bits(&self) -> u64 {
        MAX_VARINT_BITS + self.batch_count as u64 * self.offset_bits as u64
    }

    /// Bits of the record for `block_index`.
    pub fn record_bits(&self, block_index: u64) -> u64 {
        varint_bits(block_index) + self.batch_count as u64 * self.offset_bits as u64
    }

    /// Validate a full match set and append it; returns the bits written.
    pub fn encode(&self, matches: &[Match], writer: &mut BitWriter) -> Result<u64> {
        if matches.len() != self.batch_count {
            return Err(LidError::InvalidRecord(format!(
                "expected {} matches, got {}",
                self.batch_count,
                matches.len()
            )));
        }
        let Some(first) = matches.first() else {
            return Err(LidError::InvalidRecord("empty match set".into()));
        };
        let block_index = first.block_index;
        let last_valid = self.last_valid_offset();
        for m in matches {
            if m.block_index != block_index {
                return Err(LidError::InvalidRecord(format!(
                    "mixed blocks {block_index} and {}",
                    m.block_index
                )));
            }
            if m.length as usize != BATCH_SIZE {
                return Err(LidError::InvalidRecord(format!("match length {}", m.length)));
            }
            if m.batch_offset as u64 > last_valid {
                return Err(LidError::InvalidRecord(format!(
                    "offset {} runs past the {}-byte dictionary",
                    m.batch_offset,
                    self.dictionary_size()
                )));
            }
        }

        let mut bits = write_varint(writer, block_index);
        for m in matches {
            writer.write_bits(m.batch_offset as u64, self.offset_bits);
            bits += self.offset_bits as u64;
        }
        Ok(bits)
    }

    pub fn decode(&self, reader: &mut BitReader) -> Result<Record> {
        let (block_index, _) = read_varint(reader)?;
        let last_valid = self.last_valid_offset();
        let mut offsets = Vec::with_capacity(self.batch_count);
        for _ in 0..self.batch_count {
            let offset = reader.read_bits(self.offset_bits)?;
            if offset > last_valid {
                return Err(LidError::CorruptArtifact(format!(
                    "offset {offset} runs past the {}-byte dictionary",
                    self.dictionary_size()
                )));
            }
            offsets.push(offset as u32);
        }
        Ok(Record { block_index, offsets })
    }
}
