//! Positional, bounds-checked reads over account data

use crate::errors::DecodeError;
use solana_sdk::pubkey::Pubkey;

/// Cursor over a byte slice; every read checks the remaining length first
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    /// Borrow the next `len` bytes and advance
    pub fn read_bytes(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(DecodeError::Truncated {
                field,
                offset: self.offset,
                needed: len,
                available: self.remaining(),
            })?;

        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, field: &'static str, len: usize) -> Result<(), DecodeError> {
        self.read_bytes(field, len).map(|_| ())
    }

    fn read_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], DecodeError> {
        let bytes = self.read_bytes(field, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>(field)?[0])
    }

    pub fn read_u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        self.read_array::<4>(field).map(u32::from_le_bytes)
    }

    pub fn read_u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        self.read_array::<8>(field).map(u64::from_le_bytes)
    }

    pub fn read_i64(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        self.read_array::<8>(field).map(i64::from_le_bytes)
    }

    pub fn read_pubkey(&mut self, field: &'static str) -> Result<Pubkey, DecodeError> {
        self.read_array::<32>(field).map(Pubkey::new_from_array)
    }

    /// u32 little-endian length, then that many UTF-8 bytes; trailing NULs are trimmed
    pub fn read_string(&mut self, field: &'static str, max_len: usize) -> Result<String, DecodeError> {
        let len = self.read_u32(field)? as usize;
        if len > max_len {
            return Err(DecodeError::LengthOutOfRange {
                field,
                length: len,
                max: max_len,
            });
        }

        let bytes = self.read_bytes(field, len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { field })?;
        Ok(text.trim_end_matches('\0').to_string())
    }
}
