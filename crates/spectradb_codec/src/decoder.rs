//! Cursor-based big-endian decoder.

use crate::error::{CodecError, CodecResult};
use crate::path::resolve;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Maximum byte length accepted for a single string or raw byte run.
/// Prevents allocation-based blowups from corrupt length fields.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

/// Maximum element count accepted for sequences, maps and sets.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// A sequential decoder over a byte slice in the SpectraDB wire format.
///
/// The decoder is the reading counterpart of [`crate::Encoder`]: it consumes
/// values in the same order and byte layout they were written. When
/// constructed with [`Decoder::with_base`], stored relative path values are
/// resolved back to absolute paths against the base directory.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    base: Option<PathBuf>,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over `data` with no path base.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base: None,
        }
    }

    /// Creates a decoder that resolves stored path values against `base`.
    ///
    /// `base` is the directory that contains the file being read.
    pub fn with_base(data: &'a [u8], base: impl Into<PathBuf>) -> Self {
        Self {
            data,
            pos: 0,
            base: Some(base.into()),
        }
    }

    /// Returns the number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns `true` if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Consumes `len` raw bytes and returns them as a slice.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than `len` bytes remain.
    pub fn take_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Skips `len` bytes without interpreting them.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than `len` bytes remain.
    pub fn skip(&mut self, len: usize) -> CodecResult<()> {
        self.take_bytes(len).map(|_| ())
    }

    /// Reads a boolean byte, rejecting values other than 0 and 1.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF or an out-of-range byte.
    pub fn decode_bool(&mut self) -> CodecResult<bool> {
        match self.decode_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::invalid_value(format!(
                "boolean byte must be 0 or 1, got {other}"
            ))),
        }
    }

    /// Reads an unsigned 8-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF.
    pub fn decode_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take_bytes(1)?[0])
    }

    /// Reads a signed 8-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF.
    pub fn decode_i8(&mut self) -> CodecResult<i8> {
        Ok(self.decode_u8()? as i8)
    }

    /// Reads an unsigned 16-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF.
    pub fn decode_u16(&mut self) -> CodecResult<u16> {
        let bytes: [u8; 2] = self.take_bytes(2)?.try_into().map_err(|_| CodecError::UnexpectedEof)?;
        Ok(u16::from_be_bytes(bytes))
    }

    /// Reads a signed 16-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF.
    pub fn decode_i16(&mut self) -> CodecResult<i16> {
        Ok(self.decode_u16()? as i16)
    }

    /// Reads an unsigned 32-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF.
    pub fn decode_u32(&mut self) -> CodecResult<u32> {
        let bytes: [u8; 4] = self.take_bytes(4)?.try_into().map_err(|_| CodecError::UnexpectedEof)?;
        Ok(u32::from_be_bytes(bytes))
    }

    /// Reads a signed 32-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF.
    pub fn decode_i32(&mut self) -> CodecResult<i32> {
        Ok(self.decode_u32()? as i32)
    }

    /// Reads an unsigned 64-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF.
    pub fn decode_u64(&mut self) -> CodecResult<u64> {
        let bytes: [u8; 8] = self.take_bytes(8)?.try_into().map_err(|_| CodecError::UnexpectedEof)?;
        Ok(u64::from_be_bytes(bytes))
    }

    /// Reads a signed 64-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF.
    pub fn decode_i64(&mut self) -> CodecResult<i64> {
        Ok(self.decode_u64()? as i64)
    }

    /// Reads a 32-bit float from its big-endian bit pattern.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF.
    pub fn decode_f32(&mut self) -> CodecResult<f32> {
        Ok(f32::from_bits(self.decode_u32()?))
    }

    /// Reads a 64-bit float from its big-endian bit pattern.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF.
    pub fn decode_f64(&mut self) -> CodecResult<f64> {
        Ok(f64::from_bits(self.decode_u64()?))
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF, an oversized length field, or invalid UTF-8.
    pub fn decode_str(&mut self) -> CodecResult<String> {
        let len = u64::from(self.decode_u32()?);
        if len > MAX_BYTES_LENGTH {
            return Err(CodecError::length_limit(len, MAX_BYTES_LENGTH));
        }
        let bytes = self.take_bytes(len as usize)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8)
    }

    /// Reads a file-path value.
    ///
    /// An empty string decodes to the empty "no path" sentinel. A stored
    /// relative path is resolved against the decoder's base directory (if one
    /// was configured); absolute paths are returned as-is.
    ///
    /// # Errors
    ///
    /// Returns an error on EOF or invalid UTF-8.
    pub fn decode_path(&mut self) -> CodecResult<PathBuf> {
        let s = self.decode_str()?;
        if s.is_empty() {
            return Ok(PathBuf::new());
        }
        let stored = PathBuf::from(s);
        Ok(match &self.base {
            Some(base) => resolve(base, &stored),
            None => stored,
        })
    }

    /// Reads an ordered sequence written by [`crate::Encoder::encode_seq`].
    ///
    /// # Errors
    ///
    /// Returns an error on EOF, an oversized count, or element decode failure.
    pub fn decode_seq<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> CodecResult<T>,
    ) -> CodecResult<Vec<T>> {
        let count = self.container_count()?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(f(self)?);
        }
        Ok(items)
    }

    /// Reads an ordered mapping written by [`crate::Encoder::encode_map`].
    ///
    /// # Errors
    ///
    /// Returns an error on EOF, an oversized count, or entry decode failure.
    pub fn decode_map<K: Ord, V>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> CodecResult<(K, V)>,
    ) -> CodecResult<BTreeMap<K, V>> {
        let count = self.container_count()?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let (key, value) = f(self)?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Reads an ordered set written by [`crate::Encoder::encode_set`].
    ///
    /// # Errors
    ///
    /// Returns an error on EOF, an oversized count, or element decode failure.
    pub fn decode_set<T: Ord>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> CodecResult<T>,
    ) -> CodecResult<BTreeSet<T>> {
        let count = self.container_count()?;
        let mut set = BTreeSet::new();
        for _ in 0..count {
            set.insert(f(self)?);
        }
        Ok(set)
    }

    /// Reads an optional value written by [`crate::Encoder::encode_opt`].
    ///
    /// # Errors
    ///
    /// Returns an error on EOF or value decode failure.
    pub fn decode_opt<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> CodecResult<T>,
    ) -> CodecResult<Option<T>> {
        if self.decode_bool()? {
            f(self).map(Some)
        } else {
            Ok(None)
        }
    }

    fn container_count(&mut self) -> CodecResult<usize> {
        let count = u64::from(self.decode_u32()?);
        if count > MAX_CONTAINER_ELEMENTS {
            return Err(CodecError::length_limit(count, MAX_CONTAINER_ELEMENTS));
        }
        // Every element takes at least one byte; a count beyond the remaining
        // input is corrupt no matter what the elements are.
        if count > self.remaining() as u64 {
            return Err(CodecError::UnexpectedEof);
        }
        Ok(count as usize)
    }
}
