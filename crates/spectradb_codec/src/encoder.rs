//! Append-only big-endian encoder.

use crate::error::{CodecError, CodecResult};
use crate::path::relativize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// An append-only encoder producing the SpectraDB wire format.
///
/// All multi-byte integers and floats are written big-endian regardless of
/// host endianness, so files are portable across machines. Strings are
/// length-prefixed (u32) UTF-8 with no terminator.
///
/// When constructed with [`Encoder::with_base`], file-path values are
/// rewritten relative to the base directory before being written; an empty
/// path is the "no path" sentinel and is written verbatim.
#[derive(Debug, Default)]
pub struct Encoder {
    buffer: Vec<u8>,
    base: Option<PathBuf>,
}

impl Encoder {
    /// Creates a new encoder with no path base.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new encoder that relativizes path values against `base`.
    ///
    /// `base` is the directory that contains the file being written.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            buffer: Vec::new(),
            base: Some(base.into()),
        }
    }

    /// Consumes the encoder and returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Returns the encoded bytes so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns the number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Writes raw bytes without a length prefix.
    pub fn encode_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes a boolean as a single byte (0 or 1).
    pub fn encode_bool(&mut self, v: bool) {
        self.buffer.push(u8::from(v));
    }

    /// Writes an unsigned 8-bit integer.
    pub fn encode_u8(&mut self, v: u8) {
        self.buffer.push(v);
    }

    /// Writes a signed 8-bit integer.
    pub fn encode_i8(&mut self, v: i8) {
        self.buffer.push(v as u8);
    }

    /// Writes an unsigned 16-bit integer.
    pub fn encode_u16(&mut self, v: u16) {
        self.buffer.extend_from_slice(&v.to_be_bytes());
    }

    /// Writes a signed 16-bit integer.
    pub fn encode_i16(&mut self, v: i16) {
        self.buffer.extend_from_slice(&v.to_be_bytes());
    }

    /// Writes an unsigned 32-bit integer.
    pub fn encode_u32(&mut self, v: u32) {
        self.buffer.extend_from_slice(&v.to_be_bytes());
    }

    /// Writes a signed 32-bit integer.
    pub fn encode_i32(&mut self, v: i32) {
        self.buffer.extend_from_slice(&v.to_be_bytes());
    }

    /// Writes an unsigned 64-bit integer.
    pub fn encode_u64(&mut self, v: u64) {
        self.buffer.extend_from_slice(&v.to_be_bytes());
    }

    /// Writes a signed 64-bit integer.
    pub fn encode_i64(&mut self, v: i64) {
        self.buffer.extend_from_slice(&v.to_be_bytes());
    }

    /// Writes a 32-bit float as its big-endian bit pattern.
    pub fn encode_f32(&mut self, v: f32) {
        self.buffer.extend_from_slice(&v.to_bits().to_be_bytes());
    }

    /// Writes a 64-bit float as its big-endian bit pattern.
    pub fn encode_f64(&mut self, v: f64) {
        self.buffer.extend_from_slice(&v.to_bits().to_be_bytes());
    }

    /// Writes a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is longer than `u32::MAX` bytes.
    pub fn encode_str(&mut self, s: &str) -> CodecResult<()> {
        let len = u32::try_from(s.len())
            .map_err(|_| CodecError::length_limit(s.len() as u64, u64::from(u32::MAX)))?;
        self.encode_u32(len);
        self.buffer.extend_from_slice(s.as_bytes());
        Ok(())
    }

    /// Writes a file-path value.
    ///
    /// A non-empty path is rewritten relative to the encoder's base directory
    /// (if one was configured) and stored as a string with `/` separators.
    /// An empty path is the "no path" sentinel and skips conversion.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not valid UTF-8.
    pub fn encode_path(&mut self, path: &Path) -> CodecResult<()> {
        if path.as_os_str().is_empty() {
            return self.encode_str("");
        }
        let stored = match &self.base {
            Some(base) => relativize(base, path),
            None => path.to_path_buf(),
        };
        let s = stored
            .to_str()
            .ok_or_else(|| CodecError::non_utf8_path(&stored))?;
        // Portable separator so files written on Windows load elsewhere.
        let portable = s.replace('\\', "/");
        self.encode_str(&portable)
    }

    /// Writes an ordered sequence: u32 count followed by each element.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence is longer than `u32::MAX` elements,
    /// or if the element encoder fails.
    pub fn encode_seq<T>(
        &mut self,
        items: &[T],
        mut f: impl FnMut(&mut Self, &T) -> CodecResult<()>,
    ) -> CodecResult<()> {
        let len = u32::try_from(items.len())
            .map_err(|_| CodecError::length_limit(items.len() as u64, u64::from(u32::MAX)))?;
        self.encode_u32(len);
        for item in items {
            f(self, item)?;
        }
        Ok(())
    }

    /// Writes an ordered key-value mapping: u32 count followed by each pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the map is larger than `u32::MAX` entries, or if
    /// the entry encoder fails.
    pub fn encode_map<K, V>(
        &mut self,
        map: &BTreeMap<K, V>,
        mut f: impl FnMut(&mut Self, &K, &V) -> CodecResult<()>,
    ) -> CodecResult<()> {
        let len = u32::try_from(map.len())
            .map_err(|_| CodecError::length_limit(map.len() as u64, u64::from(u32::MAX)))?;
        self.encode_u32(len);
        for (key, value) in map {
            f(self, key, value)?;
        }
        Ok(())
    }

    /// Writes an ordered set: u32 count followed by each element.
    ///
    /// # Errors
    ///
    /// Returns an error if the set is larger than `u32::MAX` elements, or if
    /// the element encoder fails.
    pub fn encode_set<T>(
        &mut self,
        set: &BTreeSet<T>,
        mut f: impl FnMut(&mut Self, &T) -> CodecResult<()>,
    ) -> CodecResult<()> {
        let len = u32::try_from(set.len())
            .map_err(|_| CodecError::length_limit(set.len() as u64, u64::from(u32::MAX)))?;
        self.encode_u32(len);
        for item in set {
            f(self, item)?;
        }
        Ok(())
    }

    /// Writes an optional value as a presence byte followed by the value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value encoder fails.
    pub fn encode_opt<T>(
        &mut self,
        value: Option<&T>,
        f: impl FnOnce(&mut Self, &T) -> CodecResult<()>,
    ) -> CodecResult<()> {
        match value {
            Some(v) => {
                self.encode_bool(true);
                f(self, v)
            }
            None => {
                self.encode_bool(false);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut enc = Encoder::new();
        enc.encode_u32(1);
        assert_eq!(enc.as_bytes(), &[0, 0, 0, 1]);

        let mut enc = Encoder::new();
        enc.encode_u16(0xABCD);
        assert_eq!(enc.as_bytes(), &[0xAB, 0xCD]);

        let mut enc = Encoder::new();
        enc.encode_u64(0x0102_0304_0506_0708);
        assert_eq!(enc.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn string_is_length_prefixed() {
        let mut enc = Encoder::new();
        enc.encode_str("abc").unwrap();
        assert_eq!(enc.as_bytes(), &[0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn empty_path_written_verbatim() {
        let mut enc = Encoder::with_base("/proj");
        enc.encode_path(Path::new("")).unwrap();
        assert_eq!(enc.as_bytes(), &[0, 0, 0, 0]);
    }

    #[test]
    fn path_relativized_against_base() {
        let mut enc = Encoder::with_base("/proj/scenes");
        enc.encode_path(Path::new("/proj/assets/a.obj")).unwrap();
        let expected = b"../assets/a.obj";
        assert_eq!(&enc.as_bytes()[4..], expected.as_slice());
    }

    #[test]
    fn seq_has_count_prefix() {
        let mut enc = Encoder::new();
        enc.encode_seq(&[1u8, 2, 3], |e, v| {
            e.encode_u8(*v);
            Ok(())
        })
        .unwrap();
        assert_eq!(enc.as_bytes(), &[0, 0, 0, 3, 1, 2, 3]);
    }
}
