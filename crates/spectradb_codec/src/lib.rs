//! # SpectraDB Codec
//!
//! Deterministic binary encoding for SpectraDB database files.
//!
//! The format is fixed big-endian so files written on any machine read back
//! identically on any other:
//! - Integers and floats are written in network byte order
//! - Strings are u32-length-prefixed UTF-8, no terminator, no escaping
//! - Sequences, mappings and sets are u32-count-prefixed and built by
//!   recursion into the element routines
//! - File-path values are stored relative to the database file and resolved
//!   back on read, so saved files can be moved together with their assets
//!
//! ## Usage
//!
//! ```
//! use spectradb_codec::{Decoder, Encoder};
//!
//! let mut enc = Encoder::new();
//! enc.encode_u32(42);
//! enc.encode_str("lamp").unwrap();
//!
//! let bytes = enc.into_bytes();
//! let mut dec = Decoder::new(&bytes);
//! assert_eq!(dec.decode_u32().unwrap(), 42);
//! assert_eq!(dec.decode_str().unwrap(), "lamp");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod path;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{CodecError, CodecResult};
pub use path::{normalize, relativize, resolve};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn u64_roundtrip(v in any::<u64>()) {
            let mut enc = Encoder::new();
            enc.encode_u64(v);
            let bytes = enc.into_bytes();
            let mut dec = Decoder::new(&bytes);
            prop_assert_eq!(dec.decode_u64().unwrap(), v);
        }

        #[test]
        fn i32_roundtrip(v in any::<i32>()) {
            let mut enc = Encoder::new();
            enc.encode_i32(v);
            let bytes = enc.into_bytes();
            let mut dec = Decoder::new(&bytes);
            prop_assert_eq!(dec.decode_i32().unwrap(), v);
        }

        #[test]
        fn f64_roundtrip_is_bit_exact(v in any::<f64>()) {
            let mut enc = Encoder::new();
            enc.encode_f64(v);
            let bytes = enc.into_bytes();
            let mut dec = Decoder::new(&bytes);
            prop_assert_eq!(dec.decode_f64().unwrap().to_bits(), v.to_bits());
        }

        #[test]
        fn string_roundtrip(s in "\\PC*") {
            let mut enc = Encoder::new();
            enc.encode_str(&s).unwrap();
            let bytes = enc.into_bytes();
            let mut dec = Decoder::new(&bytes);
            prop_assert_eq!(dec.decode_str().unwrap(), s);
        }

        #[test]
        fn string_seq_roundtrip(items in proptest::collection::vec("\\PC*", 0..16)) {
            let mut enc = Encoder::new();
            enc.encode_seq(&items, |e, s| e.encode_str(s)).unwrap();
            let bytes = enc.into_bytes();
            let mut dec = Decoder::new(&bytes);
            prop_assert_eq!(dec.decode_seq(|d| d.decode_str()).unwrap(), items);
        }

        #[test]
        fn decoder_never_panics_on_garbage(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut dec = Decoder::new(&data);
            let _ = dec.decode_str();
            let _ = dec.decode_seq(|d| d.decode_u32());
            let _ = dec.decode_f64();
        }
    }
}
