//! Serialization stream used by the synchronization core.
//!
//! The core only decides *what* goes on the wire and in which order. This
//! crate supplies the primitives it writes with: optimized (varint) integers,
//! raw fixed-width integers, single bincode-encoded values and homogeneous
//! arrays. Both the turn snapshot transport and any other owned-data payload
//! go through [`SerializationWriter`] / [`SerializationReader`].

use std::hash::{BuildHasher, Hasher};
use std::io::{Cursor, Read, Write};

use ahash::RandomState;
use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Upper bound on the element count accepted by [`SerializationReader::read_array`].
///
/// Guards against allocating from a corrupt count prefix.
pub const MAX_ARRAY_LEN: i32 = 1 << 24;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec failed: {0}")]
    Codec(#[from] bincode::Error),
    #[error("negative array length {0}")]
    NegativeLength(i32),
    #[error("array length {0} exceeds limit {MAX_ARRAY_LEN}")]
    ArrayTooLong(i32),
}

/// Varint, little-endian, no size limit.
fn codec() -> bincode::DefaultOptions {
    bincode::DefaultOptions::new()
}

pub trait SerializationWriter {
    /// Write a length-prefixed optimized integer (zig-zag varint).
    fn write_optimized_int(&mut self, value: i32) -> Result<(), StreamError>;

    /// Write four little-endian bytes, bypassing the optimized encoding.
    fn write_raw_i32(&mut self, value: i32) -> Result<(), StreamError>;

    fn write_object<T: Serialize>(&mut self, value: &T) -> Result<(), StreamError>;

    /// Write an optimized-int element count followed by each element.
    fn write_array<T: Serialize>(&mut self, values: &[T]) -> Result<(), StreamError> {
        let len = i32::try_from(values.len()).map_err(|_| StreamError::ArrayTooLong(i32::MAX))?;
        if len > MAX_ARRAY_LEN {
            return Err(StreamError::ArrayTooLong(len));
        }
        self.write_optimized_int(len)?;
        for value in values {
            self.write_object(value)?;
        }
        Ok(())
    }
}

pub trait SerializationReader {
    fn read_optimized_int(&mut self) -> Result<i32, StreamError>;

    fn read_raw_i32(&mut self) -> Result<i32, StreamError>;

    fn read_object<T: DeserializeOwned>(&mut self) -> Result<T, StreamError>;

    fn read_array<T: DeserializeOwned>(&mut self) -> Result<Vec<T>, StreamError> {
        let len = self.read_optimized_int()?;
        if len < 0 {
            return Err(StreamError::NegativeLength(len));
        }
        if len > MAX_ARRAY_LEN {
            return Err(StreamError::ArrayTooLong(len));
        }
        let mut values = Vec::with_capacity(len as usize);
        for _ in 0..len {
            values.push(self.read_object()?);
        }
        Ok(values)
    }
}

/// [`SerializationWriter`] over any byte sink.
pub struct StreamWriter<W: Write> {
    inner: W,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> SerializationWriter for StreamWriter<W> {
    fn write_optimized_int(&mut self, value: i32) -> Result<(), StreamError> {
        codec().serialize_into(&mut self.inner, &value)?;
        Ok(())
    }

    fn write_raw_i32(&mut self, value: i32) -> Result<(), StreamError> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_object<T: Serialize>(&mut self, value: &T) -> Result<(), StreamError> {
        codec().serialize_into(&mut self.inner, value)?;
        Ok(())
    }
}

/// [`SerializationReader`] over any byte source.
pub struct StreamReader<R: Read> {
    inner: R,
}

impl<R: Read> StreamReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> SerializationReader for StreamReader<R> {
    fn read_optimized_int(&mut self) -> Result<i32, StreamError> {
        Ok(codec().deserialize_from(&mut self.inner)?)
    }

    fn read_raw_i32(&mut self) -> Result<i32, StreamError> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_object<T: DeserializeOwned>(&mut self) -> Result<T, StreamError> {
        Ok(codec().deserialize_from(&mut self.inner)?)
    }
}

/// Run `write` against an in-memory stream and return the produced bytes.
pub fn encode_with<F>(write: F) -> Result<Vec<u8>, StreamError>
where
    F: FnOnce(&mut StreamWriter<Vec<u8>>) -> Result<(), StreamError>,
{
    let mut writer = StreamWriter::new(Vec::new());
    write(&mut writer)?;
    Ok(writer.into_inner())
}

/// Run `read` against `bytes`.
pub fn decode_with<T, F>(bytes: &[u8], read: F) -> Result<T, StreamError>
where
    F: FnOnce(&mut StreamReader<Cursor<&[u8]>>) -> Result<T, StreamError>,
{
    let mut reader = StreamReader::new(Cursor::new(bytes));
    read(&mut reader)
}

/// Deterministic 64-bit checksum of an encoded payload.
///
/// Seeds are fixed so two processes hashing the same bytes agree.
pub fn payload_checksum(bytes: &[u8]) -> u64 {
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(bytes);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: i32,
        name: String,
    }

    #[test]
    fn optimized_int_is_compact_for_small_values() {
        let bytes = encode_with(|w| w.write_optimized_int(7)).unwrap();
        assert_eq!(bytes.len(), 1);
        let value = decode_with(&bytes, |r| r.read_optimized_int()).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn optimized_int_handles_negative_values() {
        let bytes = encode_with(|w| w.write_optimized_int(-1)).unwrap();
        let value = decode_with(&bytes, |r| r.read_optimized_int()).unwrap();
        assert_eq!(value, -1);
    }

    #[test]
    fn raw_i32_is_four_little_endian_bytes() {
        let bytes = encode_with(|w| w.write_raw_i32(0x0102_0304)).unwrap();
        assert_eq!(bytes, vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn mixed_sequence_reads_back_in_order() {
        let samples = vec![
            Sample {
                id: 1,
                name: "first".into(),
            },
            Sample {
                id: 2,
                name: "second".into(),
            },
        ];
        let bytes = encode_with(|w| {
            w.write_optimized_int(42)?;
            w.write_array(&samples)?;
            w.write_raw_i32(-5)?;
            w.write_object(&"tail".to_string())
        })
        .unwrap();

        let (turn, read_samples, raw, tail) = decode_with(&bytes, |r| {
            let turn = r.read_optimized_int()?;
            let read_samples: Vec<Sample> = r.read_array()?;
            let raw = r.read_raw_i32()?;
            let tail: String = r.read_object()?;
            Ok((turn, read_samples, raw, tail))
        })
        .unwrap();

        assert_eq!(turn, 42);
        assert_eq!(read_samples, samples);
        assert_eq!(raw, -5);
        assert_eq!(tail, "tail");
    }

    #[test]
    fn negative_array_length_is_rejected() {
        let bytes = encode_with(|w| w.write_optimized_int(-3)).unwrap();
        let err = decode_with(&bytes, |r| r.read_array::<Sample>()).unwrap_err();
        assert!(matches!(err, StreamError::NegativeLength(-3)));
    }

    #[test]
    fn truncated_input_is_an_error() {
        let err = decode_with(&[0x01, 0x02], |r| r.read_raw_i32()).unwrap_err();
        assert!(matches!(err, StreamError::Io(_)));
    }

    #[test]
    fn checksum_is_stable_and_content_sensitive() {
        let a = payload_checksum(b"turn-42");
        assert_eq!(a, payload_checksum(b"turn-42"));
        assert_ne!(a, payload_checksum(b"turn-43"));
    }
}
