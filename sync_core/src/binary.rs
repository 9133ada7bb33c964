//! Fixed-width little-endian primitives for the save header.

use std::io::{self, Read, Write};

/// A `u8`-backed enum whose discriminants are part of a persisted format.
///
/// Decoding goes through `TryFrom<u8>`, which hands back the unknown byte.
macro_rules! byte_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident default $default:ident {
            $($variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum $name {
            $($variant = $value),+
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(Self::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                value as u8
            }
        }
    };
}

pub(crate) use byte_enum;

pub(crate) fn write_u8<W: Write>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

pub(crate) fn write_bool<W: Write>(writer: &mut W, value: bool) -> io::Result<()> {
    write_u8(writer, u8::from(value))
}

pub(crate) fn write_i32<W: Write>(writer: &mut W, value: i32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

pub(crate) fn write_i64<W: Write>(writer: &mut W, value: i64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Length in 7-bit groups, low group first, high bit set on all but the last.
pub(crate) fn write_7bit_len<W: Write>(writer: &mut W, len: usize) -> io::Result<()> {
    let mut remaining = u32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "string too long"))?;
    while remaining >= 0x80 {
        write_u8(writer, (remaining as u8) | 0x80)?;
        remaining >>= 7;
    }
    write_u8(writer, remaining as u8)
}

pub(crate) fn write_string<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    write_7bit_len(writer, value.len())?;
    writer.write_all(value.as_bytes())
}

pub(crate) fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_bool<R: Read>(reader: &mut R) -> io::Result<bool> {
    Ok(read_u8(reader)? != 0)
}

pub(crate) fn read_i32<R: Read>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

pub(crate) fn read_i64<R: Read>(reader: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

pub(crate) fn read_7bit_len<R: Read>(reader: &mut R) -> io::Result<usize> {
    let mut value: u32 = 0;
    for group in 0..5 {
        let byte = read_u8(reader)?;
        value |= u32::from(byte & 0x7F) << (7 * group);
        if byte & 0x80 == 0 {
            return i32::try_from(value)
                .map(|len| len as usize)
                .map_err(|_| invalid_data("string length out of range"));
        }
    }
    Err(invalid_data("malformed 7-bit length"))
}

pub(crate) fn read_string<R: Read>(reader: &mut R) -> io::Result<String> {
    let len = read_7bit_len(reader)?;
    let mut bytes = Vec::new();
    reader.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
    }
    String::from_utf8(bytes).map_err(|_| invalid_data("string is not utf-8"))
}

fn invalid_data(message: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}
