//! Bounds-checked big-endian cursor over an immutable byte slice.
//!
//! This plays the same role as a hand-rolled `Cursor<Vec<u8>>` elsewhere in
//! this lineage, but every read is fallible and short reads never panic.

use crate::error::{JvmError, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

pub struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
    len: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteReader {
            cursor: Cursor::new(bytes),
            len: bytes.len(),
        }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn remaining(&self) -> usize {
        self.len.saturating_sub(self.cursor.position() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn eof_map<T>(r: std::io::Result<T>) -> Result<T> {
        r.map_err(|_| JvmError::UnexpectedEof)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Self::eof_map(self.cursor.read_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Self::eof_map(self.cursor.read_i8())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Self::eof_map(self.cursor.read_u16::<BigEndian>())
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Self::eof_map(self.cursor.read_i16::<BigEndian>())
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Self::eof_map(self.cursor.read_u32::<BigEndian>())
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Self::eof_map(self.cursor.read_i32::<BigEndian>())
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Self::eof_map(self.cursor.read_u64::<BigEndian>())
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Self::eof_map(self.cursor.read_i64::<BigEndian>())
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Self::eof_map(self.cursor.read_f32::<BigEndian>())
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Self::eof_map(self.cursor.read_f64::<BigEndian>())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        if self.remaining() < n {
            return Err(JvmError::UnexpectedEof);
        }
        let mut buf = vec![0u8; n];
        Self::eof_map(std::io::Read::read_exact(&mut self.cursor, &mut buf))?;
        Ok(buf)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(JvmError::UnexpectedEof);
        }
        self.cursor.set_position(self.cursor.position() + n as u64);
        Ok(())
    }
}

/// Implemented by anything that can be parsed off the front of a [`ByteReader`]
/// with no external context. Attribute bodies need the constant pool for name
/// resolution and are decoded through a separate, explicit path instead.
pub trait Decode: Sized {
    fn decode(reader: &mut ByteReader) -> Result<Self>;
}

macro_rules! impl_decode_primitive {
    ($ty:ty, $method:ident) => {
        impl Decode for $ty {
            fn decode(reader: &mut ByteReader) -> Result<Self> {
                reader.$method()
            }
        }
    };
}

impl_decode_primitive!(u8, read_u8);
impl_decode_primitive!(i8, read_i8);
impl_decode_primitive!(u16, read_u16);
impl_decode_primitive!(i16, read_i16);
impl_decode_primitive!(u32, read_u32);
impl_decode_primitive!(i32, read_i32);
impl_decode_primitive!(u64, read_u64);
impl_decode_primitive!(i64, read_i64);
impl_decode_primitive!(f32, read_f32);
impl_decode_primitive!(f64, read_f64);

/// `u16`-count-prefixed sequences are the common case throughout the class
/// file format (interfaces, exception tables, annotations, ...).
impl<T: Decode> Decode for Vec<T> {
    fn decode(reader: &mut ByteReader) -> Result<Self> {
        let count = reader.read_u16()?;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(T::decode(reader)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_primitives() {
        let bytes = [0x00, 0x01, 0x00, 0x00, 0x00, 0x02];
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_u16().unwrap(), 1);
        assert_eq!(r.read_u32().unwrap(), 2);
        assert!(r.is_empty());
    }

    #[test]
    fn short_read_is_eof_not_panic() {
        let bytes = [0x00];
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(r.read_u16(), Err(JvmError::UnexpectedEof)));
    }

    #[test]
    fn vec_decode_reads_u16_prefixed_count() {
        let bytes = [0x00, 0x02, 0x00, 0x05, 0x00, 0x06];
        let mut r = ByteReader::new(&bytes);
        let v: Vec<u16> = Vec::decode(&mut r).unwrap();
        assert_eq!(v, vec![5, 6]);
    }
}
