//! The `Module` attribute's nested requires/exports/opens/uses/provides
//! records (JPMS module descriptors).

use crate::error::Result;
use crate::read::{ByteReader, Decode};

#[derive(Debug, Clone)]
pub struct Requires {
    pub index: u16,
    pub flags: u16,
    pub version_idx: u16,
}

impl Decode for Requires {
    fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(Requires {
            index: reader.read_u16()?,
            flags: reader.read_u16()?,
            version_idx: reader.read_u16()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Exports {
    pub index: u16,
    pub flags: u16,
    pub to_index: Vec<u16>,
}

impl Decode for Exports {
    fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(Exports {
            index: reader.read_u16()?,
            flags: reader.read_u16()?,
            to_index: Vec::decode(reader)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Opens {
    pub index: u16,
    pub flags: u16,
    pub to_index: Vec<u16>,
}

impl Decode for Opens {
    fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(Opens {
            index: reader.read_u16()?,
            flags: reader.read_u16()?,
            to_index: Vec::decode(reader)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Provides {
    pub index: u16,
    pub with_index: Vec<u16>,
}

impl Decode for Provides {
    fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(Provides {
            index: reader.read_u16()?,
            with_index: Vec::decode(reader)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Module {
    pub name_idx: u16,
    pub flags: u16,
    pub version_idx: u16,
    pub requires: Vec<Requires>,
    pub exports: Vec<Exports>,
    pub opens: Vec<Opens>,
    pub uses_idx: Vec<u16>,
    pub provides: Vec<Provides>,
}

impl Decode for Module {
    fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(Module {
            name_idx: reader.read_u16()?,
            flags: reader.read_u16()?,
            version_idx: reader.read_u16()?,
            requires: Vec::decode(reader)?,
            exports: Vec::decode(reader)?,
            opens: Vec::decode(reader)?,
            uses_idx: Vec::decode(reader)?,
            provides: Vec::decode(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_empty_module() {
        let bytes = [
            0x00, 0x01, // name_idx
            0x00, 0x00, // flags
            0x00, 0x00, // version_idx
            0x00, 0x00, // n requires
            0x00, 0x00, // n exports
            0x00, 0x00, // n opens
            0x00, 0x00, // n uses
            0x00, 0x00, // n provides
        ];
        let mut r = ByteReader::new(&bytes);
        let module = Module::decode(&mut r).unwrap();
        assert_eq!(module.name_idx, 1);
        assert!(module.requires.is_empty());
        assert!(module.provides.is_empty());
    }
}
