//! The constant pool: a 1-indexed, tagged sequence of literals and symbolic
//! references that everything else in a class file points into.

use crate::error::{JvmError, Result};
use crate::read::ByteReader;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// `MethodHandle`'s reference_kind byte, per the class file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum ReferenceKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

#[derive(Debug, Clone)]
pub enum ConstantEntry {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_idx: u16 },
    String { utf8_idx: u16 },
    FieldRef { class_idx: u16, nat_idx: u16 },
    MethodRef { class_idx: u16, nat_idx: u16 },
    InterfaceMethodRef { class_idx: u16, nat_idx: u16 },
    NameAndType { name_idx: u16, desc_idx: u16 },
    MethodHandle { kind: ReferenceKind, ref_idx: u16 },
    MethodType { desc_idx: u16 },
    Dynamic { bsm_attr_idx: u16, nat_idx: u16 },
    InvokeDynamic { bsm_attr_idx: u16, nat_idx: u16 },
    Module { name_idx: u16 },
    Package { name_idx: u16 },
    /// The slot immediately following a `Long` or `Double` entry; never a
    /// legal target of a cross-reference.
    Unusable,
}

impl ConstantEntry {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            ConstantEntry::Utf8(_) => "Utf8",
            ConstantEntry::Integer(_) => "Integer",
            ConstantEntry::Float(_) => "Float",
            ConstantEntry::Long(_) => "Long",
            ConstantEntry::Double(_) => "Double",
            ConstantEntry::Class { .. } => "Class",
            ConstantEntry::String { .. } => "String",
            ConstantEntry::FieldRef { .. } => "FieldRef",
            ConstantEntry::MethodRef { .. } => "MethodRef",
            ConstantEntry::InterfaceMethodRef { .. } => "InterfaceMethodRef",
            ConstantEntry::NameAndType { .. } => "NameAndType",
            ConstantEntry::MethodHandle { .. } => "MethodHandle",
            ConstantEntry::MethodType { .. } => "MethodType",
            ConstantEntry::Dynamic { .. } => "Dynamic",
            ConstantEntry::InvokeDynamic { .. } => "InvokeDynamic",
            ConstantEntry::Module { .. } => "Module",
            ConstantEntry::Package { .. } => "Package",
            ConstantEntry::Unusable => "Unusable",
        }
    }

    fn read_one(reader: &mut ByteReader) -> Result<Self> {
        let tag = reader.read_u8()?;
        Ok(match tag {
            1 => {
                let len = reader.read_u16()? as usize;
                let bytes = reader.read_bytes(len)?;
                let text = cesu8::from_java_cesu8(&bytes)
                    .map_err(|_| JvmError::InvalidModifiedUtf8)?
                    .into_owned();
                ConstantEntry::Utf8(text)
            }
            3 => ConstantEntry::Integer(reader.read_i32()?),
            4 => ConstantEntry::Float(reader.read_f32()?),
            5 => ConstantEntry::Long(reader.read_i64()?),
            6 => ConstantEntry::Double(reader.read_f64()?),
            7 => ConstantEntry::Class {
                name_idx: reader.read_u16()?,
            },
            8 => ConstantEntry::String {
                utf8_idx: reader.read_u16()?,
            },
            9 => ConstantEntry::FieldRef {
                class_idx: reader.read_u16()?,
                nat_idx: reader.read_u16()?,
            },
            10 => ConstantEntry::MethodRef {
                class_idx: reader.read_u16()?,
                nat_idx: reader.read_u16()?,
            },
            11 => ConstantEntry::InterfaceMethodRef {
                class_idx: reader.read_u16()?,
                nat_idx: reader.read_u16()?,
            },
            12 => ConstantEntry::NameAndType {
                name_idx: reader.read_u16()?,
                desc_idx: reader.read_u16()?,
            },
            15 => {
                let kind_byte = reader.read_u8()?;
                let kind =
                    ReferenceKind::from_u8(kind_byte).ok_or(JvmError::BadCpTag { tag: kind_byte })?;
                ConstantEntry::MethodHandle {
                    kind,
                    ref_idx: reader.read_u16()?,
                }
            }
            16 => ConstantEntry::MethodType {
                desc_idx: reader.read_u16()?,
            },
            17 => ConstantEntry::Dynamic {
                bsm_attr_idx: reader.read_u16()?,
                nat_idx: reader.read_u16()?,
            },
            18 => ConstantEntry::InvokeDynamic {
                bsm_attr_idx: reader.read_u16()?,
                nat_idx: reader.read_u16()?,
            },
            19 => ConstantEntry::Module {
                name_idx: reader.read_u16()?,
            },
            20 => ConstantEntry::Package {
                name_idx: reader.read_u16()?,
            },
            other => return Err(JvmError::BadCpTag { tag: other }),
        })
    }

    fn is_wide(&self) -> bool {
        matches!(self, ConstantEntry::Long(_) | ConstantEntry::Double(_))
    }
}

/// A 1-indexed constant pool. `entries[0]` is logical index 1.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<ConstantEntry>,
}

impl ConstantPool {
    pub fn read(reader: &mut ByteReader) -> Result<Self> {
        let count = reader.read_u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        // Logical indices run 1..=count-1; index 0 is never used.
        let mut next_index = 1u16;
        while next_index < count {
            let entry = ConstantEntry::read_one(reader)?;
            let wide = entry.is_wide();
            entries.push(entry);
            next_index += 1;
            if wide {
                entries.push(ConstantEntry::Unusable);
                next_index += 1;
            }
        }
        Ok(ConstantPool { entries })
    }

    pub fn len(&self) -> u16 {
        self.entries.len() as u16 + 1
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u16) -> Result<&ConstantEntry> {
        if index == 0 || index as usize > self.entries.len() {
            return Err(JvmError::BadCpIndex {
                index,
                cp_size: self.len(),
            });
        }
        Ok(&self.entries[index as usize - 1])
    }

    fn expect<'a, T>(
        &'a self,
        index: u16,
        expected: &'static str,
        project: impl FnOnce(&'a ConstantEntry) -> Option<T>,
    ) -> Result<T> {
        let entry = self.get(index)?;
        project(entry).ok_or_else(|| JvmError::CpKindMismatch {
            expected,
            got: entry.kind_name(),
            index,
        })
    }

    pub fn utf8(&self, index: u16) -> Result<&str> {
        self.expect(index, "Utf8", |e| match e {
            ConstantEntry::Utf8(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn class_name(&self, index: u16) -> Result<&str> {
        let name_idx = self.expect(index, "Class", |e| match e {
            ConstantEntry::Class { name_idx } => Some(*name_idx),
            _ => None,
        })?;
        self.utf8(name_idx)
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        let (name_idx, desc_idx) = self.expect(index, "NameAndType", |e| match e {
            ConstantEntry::NameAndType { name_idx, desc_idx } => Some((*name_idx, *desc_idx)),
            _ => None,
        })?;
        Ok((self.utf8(name_idx)?, self.utf8(desc_idx)?))
    }

    pub fn integer(&self, index: u16) -> Result<i32> {
        self.expect(index, "Integer", |e| match e {
            ConstantEntry::Integer(v) => Some(*v),
            _ => None,
        })
    }

    pub fn float(&self, index: u16) -> Result<f32> {
        self.expect(index, "Float", |e| match e {
            ConstantEntry::Float(v) => Some(*v),
            _ => None,
        })
    }

    pub fn long(&self, index: u16) -> Result<i64> {
        self.expect(index, "Long", |e| match e {
            ConstantEntry::Long(v) => Some(*v),
            _ => None,
        })
    }

    pub fn double(&self, index: u16) -> Result<f64> {
        self.expect(index, "Double", |e| match e {
            ConstantEntry::Double(v) => Some(*v),
            _ => None,
        })
    }

    pub fn string(&self, index: u16) -> Result<&str> {
        let utf8_idx = self.expect(index, "String", |e| match e {
            ConstantEntry::String { utf8_idx } => Some(*utf8_idx),
            _ => None,
        })?;
        self.utf8(utf8_idx)
    }

    pub fn field_ref(&self, index: u16) -> Result<(u16, u16)> {
        self.expect(index, "FieldRef", |e| match e {
            ConstantEntry::FieldRef { class_idx, nat_idx } => Some((*class_idx, *nat_idx)),
            _ => None,
        })
    }

    pub fn method_ref(&self, index: u16) -> Result<(u16, u16)> {
        self.expect(index, "MethodRef", |e| match e {
            ConstantEntry::MethodRef { class_idx, nat_idx } => Some((*class_idx, *nat_idx)),
            _ => None,
        })
    }

    pub fn interface_method_ref(&self, index: u16) -> Result<(u16, u16)> {
        self.expect(index, "InterfaceMethodRef", |e| match e {
            ConstantEntry::InterfaceMethodRef { class_idx, nat_idx } => {
                Some((*class_idx, *nat_idx))
            }
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_bytes() -> Vec<u8> {
        // count=5: [1]=Utf8 "X", [2]=Long 42, [3]=Unusable, [4]=Class->1
        let mut bytes = vec![0x00, 0x05];
        bytes.extend_from_slice(&[1, 0, 1, b'X']); // Utf8
        bytes.extend_from_slice(&[5]); // Long tag
        bytes.extend_from_slice(&42i64.to_be_bytes());
        bytes.extend_from_slice(&[7, 0, 1]); // Class -> name_idx 1
        bytes
    }

    #[test]
    fn long_occupies_two_slots() {
        let bytes = pool_bytes();
        let mut r = ByteReader::new(&bytes);
        let pool = ConstantPool::read(&mut r).unwrap();
        assert_eq!(pool.len(), 5);
        assert!(matches!(pool.get(1).unwrap(), ConstantEntry::Utf8(s) if s == "X"));
        assert_eq!(pool.long(2).unwrap(), 42);
        assert!(matches!(pool.get(3).unwrap(), ConstantEntry::Unusable));
        assert_eq!(pool.class_name(4).unwrap(), "X");
    }

    #[test]
    fn index_zero_is_never_legal() {
        let bytes = pool_bytes();
        let mut r = ByteReader::new(&bytes);
        let pool = ConstantPool::read(&mut r).unwrap();
        assert!(matches!(pool.get(0), Err(JvmError::BadCpIndex { index: 0, .. })));
    }

    #[test]
    fn unknown_tag_is_an_error_not_a_panic() {
        let bytes = [0x00, 0x02, 0xFF, 0x00];
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            ConstantPool::read(&mut r),
            Err(JvmError::BadCpTag { tag: 0xFF })
        ));
    }

    #[test]
    fn kind_mismatch_reports_both_kinds() {
        let bytes = pool_bytes();
        let mut r = ByteReader::new(&bytes);
        let pool = ConstantPool::read(&mut r).unwrap();
        let err = pool.class_name(2).unwrap_err();
        assert!(matches!(
            err,
            JvmError::CpKindMismatch {
                expected: "Class",
                got: "Long",
                index: 2
            }
        ));
    }
}
