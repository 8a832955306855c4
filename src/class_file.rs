//! Top-level class file structure and the decoder that drives the whole
//! forward pass over a `.class` byte range.

use crate::attribute::{Attribute, AttributeContext};
use crate::constant_pool::ConstantPool;
use crate::error::{JvmError, Result};
use crate::read::ByteReader;
use crate::version::{check_magic, ClassVersion};
use bitflags::bitflags;
use log::debug;

bitflags! {
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }
}

bitflags! {
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

/// This spec, unlike a strict reading of the class file format, does not
/// reject unknown access-flag bits: real-world class files produced by
/// newer compilers routinely set bits this crate doesn't yet model, and
/// failing the whole load over an unrecognized flag bit would be more
/// surprising than useful. `bitflags`'s `from_bits_truncate` silently
/// drops them instead.
fn class_access_flags(bits: u16) -> ClassAccessFlags {
    ClassAccessFlags::from_bits_truncate(bits)
}

fn field_access_flags(bits: u16) -> FieldAccessFlags {
    FieldAccessFlags::from_bits_truncate(bits)
}

fn method_access_flags(bits: u16) -> MethodAccessFlags {
    MethodAccessFlags::from_bits_truncate(bits)
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access_flags: FieldAccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access_flags: MethodAccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

impl MethodInfo {
    /// The `Code` attribute, if this method has a body (it won't for
    /// `abstract` or `native` methods).
    pub fn code(&self) -> Option<&crate::attribute::CodeAttr> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Code(code) => Some(code),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub version: ClassVersion,
    pub constants: ConstantPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<Attribute>,
}

/// The result of [`ClassFile::peek`]: enough to index a class by name
/// without paying for fields/methods/attributes.
#[derive(Debug, Clone)]
pub struct PeekedClass {
    pub access_flags: ClassAccessFlags,
    pub this_class: String,
    pub super_class: Option<String>,
}

/// Strict mode promotes attribute-context and constant-pool structural
/// violations from warnings to hard errors. Kept as its own type (rather
/// than a bare `bool` parameter) so later options have somewhere to live
/// without changing every call site.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoaderConfig {
    pub strict: bool,
}

impl ClassFile {
    pub fn read(reader: &mut ByteReader, config: LoaderConfig) -> Result<Self> {
        check_magic(reader)?;
        let version = ClassVersion::read(reader)?;
        let constants = ConstantPool::read(reader)?;
        if config.strict {
            Self::validate_pool(&constants)?;
        }

        let access_flags = class_access_flags(reader.read_u16()?);
        let this_class = reader.read_u16()?;
        let super_class = reader.read_u16()?;
        let interfaces = Self::read_interfaces(reader, &constants)?;
        let fields = Self::read_fields(reader, &constants, config.strict)?;
        let methods = Self::read_methods(reader, &constants, config.strict)?;
        let attributes = Attribute::decode_list(
            reader,
            &constants,
            AttributeContext::ClassFile,
            config.strict,
        )?;

        debug!(
            "decoded class {} ({} fields, {} methods)",
            constants.class_name(this_class).unwrap_or("?"),
            fields.len(),
            methods.len()
        );

        Ok(ClassFile {
            version,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Reads just enough of the file to identify it: magic, version,
    /// constant pool, access flags, this-class and super-class. Used by
    /// classpath indexing that only needs a class's identity.
    pub fn peek(reader: &mut ByteReader) -> Result<PeekedClass> {
        check_magic(reader)?;
        let _version = ClassVersion::read(reader)?;
        let constants = ConstantPool::read(reader)?;
        let access_flags = class_access_flags(reader.read_u16()?);
        let this_idx = reader.read_u16()?;
        let super_idx = reader.read_u16()?;

        let this_class = constants.class_name(this_idx)?.to_string();
        let super_class = if super_idx == 0 {
            None
        } else {
            Some(constants.class_name(super_idx)?.to_string())
        };

        Ok(PeekedClass {
            access_flags,
            this_class,
            super_class,
        })
    }

    fn read_interfaces(reader: &mut ByteReader, cp: &ConstantPool) -> Result<Vec<u16>> {
        let count = reader.read_u16()?;
        let mut interfaces = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let idx = reader.read_u16()?;
            cp.class_name(idx)?;
            interfaces.push(idx);
        }
        Ok(interfaces)
    }

    fn read_fields(reader: &mut ByteReader, cp: &ConstantPool, strict: bool) -> Result<Vec<FieldInfo>> {
        let count = reader.read_u16()?;
        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let access_flags = field_access_flags(reader.read_u16()?);
            let name_index = reader.read_u16()?;
            let descriptor_index = reader.read_u16()?;
            let attributes = Attribute::decode_list(reader, cp, AttributeContext::Field, strict)?;
            fields.push(FieldInfo {
                access_flags,
                name_index,
                descriptor_index,
                attributes,
            });
        }
        Ok(fields)
    }

    fn read_methods(reader: &mut ByteReader, cp: &ConstantPool, strict: bool) -> Result<Vec<MethodInfo>> {
        let count = reader.read_u16()?;
        let mut methods = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let access_flags = method_access_flags(reader.read_u16()?);
            let name_index = reader.read_u16()?;
            let descriptor_index = reader.read_u16()?;
            let attributes = Attribute::decode_list(reader, cp, AttributeContext::Method, strict)?;
            methods.push(MethodInfo {
                access_flags,
                name_index,
                descriptor_index,
                attributes,
            });
        }
        Ok(methods)
    }

    fn validate_pool(cp: &ConstantPool) -> Result<()> {
        // A structural pass over every cross-reference in the pool: each
        // index must resolve, and must resolve to the kind that entry's own
        // shape requires. Reference resolution failures surface the same
        // `CpKindMismatch`/`BadCpIndex` as lazy access would, just earlier.
        use crate::constant_pool::ConstantEntry;
        for idx in 1..cp.len() {
            match cp.get(idx) {
                Ok(ConstantEntry::Class { name_idx }) => {
                    cp.utf8(*name_idx)?;
                }
                Ok(ConstantEntry::String { utf8_idx }) => {
                    cp.utf8(*utf8_idx)?;
                }
                Ok(ConstantEntry::NameAndType { name_idx, desc_idx }) => {
                    cp.utf8(*name_idx)?;
                    cp.utf8(*desc_idx)?;
                }
                Ok(ConstantEntry::FieldRef { class_idx, nat_idx })
                | Ok(ConstantEntry::MethodRef { class_idx, nat_idx })
                | Ok(ConstantEntry::InterfaceMethodRef { class_idx, nat_idx }) => {
                    cp.class_name(*class_idx)?;
                    cp.name_and_type(*nat_idx)?;
                }
                Ok(ConstantEntry::MethodHandle { ref_idx, .. }) => {
                    Self::validate_method_handle_ref(cp, *ref_idx)?;
                }
                Ok(ConstantEntry::MethodType { desc_idx }) => {
                    cp.utf8(*desc_idx)?;
                }
                Ok(ConstantEntry::Dynamic { nat_idx, .. })
                | Ok(ConstantEntry::InvokeDynamic { nat_idx, .. }) => {
                    // `bsm_attr_idx` indexes the class's BootstrapMethods
                    // attribute, not the constant pool, so only `nat_idx`
                    // is a CP cross-reference here.
                    cp.name_and_type(*nat_idx)?;
                }
                Ok(ConstantEntry::Module { name_idx }) | Ok(ConstantEntry::Package { name_idx }) => {
                    cp.utf8(*name_idx)?;
                }
                Ok(_) | Err(JvmError::BadCpIndex { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// A `MethodHandle`'s `ref_idx` must resolve to a field or method
    /// reference; which kind depends on the handle's `ReferenceKind` and is
    /// left to the verifier, not this structural pass.
    fn validate_method_handle_ref(cp: &ConstantPool, ref_idx: u16) -> Result<()> {
        use crate::constant_pool::ConstantEntry;
        match cp.get(ref_idx)? {
            ConstantEntry::FieldRef { .. }
            | ConstantEntry::MethodRef { .. }
            | ConstantEntry::InterfaceMethodRef { .. } => Ok(()),
            other => Err(JvmError::CpKindMismatch {
                expected: "FieldRef|MethodRef|InterfaceMethodRef",
                got: other.kind_name(),
                index: ref_idx,
            }),
        }
    }

    pub fn name(&self) -> &str {
        self.constants
            .class_name(self.this_class)
            .unwrap_or("<unresolved>")
    }

    pub fn super_class_name(&self) -> Option<&str> {
        if self.super_class == 0 {
            None
        } else {
            self.constants.class_name(self.super_class).ok()
        }
    }

    #[cfg(test)]
    pub fn empty_for_test(constants: ConstantPool) -> Self {
        ClassFile {
            version: ClassVersion::new(61, 0),
            constants,
            access_flags: ClassAccessFlags::empty(),
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_class_bytes() -> Vec<u8> {
        let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE];
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // minor
        bytes.extend_from_slice(&0x003Du16.to_be_bytes()); // major 61
        bytes.extend_from_slice(&0x0001u16.to_be_bytes()); // cp count = 1 (empty pool)
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // access flags
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // this
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // super
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // interfaces count
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // fields count
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // methods count
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // attributes count
        bytes
    }

    #[test]
    fn decodes_structurally_minimal_class() {
        let bytes = minimal_class_bytes();
        let mut r = ByteReader::new(&bytes);
        let class = ClassFile::read(&mut r, LoaderConfig::default()).unwrap();
        assert_eq!(class.version.major, 61);
        assert!(class.constants.is_empty());
        assert!(class.fields.is_empty());
        assert!(class.methods.is_empty());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = minimal_class_bytes();
        bytes[0] = 0xDE;
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            ClassFile::read(&mut r, LoaderConfig::default()),
            Err(JvmError::BadMagic)
        ));
    }

    #[test]
    fn rejects_major_too_new() {
        let mut bytes = minimal_class_bytes();
        bytes[6] = 0x00;
        bytes[7] = 0x3E; // 62
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            ClassFile::read(&mut r, LoaderConfig::default()),
            Err(JvmError::UnsupportedMajor { major: 62 })
        ));
    }

    #[test]
    fn peek_reads_identity_without_fields_or_methods() {
        // cp: [1]=Utf8 "A", [2]=Class->1
        let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE];
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x003Du16.to_be_bytes());
        bytes.extend_from_slice(&0x0003u16.to_be_bytes()); // cp count
        bytes.extend_from_slice(&[1, 0, 1, b'A']);
        bytes.extend_from_slice(&[7, 0, 1]);
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // access
        bytes.extend_from_slice(&0x0002u16.to_be_bytes()); // this = 2
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // super = 0
        let mut r = ByteReader::new(&bytes);
        let peeked = ClassFile::peek(&mut r).unwrap();
        assert_eq!(peeked.this_class, "A");
        assert_eq!(peeked.super_class, None);
    }

    #[test]
    fn strict_mode_rejects_method_ref_with_wrong_kind_class_idx() {
        // cp: [1]=Utf8 "X", [2]=MethodRef{class_idx:1 (a Utf8, not a Class), nat_idx:1}
        let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE];
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x003Du16.to_be_bytes());
        bytes.extend_from_slice(&0x0003u16.to_be_bytes()); // cp count
        bytes.extend_from_slice(&[1, 0, 1, b'X']);
        bytes.extend_from_slice(&[10, 0, 1, 0, 1]); // MethodRef
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // access
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // this
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // super
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // interfaces
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // fields
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // methods
        bytes.extend_from_slice(&0x0000u16.to_be_bytes()); // attributes
        let mut r = ByteReader::new(&bytes);
        let config = LoaderConfig { strict: true };
        assert!(matches!(
            ClassFile::read(&mut r, config),
            Err(JvmError::CpKindMismatch { expected: "Class", .. })
        ));
    }

    #[test]
    fn non_strict_mode_does_not_validate_pool_structure() {
        let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE];
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x003Du16.to_be_bytes());
        bytes.extend_from_slice(&0x0003u16.to_be_bytes());
        bytes.extend_from_slice(&[1, 0, 1, b'X']);
        bytes.extend_from_slice(&[10, 0, 1, 0, 1]);
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        bytes.extend_from_slice(&0x0000u16.to_be_bytes());
        let mut r = ByteReader::new(&bytes);
        assert!(ClassFile::read(&mut r, LoaderConfig::default()).is_ok());
    }
}
