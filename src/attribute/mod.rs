//! Attribute model: a length-prefixed, name-dispatched tagged sum.
//!
//! Every attribute starts with `name_idx:u16, length:u32`; the payload
//! grammar is picked by resolving `name_idx` against the constant pool.
//! After a payload is parsed the consumed byte count must equal `length`
//! exactly, computed as `end_offset - start_offset` (a transposition of
//! this check, `start_offset + consumed`, is a known bug elsewhere in this
//! lineage and is not reproduced here).

use crate::annotation::{Annotation, ElementValue, TypeAnnotation};
use crate::constant_pool::ConstantPool;
use crate::error::{JvmError, Result};
use crate::module_attr::Module;
use crate::read::{ByteReader, Decode};
use crate::stack_map::StackMapFrame;
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeContext {
    ClassFile,
    Field,
    Method,
    Code,
    RecordComponent,
}

impl AttributeContext {
    fn label(&self) -> &'static str {
        match self {
            AttributeContext::ClassFile => "class file",
            AttributeContext::Field => "field",
            AttributeContext::Method => "method",
            AttributeContext::Code => "code",
            AttributeContext::RecordComponent => "record component",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExceptionBounds {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

impl Decode for ExceptionBounds {
    fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(ExceptionBounds {
            start_pc: reader.read_u16()?,
            end_pc: reader.read_u16()?,
            handler_pc: reader.read_u16()?,
            catch_type: reader.read_u16()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CodeAttr {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionBounds>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct InnerClassEntry {
    pub inner_class_info_index: u16,
    pub outer_class_info_index: u16,
    pub inner_name_index: u16,
    pub inner_class_access_flags: u16,
}

impl Decode for InnerClassEntry {
    fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(InnerClassEntry {
            inner_class_info_index: reader.read_u16()?,
            outer_class_info_index: reader.read_u16()?,
            inner_name_index: reader.read_u16()?,
            inner_class_access_flags: reader.read_u16()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LineNumberEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

impl Decode for LineNumberEntry {
    fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(LineNumberEntry {
            start_pc: reader.read_u16()?,
            line_number: reader.read_u16()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LocalVariableEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}

impl Decode for LocalVariableEntry {
    fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(LocalVariableEntry {
            start_pc: reader.read_u16()?,
            length: reader.read_u16()?,
            name_index: reader.read_u16()?,
            descriptor_index: reader.read_u16()?,
            index: reader.read_u16()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LocalVariableTypeEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub signature_index: u16,
    pub index: u16,
}

impl Decode for LocalVariableTypeEntry {
    fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(LocalVariableTypeEntry {
            start_pc: reader.read_u16()?,
            length: reader.read_u16()?,
            name_index: reader.read_u16()?,
            signature_index: reader.read_u16()?,
            index: reader.read_u16()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapMethodEntry {
    pub method_ref: u16,
    pub arguments: Vec<u16>,
}

impl Decode for BootstrapMethodEntry {
    fn decode(reader: &mut ByteReader) -> Result<Self> {
        Ok(BootstrapMethodEntry {
            method_ref: reader.read_u16()?,
            arguments: Vec::decode(reader)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MethodParameterEntry {
    pub name_index: u16,
    pub access_flags: u16,
}

#[derive(Debug, Clone)]
pub struct RecordComponent {
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

/// The full attribute grammar. Unrecognized names decode as `Custom` and
/// are never fatal by themselves.
#[derive(Debug, Clone)]
pub enum Attribute {
    ConstantValue { cp_idx: u16 },
    Code(CodeAttr),
    StackMapTable(Vec<StackMapFrame>),
    Exceptions { exception_index_table: Vec<u16> },
    InnerClasses(Vec<InnerClassEntry>),
    EnclosingMethod { class_idx: u16, method_idx: u16 },
    Synthetic,
    Deprecated,
    Signature { signature_index: u16 },
    SourceFile { sourcefile_index: u16 },
    SourceDebugExtension { debug_extension: Vec<u8> },
    LineNumberTable(Vec<LineNumberEntry>),
    LocalVariableTable(Vec<LocalVariableEntry>),
    LocalVariableTypeTable(Vec<LocalVariableTypeEntry>),
    RuntimeVisibleAnnotations(Vec<Annotation>),
    RuntimeInvisibleAnnotations(Vec<Annotation>),
    RuntimeVisibleParameterAnnotations(Vec<Vec<Annotation>>),
    RuntimeInvisibleParameterAnnotations(Vec<Vec<Annotation>>),
    RuntimeVisibleTypeAnnotations(Vec<TypeAnnotation>),
    RuntimeInvisibleTypeAnnotations(Vec<TypeAnnotation>),
    AnnotationDefault(ElementValue),
    BootstrapMethods(Vec<BootstrapMethodEntry>),
    MethodParameters(Vec<MethodParameterEntry>),
    Module(Module),
    ModulePackages { package_index: Vec<u16> },
    ModuleMainClass { main_class_index: u16 },
    NestHost { host_class_index: u16 },
    NestMembers { classes: Vec<u16> },
    Record(Vec<RecordComponent>),
    PermittedSubclasses { classes: Vec<u16> },
    Custom { name: String, raw_bytes: Vec<u8> },
}

impl Attribute {
    fn name(&self) -> &str {
        match self {
            Attribute::ConstantValue { .. } => "ConstantValue",
            Attribute::Code(_) => "Code",
            Attribute::StackMapTable(_) => "StackMapTable",
            Attribute::Exceptions { .. } => "Exceptions",
            Attribute::InnerClasses(_) => "InnerClasses",
            Attribute::EnclosingMethod { .. } => "EnclosingMethod",
            Attribute::Synthetic => "Synthetic",
            Attribute::Deprecated => "Deprecated",
            Attribute::Signature { .. } => "Signature",
            Attribute::SourceFile { .. } => "SourceFile",
            Attribute::SourceDebugExtension { .. } => "SourceDebugExtension",
            Attribute::LineNumberTable(_) => "LineNumberTable",
            Attribute::LocalVariableTable(_) => "LocalVariableTable",
            Attribute::LocalVariableTypeTable(_) => "LocalVariableTypeTable",
            Attribute::RuntimeVisibleAnnotations(_) => "RuntimeVisibleAnnotations",
            Attribute::RuntimeInvisibleAnnotations(_) => "RuntimeInvisibleAnnotations",
            Attribute::RuntimeVisibleParameterAnnotations(_) => {
                "RuntimeVisibleParameterAnnotations"
            }
            Attribute::RuntimeInvisibleParameterAnnotations(_) => {
                "RuntimeInvisibleParameterAnnotations"
            }
            Attribute::RuntimeVisibleTypeAnnotations(_) => "RuntimeVisibleTypeAnnotations",
            Attribute::RuntimeInvisibleTypeAnnotations(_) => "RuntimeInvisibleTypeAnnotations",
            Attribute::AnnotationDefault(_) => "AnnotationDefault",
            Attribute::BootstrapMethods(_) => "BootstrapMethods",
            Attribute::MethodParameters(_) => "MethodParameters",
            Attribute::Module(_) => "Module",
            Attribute::ModulePackages { .. } => "ModulePackages",
            Attribute::ModuleMainClass { .. } => "ModuleMainClass",
            Attribute::NestHost { .. } => "NestHost",
            Attribute::NestMembers { .. } => "NestMembers",
            Attribute::Record(_) => "Record",
            Attribute::PermittedSubclasses { .. } => "PermittedSubclasses",
            Attribute::Custom { name, .. } => name.as_str(),
        }
    }

    /// Whether this attribute's kind is permitted to appear in `context`.
    /// Violations are logged as warnings rather than treated as fatal,
    /// unless the caller is decoding under strict mode.
    fn legal_in(&self, context: AttributeContext) -> bool {
        use AttributeContext::*;
        match self {
            Attribute::ConstantValue { .. } => context == Field,
            Attribute::Code(_) => context == Method,
            Attribute::StackMapTable(_) => context == Code,
            Attribute::Exceptions { .. } => context == Method,
            Attribute::InnerClasses(_) => context == ClassFile,
            Attribute::EnclosingMethod { .. } => context == ClassFile,
            Attribute::Signature { .. } => matches!(context, ClassFile | Field | Method | RecordComponent),
            Attribute::SourceFile { .. } => context == ClassFile,
            Attribute::SourceDebugExtension { .. } => context == ClassFile,
            Attribute::LineNumberTable(_) => context == Code,
            Attribute::LocalVariableTable(_) => context == Code,
            Attribute::LocalVariableTypeTable(_) => context == Code,
            Attribute::AnnotationDefault(_) => context == Method,
            Attribute::BootstrapMethods(_) => context == ClassFile,
            Attribute::MethodParameters(_) => context == Method,
            Attribute::Module(_) => context == ClassFile,
            Attribute::ModulePackages { .. } => context == ClassFile,
            Attribute::ModuleMainClass { .. } => context == ClassFile,
            Attribute::NestHost { .. } => context == ClassFile,
            Attribute::NestMembers { .. } => context == ClassFile,
            Attribute::Record(_) => context == ClassFile,
            Attribute::PermittedSubclasses { .. } => context == ClassFile,
            // Synthetic, Deprecated, the Runtime*Annotation families, and
            // unrecognized Custom attributes are legal everywhere this
            // decoder visits.
            _ => true,
        }
    }

    pub fn decode(reader: &mut ByteReader, cp: &ConstantPool, strict: bool) -> Result<Self> {
        let name_idx = reader.read_u16()?;
        let length = reader.read_u32()?;
        let name = cp.utf8(name_idx)?.to_string();
        let start = reader.position();

        let attr = Self::decode_body(reader, cp, &name, length, strict)?;

        let actual = (reader.position() - start) as u32;
        if actual != length {
            return Err(JvmError::AttributeLengthMismatch {
                name,
                declared: length,
                actual,
            });
        }
        Ok(attr)
    }

    fn decode_body(
        reader: &mut ByteReader,
        cp: &ConstantPool,
        name: &str,
        length: u32,
        strict: bool,
    ) -> Result<Self> {
        Ok(match name {
            "ConstantValue" => Attribute::ConstantValue {
                cp_idx: reader.read_u16()?,
            },
            "Code" => {
                let max_stack = reader.read_u16()?;
                let max_locals = reader.read_u16()?;
                let code_length = reader.read_u32()?;
                let code = reader.read_bytes(code_length as usize)?;
                let exception_table: Vec<ExceptionBounds> = Vec::decode(reader)?;
                let attributes =
                    Attribute::decode_list(reader, cp, AttributeContext::Code, strict)?;
                Attribute::Code(CodeAttr {
                    max_stack,
                    max_locals,
                    code,
                    exception_table,
                    attributes,
                })
            }
            "StackMapTable" => {
                let count = reader.read_u16()?;
                let mut entries = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    entries.push(StackMapFrame::decode(reader)?);
                }
                Attribute::StackMapTable(entries)
            }
            "Exceptions" => Attribute::Exceptions {
                exception_index_table: Vec::decode(reader)?,
            },
            "InnerClasses" => Attribute::InnerClasses(Vec::decode(reader)?),
            "EnclosingMethod" => Attribute::EnclosingMethod {
                class_idx: reader.read_u16()?,
                method_idx: reader.read_u16()?,
            },
            "Synthetic" => Attribute::Synthetic,
            "Deprecated" => Attribute::Deprecated,
            "Signature" => Attribute::Signature {
                signature_index: reader.read_u16()?,
            },
            "SourceFile" => Attribute::SourceFile {
                sourcefile_index: reader.read_u16()?,
            },
            "SourceDebugExtension" => Attribute::SourceDebugExtension {
                debug_extension: reader.read_bytes(length as usize)?,
            },
            "LineNumberTable" => Attribute::LineNumberTable(Vec::decode(reader)?),
            "LocalVariableTable" => Attribute::LocalVariableTable(Vec::decode(reader)?),
            "LocalVariableTypeTable" => Attribute::LocalVariableTypeTable(Vec::decode(reader)?),
            "RuntimeVisibleAnnotations" => {
                Attribute::RuntimeVisibleAnnotations(Vec::decode(reader)?)
            }
            "RuntimeInvisibleAnnotations" => {
                Attribute::RuntimeInvisibleAnnotations(Vec::decode(reader)?)
            }
            "RuntimeVisibleParameterAnnotations" => {
                Attribute::RuntimeVisibleParameterAnnotations(Self::decode_parameter_annotations(
                    reader,
                )?)
            }
            "RuntimeInvisibleParameterAnnotations" => {
                Attribute::RuntimeInvisibleParameterAnnotations(
                    Self::decode_parameter_annotations(reader)?,
                )
            }
            "RuntimeVisibleTypeAnnotations" => {
                Attribute::RuntimeVisibleTypeAnnotations(Vec::decode(reader)?)
            }
            "RuntimeInvisibleTypeAnnotations" => {
                Attribute::RuntimeInvisibleTypeAnnotations(Vec::decode(reader)?)
            }
            "AnnotationDefault" => Attribute::AnnotationDefault(ElementValue::decode(reader)?),
            "BootstrapMethods" => Attribute::BootstrapMethods(Vec::decode(reader)?),
            "MethodParameters" => {
                let count = reader.read_u8()?;
                let mut params = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    params.push(MethodParameterEntry {
                        name_index: reader.read_u16()?,
                        access_flags: reader.read_u16()?,
                    });
                }
                Attribute::MethodParameters(params)
            }
            "Module" => Attribute::Module(Module::decode(reader)?),
            "ModulePackages" => Attribute::ModulePackages {
                package_index: Vec::decode(reader)?,
            },
            "ModuleMainClass" => Attribute::ModuleMainClass {
                main_class_index: reader.read_u16()?,
            },
            "NestHost" => Attribute::NestHost {
                host_class_index: reader.read_u16()?,
            },
            "NestMembers" => Attribute::NestMembers {
                classes: Vec::decode(reader)?,
            },
            "Record" => {
                let count = reader.read_u16()?;
                let mut components = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let name_index = reader.read_u16()?;
                    let descriptor_index = reader.read_u16()?;
                    let attributes = Attribute::decode_list(
                        reader,
                        cp,
                        AttributeContext::RecordComponent,
                        strict,
                    )?;
                    components.push(RecordComponent {
                        name_index,
                        descriptor_index,
                        attributes,
                    });
                }
                Attribute::Record(components)
            }
            "PermittedSubclasses" => Attribute::PermittedSubclasses {
                classes: Vec::decode(reader)?,
            },
            _ => Attribute::Custom {
                name: name.to_string(),
                raw_bytes: reader.read_bytes(length as usize)?,
            },
        })
    }

    fn decode_parameter_annotations(reader: &mut ByteReader) -> Result<Vec<Vec<Annotation>>> {
        let count = reader.read_u8()?;
        let mut parameters = Vec::with_capacity(count as usize);
        for _ in 0..count {
            parameters.push(Vec::decode(reader)?);
        }
        Ok(parameters)
    }

    /// Decodes a `u16`-counted attribute list. Under strict mode, an
    /// attribute whose kind is illegal in `context` (per [`Attribute::legal_in`])
    /// is a fatal `IllegalAttributeContext`; otherwise it's just logged.
    pub fn decode_list(
        reader: &mut ByteReader,
        cp: &ConstantPool,
        context: AttributeContext,
        strict: bool,
    ) -> Result<Vec<Attribute>> {
        let count = reader.read_u16()?;
        let mut attributes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let attr = Attribute::decode(reader, cp, strict)?;
            if !attr.legal_in(context) {
                if strict {
                    return Err(JvmError::IllegalAttributeContext {
                        name: attr.name().to_string(),
                        context: context.label(),
                    });
                }
                warn!(
                    "attribute {} is not legal in {:?} context",
                    attr.name(),
                    context
                );
            }
            attributes.push(attr);
        }
        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant_pool::ConstantPool;

    fn utf8_cp(names: &[&str]) -> ConstantPool {
        let count = (names.len() + 1) as u16;
        let mut bytes = count.to_be_bytes().to_vec();
        for name in names {
            bytes.push(1);
            bytes.extend_from_slice(&(name.len() as u16).to_be_bytes());
            bytes.extend_from_slice(name.as_bytes());
        }
        let mut r = ByteReader::new(&bytes);
        ConstantPool::read(&mut r).unwrap()
    }

    #[test]
    fn constant_value_attribute_round_trips() {
        let cp = utf8_cp(&["ConstantValue"]);
        let mut bytes = vec![0x00, 0x01]; // name_idx
        bytes.extend_from_slice(&2u32.to_be_bytes()); // length
        bytes.extend_from_slice(&0x00u16.to_be_bytes());
        bytes.extend_from_slice(&0x07u16.to_be_bytes()); // cp_idx = 7
        let mut r = ByteReader::new(&bytes);
        let attr = Attribute::decode(&mut r, &cp, false).unwrap();
        assert!(matches!(attr, Attribute::ConstantValue { cp_idx: 7 }));
    }

    #[test]
    fn length_mismatch_is_detected() {
        let cp = utf8_cp(&["ConstantValue"]);
        let mut bytes = vec![0x00, 0x01];
        bytes.extend_from_slice(&3u32.to_be_bytes()); // declared 3, actual body is 2 bytes
        bytes.extend_from_slice(&0x00u16.to_be_bytes());
        bytes.extend_from_slice(&0x07u16.to_be_bytes());
        bytes.push(0xAA); // padding so the read doesn't also hit EOF
        let mut r = ByteReader::new(&bytes);
        let err = Attribute::decode(&mut r, &cp, false).unwrap_err();
        assert!(matches!(
            err,
            JvmError::AttributeLengthMismatch {
                declared: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn unknown_attribute_name_becomes_custom() {
        let cp = utf8_cp(&["Frobnicate"]);
        let mut bytes = vec![0x00, 0x01];
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&[0xAB, 0xCD]);
        let mut r = ByteReader::new(&bytes);
        let attr = Attribute::decode(&mut r, &cp, false).unwrap();
        match attr {
            Attribute::Custom { name, raw_bytes } => {
                assert_eq!(name, "Frobnicate");
                assert_eq!(raw_bytes, vec![0xAB, 0xCD]);
            }
            other => panic!("expected Custom, got {:?}", other),
        }
    }

    #[test]
    fn strict_mode_rejects_illegal_attribute_context() {
        // ConstantValue is only legal on a field; decode it as a class-file attribute.
        let cp = utf8_cp(&["ConstantValue"]);
        let mut bytes = vec![0x00, 0x01]; // 1-entry attribute list
        bytes.extend_from_slice(&[0x00, 0x01]); // name_idx
        bytes.extend_from_slice(&2u32.to_be_bytes()); // length
        bytes.extend_from_slice(&0x00u16.to_be_bytes());
        bytes.extend_from_slice(&0x07u16.to_be_bytes()); // cp_idx = 7
        let mut r = ByteReader::new(&bytes);
        let err =
            Attribute::decode_list(&mut r, &cp, AttributeContext::ClassFile, true).unwrap_err();
        assert!(matches!(
            err,
            JvmError::IllegalAttributeContext { ref name, .. } if name == "ConstantValue"
        ));
    }

    #[test]
    fn non_strict_mode_only_warns_on_illegal_attribute_context() {
        let cp = utf8_cp(&["ConstantValue"]);
        let mut bytes = vec![0x00, 0x01]; // 1-entry attribute list
        bytes.extend_from_slice(&[0x00, 0x01]);
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&0x00u16.to_be_bytes());
        bytes.extend_from_slice(&0x07u16.to_be_bytes());
        let mut r = ByteReader::new(&bytes);
        let attrs =
            Attribute::decode_list(&mut r, &cp, AttributeContext::ClassFile, false).unwrap();
        assert_eq!(attrs.len(), 1);
    }
}
