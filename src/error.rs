//! Error types shared by every decoding and runtime operation in this crate.

use thiserror::Error;

/// Every way a class-file decode or an opcode dispatch can fail.
#[derive(Error, Debug)]
pub enum JvmError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("bad magic number, expected 0xCAFEBABE")]
    BadMagic,

    #[error("unsupported class file major version: {major}")]
    UnsupportedMajor { major: u16 },

    #[error("unknown constant pool tag: {tag}")]
    BadCpTag { tag: u8 },

    #[error("constant pool index {index} out of range (pool size {cp_size})")]
    BadCpIndex { index: u16, cp_size: u16 },

    #[error("constant pool entry {index} has kind {got}, expected {expected}")]
    CpKindMismatch {
        expected: &'static str,
        got: &'static str,
        index: u16,
    },

    #[error("unknown stack map frame tag: {tag}")]
    BadStackMapTag { tag: u8 },

    #[error("unknown element value tag: {tag:?}")]
    BadElementValueTag { tag: u8 },

    #[error("unknown type annotation target_type: 0x{target_type:02x}")]
    BadTypeAnnotationTarget { target_type: u8 },

    #[error("attribute {name} declared length {declared} but consumed {actual}")]
    AttributeLengthMismatch {
        name: String,
        declared: u32,
        actual: u32,
    },

    #[error("attribute {name} is not legal in {context} context")]
    IllegalAttributeContext { name: String, context: &'static str },

    #[error("constant pool Utf8 entry is not valid modified UTF-8")]
    InvalidModifiedUtf8,

    #[error("operand stack type mismatch")]
    StackTypeMismatch,

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("local variable index out of range")]
    LocalIndexOutOfRange,

    #[error("no handler registered for opcode 0x{opcode:02x}")]
    UnsupportedOpcode { opcode: u8 },

    #[error("class not found: {name}")]
    ClassNotFound { name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, JvmError>;
