//! Opcode dispatch: a 256-entry handler table keyed by the raw opcode
//! byte. Only the initial handler set is implemented here; everything
//! else dispatches to [`JvmError::UnsupportedOpcode`].

use crate::constant_pool::ConstantEntry;
use crate::error::{JvmError, Result};
use crate::registry::VmRegistry;
use crate::thread::Thread;
use crate::value::{ObjectRef, RuntimeValue};

/// A handler reads its own operands (if any) from the current frame's code
/// at `pc+1..`, updates the operand stack and/or locals, and advances the
/// program counter by the instruction's total byte length (opcode byte
/// included).
pub type Handler = fn(&mut VmRegistry, &mut Thread) -> Result<()>;

pub struct OpcodeTable {
    handlers: [Option<Handler>; 256],
}

impl OpcodeTable {
    pub fn new() -> Self {
        let mut table = OpcodeTable {
            handlers: [None; 256],
        };
        table.register(0x00, nop);
        table.register(0x01, aconst_null);
        table.register(0x02, iconst_m1);
        table.register(0x03, iconst_0);
        table.register(0x04, iconst_1);
        table.register(0x05, iconst_2);
        table.register(0x06, iconst_3);
        table.register(0x07, iconst_4);
        table.register(0x08, iconst_5);
        table.register(0x09, lconst_0);
        table.register(0x0a, lconst_1);
        table.register(0x0b, fconst_0);
        table.register(0x0c, fconst_1);
        table.register(0x0d, fconst_2);
        table.register(0x0e, dconst_0);
        table.register(0x0f, dconst_1);
        table.register(0x10, bipush);
        table.register(0x11, sipush);
        table.register(0x12, ldc);
        table
    }

    fn register(&mut self, opcode: u8, handler: Handler) {
        assert!(
            self.handlers[opcode as usize].is_none(),
            "duplicate handler registration for opcode 0x{:02x}",
            opcode
        );
        self.handlers[opcode as usize] = Some(handler);
    }

    pub fn dispatch(&self, vm: &mut VmRegistry, thread: &mut Thread) -> Result<()> {
        let opcode = thread.current_opcode()?;
        match self.handlers[opcode as usize] {
            Some(handler) => handler(vm, thread),
            None => Err(JvmError::UnsupportedOpcode { opcode }),
        }
    }
}

impl Default for OpcodeTable {
    fn default() -> Self {
        Self::new()
    }
}

fn nop(_vm: &mut VmRegistry, thread: &mut Thread) -> Result<()> {
    thread.inc_pc(1);
    Ok(())
}

fn aconst_null(_vm: &mut VmRegistry, thread: &mut Thread) -> Result<()> {
    thread.push_operand(RuntimeValue::Reference(None));
    thread.inc_pc(1);
    Ok(())
}

macro_rules! const_instruction {
    ($name:ident, $value:expr) => {
        fn $name(_vm: &mut VmRegistry, thread: &mut Thread) -> Result<()> {
            thread.push_operand($value);
            thread.inc_pc(1);
            Ok(())
        }
    };
}

const_instruction!(iconst_m1, RuntimeValue::Int(-1));
const_instruction!(iconst_0, RuntimeValue::Int(0));
const_instruction!(iconst_1, RuntimeValue::Int(1));
const_instruction!(iconst_2, RuntimeValue::Int(2));
const_instruction!(iconst_3, RuntimeValue::Int(3));
const_instruction!(iconst_4, RuntimeValue::Int(4));
const_instruction!(iconst_5, RuntimeValue::Int(5));
const_instruction!(lconst_0, RuntimeValue::Long(0));
const_instruction!(lconst_1, RuntimeValue::Long(1));
const_instruction!(fconst_0, RuntimeValue::Float(0.0));
const_instruction!(fconst_1, RuntimeValue::Float(1.0));
const_instruction!(fconst_2, RuntimeValue::Float(2.0));
const_instruction!(dconst_0, RuntimeValue::Double(0.0));
const_instruction!(dconst_1, RuntimeValue::Double(1.0));

fn bipush(_vm: &mut VmRegistry, thread: &mut Thread) -> Result<()> {
    let frame = thread.current_frame();
    let raw = *frame
        .code
        .get(thread.pc() as usize + 1)
        .ok_or(JvmError::UnexpectedEof)?;
    let value = raw as i8 as i32;
    thread.push_operand(RuntimeValue::Int(value));
    thread.inc_pc(2);
    Ok(())
}

fn sipush(_vm: &mut VmRegistry, thread: &mut Thread) -> Result<()> {
    let frame = thread.current_frame();
    let pc = thread.pc() as usize;
    let hi = *frame.code.get(pc + 1).ok_or(JvmError::UnexpectedEof)?;
    let lo = *frame.code.get(pc + 2).ok_or(JvmError::UnexpectedEof)?;
    let value = i16::from_be_bytes([hi, lo]) as i32;
    thread.push_operand(RuntimeValue::Int(value));
    thread.inc_pc(3);
    Ok(())
}

/// Pushes the constant at an 8-bit constant pool index. `Long`, `Double`,
/// and the `Unusable` double-slot sentinel are never legal `ldc` operands
/// (those go through `ldc2_w`, which this crate's initial opcode set does
/// not include); `MethodHandle`, `MethodType`, and `Dynamic` entries are
/// likewise rejected here rather than silently mis-resolved, since this
/// crate does not yet model bootstrap-method-driven resolution.
fn ldc(vm: &mut VmRegistry, thread: &mut Thread) -> Result<()> {
    let frame = thread.current_frame();
    let pc = thread.pc() as usize;
    let idx = *frame.code.get(pc + 1).ok_or(JvmError::UnexpectedEof)? as u16;
    let cp = &frame.class.constants;

    let value = match cp.get(idx)? {
        ConstantEntry::Integer(v) => RuntimeValue::Int(*v),
        ConstantEntry::Float(v) => RuntimeValue::Float(*v),
        ConstantEntry::String { .. } => {
            let text = cp.string(idx)?.to_string();
            RuntimeValue::Reference(Some(std::rc::Rc::new(ObjectRef {
                class_name: "java/lang/String".to_string(),
                fields: {
                    let mut fields = std::collections::HashMap::new();
                    fields.insert(
                        "value".to_string(),
                        RuntimeValue::Array(std::rc::Rc::new(std::cell::RefCell::new(
                            text.encode_utf16()
                                .map(RuntimeValue::Char)
                                .collect::<Vec<_>>(),
                        ))),
                    );
                    fields
                },
            })))
        }
        ConstantEntry::Class { .. } => {
            let name = cp.class_name(idx)?.to_string();
            RuntimeValue::Reference(Some(std::rc::Rc::new(ObjectRef {
                class_name: name,
                fields: std::collections::HashMap::new(),
            })))
        }
        other => {
            let got = match other {
                ConstantEntry::Long(_) => "Long",
                ConstantEntry::Double(_) => "Double",
                ConstantEntry::Unusable => "Unusable",
                ConstantEntry::MethodHandle { .. } => "MethodHandle",
                ConstantEntry::MethodType { .. } => "MethodType",
                ConstantEntry::Dynamic { .. } => "Dynamic",
                _ => "unsupported",
            };
            return Err(JvmError::CpKindMismatch {
                expected: "Integer|Float|String|Class",
                got,
                index: idx,
            });
        }
    };

    let _ = vm; // reserved for future opcodes that need registry access
    thread.push_operand(value);
    thread.inc_pc(2);
    Ok(())
}
