//! A single method activation: its local variable slots, its operand
//! stack, and a borrow of the code it's executing.

use crate::class_file::ClassFile;
use crate::error::{JvmError, Result};
use crate::value::{RuntimeValue, StackValue};
use std::rc::Rc;

/// Frames are created when a method is invoked and destroyed when it
/// returns; `code` is shared with the owning `ClassFile`'s `Code`
/// attribute rather than copied per invocation.
pub struct Frame {
    pub locals: Vec<RuntimeValue>,
    pub stack: Vec<StackValue>,
    pub class: Rc<ClassFile>,
    pub code: Rc<Vec<u8>>,
}

impl Frame {
    pub fn new(class: Rc<ClassFile>, code: Rc<Vec<u8>>, max_locals: u16, max_stack: u16) -> Self {
        Frame {
            locals: vec![RuntimeValue::Null; max_locals as usize],
            stack: Vec::with_capacity(max_stack as usize),
            class,
            code,
        }
    }

    pub fn push_operand(&mut self, value: RuntimeValue) {
        for slot in StackValue::from_runtime(value) {
            self.stack.push(slot);
        }
    }

    pub fn pop_category_1(&mut self) -> Result<StackValue> {
        let value = self.stack.pop().ok_or(JvmError::StackUnderflow)?;
        if value.is_category_2() || value.is_high_half() {
            return Err(JvmError::StackTypeMismatch);
        }
        Ok(value)
    }

    pub fn pop_category_2(&mut self) -> Result<StackValue> {
        let high = self.stack.pop().ok_or(JvmError::StackUnderflow)?;
        if !high.is_high_half() {
            return Err(JvmError::StackTypeMismatch);
        }
        let low = self.stack.pop().ok_or(JvmError::StackUnderflow)?;
        if !low.is_category_2() {
            return Err(JvmError::StackTypeMismatch);
        }
        Ok(low)
    }

    pub fn local(&self, index: u16) -> Result<&RuntimeValue> {
        self.locals
            .get(index as usize)
            .ok_or(JvmError::LocalIndexOutOfRange)
    }

    pub fn set_local(&mut self, index: u16, value: RuntimeValue) -> Result<()> {
        let slot = self
            .locals
            .get_mut(index as usize)
            .ok_or(JvmError::LocalIndexOutOfRange)?;
        *slot = value;
        Ok(())
    }
}
