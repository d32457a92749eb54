use super::{RuntimeError, Value};

const INITIAL_STACK_SIZE: usize = 256;

/// Operand stack. Starts with room for 256 values and grows on demand.
pub struct Stack {
    storage: Vec<Value>,
}

impl Stack {
    pub fn new() -> Self {
        Stack {
            storage: Vec::with_capacity(INITIAL_STACK_SIZE),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.storage.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.storage.pop().ok_or(RuntimeError::StackUnderflow)
    }

    pub fn clear(&mut self) {
        self.storage.clear();
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.storage
    }
}
