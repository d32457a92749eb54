pub mod bytecode;
pub mod compiler;
pub mod tokenizer;
pub mod vm;

pub use compiler::compile;

use vm::{InterpretError, Value, Vm};

/// Compiles and runs `source` on a fresh [`Vm`] writing to stdout.
pub fn interpret(source: &str) -> Result<Value, InterpretError> {
    Vm::new().interpret(source)
}
