mod stack;

use std::{cell::RefCell, fmt::Display, io::Write, rc::Rc};

use log::{debug, warn};

use crate::{
    bytecode::{
        disassemble::{render_chunk, render_instruction, render_stack},
        Chunk, OpCode,
    },
    compiler::{self, CompileError},
};

use self::stack::Stack;

/// A runtime value.
///
/// Numbers are the only values the language produces today. The enum leaves
/// room for more variants without changing the bytecode or the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{:.6}", n),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InterpretError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("Runtime failure occured: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Failures while executing a chunk.
///
/// Apart from `Output`, chunks produced by the compiler never trigger these.
/// They guard chunks handed to [`Vm::interpret_chunk`] directly, e.g. ones
/// loaded from disk.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),
    #[error("Constant index {0} is out of range")]
    InvalidConstant(usize),
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

struct Execution<'a> {
    chunk: &'a Chunk,
    ip: usize,
}

impl Execution<'_> {
    fn read_byte(&mut self) -> Result<u8, RuntimeError> {
        let ret = self
            .chunk
            .read(self.ip)
            .ok_or(RuntimeError::UnexpectedEnd(self.ip))?;
        self.ip += 1;
        Ok(ret)
    }

    fn read_word(&mut self) -> Result<u16, RuntimeError> {
        let ret = self
            .chunk
            .read_word(self.ip)
            .ok_or(RuntimeError::UnexpectedEnd(self.ip))?;
        self.ip += 2;
        Ok(ret)
    }

    fn constant(&self, index: usize) -> Result<Value, RuntimeError> {
        self.chunk
            .constant(index)
            .ok_or(RuntimeError::InvalidConstant(index))
    }
}

/// Stack machine executing one [`Chunk`] at a time.
///
/// Results of `Return` are written to `stdout`; disassembly and execution
/// traces go to `trace`. A `Vm` can be reused: the stack is cleared each time
/// a new chunk is loaded.
pub struct Vm {
    stack: Stack,
    debug: bool,
    stdout: Rc<RefCell<dyn Write>>,
    trace: Rc<RefCell<dyn Write>>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::with_output(
            Rc::new(RefCell::new(std::io::stdout())),
            Rc::new(RefCell::new(std::io::stderr())),
        )
    }

    pub fn with_output(stdout: Rc<RefCell<dyn Write>>, trace: Rc<RefCell<dyn Write>>) -> Self {
        Self {
            stack: Stack::new(),
            debug: false,
            stdout,
            trace,
        }
    }

    /// Disassemble compiled chunks and trace every executed instruction.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn stack(&self) -> &[Value] {
        self.stack.as_slice()
    }

    /// Compiles `source` and runs it. Nothing is executed if compilation fails.
    pub fn interpret(&mut self, source: &str) -> Result<Value, InterpretError> {
        let chunk = compiler::compile(source)?;
        debug!(
            "compiled {} bytes of bytecode with {} constants",
            chunk.len(),
            chunk.constants().len()
        );

        if self.debug || cfg!(feature = "disassemble") {
            write!(self.trace.borrow_mut(), "{}", render_chunk(&chunk, "code"))
                .map_err(RuntimeError::from)?;
        }

        self.interpret_chunk(&chunk)
    }

    pub fn interpret_chunk(&mut self, chunk: &Chunk) -> Result<Value, InterpretError> {
        self.stack.clear();
        let value = self.run(chunk)?;
        debug!("execution finished with {}", value);
        Ok(value)
    }

    fn run(&mut self, chunk: &Chunk) -> Result<Value, RuntimeError> {
        let mut execution = Execution { chunk, ip: 0 };
        let tracing = self.debug || cfg!(feature = "trace");

        loop {
            if tracing {
                let (instruction, _) = render_instruction(chunk, execution.ip);
                let mut trace = self.trace.borrow_mut();
                writeln!(trace, "{}", render_stack(self.stack.as_slice()))?;
                writeln!(trace, "{}", instruction)?;
            }

            let offset = execution.ip;
            let op = match OpCode::try_from(execution.read_byte()?) {
                Ok(op) => op,
                Err(e) => {
                    warn!("skipping instruction at offset {}: {}", offset, e);
                    continue;
                }
            };

            match op {
                OpCode::Constant => {
                    let index = execution.read_byte()?;
                    let constant = execution.constant(usize::from(index))?;
                    self.stack.push(constant);
                }
                OpCode::ConstantLong => {
                    let index = execution.read_word()?;
                    let constant = execution.constant(usize::from(index))?;
                    self.stack.push(constant);
                }
                OpCode::Negate => match self.stack.pop()? {
                    Value::Number(n) => self.stack.push(Value::Number(-n)),
                },
                OpCode::Add => binary_op(&mut self.stack, |a, b| a + b)?,
                OpCode::Subtract => binary_op(&mut self.stack, |a, b| a - b)?,
                OpCode::Multiply => binary_op(&mut self.stack, |a, b| a * b)?,
                OpCode::Divide => binary_op(&mut self.stack, |a, b| a / b)?,
                OpCode::Return => {
                    let value = self.stack.pop()?;
                    writeln!(self.stdout.borrow_mut(), "{}", value)?;
                    return Ok(value);
                }
            }
        }
    }
}

// The right operand is on top of the stack.
fn binary_op(stack: &mut Stack, op: impl Fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
    let b = stack.pop()?;
    let a = stack.pop()?;
    let result = match (a, b) {
        (Value::Number(a), Value::Number(b)) => Value::Number(op(a, b)),
    };
    stack.push(result);
    Ok(())
}
