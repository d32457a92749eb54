//! Human-readable rendering of chunks and VM stacks.
//!
//! Everything here is read-only: it only ever produces text and never feeds
//! back into compilation or execution.

use crate::vm::Value;

use super::{Chunk, OpCode};

pub fn render_chunk(chunk: &Chunk, header: &str) -> String {
    let mut out = format!("== {} ==\n", header);

    let mut offset = 0;
    while offset < chunk.len() {
        let (text, next) = render_instruction(chunk, offset);
        out.push_str(&text);
        out.push('\n');
        offset = next;
    }
    out
}

/// Renders the instruction at `offset` and returns the offset of the next one.
pub fn render_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut out = format!("{:04} ", offset);

    let line = chunk.line(offset);
    if offset > 0 && line == chunk.line(offset - 1) {
        out.push_str("   | ");
    } else {
        out.push_str(&format!("{:4} ", line.unwrap_or_default()));
    }

    let Some(instruction) = chunk.read_op(offset) else {
        out.push_str("<end of chunk>");
        return (out, offset + 1);
    };

    let complete = match instruction {
        Ok(OpCode::Constant) => {
            let index = chunk.read(offset + 1).map(usize::from);
            constant_instruction(&mut out, "OP_CONSTANT", chunk, index)
        }
        Ok(OpCode::ConstantLong) => {
            let index = chunk.read_word(offset + 1).map(usize::from);
            constant_instruction(&mut out, "OP_CONSTANT_LONG", chunk, index)
        }
        Ok(op) => {
            out.push_str(simple_name(op));
            true
        }
        Err(e) => {
            out.push_str(&format!("Unknown opcode {}", e.0));
            return (out, offset + 1);
        }
    };

    match instruction {
        Ok(op) if complete => (out, offset + 1 + op.operand_width()),
        _ => (out, chunk.len()),
    }
}

pub fn render_stack(values: &[Value]) -> String {
    let mut out = String::from("          ");
    for value in values {
        out.push_str(&format!("[ {} ]", value));
    }
    out
}

fn simple_name(op: OpCode) -> &'static str {
    match op {
        OpCode::Return => "OP_RETURN",
        OpCode::Constant => "OP_CONSTANT",
        OpCode::ConstantLong => "OP_CONSTANT_LONG",
        OpCode::Negate => "OP_NEGATE",
        OpCode::Add => "OP_ADD",
        OpCode::Subtract => "OP_SUBTRACT",
        OpCode::Multiply => "OP_MULTIPLY",
        OpCode::Divide => "OP_DIVIDE",
    }
}

// Returns false when the operand runs past the end of the chunk.
fn constant_instruction(
    out: &mut String,
    name: &str,
    chunk: &Chunk,
    index: Option<usize>,
) -> bool {
    let Some(index) = index else {
        out.push_str(&format!("{:<16} <truncated>", name));
        return false;
    };
    match chunk.constant(index) {
        Some(value) => out.push_str(&format!("{:<16} {:4} '{}'", name, index, value)),
        None => out.push_str(&format!("{:<16} {:4} <missing>", name, index)),
    }
    true
}
