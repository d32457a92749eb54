pub mod disassemble;
pub mod serialize;

use crate::vm::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Return,
    Constant,
    ConstantLong,
    Negate,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl OpCode {
    /// Number of operand bytes that follow the opcode in the code stream.
    pub fn operand_width(&self) -> usize {
        match self {
            OpCode::Constant => 1,
            OpCode::ConstantLong => 2,
            _ => 0,
        }
    }
}

impl From<OpCode> for u8 {
    fn from(value: OpCode) -> u8 {
        value as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error(
    "Invalid byte {0} found when expecting OpCode value between 0 and {}",
    OpCode::Divide as u8
)]
pub struct UnknownOpCode(pub u8);

impl TryFrom<u8> for OpCode {
    type Error = UnknownOpCode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => OpCode::Return,
            1 => OpCode::Constant,
            2 => OpCode::ConstantLong,
            3 => OpCode::Negate,
            4 => OpCode::Add,
            5 => OpCode::Subtract,
            6 => OpCode::Multiply,
            7 => OpCode::Divide,
            _ => return Err(UnknownOpCode(value)),
        })
    }
}

/// Compiled program: code bytes, the constant pool they index into, and the
/// source line of every code byte.
///
/// Chunks only grow by appending. `lines` always has exactly one entry per
/// byte of `code`, operand bytes included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    code: Vec<u8>,
    lines: Vec<usize>,
    constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn lines(&self) -> &[usize] {
        &self.lines
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn write(&mut self, byte: impl Into<u8>, line: usize) {
        self.code.push(byte.into());
        self.lines.push(line);
    }

    /// Writes `word` big-endian, recording `line` for both bytes.
    pub fn write_word(&mut self, word: u16, line: usize) {
        let [major, minor] = word.to_be_bytes();
        self.write(major, line);
        self.write(minor, line);
    }

    pub fn write_op(&mut self, op: OpCode, line: usize) {
        self.write(op, line);
    }

    pub fn read(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    pub fn read_word(&self, offset: usize) -> Option<u16> {
        let major = self.read(offset)?;
        let minor = self.read(offset + 1)?;
        Some(u16::from_be_bytes([major, minor]))
    }

    pub fn read_op(&self, offset: usize) -> Option<Result<OpCode, UnknownOpCode>> {
        self.read(offset).map(OpCode::try_from)
    }

    pub fn line(&self, offset: usize) -> Option<usize> {
        self.lines.get(offset).copied()
    }

    /// Appends `value` to the constant pool and returns its index.
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    pub fn constant(&self, index: usize) -> Option<Value> {
        self.constants.get(index).copied()
    }

    pub(crate) fn from_parts(code: Vec<u8>, lines: Vec<usize>, constants: Vec<Value>) -> Self {
        debug_assert_eq!(code.len(), lines.len());
        Self {
            code,
            lines,
            constants,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get_constant() {
        let mut chunk = Chunk::new();
        let expected = Value::Number(1.23);
        let index = chunk.add_constant(expected);
        assert_eq!(chunk.constant(index), Some(expected));
    }

    #[test]
    fn test_constant_indices_are_sequential() {
        let mut chunk = Chunk::new();
        for i in 0..300 {
            assert_eq!(chunk.add_constant(Value::Number(i as f64)), i);
        }
        assert_eq!(chunk.constant(299), Some(Value::Number(299.0)));
        assert_eq!(chunk.constant(300), None);
    }

    #[test]
    fn test_write_and_read() {
        let cases: [&[u8]; 4] = [&[], &[0, 1, 2, 3], &[12], &[255, 0, 128]];
        for values in cases {
            let mut chunk = Chunk::new();
            for &value in values {
                chunk.write(value, 0);
            }
            for (offset, &expected) in values.iter().enumerate() {
                assert_eq!(chunk.read(offset), Some(expected));
            }
            assert_eq!(chunk.read(values.len()), None);
            assert_eq!(chunk.lines().len(), chunk.code().len());
        }
    }

    #[test]
    fn test_write_and_read_word() {
        let cases: [&[u16]; 3] = [&[0, 1, 2, 3, 1024], &[12, 1 << 13], &[u16::MAX]];
        for values in cases {
            let mut chunk = Chunk::new();
            for &value in values {
                chunk.write_word(value, 7);
            }
            for (i, &expected) in values.iter().enumerate() {
                assert_eq!(chunk.read_word(i * 2), Some(expected));
            }
            assert_eq!(chunk.len(), values.len() * 2);
            assert!(chunk.lines().iter().all(|&line| line == 7));
        }
    }

    #[test]
    fn test_word_is_big_endian() {
        let mut chunk = Chunk::new();
        chunk.write_word(0x0102, 1);
        assert_eq!(chunk.code(), &[0x01, 0x02]);
        assert_eq!(chunk.read_word(1), None);
    }

    #[test]
    fn test_write_and_read_op() {
        let ops = [
            OpCode::Constant,
            OpCode::Constant,
            OpCode::Multiply,
            OpCode::Constant,
            OpCode::Add,
            OpCode::Return,
        ];
        let mut chunk = Chunk::new();
        for op in ops {
            chunk.write_op(op, 0);
        }
        for (offset, &expected) in ops.iter().enumerate() {
            assert_eq!(chunk.read_op(offset), Some(Ok(expected)));
        }
    }

    #[test]
    fn test_opcode_from_u8() {
        for byte in 0..=OpCode::Divide as u8 {
            let op = OpCode::try_from(byte).unwrap();
            assert_eq!(u8::from(op), byte);
        }
        assert_eq!(OpCode::try_from(8), Err(UnknownOpCode(8)));
        assert_eq!(OpCode::try_from(255), Err(UnknownOpCode(255)));
    }
}
