//! On-disk chunk layout.
//!
//! All integers are big-endian:
//!
//! ```text
//! magic     b"ATMC"
//! version   u8
//! code_len  u32, then code_len code bytes
//! lines     code_len x u32
//! n_consts  u32, then per constant: tag u8, payload
//! ```
//!
//! Lines are stored one per code byte so decoding is exact.

use crate::vm::Value;

use super::Chunk;

const MAGIC: &[u8; 4] = b"ATMC";
const VERSION: u8 = 1;

const TAG_NUMBER: u8 = 0;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Not a chunk file: bad magic bytes")]
    BadMagic,
    #[error("Unsupported chunk format version {0}")]
    UnsupportedVersion(u8),
    #[error("Chunk data ended early while reading {0}")]
    Truncated(&'static str),
    #[error("Unknown value tag {0}")]
    UnknownValueTag(u8),
    #[error("Line number {0} does not fit in this platform's usize")]
    LineOutOfRange(u32),
    #[error("{0} trailing bytes after chunk data")]
    TrailingBytes(usize),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("Chunk section {0} has more than u32::MAX entries")]
    TooLarge(&'static str),
    #[error("Line number {0} does not fit in u32")]
    LineOutOfRange(usize),
}

impl Chunk {
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(
            MAGIC.len() + 1 + 4 + self.code.len() * 5 + 4 + self.constants.len() * 9,
        );
        out.extend_from_slice(MAGIC);
        out.push(VERSION);

        write_len(&mut out, self.code.len(), "code")?;
        out.extend_from_slice(&self.code);
        for &line in &self.lines {
            let line = u32::try_from(line).map_err(|_| EncodeError::LineOutOfRange(line))?;
            out.extend_from_slice(&line.to_be_bytes());
        }

        write_len(&mut out, self.constants.len(), "constants")?;
        for value in &self.constants {
            match value {
                Value::Number(n) => {
                    out.push(TAG_NUMBER);
                    out.extend_from_slice(&n.to_bits().to_be_bytes());
                }
            }
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Chunk, DecodeError> {
        let mut reader = Reader { bytes };

        if reader.take(MAGIC.len(), "magic")? != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let version = reader.u8("version")?;
        if version != VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let code_len = reader.u32("code length")? as usize;
        let code = reader.take(code_len, "code")?.to_vec();
        let mut lines = Vec::with_capacity(code_len);
        for _ in 0..code_len {
            let line = reader.u32("lines")?;
            lines.push(usize::try_from(line).map_err(|_| DecodeError::LineOutOfRange(line))?);
        }

        let constant_count = reader.u32("constant count")?;
        let mut constants = Vec::new();
        for _ in 0..constant_count {
            let value = match reader.u8("constant tag")? {
                TAG_NUMBER => Value::Number(f64::from_bits(reader.u64("constant")?)),
                tag => return Err(DecodeError::UnknownValueTag(tag)),
            };
            constants.push(value);
        }

        if !reader.bytes.is_empty() {
            return Err(DecodeError::TrailingBytes(reader.bytes.len()));
        }

        Ok(Chunk::from_parts(code, lines, constants))
    }
}

fn write_len(out: &mut Vec<u8>, len: usize, section: &'static str) -> Result<(), EncodeError> {
    let len = u32::try_from(len).map_err(|_| EncodeError::TooLarge(section))?;
    out.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], DecodeError> {
        if self.bytes.len() < n {
            return Err(DecodeError::Truncated(what));
        }
        let (head, rest) = self.bytes.split_at(n);
        self.bytes = rest;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], DecodeError> {
        let mut buf = [0; N];
        buf.copy_from_slice(self.take(N, what)?);
        Ok(buf)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, DecodeError> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.array(what)?))
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.array(what)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::OpCode;

    fn sample() -> Chunk {
        let mut chunk = Chunk::new();
        let a = chunk.add_constant(Value::Number(1.5));
        let b = chunk.add_constant(Value::Number(f64::NAN));
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(a as u8, 1);
        chunk.write_op(OpCode::ConstantLong, 2);
        chunk.write_word(b as u16, 2);
        chunk.write_op(OpCode::Add, 3);
        chunk.write_op(OpCode::Return, 3);
        chunk
    }

    #[test]
    fn test_round_trip() {
        let chunk = sample();
        let bytes = chunk.to_bytes().unwrap();
        let decoded = Chunk::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.code(), chunk.code());
        assert_eq!(decoded.lines(), chunk.lines());
        assert_eq!(decoded.constants().len(), 2);
        assert_eq!(decoded.constant(0), Some(Value::Number(1.5)));
        // NaN payloads survive bit for bit.
        let (Some(Value::Number(original)), Some(Value::Number(restored))) =
            (chunk.constant(1), decoded.constant(1))
        else {
            panic!("missing constant");
        };
        assert_eq!(original.to_bits(), restored.to_bits());
    }

    #[test]
    fn test_empty_chunk_round_trip() {
        let bytes = Chunk::new().to_bytes().unwrap();
        assert_eq!(Chunk::from_bytes(&bytes).unwrap(), Chunk::new());
    }

    #[test]
    fn test_decode_errors() {
        let bytes = sample().to_bytes().unwrap();

        assert_eq!(Chunk::from_bytes(b"NOPE\x01"), Err(DecodeError::BadMagic));
        assert_eq!(
            Chunk::from_bytes(b"ATM"),
            Err(DecodeError::Truncated("magic"))
        );

        let mut wrong_version = bytes.clone();
        wrong_version[4] = 9;
        assert_eq!(
            Chunk::from_bytes(&wrong_version),
            Err(DecodeError::UnsupportedVersion(9))
        );

        for cut in 5..bytes.len() {
            assert!(matches!(
                Chunk::from_bytes(&bytes[..cut]),
                Err(DecodeError::Truncated(_))
            ));
        }

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert_eq!(
            Chunk::from_bytes(&trailing),
            Err(DecodeError::TrailingBytes(1))
        );

        let mut bad_tag = bytes;
        let tag_offset = bad_tag.len() - 9;
        bad_tag[tag_offset] = 7;
        assert_eq!(
            Chunk::from_bytes(&bad_tag),
            Err(DecodeError::UnknownValueTag(7))
        );
    }
}
