mod rules;

use log::debug;

use crate::{
    bytecode::{Chunk, OpCode},
    tokenizer::{Token, TokenType, Tokenizer},
    vm::Value,
};

use self::rules::{rule, ParseAction, Precedence};

/// Deepest allowed nesting of groupings and unary operators.
const MAX_NESTING: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    /// The tokenizer produced an error token.
    Lexical,
    Syntax,
    /// A number literal could not be parsed.
    Literal,
    TooManyConstants,
}

/// Where in the source an error was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    At(String),
    End,
    /// Lexical errors carry their own context in the message.
    Unspecified,
}

impl Location {
    fn of(token: &Token<'_>) -> Self {
        match token.token_type {
            TokenType::Eof => Location::End,
            TokenType::Error => Location::Unspecified,
            _ => Location::At(token.lexeme.to_string()),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::At(lexeme) => write!(f, " at '{}'", lexeme),
            Location::End => write!(f, " at end"),
            Location::Unspecified => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[line {line}] error{location}: {message}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub line: usize,
    pub location: Location,
    pub message: String,
}

/// Compiles a single expression into a chunk ending in `Return`.
///
/// Only the first error is reported. Parsing carries on after it without
/// resynchronizing, which is harmless while the grammar has no statements to
/// recover at; any chunk built after an error is discarded.
pub fn compile(source: &str) -> Result<Chunk, CompileError> {
    let tokenizer = Tokenizer::new(source);
    let compiler = Compiler::new(tokenizer);
    compiler.compile()
}

struct Compiler<'a> {
    tokenizer: Tokenizer<'a>,
    current: Token<'a>,
    previous: Token<'a>,
    chunk: Chunk,
    depth: usize,
    fatal: bool,
    error: Option<CompileError>,
}

impl<'a> Compiler<'a> {
    fn new(tokenizer: Tokenizer<'a>) -> Self {
        Self {
            tokenizer,
            current: Token::eof(1),
            previous: Token::eof(1),
            chunk: Chunk::new(),
            depth: 0,
            fatal: false,
            error: None,
        }
    }

    fn compile(mut self) -> Result<Chunk, CompileError> {
        self.advance();
        self.expression();
        self.consume(TokenType::Eof, "expect end of expression");
        let line = self.current.line;
        self.emit_op(OpCode::Return, line);

        match self.error {
            Some(error) => Err(error),
            None => Ok(self.chunk),
        }
    }

    fn advance(&mut self) {
        let mut token = self.tokenizer.token();
        while token.token_type == TokenType::Error {
            let message = token.lexeme.to_string();
            self.report(CompileErrorKind::Lexical, &token, message);
            token = self.tokenizer.token();
        }
        self.previous = std::mem::replace(&mut self.current, token);
    }

    fn consume(&mut self, token_type: TokenType, message: &str) {
        if self.current.token_type == token_type {
            self.advance();
        } else {
            self.error_at_current(CompileErrorKind::Syntax, message.to_string());
        }
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = rule(self.previous.token_type).prefix else {
            self.error_at_previous(CompileErrorKind::Syntax, "expect expression".to_string());
            return;
        };
        self.apply(prefix);

        while precedence <= rule(self.current.token_type).precedence {
            self.advance();
            if let Some(infix) = rule(self.previous.token_type).infix {
                self.apply(infix);
            }
        }
    }

    fn apply(&mut self, action: ParseAction) {
        match action {
            ParseAction::Grouping => self.grouping(),
            ParseAction::Unary => self.unary(),
            ParseAction::Binary => self.binary(),
            ParseAction::Number => self.number(),
        }
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    // Groupings and unary operators are the only rules that recurse without
    // bound, so they go through here.
    fn nested(&mut self, parse: impl FnOnce(&mut Self)) {
        if self.depth >= MAX_NESTING {
            self.error_at_previous(
                CompileErrorKind::Syntax,
                "expression nested too deeply".to_string(),
            );
            return;
        }
        self.depth += 1;
        parse(self);
        self.depth -= 1;
    }

    fn grouping(&mut self) {
        self.nested(Self::expression);
        self.consume(TokenType::RightParen, "expected ')' after expression");
    }

    fn unary(&mut self) {
        let operator = self.previous.token_type;
        let line = self.previous.line;
        self.nested(|compiler| compiler.parse_precedence(Precedence::Unary));
        match operator {
            TokenType::Minus => self.emit_op(OpCode::Negate, line),
            _ => unreachable!("unary rule on {}", operator),
        }
    }

    fn binary(&mut self) {
        let operator = self.previous.token_type;
        let line = self.previous.line;
        // One level higher keeps operators of equal precedence left-associative.
        self.parse_precedence(rule(operator).precedence.higher());
        let op = match operator {
            TokenType::Plus => OpCode::Add,
            TokenType::Minus => OpCode::Subtract,
            TokenType::Star => OpCode::Multiply,
            TokenType::Slash => OpCode::Divide,
            _ => unreachable!("binary rule on {}", operator),
        };
        self.emit_op(op, line);
    }

    fn number(&mut self) {
        let line = self.previous.line;
        match self.previous.lexeme.parse::<f64>() {
            Ok(number) => self.emit_constant(Value::Number(number), line),
            Err(e) => {
                let message = format!("failed to parse number '{}': {}", self.previous.lexeme, e);
                self.error_at_previous(CompileErrorKind::Literal, message);
            }
        }
    }

    fn emit_op(&mut self, op: OpCode, line: usize) {
        self.chunk.write_op(op, line);
    }

    fn emit_constant(&mut self, value: Value, line: usize) {
        let index = self.chunk.add_constant(value);
        if let Ok(index) = u8::try_from(index) {
            self.emit_op(OpCode::Constant, line);
            self.chunk.write(index, line);
        } else if let Ok(index) = u16::try_from(index) {
            self.emit_op(OpCode::ConstantLong, line);
            self.chunk.write_word(index, line);
        } else {
            self.error_at_previous(
                CompileErrorKind::TooManyConstants,
                "too many constants in one chunk".to_string(),
            );
        }
    }

    fn error_at_current(&mut self, kind: CompileErrorKind, message: String) {
        let token = self.current.clone();
        self.report(kind, &token, message);
    }

    fn error_at_previous(&mut self, kind: CompileErrorKind, message: String) {
        let token = self.previous.clone();
        self.report(kind, &token, message);
    }

    fn report(&mut self, kind: CompileErrorKind, token: &Token<'_>, message: String) {
        if self.fatal {
            debug!("suppressed error on line {}: {}", token.line, message);
            return;
        }
        self.fatal = true;

        let compile_error = CompileError {
            kind,
            line: token.line,
            location: Location::of(token),
            message,
        };
        debug!("compile error: {}", compile_error);
        self.error = Some(compile_error);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn error_of(source: &str) -> CompileError {
        compile(source).expect_err("source should fail to compile")
    }

    #[test]
    fn test_compile() {
        let source = "1 + 2 * 3 - 4 / 5";
        let chunk = compile(source).unwrap();
        let expected = vec![
            OpCode::Constant as u8,
            0,
            OpCode::Constant as u8,
            1,
            OpCode::Constant as u8,
            2,
            OpCode::Multiply as u8,
            OpCode::Add as u8,
            OpCode::Constant as u8,
            3,
            OpCode::Constant as u8,
            4,
            OpCode::Divide as u8,
            OpCode::Subtract as u8,
            OpCode::Return as u8,
        ];

        assert_eq!(chunk.code(), expected.as_slice());
        assert_eq!(chunk.lines().len(), chunk.code().len());
        assert_eq!(chunk.constant(4), Some(Value::Number(5.0)));
    }

    #[test]
    fn test_compile_unary_and_grouping() {
        let chunk = compile("-(1 + 2)").unwrap();
        let expected = vec![
            OpCode::Constant as u8,
            0,
            OpCode::Constant as u8,
            1,
            OpCode::Add as u8,
            OpCode::Negate as u8,
            OpCode::Return as u8,
        ];
        assert_eq!(chunk.code(), expected.as_slice());
    }

    #[test]
    fn test_lines_follow_tokens() {
        let chunk = compile("1 +\n2\n").unwrap();
        assert_eq!(chunk.lines(), &[1, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn test_long_constants() {
        let source = (0..300)
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("+");
        let chunk = compile(&source).unwrap();
        assert_eq!(chunk.constants().len(), 300);

        // 256 short constants (2 bytes) and 255 adds precede the first long one.
        let first_long = 256 * 2 + 255;
        assert_eq!(chunk.read_op(first_long - 3), Some(Ok(OpCode::Constant)));
        assert_eq!(chunk.read(first_long - 2), Some(255));
        assert_eq!(chunk.read_op(first_long), Some(Ok(OpCode::ConstantLong)));
        assert_eq!(chunk.read_word(first_long + 1), Some(256));
        assert_eq!(chunk.constant(256), Some(Value::Number(256.0)));
    }

    #[test]
    fn test_constant_pool_limit() {
        let fits = format!("{}1", "1+".repeat(usize::from(u16::MAX)));
        let chunk = compile(&fits).unwrap();
        assert_eq!(chunk.constants().len(), usize::from(u16::MAX) + 1);

        let error = error_of(&format!("{}1", "1+".repeat(usize::from(u16::MAX) + 1)));
        assert_eq!(error.kind, CompileErrorKind::TooManyConstants);
        assert_eq!(
            error.to_string(),
            "[line 1] error at '1': too many constants in one chunk"
        );
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(compile(&nested(MAX_NESTING)).is_ok());

        let error = error_of(&nested(MAX_NESTING + 1));
        assert_eq!(error.kind, CompileErrorKind::Syntax);
        assert_eq!(
            error.to_string(),
            "[line 1] error at '(': expression nested too deeply"
        );

        let error = error_of(&nested(200_000));
        assert_eq!(error.kind, CompileErrorKind::Syntax);

        let error = error_of(&format!("{}1", "-".repeat(200_000)));
        assert_eq!(
            error.to_string(),
            "[line 1] error at '-': expression nested too deeply"
        );
    }

    #[test]
    fn test_empty_input() {
        let error = error_of("");
        assert_eq!(error.kind, CompileErrorKind::Syntax);
        assert_eq!(error.location, Location::End);
        assert_eq!(error.to_string(), "[line 1] error at end: expect expression");
    }

    #[test]
    fn test_dangling_operator() {
        let error = error_of("1 +");
        assert_eq!(error.to_string(), "[line 1] error at end: expect expression");

        let error = error_of("\n\n*");
        assert_eq!(error.to_string(), "[line 3] error at '*': expect expression");
    }

    #[test]
    fn test_missing_paren() {
        let error = error_of("(1 + 2");
        assert_eq!(
            error.to_string(),
            "[line 1] error at end: expected ')' after expression"
        );
    }

    #[test]
    fn test_trailing_tokens() {
        let error = error_of("1 2");
        assert_eq!(
            error.to_string(),
            "[line 1] error at '2': expect end of expression"
        );
    }

    #[test]
    fn test_unsupported_tokens() {
        for source in ["1 % 2", "true", "\"str\"", "x"] {
            assert_eq!(error_of(source).kind, CompileErrorKind::Syntax, "{}", source);
        }
    }

    #[test]
    fn test_lexical_error_reported_first() {
        let error = error_of("1 + $");
        assert_eq!(error.kind, CompileErrorKind::Lexical);
        assert_eq!(error.location, Location::Unspecified);
        assert_eq!(error.to_string(), "[line 1] error: unexpected character '$'");

        let error = error_of("\"open");
        assert_eq!(error.to_string(), "[line 1] error: unterminated string");
    }

    #[test]
    fn test_only_first_error_is_kept() {
        let error = error_of(") 1 )");
        assert_eq!(error.to_string(), "[line 1] error at ')': expect expression");

        // Scanning the lookahead happens before the prefix lookup fails.
        let error = error_of(") $");
        assert_eq!(error.kind, CompileErrorKind::Lexical);
    }
}
