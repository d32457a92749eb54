mod token;

pub use self::token::{Token, TokenType};

/// Lazily scans a source buffer into [`Token`]s.
///
/// Lexical errors do not abort scanning: they are produced in-band as
/// [`TokenType::Error`] tokens and the tokenizer carries on from the next
/// character. Once the input is exhausted every call yields [`TokenType::Eof`].
pub struct Tokenizer<'a> {
    source: &'a str,
    start: usize,
    current: usize,
    line: usize,
    finished: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            start: 0,
            current: 0,
            line: 1,
            finished: false,
        }
    }

    pub fn token(&mut self) -> Token<'a> {
        self.skip_trivia();
        self.start = self.current;

        let Some(c) = self.advance() else {
            return Token::eof(self.line);
        };

        if is_alpha(c) {
            return self.identifier();
        }
        if c.is_ascii_digit() {
            return self.number();
        }

        match c {
            b'(' => self.make_token(TokenType::LeftParen),
            b')' => self.make_token(TokenType::RightParen),
            b'{' => self.make_token(TokenType::LeftBrace),
            b'}' => self.make_token(TokenType::RightBrace),
            b',' => self.make_token(TokenType::Comma),
            b'.' => self.make_token(TokenType::Dot),
            b'-' => self.make_token(TokenType::Minus),
            b'+' => self.make_token(TokenType::Plus),
            b';' => self.make_token(TokenType::Semicolon),
            b'/' => self.make_token(TokenType::Slash),
            b'*' => self.make_token(TokenType::Star),
            b'%' => self.make_token(TokenType::Percent),
            b'!' => self.one_or_two(TokenType::Bang, TokenType::BangEqual),
            b'=' => self.one_or_two(TokenType::Equal, TokenType::EqualEqual),
            b'<' => self.one_or_two(TokenType::Less, TokenType::LessEqual),
            b'>' => self.one_or_two(TokenType::Greater, TokenType::GreaterEqual),
            b'"' => self.string(),
            _ => self.unexpected_character(),
        }
    }

    fn advance(&mut self) -> Option<u8> {
        let c = *self.source.as_bytes().get(self.current)?;
        self.current += 1;
        Some(c)
    }

    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.current).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.source.as_bytes().get(self.current + 1).copied()
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                b' ' | b'\r' | b'\t' => {
                    self.current += 1;
                }
                b'\n' => {
                    self.line += 1;
                    self.current += 1;
                }
                b'/' if self.peek_next() == Some(b'/') => {
                    while self.peek().is_some_and(|c| c != b'\n') {
                        self.current += 1;
                    }
                }
                _ => return,
            }
        }
    }

    fn make_token(&self, token_type: TokenType) -> Token<'a> {
        Token::new(
            token_type,
            &self.source[self.start..self.current],
            self.line,
        )
    }

    fn one_or_two(&mut self, single: TokenType, double: TokenType) -> Token<'a> {
        if self.matches(b'=') {
            self.make_token(double)
        } else {
            self.make_token(single)
        }
    }

    fn identifier(&mut self) -> Token<'a> {
        while self.peek().is_some_and(|c| is_alpha(c) || c.is_ascii_digit()) {
            self.current += 1;
        }
        self.make_token(self.identifier_type())
    }

    fn identifier_type(&self) -> TokenType {
        let lexeme = &self.source.as_bytes()[self.start..self.current];
        match lexeme[0] {
            b'a' => check_keyword(lexeme, 1, b"nd", TokenType::And),
            b'c' => check_keyword(lexeme, 1, b"lass", TokenType::Class),
            b'e' => check_keyword(lexeme, 1, b"lse", TokenType::Else),
            b'i' => check_keyword(lexeme, 1, b"f", TokenType::If),
            b'n' => check_keyword(lexeme, 1, b"il", TokenType::Nil),
            b'o' => check_keyword(lexeme, 1, b"r", TokenType::Or),
            b'p' => check_keyword(lexeme, 1, b"rint", TokenType::Print),
            b'r' => check_keyword(lexeme, 1, b"eturn", TokenType::Return),
            b's' => check_keyword(lexeme, 1, b"uper", TokenType::Super),
            b'v' => check_keyword(lexeme, 1, b"ar", TokenType::Var),
            b'w' => check_keyword(lexeme, 1, b"hile", TokenType::While),
            b'f' if lexeme.len() > 1 => match lexeme[1] {
                b'a' => check_keyword(lexeme, 2, b"lse", TokenType::False),
                b'o' => check_keyword(lexeme, 2, b"r", TokenType::For),
                b'u' => check_keyword(lexeme, 2, b"n", TokenType::Fun),
                _ => TokenType::Identifier,
            },
            b't' if lexeme.len() > 1 => match lexeme[1] {
                b'h' => check_keyword(lexeme, 2, b"is", TokenType::This),
                b'r' => check_keyword(lexeme, 2, b"ue", TokenType::True),
                _ => TokenType::Identifier,
            },
            _ => TokenType::Identifier,
        }
    }

    fn number(&mut self) -> Token<'a> {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.current += 1;
        }

        // A trailing '.' without a digit after it belongs to the next token.
        if self.peek() == Some(b'.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.current += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.current += 1;
            }
        }

        self.make_token(TokenType::Number)
    }

    fn string(&mut self) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c == b'"' {
                break;
            }
            if c == b'\n' {
                self.line += 1;
            }
            self.current += 1;
        }

        if self.advance().is_none() {
            return Token::error("unterminated string".to_string(), self.line);
        }

        self.make_token(TokenType::String)
    }

    fn unexpected_character(&mut self) -> Token<'a> {
        let c = self.source[self.start..]
            .chars()
            .next()
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        self.current = self.start + c.len_utf8();
        Token::error(format!("unexpected character '{}'", c), self.line)
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    /// Yields every token up to and including the first [`TokenType::Eof`].
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.token();
        if token.token_type == TokenType::Eof {
            self.finished = true;
        }
        Some(token)
    }
}

fn is_alpha(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn check_keyword(lexeme: &[u8], start: usize, rest: &[u8], token_type: TokenType) -> TokenType {
    if &lexeme[start..] == rest {
        token_type
    } else {
        TokenType::Identifier
    }
}
