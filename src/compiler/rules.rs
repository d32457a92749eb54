use crate::tokenizer::TokenType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum Precedence {
    None,
    Assignment, // =
    Term,       // + -
    Factor,     // * /
    Unary,      // -
}

impl Precedence {
    pub(super) fn higher(&self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Unary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ParseAction {
    Grouping,
    Unary,
    Binary,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct ParseRule {
    pub prefix: Option<ParseAction>,
    pub infix: Option<ParseAction>,
    pub precedence: Precedence,
}

impl ParseRule {
    const fn new(
        prefix: Option<ParseAction>,
        infix: Option<ParseAction>,
        precedence: Precedence,
    ) -> Self {
        Self {
            prefix,
            infix,
            precedence,
        }
    }
}

const NO_RULE: ParseRule = ParseRule::new(None, None, Precedence::None);

pub(super) const fn rule(token_type: TokenType) -> ParseRule {
    use ParseAction::*;

    match token_type {
        TokenType::LeftParen => ParseRule::new(Some(Grouping), None, Precedence::None),
        TokenType::Minus => ParseRule::new(Some(Unary), Some(Binary), Precedence::Term),
        TokenType::Plus => ParseRule::new(None, Some(Binary), Precedence::Term),
        TokenType::Slash | TokenType::Star => {
            ParseRule::new(None, Some(Binary), Precedence::Factor)
        }
        TokenType::Number => ParseRule::new(Some(Number), None, Precedence::None),

        TokenType::RightParen
        | TokenType::LeftBrace
        | TokenType::RightBrace
        | TokenType::Comma
        | TokenType::Dot
        | TokenType::Semicolon
        | TokenType::Percent
        | TokenType::Bang
        | TokenType::BangEqual
        | TokenType::Equal
        | TokenType::EqualEqual
        | TokenType::Greater
        | TokenType::GreaterEqual
        | TokenType::Less
        | TokenType::LessEqual
        | TokenType::Identifier
        | TokenType::String
        | TokenType::And
        | TokenType::Class
        | TokenType::Else
        | TokenType::False
        | TokenType::For
        | TokenType::Fun
        | TokenType::If
        | TokenType::Nil
        | TokenType::Or
        | TokenType::Print
        | TokenType::Return
        | TokenType::Super
        | TokenType::This
        | TokenType::True
        | TokenType::Var
        | TokenType::While
        | TokenType::Error
        | TokenType::Eof => NO_RULE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        assert!(Precedence::None < Precedence::Assignment);
        assert!(Precedence::Assignment < Precedence::Term);
        assert!(Precedence::Term < Precedence::Factor);
        assert!(Precedence::Factor < Precedence::Unary);
        assert_eq!(Precedence::Term.higher(), Precedence::Factor);
    }

    #[test]
    fn test_binding_tokens_have_infix_actions() {
        let all = [
            TokenType::LeftParen,
            TokenType::RightParen,
            TokenType::Minus,
            TokenType::Plus,
            TokenType::Slash,
            TokenType::Star,
            TokenType::Percent,
            TokenType::Number,
            TokenType::Identifier,
            TokenType::String,
            TokenType::Error,
            TokenType::Eof,
        ];
        for token_type in all {
            let rule = rule(token_type);
            assert_eq!(
                rule.precedence > Precedence::None,
                rule.infix.is_some(),
                "{:?}",
                token_type
            );
        }
    }

    #[test]
    fn test_rules() {
        assert_eq!(rule(TokenType::Number).prefix, Some(ParseAction::Number));
        assert_eq!(rule(TokenType::LeftParen).prefix, Some(ParseAction::Grouping));
        assert_eq!(rule(TokenType::Minus).prefix, Some(ParseAction::Unary));
        assert_eq!(rule(TokenType::Star).precedence, Precedence::Factor);
        assert_eq!(rule(TokenType::Plus).prefix, None);
        assert_eq!(rule(TokenType::Eof), NO_RULE);
    }
}
