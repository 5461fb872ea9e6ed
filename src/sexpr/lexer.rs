use logos::{Logos, SpannedIter};

pub(super) struct Token {
    pub(super) kind: TokenKind,
    pub(super) span: logos::Span,
}

pub(super) struct TokenIter<'a> {
    iter: SpannedIter<'a, LogosTokenKind>,
}

impl<'a> TokenIter<'a> {
    pub(super) fn new(input: &'a str) -> Self {
        Self {
            iter: LogosTokenKind::lexer(input).spanned(),
        }
    }
}

impl<'a> Iterator for TokenIter<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let (kind, span) = self.iter.next()?;
        let (kind, span) = match kind {
            Ok(LogosTokenKind::LParen) => (TokenKind::LParen, span),
            Ok(LogosTokenKind::RParen) => (TokenKind::RParen, span),
            // Strip the quotes, escapes are resolved later by `unescape`
            Ok(LogosTokenKind::QuotedString) => {
                (TokenKind::String, (span.start + 1)..(span.end - 1))
            }
            Ok(LogosTokenKind::Atom) => (TokenKind::String, span),
            Err(()) => (TokenKind::Error, span),
        };
        Some(Token { kind, span })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum TokenKind {
    LParen,
    RParen,
    String,
    Error,
}

#[derive(Logos, Clone, Copy, Debug, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f\n]+")]
enum LogosTokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[regex(r#""([^"\\]|\\.)*""#)]
    QuotedString,
    #[regex(r#"[^"() \t\r\f\n]+"#)]
    Atom,
}
