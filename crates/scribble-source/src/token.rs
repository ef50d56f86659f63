use std::fmt;

use serde::{Deserialize, Serialize};

use crate::location::TokenLocation;

/// Broad classification of a token. The finer distinction lives in
/// [`Token::code`]: the character for symbols, the keyword index for
/// keywords, the [`NumberKind`], [`QuoteKind`] or [`CommentStyle`] for
/// numbers, strings and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Unknown,
    EndOfFile,
    EndOfLine,
    Whitespace,
    Comment,
    Symbol,
    Keyword,
    Identifier,
    Number,
    QuotedString,
    Directive,
    DirectiveArg,
}

impl TokenKind {
    /// Tokens the parser never sees unless the lexer was asked for them.
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace
                | TokenKind::EndOfLine
                | TokenKind::Comment
                | TokenKind::Directive
                | TokenKind::DirectiveArg
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Unknown => "unknown token",
            TokenKind::EndOfFile => "end of file",
            TokenKind::EndOfLine => "end of line",
            TokenKind::Whitespace => "whitespace",
            TokenKind::Comment => "comment",
            TokenKind::Symbol => "symbol",
            TokenKind::Keyword => "keyword",
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::QuotedString => "string",
            TokenKind::Directive => "directive",
            TokenKind::DirectiveArg => "directive argument",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum NumberKind {
    Integer = 0,
    Decimal = 1,
    Hex = 2,
    Binary = 3,
}

impl NumberKind {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(NumberKind::Integer),
            1 => Some(NumberKind::Decimal),
            2 => Some(NumberKind::Hex),
            3 => Some(NumberKind::Binary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum QuoteKind {
    Single = '\'' as u32,
    Double = '"' as u32,
    Back = '`' as u32,
}

impl QuoteKind {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '\'' => Some(QuoteKind::Single),
            '"' => Some(QuoteKind::Double),
            '`' => Some(QuoteKind::Back),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            QuoteKind::Single => '\'',
            QuoteKind::Double => '"',
            QuoteKind::Back => '`',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum CommentStyle {
    Block = 0,
    Line = 1,
}

/// A single lexeme.
///
/// `text` holds the token's literal payload: the identifier or keyword
/// spelling, the digits of a number (without `0x`/`0b` prefix), the
/// unescaped contents of a string, or the body of a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub code: u32,
    pub text: String,
    pub location: TokenLocation,
    /// Raw length in bytes of the lexeme in its source frame.
    pub len: usize,
    /// `false` for strings and block comments cut off by end of text.
    pub terminated: bool,
}

impl Token {
    pub fn new(kind: TokenKind, code: u32, text: impl Into<String>, location: TokenLocation, len: usize) -> Self {
        Self {
            kind,
            code,
            text: text.into(),
            location,
            len,
            terminated: true,
        }
    }

    pub fn end_of_file(location: TokenLocation) -> Self {
        Self::new(TokenKind::EndOfFile, 0, "", location, 0)
    }

    pub fn matches(&self, kind: TokenKind, code: u32) -> bool {
        self.kind == kind && self.code == code
    }

    pub fn is_symbol(&self, c: char) -> bool {
        self.matches(TokenKind::Symbol, c as u32)
    }

    pub fn is_keyword(&self, code: u32) -> bool {
        self.matches(TokenKind::Keyword, code)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::EndOfFile
    }

    pub fn number_kind(&self) -> Option<NumberKind> {
        match self.kind {
            TokenKind::Number => NumberKind::from_code(self.code),
            _ => None,
        }
    }

    pub fn quote(&self) -> Option<QuoteKind> {
        match self.kind {
            TokenKind::QuotedString => char::from_u32(self.code).and_then(QuoteKind::from_char),
            _ => None,
        }
    }

    pub fn comment_style(&self) -> Option<CommentStyle> {
        match (self.kind, self.code) {
            (TokenKind::Comment, 0) => Some(CommentStyle::Block),
            (TokenKind::Comment, 1) => Some(CommentStyle::Line),
            _ => None,
        }
    }

    /// Short human description used in "expected X, got Y" diagnostics.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::EndOfFile => "end of file".to_string(),
            TokenKind::EndOfLine => "end of line".to_string(),
            TokenKind::Symbol | TokenKind::Keyword => format!("'{}'", self.text),
            TokenKind::QuotedString => format!("string \"{}\"", self.text),
            kind => format!("{} '{}'", kind, self.text),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.describe(), self.location)
    }
}
