//! Language profiles.
//!
//! A profile tells the lexer which words and operators are keywords, which
//! directives exist and which character introduces them. Directives are
//! processed by the profile itself through [`LanguageProfile::handle_directive`],
//! which is driven one step at a time by the lexer until it reports
//! [`DirectiveStep::Done`].

use crate::token::TokenKind;

/// What a directive handler wants the lexer to do with the next piece of raw
/// source following a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveStep {
    /// Emit a token of `kind` covering the next `len` bytes and call the
    /// handler again.
    Yield { kind: TokenKind, len: usize },
    /// Emit a directive argument covering `len` bytes, then push the source
    /// called `name` on the source stack.
    Include { len: usize, name: String },
    /// Consume `len` bytes and report `message` as a lexical error.
    Error { len: usize, message: String },
    /// The directive is complete; resume normal lexing.
    Done,
}

/// Per-directive scratch state, reset each time a directive starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectiveState(pub u32);

pub trait LanguageProfile: Send + Sync {
    fn name(&self) -> &str;

    /// Keyword spellings. The index of a keyword is its token code.
    fn keywords(&self) -> &[&'static str];

    fn directives(&self) -> &[&'static str] {
        &[]
    }

    fn preprocessor_trigger(&self) -> Option<char> {
        None
    }

    /// Advance the directive with index `directive` given the raw source
    /// `rest` that follows the current position.
    fn handle_directive(&self, directive: usize, state: &mut DirectiveState, rest: &str) -> DirectiveStep {
        let _ = (directive, state, rest);
        DirectiveStep::Done
    }

    fn keyword_code(&self, text: &str) -> Option<u32> {
        self.keywords().iter().position(|k| *k == text).map(|i| i as u32)
    }
}

macro_rules! keywords {
    ($($variant:ident => $text:literal),* $(,)?) => {
        /// Scribble keywords, including the multi-character operators.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum Keyword {
            $($variant),*
        }

        pub const SCRIBBLE_KEYWORDS: &[&str] = &[$($text),*];

        impl Keyword {
            const ALL: &'static [Keyword] = &[$(Keyword::$variant),*];

            pub fn from_code(code: u32) -> Option<Keyword> {
                Self::ALL.get(code as usize).copied()
            }

            pub fn code(self) -> u32 {
                self as u32
            }

            pub fn text(self) -> &'static str {
                SCRIBBLE_KEYWORDS[self as usize]
            }
        }
    };
}

keywords! {
    As => "as",
    Break => "break",
    Const => "const",
    Continue => "continue",
    Elif => "elif",
    Else => "else",
    Enum => "enum",
    Error => "error",
    For => "for",
    Func => "func",
    If => "if",
    Import => "import",
    In => "in",
    Loop => "loop",
    Match => "match",
    Return => "return",
    Struct => "struct",
    Var => "var",
    Variant => "variant",
    While => "while",
    True => "true",
    False => "false",
    BinAndAssign => "&=",
    BinOrAssign => "|=",
    BinXorAssign => "^=",
    ShiftLeftAssign => "<<=",
    ShiftRightAssign => ">>=",
    MinusAssign => "-=",
    PlusAssign => "+=",
    MultAssign => "*=",
    DivAssign => "/=",
    ModAssign => "%=",
    ShiftLeft => "<<",
    ShiftRight => ">>",
    Equals => "==",
    GreaterEqual => ">=",
    LessEqual => "<=",
    LogicalAnd => "&&",
    LogicalOr => "||",
    NotEqual => "!=",
    Range => "..",
    Arrow => "->",
    WideArrow => "=>",
    Decrement => "--",
    Increment => "++",
}

const INCLUDE: usize = 0;

const INCLUDE_INIT: u32 = 0;
const INCLUDE_PATH: u32 = 1;
const INCLUDE_DONE: u32 = 2;

/// The Scribble language itself: `$include "file"` is its only directive.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScribbleLanguage;

impl LanguageProfile for ScribbleLanguage {
    fn name(&self) -> &str {
        "scribble"
    }

    fn keywords(&self) -> &[&'static str] {
        SCRIBBLE_KEYWORDS
    }

    fn directives(&self) -> &[&'static str] {
        &["include"]
    }

    fn preprocessor_trigger(&self) -> Option<char> {
        Some('$')
    }

    fn handle_directive(&self, directive: usize, state: &mut DirectiveState, rest: &str) -> DirectiveStep {
        if directive != INCLUDE {
            return DirectiveStep::Done;
        }
        match state.0 {
            INCLUDE_INIT => {
                state.0 = INCLUDE_PATH;
                let ws = rest
                    .char_indices()
                    .find(|(_, c)| !(c.is_whitespace() && *c != '\n'))
                    .map(|(i, _)| i)
                    .unwrap_or(rest.len());
                if ws > 0 {
                    return DirectiveStep::Yield { kind: TokenKind::Whitespace, len: ws };
                }
                self.handle_directive(directive, state, rest)
            }
            INCLUDE_PATH => {
                state.0 = INCLUDE_DONE;
                let close = match rest.chars().next() {
                    Some('"') => '"',
                    Some('<') => '>',
                    _ => {
                        let len = rest.find('\n').unwrap_or(rest.len());
                        return DirectiveStep::Error {
                            len,
                            message: "expected a quoted file name after $include".to_string(),
                        };
                    }
                };
                match rest[1..].find(|c: char| c == close || c == '\n') {
                    Some(end) if rest[1..].as_bytes()[end] as char == close => DirectiveStep::Include {
                        len: end + 2,
                        name: rest[1..end + 1].to_string(),
                    },
                    found => DirectiveStep::Error {
                        len: found.map(|end| end + 1).unwrap_or(rest.len()),
                        message: "unterminated file name in $include".to_string(),
                    },
                }
            }
            _ => DirectiveStep::Done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_codes_line_up() {
        assert_eq!(Keyword::Func.text(), "func");
        assert_eq!(Keyword::from_code(Keyword::ShiftLeftAssign.code()), Some(Keyword::ShiftLeftAssign));
        assert_eq!(ScribbleLanguage.keyword_code("while"), Some(Keyword::While.code()));
        assert_eq!(ScribbleLanguage.keyword_code("whilst"), None);
    }

    #[test]
    fn test_include_handler_steps() {
        let lang = ScribbleLanguage;
        let mut state = DirectiveState::default();
        let rest = " \"lib.scribble\" rest";
        assert_eq!(
            lang.handle_directive(INCLUDE, &mut state, rest),
            DirectiveStep::Yield { kind: TokenKind::Whitespace, len: 1 }
        );
        assert_eq!(
            lang.handle_directive(INCLUDE, &mut state, &rest[1..]),
            DirectiveStep::Include { len: 14, name: "lib.scribble".to_string() }
        );
        assert_eq!(lang.handle_directive(INCLUDE, &mut state, " rest"), DirectiveStep::Done);
    }

    #[test]
    fn test_include_handler_rejects_unterminated_name() {
        let mut state = DirectiveState(INCLUDE_PATH);
        match ScribbleLanguage.handle_directive(INCLUDE, &mut state, "<lib\nnext") {
            DirectiveStep::Error { len, .. } => assert_eq!(len, 4),
            other => panic!("expected an error step, got {:?}", other),
        }
    }
}
