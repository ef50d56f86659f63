//! The lexer.
//!
//! One token is produced per call from the frame on top of the
//! [`SourceStack`]. When the profile's preprocessor trigger is followed by a
//! known directive name, the profile's directive handler takes over the raw
//! source until it reports [`DirectiveStep::Done`]. An include requested by
//! the handler takes effect once the directive is done. Running off the end of
//! an included frame pops it and lexing resumes in the parent where it was
//! suspended; only the root frame ever produces `EndOfFile`.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{LexError, LexResult};
use crate::location::TokenLocation;
use crate::profile::{DirectiveState, DirectiveStep, LanguageProfile, ScribbleLanguage};
use crate::resolver::SourceResolver;
use crate::stack::{SourceFrame, SourceStack};
use crate::token::{CommentStyle, NumberKind, Token, TokenKind};

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 64;

/// Which trivia the lexer hands out, and how deep includes may nest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexerOptions {
    pub whitespace_significant: bool,
    pub include_comments: bool,
    pub include_directives: bool,
    pub max_include_depth: usize,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            whitespace_significant: false,
            include_comments: false,
            include_directives: false,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveDirective {
    index: usize,
    state: DirectiveState,
}

pub struct Lexer {
    profile: Arc<dyn LanguageProfile>,
    resolver: Option<Arc<dyn SourceResolver>>,
    options: LexerOptions,
    stack: SourceStack,
    lookahead: VecDeque<Token>,
    directive: Option<ActiveDirective>,
    pending_include: Option<(String, TokenLocation)>,
    errors: Vec<LexError>,
}

/// A scanned lexeme before it is stamped with a location.
struct Lexeme {
    kind: TokenKind,
    code: u32,
    text: String,
    len: usize,
    terminated: bool,
    directive: Option<usize>,
}

impl Lexeme {
    fn new(kind: TokenKind, code: u32, text: impl Into<String>, len: usize) -> Self {
        Self {
            kind,
            code,
            text: text.into(),
            len,
            terminated: true,
            directive: None,
        }
    }
}

impl Lexer {
    pub fn new(profile: Arc<dyn LanguageProfile>, name: &str, text: &str) -> Self {
        Self {
            profile,
            resolver: None,
            options: LexerOptions::default(),
            stack: SourceStack::new(SourceFrame::new(name, text)),
            lookahead: VecDeque::new(),
            directive: None,
            pending_include: None,
            errors: Vec::new(),
        }
    }

    /// A lexer for Scribble source.
    pub fn scribble(name: &str, text: &str) -> Self {
        Self::new(Arc::new(ScribbleLanguage), name, text)
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn SourceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_options(mut self, options: LexerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn profile(&self) -> &dyn LanguageProfile {
        &*self.profile
    }

    pub fn resolver(&self) -> Option<&Arc<dyn SourceResolver>> {
        self.resolver.as_ref()
    }

    /// Switch to `text` immediately. Lookahead already buffered is kept and
    /// is handed out before the new source's tokens.
    pub fn push_source(&mut self, name: &str, text: &str) {
        self.stack.push(SourceFrame::new(name, text));
    }

    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    /// Name of the root source, even while an include is being lexed.
    pub fn source_name(&self) -> &str {
        self.stack.root().map_or("", |frame| &*frame.name)
    }

    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<LexError> {
        std::mem::take(&mut self.errors)
    }

    pub fn peek(&mut self) -> &Token {
        self.peek_nth(0)
    }

    /// Look `n` tokens past the next one without consuming anything.
    pub fn peek_nth(&mut self, n: usize) -> &Token {
        while self.lookahead.len() <= n {
            let token = self.next_significant();
            self.lookahead.push_back(token);
        }
        &self.lookahead[n]
    }

    pub fn location(&mut self) -> TokenLocation {
        self.peek().location.clone()
    }

    pub fn lex(&mut self) -> Token {
        match self.lookahead.pop_front() {
            Some(token) => token,
            None => self.next_significant(),
        }
    }

    /// Consume the next token if it has `kind` and `code`.
    pub fn expect(&mut self, kind: TokenKind, code: u32) -> LexResult<Token> {
        if self.peek().matches(kind, code) {
            return Ok(self.lex());
        }
        let expected = self.describe_expected(kind, code);
        Err(self.unexpected(expected))
    }

    /// Consume the next token if it has `kind`, whatever its code.
    pub fn expect_kind(&mut self, kind: TokenKind) -> LexResult<Token> {
        if self.peek().kind == kind {
            return Ok(self.lex());
        }
        Err(self.unexpected(kind.to_string()))
    }

    pub fn expect_symbol(&mut self, c: char) -> LexResult<Token> {
        self.expect(TokenKind::Symbol, c as u32)
    }

    pub fn expect_keyword(&mut self, code: u32) -> LexResult<Token> {
        self.expect(TokenKind::Keyword, code)
    }

    pub fn expect_identifier(&mut self) -> LexResult<Token> {
        self.expect_kind(TokenKind::Identifier)
    }

    pub fn accept(&mut self, kind: TokenKind, code: u32) -> Option<Token> {
        if self.peek().matches(kind, code) {
            Some(self.lex())
        } else {
            None
        }
    }

    pub fn accept_symbol(&mut self, c: char) -> bool {
        self.accept(TokenKind::Symbol, c as u32).is_some()
    }

    pub fn accept_keyword(&mut self, code: u32) -> bool {
        self.accept(TokenKind::Keyword, code).is_some()
    }

    /// Drain every remaining token, including the final `EndOfFile`.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        loop {
            let token = self.lex();
            let done = token.is_eof();
            tokens.push(token);
            if done {
                break;
            }
        }
        (tokens, self.errors)
    }

    fn describe_expected(&self, kind: TokenKind, code: u32) -> String {
        match kind {
            TokenKind::Symbol => match char::from_u32(code) {
                Some(c) => format!("'{}'", c),
                None => kind.to_string(),
            },
            TokenKind::Keyword => match self.profile.keywords().get(code as usize) {
                Some(k) => format!("'{}'", k),
                None => kind.to_string(),
            },
            _ => kind.to_string(),
        }
    }

    fn unexpected(&mut self, expected: String) -> LexError {
        let found = self.peek();
        LexError::Unexpected {
            expected,
            found: found.describe(),
            location: found.location.clone(),
            span: found.location.span(found.len.max(1)),
        }
    }

    fn next_significant(&mut self) -> Token {
        loop {
            let token = self.next_raw();
            let keep = match token.kind {
                TokenKind::Whitespace | TokenKind::EndOfLine => self.options.whitespace_significant,
                TokenKind::Comment => self.options.include_comments,
                TokenKind::Directive | TokenKind::DirectiveArg => self.options.include_directives,
                _ => true,
            };
            if keep {
                return token;
            }
        }
    }

    fn next_raw(&mut self) -> Token {
        loop {
            while self.directive.is_some() {
                if let Some(token) = self.step_directive() {
                    return token;
                }
            }
            if let Some((name, location)) = self.pending_include.take() {
                self.enter_include(&name, location);
            }
            let exhausted = match self.stack.current() {
                Some(frame) => frame.is_exhausted(),
                None => return Token::end_of_file(TokenLocation::default()),
            };
            if !exhausted {
                return self.scan();
            }
            if self.stack.depth() == 1 {
                let location = self.stack.current().map(|f| f.location()).unwrap_or_default();
                return Token::end_of_file(location);
            }
            self.stack.pop();
        }
    }

    fn consume(&mut self, len: usize) -> String {
        match self.stack.current_mut() {
            Some(frame) => {
                let start = frame.offset();
                frame.advance(len);
                frame.text()[start..frame.offset()].to_string()
            }
            None => String::new(),
        }
    }

    /// Run the active directive handler one step. Returns `None` when the
    /// step produced no token; the directive stays active unless it is done.
    fn step_directive(&mut self) -> Option<Token> {
        let mut active = self.directive.take()?;
        let profile = Arc::clone(&self.profile);
        let (step, location) = {
            let frame = self.stack.current()?;
            (profile.handle_directive(active.index, &mut active.state, frame.rest()), frame.location())
        };
        match step {
            DirectiveStep::Done | DirectiveStep::Yield { len: 0, .. } => None,
            DirectiveStep::Yield { kind, len } => {
                self.directive = Some(active);
                let text = self.consume(len);
                Some(Token::new(kind, 0, text, location, len))
            }
            DirectiveStep::Include { len, name } => {
                self.directive = Some(active);
                self.consume(len);
                self.pending_include = Some((name.clone(), location.clone()));
                Some(Token::new(TokenKind::DirectiveArg, active.index as u32, name, location, len))
            }
            DirectiveStep::Error { len, message } => {
                self.directive = Some(active);
                self.consume(len);
                self.errors.push(LexError::Directive {
                    message,
                    span: location.span(len.max(1)),
                    location,
                });
                if len == 0 {
                    self.directive = None;
                }
                None
            }
        }
    }

    fn enter_include(&mut self, name: &str, location: TokenLocation) {
        let including = match self.stack.current() {
            Some(frame) => frame.name.to_string(),
            None => return,
        };
        let nested = self.stack.depth() - 1;
        if nested >= self.options.max_include_depth {
            self.errors.push(LexError::IncludeTooDeep {
                name: name.to_string(),
                depth: self.options.max_include_depth,
                location,
            });
            return;
        }
        let resolved = self.resolver.as_ref().and_then(|r| r.resolve(name, &including));
        match resolved {
            None => self.errors.push(LexError::IncludeNotFound {
                name: name.to_string(),
                location,
            }),
            Some(source) if self.stack.contains(&source.name) => {
                log::debug!(target: "parse", "include cycle through {}", source.name);
                self.errors.push(LexError::IncludeCycle {
                    name: name.to_string(),
                    location,
                })
            }
            Some(source) => self.stack.push(SourceFrame::new(source.name, source.text)),
        }
    }

    fn scan(&mut self) -> Token {
        let profile = Arc::clone(&self.profile);
        let (location, lexeme) = match self.stack.current() {
            Some(frame) => (frame.location(), scan_lexeme(&*profile, frame.rest())),
            None => return Token::end_of_file(TokenLocation::default()),
        };
        if let Some(index) = lexeme.directive {
            self.directive = Some(ActiveDirective {
                index,
                state: DirectiveState::default(),
            });
        }
        if lexeme.kind == TokenKind::Unknown {
            self.errors.push(LexError::InvalidToken {
                text: lexeme.text.clone(),
                span: location.span(lexeme.len.max(1)),
                location: location.clone(),
            });
        }
        self.consume(lexeme.len);
        let mut token = Token::new(lexeme.kind, lexeme.code, lexeme.text, location, lexeme.len);
        token.terminated = lexeme.terminated;
        token
    }
}

fn scan_lexeme(profile: &dyn LanguageProfile, rest: &str) -> Lexeme {
    let c = match rest.chars().next() {
        Some(c) => c,
        None => return Lexeme::new(TokenKind::EndOfFile, 0, "", 0),
    };
    match c {
        '\n' => Lexeme::new(TokenKind::EndOfLine, 0, "\n", 1),
        '\r' if rest[1..].starts_with('\n') => Lexeme::new(TokenKind::EndOfLine, 0, "\n", 2),
        c if c.is_whitespace() => {
            let len = rest
                .find(|c: char| !c.is_whitespace() || c == '\n' || c == '\r')
                .unwrap_or(rest.len())
                .max(c.len_utf8());
            Lexeme::new(TokenKind::Whitespace, 0, &rest[..len], len)
        }
        '/' if rest.starts_with("//") => {
            let len = rest.find('\n').unwrap_or(rest.len());
            Lexeme::new(TokenKind::Comment, CommentStyle::Line as u32, &rest[2..len], len)
        }
        '/' if rest.starts_with("/*") => match rest[2..].find("*/") {
            Some(end) => Lexeme::new(TokenKind::Comment, CommentStyle::Block as u32, &rest[2..2 + end], end + 4),
            None => {
                let mut lexeme = Lexeme::new(TokenKind::Comment, CommentStyle::Block as u32, &rest[2..], rest.len());
                lexeme.terminated = false;
                lexeme
            }
        },
        c if Some(c) == profile.preprocessor_trigger() => scan_directive(profile, rest, c),
        c if c.is_ascii_digit() => scan_number(rest),
        '\'' | '"' | '`' => scan_string(rest, c),
        c if c.is_alphabetic() || c == '_' => {
            let len = rest
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let word = &rest[..len];
            match profile.keyword_code(word) {
                Some(code) => Lexeme::new(TokenKind::Keyword, code, word, len),
                None => Lexeme::new(TokenKind::Identifier, 0, word, len),
            }
        }
        c => scan_operator(profile, rest, c),
    }
}

fn scan_directive(profile: &dyn LanguageProfile, rest: &str, trigger: char) -> Lexeme {
    let after = &rest[trigger.len_utf8()..];
    let len = after
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(after.len());
    let name = &after[..len];
    match profile.directives().iter().position(|d| *d == name) {
        Some(index) if !name.is_empty() => {
            let mut lexeme = Lexeme::new(TokenKind::Directive, index as u32, name, trigger.len_utf8() + len);
            lexeme.directive = Some(index);
            lexeme
        }
        _ => scan_operator(profile, rest, trigger),
    }
}

fn scan_number(rest: &str) -> Lexeme {
    let radix_digits = |prefix_len: usize, accept: fn(&char) -> bool| {
        rest[prefix_len..]
            .chars()
            .take_while(accept)
            .map(char::len_utf8)
            .sum::<usize>()
    };
    let prefix = rest.get(..2).map(str::to_ascii_lowercase);
    let radix = match prefix.as_deref() {
        Some("0x") => Some((NumberKind::Hex, radix_digits(2, char::is_ascii_hexdigit))),
        Some("0b") => Some((NumberKind::Binary, radix_digits(2, |c| *c == '0' || *c == '1'))),
        _ => None,
    };
    if let Some((kind, digits)) = radix {
        if digits == 0 {
            return Lexeme::new(TokenKind::Unknown, 0, &rest[..2], 2);
        }
        return Lexeme::new(TokenKind::Number, kind as u32, &rest[2..2 + digits], 2 + digits);
    }
    let int_len = radix_digits(0, char::is_ascii_digit);
    let after = &rest[int_len..];
    let mut fraction = after.chars();
    if fraction.next() == Some('.') && fraction.next().map_or(false, |c| c.is_ascii_digit()) {
        let frac_len = after[1..]
            .chars()
            .take_while(char::is_ascii_digit)
            .count();
        let len = int_len + 1 + frac_len;
        return Lexeme::new(TokenKind::Number, NumberKind::Decimal as u32, &rest[..len], len);
    }
    Lexeme::new(TokenKind::Number, NumberKind::Integer as u32, &rest[..int_len], int_len)
}

fn scan_string(rest: &str, quote: char) -> Lexeme {
    let mut text = String::new();
    let mut chars = rest.char_indices().skip(1);
    let mut len = rest.len();
    let mut terminated = false;
    while let Some((i, ch)) = chars.next() {
        if ch == quote {
            len = i + 1;
            terminated = true;
            break;
        }
        if ch != '\\' {
            text.push(ch);
            continue;
        }
        match chars.next() {
            Some((_, 'n')) => text.push('\n'),
            Some((_, 't')) => text.push('\t'),
            Some((_, 'r')) => text.push('\r'),
            Some((_, '0')) => text.push('\0'),
            Some((_, escaped)) => text.push(escaped),
            None => break,
        }
    }
    let mut lexeme = Lexeme::new(TokenKind::QuotedString, quote as u32, text, len);
    lexeme.terminated = terminated;
    lexeme
}

/// Longest operator-like keyword starting at `rest`, else a single symbol.
fn scan_operator(profile: &dyn LanguageProfile, rest: &str, c: char) -> Lexeme {
    let longest = profile
        .keywords()
        .iter()
        .enumerate()
        .filter(|(_, k)| k.chars().next().map_or(false, |f| !(f.is_alphanumeric() || f == '_')))
        .filter(|(_, k)| rest.starts_with(**k))
        .max_by_key(|(_, k)| k.len());
    match longest {
        Some((code, k)) => Lexeme::new(TokenKind::Keyword, code as u32, *k, k.len()),
        None => Lexeme::new(TokenKind::Symbol, c as u32, c.to_string(), c.len_utf8()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Keyword;
    use crate::resolver::MemoryResolver;
    use crate::token::QuoteKind;

    fn kinds(text: &str) -> Vec<(TokenKind, String)> {
        let (tokens, _) = Lexer::scribble("test", text).tokenize();
        tokens.into_iter().map(|t| (t.kind, t.text)).collect()
    }

    #[test]
    fn test_operators_use_longest_match() {
        let (tokens, errors) = Lexer::scribble("test", "a <<= b << c < d").tokenize();
        assert!(errors.is_empty());
        let codes: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Identifier)
            .map(|t| (t.kind, t.code))
            .collect();
        assert_eq!(
            codes,
            vec![
                (TokenKind::Keyword, Keyword::ShiftLeftAssign.code()),
                (TokenKind::Keyword, Keyword::ShiftLeft.code()),
                (TokenKind::Symbol, '<' as u32),
                (TokenKind::EndOfFile, 0),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let (tokens, errors) = Lexer::scribble("test", "42 3.25 0xFF 0b101 1..5").tokenize();
        assert!(errors.is_empty());
        let numbers: Vec<_> = tokens
            .iter()
            .filter_map(|t| t.number_kind().map(|k| (k, t.text.as_str())))
            .collect();
        assert_eq!(
            numbers,
            vec![
                (NumberKind::Integer, "42"),
                (NumberKind::Decimal, "3.25"),
                (NumberKind::Hex, "FF"),
                (NumberKind::Binary, "101"),
                (NumberKind::Integer, "1"),
                (NumberKind::Integer, "5"),
            ]
        );
        assert!(tokens.iter().any(|t| t.is_keyword(Keyword::Range.code())));
    }

    #[test]
    fn test_bad_hex_literal_is_reported() {
        let (tokens, errors) = Lexer::scribble("test", "0xg").tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
        assert!(matches!(errors[0], LexError::InvalidToken { .. }));
    }

    #[test]
    fn test_strings_and_escapes() {
        let (tokens, _) = Lexer::scribble("test", r#""a\n\"b" 'c"#).tokenize();
        assert_eq!(tokens[0].text, "a\n\"b");
        assert_eq!(tokens[0].quote(), Some(QuoteKind::Double));
        assert!(tokens[0].terminated);
        assert_eq!(tokens[1].text, "c");
        assert!(!tokens[1].terminated);
    }

    #[test]
    fn test_keywords_are_whole_words() {
        assert_eq!(
            kinds("if iffy"),
            vec![
                (TokenKind::Keyword, "if".to_string()),
                (TokenKind::Identifier, "iffy".to_string()),
                (TokenKind::EndOfFile, String::new()),
            ]
        );
    }

    #[test]
    fn test_trivia_flags() {
        let text = "a // note\n/* block */ b";
        assert_eq!(kinds(text).len(), 3);

        let options = LexerOptions {
            whitespace_significant: true,
            include_comments: true,
            ..LexerOptions::default()
        };
        let (tokens, _) = Lexer::scribble("test", text).with_options(options).tokenize();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Whitespace,
                TokenKind::Comment,
                TokenKind::EndOfLine,
                TokenKind::Comment,
                TokenKind::Whitespace,
                TokenKind::Identifier,
                TokenKind::EndOfFile,
            ]
        );
        assert_eq!(tokens[2].comment_style(), Some(CommentStyle::Line));
        assert_eq!(tokens[4].text, " block ");
    }

    #[test]
    fn test_locations_track_lines() {
        let (tokens, _) = Lexer::scribble("test", "a\n  b").tokenize();
        assert_eq!((tokens[1].location.line, tokens[1].location.column), (2, 3));
        assert_eq!(tokens[1].location.index, 4);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::scribble("test", "x = 1;");
        assert_eq!(lexer.peek_nth(1).text, "=");
        assert_eq!(lexer.peek().text, "x");
        assert_eq!(lexer.lex().text, "x");
        assert_eq!(lexer.lex().text, "=");
    }

    #[test]
    fn test_expect_reports_location_and_keeps_token() {
        let mut lexer = Lexer::scribble("test", "func\n  (");
        lexer.expect_keyword(Keyword::Func.code()).unwrap();
        let err = lexer.expect_identifier().unwrap_err();
        match &err {
            LexError::Unexpected { expected, found, location, .. } => {
                assert_eq!(expected, "identifier");
                assert_eq!(found, "'('");
                assert_eq!((location.line, location.column), (2, 3));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(lexer.expect_symbol('(').is_ok());
    }

    #[test]
    fn test_include_resumes_parent() {
        let resolver = MemoryResolver::new().with("inc", "b c");
        let mut lexer = Lexer::scribble("main", "a $include \"inc\" d").with_resolver(Arc::new(resolver));
        let words: Vec<_> = std::iter::from_fn(|| {
            let t = lexer.lex();
            (!t.is_eof()).then_some(t.text)
        })
        .collect();
        assert_eq!(words, vec!["a", "b", "c", "d"]);
        assert!(lexer.errors().is_empty());
    }

    #[test]
    fn test_source_name_is_the_root_inside_an_include() {
        let resolver = MemoryResolver::new().with("inc", "b c");
        let mut lexer = Lexer::scribble("main", "a $include \"inc\" d").with_resolver(Arc::new(resolver));
        assert_eq!(lexer.lex().text, "a");
        assert_eq!(lexer.lex().text, "b");
        assert_eq!(lexer.depth(), 2);
        assert_eq!(lexer.source_name(), "main");
    }

    #[test]
    fn test_directive_tokens_when_requested() {
        let resolver = MemoryResolver::new().with("inc", "");
        let options = LexerOptions {
            include_directives: true,
            ..LexerOptions::default()
        };
        let (tokens, _) = Lexer::scribble("main", "$include <inc>")
            .with_resolver(Arc::new(resolver))
            .with_options(options)
            .tokenize();
        assert_eq!(tokens[0].kind, TokenKind::Directive);
        assert_eq!(tokens[0].text, "include");
        assert_eq!(tokens[1].kind, TokenKind::DirectiveArg);
        assert_eq!(tokens[1].text, "inc");
    }

    #[test]
    fn test_include_cycle_is_rejected() {
        let resolver = MemoryResolver::new().with("self", "x $include \"self\" y");
        let (tokens, errors) = Lexer::scribble("main", "$include \"self\"")
            .with_resolver(Arc::new(resolver))
            .tokenize();
        let words: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["x", "y", ""]);
        assert!(matches!(errors.as_slice(), [LexError::IncludeCycle { name, .. }] if name == "self"));
    }

    #[test]
    fn test_missing_include() {
        let (_, errors) = Lexer::scribble("main", "$include \"nowhere\"").tokenize();
        assert!(matches!(errors.as_slice(), [LexError::IncludeNotFound { .. }]));
    }

    #[test]
    fn test_unknown_directive_is_a_symbol() {
        let (tokens, errors) = Lexer::scribble("main", "$define").tokenize();
        assert!(errors.is_empty());
        assert!(tokens[0].is_symbol('$'));
        assert_eq!(tokens[1].text, "define");
    }
}
