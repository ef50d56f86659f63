use std::sync::Arc;

use scribble_source::{Lexer, LexerOptions, MemoryResolver, TokenKind};

fn words(lexer: &mut Lexer) -> Vec<String> {
    let mut out = Vec::new();
    loop {
        let token = lexer.lex();
        if token.is_eof() {
            return out;
        }
        if token.kind == TokenKind::Identifier {
            out.push(token.text);
        }
    }
}

#[test]
fn test_nested_includes_resume_depth_first() {
    let resolver = MemoryResolver::new()
        .with("one", "one_a $include \"two\" one_b")
        .with("two", "two_a $include \"three\" two_b")
        .with("three", "three_a three_b");
    let mut lexer = Lexer::scribble("main", "main_a $include \"one\" main_b").with_resolver(Arc::new(resolver));

    assert_eq!(
        words(&mut lexer),
        vec!["main_a", "one_a", "two_a", "three_a", "three_b", "two_b", "one_b", "main_b"]
    );
    assert!(lexer.errors().is_empty());
}

#[test]
fn test_token_count_is_sum_over_frames() {
    let sources = [("a", "x + y;"), ("b", "f(1, 2);"), ("c", "return;")];
    let per_frame: usize = sources
        .iter()
        .map(|(name, text)| Lexer::scribble(name, text).tokenize().0.len() - 1)
        .sum();

    let resolver = sources
        .iter()
        .fold(MemoryResolver::new(), |r, (name, text)| r.with(*name, *text));
    let root = "$include \"a\"\n$include \"b\"\n$include \"c\"\n";
    let (tokens, errors) = Lexer::scribble("root", root)
        .with_resolver(Arc::new(resolver))
        .tokenize();

    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(tokens.len() - 1, per_frame);
}

#[test]
fn test_include_depth_limit() {
    let resolver = MemoryResolver::new()
        .with("a", "$include \"b\" a")
        .with("b", "$include \"c\" b")
        .with("c", "c");
    let options = LexerOptions {
        max_include_depth: 2,
        ..LexerOptions::default()
    };
    let mut lexer = Lexer::scribble("main", "$include \"a\"")
        .with_resolver(Arc::new(resolver))
        .with_options(options);

    assert_eq!(words(&mut lexer), vec!["b", "a"]);
    assert_eq!(lexer.errors().len(), 1);
}

#[test]
fn test_includes_from_disk() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lib.scribble"), "from_lib").unwrap();
    let main = dir.path().join("main.scribble");
    std::fs::write(&main, "$include \"lib.scribble\" from_main").unwrap();

    let text = std::fs::read_to_string(&main).unwrap();
    let resolver = scribble_source::FileResolver::new(Vec::new());
    let mut lexer = Lexer::scribble(&main.to_string_lossy(), &text).with_resolver(Arc::new(resolver));

    assert_eq!(words(&mut lexer), vec!["from_lib", "from_main"]);
}
