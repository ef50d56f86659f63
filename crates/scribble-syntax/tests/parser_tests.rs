use std::sync::Arc;

use expect_test::{expect, Expect};
use scribble_source::MemoryResolver;
use scribble_syntax::ast::*;
use scribble_syntax::{parse_expression, parse_target, parse_text, ParseError, ParseOptions, DEFAULT_MAX_NESTING};

fn check_expr(source: &str, expected: Expect) {
    let expr = parse_expression(source).unwrap_or_else(|e| panic!("failed to parse {:?}: {}", source, e));
    expected.assert_eq(&expr.to_string());
}

fn parse_ok(source: &str) -> Program {
    let (program, errors) = parse_text("test.scribble", source, &ParseOptions::default());
    if !errors.is_empty() {
        panic!("Expected successful parse, but got errors: {:?}", errors);
    }
    program
}

fn parse_errors(source: &str) -> (Program, Vec<ParseError>) {
    let (program, errors) = parse_text("test.scribble", source, &ParseOptions::default());
    if errors.is_empty() {
        panic!("Expected parsing errors, but none were found. Parsed: {:?}", program);
    }
    (program, errors)
}

fn function<'a>(program: &'a Program, name: &str) -> &'a Function {
    program
        .functions()
        .find(|f| f.name.name == name)
        .unwrap_or_else(|| panic!("no function {}", name))
}

fn body(f: &Function) -> &Block {
    match &f.body {
        FunctionBody::Block(block) => block,
        other => panic!("expected a block body, got {:?}", other),
    }
}

#[test]
fn test_precedence() {
    check_expr("1 + 2 * 3", expect![["(+ 1 (* 2 3))"]]);
    check_expr("(1 + 2) * 3", expect![["(* (+ 1 2) 3)"]]);
    check_expr("a - b - c", expect![["(- (- a b) c)"]]);
    check_expr("x << 2 + 1", expect![["(<< x (+ 2 1))"]]);
    check_expr("a < b && b < c || d", expect![["(|| (&& (< a b) (< b c)) d)"]]);
    check_expr("a == b != c", expect![["(!= (== a b) c)"]]);
}

#[test]
fn test_ternary_nests_to_the_right() {
    check_expr("a ? b : c ? d : e", expect![["(? a b (? c d e))"]]);
    check_expr("a || b ? 1 : 2", expect![["(? (|| a b) 1 2)"]]);
}

#[test]
fn test_unary_call_and_cast() {
    check_expr("-f(x) as i64", expect![["(as (- (call f x)) i64)"]]);
    check_expr("!done && ~mask == 0", expect![["(&& (! done) (== (~ mask) 0))"]]);
    check_expr("max(a, b + 1, g())", expect![["(call max a (+ b 1) (call g))"]]);
}

#[test]
fn test_literals() {
    check_expr("255 u8", expect![["255u8"]]);
    check_expr("0xff + 0b101", expect![["(+ 255 5)"]]);
    check_expr("1.5 * 2.0", expect![["(* 1.5 2.0)"]]);
    check_expr("\"hi\" + name", expect![[r#"(+ "hi" name)"#]]);
    check_expr("true != false", expect![["(!= true false)"]]);
}

#[test]
fn test_only_names_are_callable() {
    let err = parse_expression("(f)(1)").unwrap_err();
    assert!(matches!(err, ParseError::NotCallable { .. }), "{:?}", err);
    let err = parse_expression("(1 + 2)(3)").unwrap_err();
    assert!(matches!(err, ParseError::NotCallable { .. }), "{:?}", err);
    assert!(parse_expression("(f(1))").is_ok());
}

#[test]
fn test_deep_nesting_is_reported() {
    let depth = 100_000;
    let source = format!(
        "func main(): i32 {{ return {}1{}; }}\nfunc other() {{}}",
        "(".repeat(depth),
        ")".repeat(depth)
    );
    let (program, errors) = parse_errors(&source);
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(matches!(errors[0], ParseError::TooDeep { limit: DEFAULT_MAX_NESTING, .. }));
    function(&program, "other");

    let options = ParseOptions {
        max_nesting: 32,
        ..ParseOptions::default()
    };
    let source = format!("func main() {{ {}{} }}", "{".repeat(depth), "}".repeat(depth));
    let (_, errors) = parse_text("test.scribble", &source, &options);
    assert!(matches!(&errors[..], [ParseError::TooDeep { limit: 32, .. }]), "{:?}", errors);
}

#[test]
fn test_nesting_limit_is_configurable() {
    let options = ParseOptions {
        max_nesting: 8,
        ..ParseOptions::default()
    };
    let chain = format!("func main(): i32 {{ return 1{}; }}", " + 1".repeat(20));
    let (_, errors) = parse_text("test.scribble", &chain, &options);
    assert!(matches!(&errors[..], [ParseError::TooDeep { limit: 8, .. }]), "{:?}", errors);

    let (_, errors) = parse_text("test.scribble", "func main(): i32 { return (1 + 2) * 3; }", &options);
    assert!(errors.is_empty(), "{:?}", errors);
}

#[test]
fn test_function_forms() {
    let program = parse_ok(
        r#"
        func add(a: i32, b: i32): i32 { return a + b; }
        func puts(s: string): i32 -> "puts";
        func say(s: string) => "println";
        var counter: i64 = 0 i64;
        const limit = 10;
        "#,
    );

    let add = function(&program, "add");
    assert_eq!(add.params.len(), 2);
    assert_eq!(add.return_type.as_ref().map(|t| t.name.as_str()), Some("i32"));
    assert_eq!(body(add).stmts.len(), 1);

    assert!(matches!(&function(&program, "puts").body, FunctionBody::Native { symbol } if symbol == "puts"));
    assert!(matches!(&function(&program, "say").body, FunctionBody::Intrinsic { name } if name == "println"));

    let globals: Vec<_> = program
        .items()
        .filter_map(|item| match &item.kind {
            ItemKind::Variable(v) => Some((v.name.name.as_str(), v.is_const)),
            _ => None,
        })
        .collect();
    assert_eq!(globals, vec![("counter", false), ("limit", true)]);
}

#[test]
fn test_statements() {
    let program = parse_ok(
        r#"
        func main(): i32 {
            var total = 0;
            for i in 0..10 {
                if i % 2 == 0 { continue; } elif i > 7 { break; } else { total += i; }
            }
            while total > 100 { total = total - 1; }
            loop { total--; break; }
            if total > 1 { } else if total < 0 { }
            print("done");
            return total;
        }
        "#,
    );
    let stmts = &body(function(&program, "main")).stmts;
    assert_eq!(stmts.len(), 7);

    match &stmts[1].kind {
        StmtKind::For { var, body, .. } => {
            assert_eq!(var.name, "i");
            match &body.stmts[0].kind {
                StmtKind::If { branches, else_block } => {
                    assert_eq!(branches.len(), 2);
                    assert!(else_block.is_some());
                }
                other => panic!("expected if, got {:?}", other),
            }
        }
        other => panic!("expected for, got {:?}", other),
    }
    match &stmts[3].kind {
        StmtKind::Loop { body } => assert!(matches!(
            &body.stmts[0].kind,
            StmtKind::Assign { op: Some(scribble_types::BinaryOp::Sub), .. }
        )),
        other => panic!("expected loop, got {:?}", other),
    }
    match &stmts[4].kind {
        StmtKind::If { branches, else_block } => {
            assert_eq!(branches.len(), 2);
            assert!(else_block.is_none());
        }
        other => panic!("expected if, got {:?}", other),
    }
}

#[test]
fn test_two_bracket_errors_give_two_diagnostics() {
    let (program, errors) = parse_errors(
        r#"
        func main() {
            var a = (1 + 2;
            var b = foo(3];
            var c = 4;
        }
        func other() { return; }
        "#,
    );
    assert_eq!(errors.len(), 2, "{:#?}", errors);
    assert!(errors.iter().all(|e| matches!(e, ParseError::Expected { expected, .. } if expected == "')'")));
    assert_eq!(errors[0].location().unwrap().line, 3);
    assert_eq!(errors[1].location().unwrap().line, 4);

    let main = function(&program, "main");
    assert_eq!(body(main).stmts.len(), 1);
    assert!(program.functions().any(|f| f.name.name == "other"));
}

#[test]
fn test_top_level_recovery() {
    let (program, errors) = parse_errors("x = 1; func f( { } func g() {}");
    assert_eq!(errors.len(), 2, "{:#?}", errors);
    let names: Vec<_> = program.functions().map(|f| f.name.name.as_str()).collect();
    assert_eq!(names, vec!["g"]);
}

#[test]
fn test_lexical_errors_are_reported() {
    let (_, errors) = parse_errors("func main() { var s = \"open; }");
    assert!(errors.iter().any(|e| matches!(e, ParseError::Expected { .. })));
}

#[test]
fn test_imports_and_includes() {
    let resolver = MemoryResolver::new()
        .with("util.scribble", "import \"util\"; func helper(): i32 { return 1; }")
        .with("consts.scribble", "const answer = 42;");
    let options = ParseOptions {
        resolver: Some(Arc::new(resolver)),
        ..ParseOptions::default()
    };
    let source = "$include \"consts.scribble\"\nimport util;\nfunc main(): i32 { return helper(); }";
    let (program, errors) = parse_text("main.scribble", source, &options);

    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(program.modules.len(), 2);
    assert_eq!(program.modules[1].name, "util.scribble");
    assert!(program.items().any(|i| matches!(&i.kind, ItemKind::Variable(v) if v.name.name == "answer")));

    let mut ids: Vec<_> = program.items().map(|i| i.id).collect();
    let count = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), count);
}

#[test]
fn test_missing_import() {
    let (_, errors) = parse_errors("import nowhere;");
    assert!(matches!(&errors[0], ParseError::ImportNotFound { name, .. } if name == "nowhere"));
}

#[test]
fn test_parse_target_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.scribble"), "func a() {}").unwrap();
    std::fs::write(dir.path().join("b.scribble"), "import lib; func b() {}").unwrap();
    std::fs::write(dir.path().join("lib.scribble"), "func lib_fn() {}").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not source").unwrap();

    let (program, errors) = parse_target(dir.path(), &ParseOptions::default());
    assert!(errors.is_empty(), "{:?}", errors);
    // lib.scribble is both a target and an import of b; it is parsed once.
    let mut names: Vec<_> = program.functions().map(|f| f.name.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["a", "b", "lib_fn"]);
}
