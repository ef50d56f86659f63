use expect_test::{expect, Expect};
use scribble_bind::{Binder, BoundExpr, BoundExprKind, Binding, DefaultBinder};
use scribble_ir::*;
use scribble_source::TokenLocation;
use scribble_syntax::{parse_expression, parse_text, ParseOptions};
use scribble_types::{Datum, Type};

fn lower(source: &str) -> IRProgram {
    let (program, errors) = parse_text("test.scribble", source, &ParseOptions::default());
    assert!(errors.is_empty(), "parse errors: {:?}", errors);
    let bound = DefaultBinder
        .bind(&program)
        .unwrap_or_else(|errors| panic!("bind errors: {:?}", errors));
    let options = GenerateOptions {
        name: "test".to_string(),
        ..GenerateOptions::default()
    };
    generate(&bound, &options).unwrap_or_else(|errors| panic!("lowering errors: {:?}", errors))
}

fn check_listing(source: &str, expected: Expect) {
    expected.assert_eq(&lower(source).listing());
}

fn eval(source: &str) -> Result<Datum, LoweringError> {
    let expr = parse_expression(source).unwrap_or_else(|e| panic!("failed to parse {:?}: {}", source, e));
    let bound = DefaultBinder
        .bind_expression(&expr)
        .unwrap_or_else(|errors| panic!("bind errors: {:?}", errors));
    evaluate(&bound)
}

#[test]
fn test_listing() {
    check_listing(
        "var g: u8 = 200;
func add(a: i32, b: i32): i32 { return a + b; }
func main() {
    var x = add(1, 2);
    if x > 2 && g == 200 { println(x); }
}",
        expect![[r#"
            program test
            entry main
            global 0 g: u8

            func $init(): void
              0000  push.const u8 200
              0001  pop.global 0
              0002  ret

            func add(i32, i32): i32
              local 0 a: i32
              local 1 b: i32
              0000  push.local 0
              0001  push.local 1
              0002  binary +
              0003  ret value

            func main(): void
              local 0 x: i32
              0000  push.const i32 1
              0001  push.const i32 2
              0002  call add/2
              0003  pop.local 0
              0004  push.local 0
              0005  push.const i32 2
              0006  binary >
              0007  jump.false L2
              0008  push.global 0
              0009  push.const u8 200
              0010  binary ==
              0011  jump L3
              0012  L2:
              0013  push.const bool false
              0014  L3:
              0015  jump.false L1
              0016  push.local 0
              0017  cast string
              0018  call println/1
              0019  jump L0
              0020  L1:
              0021  L0:
              0022  ret

            intrinsic println(string): void => "println"
        "#]],
    );
}

#[test]
fn test_for_loop_listing() {
    check_listing(
        "func main() { for i in 0..3 u8 { if i == 1 u8 { continue; } } }",
        expect![[r#"
            program test
            entry main

            func $init(): void
              0000  ret

            func main(): void
              local 0 $limit: u8
              local 1 i: u8
              0000  push.const u8 0
              0001  pop.local 1
              0002  push.const u8 3
              0003  pop.local 0
              0004  L0:
              0005  push.local 1
              0006  push.local 0
              0007  binary <
              0008  jump.false L2
              0009  push.local 1
              0010  push.const u8 1
              0011  binary ==
              0012  jump.false L4
              0013  jump L1
              0014  jump L3
              0015  L4:
              0016  L3:
              0017  L1:
              0018  push.local 1
              0019  push.const u8 1
              0020  binary +
              0021  pop.local 1
              0022  jump L0
              0023  L2:
              0024  ret
        "#]],
    );
}

#[test]
fn test_native_calls_and_implicit_return() {
    let ir = lower("func abs(x: i32): i32 -> \"abs\"; func f(): i32 { abs(-3); }");
    assert!(ir.function("abs").map_or(false, IRFunction::is_native));

    let f = ir.function("f").unwrap();
    let ops: Vec<_> = f.instructions().iter().map(|i| i.op.clone()).collect();
    assert_eq!(
        ops,
        vec![
            Operation::PushConst(Datum::I32(-3)),
            Operation::NativeCall {
                function: "abs".to_string(),
                argc: 1
            },
            Operation::Pop,
            Operation::PushConst(Datum::I32(0)),
            Operation::Return { value: true },
        ]
    );
}

#[test]
fn test_instructions_keep_locations() {
    let ir = lower("func main() {\n    var a = 1;\n    a = a + 1;\n}");
    let lines: Vec<_> = ir
        .function("main")
        .unwrap()
        .instructions()
        .iter()
        .map(|i| i.location.line)
        .collect();
    assert_eq!(lines, vec![2, 2, 3, 3, 3, 3, 3]);
}

#[test]
fn test_missing_entry_point() {
    let ir = lower("func helper() {}");
    assert_eq!(ir.entry, None);
    assert_eq!(ir.functions.keys().collect::<Vec<_>>(), vec!["$init", "helper"]);
}

#[test]
fn test_intrinsic_with_wrong_signature_is_rejected() {
    let (program, _) = parse_text("test.scribble", "func say(n: i32) => \"print\";", &ParseOptions::default());
    let bound = DefaultBinder.bind(&program).unwrap();
    let errors = generate(&bound, &GenerateOptions::default()).unwrap_err();
    assert!(matches!(&errors[..], [LoweringError::Unsupported { .. }]), "{:?}", errors);
}

#[test]
fn test_evaluate() {
    assert_eq!(eval("1 + 2 * 3"), Ok(Datum::I32(7)));
    assert_eq!(eval("255 u8 + 1 u8"), Ok(Datum::U8(0)));
    assert_eq!(eval("2 > 1 ? 10 : 20"), Ok(Datum::I32(10)));
    assert_eq!(eval("3.75 as i32"), Ok(Datum::I32(3)));
    assert_eq!(eval("false && 1 / 0 == 0"), Ok(Datum::Bool(false)));
    assert_eq!(eval("\"a\" + \"b\""), Ok(Datum::string("ab")));
}

#[test]
fn test_evaluate_jumps_across_nested_conditionals() {
    assert_eq!(eval("1 > 2 ? 1 : (2 > 1 ? (true || false ? 3 : 4) : 5)"), Ok(Datum::I32(3)));
    assert_eq!(eval("false || (true && !false) ? 7 u8 : 8 u8"), Ok(Datum::U8(7)));
}

#[test]
fn test_evaluate_errors() {
    assert!(matches!(eval("1 / 0"), Err(LoweringError::Evaluation { .. })));

    let variable = BoundExpr {
        ty: Type::I32,
        location: TokenLocation::default(),
        kind: BoundExprKind::Variable(Binding::Local(0)),
    };
    assert!(matches!(evaluate(&variable), Err(LoweringError::NotConstant { .. })));
}
