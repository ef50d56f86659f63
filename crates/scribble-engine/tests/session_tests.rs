use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use expect_test::expect;
use scribble_bind::{BindError, Binder, BoundProgram, DefaultBinder};
use scribble_engine::*;
use scribble_syntax::Program;

use ExecutionMessageType::*;

/// Binder that counts how often it is asked to bind.
struct CountingBinder(Arc<AtomicUsize>);

impl Binder for CountingBinder {
    fn bind(&self, program: &Program) -> Result<BoundProgram, Vec<BindError>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        DefaultBinder.bind(program)
    }
}

fn session_with(config: EngineConfig, source: &str) -> (BackendConnection, Recorder) {
    let _ = env_logger::builder().is_test(true).try_init();
    let recorder = Recorder::new();
    let mut session = BackendConnection::new(Arc::new(config), Box::new(recorder.clone()));
    session.load_text("test.scribble", source).unwrap();
    (session, recorder)
}

fn session(source: &str) -> (BackendConnection, Recorder) {
    session_with(EngineConfig::default(), source)
}

fn stage_error(err: EngineError) -> StageError {
    match err {
        EngineError::Stage(err) => err,
        other => panic!("expected a stage error, got {:?}", other),
    }
}

#[test]
fn test_parse_failure_never_reaches_the_binder() {
    let calls = Arc::new(AtomicUsize::new(0));
    let (session, _) = session("func main( {\n}\nfunc other() { var = ; }");
    let mut session = session.with_binder(CountingBinder(Arc::clone(&calls)));

    let err = stage_error(session.compile().unwrap_err());
    assert_eq!(err.stage, Stage::Parse);
    assert!(!err.diagnostics.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.stage(), Stage::Parse);
    assert_eq!(session.failed_stage(), Some(Stage::Parse));

    assert_eq!(session.advance(), Err(EngineError::Halted { stage: Stage::Parse }));
    assert!(matches!(session.run(), Err(EngineError::Halted { stage: Stage::Parse })));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_bind_failure_stops_before_intermediate() {
    let config = EngineConfig {
        debug: true,
        ..EngineConfig::default()
    };
    let (mut session, recorder) = session_with(config, "func main(): i32 { return true; }");

    let err = stage_error(session.compile().unwrap_err());
    assert_eq!(err.stage, Stage::Bind);
    assert_eq!(err.diagnostics.len(), 1);
    assert!(err.diagnostics[0].code.starts_with("scribble::bind"), "{:?}", err.diagnostics);
    assert!(session.ir().is_none());

    assert_eq!(
        recorder.kinds(),
        vec![StageInit, StageStart, StageEnd, StageInit, StageStart, StageEnd]
    );
    let messages = recorder.messages();
    assert!(matches!(
        &messages[5].payload,
        MessagePayload::Stage { stage: Stage::Bind, diagnostics } if diagnostics.len() == 1
    ));
}

#[test]
fn test_missing_entry_point_fails_generate() {
    let (mut session, _) = session("func helper() {}");
    let err = stage_error(session.compile().unwrap_err());
    assert_eq!(err.stage, Stage::Generate);
    assert_eq!(err.diagnostics[0].code, "scribble::link::no_entry_point");
    assert!(session.ir().is_some());
}

#[test]
fn test_run_messages() {
    let (mut session, recorder) = session("func main(): i32 { return 7; }");
    assert_eq!(session.run(), Ok(RunOutcome::Exited(ExitStatus::Code(7))));
    assert_eq!(session.stage(), Stage::Interpret);
    assert_eq!(
        recorder.kinds(),
        vec![
            StageInit,
            StageStart,
            ProgramStart,
            FunctionEntry,
            OnInstruction,
            AfterInstruction,
            FunctionReturn,
            FunctionEntry,
            OnInstruction,
            AfterInstruction,
            OnInstruction,
            AfterInstruction,
            FunctionReturn,
            ProgramExit,
            StageEnd,
        ]
    );
}

#[test]
fn test_execute_and_interpret_agree() {
    let source = "var greeting = \"hello\";
func twice(n: i32): i32 { return n * 2; }
func main(): i32 {
    print(greeting);
    println(\" world\");
    var total = 0;
    for i in 0..4 { total += twice(i); }
    return total;
}";
    let mut runs = Vec::new();
    for execute in [false, true] {
        let config = EngineConfig {
            execute,
            ..EngineConfig::default()
        };
        let (mut session, recorder) = session_with(config, source);
        let outcome = session.run().unwrap();
        assert_eq!(outcome, RunOutcome::Exited(ExitStatus::Code(12)));
        assert_eq!(recorder.output(), "hello world\n");
        let expected_stage = if execute { Stage::Execute } else { Stage::Interpret };
        assert_eq!(session.stage(), expected_stage);
        runs.push(recorder.kinds());
    }
    assert_eq!(runs[0], runs[1]);
}

#[test]
fn test_calls_and_returns() {
    let (mut session, recorder) = session(
        "func inner() {}
func outer() { inner(); inner(); }
func main() { outer(); }",
    );
    assert_eq!(session.run(), Ok(RunOutcome::Exited(ExitStatus::Code(0))));
    let calls: Vec<String> = recorder
        .messages()
        .iter()
        .filter(|m| matches!(m.kind, FunctionEntry | FunctionReturn))
        .map(|m| m.to_string())
        .collect();
    expect![[r#"
        FunctionEntry $init depth 1
        FunctionReturn $init depth 1
        FunctionEntry main depth 1
        FunctionEntry outer depth 2
        FunctionEntry inner depth 3
        FunctionReturn inner depth 3
        FunctionEntry inner depth 3
        FunctionReturn inner depth 3
        FunctionReturn outer depth 2
        FunctionReturn main depth 1
    "#]]
    .assert_eq(&(calls.join("\n") + "\n"));
}

#[test]
fn test_runtime_error_ends_the_program() {
    let (mut session, recorder) = session("func main(): i32 {\n    var zero = 0;\n    return 1 / zero;\n}");
    let outcome = session.run().unwrap();
    let RunOutcome::Exited(ExitStatus::Error(diagnostic)) = outcome else {
        panic!("expected a runtime error, got {:?}", outcome);
    };
    assert!(diagnostic.message.contains("division by zero"), "{}", diagnostic.message);
    assert_eq!(diagnostic.location.map(|l| l.line), Some(3));
    assert!(matches!(
        session.machine().and_then(Machine::error),
        Some(RuntimeError::Operation { .. })
    ));
    assert_eq!(recorder.kinds().last(), Some(&StageEnd));
}

#[test]
fn test_runaway_recursion_overflows_the_stack() {
    let source = "func down(n: i64): i64 { return down(n + 1); }
func main(): i32 { return down(0) as i32; }";
    for execute in [false, true] {
        let config = EngineConfig {
            execute,
            max_call_depth: 64,
            ..EngineConfig::default()
        };
        let (mut session, recorder) = session_with(config, source);
        let outcome = session.run().unwrap();
        let RunOutcome::Exited(ExitStatus::Error(diagnostic)) = outcome else {
            panic!("expected a stack overflow, got {:?}", outcome);
        };
        assert_eq!(diagnostic.code, "scribble::runtime::stack_overflow");
        assert_eq!(diagnostic.location.map(|l| l.line), Some(1));
        assert!(matches!(
            session.machine().and_then(Machine::error),
            Some(RuntimeError::StackOverflow { function, depth: 64, .. }) if function == "down"
        ));
        assert_eq!(recorder.kinds().last(), Some(&StageEnd));
    }
}

#[test]
fn test_recursion_within_the_limit_runs() {
    let source = "func sum(n: i32): i32 { if n == 0 { return 0; } return n + sum(n - 1); }
func main(): i32 { return sum(20); }";
    let config = EngineConfig {
        max_call_depth: 64,
        ..EngineConfig::default()
    };
    let (mut session, _) = session_with(config, source);
    assert_eq!(session.run(), Ok(RunOutcome::Exited(ExitStatus::Code(210))));
}

#[test]
fn test_stop_flag_cancels_at_next_check_point() {
    let (mut session, recorder) = session("func main() { while true {} }");
    session.stop_flag().store(true, Ordering::SeqCst);
    assert_eq!(session.run(), Ok(RunOutcome::Exited(ExitStatus::Stopped)));
    assert!(!recorder.kinds().contains(&OnInstruction));
}

#[test]
fn test_requests_out_of_order() {
    let (mut session, _) = session("func main() {}");
    assert_eq!(session.resume(ExecutionMode::SingleStep), Err(EngineError::NotSuspended));
    session.run().unwrap();
    assert!(matches!(session.run(), Err(EngineError::WrongStage { .. })));
    assert!(matches!(session.load_text("x", "y"), Err(EngineError::WrongStage { .. })));
    assert_eq!(session.resume(ExecutionMode::Continue), Err(EngineError::NotSuspended));
}

#[cfg(unix)]
#[test]
fn test_native_functions_from_the_process_image() {
    let source = "func labs(x: i64): i64 -> \"labs\";
func main(): i32 { return labs(-5) as i32; }";
    for execute in [false, true] {
        let config = EngineConfig {
            execute,
            ..EngineConfig::default()
        };
        let (mut session, _) = session_with(config, source);
        assert_eq!(session.run(), Ok(RunOutcome::Exited(ExitStatus::Code(5))));
    }
}

#[test]
fn test_unknown_native_symbol() {
    let source = "func nowhere(): i64 -> \"scribble_no_such_symbol\";
func main(): i32 { return nowhere() as i32; }";

    let config = EngineConfig {
        execute: true,
        ..EngineConfig::default()
    };
    let (mut executed, _) = session_with(config, source);
    let err = stage_error(executed.compile().unwrap_err());
    assert_eq!(err.stage, Stage::Generate);
    assert_eq!(err.diagnostics[0].code, "scribble::link::native");

    let (mut interpreted, _) = session(source);
    let outcome = interpreted.run().unwrap();
    assert!(matches!(outcome, RunOutcome::Exited(ExitStatus::Error(d)) if d.code == "scribble::runtime::native"));
}
