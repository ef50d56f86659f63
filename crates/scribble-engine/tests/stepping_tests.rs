use std::sync::Arc;

use scribble_engine::*;

const NESTED: &str = "func h(): i32 {
    return 1;
}
func g(): i32 {
    return h() + 1;
}
func f(): i32 {
    var x = g();
    return x;
}
func main(): i32 {
    return f();
}";

fn debug_session(breakpoints: &[usize]) -> (BackendConnection, Recorder) {
    let _ = env_logger::builder().is_test(true).try_init();
    let recorder = Recorder::new();
    let mut session = BackendConnection::new(Arc::new(EngineConfig::default()), Box::new(recorder.clone()));
    session.load_text("nested.scribble", NESTED).unwrap();
    for &line in breakpoints {
        session.add_breakpoint(line);
    }
    let outcome = session.debug().unwrap();
    assert!(
        matches!(outcome, RunOutcome::Suspended { reason: SuspendReason::Start, .. }),
        "{:?}",
        outcome
    );
    (session, recorder)
}

fn suspended_at(outcome: RunOutcome) -> (SuspendReason, Position) {
    match outcome {
        RunOutcome::Suspended { reason, position } => (reason, position),
        other => panic!("expected a suspension, got {:?}", other),
    }
}

fn instruction_functions(messages: &[ExecutionMessage]) -> Vec<String> {
    messages
        .iter()
        .filter(|m| m.kind == ExecutionMessageType::OnInstruction)
        .filter_map(|m| match &m.payload {
            MessagePayload::Instruction { function, .. } => Some(function.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_start_suspends_before_the_first_instruction() {
    let (session, recorder) = debug_session(&[]);
    let position = session.machine().and_then(Machine::position).unwrap();
    assert_eq!(position.function, "$init");
    assert_eq!(position.index, 0);
    assert_eq!(position.depth, 1);

    let kinds = recorder.kinds();
    assert_eq!(kinds.last(), Some(&ExecutionMessageType::OnInstruction));
    assert!(!kinds.contains(&ExecutionMessageType::AfterInstruction));
}

#[test]
fn test_breakpoint_suspends_on_entering_the_line() {
    let (mut session, _) = debug_session(&[8]);
    let (reason, position) = suspended_at(session.resume(ExecutionMode::Continue).unwrap());
    assert_eq!(reason, SuspendReason::Breakpoint);
    assert_eq!(position.function, "f");
    assert_eq!(position.index, 0);
    assert_eq!(position.location.line, 8);
    assert_eq!(position.depth, 2);

    // The rest of line 8 does not hit the breakpoint again.
    let outcome = session.resume(ExecutionMode::Continue).unwrap();
    assert_eq!(outcome, RunOutcome::Exited(ExitStatus::Code(2)));
}

#[test]
fn test_step_over_runs_nested_calls_without_suspending() {
    let (mut session, recorder) = debug_session(&[8]);
    let (_, at_call) = suspended_at(session.resume(ExecutionMode::Continue).unwrap());
    assert_eq!(at_call.function, "f");
    recorder.take_messages();

    let (reason, position) = suspended_at(session.resume(ExecutionMode::StepOver).unwrap());
    assert_eq!(reason, SuspendReason::Step);
    assert_eq!(position.function, "f");
    assert_eq!(position.index, at_call.index + 1);
    assert_eq!(position.depth, at_call.depth);
    assert_eq!(session.machine().map(Machine::depth), Some(at_call.depth));

    // g and h ran to completion inside the one step.
    let messages = recorder.take_messages();
    let functions = instruction_functions(&messages);
    assert!(functions.iter().any(|f| f == "g"));
    assert!(functions.iter().any(|f| f == "h"));
    assert_eq!(functions.last().map(String::as_str), Some("f"));
    let deepest = messages
        .iter()
        .filter_map(|m| match m.payload {
            MessagePayload::Function { depth, .. } => Some(depth),
            _ => None,
        })
        .max();
    assert_eq!(deepest, Some(at_call.depth + 2));
}

#[test]
fn test_single_step_enters_calls() {
    let (mut session, _) = debug_session(&[8]);
    suspended_at(session.resume(ExecutionMode::Continue).unwrap());

    let (reason, position) = suspended_at(session.resume(ExecutionMode::SingleStep).unwrap());
    assert_eq!(reason, SuspendReason::Step);
    assert_eq!(position.function, "g");
    assert_eq!(position.index, 0);
    assert_eq!(position.depth, 3);

    let (_, next) = suspended_at(session.resume(ExecutionMode::SingleStep).unwrap());
    assert_eq!(next.function, "h");
    assert_eq!(next.depth, 4);
}

#[test]
fn test_run_to_return_stops_in_the_caller() {
    let (mut session, _) = debug_session(&[2]);
    let (_, in_h) = suspended_at(session.resume(ExecutionMode::Continue).unwrap());
    assert_eq!(in_h.function, "h");
    assert_eq!(in_h.depth, 4);

    let (reason, position) = suspended_at(session.resume(ExecutionMode::RunToReturn).unwrap());
    assert_eq!(reason, SuspendReason::Step);
    assert_eq!(position.function, "g");
    assert_eq!(position.depth, 3);
    assert_eq!(position.location.line, 5);

    let (_, in_f) = suspended_at(session.resume(ExecutionMode::RunToReturn).unwrap());
    assert_eq!(in_f.function, "f");
    assert_eq!(in_f.depth, 2);
}

#[test]
fn test_run_ignores_breakpoints() {
    let (mut session, recorder) = debug_session(&[2, 5, 8]);
    assert_eq!(
        session.resume(ExecutionMode::Run),
        Ok(RunOutcome::Exited(ExitStatus::Code(2)))
    );
    assert_eq!(
        recorder.kinds().last(),
        Some(&ExecutionMessageType::StageEnd)
    );
    assert_eq!(session.resume(ExecutionMode::Run), Err(EngineError::NotSuspended));
}
