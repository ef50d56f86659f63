use std::sync::Arc;

use scribble_engine::{EngineConfig, ExecutionMessageType, ExitStatus, Stage, SuspendReason};
use scribble_net::*;

const GREETER: &str = "func square(n: i32): i32 {
    return n * n;
}
func main(): i32 {
    println(\"hello\");
    var x = square(3);
    return x;
}";

fn backend(endpoint: Endpoint) -> BackendThread {
    let _ = env_logger::builder().is_test(true).try_init();
    spawn_backend_thread(endpoint, Arc::new(EngineConfig::default())).unwrap()
}

/// Frames seen while waiting for a response.
#[derive(Default)]
struct Seen {
    events: Vec<ExecutionMessageType>,
    output: String,
    warnings: Vec<String>,
}

fn request(client: &mut Client, command: Command) -> (Response, Seen) {
    let mut seen = Seen::default();
    let response = client
        .request(command, |frame| match frame {
            Frame::Event(message) => seen.events.push(message.kind),
            Frame::Output(text) => seen.output.push_str(text),
            Frame::Warning(diagnostic) => seen.warnings.push(diagnostic.code.clone()),
            _ => {}
        })
        .unwrap();
    (response, seen)
}

fn run_program(endpoint: &Endpoint) {
    let mut client = Client::connect(endpoint).unwrap();
    assert_eq!(client.version(), PROTOCOL_VERSION);

    let (response, seen) = request(
        &mut client,
        Command::new(CommandKind::Run)
            .with_arguments(["file=greeter.scribble"])
            .with_payload(GREETER),
    );
    assert_eq!(
        response,
        Response::Result(Reply::Exited {
            status: ExitStatus::Code(9)
        })
    );
    assert_eq!(seen.output, "hello\n");
    assert_eq!(seen.events.first(), Some(&ExecutionMessageType::StageInit));
    assert_eq!(seen.events.last(), Some(&ExecutionMessageType::StageEnd));
    assert!(seen.events.contains(&ExecutionMessageType::ProgramExit));
    client.close().unwrap();
}

#[cfg(unix)]
#[test]
fn test_run_over_unix_socket() {
    let dir = tempfile::tempdir().unwrap();
    let backend = backend(Endpoint::Unix(dir.path().join("backend.sock")));
    run_program(backend.endpoint());
}

#[test]
fn test_run_over_tcp() {
    let backend = backend(Endpoint::loopback());
    match backend.endpoint() {
        Endpoint::Tcp(addr) => assert!(!addr.ends_with(":0"), "{}", addr),
        other => panic!("expected a TCP endpoint, got {}", other),
    }
    run_program(backend.endpoint());
}

#[test]
fn test_debug_and_step() {
    let backend = backend(Endpoint::loopback());
    let mut client = backend.connect().unwrap();

    let (response, _) = request(&mut client, Command::new(CommandKind::Break).with_arguments(["line=6"]));
    assert_eq!(response, Response::Result(Reply::Breakpoint { line: 6 }));

    let (response, _) = request(&mut client, Command::new(CommandKind::Debug).with_payload(GREETER));
    match response {
        Response::Result(Reply::Suspended { reason, function, .. }) => {
            assert_eq!(reason, SuspendReason::Start);
            assert_eq!(function, "$init");
        }
        other => panic!("{:?}", other),
    }

    let (response, seen) = request(&mut client, Command::new(CommandKind::Continue));
    match response {
        Response::Result(Reply::Suspended {
            reason,
            function,
            location,
            ..
        }) => {
            assert_eq!(reason, SuspendReason::Breakpoint);
            assert_eq!(function, "main");
            assert_eq!(location.line, 6);
        }
        other => panic!("{:?}", other),
    }
    assert_eq!(seen.output, "hello\n");

    // Into square() and back out of it.
    let (response, _) = request(&mut client, Command::new(CommandKind::Step));
    assert!(matches!(response, Response::Result(Reply::Suspended { .. })), "{:?}", response);
    let mut entered_square = false;
    for _ in 0..4 {
        let (response, _) = request(&mut client, Command::new(CommandKind::Step));
        if let Response::Result(Reply::Suspended { function, depth, .. }) = response {
            if function == "square" {
                assert_eq!(depth, 2);
                entered_square = true;
                break;
            }
        }
    }
    assert!(entered_square);
    let (response, _) = request(&mut client, Command::new(CommandKind::RunToReturn));
    match response {
        Response::Result(Reply::Suspended { function, depth, .. }) => {
            assert_eq!(function, "main");
            assert_eq!(depth, 1);
        }
        other => panic!("{:?}", other),
    }

    let (response, _) = request(&mut client, Command::new(CommandKind::Stop));
    assert_eq!(
        response,
        Response::Result(Reply::Exited {
            status: ExitStatus::Stopped
        })
    );
    let (response, _) = request(&mut client, Command::new(CommandKind::Continue));
    assert!(response.is_error());
}

#[test]
fn test_stage_failure_is_reported() {
    let backend = backend(Endpoint::loopback());
    let mut client = backend.connect().unwrap();

    let (response, seen) = request(
        &mut client,
        Command::new(CommandKind::Compile)
            .with_arguments(["debug", "colour=blue"])
            .with_payload("func main() {\n    var a = (1 + 2;\n    var b = foo(3];\n    var c = 4;\n}\n"),
    );
    assert_eq!(seen.warnings, vec!["scribble::config::unknown_option".to_string()]);
    match response {
        Response::Error(failure) => {
            assert_eq!(failure.diagnostics.len(), 2, "{:?}", failure.diagnostics);
            assert!(failure.message.contains("parse"), "{}", failure.message);
        }
        other => panic!("{:?}", other),
    }
    // With `debug`, the failing stage is announced and closed.
    assert_eq!(
        seen.events,
        vec![
            ExecutionMessageType::StageInit,
            ExecutionMessageType::StageStart,
            ExecutionMessageType::StageEnd
        ]
    );

    let (response, _) = request(&mut client, Command::new(CommandKind::Compile).with_payload(GREETER));
    assert_eq!(
        response,
        Response::Result(Reply::Compiled {
            stage: Stage::Generate
        })
    );
}

#[test]
fn test_bad_requests_keep_the_session() {
    let backend = backend(Endpoint::loopback());
    let mut client = backend.connect().unwrap();

    let unknown = Command {
        command: "launch".to_string(),
        ..Command::default()
    };
    let (response, _) = request(&mut client, unknown);
    match response {
        Response::Error(failure) => assert_eq!(failure.diagnostics[0].code, "scribble::ipc::unknown_command"),
        other => panic!("{:?}", other),
    }

    let (response, _) = request(&mut client, Command::new(CommandKind::Break).with_arguments(["here"]));
    assert!(response.is_error());

    let (response, _) = request(&mut client, Command::new(CommandKind::Step));
    assert!(response.is_error());

    let (response, _) = request(&mut client, Command::new(CommandKind::Stop));
    assert_eq!(response, Response::Result(Reply::Ok));

    let (response, _) = request(&mut client, Command::new(CommandKind::Run).with_payload(GREETER));
    assert!(!response.is_error(), "{:?}", response);
}

#[test]
fn test_sessions_are_independent() {
    let backend = backend(Endpoint::loopback());
    let mut first = backend.connect().unwrap();
    let mut second = backend.connect().unwrap();

    let (response, _) = request(&mut first, Command::new(CommandKind::Run).with_payload("func main( {"));
    assert!(response.is_error());

    // A client vanishing mid-session does not disturb the others.
    let dropped = backend.connect().unwrap();
    drop(dropped);

    let (response, _) = request(&mut second, Command::new(CommandKind::Run).with_payload(GREETER));
    assert_eq!(
        response,
        Response::Result(Reply::Exited {
            status: ExitStatus::Code(9)
        })
    );

    let (response, _) = request(&mut first, Command::new(CommandKind::Run).with_payload(GREETER));
    assert!(!response.is_error(), "{:?}", response);
}
