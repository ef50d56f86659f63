use scribble_engine::{ExecutionMessage, ExecutionMessageType, ExitStatus, Stage};
use scribble_net::*;
use scribble_source::{Diagnostic, TokenLocation};

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn printable(&mut self, max_len: u64) -> String {
        let len = self.next() % (max_len + 1);
        (0..len).map(|_| (b' ' + (self.next() % 95) as u8) as char).collect()
    }
}

fn round_trip(command: &Command) -> Command {
    let line = encode(&Frame::Command(command.clone())).unwrap();
    assert_eq!(line.matches('\n').count(), 1, "{:?}", line);
    match decode(&line).unwrap() {
        Frame::Command(decoded) => decoded,
        other => panic!("decoded {:?}", other),
    }
}

#[test]
fn test_commands_survive_encoding() {
    let every_printable: String = (b' '..=b'~').map(char::from).collect();
    let command = Command::new(CommandKind::Run)
        .with_arguments([every_printable.clone(), "file=a b.scribble".to_string()])
        .with_payload(every_printable);
    assert_eq!(round_trip(&command), command);

    let mut rng = Lcg(0x5eed);
    for _ in 0..500 {
        let command = Command {
            command: rng.printable(12),
            arguments: (0..rng.next() % 4).map(|_| rng.printable(20)).collect(),
            payload: rng.printable(200),
        };
        let decoded = round_trip(&command);
        assert_eq!(decoded.command, command.command);
        assert_eq!(decoded.arguments, command.arguments);
        assert_eq!(decoded.payload, command.payload);
    }
}

#[test]
fn test_wire_shapes() {
    let command = Command::new(CommandKind::StepOver).with_arguments(["line=3"]);
    assert_eq!(
        encode(&Frame::Command(command)).unwrap(),
        "{\"command\":{\"command\":\"step-over\",\"arguments\":[\"line=3\"],\"payload\":\"\"}}\n"
    );

    let response = Response::Result(Reply::Exited {
        status: ExitStatus::Code(3),
    });
    assert_eq!(
        encode(&Frame::Response(response)).unwrap(),
        "{\"response\":{\"result\":{\"kind\":\"exited\",\"status\":{\"code\":3}}}}\n"
    );

    let event = ExecutionMessage::stage(ExecutionMessageType::StageStart, Stage::Parse);
    let line = encode(&Frame::Event(event.clone())).unwrap();
    assert!(line.contains("\"type\":\"STAGE_START\""), "{}", line);
    assert_eq!(decode(&line).unwrap(), Frame::Event(event));
}

#[test]
fn test_located_diagnostics_keep_their_file() {
    let diagnostic = Diagnostic::new(
        "scribble::parse::expected",
        "expected `;`",
        Some(TokenLocation::new("main.scribble", 12, 2, 5)),
    );
    let line = encode(&Frame::Warning(diagnostic.clone())).unwrap();
    assert!(line.contains("\"file\":\"main.scribble\""), "{}", line);
    assert_eq!(decode(&line).unwrap(), Frame::Warning(diagnostic));
}

#[test]
fn test_missing_fields_default() {
    let frame = decode("{\"command\":{\"command\":\"hello\"}}").unwrap();
    assert_eq!(frame, Frame::Command(Command::new(CommandKind::Hello)));
}

#[test]
fn test_command_names() {
    for name in [
        "hello",
        "compile",
        "run",
        "debug",
        "step",
        "step-over",
        "run-to-return",
        "continue",
        "break",
        "stop",
        "goodbye",
    ] {
        let kind = CommandKind::from_name(name).unwrap();
        assert_eq!(kind.name(), name);
    }
    let err = Command {
        command: "launch".to_string(),
        ..Command::default()
    }
    .kind()
    .unwrap_err();
    assert_eq!(
        err,
        ProtocolError::UnknownCommand {
            command: "launch".to_string()
        }
    );
}
