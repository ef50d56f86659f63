//! Messages exchanged between a frontend and a backend.

use std::fmt;

use serde::{Deserialize, Serialize};

use scribble_engine::{
    EngineError, ExecutionMessage, ExecutionMode, ExitStatus, Position, RunOutcome, Stage, StageError, SuspendReason,
};
use scribble_source::{Diagnostic, TokenLocation};

use crate::error::ProtocolError;

/// Protocol revision sent in the handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// A request from the frontend.
///
/// `arguments` carry `key[=value]` options; `payload` carries source text
/// for `compile`, `run` and `debug`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Command {
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub payload: String,
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            command: kind.name().to_string(),
            ..Self::default()
        }
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn kind(&self) -> Result<CommandKind, ProtocolError> {
        CommandKind::from_name(&self.command).ok_or_else(|| ProtocolError::UnknownCommand {
            command: self.command.clone(),
        })
    }
}

macro_rules! commands {
    ($($variant:ident => $name:literal),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandKind {
            $($variant),*
        }

        impl CommandKind {
            pub fn from_name(name: &str) -> Option<CommandKind> {
                match name {
                    $($name => Some(CommandKind::$variant),)*
                    _ => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(CommandKind::$variant => $name),*
                }
            }
        }
    };
}

commands! {
    Hello => "hello",
    Compile => "compile",
    Run => "run",
    Debug => "debug",
    Step => "step",
    StepOver => "step-over",
    RunToReturn => "run-to-return",
    Continue => "continue",
    Break => "break",
    Stop => "stop",
    Goodbye => "goodbye",
}

impl CommandKind {
    /// The execution mode a resuming command asks for.
    pub fn mode(self) -> Option<ExecutionMode> {
        match self {
            CommandKind::Step => Some(ExecutionMode::SingleStep),
            CommandKind::StepOver => Some(ExecutionMode::StepOver),
            CommandKind::RunToReturn => Some(ExecutionMode::RunToReturn),
            CommandKind::Continue => Some(ExecutionMode::Continue),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful command produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    Hello {
        version: u32,
    },
    /// The pipeline reached `stage` without errors.
    Compiled {
        stage: Stage,
    },
    Suspended {
        reason: SuspendReason,
        function: String,
        index: usize,
        location: TokenLocation,
        depth: usize,
    },
    Exited {
        status: ExitStatus,
    },
    Breakpoint {
        line: usize,
    },
    Ok,
    Goodbye,
}

impl From<RunOutcome> for Reply {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Suspended {
                reason,
                position:
                    Position {
                        function,
                        index,
                        location,
                        depth,
                    },
            } => Reply::Suspended {
                reason,
                function,
                index,
                location,
                depth,
            },
            RunOutcome::Exited(status) => Reply::Exited { status },
        }
    }
}

/// Why a command failed, with the diagnostics of the failing stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }
}

impl From<&ProtocolError> for Failure {
    fn from(err: &ProtocolError) -> Self {
        Failure {
            message: err.to_string(),
            diagnostics: vec![Diagnostic::from_error(err, None)],
        }
    }
}

impl From<EngineError> for Failure {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Stage(StageError { stage, diagnostics }) => Failure {
                message: format!("the {} stage failed", stage),
                diagnostics,
            },
            other => Failure {
                message: other.to_string(),
                diagnostics: vec![Diagnostic::from_error(&other, None)],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Result(Reply),
    Error(Failure),
}

impl Response {
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}

/// Everything that travels over a connection, one per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frame {
    Command(Command),
    Response(Response),
    Event(ExecutionMessage),
    /// Text the running program wrote.
    Output(String),
    /// A problem that did not stop the command, such as an unknown option.
    Warning(Diagnostic),
}

impl Frame {
    /// Short description for error messages and logs.
    pub fn describe(&self) -> String {
        match self {
            Frame::Command(command) => format!("command '{}'", command.command),
            Frame::Response(Response::Result(_)) => "a result".to_string(),
            Frame::Response(Response::Error(failure)) => format!("an error ({})", failure.message),
            Frame::Event(message) => format!("event {:?}", message.kind),
            Frame::Output(_) => "program output".to_string(),
            Frame::Warning(_) => "a warning".to_string(),
        }
    }
}
