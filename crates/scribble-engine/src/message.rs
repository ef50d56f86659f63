//! Execution messages and the listener they are delivered to.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use scribble_source::{Diagnostic, TokenLocation};

use crate::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionMessageType {
    StageInit,
    StageStart,
    ProgramStart,
    FunctionEntry,
    OnInstruction,
    AfterInstruction,
    FunctionReturn,
    ProgramExit,
    StageEnd,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// The entry point returned; non-integer results exit with 0.
    Code(i64),
    /// Cancelled by a `stop` request.
    Stopped,
    /// A runtime error ended the program.
    Error(Diagnostic),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePayload {
    Stage {
        stage: Stage,
        /// Set on `STAGE_END` of a failed stage.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        diagnostics: Vec<Diagnostic>,
    },
    Program {
        name: String,
        entry: String,
    },
    Function {
        name: String,
        depth: usize,
    },
    Instruction {
        function: String,
        index: usize,
        instruction: String,
        location: TokenLocation,
        depth: usize,
    },
    Exit {
        status: ExitStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMessage {
    #[serde(rename = "type")]
    pub kind: ExecutionMessageType,
    pub payload: MessagePayload,
}

impl ExecutionMessage {
    pub fn new(kind: ExecutionMessageType, payload: MessagePayload) -> Self {
        Self { kind, payload }
    }

    pub fn stage(kind: ExecutionMessageType, stage: Stage) -> Self {
        Self::new(
            kind,
            MessagePayload::Stage {
                stage,
                diagnostics: Vec::new(),
            },
        )
    }
}

impl fmt::Display for ExecutionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            MessagePayload::Stage { stage, diagnostics } if diagnostics.is_empty() => {
                write!(f, "{:?} {}", self.kind, stage)
            }
            MessagePayload::Stage { stage, diagnostics } => {
                write!(f, "{:?} {} ({} errors)", self.kind, stage, diagnostics.len())
            }
            MessagePayload::Program { name, entry } => write!(f, "{:?} {} ({})", self.kind, name, entry),
            MessagePayload::Function { name, depth } => write!(f, "{:?} {} depth {}", self.kind, name, depth),
            MessagePayload::Instruction {
                function,
                index,
                instruction,
                location,
                ..
            } => write!(f, "{:?} {}:{:04} {} at {}", self.kind, function, index, instruction, location),
            MessagePayload::Exit { status } => write!(f, "{:?} {:?}", self.kind, status),
        }
    }
}

/// Stepping granularity requested when a suspended program is resumed.
///
/// [`code`](ExecutionMode::code) gives the bit each mode has on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Never suspend, not even at breakpoints.
    #[default]
    Run,
    /// Suspend before the next instruction.
    SingleStep,
    /// Suspend once the call depth is back at the depth the step started at.
    StepOver,
    /// Suspend after the current function returns.
    RunToReturn,
    /// Suspend only at breakpoints.
    Continue,
}

impl ExecutionMode {
    pub fn code(self) -> u8 {
        match self {
            ExecutionMode::Run => 0,
            ExecutionMode::SingleStep => 1,
            ExecutionMode::StepOver => 2,
            ExecutionMode::RunToReturn => 4,
            ExecutionMode::Continue => 8,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => ExecutionMode::Run,
            1 => ExecutionMode::SingleStep,
            2 => ExecutionMode::StepOver,
            4 => ExecutionMode::RunToReturn,
            8 => ExecutionMode::Continue,
            _ => return None,
        })
    }
}

/// Receives everything a session produces while it runs.
pub trait EventSink: Send {
    fn message(&mut self, message: ExecutionMessage);

    /// Text written by the program.
    fn output(&mut self, text: &str);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn message(&mut self, _message: ExecutionMessage) {}

    fn output(&mut self, _text: &str) {}
}

#[derive(Debug, Default)]
struct Recording {
    messages: Vec<ExecutionMessage>,
    output: String,
}

/// Keeps every message and all output. Clones share the same recording.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    inner: Arc<Mutex<Recording>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ExecutionMessage> {
        self.inner.lock().messages.clone()
    }

    pub fn kinds(&self) -> Vec<ExecutionMessageType> {
        self.inner.lock().messages.iter().map(|m| m.kind).collect()
    }

    pub fn output(&self) -> String {
        self.inner.lock().output.clone()
    }

    /// Remove and return the messages recorded so far.
    pub fn take_messages(&self) -> Vec<ExecutionMessage> {
        std::mem::take(&mut self.inner.lock().messages)
    }
}

impl EventSink for Recorder {
    fn message(&mut self, message: ExecutionMessage) {
        self.inner.lock().messages.push(message);
    }

    fn output(&mut self, text: &str) {
        self.inner.lock().output.push_str(text);
    }
}
