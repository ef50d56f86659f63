//! # Scribble Engine
//!
//! Drives one session of the pipeline and runs the result.
//!
//! A [`BackendConnection`] owns a session: its [`EngineConfig`], the stage it
//! has reached and everything the stages produced. Stages run in a fixed
//! order, each through its own executor:
//!
//! | Stage          | Executor                                               |
//! |----------------|--------------------------------------------------------|
//! | `PARSE`        | `scribble_syntax::parse_text` / `parse_target`         |
//! | `BIND`         | the session's [`Binder`](scribble_bind::Binder)        |
//! | `INTERMEDIATE` | `scribble_ir::generate`                                |
//! | `GENERATE`     | [`Executable::link`]                                   |
//! | `EXECUTE`      | a [`Machine`] over the [`Executable`]                  |
//! | `INTERPRET`    | a [`Machine`] over an [`Interpretation`] of the IR     |
//!
//! The first failing executor halts the session and its diagnostics come
//! back as a [`StageError`].
//!
//! ## Stepping
//!
//! The [`Machine`] suspends at check points (IR instructions) according to
//! the [`ExecutionMode`] it was resumed with and the breakpoints of its
//! [`StepController`]. Suspension returns control to the caller; nothing
//! blocks, so a session's message loop decides when to resume.
//!
//! ```
//! use std::sync::Arc;
//! use scribble_engine::{BackendConnection, EngineConfig, ExitStatus, Recorder, RunOutcome};
//!
//! let recorder = Recorder::new();
//! let mut session = BackendConnection::new(Arc::new(EngineConfig::default()), Box::new(recorder.clone()));
//! session.load_text("hello.scribble", "func main(): i32 { println(\"hi\"); return 3; }").unwrap();
//! let outcome = session.run().unwrap();
//! assert_eq!(outcome, RunOutcome::Exited(ExitStatus::Code(3)));
//! assert_eq!(recorder.output(), "hi\n");
//! ```

mod config;
mod connection;
mod debug;
mod error;
mod graph;
mod image;
mod machine;
mod message;
mod stage;

pub use config::{ConfigError, EngineConfig, OptionStore, CONFIG_FILE_NAME};
pub use connection::{BackendConnection, Deployment, SourceInput};
pub use debug::{StepController, SuspendReason};
pub use error::{EngineError, EngineResult, LinkError, LinkResult, RuntimeError, RuntimeResult, StageError};
pub use graph::{bound_graph, syntax_graph, write_graph};
pub use image::{CodeImage, Executable, Interpretation};
pub use machine::{Machine, Position, RunOutcome, DEFAULT_MAX_CALL_DEPTH};
pub use message::{
    EventSink, ExecutionMessage, ExecutionMessageType, ExecutionMode, ExitStatus, MessagePayload, NullSink, Recorder,
};
pub use stage::Stage;
