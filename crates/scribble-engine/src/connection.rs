//! One session: the stage state machine and everything it owns.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use scribble_bind::{Binder, BoundProgram, DefaultBinder};
use scribble_ir::{generate, GenerateOptions, IRProgram};
use scribble_native::NativeBridge;
use scribble_source::Diagnostic;
use scribble_syntax::{parse_target, parse_text, Program};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult, StageError};
use crate::graph::{bound_graph, syntax_graph, write_graph};
use crate::image::{CodeImage, Executable, Interpretation};
use crate::machine::{Machine, RunOutcome};
use crate::message::{EventSink, ExecutionMessage, ExecutionMessageType, ExecutionMode, MessagePayload};
use crate::stage::Stage;

/// Where the backend of a session runs relative to its frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deployment {
    /// A thread of the frontend process.
    Thread,
    /// A separate `scribble-backend` process.
    #[default]
    Process,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    Text { name: String, text: String },
    /// A file, or a directory of `.scribble` files.
    Path(PathBuf),
}

impl SourceInput {
    /// Program name derived from the source name.
    fn program_name(&self) -> String {
        let path = match self {
            SourceInput::Text { name, .. } => Path::new(name),
            SourceInput::Path(path) => path.as_path(),
        };
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "program".to_string())
    }
}

/// An executor ran without the output of the stage before it.
fn missing(what: &str) -> Vec<Diagnostic> {
    vec![Diagnostic::new(
        "scribble::engine::internal",
        format!("no {} to work on", what),
        None,
    )]
}

type StageExecutor = fn(&mut BackendConnection) -> Result<(), Vec<Diagnostic>>;

fn executor(stage: Stage) -> StageExecutor {
    match stage {
        Stage::Init => |_| Ok(()),
        Stage::Parse => BackendConnection::parse,
        Stage::Bind => BackendConnection::bind,
        Stage::Intermediate => BackendConnection::intermediate,
        Stage::Generate => BackendConnection::link,
        Stage::Execute => BackendConnection::prepare_execute,
        Stage::Interpret => BackendConnection::prepare_interpret,
    }
}

#[derive(Default)]
struct SessionContext {
    source: Option<SourceInput>,
    program: Option<Program>,
    bound: Option<BoundProgram>,
    ir: Option<Arc<IRProgram>>,
    executable: Option<Arc<Executable>>,
    machine: Option<Machine>,
}

/// A session's pipeline.
///
/// Stages only move forward, one executor per stage. The first executor that
/// fails halts the session: its diagnostics are returned as a [`StageError`]
/// and every later request fails with [`EngineError::Halted`].
///
/// Execution messages go to the session's [`EventSink`]. The terminal stage
/// always announces itself with `STAGE_INIT`/`STAGE_START` and ends with
/// `STAGE_END` once the program exits; with [`EngineConfig::debug`] every
/// other stage is announced as well.
pub struct BackendConnection {
    sink: Box<dyn EventSink>,
    stage: Stage,
    failed: Option<Stage>,
    config: Arc<EngineConfig>,
    deployment: Deployment,
    binder: Box<dyn Binder + Send>,
    bridge: &'static NativeBridge,
    stop: Arc<AtomicBool>,
    breakpoints: Vec<usize>,
    context: SessionContext,
}

impl BackendConnection {
    pub fn new(config: Arc<EngineConfig>, sink: Box<dyn EventSink>) -> Self {
        let deployment = if config.threaded {
            Deployment::Thread
        } else {
            Deployment::Process
        };
        Self {
            sink,
            stage: Stage::Init,
            failed: None,
            config,
            deployment,
            binder: Box::new(DefaultBinder),
            bridge: NativeBridge::global(),
            stop: Arc::new(AtomicBool::new(false)),
            breakpoints: Vec::new(),
            context: SessionContext::default(),
        }
    }

    pub fn with_binder(mut self, binder: impl Binder + Send + 'static) -> Self {
        self.binder = Box::new(binder);
        self
    }

    pub fn with_deployment(mut self, deployment: Deployment) -> Self {
        self.deployment = deployment;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The stage that failed, if the session halted.
    pub fn failed_stage(&self) -> Option<Stage> {
        self.failed
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn deployment(&self) -> Deployment {
        self.deployment
    }

    pub fn program(&self) -> Option<&Program> {
        self.context.program.as_ref()
    }

    pub fn bound_program(&self) -> Option<&BoundProgram> {
        self.context.bound.as_ref()
    }

    pub fn ir(&self) -> Option<&IRProgram> {
        self.context.ir.as_deref()
    }

    pub fn machine(&self) -> Option<&Machine> {
        self.context.machine.as_ref()
    }

    /// Flag that cancels the running program at its next check point.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn load_text(&mut self, name: impl Into<String>, text: impl Into<String>) -> EngineResult<()> {
        self.load(SourceInput::Text {
            name: name.into(),
            text: text.into(),
        })
    }

    pub fn load_path(&mut self, path: impl Into<PathBuf>) -> EngineResult<()> {
        self.load(SourceInput::Path(path.into()))
    }

    fn load(&mut self, source: SourceInput) -> EngineResult<()> {
        if self.stage != Stage::Init {
            return Err(EngineError::WrongStage {
                action: "load a source",
                stage: self.stage,
            });
        }
        self.context.source = Some(source);
        Ok(())
    }

    /// Run the executor of the next stage.
    pub fn advance(&mut self) -> EngineResult<Stage> {
        if let Some(stage) = self.failed {
            return Err(EngineError::Halted { stage });
        }
        let next = self.stage.next(self.config.execute).ok_or(EngineError::WrongStage {
            action: "advance",
            stage: self.stage,
        })?;
        let announce = self.config.debug || next.is_terminal();
        if announce {
            self.sink.message(ExecutionMessage::stage(ExecutionMessageType::StageInit, next));
            self.sink.message(ExecutionMessage::stage(ExecutionMessageType::StageStart, next));
        }
        log::debug!(target: "engine", "entering the {} stage", next);
        self.stage = next;

        match executor(next)(self) {
            Ok(()) => {
                if announce && !next.is_terminal() {
                    self.sink.message(ExecutionMessage::stage(ExecutionMessageType::StageEnd, next));
                }
                Ok(next)
            }
            Err(diagnostics) => {
                log::debug!(target: "engine", "the {} stage failed with {} error(s)", next, diagnostics.len());
                self.failed = Some(next);
                if announce {
                    self.sink.message(ExecutionMessage::new(
                        ExecutionMessageType::StageEnd,
                        MessagePayload::Stage {
                            stage: next,
                            diagnostics: diagnostics.clone(),
                        },
                    ));
                }
                Err(StageError {
                    stage: next,
                    diagnostics,
                }
                .into())
            }
        }
    }

    /// Run every stage up to and including GENERATE.
    pub fn compile(&mut self) -> EngineResult<()> {
        while self.stage < Stage::Generate {
            self.advance()?;
        }
        Ok(())
    }

    /// Compile if needed and run the program to completion.
    pub fn run(&mut self) -> EngineResult<RunOutcome> {
        self.enter_terminal_stage()?;
        self.drive(ExecutionMode::Run)
    }

    /// Compile if needed and start the program suspended before its first
    /// instruction.
    pub fn debug(&mut self) -> EngineResult<RunOutcome> {
        self.enter_terminal_stage()?;
        if let Some(machine) = self.context.machine.as_mut() {
            machine.pause_at_start();
        }
        self.drive(ExecutionMode::Continue)
    }

    /// Resume a suspended program.
    pub fn resume(&mut self, mode: ExecutionMode) -> EngineResult<RunOutcome> {
        match &self.context.machine {
            Some(machine) if machine.is_suspended() => self.drive(mode),
            _ => Err(EngineError::NotSuspended),
        }
    }

    /// Suspend whenever execution enters `line`, in any mode but RUN.
    pub fn add_breakpoint(&mut self, line: usize) {
        match self.context.machine.as_mut() {
            Some(machine) => {
                machine.controller_mut().add_breakpoint(line);
            }
            None => self.breakpoints.push(line),
        }
    }

    fn enter_terminal_stage(&mut self) -> EngineResult<()> {
        if self.stage.is_terminal() {
            return Err(EngineError::WrongStage {
                action: "start the program",
                stage: self.stage,
            });
        }
        self.compile()?;
        self.advance()?;
        Ok(())
    }

    fn drive(&mut self, mode: ExecutionMode) -> EngineResult<RunOutcome> {
        let machine = self.context.machine.as_mut().ok_or(EngineError::NotSuspended)?;
        let outcome = machine.resume(mode, self.sink.as_mut());
        if let RunOutcome::Exited(_) = &outcome {
            self.sink
                .message(ExecutionMessage::stage(ExecutionMessageType::StageEnd, self.stage));
        }
        Ok(outcome)
    }

    fn parse(&mut self) -> Result<(), Vec<Diagnostic>> {
        let source = self.context.source.as_ref().ok_or_else(|| {
            vec![Diagnostic::from_error(&EngineError::NoSource, None)]
        })?;
        let options = self.config.parse_options();
        let (program, errors) = match source {
            SourceInput::Text { name, text } => parse_text(name, text, &options),
            SourceInput::Path(path) => parse_target(path, &options),
        };
        if !errors.is_empty() {
            return Err(errors.iter().map(|e| e.to_diagnostic()).collect());
        }
        log::debug!(target: "parse", "parsed {} module(s)", program.modules.len());
        self.dump_graph("syntax", |name| syntax_graph(name, &program));
        self.context.program = Some(program);
        Ok(())
    }

    fn bind(&mut self) -> Result<(), Vec<Diagnostic>> {
        let program = self.context.program.as_ref().ok_or_else(|| missing("syntax tree"))?;
        let bound = self
            .binder
            .bind(program)
            .map_err(|errors| errors.iter().map(|e| e.to_diagnostic()).collect::<Vec<_>>())?;
        log::debug!(target: "bind", "bound {} function(s)", bound.functions.len());
        self.dump_graph("bound", |name| bound_graph(name, &bound));
        self.context.bound = Some(bound);
        Ok(())
    }

    fn program_name(&self) -> String {
        self.context
            .source
            .as_ref()
            .map_or_else(|| "program".to_string(), SourceInput::program_name)
    }

    /// Write one tree to the configured graph directory. A failed write is
    /// logged and does not fail the stage.
    fn dump_graph(&self, tree: &str, render: impl FnOnce(&str) -> String) {
        let Some(dir) = &self.config.graph else {
            return;
        };
        let name = self.program_name();
        match write_graph(dir, &name, tree, &render(&name)) {
            Ok(path) => log::info!(target: "engine", "wrote the {} tree to {}", tree, path.display()),
            Err(err) => log::warn!(target: "engine", "could not write the {} tree to {}: {}", tree, dir.display(), err),
        }
    }

    fn intermediate(&mut self) -> Result<(), Vec<Diagnostic>> {
        let bound = self.context.bound.as_ref().ok_or_else(|| missing("bound program"))?;
        let options = GenerateOptions {
            name: self.program_name(),
            entry_point: self.config.entry_point.clone(),
        };
        let ir = generate(bound, &options)
            .map_err(|errors| errors.iter().map(|e| e.to_diagnostic()).collect::<Vec<_>>())?;
        if self.config.list_ir {
            log::info!(target: "ir", "\n{}", ir.listing());
        }
        self.context.ir = Some(Arc::new(ir));
        Ok(())
    }

    fn link(&mut self) -> Result<(), Vec<Diagnostic>> {
        let ir = self.context.ir.clone().ok_or_else(|| missing("IR program"))?;
        let mut diagnostics = Vec::new();
        for library in &self.config.libraries {
            if let Err(err) = self.bridge.load_library(library) {
                diagnostics.push(Diagnostic::from_error(&err, None));
            }
        }
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }
        let executable = Executable::link(ir, self.bridge, self.config.execute)
            .map_err(|errors| errors.iter().map(|e| e.to_diagnostic()).collect::<Vec<_>>())?;
        self.context.executable = Some(Arc::new(executable));
        Ok(())
    }

    fn prepare_execute(&mut self) -> Result<(), Vec<Diagnostic>> {
        let executable = self.context.executable.clone().ok_or_else(|| missing("executable"))?;
        self.install_machine(executable);
        Ok(())
    }

    fn prepare_interpret(&mut self) -> Result<(), Vec<Diagnostic>> {
        let ir = self.context.ir.clone().ok_or_else(|| missing("IR program"))?;
        self.install_machine(Arc::new(Interpretation::new(ir, self.bridge)));
        Ok(())
    }

    fn install_machine(&mut self, image: Arc<dyn CodeImage>) {
        let mut machine = Machine::new(image)
            .with_trace(self.config.trace)
            .with_max_call_depth(self.config.max_call_depth)
            .with_stop_flag(Arc::clone(&self.stop));
        for line in self.breakpoints.drain(..) {
            machine.controller_mut().add_breakpoint(line);
        }
        self.context.machine = Some(machine);
    }
}
