//! The resumable stack machine that runs a [`CodeImage`].
//!
//! A run is a sequence of calls to [`Machine::resume`]. Each call executes
//! instructions until the program exits or the [`StepController`] asks to
//! suspend at a check point; the machine then returns to the caller with its
//! frames intact, and the next `resume` continues from the same instruction.
//! Nothing blocks inside the machine, so one session's stepping is driven
//! entirely by its message loop.
//!
//! Check points are IR instructions. Labels are skipped and are never check
//! points. For every other instruction the machine sends
//! [`OnInstruction`](ExecutionMessageType::OnInstruction) before and
//! [`AfterInstruction`](ExecutionMessageType::AfterInstruction) after
//! executing it; calls and returns are bracketed by `FunctionEntry` and
//! `FunctionReturn`, sent after the call or return instruction itself.
//!
//! The initialiser function runs first, at depth 1, followed by the entry
//! point, also at depth 1. The entry point's integer result is the exit code.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use scribble_bind::Intrinsic;
use scribble_ir::{FunctionKind, IRFunction, Instruction, Operation};
use scribble_source::TokenLocation;
use scribble_types::{Datum, Type};

use crate::debug::{StepController, SuspendReason};
use crate::error::{RuntimeError, RuntimeResult};
use crate::image::CodeImage;
use crate::message::{EventSink, ExecutionMessage, ExecutionMessageType, ExecutionMode, ExitStatus, MessagePayload};

/// Frames a machine may hold unless configured otherwise.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

/// Where a suspended program stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub function: String,
    pub index: usize,
    pub location: TokenLocation,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Suspended { reason: SuspendReason, position: Position },
    Exited(ExitStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    Init,
    Entry,
    Done(ExitStatus),
}

#[derive(Debug)]
struct Frame {
    function: usize,
    pc: usize,
    locals: Vec<Datum>,
    /// Height of the operand stack when the frame was entered.
    base: usize,
}

enum Flow {
    Next,
    Enter(Frame),
    Leave(Option<Datum>),
}

pub struct Machine {
    image: Arc<dyn CodeImage>,
    globals: Vec<Datum>,
    frames: Vec<Frame>,
    stack: Vec<Datum>,
    controller: StepController,
    phase: Phase,
    stop: Arc<AtomicBool>,
    /// Set while suspended: the check point at the current instruction has
    /// already been passed.
    resuming: bool,
    executed: u64,
    trace: bool,
    max_call_depth: usize,
    error: Option<RuntimeError>,
}

impl Machine {
    pub fn new(image: Arc<dyn CodeImage>) -> Self {
        let globals = image
            .program()
            .globals
            .iter()
            .map(|g| Datum::default_for(g.ty))
            .collect();
        Self {
            image,
            globals,
            frames: Vec::new(),
            stack: Vec::new(),
            controller: StepController::new(),
            phase: Phase::Idle,
            stop: Arc::new(AtomicBool::new(false)),
            resuming: false,
            executed: 0,
            trace: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            error: None,
        }
    }

    /// Log every executed instruction at trace level.
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Share a cancellation flag. Setting it ends the run at the next check
    /// point.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Fail calls that would make the frame stack deeper than `depth`.
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn controller(&self) -> &StepController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut StepController {
        &mut self.controller
    }

    /// Suspend before the first instruction of the run.
    pub fn pause_at_start(&mut self) {
        self.controller.pause();
    }

    pub fn depth(&self) -> usize {
        self.controller.depth()
    }

    pub fn globals(&self) -> &[Datum] {
        &self.globals
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Done(_))
    }

    pub fn is_suspended(&self) -> bool {
        self.resuming && !self.is_finished()
    }

    /// The runtime error that ended the program, if any.
    pub fn error(&self) -> Option<&RuntimeError> {
        self.error.as_ref()
    }

    /// The instruction the machine will execute next.
    pub fn position(&self) -> Option<Position> {
        let frame = self.frames.last()?;
        let function = self.image.function(frame.function)?;
        let ins = function.instructions().get(frame.pc)?;
        Some(Position {
            function: function.name.clone(),
            index: frame.pc,
            location: ins.location.clone(),
            depth: self.controller.depth(),
        })
    }

    /// Run from the beginning until the program exits, ignoring breakpoints.
    pub fn run(&mut self, sink: &mut dyn EventSink) -> RunOutcome {
        self.resume(ExecutionMode::Run, sink)
    }

    /// Continue in `mode` until the program suspends or exits. Starts the
    /// program if it has not started yet.
    pub fn resume(&mut self, mode: ExecutionMode, sink: &mut dyn EventSink) -> RunOutcome {
        match &self.phase {
            Phase::Done(status) => return RunOutcome::Exited(status.clone()),
            Phase::Idle => {
                if let Err(err) = self.start(sink) {
                    return self.fail(err, sink);
                }
            }
            Phase::Init | Phase::Entry => {}
        }
        self.controller.resume(mode);
        loop {
            match self.step(sink) {
                Ok(None) => {}
                Ok(Some(outcome)) => return outcome,
                Err(err) => return self.fail(err, sink),
            }
        }
    }

    fn start(&mut self, sink: &mut dyn EventSink) -> RuntimeResult<()> {
        let program = self.image.program();
        let entry_name = program.entry.clone().unwrap_or_default();
        sink.message(ExecutionMessage::new(
            ExecutionMessageType::ProgramStart,
            MessagePayload::Program {
                name: program.name.clone(),
                entry: entry_name.clone(),
            },
        ));
        log::debug!(target: "engine", "starting {} at {}", program.name, entry_name);

        let entry = self.image.entry().ok_or(RuntimeError::NoEntryPoint { name: entry_name })?;
        match self.image.init() {
            Some(init) => {
                self.phase = Phase::Init;
                self.enter_root(init, sink)
            }
            None => {
                self.phase = Phase::Entry;
                self.enter_root(entry, sink)
            }
        }
    }

    fn enter_root(&mut self, index: usize, sink: &mut dyn EventSink) -> RuntimeResult<()> {
        let image = Arc::clone(&self.image);
        let function = function_at(image.as_ref(), index, &TokenLocation::default())?;
        if !function.signature.params.is_empty() {
            return Err(RuntimeError::Arity {
                function: function.name.clone(),
                expected: function.signature.params.len(),
                found: 0,
                location: function.location.clone(),
            });
        }
        let frame = new_frame(index, function, Vec::new(), self.stack.len());
        self.enter(frame, function, sink);
        Ok(())
    }

    fn enter(&mut self, frame: Frame, function: &IRFunction, sink: &mut dyn EventSink) {
        self.frames.push(frame);
        self.controller.enter();
        sink.message(ExecutionMessage::new(
            ExecutionMessageType::FunctionEntry,
            MessagePayload::Function {
                name: function.name.clone(),
                depth: self.controller.depth(),
            },
        ));
    }

    fn leave(&mut self, value: Option<Datum>, sink: &mut dyn EventSink) -> RuntimeResult<Option<RunOutcome>> {
        let Some(frame) = self.frames.pop() else {
            return Ok(None);
        };
        self.stack.truncate(frame.base);
        let name = self
            .image
            .function(frame.function)
            .map(|f| f.name.clone())
            .unwrap_or_default();
        sink.message(ExecutionMessage::new(
            ExecutionMessageType::FunctionReturn,
            MessagePayload::Function {
                name,
                depth: self.controller.depth(),
            },
        ));
        self.controller.leave();

        if !self.frames.is_empty() {
            if let Some(value) = value {
                self.stack.push(value);
            }
            return Ok(None);
        }
        match self.phase {
            Phase::Init => {
                self.phase = Phase::Entry;
                let entry = self.image.entry().ok_or_else(|| RuntimeError::NoEntryPoint {
                    name: self.image.program().entry.clone().unwrap_or_default(),
                })?;
                self.enter_root(entry, sink)?;
                Ok(None)
            }
            _ => {
                let code = value.and_then(|v| v.as_i128()).map_or(0, |c| c as i64);
                Ok(Some(self.exit(ExitStatus::Code(code), sink)))
            }
        }
    }

    fn exit(&mut self, status: ExitStatus, sink: &mut dyn EventSink) -> RunOutcome {
        log::debug!(target: "engine", "program exited after {} instruction(s): {:?}", self.executed, status);
        self.frames.clear();
        self.stack.clear();
        self.resuming = false;
        self.phase = Phase::Done(status.clone());
        sink.message(ExecutionMessage::new(
            ExecutionMessageType::ProgramExit,
            MessagePayload::Exit { status: status.clone() },
        ));
        RunOutcome::Exited(status)
    }

    fn fail(&mut self, err: RuntimeError, sink: &mut dyn EventSink) -> RunOutcome {
        log::debug!(target: "engine", "runtime error: {}", err);
        let status = ExitStatus::Error(err.to_diagnostic());
        self.error = Some(err);
        self.exit(status, sink)
    }

    fn step(&mut self, sink: &mut dyn EventSink) -> RuntimeResult<Option<RunOutcome>> {
        let image = Arc::clone(&self.image);
        let Some(frame) = self.frames.last_mut() else {
            return Ok(Some(self.exit(ExitStatus::Code(0), sink)));
        };
        let (index, pc) = (frame.function, frame.pc);
        let function = function_at(image.as_ref(), index, &TokenLocation::default())?;
        let Some(ins) = function.instructions().get(pc) else {
            return self.leave(None, sink);
        };
        if ins.op.is_label() {
            frame.pc += 1;
            return Ok(None);
        }

        if self.stop.load(Ordering::Relaxed) {
            log::debug!(target: "engine", "stop requested");
            return Ok(Some(self.exit(ExitStatus::Stopped, sink)));
        }
        if !std::mem::take(&mut self.resuming) {
            sink.message(self.instruction_message(ExecutionMessageType::OnInstruction, function, pc, ins));
            if let Some(reason) = self.controller.check(ins.location.line) {
                self.resuming = true;
                let position = Position {
                    function: function.name.clone(),
                    index: pc,
                    location: ins.location.clone(),
                    depth: self.controller.depth(),
                };
                log::trace!(target: "engine", "suspended ({:?}) at {}:{:04}", reason, function.name, pc);
                return Ok(Some(RunOutcome::Suspended { reason, position }));
            }
        }

        if self.trace {
            log::trace!(target: "engine", "{}:{:04} {}", function.name, pc, ins.op);
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.pc += 1;
        }
        let flow = self.execute(image.as_ref(), index, pc, function, ins, sink)?;
        self.executed += 1;
        sink.message(self.instruction_message(ExecutionMessageType::AfterInstruction, function, pc, ins));

        match flow {
            Flow::Next => Ok(None),
            Flow::Enter(frame) => {
                let callee = function_at(image.as_ref(), frame.function, &ins.location)?;
                self.enter(frame, callee, sink);
                Ok(None)
            }
            Flow::Leave(value) => self.leave(value, sink),
        }
    }

    fn instruction_message(
        &self,
        kind: ExecutionMessageType,
        function: &IRFunction,
        index: usize,
        ins: &Instruction,
    ) -> ExecutionMessage {
        ExecutionMessage::new(
            kind,
            MessagePayload::Instruction {
                function: function.name.clone(),
                index,
                instruction: ins.op.to_string(),
                location: ins.location.clone(),
                depth: self.controller.depth(),
            },
        )
    }

    fn execute(
        &mut self,
        image: &dyn CodeImage,
        index: usize,
        pc: usize,
        function: &IRFunction,
        ins: &Instruction,
        sink: &mut dyn EventSink,
    ) -> RuntimeResult<Flow> {
        let location = &ins.location;
        let operation = |source| RuntimeError::Operation {
            source,
            location: location.clone(),
        };
        match &ins.op {
            Operation::PushConst(datum) => self.stack.push(datum.clone()),
            Operation::PushLocal(slot) => {
                let value = self.frame(function, location)?.locals.get(*slot).cloned();
                self.stack.push(value.ok_or_else(|| underflow(function, location))?);
            }
            Operation::PopLocal(slot) => {
                let value = self.pop(function, location)?;
                let frame = self.frame_mut(function, location)?;
                if frame.locals.len() <= *slot {
                    frame.locals.resize(*slot + 1, Datum::Void);
                }
                frame.locals[*slot] = value;
            }
            Operation::PushGlobal(id) => {
                let value = self.globals.get(*id).cloned().unwrap_or(Datum::Void);
                self.stack.push(value);
            }
            Operation::PopGlobal(id) => {
                let value = self.pop(function, location)?;
                if self.globals.len() <= *id {
                    self.globals.resize(*id + 1, Datum::Void);
                }
                self.globals[*id] = value;
            }
            Operation::Unary(op) => {
                let operand = self.pop(function, location)?;
                self.stack.push(Datum::unary(*op, &operand).map_err(operation)?);
            }
            Operation::Binary(op) => {
                let rhs = self.pop(function, location)?;
                let lhs = self.pop(function, location)?;
                self.stack.push(Datum::binary(*op, &lhs, &rhs).map_err(operation)?);
            }
            Operation::Cast(ty) => {
                let value = self.pop(function, location)?;
                self.stack.push(value.cast(*ty).map_err(operation)?);
            }
            Operation::Call { function: name, argc } | Operation::NativeCall { function: name, argc } => {
                return self.call(image, index, pc, name, *argc, function, location, sink);
            }
            Operation::Return { value } => {
                let result = if *value {
                    Some(self.pop(function, location)?)
                } else {
                    None
                };
                return Ok(Flow::Leave(result));
            }
            Operation::Jump(label) => self.jump(image, index, *label, function, location)?,
            Operation::JumpIfFalse(label) => {
                if !self.pop(function, location)?.truthy() {
                    self.jump(image, index, *label, function, location)?;
                }
            }
            Operation::JumpIfTrue(label) => {
                if self.pop(function, location)?.truthy() {
                    self.jump(image, index, *label, function, location)?;
                }
            }
            Operation::Label(_) => {}
            Operation::Pop => {
                self.pop(function, location)?;
            }
        }
        Ok(Flow::Next)
    }

    #[allow(clippy::too_many_arguments)]
    fn call(
        &mut self,
        image: &dyn CodeImage,
        index: usize,
        pc: usize,
        name: &str,
        argc: usize,
        caller: &IRFunction,
        location: &TokenLocation,
        sink: &mut dyn EventSink,
    ) -> RuntimeResult<Flow> {
        let unknown = || RuntimeError::UnknownFunction {
            name: name.to_string(),
            location: location.clone(),
        };
        let callee_index = image.callee(index, pc, name).ok_or_else(unknown)?;
        let callee = image.function(callee_index).ok_or_else(unknown)?;
        if callee.signature.params.len() != argc {
            return Err(RuntimeError::Arity {
                function: callee.name.clone(),
                expected: callee.signature.params.len(),
                found: argc,
                location: location.clone(),
            });
        }
        let base = self.frame(caller, location)?.base;
        if self.stack.len() < base + argc {
            return Err(underflow(caller, location));
        }
        let args = self.stack.split_off(self.stack.len() - argc);

        match &callee.kind {
            FunctionKind::Body(_) if self.frames.len() >= self.max_call_depth => Err(RuntimeError::StackOverflow {
                function: callee.name.clone(),
                depth: self.max_call_depth,
                location: location.clone(),
            }),
            FunctionKind::Body(_) => Ok(Flow::Enter(new_frame(callee_index, callee, args, self.stack.len()))),
            FunctionKind::Intrinsic(intrinsic) => {
                let text = args.first().map(|a| a.to_string()).unwrap_or_default();
                sink.output(&text);
                if *intrinsic == Intrinsic::Println {
                    sink.output("\n");
                }
                Ok(Flow::Next)
            }
            FunctionKind::Native { .. } => {
                let result = image
                    .call_native(callee_index, &args)
                    .map_err(|source| RuntimeError::Native {
                        function: callee.name.clone(),
                        source,
                        location: location.clone(),
                    })?;
                if callee.signature.ret != Type::Void {
                    self.stack.push(result);
                }
                Ok(Flow::Next)
            }
        }
    }

    fn jump(
        &mut self,
        image: &dyn CodeImage,
        index: usize,
        label: scribble_ir::Label,
        function: &IRFunction,
        location: &TokenLocation,
    ) -> RuntimeResult<()> {
        let target = image.jump(index, label).ok_or_else(|| RuntimeError::UnknownLabel {
            label,
            function: function.name.clone(),
            location: location.clone(),
        })?;
        self.frame_mut(function, location)?.pc = target;
        Ok(())
    }

    fn frame(&self, function: &IRFunction, location: &TokenLocation) -> RuntimeResult<&Frame> {
        self.frames.last().ok_or_else(|| underflow(function, location))
    }

    fn frame_mut(&mut self, function: &IRFunction, location: &TokenLocation) -> RuntimeResult<&mut Frame> {
        self.frames.last_mut().ok_or_else(|| underflow(function, location))
    }

    fn pop(&mut self, function: &IRFunction, location: &TokenLocation) -> RuntimeResult<Datum> {
        let base = self.frame(function, location)?.base;
        if self.stack.len() <= base {
            return Err(underflow(function, location));
        }
        self.stack.pop().ok_or_else(|| underflow(function, location))
    }
}

fn underflow(function: &IRFunction, location: &TokenLocation) -> RuntimeError {
    RuntimeError::StackUnderflow {
        function: function.name.clone(),
        location: location.clone(),
    }
}

fn function_at<'a>(image: &'a dyn CodeImage, index: usize, location: &TokenLocation) -> RuntimeResult<&'a IRFunction> {
    image.function(index).ok_or_else(|| RuntimeError::UnknownFunction {
        name: format!("#{}", index),
        location: location.clone(),
    })
}

fn new_frame(index: usize, function: &IRFunction, args: Vec<Datum>, base: usize) -> Frame {
    let mut locals: Vec<Datum> = function.locals.iter().map(|l| Datum::default_for(l.ty)).collect();
    for (slot, arg) in args.into_iter().enumerate() {
        match locals.get_mut(slot) {
            Some(local) => *local = arg,
            None => locals.push(arg),
        }
    }
    Frame {
        function: index,
        pc: 0,
        locals,
        base,
    }
}
