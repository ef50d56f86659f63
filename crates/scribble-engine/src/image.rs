//! The two forms a program can be run in.
//!
//! [`Executable`] is the output of the GENERATE stage: callees and jump
//! targets are resolved to indices and native functions to bridge handles
//! once, up front. [`Interpretation`] runs the [`IRProgram`] as it is and
//! looks everything up by name on every transfer. The machine only sees the
//! [`CodeImage`] trait, so both behave the same towards a debugging client.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use scribble_ir::{FunctionKind, IRFunction, IRProgram, Label, Operation, INIT_FUNCTION};
use scribble_native::{call, FunctionHandle, NativeBridge, NativeError, NativeResult};
use scribble_types::Datum;

use crate::error::LinkError;

/// Code the machine can run. Functions are addressed by their index in
/// [`IRProgram::functions`].
pub trait CodeImage: Send + Sync {
    fn program(&self) -> &IRProgram;

    /// Function to run once the initialiser has finished.
    fn entry(&self) -> Option<usize>;

    /// Target of the call at `pc` in `function`, which names `name`.
    fn callee(&self, function: usize, pc: usize, name: &str) -> Option<usize>;

    /// Offset of `label` in `function`.
    fn jump(&self, function: usize, label: Label) -> Option<usize>;

    /// Call the native function at `function` with `args`.
    fn call_native(&self, function: usize, args: &[Datum]) -> NativeResult<Datum>;

    fn function(&self, index: usize) -> Option<&IRFunction> {
        self.program().functions.get_index(index).map(|(_, f)| f)
    }

    fn init(&self) -> Option<usize> {
        self.program().functions.get_index_of(INIT_FUNCTION)
    }
}

fn native_symbol(function: &IRFunction) -> NativeResult<&str> {
    match &function.kind {
        FunctionKind::Native { symbol } => Ok(symbol),
        _ => Err(NativeError::SymbolNotFound {
            name: function.name.clone(),
        }),
    }
}

#[derive(Debug, Default)]
struct LinkedFunction {
    labels: FxHashMap<Label, usize>,
    /// Callee index of every call instruction, by instruction offset.
    callees: FxHashMap<usize, usize>,
    native: Option<FunctionHandle>,
}

/// A linked program.
pub struct Executable {
    program: Arc<IRProgram>,
    entry: usize,
    functions: Vec<LinkedFunction>,
    bridge: &'static NativeBridge,
}

impl Executable {
    /// Link `program`. With `resolve_natives`, every native function is
    /// resolved through `bridge` now, and failing to find one is a link error.
    pub fn link(
        program: Arc<IRProgram>,
        bridge: &'static NativeBridge,
        resolve_natives: bool,
    ) -> Result<Executable, Vec<LinkError>> {
        let mut errors = Vec::new();
        let entry = program
            .entry
            .as_ref()
            .and_then(|name| program.functions.get_index_of(name.as_str()));
        if entry.is_none() {
            errors.push(LinkError::NoEntryPoint {
                name: program.entry.clone().unwrap_or_default(),
            });
        }

        let mut functions = Vec::with_capacity(program.functions.len());
        for function in program.functions.values() {
            let mut linked = LinkedFunction::default();
            for (offset, ins) in function.instructions().iter().enumerate() {
                if let Operation::Label(label) = ins.op {
                    linked.labels.insert(label, offset);
                }
            }
            for (offset, ins) in function.instructions().iter().enumerate() {
                match &ins.op {
                    Operation::Call { function: name, .. } | Operation::NativeCall { function: name, .. } => {
                        match program.functions.get_index_of(name.as_str()) {
                            Some(index) => {
                                linked.callees.insert(offset, index);
                            }
                            None => errors.push(LinkError::UnknownFunction {
                                name: name.clone(),
                                location: ins.location.clone(),
                            }),
                        }
                    }
                    op => {
                        if let Some(label) = op.target() {
                            if !linked.labels.contains_key(&label) {
                                errors.push(LinkError::UnknownLabel {
                                    label,
                                    function: function.name.clone(),
                                    location: ins.location.clone(),
                                });
                            }
                        }
                    }
                }
            }
            if let (FunctionKind::Native { symbol }, true) = (&function.kind, resolve_natives) {
                let resolved = call::check_signature(symbol, &function.signature)
                    .and_then(|()| bridge.resolve_function(symbol));
                match resolved {
                    Ok(handle) => linked.native = Some(handle),
                    Err(source) => errors.push(LinkError::Native {
                        function: function.name.clone(),
                        source,
                        location: function.location.clone(),
                    }),
                }
            }
            functions.push(linked);
        }

        match entry {
            Some(entry) if errors.is_empty() => {
                log::debug!(
                    target: "engine",
                    "linked {} function(s), {} instruction(s)",
                    functions.len(),
                    program.instruction_count()
                );
                Ok(Executable {
                    program,
                    entry,
                    functions,
                    bridge,
                })
            }
            _ => Err(errors),
        }
    }
}

impl CodeImage for Executable {
    fn program(&self) -> &IRProgram {
        &self.program
    }

    fn entry(&self) -> Option<usize> {
        Some(self.entry)
    }

    fn callee(&self, function: usize, pc: usize, _name: &str) -> Option<usize> {
        self.functions.get(function)?.callees.get(&pc).copied()
    }

    fn jump(&self, function: usize, label: Label) -> Option<usize> {
        self.functions.get(function)?.labels.get(&label).copied()
    }

    fn call_native(&self, function: usize, args: &[Datum]) -> NativeResult<Datum> {
        let Some(ir) = self.function(function) else {
            return Err(NativeError::SymbolNotFound {
                name: format!("#{}", function),
            });
        };
        match self.functions.get(function).and_then(|f| f.native.as_ref()) {
            Some(handle) => self.bridge.call_resolved(handle, args, &ir.signature),
            None => self.bridge.native_call(native_symbol(ir)?, args, &ir.signature),
        }
    }
}

/// Runs an [`IRProgram`] without linking it.
pub struct Interpretation {
    program: Arc<IRProgram>,
    bridge: &'static NativeBridge,
}

impl Interpretation {
    pub fn new(program: Arc<IRProgram>, bridge: &'static NativeBridge) -> Self {
        Self { program, bridge }
    }
}

impl CodeImage for Interpretation {
    fn program(&self) -> &IRProgram {
        &self.program
    }

    fn entry(&self) -> Option<usize> {
        self.program
            .functions
            .get_index_of(self.program.entry.as_deref()?)
    }

    fn callee(&self, _function: usize, _pc: usize, name: &str) -> Option<usize> {
        self.program.functions.get_index_of(name)
    }

    fn jump(&self, function: usize, label: Label) -> Option<usize> {
        self.function(function)?
            .instructions()
            .iter()
            .position(|ins| ins.op == Operation::Label(label))
    }

    fn call_native(&self, function: usize, args: &[Datum]) -> NativeResult<Datum> {
        let Some(ir) = self.function(function) else {
            return Err(NativeError::SymbolNotFound {
                name: format!("#{}", function),
            });
        };
        self.bridge.native_call(native_symbol(ir)?, args, &ir.signature)
    }
}
