use std::fmt::Write;

use indexmap::IndexMap;

use scribble_bind::{Intrinsic, LocalSlot};
use scribble_source::TokenLocation;
use scribble_types::{Signature, Type};

use crate::instruction::Instruction;

/// Name of the synthetic function that runs global initialisers.
pub const INIT_FUNCTION: &str = "$init";

#[derive(Debug, Clone, PartialEq)]
pub struct IRGlobal {
    pub name: String,
    pub ty: Type,
    pub is_const: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionKind {
    Body(Vec<Instruction>),
    Native { symbol: String },
    Intrinsic(Intrinsic),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IRFunction {
    pub name: String,
    pub signature: Signature,
    /// Parameters occupy the first slots.
    pub locals: Vec<LocalSlot>,
    pub kind: FunctionKind,
    pub location: TokenLocation,
}

impl IRFunction {
    pub fn instructions(&self) -> &[Instruction] {
        match &self.kind {
            FunctionKind::Body(code) => code,
            _ => &[],
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.kind, FunctionKind::Native { .. })
    }
}

/// A lowered program. Functions keep declaration order, with
/// [`INIT_FUNCTION`] first.
#[derive(Debug, Clone, PartialEq)]
pub struct IRProgram {
    pub name: String,
    pub globals: Vec<IRGlobal>,
    pub functions: IndexMap<String, IRFunction>,
    /// `None` when the program has no function of the configured entry name.
    pub entry: Option<String>,
}

impl IRProgram {
    pub fn function(&self, name: &str) -> Option<&IRFunction> {
        self.functions.get(name)
    }

    pub fn instruction_count(&self) -> usize {
        self.functions.values().map(|f| f.instructions().len()).sum()
    }

    /// Human-readable rendering of the whole program.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "program {}", self.name);
        if let Some(entry) = &self.entry {
            let _ = writeln!(out, "entry {}", entry);
        }
        for (id, global) in self.globals.iter().enumerate() {
            let keyword = if global.is_const { "const" } else { "global" };
            let _ = writeln!(out, "{} {} {}: {}", keyword, id, global.name, global.ty);
        }
        for function in self.functions.values() {
            out.push('\n');
            write_function(&mut out, function);
        }
        out
    }
}

fn write_function(out: &mut String, function: &IRFunction) {
    match &function.kind {
        FunctionKind::Native { symbol } => {
            let _ = writeln!(out, "native {}{} -> {:?}", function.name, function.signature, symbol);
        }
        FunctionKind::Intrinsic(intrinsic) => {
            let _ = writeln!(out, "intrinsic {}{} => {:?}", function.name, function.signature, intrinsic.name());
        }
        FunctionKind::Body(code) => {
            let _ = writeln!(out, "func {}{}", function.name, function.signature);
            for (slot, local) in function.locals.iter().enumerate() {
                let _ = writeln!(out, "  local {} {}: {}", slot, local.name, local.ty);
            }
            for (index, instruction) in code.iter().enumerate() {
                let _ = writeln!(out, "  {:04}  {}", index, instruction.op);
            }
        }
    }
}
