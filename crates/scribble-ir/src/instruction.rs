//! IR instructions.

use std::fmt;

use scribble_bind::{GlobalId, LocalId};
use scribble_source::TokenLocation;
use scribble_types::{BinaryOp, Datum, Type, UnaryOp};

/// A jump target, unique within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// One stack-machine operation. Operands are popped right to left, so the
/// left operand of a binary operator is pushed first.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    PushConst(Datum),
    PushLocal(LocalId),
    PopLocal(LocalId),
    PushGlobal(GlobalId),
    PopGlobal(GlobalId),
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// Convert the top of the stack to the given type.
    Cast(Type),
    /// Call a Scribble function or intrinsic with `argc` arguments.
    Call { function: String, argc: usize },
    /// Call a function bound to a native symbol.
    NativeCall { function: String, argc: usize },
    /// Leave the function. With `value`, the top of the stack is the result.
    Return { value: bool },
    Jump(Label),
    JumpIfFalse(Label),
    JumpIfTrue(Label),
    /// Marks a jump target. Executes as a no-op and is never a check point.
    Label(Label),
    /// Discard the top of the stack.
    Pop,
}

impl Operation {
    pub fn is_label(&self) -> bool {
        matches!(self, Operation::Label(_))
    }

    /// The label this operation may transfer control to.
    pub fn target(&self) -> Option<Label> {
        match self {
            Operation::Jump(l) | Operation::JumpIfFalse(l) | Operation::JumpIfTrue(l) => Some(*l),
            _ => None,
        }
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            Operation::PushConst(_) => "push.const",
            Operation::PushLocal(_) => "push.local",
            Operation::PopLocal(_) => "pop.local",
            Operation::PushGlobal(_) => "push.global",
            Operation::PopGlobal(_) => "pop.global",
            Operation::Unary(_) => "unary",
            Operation::Binary(_) => "binary",
            Operation::Cast(_) => "cast",
            Operation::Call { .. } => "call",
            Operation::NativeCall { .. } => "call.native",
            Operation::Return { .. } => "ret",
            Operation::Jump(_) => "jump",
            Operation::JumpIfFalse(_) => "jump.false",
            Operation::JumpIfTrue(_) => "jump.true",
            Operation::Label(_) => "label",
            Operation::Pop => "pop",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::PushConst(Datum::String(s)) => write!(f, "push.const string {:?}", s.as_ref()),
            Operation::PushConst(d) => write!(f, "push.const {} {}", d.type_of(), d),
            Operation::PushLocal(slot)
            | Operation::PopLocal(slot)
            | Operation::PushGlobal(slot)
            | Operation::PopGlobal(slot) => write!(f, "{} {}", self.mnemonic(), slot),
            Operation::Unary(op) => write!(f, "unary {}", op),
            Operation::Binary(op) => write!(f, "binary {}", op),
            Operation::Cast(ty) => write!(f, "cast {}", ty),
            Operation::Call { function, argc } | Operation::NativeCall { function, argc } => {
                write!(f, "{} {}/{}", self.mnemonic(), function, argc)
            }
            Operation::Return { value: true } => f.write_str("ret value"),
            Operation::Return { value: false } => f.write_str("ret"),
            Operation::Jump(l) | Operation::JumpIfFalse(l) | Operation::JumpIfTrue(l) => {
                write!(f, "{} {}", self.mnemonic(), l)
            }
            Operation::Label(l) => write!(f, "{}:", l),
            Operation::Pop => f.write_str("pop"),
        }
    }
}

/// An operation plus the location of the source it was lowered from.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: Operation,
    pub location: TokenLocation,
}

impl Instruction {
    pub fn new(op: Operation, location: TokenLocation) -> Self {
        Self { op, location }
    }
}
