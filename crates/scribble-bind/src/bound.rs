//! The bound tree.
//!
//! Every expression carries its resolved [`Type`] and every name its resolved
//! binding: a local slot of the enclosing function, a global, or a function.

use serde::{Deserialize, Serialize};

use scribble_source::TokenLocation;
use scribble_types::{BinaryOp, Datum, Type, UnaryOp};

pub type FunctionId = usize;
pub type GlobalId = usize;
pub type LocalId = usize;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundProgram {
    pub globals: Vec<BoundGlobal>,
    pub functions: Vec<BoundFunction>,
}

impl BoundProgram {
    pub fn function(&self, name: &str) -> Option<(FunctionId, &BoundFunction)> {
        self.functions.iter().enumerate().find(|(_, f)| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundGlobal {
    pub name: String,
    pub ty: Type,
    pub is_const: bool,
    pub init: Option<BoundExpr>,
    pub location: TokenLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSlot {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundFunction {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
    /// Parameters occupy the first `params.len()` slots.
    pub locals: Vec<LocalSlot>,
    pub body: BoundBody,
    pub location: TokenLocation,
}

/// Functions the engine implements itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intrinsic {
    Print,
    Println,
}

impl Intrinsic {
    pub fn from_name(name: &str) -> Option<Intrinsic> {
        match name {
            "print" => Some(Intrinsic::Print),
            "println" => Some(Intrinsic::Println),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Print => "print",
            Intrinsic::Println => "println",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundBody {
    Block(BoundBlock),
    Native { symbol: String },
    Intrinsic(Intrinsic),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundBlock {
    pub stmts: Vec<BoundStmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundStmt {
    pub location: TokenLocation,
    pub kind: BoundStmtKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    Local(LocalId),
    Global(GlobalId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundStmtKind {
    Block(BoundBlock),
    /// Declarations, plain and compound assignments all end up here.
    Assign {
        target: Binding,
        value: BoundExpr,
    },
    Expr(BoundExpr),
    If {
        branches: Vec<(BoundExpr, BoundBlock)>,
        else_block: Option<BoundBlock>,
    },
    While {
        cond: BoundExpr,
        body: BoundBlock,
    },
    Loop {
        body: BoundBlock,
    },
    /// Counts `var` from `start` up to, not including, the value `end` had
    /// when the loop started, which is kept in `limit`.
    For {
        var: LocalId,
        limit: LocalId,
        start: BoundExpr,
        end: BoundExpr,
        body: BoundBlock,
    },
    Return(Option<BoundExpr>),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundExpr {
    pub ty: Type,
    pub location: TokenLocation,
    pub kind: BoundExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundExprKind {
    Literal(Datum),
    Variable(Binding),
    Unary {
        op: UnaryOp,
        operand: Box<BoundExpr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<BoundExpr>,
        rhs: Box<BoundExpr>,
    },
    /// Conversion to the expression's own type.
    Cast(Box<BoundExpr>),
    Ternary {
        cond: Box<BoundExpr>,
        then: Box<BoundExpr>,
        otherwise: Box<BoundExpr>,
    },
    Call {
        function: FunctionId,
        args: Vec<BoundExpr>,
    },
}

impl BoundExpr {
    pub fn literal(datum: Datum, location: TokenLocation) -> Self {
        Self {
            ty: datum.type_of(),
            location,
            kind: BoundExprKind::Literal(datum),
        }
    }
}
