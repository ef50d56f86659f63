//! Syntax tree.
//!
//! Every node records the token it started at, for diagnostics, and an id
//! that is unique within one parsed [`Program`].

use scribble_source::Token;
use scribble_types::{BinaryOp, UnaryOp};

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub modules: Vec<Module>,
}

impl Program {
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.modules.iter().flat_map(|m| m.items.iter())
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.items().filter_map(|item| match &item.kind {
            ItemKind::Function(f) => Some(f),
            _ => None,
        })
    }
}

/// One source file: the root text or an imported module.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub token: Token,
}

/// A type as written. Resolution to a real type happens in the binder.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub name: String,
    pub token: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: NodeId,
    pub token: Token,
    pub kind: ItemKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Function(Function),
    Variable(VarDecl),
    Import(Import),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: Option<TypeName>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeName,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Block),
    /// `-> "symbol";`: implemented by a function in a shared library.
    Native { symbol: String },
    /// `=> "name";`: implemented by the engine.
    Intrinsic { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub id: NodeId,
    pub token: Token,
    pub name: Ident,
    pub ty: Option<TypeName>,
    pub init: Option<Expr>,
    pub is_const: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub name: String,
    pub token: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: NodeId,
    pub token: Token,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub id: NodeId,
    pub token: Token,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Block(Block),
    Var(VarDecl),
    /// `x = e`, or `x op= e` when `op` is set. `x++` is `x += 1`.
    Assign {
        target: Ident,
        op: Option<BinaryOp>,
        value: Expr,
    },
    Expr(Expr),
    If {
        branches: Vec<(Expr, Block)>,
        else_block: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    Loop {
        body: Block,
    },
    /// `for v in start..end`, end exclusive.
    For {
        var: Ident,
        start: Expr,
        end: Expr,
        body: Block,
    },
    Return(Option<Expr>),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub token: Token,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Integer {
        value: i128,
        suffix: Option<TypeName>,
    },
    Decimal(f64),
    String(String),
    Bool(bool),
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        ty: TypeName,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        callee: Ident,
        args: Vec<Expr>,
    },
}
