//! Lowering of bound programs into stack code.

use indexmap::IndexMap;

use scribble_bind::*;
use scribble_source::TokenLocation;
use scribble_types::{BinaryOp, Datum, Signature, Type};

use crate::error::{LoweringError, LoweringResult};
use crate::instruction::{Instruction, Label, Operation};
use crate::program::{FunctionKind, IRFunction, IRGlobal, IRProgram, INIT_FUNCTION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Name given to the generated program.
    pub name: String,
    /// The function execution starts at.
    pub entry_point: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            name: "program".to_string(),
            entry_point: "main".to_string(),
        }
    }
}

/// Lower every function of `program`. Errors from all functions are
/// collected; any error means no program is produced.
pub fn generate(program: &BoundProgram, options: &GenerateOptions) -> Result<IRProgram, Vec<LoweringError>> {
    let mut errors = Vec::new();
    let mut functions = IndexMap::with_capacity(program.functions.len() + 1);

    match lower_init(program) {
        Ok(init) => {
            functions.insert(INIT_FUNCTION.to_string(), init);
        }
        Err(err) => errors.push(err),
    }

    for function in &program.functions {
        match lower_function(program, function) {
            Ok(lowered) => {
                functions.insert(function.name.clone(), lowered);
            }
            Err(err) => errors.push(err),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let entry = program
        .function(&options.entry_point)
        .map(|(_, f)| f.name.clone());
    let globals = program
        .globals
        .iter()
        .map(|g| IRGlobal {
            name: g.name.clone(),
            ty: g.ty,
            is_const: g.is_const,
        })
        .collect();

    let ir = IRProgram {
        name: options.name.clone(),
        globals,
        functions,
        entry,
    };
    log::debug!(
        target: "ir",
        "generated {} function(s), {} instruction(s)",
        ir.functions.len(),
        ir.instruction_count()
    );
    Ok(ir)
}

fn lower_init(program: &BoundProgram) -> LoweringResult<IRFunction> {
    let location = program
        .globals
        .first()
        .map(|g| g.location.clone())
        .unwrap_or_default();
    let mut builder = FunctionBuilder::new(Some(program));
    for (id, global) in program.globals.iter().enumerate() {
        if let Some(init) = &global.init {
            builder.lower_expr(init)?;
            builder.emit(Operation::PopGlobal(id), &global.location);
        }
    }
    builder.emit(Operation::Return { value: false }, &location);
    Ok(IRFunction {
        name: INIT_FUNCTION.to_string(),
        signature: Signature::default(),
        locals: Vec::new(),
        kind: FunctionKind::Body(builder.finish()),
        location,
    })
}

fn lower_function(program: &BoundProgram, function: &BoundFunction) -> LoweringResult<IRFunction> {
    let signature = Signature::new(function.params.clone(), function.return_type);
    let kind = match &function.body {
        BoundBody::Native { symbol } => FunctionKind::Native { symbol: symbol.clone() },
        BoundBody::Intrinsic(intrinsic) => {
            if signature != Signature::new(vec![Type::String], Type::Void) {
                return Err(LoweringError::unsupported(
                    format!("intrinsic '{}' with signature {}", intrinsic.name(), signature),
                    &function.location,
                ));
            }
            FunctionKind::Intrinsic(*intrinsic)
        }
        BoundBody::Block(block) => {
            let mut builder = FunctionBuilder::new(Some(program));
            builder.lower_block(block)?;
            if !matches!(builder.code.last(), Some(Instruction { op: Operation::Return { .. }, .. })) {
                let end = block
                    .stmts
                    .last()
                    .map(|s| s.location.clone())
                    .unwrap_or_else(|| function.location.clone());
                if function.return_type == Type::Void {
                    builder.emit(Operation::Return { value: false }, &end);
                } else {
                    builder.emit(Operation::PushConst(Datum::default_for(function.return_type)), &end);
                    builder.emit(Operation::Return { value: true }, &end);
                }
            }
            FunctionKind::Body(builder.finish())
        }
    };
    Ok(IRFunction {
        name: function.name.clone(),
        signature,
        locals: function.locals.clone(),
        kind,
        location: function.location.clone(),
    })
}

struct LoopLabels {
    continue_to: Label,
    break_to: Label,
}

/// Accumulates the code of one function.
pub(crate) struct FunctionBuilder<'a> {
    /// Needed to lower calls. Without it every call is rejected.
    program: Option<&'a BoundProgram>,
    code: Vec<Instruction>,
    next_label: u32,
    loops: Vec<LoopLabels>,
}

impl<'a> FunctionBuilder<'a> {
    pub(crate) fn new(program: Option<&'a BoundProgram>) -> Self {
        Self {
            program,
            code: Vec::new(),
            next_label: 0,
            loops: Vec::new(),
        }
    }

    pub(crate) fn finish(self) -> Vec<Instruction> {
        self.code
    }

    fn emit(&mut self, op: Operation, location: &TokenLocation) {
        self.code.push(Instruction::new(op, location.clone()));
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn place(&mut self, label: Label, location: &TokenLocation) {
        self.emit(Operation::Label(label), location);
    }

    fn lower_block(&mut self, block: &BoundBlock) -> LoweringResult<()> {
        for stmt in &block.stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn store(&mut self, target: Binding, location: &TokenLocation) {
        match target {
            Binding::Local(slot) => self.emit(Operation::PopLocal(slot), location),
            Binding::Global(id) => self.emit(Operation::PopGlobal(id), location),
        }
    }

    fn lower_stmt(&mut self, stmt: &BoundStmt) -> LoweringResult<()> {
        let location = &stmt.location;
        match &stmt.kind {
            BoundStmtKind::Block(block) => self.lower_block(block)?,
            BoundStmtKind::Assign { target, value } => {
                self.lower_expr(value)?;
                self.store(*target, location);
            }
            BoundStmtKind::Expr(expr) => {
                self.lower_expr(expr)?;
                if expr.ty != Type::Void {
                    self.emit(Operation::Pop, location);
                }
            }
            BoundStmtKind::If { branches, else_block } => {
                let end = self.new_label();
                for (cond, block) in branches {
                    let next = self.new_label();
                    self.lower_expr(cond)?;
                    self.emit(Operation::JumpIfFalse(next), location);
                    self.lower_block(block)?;
                    self.emit(Operation::Jump(end), location);
                    self.place(next, location);
                }
                if let Some(block) = else_block {
                    self.lower_block(block)?;
                }
                self.place(end, location);
            }
            BoundStmtKind::While { cond, body } => {
                let top = self.new_label();
                let end = self.new_label();
                self.place(top, location);
                self.lower_expr(cond)?;
                self.emit(Operation::JumpIfFalse(end), location);
                self.lower_loop_body(body, top, end)?;
                self.emit(Operation::Jump(top), location);
                self.place(end, location);
            }
            BoundStmtKind::Loop { body } => {
                let top = self.new_label();
                let end = self.new_label();
                self.place(top, location);
                self.lower_loop_body(body, top, end)?;
                self.emit(Operation::Jump(top), location);
                self.place(end, location);
            }
            BoundStmtKind::For {
                var,
                limit,
                start,
                end: bound,
                body,
            } => {
                let top = self.new_label();
                let step = self.new_label();
                let end = self.new_label();
                self.lower_expr(start)?;
                self.emit(Operation::PopLocal(*var), location);
                self.lower_expr(bound)?;
                self.emit(Operation::PopLocal(*limit), location);
                self.place(top, location);
                self.emit(Operation::PushLocal(*var), location);
                self.emit(Operation::PushLocal(*limit), location);
                self.emit(Operation::Binary(BinaryOp::Lt), location);
                self.emit(Operation::JumpIfFalse(end), location);
                self.lower_loop_body(body, step, end)?;
                self.place(step, location);
                self.emit(Operation::PushLocal(*var), location);
                self.emit(Operation::PushConst(Datum::from_i128_wrapping(start.ty, 1)), location);
                self.emit(Operation::Binary(BinaryOp::Add), location);
                self.emit(Operation::PopLocal(*var), location);
                self.emit(Operation::Jump(top), location);
                self.place(end, location);
            }
            BoundStmtKind::Return(value) => {
                if let Some(value) = value {
                    self.lower_expr(value)?;
                }
                self.emit(Operation::Return { value: value.is_some() }, location);
            }
            BoundStmtKind::Break | BoundStmtKind::Continue => {
                let labels = self
                    .loops
                    .last()
                    .ok_or_else(|| LoweringError::internal("loop control outside of a loop", location))?;
                let target = if matches!(stmt.kind, BoundStmtKind::Break) {
                    labels.break_to
                } else {
                    labels.continue_to
                };
                self.emit(Operation::Jump(target), location);
            }
        }
        Ok(())
    }

    fn lower_loop_body(&mut self, body: &BoundBlock, continue_to: Label, break_to: Label) -> LoweringResult<()> {
        self.loops.push(LoopLabels { continue_to, break_to });
        let result = self.lower_block(body);
        self.loops.pop();
        result
    }

    pub(crate) fn lower_expr(&mut self, expr: &BoundExpr) -> LoweringResult<()> {
        let location = &expr.location;
        match &expr.kind {
            BoundExprKind::Literal(datum) => self.emit(Operation::PushConst(datum.clone()), location),
            BoundExprKind::Variable(Binding::Local(slot)) => self.emit(Operation::PushLocal(*slot), location),
            BoundExprKind::Variable(Binding::Global(id)) => self.emit(Operation::PushGlobal(*id), location),
            BoundExprKind::Unary { op, operand } => {
                self.lower_expr(operand)?;
                self.emit(Operation::Unary(*op), location);
            }
            BoundExprKind::Binary { op: BinaryOp::And, lhs, rhs } => {
                self.lower_short_circuit(lhs, rhs, false, location)?;
            }
            BoundExprKind::Binary { op: BinaryOp::Or, lhs, rhs } => {
                self.lower_short_circuit(lhs, rhs, true, location)?;
            }
            BoundExprKind::Binary { op, lhs, rhs } => {
                self.lower_expr(lhs)?;
                self.lower_expr(rhs)?;
                self.emit(Operation::Binary(*op), location);
            }
            BoundExprKind::Cast(inner) => {
                self.lower_expr(inner)?;
                if inner.ty != expr.ty {
                    self.emit(Operation::Cast(expr.ty), location);
                }
            }
            BoundExprKind::Ternary { cond, then, otherwise } => {
                let other = self.new_label();
                let end = self.new_label();
                self.lower_expr(cond)?;
                self.emit(Operation::JumpIfFalse(other), location);
                self.lower_expr(then)?;
                self.emit(Operation::Jump(end), location);
                self.place(other, location);
                self.lower_expr(otherwise)?;
                self.place(end, location);
            }
            BoundExprKind::Call { function, args } => {
                let Some(program) = self.program else {
                    return Err(LoweringError::not_constant("a function call", location));
                };
                let callee = program
                    .functions
                    .get(*function)
                    .ok_or_else(|| LoweringError::internal(format!("no function with id {}", function), location))?;
                for arg in args {
                    self.lower_expr(arg)?;
                }
                let name = callee.name.clone();
                let argc = args.len();
                let op = match callee.body {
                    BoundBody::Native { .. } => Operation::NativeCall { function: name, argc },
                    _ => Operation::Call { function: name, argc },
                };
                self.emit(op, location);
            }
        }
        Ok(())
    }

    /// `a && b` evaluates `b` only when `a` is true, `a || b` only when `a`
    /// is false.
    fn lower_short_circuit(
        &mut self,
        lhs: &BoundExpr,
        rhs: &BoundExpr,
        is_or: bool,
        location: &TokenLocation,
    ) -> LoweringResult<()> {
        let decided = self.new_label();
        let end = self.new_label();
        self.lower_expr(lhs)?;
        let jump = if is_or {
            Operation::JumpIfTrue(decided)
        } else {
            Operation::JumpIfFalse(decided)
        };
        self.emit(jump, location);
        self.lower_expr(rhs)?;
        self.emit(Operation::Jump(end), location);
        self.place(decided, location);
        self.emit(Operation::PushConst(Datum::Bool(is_or)), location);
        self.place(end, location);
        Ok(())
    }
}
