use rustc_hash::FxHashMap;

use scribble_source::TokenLocation;
use scribble_syntax::ast::*;
use scribble_types::{BinaryOp, Datum, Type, UnaryOp};

use crate::bound::*;
use crate::error::{BindError, BindResult};

/// Resolves names and types of a parsed program.
pub trait Binder {
    fn bind(&self, program: &Program) -> Result<BoundProgram, Vec<BindError>>;
}

/// The binder the pipeline uses unless told otherwise.
///
/// Two passes: function signatures first, so calls may refer to functions
/// declared later, then globals in declaration order, then function bodies.
/// Integer literals without a suffix take the integer type the context
/// expects, defaulting to `i32`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBinder;

impl Binder for DefaultBinder {
    fn bind(&self, program: &Program) -> Result<BoundProgram, Vec<BindError>> {
        let mut cx = BindContext::default();
        let ids = cx.declare_functions(program);
        cx.bind_globals(program);
        cx.bind_bodies(program, &ids);
        log::debug!(
            target: "bind",
            "bound {} function(s), {} global(s), {} error(s)",
            cx.program.functions.len(),
            cx.program.globals.len(),
            cx.errors.len()
        );
        if cx.errors.is_empty() {
            Ok(cx.program)
        } else {
            Err(cx.errors)
        }
    }
}

impl DefaultBinder {
    /// Bind an expression that refers to no names.
    pub fn bind_expression(&self, expr: &Expr) -> Result<BoundExpr, Vec<BindError>> {
        let mut cx = BindContext::default();
        cx.bind_expr(expr, None).map_err(|e| vec![e])
    }
}

#[derive(Debug, Clone, Copy)]
struct LocalEntry {
    slot: LocalId,
    is_const: bool,
}

#[derive(Default)]
struct BindContext {
    program: BoundProgram,
    globals: FxHashMap<String, GlobalId>,
    functions: FxHashMap<String, FunctionId>,
    errors: Vec<BindError>,
    scopes: Vec<FxHashMap<String, LocalEntry>>,
    locals: Vec<LocalSlot>,
    return_type: Type,
    loop_depth: usize,
}

fn location_of(token: &scribble_source::Token) -> TokenLocation {
    token.location.clone()
}

fn resolve_type(name: &TypeName) -> BindResult<Type> {
    Type::from_name(&name.name).ok_or_else(|| BindError::UnknownType {
        name: name.name.clone(),
        location: location_of(&name.token),
    })
}

fn is_untyped_literal(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Integer { suffix: None, .. } => true,
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => is_untyped_literal(operand),
        _ => false,
    }
}

fn castable(from: Type, to: Type) -> bool {
    from == to
        || (to == Type::String && from != Type::Void)
        || (from.is_numeric() && to.is_numeric())
        || (from == Type::Bool && to.is_numeric())
        || (from.is_numeric() && to == Type::Bool)
        || (from == Type::Pointer && to.is_integer())
        || (from.is_integer() && to == Type::Pointer)
}

fn operand_allowed(op: BinaryOp, ty: Type) -> bool {
    match op {
        BinaryOp::Add => ty.is_numeric() || ty == Type::String,
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => ty.is_numeric(),
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => ty.is_integer() || ty == Type::Bool,
        BinaryOp::Shl | BinaryOp::Shr => ty.is_integer(),
        BinaryOp::Eq | BinaryOp::Ne => ty != Type::Void,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            ty.is_numeric() || ty == Type::String || ty == Type::Bool
        }
        BinaryOp::And | BinaryOp::Or => ty == Type::Bool,
    }
}

impl BindContext {
    fn record<T>(&mut self, result: BindResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                log::trace!(target: "bind", "{}", err);
                self.errors.push(err);
                None
            }
        }
    }

    fn is_defined(&self, name: &str) -> bool {
        self.functions.contains_key(name) || self.globals.contains_key(name)
    }

    /// Returns, per item, the id of the function it declared.
    fn declare_functions(&mut self, program: &Program) -> Vec<Option<FunctionId>> {
        let mut ids = Vec::new();
        for item in program.items() {
            let id = match &item.kind {
                ItemKind::Function(f) => self.declare_function(f),
                _ => None,
            };
            ids.push(id);
        }
        ids
    }

    fn declare_function(&mut self, f: &Function) -> Option<FunctionId> {
        let location = location_of(&f.name.token);
        if self.is_defined(&f.name.name) {
            self.errors.push(BindError::Duplicate {
                name: f.name.name.clone(),
                location,
            });
            return None;
        }
        let mut params = Vec::with_capacity(f.params.len());
        let mut locals = Vec::with_capacity(f.params.len());
        for param in &f.params {
            let ty = self.record(resolve_type(&param.ty)).unwrap_or(Type::Void);
            params.push(ty);
            locals.push(LocalSlot {
                name: param.name.name.clone(),
                ty,
            });
        }
        let return_type = match &f.return_type {
            Some(name) => self.record(resolve_type(name)).unwrap_or(Type::Void),
            None => Type::Void,
        };
        let body = match &f.body {
            FunctionBody::Block(_) => BoundBody::Block(BoundBlock::default()),
            FunctionBody::Native { symbol } => BoundBody::Native { symbol: symbol.clone() },
            FunctionBody::Intrinsic { name } => match Intrinsic::from_name(name) {
                Some(intrinsic) => BoundBody::Intrinsic(intrinsic),
                None => {
                    self.errors.push(BindError::UnknownIntrinsic {
                        name: name.clone(),
                        location: location.clone(),
                    });
                    BoundBody::Block(BoundBlock::default())
                }
            },
        };
        let id = self.program.functions.len();
        self.program.functions.push(BoundFunction {
            name: f.name.name.clone(),
            params,
            return_type,
            locals,
            body,
            location,
        });
        self.functions.insert(f.name.name.clone(), id);
        Some(id)
    }

    /// `print` and `println` may be called without a declaration.
    fn implicit_intrinsic(&mut self, name: &str, location: &TokenLocation) -> Option<FunctionId> {
        let intrinsic = Intrinsic::from_name(name)?;
        let id = self.program.functions.len();
        self.program.functions.push(BoundFunction {
            name: name.to_string(),
            params: vec![Type::String],
            return_type: Type::Void,
            locals: vec![LocalSlot {
                name: "value".to_string(),
                ty: Type::String,
            }],
            body: BoundBody::Intrinsic(intrinsic),
            location: location.clone(),
        });
        self.functions.insert(name.to_string(), id);
        Some(id)
    }

    fn bind_globals(&mut self, program: &Program) {
        for item in program.items() {
            let decl = match &item.kind {
                ItemKind::Variable(decl) => decl,
                _ => continue,
            };
            let location = location_of(&decl.name.token);
            if self.is_defined(&decl.name.name) {
                self.errors.push(BindError::Duplicate {
                    name: decl.name.name.clone(),
                    location,
                });
                continue;
            }
            let Some((ty, init)) = self.bind_declaration(decl) else {
                continue;
            };
            let id = self.program.globals.len();
            self.program.globals.push(BoundGlobal {
                name: decl.name.name.clone(),
                ty,
                is_const: decl.is_const,
                init,
                location,
            });
            self.globals.insert(decl.name.name.clone(), id);
        }
    }

    /// Type and initializer of a declaration.
    fn bind_declaration(&mut self, decl: &VarDecl) -> Option<(Type, Option<BoundExpr>)> {
        let annotated = match &decl.ty {
            Some(name) => Some(self.record(resolve_type(name))?),
            None => None,
        };
        let init = match &decl.init {
            Some(expr) => {
                let bound = self.bind_expr(expr, annotated);
                Some(self.record(bound)?)
            }
            None => None,
        };
        let ty = match (annotated, &init) {
            (Some(ty), Some(init)) if init.ty != ty => {
                self.errors.push(BindError::TypeMismatch {
                    expected: ty,
                    found: init.ty,
                    location: init.location.clone(),
                });
                return None;
            }
            (Some(ty), _) => ty,
            (None, Some(init)) => init.ty,
            (None, None) => {
                self.errors.push(BindError::MissingType {
                    name: decl.name.name.clone(),
                    location: location_of(&decl.name.token),
                });
                return None;
            }
        };
        if ty == Type::Void {
            self.errors.push(BindError::MissingType {
                name: decl.name.name.clone(),
                location: location_of(&decl.name.token),
            });
            return None;
        }
        Some((ty, init))
    }

    fn bind_bodies(&mut self, program: &Program, ids: &[Option<FunctionId>]) {
        for (item, id) in program.items().zip(ids) {
            let (f, id) = match (&item.kind, id) {
                (ItemKind::Function(f), Some(id)) => (f, *id),
                _ => continue,
            };
            let FunctionBody::Block(block) = &f.body else {
                continue;
            };
            let function = &self.program.functions[id];
            self.locals = function.locals.clone();
            self.return_type = function.return_type;
            self.loop_depth = 0;
            let params = self
                .locals
                .iter()
                .enumerate()
                .map(|(slot, local)| (local.name.clone(), LocalEntry { slot, is_const: false }))
                .collect();
            self.scopes = vec![params];

            let body = self.bind_block_in_scope(block);

            self.scopes.clear();
            let function = &mut self.program.functions[id];
            function.locals = std::mem::take(&mut self.locals);
            function.body = BoundBody::Block(body);
        }
    }

    fn declare_local(&mut self, name: &str, ty: Type, is_const: bool) -> LocalId {
        let slot = self.locals.len();
        self.locals.push(LocalSlot {
            name: name.to_string(),
            ty,
        });
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), LocalEntry { slot, is_const });
        }
        slot
    }

    fn lookup_local(&self, name: &str) -> Option<LocalEntry> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).copied())
    }

    fn bind_block(&mut self, block: &Block) -> BoundBlock {
        self.scopes.push(FxHashMap::default());
        let bound = self.bind_block_in_scope(block);
        self.scopes.pop();
        bound
    }

    fn bind_block_in_scope(&mut self, block: &Block) -> BoundBlock {
        let mut stmts = Vec::with_capacity(block.stmts.len());
        for stmt in &block.stmts {
            if let Some(kind) = self.bind_stmt(stmt) {
                stmts.push(BoundStmt {
                    location: location_of(&stmt.token),
                    kind,
                });
            }
        }
        BoundBlock { stmts }
    }

    fn bind_stmt(&mut self, stmt: &Stmt) -> Option<BoundStmtKind> {
        let location = location_of(&stmt.token);
        let kind = match &stmt.kind {
            StmtKind::Block(block) => BoundStmtKind::Block(self.bind_block(block)),
            StmtKind::Var(decl) => {
                let (ty, init) = self.bind_declaration(decl)?;
                let slot = self.declare_local(&decl.name.name, ty, decl.is_const);
                let value = init.unwrap_or_else(|| BoundExpr::literal(Datum::default_for(ty), location));
                BoundStmtKind::Assign {
                    target: Binding::Local(slot),
                    value,
                }
            }
            StmtKind::Assign { target, op, value } => {
                let result = self.bind_assignment(target, *op, value);
                self.record(result)?
            }
            StmtKind::Expr(expr) => {
                let bound = self.bind_expr(expr, None);
                BoundStmtKind::Expr(self.record(bound)?)
            }
            StmtKind::If { branches, else_block } => {
                let mut bound = Vec::with_capacity(branches.len());
                for (cond, block) in branches {
                    let cond = self.bind_condition(cond);
                    let block = self.bind_block(block);
                    bound.push((self.record(cond)?, block));
                }
                let else_block = else_block.as_ref().map(|b| self.bind_block(b));
                BoundStmtKind::If {
                    branches: bound,
                    else_block,
                }
            }
            StmtKind::While { cond, body } => {
                let cond = self.bind_condition(cond);
                let body = self.bind_loop_body(body);
                BoundStmtKind::While {
                    cond: self.record(cond)?,
                    body,
                }
            }
            StmtKind::Loop { body } => BoundStmtKind::Loop {
                body: self.bind_loop_body(body),
            },
            StmtKind::For { var, start, end, body } => {
                let bounds = self.bind_operands(start, end, None);
                let (start, end) = self.record(bounds)?;
                if !start.ty.is_integer() {
                    self.errors.push(BindError::InvalidOperand {
                        op: "..".to_string(),
                        ty: start.ty,
                        location: start.location,
                    });
                    return None;
                }
                self.scopes.push(FxHashMap::default());
                let limit = self.declare_local("$limit", start.ty, true);
                let var_slot = self.declare_local(&var.name, start.ty, false);
                let body = self.bind_loop_body(body);
                self.scopes.pop();
                BoundStmtKind::For {
                    var: var_slot,
                    limit,
                    start,
                    end,
                    body,
                }
            }
            StmtKind::Return(value) => self.bind_return(value.as_ref(), &location)?,
            StmtKind::Break | StmtKind::Continue => {
                if self.loop_depth == 0 {
                    let keyword = if matches!(stmt.kind, StmtKind::Break) { "break" } else { "continue" };
                    self.errors.push(BindError::OutsideLoop {
                        keyword: keyword.to_string(),
                        location,
                    });
                    return None;
                }
                if matches!(stmt.kind, StmtKind::Break) {
                    BoundStmtKind::Break
                } else {
                    BoundStmtKind::Continue
                }
            }
        };
        Some(kind)
    }

    fn bind_loop_body(&mut self, body: &Block) -> BoundBlock {
        self.loop_depth += 1;
        let body = self.bind_block(body);
        self.loop_depth -= 1;
        body
    }

    fn bind_return(&mut self, value: Option<&Expr>, location: &TokenLocation) -> Option<BoundStmtKind> {
        let expected = self.return_type;
        match value {
            None if expected == Type::Void => Some(BoundStmtKind::Return(None)),
            None => {
                self.errors.push(BindError::TypeMismatch {
                    expected,
                    found: Type::Void,
                    location: location.clone(),
                });
                None
            }
            Some(expr) => {
                let bound = self.bind_expr(expr, Some(expected));
                let bound = self.record(bound)?;
                if bound.ty != expected {
                    self.errors.push(BindError::TypeMismatch {
                        expected,
                        found: bound.ty,
                        location: bound.location,
                    });
                    return None;
                }
                Some(BoundStmtKind::Return(Some(bound)))
            }
        }
    }

    fn bind_assignment(&mut self, target: &Ident, op: Option<BinaryOp>, value: &Expr) -> BindResult<BoundStmtKind> {
        let location = location_of(&target.token);
        let (binding, ty) = match self.lookup_local(&target.name) {
            Some(entry) if entry.is_const => {
                return Err(BindError::NotAssignable {
                    name: target.name.clone(),
                    location,
                })
            }
            Some(entry) => (Binding::Local(entry.slot), self.locals[entry.slot].ty),
            None => match self.globals.get(&target.name) {
                Some(&id) if self.program.globals[id].is_const => {
                    return Err(BindError::NotAssignable {
                        name: target.name.clone(),
                        location,
                    })
                }
                Some(&id) => (Binding::Global(id), self.program.globals[id].ty),
                None if self.functions.contains_key(&target.name) => {
                    return Err(BindError::NotAssignable {
                        name: target.name.clone(),
                        location,
                    })
                }
                None => {
                    return Err(BindError::UnknownName {
                        name: target.name.clone(),
                        location,
                    })
                }
            },
        };

        let mut value = self.bind_expr(value, Some(ty))?;
        if let Some(op) = op {
            if !operand_allowed(op, ty) {
                return Err(BindError::InvalidOperand {
                    op: op.to_string(),
                    ty,
                    location,
                });
            }
            let current = BoundExpr {
                ty,
                location: location.clone(),
                kind: BoundExprKind::Variable(binding),
            };
            value = BoundExpr {
                ty,
                location: value.location.clone(),
                kind: BoundExprKind::Binary {
                    op,
                    lhs: Box::new(current),
                    rhs: Box::new(value),
                },
            };
        }
        if value.ty != ty {
            return Err(BindError::TypeMismatch {
                expected: ty,
                found: value.ty,
                location: value.location,
            });
        }
        Ok(BoundStmtKind::Assign { target: binding, value })
    }

    fn bind_condition(&mut self, expr: &Expr) -> BindResult<BoundExpr> {
        let cond = self.bind_expr(expr, Some(Type::Bool))?;
        if cond.ty != Type::Bool {
            return Err(BindError::TypeMismatch {
                expected: Type::Bool,
                found: cond.ty,
                location: cond.location,
            });
        }
        Ok(cond)
    }

    /// Bind two operands that must end up with the same type. An untyped
    /// integer literal on the left adopts the type of the right operand.
    fn bind_operands(&mut self, a: &Expr, b: &Expr, expected: Option<Type>) -> BindResult<(BoundExpr, BoundExpr)> {
        let mut lhs = self.bind_expr(a, expected)?;
        let rhs = self.bind_expr(b, Some(lhs.ty))?;
        if lhs.ty != rhs.ty && is_untyped_literal(a) {
            lhs = self.bind_expr(a, Some(rhs.ty))?;
        }
        if lhs.ty != rhs.ty {
            return Err(BindError::TypeMismatch {
                expected: lhs.ty,
                found: rhs.ty,
                location: rhs.location,
            });
        }
        Ok((lhs, rhs))
    }

    fn bind_integer(&self, expr: &Expr, value: i128, suffix: Option<&TypeName>, expected: Option<Type>) -> BindResult<BoundExpr> {
        let location = location_of(&expr.token);
        let ty = match suffix {
            Some(name) => {
                let ty = resolve_type(name)?;
                if !ty.is_integer() {
                    return Err(BindError::Unsupported {
                        message: format!("'{}' is not an integer type", name.name),
                        location,
                    });
                }
                ty
            }
            None => match expected {
                Some(ty) if ty.is_integer() => ty,
                Some(Type::F64) => return Ok(BoundExpr::literal(Datum::F64(value as f64), location)),
                _ => Type::DEFAULT_INT,
            },
        };
        let datum = Datum::integer_literal(ty, value).map_err(|_| BindError::LiteralOutOfRange {
            value: value.to_string(),
            ty,
            location: location.clone(),
        })?;
        Ok(BoundExpr::literal(datum, location))
    }

    fn bind_expr(&mut self, expr: &Expr, expected: Option<Type>) -> BindResult<BoundExpr> {
        let location = location_of(&expr.token);
        let (ty, kind) = match &expr.kind {
            ExprKind::Integer { value, suffix } => return self.bind_integer(expr, *value, suffix.as_ref(), expected),
            ExprKind::Decimal(v) => return Ok(BoundExpr::literal(Datum::F64(*v), location)),
            ExprKind::String(s) => return Ok(BoundExpr::literal(Datum::string(s), location)),
            ExprKind::Bool(b) => return Ok(BoundExpr::literal(Datum::Bool(*b), location)),
            ExprKind::Identifier(name) => self.bind_name(name, &location)?,
            ExprKind::Unary { op, operand } => {
                if let (UnaryOp::Neg, ExprKind::Integer { value, suffix }) = (op, &operand.kind) {
                    return self.bind_integer(operand, -value, suffix.as_ref(), expected);
                }
                let operand = self.bind_expr(operand, expected)?;
                let allowed = match op {
                    UnaryOp::Neg => operand.ty.is_numeric() && (operand.ty.is_signed() || operand.ty.is_float()),
                    UnaryOp::Not => operand.ty == Type::Bool,
                    UnaryOp::BitNot => operand.ty.is_integer(),
                };
                if !allowed {
                    return Err(BindError::InvalidOperand {
                        op: op.to_string(),
                        ty: operand.ty,
                        location,
                    });
                }
                (
                    operand.ty,
                    BoundExprKind::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    },
                )
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let operand_expected = if op.is_logical() {
                    Some(Type::Bool)
                } else if op.is_comparison() {
                    None
                } else {
                    expected
                };
                let (lhs, rhs) = self.bind_operands(lhs, rhs, operand_expected)?;
                if !operand_allowed(*op, lhs.ty) {
                    return Err(BindError::InvalidOperand {
                        op: op.to_string(),
                        ty: lhs.ty,
                        location,
                    });
                }
                let ty = if op.is_comparison() { Type::Bool } else { lhs.ty };
                (
                    ty,
                    BoundExprKind::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                )
            }
            ExprKind::Cast { expr: inner, ty } => {
                let to = resolve_type(ty)?;
                let inner = self.bind_expr(inner, None)?;
                if !castable(inner.ty, to) {
                    return Err(BindError::InvalidCast {
                        from: inner.ty,
                        to,
                        location,
                    });
                }
                (to, BoundExprKind::Cast(Box::new(inner)))
            }
            ExprKind::Ternary { cond, then, otherwise } => {
                let cond = self.bind_condition(cond)?;
                let (then, otherwise) = self.bind_operands(then, otherwise, expected)?;
                (
                    then.ty,
                    BoundExprKind::Ternary {
                        cond: Box::new(cond),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    },
                )
            }
            ExprKind::Call { callee, args } => self.bind_call(callee, args)?,
        };
        Ok(BoundExpr { ty, location, kind })
    }

    fn bind_name(&self, name: &str, location: &TokenLocation) -> BindResult<(Type, BoundExprKind)> {
        if let Some(entry) = self.lookup_local(name) {
            let ty = self.locals[entry.slot].ty;
            return Ok((ty, BoundExprKind::Variable(Binding::Local(entry.slot))));
        }
        if let Some(&id) = self.globals.get(name) {
            let ty = self.program.globals[id].ty;
            return Ok((ty, BoundExprKind::Variable(Binding::Global(id))));
        }
        Err(BindError::UnknownName {
            name: name.to_string(),
            location: location.clone(),
        })
    }

    fn bind_call(&mut self, callee: &Ident, args: &[Expr]) -> BindResult<(Type, BoundExprKind)> {
        let location = location_of(&callee.token);
        let id = match self.functions.get(&callee.name) {
            Some(&id) => id,
            None => self
                .implicit_intrinsic(&callee.name, &location)
                .ok_or_else(|| BindError::UnknownFunction {
                    name: callee.name.clone(),
                    location: location.clone(),
                })?,
        };
        let params = self.program.functions[id].params.clone();
        let return_type = self.program.functions[id].return_type;
        let is_intrinsic = matches!(self.program.functions[id].body, BoundBody::Intrinsic(_));
        if params.len() != args.len() {
            return Err(BindError::ArityMismatch {
                name: callee.name.clone(),
                expected: params.len(),
                found: args.len(),
                location,
            });
        }

        let mut bound = Vec::with_capacity(args.len());
        for (arg, &param) in args.iter().zip(&params) {
            let mut value = self.bind_expr(arg, Some(param))?;
            if value.ty != param && is_intrinsic && param == Type::String && castable(value.ty, param) {
                value = BoundExpr {
                    ty: Type::String,
                    location: value.location.clone(),
                    kind: BoundExprKind::Cast(Box::new(value)),
                };
            }
            if value.ty != param {
                return Err(BindError::TypeMismatch {
                    expected: param,
                    found: value.ty,
                    location: value.location,
                });
            }
            bound.push(value);
        }
        Ok((return_type, BoundExprKind::Call { function: id, args: bound }))
    }
}
