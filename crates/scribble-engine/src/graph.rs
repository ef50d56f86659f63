//! Graphviz renderings of the syntax and bound trees.
//!
//! Every node points at its parent and the graph is laid out bottom to top,
//! so the program node ends up at the top of the picture. Labels start with
//! the node's role in its parent where there is one (`lhs`, `condition`).

use std::io;
use std::path::{Path, PathBuf};

use scribble_bind::{
    Binding, BoundBlock, BoundBody, BoundExpr, BoundExprKind, BoundFunction, BoundProgram, BoundStmt, BoundStmtKind,
};
use scribble_syntax::ast::{Block, Expr, ExprKind, FunctionBody, ItemKind, Stmt, StmtKind, VarDecl};
use scribble_syntax::Program;

struct Dot {
    out: String,
    prefix: char,
    next: usize,
}

impl Dot {
    fn new(name: &str, prefix: char) -> Self {
        let mut out = format!("digraph \"{}\" {{\n", escape(name));
        out.push_str("    rankdir = BT;\n");
        Self { out, prefix, next: 0 }
    }

    fn node(&mut self, parent: Option<usize>, role: &str, label: &str) -> usize {
        let id = self.next;
        self.next += 1;
        let label = if role.is_empty() {
            label.to_string()
        } else {
            format!("{} {}", role, label)
        };
        self.out
            .push_str(&format!("    Node_{}_{}[label=\"{}\"];\n", self.prefix, id, escape(&label)));
        if let Some(parent) = parent {
            self.out
                .push_str(&format!("    Node_{p}_{} -> Node_{p}_{};\n", id, parent, p = self.prefix));
        }
        id
    }

    fn finish(mut self) -> String {
        self.out.push_str("}\n");
        self.out
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// The syntax tree of `program` in dot format.
pub fn syntax_graph(name: &str, program: &Program) -> String {
    let mut dot = Dot::new(name, 's');
    let root = dot.node(None, "", &format!("program {}", name));
    for module in &program.modules {
        let module_node = dot.node(Some(root), "", &format!("module {}", module.name));
        for item in &module.items {
            match &item.kind {
                ItemKind::Function(f) => {
                    let label = match &f.return_type {
                        Some(ty) => format!("function {}: {}", f.name.name, ty.name),
                        None => format!("function {}", f.name.name),
                    };
                    let node = dot.node(Some(module_node), "", &label);
                    for param in &f.params {
                        dot.node(Some(node), "param", &format!("{}: {}", param.name.name, param.ty.name));
                    }
                    match &f.body {
                        FunctionBody::Block(block) => syntax_block(&mut dot, node, "", block),
                        FunctionBody::Native { symbol } => {
                            dot.node(Some(node), "", &format!("native {}", symbol));
                        }
                        FunctionBody::Intrinsic { name } => {
                            dot.node(Some(node), "", &format!("intrinsic {}", name));
                        }
                    }
                }
                ItemKind::Variable(decl) => syntax_var(&mut dot, module_node, decl),
                ItemKind::Import(import) => {
                    dot.node(Some(module_node), "", &format!("import {}", import.name));
                }
            }
        }
    }
    dot.finish()
}

fn syntax_block(dot: &mut Dot, parent: usize, role: &str, block: &Block) {
    let node = dot.node(Some(parent), role, "block");
    for stmt in &block.stmts {
        syntax_stmt(dot, node, stmt);
    }
}

fn syntax_var(dot: &mut Dot, parent: usize, decl: &VarDecl) {
    let keyword = if decl.is_const { "const" } else { "var" };
    let label = match &decl.ty {
        Some(ty) => format!("{} {}: {}", keyword, decl.name.name, ty.name),
        None => format!("{} {}", keyword, decl.name.name),
    };
    let node = dot.node(Some(parent), "", &label);
    if let Some(init) = &decl.init {
        syntax_expr(dot, node, "init", init);
    }
}

fn syntax_stmt(dot: &mut Dot, parent: usize, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Block(block) => syntax_block(dot, parent, "", block),
        StmtKind::Var(decl) => syntax_var(dot, parent, decl),
        StmtKind::Assign { target, op, value } => {
            let label = match op {
                Some(op) => format!("assign {} {}=", target.name, op),
                None => format!("assign {}", target.name),
            };
            let node = dot.node(Some(parent), "", &label);
            syntax_expr(dot, node, "value", value);
        }
        StmtKind::Expr(expr) => {
            let node = dot.node(Some(parent), "", "expression");
            syntax_expr(dot, node, "", expr);
        }
        StmtKind::If { branches, else_block } => {
            let node = dot.node(Some(parent), "", "if");
            for (cond, block) in branches {
                syntax_expr(dot, node, "condition", cond);
                syntax_block(dot, node, "then", block);
            }
            if let Some(block) = else_block {
                syntax_block(dot, node, "else", block);
            }
        }
        StmtKind::While { cond, body } => {
            let node = dot.node(Some(parent), "", "while");
            syntax_expr(dot, node, "condition", cond);
            syntax_block(dot, node, "body", body);
        }
        StmtKind::Loop { body } => {
            let node = dot.node(Some(parent), "", "loop");
            syntax_block(dot, node, "body", body);
        }
        StmtKind::For { var, start, end, body } => {
            let node = dot.node(Some(parent), "", &format!("for {}", var.name));
            syntax_expr(dot, node, "start", start);
            syntax_expr(dot, node, "end", end);
            syntax_block(dot, node, "body", body);
        }
        StmtKind::Return(value) => {
            let node = dot.node(Some(parent), "", "return");
            if let Some(value) = value {
                syntax_expr(dot, node, "value", value);
            }
        }
        StmtKind::Break => {
            dot.node(Some(parent), "", "break");
        }
        StmtKind::Continue => {
            dot.node(Some(parent), "", "continue");
        }
    }
}

fn syntax_expr(dot: &mut Dot, parent: usize, role: &str, expr: &Expr) {
    match &expr.kind {
        ExprKind::Integer { value, suffix } => {
            let suffix = suffix.as_ref().map_or("", |s| s.name.as_str());
            dot.node(Some(parent), role, &format!("integer {}{}", value, suffix));
        }
        ExprKind::Decimal(value) => {
            dot.node(Some(parent), role, &format!("decimal {}", value));
        }
        ExprKind::String(text) => {
            dot.node(Some(parent), role, &format!("string {:?}", text));
        }
        ExprKind::Bool(value) => {
            dot.node(Some(parent), role, &format!("bool {}", value));
        }
        ExprKind::Identifier(name) => {
            dot.node(Some(parent), role, &format!("identifier {}", name));
        }
        ExprKind::Unary { op, operand } => {
            let node = dot.node(Some(parent), role, &format!("unary {}", op));
            syntax_expr(dot, node, "operand", operand);
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let node = dot.node(Some(parent), role, &format!("binary {}", op));
            syntax_expr(dot, node, "lhs", lhs);
            syntax_expr(dot, node, "rhs", rhs);
        }
        ExprKind::Cast { expr, ty } => {
            let node = dot.node(Some(parent), role, &format!("cast {}", ty.name));
            syntax_expr(dot, node, "operand", expr);
        }
        ExprKind::Ternary { cond, then, otherwise } => {
            let node = dot.node(Some(parent), role, "ternary");
            syntax_expr(dot, node, "condition", cond);
            syntax_expr(dot, node, "then", then);
            syntax_expr(dot, node, "else", otherwise);
        }
        ExprKind::Call { callee, args } => {
            let node = dot.node(Some(parent), role, &format!("call {}", callee.name));
            for arg in args {
                syntax_expr(dot, node, "arg", arg);
            }
        }
    }
}

/// The bound tree of `program` in dot format. Expressions show their types.
pub fn bound_graph(name: &str, program: &BoundProgram) -> String {
    let mut dot = Dot::new(name, 'b');
    let root = dot.node(None, "", &format!("program {}", name));
    for global in &program.globals {
        let keyword = if global.is_const { "const" } else { "global" };
        let node = dot.node(Some(root), "", &format!("{} {}: {}", keyword, global.name, global.ty));
        if let Some(init) = &global.init {
            BoundWalk { program, function: None }.expr(&mut dot, node, "init", init);
        }
    }
    for function in &program.functions {
        let node = dot.node(Some(root), "", &format!("function {}: {}", function.name, function.return_type));
        let walk = BoundWalk {
            program,
            function: Some(function),
        };
        match &function.body {
            BoundBody::Block(block) => walk.block(&mut dot, node, "", block),
            BoundBody::Native { symbol } => {
                dot.node(Some(node), "", &format!("native {}", symbol));
            }
            BoundBody::Intrinsic(intrinsic) => {
                dot.node(Some(node), "", &format!("intrinsic {}", intrinsic.name()));
            }
        }
    }
    dot.finish()
}

/// Walks one function, or the global initialisers, of a bound program.
struct BoundWalk<'a> {
    program: &'a BoundProgram,
    function: Option<&'a BoundFunction>,
}

impl BoundWalk<'_> {
    fn local(&self, slot: usize) -> String {
        self.function
            .and_then(|f| f.locals.get(slot))
            .map_or_else(|| format!("#{}", slot), |l| l.name.clone())
    }

    fn binding(&self, binding: Binding) -> String {
        match binding {
            Binding::Local(slot) => self.local(slot),
            Binding::Global(id) => self
                .program
                .globals
                .get(id)
                .map_or_else(|| format!("#{}", id), |g| g.name.clone()),
        }
    }

    fn block(&self, dot: &mut Dot, parent: usize, role: &str, block: &BoundBlock) {
        let node = dot.node(Some(parent), role, "block");
        for stmt in &block.stmts {
            self.stmt(dot, node, stmt);
        }
    }

    fn stmt(&self, dot: &mut Dot, parent: usize, stmt: &BoundStmt) {
        match &stmt.kind {
            BoundStmtKind::Block(block) => self.block(dot, parent, "", block),
            BoundStmtKind::Assign { target, value } => {
                let node = dot.node(Some(parent), "", &format!("assign {}", self.binding(*target)));
                self.expr(dot, node, "value", value);
            }
            BoundStmtKind::Expr(expr) => {
                let node = dot.node(Some(parent), "", "expression");
                self.expr(dot, node, "", expr);
            }
            BoundStmtKind::If { branches, else_block } => {
                let node = dot.node(Some(parent), "", "if");
                for (cond, block) in branches {
                    self.expr(dot, node, "condition", cond);
                    self.block(dot, node, "then", block);
                }
                if let Some(block) = else_block {
                    self.block(dot, node, "else", block);
                }
            }
            BoundStmtKind::While { cond, body } => {
                let node = dot.node(Some(parent), "", "while");
                self.expr(dot, node, "condition", cond);
                self.block(dot, node, "body", body);
            }
            BoundStmtKind::Loop { body } => {
                let node = dot.node(Some(parent), "", "loop");
                self.block(dot, node, "body", body);
            }
            BoundStmtKind::For {
                var,
                limit,
                start,
                end,
                body,
            } => {
                let label = format!("for {} until {}", self.local(*var), self.local(*limit));
                let node = dot.node(Some(parent), "", &label);
                self.expr(dot, node, "start", start);
                self.expr(dot, node, "end", end);
                self.block(dot, node, "body", body);
            }
            BoundStmtKind::Return(value) => {
                let node = dot.node(Some(parent), "", "return");
                if let Some(value) = value {
                    self.expr(dot, node, "value", value);
                }
            }
            BoundStmtKind::Break => {
                dot.node(Some(parent), "", "break");
            }
            BoundStmtKind::Continue => {
                dot.node(Some(parent), "", "continue");
            }
        }
    }

    fn expr(&self, dot: &mut Dot, parent: usize, role: &str, expr: &BoundExpr) {
        let ty = expr.ty;
        match &expr.kind {
            BoundExprKind::Literal(datum) => {
                dot.node(Some(parent), role, &format!("literal {}: {}", datum, ty));
            }
            BoundExprKind::Variable(binding) => {
                dot.node(Some(parent), role, &format!("variable {}: {}", self.binding(*binding), ty));
            }
            BoundExprKind::Unary { op, operand } => {
                let node = dot.node(Some(parent), role, &format!("unary {}: {}", op, ty));
                self.expr(dot, node, "operand", operand);
            }
            BoundExprKind::Binary { op, lhs, rhs } => {
                let node = dot.node(Some(parent), role, &format!("binary {}: {}", op, ty));
                self.expr(dot, node, "lhs", lhs);
                self.expr(dot, node, "rhs", rhs);
            }
            BoundExprKind::Cast(inner) => {
                let node = dot.node(Some(parent), role, &format!("cast: {}", ty));
                self.expr(dot, node, "operand", inner);
            }
            BoundExprKind::Ternary { cond, then, otherwise } => {
                let node = dot.node(Some(parent), role, &format!("ternary: {}", ty));
                self.expr(dot, node, "condition", cond);
                self.expr(dot, node, "then", then);
                self.expr(dot, node, "else", otherwise);
            }
            BoundExprKind::Call { function, args } => {
                let callee = self
                    .program
                    .functions
                    .get(*function)
                    .map_or_else(|| format!("#{}", function), |f| f.name.clone());
                let node = dot.node(Some(parent), role, &format!("call {}: {}", callee, ty));
                for arg in args {
                    self.expr(dot, node, "arg", arg);
                }
            }
        }
    }
}

/// Write `graph` to `<dir>/<name>-<tree>.dot`.
pub fn write_graph(dir: &Path, name: &str, tree: &str, graph: &str) -> io::Result<PathBuf> {
    let path = dir.join(format!("{}-{}.dot", name, tree));
    std::fs::write(&path, graph)?;
    Ok(path)
}
