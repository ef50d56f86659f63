use scribble_source::{Keyword, Lexer, NumberKind, Token, TokenKind};
use scribble_types::{BinaryOp, Type};

use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::operators::{compound_assignment, lookup, Arity, Associativity, Operator, OperatorKind};

/// Default for how deeply blocks and expressions may nest.
pub const DEFAULT_MAX_NESTING: usize = 128;

/// Recursive-descent parser over one source.
///
/// Failures inside a block are recorded and the parser skips to the next `;`
/// (consumed) or `}` (left for the block) before carrying on. Failures in an
/// item skip to the next top-level keyword. Lexical errors are folded into
/// the same list, in source order.
///
/// Nesting is limited: blocks, bracketed and unary operands and chained
/// operators each count a level, and going past the limit is a
/// [`ParseError::TooDeep`] for the statement instead of unbounded recursion.
pub struct Parser {
    lexer: Lexer,
    errors: Vec<ParseError>,
    next_id: NodeId,
    nesting: usize,
    max_nesting: usize,
}

fn is_item_start(token: &Token) -> bool {
    [Keyword::Func, Keyword::Var, Keyword::Const, Keyword::Import]
        .iter()
        .any(|k| token.is_keyword(k.code()))
}

impl Parser {
    pub fn new(lexer: Lexer) -> Self {
        Self::starting_at(lexer, 0)
    }

    /// A parser whose node ids start at `next_id`, so ids stay unique across
    /// the modules of one program.
    pub fn starting_at(lexer: Lexer, next_id: NodeId) -> Self {
        Self {
            lexer,
            errors: Vec::new(),
            next_id,
            nesting: 0,
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }

    pub fn with_max_nesting(mut self, max_nesting: usize) -> Self {
        self.max_nesting = max_nesting;
        self
    }

    /// Errors so far, and the next unused node id.
    pub fn finish(mut self) -> (Vec<ParseError>, NodeId) {
        self.drain_lex_errors();
        (self.errors, self.next_id)
    }

    pub fn parse_module(&mut self, name: &str) -> Module {
        let mut items = Vec::new();
        loop {
            self.drain_lex_errors();
            let token = self.lexer.peek().clone();
            if token.is_eof() {
                break;
            }
            if !is_item_start(&token) {
                self.record(ParseError::Expected {
                    expected: "'func', 'var', 'const' or 'import'".to_string(),
                    found: token.describe(),
                    span: token.location.span(token.len.max(1)),
                    location: token.location.clone(),
                });
                self.lexer.lex();
                self.synchronize_item();
                continue;
            }
            match self.parse_item() {
                Ok(item) => items.push(item),
                Err(err) => {
                    self.record(err);
                    self.synchronize_item();
                }
            }
        }
        self.drain_lex_errors();
        log::debug!(target: "parse", "parsed module {} ({} items)", name, items.len());
        Module {
            name: name.to_string(),
            items,
        }
    }

    /// Parse a single expression; used for one-off evaluation.
    pub fn parse_standalone_expression(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_expression()?;
        self.lexer.expect_kind(TokenKind::EndOfFile)?;
        Ok(expr)
    }

    fn id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn drain_lex_errors(&mut self) {
        self.errors.extend(self.lexer.take_errors().into_iter().map(ParseError::from));
    }

    fn record(&mut self, err: ParseError) {
        self.drain_lex_errors();
        log::trace!(target: "parse", "{}", err);
        self.errors.push(err);
    }

    /// Run `parse` one nesting level deeper.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.nesting >= self.max_nesting {
            return Err(self.too_deep());
        }
        self.nesting += 1;
        let result = parse(self);
        self.nesting -= 1;
        result
    }

    fn too_deep(&mut self) -> ParseError {
        let token = self.lexer.peek();
        ParseError::TooDeep {
            limit: self.max_nesting,
            location: token.location.clone(),
            span: token.location.span(token.len.max(1)),
        }
    }

    fn synchronize_item(&mut self) {
        let mut depth = 0usize;
        loop {
            let token = self.lexer.peek();
            if token.is_eof() || (depth == 0 && is_item_start(token)) {
                return;
            }
            if token.is_symbol('{') {
                depth += 1;
            } else if token.is_symbol('}') {
                depth = depth.saturating_sub(1);
            }
            self.lexer.lex();
        }
    }

    fn synchronize_statement(&mut self) {
        let mut depth = 0usize;
        loop {
            let token = self.lexer.peek();
            if token.is_eof() {
                return;
            }
            if token.is_symbol('}') {
                if depth == 0 {
                    return;
                }
                depth -= 1;
            } else if token.is_symbol('{') {
                depth += 1;
            } else if token.is_symbol(';') && depth == 0 {
                self.lexer.lex();
                return;
            }
            self.lexer.lex();
        }
    }

    fn expected(&mut self, expected: &str) -> ParseError {
        let token = self.lexer.peek();
        ParseError::Expected {
            expected: expected.to_string(),
            found: token.describe(),
            location: token.location.clone(),
            span: token.location.span(token.len.max(1)),
        }
    }

    fn parse_ident(&mut self) -> ParseResult<Ident> {
        let token = self.lexer.expect_identifier()?;
        Ok(Ident {
            name: token.text.clone(),
            token,
        })
    }

    fn parse_type(&mut self) -> ParseResult<TypeName> {
        let token = self.lexer.expect_identifier()?;
        Ok(TypeName {
            name: token.text.clone(),
            token,
        })
    }

    fn parse_item(&mut self) -> ParseResult<Item> {
        let token = self.lexer.peek().clone();
        let id = self.id();
        let kind = match Keyword::from_code(token.code) {
            Some(Keyword::Func) => ItemKind::Function(self.parse_function()?),
            Some(Keyword::Import) => {
                self.lexer.lex();
                let name = match self.lexer.peek().kind {
                    TokenKind::QuotedString => self.lexer.lex().text,
                    _ => self.parse_ident()?.name,
                };
                self.lexer.expect_symbol(';')?;
                ItemKind::Import(Import {
                    name,
                    token: token.clone(),
                })
            }
            _ => ItemKind::Variable(self.parse_var_decl()?),
        };
        Ok(Item { id, token, kind })
    }

    fn parse_function(&mut self) -> ParseResult<Function> {
        self.lexer.expect_keyword(Keyword::Func.code())?;
        let name = self.parse_ident()?;
        self.lexer.expect_symbol('(')?;
        let mut params = Vec::new();
        if !self.lexer.accept_symbol(')') {
            loop {
                let name = self.parse_ident()?;
                self.lexer.expect_symbol(':')?;
                let ty = self.parse_type()?;
                params.push(Param { name, ty });
                if self.lexer.accept_symbol(',') {
                    continue;
                }
                self.lexer.expect_symbol(')')?;
                break;
            }
        }
        let return_type = if self.lexer.accept_symbol(':') {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.lexer.peek().is_symbol('{') {
            FunctionBody::Block(self.parse_block()?)
        } else if self.lexer.accept_keyword(Keyword::Arrow.code()) {
            let symbol = self.lexer.expect_kind(TokenKind::QuotedString)?.text;
            self.lexer.expect_symbol(';')?;
            FunctionBody::Native { symbol }
        } else if self.lexer.accept_keyword(Keyword::WideArrow.code()) {
            let name = self.lexer.expect_kind(TokenKind::QuotedString)?.text;
            self.lexer.expect_symbol(';')?;
            FunctionBody::Intrinsic { name }
        } else {
            return Err(self.expected("function body, '->' or '=>'"));
        };

        Ok(Function {
            name,
            params,
            return_type,
            body,
        })
    }

    fn parse_var_decl(&mut self) -> ParseResult<VarDecl> {
        let token = self.lexer.lex();
        let is_const = token.is_keyword(Keyword::Const.code());
        if !is_const && !token.is_keyword(Keyword::Var.code()) {
            return Err(ParseError::Expected {
                expected: "'var' or 'const'".to_string(),
                found: token.describe(),
                span: token.location.span(token.len.max(1)),
                location: token.location,
            });
        }
        let id = self.id();
        let name = self.parse_ident()?;
        let ty = if self.lexer.accept_symbol(':') {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.lexer.accept_symbol('=') {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.lexer.expect_symbol(';')?;
        Ok(VarDecl {
            id,
            token,
            name,
            ty,
            init,
            is_const,
        })
    }

    fn parse_block(&mut self) -> ParseResult<Block> {
        self.nested(Self::parse_block_contents)
    }

    fn parse_block_contents(&mut self) -> ParseResult<Block> {
        let token = self.lexer.expect_symbol('{')?;
        let id = self.id();
        let mut stmts = Vec::new();
        loop {
            let next = self.lexer.peek();
            if next.is_symbol('}') || next.is_eof() {
                break;
            }
            match self.parse_statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    self.record(err);
                    self.synchronize_statement();
                }
            }
        }
        self.lexer.expect_symbol('}')?;
        Ok(Block { id, token, stmts })
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        let token = self.lexer.peek().clone();
        let kind = if token.is_symbol('{') {
            StmtKind::Block(self.parse_block()?)
        } else if token.kind == TokenKind::Keyword {
            match Keyword::from_code(token.code) {
                Some(Keyword::Var) | Some(Keyword::Const) => StmtKind::Var(self.parse_var_decl()?),
                Some(Keyword::If) => self.parse_if()?,
                Some(Keyword::While) => {
                    self.lexer.lex();
                    let cond = self.parse_expression()?;
                    let body = self.parse_block()?;
                    StmtKind::While { cond, body }
                }
                Some(Keyword::Loop) => {
                    self.lexer.lex();
                    StmtKind::Loop {
                        body: self.parse_block()?,
                    }
                }
                Some(Keyword::For) => {
                    self.lexer.lex();
                    let var = self.parse_ident()?;
                    self.lexer.expect_keyword(Keyword::In.code())?;
                    let start = self.parse_expression()?;
                    self.lexer.expect_keyword(Keyword::Range.code())?;
                    let end = self.parse_expression()?;
                    let body = self.parse_block()?;
                    StmtKind::For { var, start, end, body }
                }
                Some(Keyword::Return) => {
                    self.lexer.lex();
                    let value = if self.lexer.peek().is_symbol(';') {
                        None
                    } else {
                        Some(self.parse_expression()?)
                    };
                    self.lexer.expect_symbol(';')?;
                    StmtKind::Return(value)
                }
                Some(Keyword::Break) => {
                    self.lexer.lex();
                    self.lexer.expect_symbol(';')?;
                    StmtKind::Break
                }
                Some(Keyword::Continue) => {
                    self.lexer.lex();
                    self.lexer.expect_symbol(';')?;
                    StmtKind::Continue
                }
                _ => self.parse_expression_statement()?,
            }
        } else if token.kind == TokenKind::Identifier {
            match self.parse_assignment()? {
                Some(kind) => kind,
                None => self.parse_expression_statement()?,
            }
        } else {
            self.parse_expression_statement()?
        };
        let id = self.id();
        Ok(Stmt { id, token, kind })
    }

    fn parse_expression_statement(&mut self) -> ParseResult<StmtKind> {
        let expr = self.parse_expression()?;
        self.lexer.expect_symbol(';')?;
        Ok(StmtKind::Expr(expr))
    }

    /// `x = e;`, `x op= e;`, `x++;` or `x--;`. `None` when the identifier
    /// starts some other statement.
    fn parse_assignment(&mut self) -> ParseResult<Option<StmtKind>> {
        let next = self.lexer.peek_nth(1).clone();
        let step = if next.is_keyword(Keyword::Increment.code()) {
            Some(BinaryOp::Add)
        } else if next.is_keyword(Keyword::Decrement.code()) {
            Some(BinaryOp::Sub)
        } else {
            None
        };
        let op = compound_assignment(&next);
        if !next.is_symbol('=') && op.is_none() && step.is_none() {
            return Ok(None);
        }
        let target = self.parse_ident()?;
        let operator = self.lexer.lex();
        let value = match step {
            Some(_) => Expr {
                id: self.id(),
                token: operator,
                kind: ExprKind::Integer { value: 1, suffix: None },
            },
            None => self.parse_expression()?,
        };
        self.lexer.expect_symbol(';')?;
        Ok(Some(StmtKind::Assign {
            target,
            op: op.or(step),
            value,
        }))
    }

    fn parse_if(&mut self) -> ParseResult<StmtKind> {
        self.lexer.expect_keyword(Keyword::If.code())?;
        let mut branches = vec![(self.parse_expression()?, self.parse_block()?)];
        let mut else_block = None;
        loop {
            if self.lexer.accept_keyword(Keyword::Elif.code()) {
                branches.push((self.parse_expression()?, self.parse_block()?));
            } else if self.lexer.accept_keyword(Keyword::Else.code()) {
                if self.lexer.accept_keyword(Keyword::If.code()) {
                    branches.push((self.parse_expression()?, self.parse_block()?));
                    continue;
                }
                else_block = Some(self.parse_block()?);
                break;
            } else {
                break;
            }
        }
        Ok(StmtKind::If { branches, else_block })
    }

    pub(crate) fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.nested(|parser| {
            let lhs = parser.parse_primary()?;
            parser.parse_expression_1(lhs, 0)
        })
    }

    fn parse_expression_1(&mut self, lhs: Expr, min_precedence: u8) -> ParseResult<Expr> {
        self.nested(|parser| parser.climb(lhs, min_precedence))
    }

    /// Precedence climbing over the operator table. Every operator applied
    /// here deepens the tree, so a chain counts against the nesting limit.
    fn climb(&mut self, mut lhs: Expr, min_precedence: u8) -> ParseResult<Expr> {
        let mut chain = 0;
        loop {
            let token = self.lexer.peek().clone();
            let op = match lookup(&token, Arity::Binary) {
                Some(op) if op.precedence >= min_precedence => op,
                _ => return Ok(lhs),
            };
            chain += 1;
            if self.nesting + chain > self.max_nesting {
                return Err(self.too_deep());
            }
            self.lexer.lex();
            let id = self.id();
            lhs = match op.op {
                OperatorKind::Call => {
                    let callee = match lhs.kind {
                        ExprKind::Identifier(name) => Ident { name, token: lhs.token },
                        _ => {
                            return Err(ParseError::NotCallable {
                                span: lhs.token.location.span(lhs.token.len.max(1)),
                                location: lhs.token.location,
                            })
                        }
                    };
                    let args = self.parse_arguments(op.closing.unwrap_or(')'))?;
                    Expr {
                        id,
                        token: callee.token.clone(),
                        kind: ExprKind::Call { callee, args },
                    }
                }
                OperatorKind::Cast => {
                    let ty = self.parse_type()?;
                    Expr {
                        id,
                        token,
                        kind: ExprKind::Cast { expr: Box::new(lhs), ty },
                    }
                }
                OperatorKind::Ternary => {
                    let then = self.parse_expression()?;
                    self.lexer.expect_symbol(':')?;
                    let otherwise = self.parse_primary()?;
                    let otherwise = self.parse_expression_1(otherwise, op.precedence)?;
                    Expr {
                        id,
                        token,
                        kind: ExprKind::Ternary {
                            cond: Box::new(lhs),
                            then: Box::new(then),
                            otherwise: Box::new(otherwise),
                        },
                    }
                }
                OperatorKind::Binary(binary) => {
                    let mut rhs = self.parse_primary()?;
                    loop {
                        let next = self.lexer.peek().clone();
                        match lookup(&next, Arity::Binary) {
                            Some(n) if n.precedence > op.precedence => {
                                rhs = self.parse_expression_1(rhs, op.precedence + 1)?;
                            }
                            Some(n) if n.precedence == op.precedence && n.associativity == Associativity::Right => {
                                rhs = self.parse_expression_1(rhs, op.precedence)?;
                            }
                            _ => break,
                        }
                    }
                    Expr {
                        id,
                        token,
                        kind: ExprKind::Binary {
                            op: binary,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                    }
                }
                OperatorKind::Unary(_) | OperatorKind::Group => return Ok(lhs),
            };
        }
    }

    fn parse_arguments(&mut self, closing: char) -> ParseResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.lexer.accept_symbol(closing) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.lexer.accept_symbol(',') {
                continue;
            }
            self.lexer.expect_symbol(closing)?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        self.nested(Self::parse_operand)
    }

    fn parse_operand(&mut self) -> ParseResult<Expr> {
        let token = self.lexer.peek().clone();
        if let Some(op) = lookup(&token, Arity::Unary) {
            self.lexer.lex();
            return match op.op {
                OperatorKind::Group => {
                    let inner = self.parse_expression()?;
                    self.lexer.expect_symbol(op.closing.unwrap_or(')'))?;
                    // Calls need a bare function name, not a parenthesised one.
                    if matches!(
                        lookup(self.lexer.peek(), Arity::Binary),
                        Some(Operator {
                            op: OperatorKind::Call,
                            ..
                        })
                    ) {
                        return Err(ParseError::NotCallable {
                            span: token.location.span(1),
                            location: token.location,
                        });
                    }
                    Ok(inner)
                }
                OperatorKind::Unary(unary) => {
                    let operand = self.parse_primary()?;
                    let operand = self.parse_expression_1(operand, op.precedence)?;
                    Ok(Expr {
                        id: self.id(),
                        token,
                        kind: ExprKind::Unary {
                            op: unary,
                            operand: Box::new(operand),
                        },
                    })
                }
                _ => Err(self.expected("expression")),
            };
        }

        let kind = match token.kind {
            TokenKind::Number => {
                self.lexer.lex();
                self.parse_number(&token)?
            }
            TokenKind::QuotedString if !token.terminated => {
                self.lexer.lex();
                return Err(ParseError::InvalidLiteral {
                    text: token.text.clone(),
                    reason: "unterminated string".to_string(),
                    span: token.location.span(token.len.max(1)),
                    location: token.location,
                });
            }
            TokenKind::QuotedString => ExprKind::String(self.lexer.lex().text),
            TokenKind::Identifier => ExprKind::Identifier(self.lexer.lex().text),
            TokenKind::Keyword if token.is_keyword(Keyword::True.code()) => {
                self.lexer.lex();
                ExprKind::Bool(true)
            }
            TokenKind::Keyword if token.is_keyword(Keyword::False.code()) => {
                self.lexer.lex();
                ExprKind::Bool(false)
            }
            _ => return Err(self.expected("expression")),
        };
        Ok(Expr {
            id: self.id(),
            token,
            kind,
        })
    }

    fn parse_number(&mut self, token: &Token) -> ParseResult<ExprKind> {
        let invalid = |reason: String| ParseError::InvalidLiteral {
            text: token.text.clone(),
            reason,
            location: token.location.clone(),
            span: token.location.span(token.len.max(1)),
        };
        let radix = match token.number_kind() {
            Some(NumberKind::Decimal) => {
                let value = token.text.parse::<f64>().map_err(|e| invalid(e.to_string()))?;
                return Ok(ExprKind::Decimal(value));
            }
            Some(NumberKind::Hex) => 16,
            Some(NumberKind::Binary) => 2,
            _ => 10,
        };
        let value = i128::from_str_radix(&token.text, radix).map_err(|e| invalid(e.to_string()))?;
        let next = self.lexer.peek();
        let suffix = if next.kind == TokenKind::Identifier && Type::from_name(&next.text).is_some() {
            let token = self.lexer.lex();
            Some(TypeName {
                name: token.text.clone(),
                token,
            })
        } else {
            None
        };
        Ok(ExprKind::Integer { value, suffix })
    }
}
