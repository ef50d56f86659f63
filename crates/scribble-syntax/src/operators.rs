//! Operator table driving precedence climbing.
//!
//! Each entry maps a token (kind + code) and an arity to a precedence rank,
//! an associativity and, for bracketing operators, the character that closes
//! the bracket. Higher ranks bind tighter.

use scribble_source::{Keyword, Token, TokenKind};
use scribble_types::{BinaryOp, UnaryOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Unary,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Binary(BinaryOp),
    Unary(UnaryOp),
    /// `e as type`: the right operand is a type.
    Cast,
    /// `c ? a : b`
    Ternary,
    /// `f(args)`
    Call,
    /// `(e)`
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator {
    pub kind: TokenKind,
    pub code: u32,
    pub arity: Arity,
    pub precedence: u8,
    pub associativity: Associativity,
    pub closing: Option<char>,
    pub op: OperatorKind,
}

const fn symbol(c: char, arity: Arity, precedence: u8, op: OperatorKind) -> Operator {
    Operator {
        kind: TokenKind::Symbol,
        code: c as u32,
        arity,
        precedence,
        associativity: Associativity::Left,
        closing: None,
        op,
    }
}

const fn keyword(k: Keyword, precedence: u8, op: BinaryOp) -> Operator {
    Operator {
        kind: TokenKind::Keyword,
        code: k as u32,
        arity: Arity::Binary,
        precedence,
        associativity: Associativity::Left,
        closing: None,
        op: OperatorKind::Binary(op),
    }
}

const fn binary(c: char, precedence: u8, op: BinaryOp) -> Operator {
    symbol(c, Arity::Binary, precedence, OperatorKind::Binary(op))
}

const fn unary(c: char, op: UnaryOp) -> Operator {
    symbol(c, Arity::Unary, PREFIX_PRECEDENCE, OperatorKind::Unary(op))
}

pub const PREFIX_PRECEDENCE: u8 = 14;

pub static OPERATORS: &[Operator] = &[
    Operator {
        associativity: Associativity::Right,
        ..symbol('?', Arity::Binary, 2, OperatorKind::Ternary)
    },
    keyword(Keyword::LogicalOr, 3, BinaryOp::Or),
    keyword(Keyword::LogicalAnd, 4, BinaryOp::And),
    binary('|', 5, BinaryOp::BitOr),
    binary('^', 6, BinaryOp::BitXor),
    binary('&', 7, BinaryOp::BitAnd),
    keyword(Keyword::Equals, 8, BinaryOp::Eq),
    keyword(Keyword::NotEqual, 8, BinaryOp::Ne),
    binary('<', 9, BinaryOp::Lt),
    binary('>', 9, BinaryOp::Gt),
    keyword(Keyword::LessEqual, 9, BinaryOp::Le),
    keyword(Keyword::GreaterEqual, 9, BinaryOp::Ge),
    keyword(Keyword::ShiftLeft, 10, BinaryOp::Shl),
    keyword(Keyword::ShiftRight, 10, BinaryOp::Shr),
    binary('+', 11, BinaryOp::Add),
    binary('-', 11, BinaryOp::Sub),
    binary('*', 12, BinaryOp::Mul),
    binary('/', 12, BinaryOp::Div),
    binary('%', 12, BinaryOp::Rem),
    Operator {
        kind: TokenKind::Keyword,
        code: Keyword::As as u32,
        ..symbol('\0', Arity::Binary, 13, OperatorKind::Cast)
    },
    unary('-', UnaryOp::Neg),
    unary('!', UnaryOp::Not),
    unary('~', UnaryOp::BitNot),
    Operator {
        closing: Some(')'),
        ..symbol('(', Arity::Binary, 15, OperatorKind::Call)
    },
    Operator {
        closing: Some(')'),
        ..symbol('(', Arity::Unary, 0, OperatorKind::Group)
    },
];

pub fn lookup(token: &Token, arity: Arity) -> Option<&'static Operator> {
    OPERATORS
        .iter()
        .find(|op| op.arity == arity && token.matches(op.kind, op.code))
}

/// Compound assignment keywords and the operator they apply.
pub fn compound_assignment(token: &Token) -> Option<BinaryOp> {
    if token.kind != TokenKind::Keyword {
        return None;
    }
    let op = match Keyword::from_code(token.code)? {
        Keyword::PlusAssign => BinaryOp::Add,
        Keyword::MinusAssign => BinaryOp::Sub,
        Keyword::MultAssign => BinaryOp::Mul,
        Keyword::DivAssign => BinaryOp::Div,
        Keyword::ModAssign => BinaryOp::Rem,
        Keyword::BinAndAssign => BinaryOp::BitAnd,
        Keyword::BinOrAssign => BinaryOp::BitOr,
        Keyword::BinXorAssign => BinaryOp::BitXor,
        Keyword::ShiftLeftAssign => BinaryOp::Shl,
        Keyword::ShiftRightAssign => BinaryOp::Shr,
        _ => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribble_source::Lexer;

    fn first_token(text: &str) -> Token {
        Lexer::scribble("test", text).lex()
    }

    #[test]
    fn test_lookup_distinguishes_arity() {
        let minus = first_token("-");
        assert_eq!(lookup(&minus, Arity::Binary).unwrap().op, OperatorKind::Binary(BinaryOp::Sub));
        assert_eq!(lookup(&minus, Arity::Unary).unwrap().op, OperatorKind::Unary(UnaryOp::Neg));
        let paren = first_token("(");
        assert_eq!(lookup(&paren, Arity::Binary).unwrap().closing, Some(')'));
        assert!(lookup(&first_token("!"), Arity::Binary).is_none());
    }

    #[test]
    fn test_ternary_is_right_associative() {
        let op = lookup(&first_token("?"), Arity::Binary).unwrap();
        assert_eq!(op.associativity, Associativity::Right);
    }
}
