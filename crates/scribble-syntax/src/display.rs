use std::fmt;

use crate::ast::{Expr, ExprKind};

/// S-expression rendering, mostly for tests and trace logs.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Integer { value, suffix: Some(ty) } => write!(f, "{}{}", value, ty.name),
            ExprKind::Integer { value, suffix: None } => write!(f, "{}", value),
            ExprKind::Decimal(v) => write!(f, "{:?}", v),
            ExprKind::String(s) => write!(f, "{:?}", s),
            ExprKind::Bool(b) => write!(f, "{}", b),
            ExprKind::Identifier(name) => f.write_str(name),
            ExprKind::Unary { op, operand } => write!(f, "({} {})", op, operand),
            ExprKind::Binary { op, lhs, rhs } => write!(f, "({} {} {})", op, lhs, rhs),
            ExprKind::Cast { expr, ty } => write!(f, "(as {} {})", expr, ty.name),
            ExprKind::Ternary { cond, then, otherwise } => write!(f, "(? {} {} {})", cond, then, otherwise),
            ExprKind::Call { callee, args } => {
                write!(f, "(call {}", callee.name)?;
                for arg in args {
                    write!(f, " {}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}
