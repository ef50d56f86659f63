use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DatumError, DatumResult};
use crate::ops::{BinaryOp, UnaryOp};
use crate::ty::Type;

/// A runtime value.
///
/// Integer arithmetic wraps at the width of the operand type. Shift amounts
/// are taken modulo the width. Both operands of a binary operator must have
/// the same type; the binder inserts the casts that make this so.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Datum {
    Void,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F64(f64),
    String(Arc<str>),
    Pointer(usize),
}

impl Datum {
    pub fn type_of(&self) -> Type {
        match self {
            Datum::Void => Type::Void,
            Datum::Bool(_) => Type::Bool,
            Datum::I8(_) => Type::I8,
            Datum::I16(_) => Type::I16,
            Datum::I32(_) => Type::I32,
            Datum::I64(_) => Type::I64,
            Datum::U8(_) => Type::U8,
            Datum::U16(_) => Type::U16,
            Datum::U32(_) => Type::U32,
            Datum::U64(_) => Type::U64,
            Datum::F64(_) => Type::F64,
            Datum::String(_) => Type::String,
            Datum::Pointer(_) => Type::Pointer,
        }
    }

    pub fn string(s: impl AsRef<str>) -> Datum {
        Datum::String(Arc::from(s.as_ref()))
    }

    /// The zero value of `ty`, used to initialise locals and globals.
    pub fn default_for(ty: Type) -> Datum {
        match ty {
            Type::Void => Datum::Void,
            Type::Bool => Datum::Bool(false),
            Type::F64 => Datum::F64(0.0),
            Type::String => Datum::string(""),
            Type::Pointer => Datum::Pointer(0),
            int => Datum::from_i128_wrapping(int, 0),
        }
    }

    /// Truncate `value` to the width of integer type `ty`.
    pub fn from_i128_wrapping(ty: Type, value: i128) -> Datum {
        match ty {
            Type::I8 => Datum::I8(value as i8),
            Type::I16 => Datum::I16(value as i16),
            Type::I32 => Datum::I32(value as i32),
            Type::I64 => Datum::I64(value as i64),
            Type::U8 => Datum::U8(value as u8),
            Type::U16 => Datum::U16(value as u16),
            Type::U32 => Datum::U32(value as u32),
            Type::U64 => Datum::U64(value as u64),
            _ => Datum::I64(value as i64),
        }
    }

    /// An integer literal of type `ty`, rejected when it does not fit.
    pub fn integer_literal(ty: Type, value: i128) -> DatumResult<Datum> {
        if ty.int_fits(value) {
            Ok(Datum::from_i128_wrapping(ty, value))
        } else {
            Err(DatumError::LiteralOutOfRange {
                value: value.to_string(),
                ty,
            })
        }
    }

    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Datum::I8(v) => Some(v as i128),
            Datum::I16(v) => Some(v as i128),
            Datum::I32(v) => Some(v as i128),
            Datum::I64(v) => Some(v as i128),
            Datum::U8(v) => Some(v as i128),
            Datum::U16(v) => Some(v as i128),
            Datum::U32(v) => Some(v as i128),
            Datum::U64(v) => Some(v as i128),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Datum::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Datum::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Condition value: booleans as-is, numbers are true when non-zero.
    pub fn truthy(&self) -> bool {
        match self {
            Datum::Void => false,
            Datum::Bool(b) => *b,
            Datum::F64(f) => *f != 0.0,
            Datum::String(s) => !s.is_empty(),
            Datum::Pointer(p) => *p != 0,
            int => int.as_i128().map_or(false, |v| v != 0),
        }
    }

    pub fn cast(&self, to: Type) -> DatumResult<Datum> {
        let from = self.type_of();
        if from == to {
            return Ok(self.clone());
        }
        let invalid = || DatumError::InvalidCast { from, to };
        match (self, to) {
            (_, Type::String) => Ok(Datum::string(self.to_string())),
            (Datum::Bool(b), t) if t.is_integer() => Ok(Datum::from_i128_wrapping(t, *b as i128)),
            (Datum::Bool(b), Type::F64) => Ok(Datum::F64(if *b { 1.0 } else { 0.0 })),
            (Datum::F64(f), t) if t.is_integer() => {
                let v = if t.is_signed() { *f as i64 as i128 } else { *f as u64 as i128 };
                Ok(Datum::from_i128_wrapping(t, v))
            }
            (Datum::F64(f), Type::Bool) => Ok(Datum::Bool(*f != 0.0)),
            (Datum::Pointer(p), t) if t.is_integer() => Ok(Datum::from_i128_wrapping(t, *p as i128)),
            (d, t) => match d.as_i128() {
                Some(v) if t.is_integer() => Ok(Datum::from_i128_wrapping(t, v)),
                Some(v) if t == Type::F64 => Ok(Datum::F64(v as f64)),
                Some(v) if t == Type::Bool => Ok(Datum::Bool(v != 0)),
                Some(v) if t == Type::Pointer => Ok(Datum::Pointer(v as usize)),
                _ => Err(invalid()),
            },
        }
    }

    pub fn unary(op: UnaryOp, operand: &Datum) -> DatumResult<Datum> {
        let ty = operand.type_of();
        let mismatch = || DatumError::OperandMismatch {
            op: op.to_string(),
            lhs: ty,
            rhs: ty,
        };
        match (op, operand) {
            (UnaryOp::Not, Datum::Bool(b)) => Ok(Datum::Bool(!b)),
            (UnaryOp::Neg, Datum::F64(f)) => Ok(Datum::F64(-f)),
            (UnaryOp::Neg, d) => d
                .as_i128()
                .map(|v| Datum::from_i128_wrapping(ty, -v))
                .ok_or_else(mismatch),
            (UnaryOp::BitNot, d) => d
                .as_i128()
                .map(|v| Datum::from_i128_wrapping(ty, !v))
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        }
    }

    pub fn binary(op: BinaryOp, lhs: &Datum, rhs: &Datum) -> DatumResult<Datum> {
        let ty = lhs.type_of();
        let mismatch = || DatumError::OperandMismatch {
            op: op.to_string(),
            lhs: ty,
            rhs: rhs.type_of(),
        };
        if rhs.type_of() != ty {
            return Err(mismatch());
        }
        if let (Some(a), Some(b)) = (lhs.as_i128(), rhs.as_i128()) {
            return integer_binary(op, ty, a, b).ok_or_else(mismatch)?;
        }
        match (lhs, rhs) {
            (Datum::F64(a), Datum::F64(b)) => {
                let v = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Rem => a % b,
                    op if op.is_comparison() => {
                        let result = a.partial_cmp(b).map_or(op == BinaryOp::Ne, |ord| compare(op, ord));
                        return Ok(Datum::Bool(result));
                    }
                    _ => return Err(mismatch()),
                };
                Ok(Datum::F64(v))
            }
            (Datum::Bool(a), Datum::Bool(b)) => match op {
                BinaryOp::And | BinaryOp::BitAnd => Ok(Datum::Bool(*a && *b)),
                BinaryOp::Or | BinaryOp::BitOr => Ok(Datum::Bool(*a || *b)),
                BinaryOp::BitXor => Ok(Datum::Bool(a != b)),
                op if op.is_comparison() => Ok(Datum::Bool(compare(op, a.cmp(b)))),
                _ => Err(mismatch()),
            },
            (Datum::String(a), Datum::String(b)) => match op {
                BinaryOp::Add => Ok(Datum::string(format!("{}{}", a, b))),
                op if op.is_comparison() => Ok(Datum::Bool(compare(op, a.cmp(b)))),
                _ => Err(mismatch()),
            },
            (Datum::Pointer(a), Datum::Pointer(b)) => match op {
                BinaryOp::Eq | BinaryOp::Ne => Ok(Datum::Bool(compare(op, a.cmp(b)))),
                _ => Err(mismatch()),
            },
            _ => Err(mismatch()),
        }
    }
}

fn compare(op: BinaryOp, ord: Ordering) -> bool {
    match op {
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::Ne => ord != Ordering::Equal,
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Gt => ord == Ordering::Greater,
        BinaryOp::Ge => ord != Ordering::Less,
        _ => false,
    }
}

/// `None` when `op` is not an integer operator.
fn integer_binary(op: BinaryOp, ty: Type, a: i128, b: i128) -> Option<DatumResult<Datum>> {
    let bits = ty.int_width().unwrap_or(64);
    let wrap = |v: i128| Datum::from_i128_wrapping(ty, v);
    let v = match op {
        BinaryOp::Add => wrap(a + b),
        BinaryOp::Sub => wrap(a - b),
        BinaryOp::Mul => wrap(a.wrapping_mul(b)),
        BinaryOp::Div | BinaryOp::Rem if b == 0 => return Some(Err(DatumError::DivisionByZero)),
        BinaryOp::Div => wrap(a / b),
        BinaryOp::Rem => wrap(a % b),
        BinaryOp::BitAnd => wrap(a & b),
        BinaryOp::BitOr => wrap(a | b),
        BinaryOp::BitXor => wrap(a ^ b),
        BinaryOp::Shl => wrap(a << (b.rem_euclid(bits as i128) as u32)),
        BinaryOp::Shr => wrap(a >> (b.rem_euclid(bits as i128) as u32)),
        op if op.is_comparison() => Datum::Bool(compare(op, a.cmp(&b))),
        _ => return None,
    };
    Some(Ok(v))
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Void => f.write_str("void"),
            Datum::Bool(b) => write!(f, "{}", b),
            Datum::F64(v) => write!(f, "{}", v),
            Datum::String(s) => f.write_str(s),
            Datum::Pointer(p) => write!(f, "{:#x}", p),
            int => match int.as_i128() {
                Some(v) => write!(f, "{}", v),
                None => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_wraps_at_width() {
        let v = Datum::binary(BinaryOp::Add, &Datum::U8(250), &Datum::U8(10)).unwrap();
        assert_eq!(v, Datum::U8(4));
        let v = Datum::binary(BinaryOp::Sub, &Datum::I8(-128), &Datum::I8(1)).unwrap();
        assert_eq!(v, Datum::I8(127));
        let v = Datum::unary(UnaryOp::Neg, &Datum::I32(5)).unwrap();
        assert_eq!(v, Datum::I32(-5));
    }

    #[test]
    fn test_division_by_zero() {
        let err = Datum::binary(BinaryOp::Div, &Datum::I32(1), &Datum::I32(0)).unwrap_err();
        assert_eq!(err, DatumError::DivisionByZero);
    }

    #[test]
    fn test_shifts() {
        assert_eq!(
            Datum::binary(BinaryOp::Shl, &Datum::U8(1), &Datum::U8(9)).unwrap(),
            Datum::U8(2)
        );
        assert_eq!(
            Datum::binary(BinaryOp::Shr, &Datum::I32(-8), &Datum::I32(1)).unwrap(),
            Datum::I32(-4)
        );
    }

    #[test]
    fn test_mixed_operands_are_rejected() {
        let err = Datum::binary(BinaryOp::Add, &Datum::I32(1), &Datum::I64(1)).unwrap_err();
        assert!(matches!(err, DatumError::OperandMismatch { .. }));
    }

    #[test]
    fn test_comparisons_and_strings() {
        assert_eq!(
            Datum::binary(BinaryOp::Lt, &Datum::F64(1.5), &Datum::F64(2.0)).unwrap(),
            Datum::Bool(true)
        );
        assert_eq!(
            Datum::binary(BinaryOp::Add, &Datum::string("ab"), &Datum::string("c")).unwrap(),
            Datum::string("abc")
        );
    }

    #[test]
    fn test_casts() {
        assert_eq!(Datum::I32(300).cast(Type::U8).unwrap(), Datum::U8(44));
        assert_eq!(Datum::F64(2.9).cast(Type::I32).unwrap(), Datum::I32(2));
        assert_eq!(Datum::U8(7).cast(Type::F64).unwrap(), Datum::F64(7.0));
        assert_eq!(Datum::I32(12).cast(Type::String).unwrap(), Datum::string("12"));
        assert!(Datum::string("x").cast(Type::I32).is_err());
    }

    #[test]
    fn test_integer_literal_range() {
        assert_eq!(Datum::integer_literal(Type::U8, 255).unwrap(), Datum::U8(255));
        assert!(Datum::integer_literal(Type::U8, 256).is_err());
    }
}
