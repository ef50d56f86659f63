//! Conversion of [`Datum`] arguments to the C calling convention.
//!
//! Integers of every width, booleans and pointers travel in integer
//! registers, widened to 64 bits. Strings are passed as NUL-terminated
//! `const char*` that live until the call returns. Floats travel as `double`.
//!
//! A call uses either only integer-class arguments (at most
//! [`MAX_INT_ARGS`]) or only float arguments (at most [`MAX_FLOAT_ARGS`]).
//! The result is void, an integer class or a float, narrowed back to the
//! declared return type.

use std::ffi::CString;

use scribble_types::{Datum, Signature, Type};

use crate::error::{NativeError, NativeResult};
use crate::loader::RawSymbol;

pub const MAX_INT_ARGS: usize = 6;
pub const MAX_FLOAT_ARGS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Int,
    Float,
}

fn class_of(ty: Type) -> Option<Class> {
    match ty {
        Type::F64 => Some(Class::Float),
        Type::String | Type::Pointer | Type::Bool => Some(Class::Int),
        t if t.is_integer() => Some(Class::Int),
        _ => None,
    }
}

/// Whether a function of this signature can be called at all.
pub fn check_signature(name: &str, signature: &Signature) -> NativeResult<()> {
    let mut classes = Vec::with_capacity(signature.params.len());
    for &param in &signature.params {
        classes.push(class_of(param).ok_or_else(|| NativeError::unsupported_type(name, param, "an argument"))?);
    }
    let floats = classes.iter().filter(|c| **c == Class::Float).count();
    if floats > 0 && floats < classes.len() {
        return Err(NativeError::unsupported(name, "integer and float arguments cannot be mixed"));
    }
    if floats > MAX_FLOAT_ARGS {
        return Err(NativeError::unsupported(name, format!("at most {} float arguments", MAX_FLOAT_ARGS)));
    }
    if floats == 0 && classes.len() > MAX_INT_ARGS {
        return Err(NativeError::unsupported(name, format!("at most {} integer arguments", MAX_INT_ARGS)));
    }
    match signature.ret {
        Type::Void => Ok(()),
        Type::String => Err(NativeError::unsupported_type(name, Type::String, "a result")),
        ret if class_of(ret).is_some() => Ok(()),
        ret => Err(NativeError::unsupported_type(name, ret, "a result")),
    }
}

fn widen(datum: &Datum) -> Option<i64> {
    match datum {
        Datum::Bool(b) => Some(*b as i64),
        Datum::Pointer(p) => Some(*p as i64),
        Datum::U64(v) => Some(*v as i64),
        other => other.as_i128().map(|v| v as i64),
    }
}

fn narrow(ret: Type, raw: i64) -> Datum {
    match ret {
        Type::Bool => Datum::Bool(raw & 0xff != 0),
        Type::Pointer => Datum::Pointer(raw as usize),
        Type::U64 => Datum::U64(raw as u64),
        ty => Datum::from_i128_wrapping(ty, raw as i128),
    }
}

/// Call `symbol` as a function of `signature`.
///
/// # Safety
///
/// `symbol` must be the address of a C function whose actual signature is
/// compatible with `signature` under the rules of this module.
pub unsafe fn call(name: &str, symbol: RawSymbol, signature: &Signature, args: &[Datum]) -> NativeResult<Datum> {
    if args.len() != signature.params.len() {
        return Err(NativeError::ArityMismatch {
            name: name.to_string(),
            expected: signature.params.len(),
            found: args.len(),
        });
    }
    check_signature(name, signature)?;
    for (arg, &param) in args.iter().zip(&signature.params) {
        if arg.type_of() != param {
            return Err(NativeError::unsupported(
                name,
                format!("expected a {} argument, got {}", param, arg.type_of()),
            ));
        }
    }

    let addr = symbol.as_ptr();
    let ret = signature.ret;
    let float_call = !args.is_empty() && args.iter().all(|a| matches!(a, Datum::F64(_)));

    if float_call {
        let floats: Vec<f64> = args.iter().filter_map(Datum::as_f64).collect();
        let result = match class_of(ret) {
            None => call_floats_void(addr, &floats).map(|()| Datum::Void),
            Some(Class::Int) => call_floats_int(addr, &floats).map(|v| narrow(ret, v)),
            Some(Class::Float) => call_floats_float(addr, &floats).map(Datum::F64),
        };
        return result.ok_or_else(|| NativeError::unsupported(name, "too many float arguments"));
    }

    // Keeps the C strings alive until the call has returned.
    let mut strings = Vec::new();
    let mut ints = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Datum::String(s) => {
                let c = CString::new(s.as_bytes())
                    .map_err(|_| NativeError::unsupported(name, "string argument contains a NUL byte"))?;
                ints.push(c.as_ptr() as i64);
                strings.push(c);
            }
            other => ints.push(widen(other).ok_or_else(|| NativeError::unsupported_type(name, other.type_of(), "an argument"))?),
        }
    }
    let result = match class_of(ret) {
        None => call_ints_void(addr, &ints).map(|()| Datum::Void),
        Some(Class::Int) => call_ints_int(addr, &ints).map(|v| narrow(ret, v)),
        Some(Class::Float) => call_ints_float(addr, &ints).map(Datum::F64),
    };
    drop(strings);
    result.ok_or_else(|| NativeError::unsupported(name, "too many integer arguments"))
}

macro_rules! int_caller {
    ($name:ident, $ret:ty) => {
        unsafe fn $name(addr: *const (), a: &[i64]) -> Option<$ret> {
            use std::mem::transmute;
            let r = match *a {
                [] => transmute::<*const (), unsafe extern "C" fn() -> $ret>(addr)(),
                [a0] => transmute::<*const (), unsafe extern "C" fn(i64) -> $ret>(addr)(a0),
                [a0, a1] => transmute::<*const (), unsafe extern "C" fn(i64, i64) -> $ret>(addr)(a0, a1),
                [a0, a1, a2] => transmute::<*const (), unsafe extern "C" fn(i64, i64, i64) -> $ret>(addr)(a0, a1, a2),
                [a0, a1, a2, a3] => {
                    transmute::<*const (), unsafe extern "C" fn(i64, i64, i64, i64) -> $ret>(addr)(a0, a1, a2, a3)
                }
                [a0, a1, a2, a3, a4] => transmute::<*const (), unsafe extern "C" fn(i64, i64, i64, i64, i64) -> $ret>(
                    addr,
                )(a0, a1, a2, a3, a4),
                [a0, a1, a2, a3, a4, a5] => transmute::<
                    *const (),
                    unsafe extern "C" fn(i64, i64, i64, i64, i64, i64) -> $ret,
                >(addr)(a0, a1, a2, a3, a4, a5),
                _ => return None,
            };
            Some(r)
        }
    };
}

macro_rules! float_caller {
    ($name:ident, $ret:ty) => {
        unsafe fn $name(addr: *const (), a: &[f64]) -> Option<$ret> {
            use std::mem::transmute;
            let r = match *a {
                [a0] => transmute::<*const (), unsafe extern "C" fn(f64) -> $ret>(addr)(a0),
                [a0, a1] => transmute::<*const (), unsafe extern "C" fn(f64, f64) -> $ret>(addr)(a0, a1),
                [a0, a1, a2] => transmute::<*const (), unsafe extern "C" fn(f64, f64, f64) -> $ret>(addr)(a0, a1, a2),
                [a0, a1, a2, a3] => {
                    transmute::<*const (), unsafe extern "C" fn(f64, f64, f64, f64) -> $ret>(addr)(a0, a1, a2, a3)
                }
                _ => return None,
            };
            Some(r)
        }
    };
}

int_caller!(call_ints_void, ());
int_caller!(call_ints_int, i64);
int_caller!(call_ints_float, f64);
float_caller!(call_floats_void, ());
float_caller!(call_floats_int, i64);
float_caller!(call_floats_float, f64);

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(params: &[Type], ret: Type) -> Signature {
        Signature::new(params.to_vec(), ret)
    }

    #[test]
    fn test_check_signature() {
        assert!(check_signature("f", &sig(&[Type::I32, Type::String, Type::Pointer], Type::U8)).is_ok());
        assert!(check_signature("f", &sig(&[Type::F64; 4], Type::F64)).is_ok());
        assert!(check_signature("f", &sig(&[Type::I64; 7], Type::Void)).is_err());
        assert!(check_signature("f", &sig(&[Type::F64; 5], Type::Void)).is_err());
        assert!(check_signature("f", &sig(&[Type::F64, Type::I32], Type::Void)).is_err());
        assert!(check_signature("f", &sig(&[], Type::String)).is_err());
    }

    #[test]
    fn test_narrowing() {
        assert_eq!(narrow(Type::I8, 0x1ff), Datum::I8(-1));
        assert_eq!(narrow(Type::U16, -1), Datum::U16(u16::MAX));
        assert_eq!(narrow(Type::Bool, 0x7f00), Datum::Bool(false));
        assert_eq!(narrow(Type::U64, -1), Datum::U64(u64::MAX));
        assert_eq!(widen(&Datum::I8(-2)), Some(-2));
        assert_eq!(widen(&Datum::U64(u64::MAX)), Some(-1));
    }
}
