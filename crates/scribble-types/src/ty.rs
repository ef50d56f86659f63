use std::fmt;

use serde::{Deserialize, Serialize};

/// A Scribble type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    /// No value
    #[default]
    Void,
    /// Boolean
    Bool,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Unsigned 64-bit integer
    U64,
    /// 64-bit floating point
    F64,
    /// Immutable string
    String,
    /// Opaque pointer, only produced and consumed by native functions
    Pointer,
}

impl Type {
    /// Integer literals without a width suffix get this type.
    pub const DEFAULT_INT: Type = Type::I32;

    pub fn from_name(name: &str) -> Option<Type> {
        let ty = match name {
            "void" => Type::Void,
            "bool" => Type::Bool,
            "i8" => Type::I8,
            "i16" => Type::I16,
            "i32" | "int" => Type::I32,
            "i64" => Type::I64,
            "u8" | "byte" => Type::U8,
            "u16" => Type::U16,
            "u32" => Type::U32,
            "u64" => Type::U64,
            "f64" | "float" => Type::F64,
            "string" => Type::String,
            "pointer" => Type::Pointer,
            _ => return None,
        };
        Some(ty)
    }

    pub fn name(self) -> &'static str {
        match self {
            Type::Void => "void",
            Type::Bool => "bool",
            Type::I8 => "i8",
            Type::I16 => "i16",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::U8 => "u8",
            Type::U16 => "u16",
            Type::U32 => "u32",
            Type::U64 => "u64",
            Type::F64 => "f64",
            Type::String => "string",
            Type::Pointer => "pointer",
        }
    }

    pub fn is_integer(self) -> bool {
        self.int_width().is_some()
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Type::I8 | Type::I16 | Type::I32 | Type::I64)
    }

    pub fn is_float(self) -> bool {
        self == Type::F64
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Width in bits of an integer type.
    pub fn int_width(self) -> Option<u32> {
        match self {
            Type::I8 | Type::U8 => Some(8),
            Type::I16 | Type::U16 => Some(16),
            Type::I32 | Type::U32 => Some(32),
            Type::I64 | Type::U64 => Some(64),
            _ => None,
        }
    }

    /// Whether `value` is representable in this integer type.
    pub fn int_fits(self, value: i128) -> bool {
        match (self.int_width(), self.is_signed()) {
            (Some(bits), true) => {
                let max = (1i128 << (bits - 1)) - 1;
                (-max - 1..=max).contains(&value)
            }
            (Some(bits), false) => (0..=(1i128 << bits) - 1).contains(&value),
            (None, _) => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_fits() {
        assert!(Type::U8.int_fits(255));
        assert!(!Type::U8.int_fits(256));
        assert!(!Type::U8.int_fits(-1));
        assert!(Type::I8.int_fits(-128));
        assert!(!Type::I8.int_fits(128));
        assert!(Type::U64.int_fits(u64::MAX as i128));
    }

    #[test]
    fn test_names_round_trip() {
        for ty in [Type::Bool, Type::I16, Type::U64, Type::F64, Type::String, Type::Pointer] {
            assert_eq!(Type::from_name(ty.name()), Some(ty));
        }
        assert_eq!(Type::from_name("int"), Some(Type::I32));
    }
}
