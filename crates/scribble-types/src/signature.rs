use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ty::Type;

/// Parameter and return types of a function, as seen by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Signature {
    pub params: Vec<Type>,
    pub ret: Type,
}

impl Signature {
    pub fn new(params: Vec<Type>, ret: Type) -> Self {
        Self { params, ret }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, "): {}", self.ret)
    }
}
