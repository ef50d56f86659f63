use std::fmt;
use std::sync::Arc;

use miette::SourceSpan;
use serde::{Deserialize, Serialize};

/// Position of a token inside one source frame.
///
/// `index` is a byte offset into the frame's text, `line` and `column` are
/// 1-based and counted in characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenLocation {
    pub file: Arc<str>,
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

impl TokenLocation {
    pub fn new(file: impl Into<Arc<str>>, index: usize, line: usize, column: usize) -> Self {
        Self { file: file.into(), index, line, column }
    }

    /// Location of the first character of `file`.
    pub fn start_of(file: impl Into<Arc<str>>) -> Self {
        Self::new(file, 0, 1, 1)
    }

    /// A span of `len` bytes starting here, for miette labels.
    pub fn span(&self, len: usize) -> SourceSpan {
        SourceSpan::new(self.index.into(), len)
    }
}

impl Default for TokenLocation {
    fn default() -> Self {
        Self::start_of("<unknown>")
    }
}

impl fmt::Display for TokenLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
