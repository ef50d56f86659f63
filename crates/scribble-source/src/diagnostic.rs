//! Stage-independent diagnostics.
//!
//! Every stage has its own error enum; before errors leave a stage they are
//! flattened into [`Diagnostic`] values. Those are what the engine collects,
//! what travels over the wire and what the frontend renders through miette
//! with [`Report`].

use std::fmt;

use miette::{LabeledSpan, Severity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::location::TokenLocation;

/// A flattened, serialisable diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub location: Option<TokenLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(code: impl Into<String>, message: impl Into<String>, location: Option<TokenLocation>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            location,
            help: None,
        }
    }

    /// Flatten any miette diagnostic, attaching `location`.
    pub fn from_error<E>(error: &E, location: Option<TokenLocation>) -> Self
    where
        E: miette::Diagnostic + ?Sized,
    {
        Self {
            code: error.code().map(|c| c.to_string()).unwrap_or_else(|| "scribble::error".to_string()),
            message: error.to_string(),
            location,
            help: error.help().map(|h| h.to_string()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// A diagnostic paired with the text of the source it points into, ready to
/// be rendered by miette.
#[derive(Debug, Clone, Error)]
pub struct Report {
    pub source_code: String,
    pub diagnostic: Diagnostic,
}

impl Report {
    pub fn new(source_code: impl Into<String>, diagnostic: Diagnostic) -> Self {
        Self {
            source_code: source_code.into(),
            diagnostic,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.diagnostic.message)
    }
}

impl miette::Diagnostic for Report {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic.code))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Error)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let location = self.diagnostic.location.as_ref()?;
        let rest = self.source_code.get(location.index..)?;
        let len = rest.find(char::is_whitespace).unwrap_or(rest.len()).max(1).min(rest.len());
        let span = LabeledSpan::at(location.span(len), "here");
        Some(Box::new(std::iter::once(span)))
    }
}
