//! Session configuration.
//!
//! An [`EngineConfig`] is built once when a session starts and is shared
//! (behind an `Arc`) by every stage of that session. It is assembled from
//! three layers, later ones winning:
//!
//! 1. [`EngineConfig::default`],
//! 2. an optional TOML file, see [`EngineConfig::from_file`],
//! 3. options collected in an [`OptionStore`], either `--key[=value]` flags
//!    given to the backend process or `key[=value]` command arguments.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use scribble_source::DEFAULT_MAX_INCLUDE_DEPTH;
use scribble_syntax::{ParseOptions, DEFAULT_MAX_NESTING};

use crate::machine::DEFAULT_MAX_CALL_DEPTH;

/// Name of the configuration file looked for next to a program.
pub const CONFIG_FILE_NAME: &str = "scribble.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Emit stage messages for every stage, not just the terminal one.
    pub debug: bool,
    pub trace: bool,
    /// Run the linked executable (EXECUTE) instead of interpreting the IR
    /// directly (INTERPRET).
    pub execute: bool,
    /// Log the IR listing after the INTERMEDIATE stage.
    pub list_ir: bool,
    /// Directory the syntax and bound trees are written to, as Graphviz
    /// files, after PARSE and BIND.
    pub graph: Option<PathBuf>,
    pub include_paths: Vec<PathBuf>,
    /// Shared libraries loaded into the native bridge before linking.
    pub libraries: Vec<String>,
    pub entry_point: String,
    pub max_include_depth: usize,
    /// How deeply blocks and expressions may nest before the parser gives up.
    pub max_nesting: usize,
    /// Frames the machine may hold before a call fails with a stack overflow.
    pub max_call_depth: usize,
    /// Run the backend in a thread of the frontend process.
    pub threaded: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            trace: false,
            execute: false,
            list_ir: false,
            graph: None,
            include_paths: Vec::new(),
            libraries: Vec::new(),
            entry_point: "main".to_string(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            max_nesting: DEFAULT_MAX_NESTING,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            threaded: false,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_owned(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content, path)
    }

    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            message: e.message().to_string(),
        })
    }

    /// Apply `options` on top of this configuration. Every option that could
    /// not be applied is reported; the others still take effect.
    pub fn with_options(mut self, options: &OptionStore) -> (Self, Vec<ConfigError>) {
        let mut errors = Vec::new();
        for (key, value) in options.iter() {
            if let Err(err) = self.apply(key, value) {
                errors.push(err);
            }
        }
        (self, errors)
    }

    /// The options that turn [`EngineConfig::default`] into this
    /// configuration.
    pub fn to_options(&self) -> OptionStore {
        let defaults = Self::default();
        let mut options = OptionStore::new();
        let flags = [
            ("debug", self.debug),
            ("trace", self.trace),
            ("execute", self.execute),
            ("list-ir", self.list_ir),
            ("threaded", self.threaded),
        ];
        for (key, set) in flags {
            if set {
                options.set(key, None);
            }
        }
        for path in &self.include_paths {
            options.set("include", Some(path.display().to_string()));
        }
        for library in &self.libraries {
            options.set("library", Some(library.clone()));
        }
        if self.entry_point != defaults.entry_point {
            options.set("entry", Some(self.entry_point.clone()));
        }
        if self.max_include_depth != defaults.max_include_depth {
            options.set("max-include-depth", Some(self.max_include_depth.to_string()));
        }
        if self.max_nesting != defaults.max_nesting {
            options.set("max-nesting", Some(self.max_nesting.to_string()));
        }
        if self.max_call_depth != defaults.max_call_depth {
            options.set("max-call-depth", Some(self.max_call_depth.to_string()));
        }
        if let Some(dir) = &self.graph {
            options.set("graph", Some(dir.display().to_string()));
        }
        options
    }

    fn apply(&mut self, key: &str, value: Option<&str>) -> Result<(), ConfigError> {
        match key {
            "debug" => self.debug = flag(key, value)?,
            "trace" => self.trace = flag(key, value)?,
            "execute" => self.execute = flag(key, value)?,
            "list-ir" => self.list_ir = flag(key, value)?,
            "threaded" => self.threaded = flag(key, value)?,
            "include" => self.include_paths.push(PathBuf::from(required(key, value)?)),
            "library" => self.libraries.push(required(key, value)?.to_string()),
            "entry" => self.entry_point = required(key, value)?.to_string(),
            "max-include-depth" => self.max_include_depth = number(key, value)?,
            "max-nesting" => self.max_nesting = number(key, value)?,
            "max-call-depth" => self.max_call_depth = number(key, value)?,
            "graph" => self.graph = Some(PathBuf::from(value.filter(|v| !v.is_empty()).unwrap_or("."))),
            _ => return Err(ConfigError::UnknownOption { key: key.to_string() }),
        }
        Ok(())
    }

    /// Parser settings derived from this configuration.
    pub fn parse_options(&self) -> ParseOptions {
        let mut options = ParseOptions {
            include_paths: self.include_paths.clone(),
            max_nesting: self.max_nesting,
            ..ParseOptions::default()
        };
        options.lexer.max_include_depth = self.max_include_depth;
        options
    }
}

fn flag(key: &str, value: Option<&str>) -> Result<bool, ConfigError> {
    match value {
        None => Ok(true),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: other.to_string(),
            expected: "a boolean",
        }),
    }
}

fn required<'a>(key: &str, value: Option<&'a str>) -> Result<&'a str, ConfigError> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| ConfigError::MissingValue { key: key.to_string() })
}

fn number<T: FromStr>(key: &str, value: Option<&str>) -> Result<T, ConfigError> {
    let value = required(key, value)?;
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: "a number",
    })
}

/// Raw `key[=value]` options, in the order they were given.
///
/// Keys that may repeat (`include`, `library`) keep every occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionStore {
    values: IndexMap<String, Vec<Option<String>>>,
}

impl OptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect `--key[=value]` flags. Anything not starting with `--` is
    /// returned as a positional argument.
    pub fn from_flags<I, S>(args: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = Self::new();
        let mut positional = Vec::new();
        for arg in args {
            let arg = arg.as_ref();
            match arg.strip_prefix("--") {
                Some(option) if !option.is_empty() => store.insert_pair(option),
                _ => positional.push(arg.to_string()),
            }
        }
        (store, positional)
    }

    /// Collect `key[=value]` pairs, as carried by command arguments.
    pub fn from_pairs<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = Self::new();
        for arg in args {
            store.insert_pair(arg.as_ref());
        }
        store
    }

    fn insert_pair(&mut self, pair: &str) {
        match pair.split_once('=') {
            Some((key, value)) => self.set(key, Some(value.to_string())),
            None => self.set(pair, None),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) {
        self.values.entry(key.into()).or_default().push(value);
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The last value given for `key`. `Some(None)` means the key was given
    /// without a value.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.values.get(key)?.last().map(|v| v.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every occurrence of every key, in insertion order of the keys.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.values
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.as_str(), v.as_deref())))
    }

    /// Render back to `key[=value]` pairs.
    pub fn to_pairs(&self) -> Vec<String> {
        self.iter()
            .map(|(key, value)| match value {
                Some(value) => format!("{}={}", key, value),
                None => key.to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read configuration at {}: {message}", path.display())]
    #[diagnostic(code(scribble::config::io))]
    Io { path: PathBuf, message: String },

    #[error("failed to parse configuration at {}: {message}", path.display())]
    #[diagnostic(code(scribble::config::parse))]
    Parse { path: PathBuf, message: String },

    #[error("unknown option '{key}'")]
    #[diagnostic(
        code(scribble::config::unknown_option),
        help(
            "known options: debug, trace, execute, list-ir, threaded, include, library, entry, \
             max-include-depth, max-nesting, max-call-depth, graph"
        )
    )]
    UnknownOption { key: String },

    #[error("option '{key}' needs a value")]
    #[diagnostic(code(scribble::config::missing_value))]
    MissingValue { key: String },

    #[error("invalid value '{value}' for option '{key}', expected {expected}")]
    #[diagnostic(code(scribble::config::invalid_value))]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },
}
