//! Whole-program parsing: a root source plus every module it imports.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scribble_source::{FileResolver, Lexer, LexerOptions, SourceResolver, TokenLocation};

use crate::ast::{ItemKind, Module, NodeId, Program};
use crate::error::ParseError;
use crate::parser::{Parser, DEFAULT_MAX_NESTING};

pub const SOURCE_EXTENSION: &str = "scribble";

/// Everything the parser needs from the session configuration.
#[derive(Clone)]
pub struct ParseOptions {
    /// Finds included and imported sources. When parsing from disk and no
    /// resolver is given, a [`FileResolver`] over `include_paths` is used.
    pub resolver: Option<Arc<dyn SourceResolver>>,
    pub include_paths: Vec<PathBuf>,
    pub lexer: LexerOptions,
    pub max_nesting: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            resolver: None,
            include_paths: Vec::new(),
            lexer: LexerOptions::default(),
            max_nesting: DEFAULT_MAX_NESTING,
        }
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("resolver", &self.resolver.is_some())
            .field("include_paths", &self.include_paths)
            .field("lexer", &self.lexer)
            .field("max_nesting", &self.max_nesting)
            .finish()
    }
}

/// Parse `text` and its imports.
pub fn parse_text(name: &str, text: &str, options: &ParseOptions) -> (Program, Vec<ParseError>) {
    let mut session = ProgramParser::new(options.clone());
    session.parse_root(name, text);
    session.finish()
}

/// Parse a file, or every `.scribble` file directly inside a directory, and
/// their imports.
pub fn parse_target(path: &Path, options: &ParseOptions) -> (Program, Vec<ParseError>) {
    let mut options = options.clone();
    if options.resolver.is_none() {
        options.resolver = Some(Arc::new(FileResolver::new(options.include_paths.clone())));
    }
    let mut session = ProgramParser::new(options);

    let files = if path.is_dir() {
        match source_files(path) {
            Ok(files) => files,
            Err(err) => {
                session.errors.push(io_error(path, &err));
                return session.finish();
            }
        }
    } else {
        vec![path.to_path_buf()]
    };

    for file in files {
        let name = file.canonicalize().unwrap_or_else(|_| file.clone());
        match std::fs::read_to_string(&file) {
            Ok(text) => session.parse_root(&name.to_string_lossy(), &text),
            Err(err) => session.errors.push(io_error(&file, &err)),
        }
    }
    session.finish()
}

fn io_error(path: &Path, err: &std::io::Error) -> ParseError {
    ParseError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

fn source_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == SOURCE_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

struct ProgramParser {
    options: ParseOptions,
    modules: Vec<Module>,
    errors: Vec<ParseError>,
    next_id: NodeId,
    seen: HashSet<String>,
}

impl ProgramParser {
    fn new(options: ParseOptions) -> Self {
        Self {
            options,
            modules: Vec::new(),
            errors: Vec::new(),
            next_id: 0,
            seen: HashSet::new(),
        }
    }

    fn parse_root(&mut self, name: &str, text: &str) {
        if self.seen.contains(name) {
            return;
        }
        let mut pending = VecDeque::new();
        self.parse_module(name, text, &mut pending);
        while let Some((import, including, location)) = pending.pop_front() {
            let file = if Path::new(&import).extension().is_some() {
                import.clone()
            } else {
                format!("{}.{}", import, SOURCE_EXTENSION)
            };
            let resolved = self
                .options
                .resolver
                .as_ref()
                .and_then(|r| r.resolve(&file, &including));
            match resolved {
                Some(source) => {
                    if !self.seen.contains(&source.name) {
                        self.parse_module(&source.name, &source.text, &mut pending);
                    }
                }
                None => self.errors.push(ParseError::ImportNotFound { name: import, location }),
            }
        }
    }

    fn parse_module(&mut self, name: &str, text: &str, pending: &mut VecDeque<(String, String, TokenLocation)>) {
        self.seen.insert(name.to_string());
        let mut lexer = Lexer::scribble(name, text).with_options(self.options.lexer);
        if let Some(resolver) = &self.options.resolver {
            lexer = lexer.with_resolver(Arc::clone(resolver));
        }
        let mut parser = Parser::starting_at(lexer, self.next_id).with_max_nesting(self.options.max_nesting);
        let module = parser.parse_module(name);
        let (errors, next_id) = parser.finish();
        self.next_id = next_id;
        self.errors.extend(errors);

        for item in &module.items {
            if let ItemKind::Import(import) = &item.kind {
                pending.push_back((import.name.clone(), name.to_string(), import.token.location.clone()));
            }
        }
        self.modules.push(module);
    }

    fn finish(self) -> (Program, Vec<ParseError>) {
        log::debug!(
            target: "parse",
            "parsed {} module(s) with {} error(s)",
            self.modules.len(),
            self.errors.len()
        );
        (Program { modules: self.modules }, self.errors)
    }
}
