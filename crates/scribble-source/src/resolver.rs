use std::path::{Path, PathBuf};

use fxhash::FxHashMap;

/// Text of a source named by an include or import, together with the
/// canonical name it is tracked under on the source stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub name: String,
    pub text: String,
}

/// Turns the name written in an include/import into source text.
pub trait SourceResolver: Send + Sync {
    /// `including` is the canonical name of the source containing the request.
    fn resolve(&self, name: &str, including: &str) -> Option<ResolvedSource>;
}

/// In-memory sources, keyed by exact name.
#[derive(Debug, Default, Clone)]
pub struct MemoryResolver {
    sources: FxHashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.insert(name, text);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.sources.insert(name.into(), text.into());
    }
}

impl SourceResolver for MemoryResolver {
    fn resolve(&self, name: &str, _including: &str) -> Option<ResolvedSource> {
        self.sources.get(name).map(|text| ResolvedSource {
            name: name.to_string(),
            text: text.clone(),
        })
    }
}

/// Filesystem sources. Looks next to the including file first, then in each
/// configured include path in order.
#[derive(Debug, Default, Clone)]
pub struct FileResolver {
    include_paths: Vec<PathBuf>,
}

impl FileResolver {
    pub fn new(include_paths: Vec<PathBuf>) -> Self {
        Self { include_paths }
    }

    fn candidates(&self, name: &str, including: &str) -> Vec<PathBuf> {
        let requested = Path::new(name);
        if requested.is_absolute() {
            return vec![requested.to_path_buf()];
        }
        let mut candidates = Vec::with_capacity(self.include_paths.len() + 1);
        if let Some(dir) = Path::new(including).parent() {
            candidates.push(dir.join(requested));
        }
        candidates.extend(self.include_paths.iter().map(|dir| dir.join(requested)));
        candidates
    }
}

impl SourceResolver for FileResolver {
    fn resolve(&self, name: &str, including: &str) -> Option<ResolvedSource> {
        for candidate in self.candidates(name, including) {
            if !candidate.is_file() {
                continue;
            }
            let canonical = candidate.canonicalize().unwrap_or_else(|_| candidate.clone());
            match std::fs::read_to_string(&candidate) {
                Ok(text) => {
                    return Some(ResolvedSource {
                        name: canonical.to_string_lossy().into_owned(),
                        text,
                    })
                }
                Err(err) => {
                    log::warn!(target: "parse", "could not read {}: {}", candidate.display(), err);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_resolver_prefers_including_directory() {
        let dir = tempfile::tempdir().unwrap();
        let lib_dir = dir.path().join("lib");
        std::fs::create_dir(&lib_dir).unwrap();
        std::fs::write(dir.path().join("util.scribble"), "local").unwrap();
        std::fs::write(lib_dir.join("util.scribble"), "library").unwrap();
        std::fs::write(lib_dir.join("only.scribble"), "only in lib").unwrap();

        let resolver = FileResolver::new(vec![lib_dir]);
        let main = dir.path().join("main.scribble");
        let including = main.to_string_lossy();

        let util = resolver.resolve("util.scribble", &including).unwrap();
        assert_eq!(util.text, "local");
        let only = resolver.resolve("only.scribble", &including).unwrap();
        assert_eq!(only.text, "only in lib");
        assert!(resolver.resolve("missing.scribble", &including).is_none());
    }
}
