use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use scribble_types::{Datum, Signature};

use crate::call;
use crate::error::{NativeError, NativeResult};
use crate::loader::{DynamicLoader, RawSymbol, SystemLoader};

/// Path under which the running process image is registered.
pub const PROCESS_IMAGE: &str = "<process>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryHandle {
    /// The path the image was loaded from.
    pub path: String,
    index: usize,
}

impl LibraryHandle {
    /// Position in load order, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHandle {
    pub name: String,
    pub library: String,
    pub symbol: RawSymbol,
}

struct LoadedLibrary<H> {
    path: String,
    handle: H,
    functions: FxHashMap<String, RawSymbol>,
    /// Names this library is known not to export.
    missing: FxHashSet<String>,
}

/// Registry of loaded libraries and the symbols resolved in them.
///
/// Both caches only grow. Resolution is serialised by one lock since the
/// platform loaders are not assumed to be re-entrant.
pub struct NativeBridge<L: DynamicLoader = SystemLoader> {
    loader: L,
    libraries: Mutex<Vec<LoadedLibrary<L::Library>>>,
    resolutions: AtomicUsize,
}

impl<L: DynamicLoader> NativeBridge<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            libraries: Mutex::new(Vec::new()),
            resolutions: AtomicUsize::new(0),
        }
    }

    /// How many times the loader was asked to resolve a symbol.
    pub fn resolution_count(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    pub fn loaded_libraries(&self) -> Vec<String> {
        self.libraries.lock().iter().map(|l| l.path.clone()).collect()
    }

    pub fn load_library(&self, image: &str) -> NativeResult<LibraryHandle> {
        let mut libraries = self.libraries.lock();
        let candidates = self.loader.candidates(image);
        for candidate in &candidates {
            if let Some(index) = libraries.iter().position(|l| &l.path == candidate) {
                return Ok(LibraryHandle {
                    path: candidate.clone(),
                    index,
                });
            }
        }

        let mut last_error = None;
        for candidate in candidates {
            match self.loader.load(&candidate) {
                Ok(handle) => {
                    log::debug!(target: "native", "loaded library {}", candidate);
                    libraries.push(LoadedLibrary {
                        path: candidate.clone(),
                        handle,
                        functions: FxHashMap::default(),
                        missing: FxHashSet::default(),
                    });
                    return Ok(LibraryHandle {
                        path: candidate,
                        index: libraries.len() - 1,
                    });
                }
                Err(err) => last_error = Some(err),
            }
        }
        Err(match last_error {
            Some(NativeError::ImageNotFound { reason, .. }) => NativeError::ImageNotFound {
                image: image.to_string(),
                reason,
            },
            Some(other) => other,
            None => NativeError::ImageNotFound {
                image: image.to_string(),
                reason: "no candidate paths".to_string(),
            },
        })
    }

    /// Register the image of the running process, so symbols of the C
    /// runtime the process links against can be resolved.
    pub fn load_process_image(&self) -> NativeResult<LibraryHandle> {
        let mut libraries = self.libraries.lock();
        if let Some(index) = libraries.iter().position(|l| l.path == PROCESS_IMAGE) {
            return Ok(LibraryHandle {
                path: PROCESS_IMAGE.to_string(),
                index,
            });
        }
        let handle = self.loader.load_process().ok_or_else(|| NativeError::ImageNotFound {
            image: PROCESS_IMAGE.to_string(),
            reason: "not supported on this platform".to_string(),
        })?;
        libraries.push(LoadedLibrary {
            path: PROCESS_IMAGE.to_string(),
            handle,
            functions: FxHashMap::default(),
            missing: FxHashSet::default(),
        });
        Ok(LibraryHandle {
            path: PROCESS_IMAGE.to_string(),
            index: libraries.len() - 1,
        })
    }

    /// Find `name`, most recently loaded library first. Each library
    /// remembers what it exports and what it lacks, so the loader is asked
    /// at most once per library and name.
    pub fn resolve_function(&self, name: &str) -> NativeResult<FunctionHandle> {
        let mut libraries = self.libraries.lock();
        for library in libraries.iter_mut().rev() {
            if let Some(&symbol) = library.functions.get(name) {
                return Ok(FunctionHandle {
                    name: name.to_string(),
                    library: library.path.clone(),
                    symbol,
                });
            }
            if library.missing.contains(name) {
                continue;
            }
            self.resolutions.fetch_add(1, Ordering::Relaxed);
            match self.loader.resolve(&library.handle, name) {
                Ok(symbol) => {
                    log::trace!(target: "native", "resolved {} in {}", name, library.path);
                    library.functions.insert(name.to_string(), symbol);
                    return Ok(FunctionHandle {
                        name: name.to_string(),
                        library: library.path.clone(),
                        symbol,
                    });
                }
                Err(NativeError::SymbolNotFound { .. }) => {
                    library.missing.insert(name.to_string());
                }
                Err(err) => return Err(err),
            }
        }
        Err(NativeError::SymbolNotFound { name: name.to_string() })
    }

    /// Resolve `name` and call it as a function of `signature`.
    pub fn native_call(&self, name: &str, args: &[Datum], signature: &Signature) -> NativeResult<Datum> {
        call::check_signature(name, signature)?;
        let function = self.resolve_function(name)?;
        self.call_resolved(&function, args, signature)
    }

    /// Call a function resolved earlier.
    pub fn call_resolved(&self, function: &FunctionHandle, args: &[Datum], signature: &Signature) -> NativeResult<Datum> {
        log::trace!(target: "native", "calling {}{}", function.name, signature);
        // SAFETY: the program declared `signature` for this symbol, and the
        // library stays loaded for the lifetime of the bridge.
        unsafe { call::call(&function.name, function.symbol, signature, args) }
    }
}
