//! Platform dynamic loading behind a capability trait.

use libloading::Library;

use crate::error::{NativeError, NativeResult};

/// Address of a resolved symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawSymbol(pub usize);

impl RawSymbol {
    pub fn as_ptr(self) -> *const () {
        self.0 as *const ()
    }
}

/// The two operations the bridge needs from the platform.
pub trait DynamicLoader: Send + Sync {
    type Library: Send;

    /// Load the image at `path`.
    fn load(&self, path: &str) -> NativeResult<Self::Library>;

    /// Look `name` up in a loaded image.
    fn resolve(&self, library: &Self::Library, name: &str) -> NativeResult<RawSymbol>;

    /// The image of the running process, if the platform can provide it.
    fn load_process(&self) -> Option<Self::Library> {
        None
    }

    /// Paths tried, in order, when loading `image`.
    fn candidates(&self, image: &str) -> Vec<String> {
        platform_names(image)
    }
}

/// `image` itself, then the platform's conventional file name for a library
/// called `image`.
pub fn platform_names(image: &str) -> Vec<String> {
    let mut names = vec![image.to_string()];
    if image.contains(std::path::MAIN_SEPARATOR) || image.contains('.') {
        return names;
    }
    if cfg!(target_os = "windows") {
        names.push(format!("{}.dll", image));
    } else if cfg!(target_os = "macos") {
        names.push(format!("lib{}.dylib", image));
    } else {
        names.push(format!("lib{}.so", image));
    }
    names
}

/// Loads images with `libloading`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLoader;

impl DynamicLoader for SystemLoader {
    type Library = Library;

    fn load(&self, path: &str) -> NativeResult<Library> {
        // SAFETY: running a library's initialisers is the point of loading it.
        unsafe { Library::new(path) }.map_err(|err| NativeError::ImageNotFound {
            image: path.to_string(),
            reason: err.to_string(),
        })
    }

    fn resolve(&self, library: &Library, name: &str) -> NativeResult<RawSymbol> {
        // SAFETY: the address is only called through a signature the program
        // declared for it.
        let symbol = unsafe { library.get::<*const ()>(name.as_bytes()) }.map_err(|err| {
            log::trace!(target: "native", "'{}' not found: {}", name, err);
            NativeError::SymbolNotFound { name: name.to_string() }
        })?;
        Ok(RawSymbol(*symbol as usize))
    }

    #[cfg(unix)]
    fn load_process(&self) -> Option<Library> {
        Some(libloading::os::unix::Library::this().into())
    }

    #[cfg(windows)]
    fn load_process(&self) -> Option<Library> {
        libloading::os::windows::Library::this().ok().map(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_names() {
        let names = platform_names("m");
        assert_eq!(names[0], "m");
        assert_eq!(names.len(), 2);
        assert!(names[1].contains('m'));

        assert_eq!(platform_names("libm.so.6"), vec!["libm.so.6".to_string()]);
    }

    #[test]
    fn test_missing_image() {
        let err = SystemLoader.load("definitely-not-a-library-name").unwrap_err();
        assert!(matches!(err, NativeError::ImageNotFound { .. }));
    }
}
