//! # Scribble native bridge
//!
//! Lets Scribble programs call C functions in shared libraries:
//!
//! ```text
//! func strlen(s: string): u64 -> "strlen";
//! ```
//!
//! [`NativeBridge`] keeps a cache of loaded libraries keyed by path, and per
//! library a cache of resolved symbols keyed by name. Symbols are looked up
//! in the most recently loaded library first. Platform loading sits behind
//! the [`DynamicLoader`] trait; [`SystemLoader`] is the `libloading` backed
//! implementation.
//!
//! Sessions share [`NativeBridge::global`], which lives for the whole
//! process and starts out with the process image registered, so the C
//! runtime is always available.
//!
//! The argument conversion rules are described in [`call`].

pub mod call;
mod bridge;
mod error;
mod loader;

use once_cell::sync::Lazy;

pub use bridge::{FunctionHandle, LibraryHandle, NativeBridge, PROCESS_IMAGE};
pub use error::{NativeError, NativeResult};
pub use loader::{platform_names, DynamicLoader, RawSymbol, SystemLoader};

static GLOBAL_BRIDGE: Lazy<NativeBridge> = Lazy::new(|| {
    let bridge = NativeBridge::new(SystemLoader);
    if let Err(err) = bridge.load_process_image() {
        log::warn!(target: "native", "{}", err);
    }
    bridge
});

impl NativeBridge<SystemLoader> {
    /// The process-wide bridge.
    pub fn global() -> &'static NativeBridge {
        &GLOBAL_BRIDGE
    }
}
