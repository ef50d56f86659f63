use std::ffi::{c_char, CStr};

use rustc_hash::FxHashMap;
use scribble_native::*;
use scribble_types::{Datum, Signature, Type};

extern "C" fn add3(a: i64, b: i64, c: i64) -> i64 {
    a + b + c
}

extern "C" fn hypot2(x: f64, y: f64) -> f64 {
    (x * x + y * y).sqrt()
}

extern "C" fn length(s: *const c_char) -> i64 {
    // SAFETY: the bridge passes a NUL-terminated string.
    unsafe { CStr::from_ptr(s) }.to_bytes().len() as i64
}

extern "C" fn is_negative(x: i64) -> bool {
    x < 0
}

extern "C" fn first() -> i64 {
    1
}

extern "C" fn second() -> i64 {
    2
}

/// Serves symbols from in-process functions.
#[derive(Default)]
struct FakeLoader {
    images: FxHashMap<&'static str, Vec<(&'static str, usize)>>,
}

impl FakeLoader {
    fn with(mut self, image: &'static str, symbols: Vec<(&'static str, usize)>) -> Self {
        self.images.insert(image, symbols);
        self
    }
}

impl DynamicLoader for FakeLoader {
    type Library = &'static str;

    fn load(&self, path: &str) -> NativeResult<&'static str> {
        self.images
            .get_key_value(path)
            .map(|(k, _)| *k)
            .ok_or_else(|| NativeError::ImageNotFound {
                image: path.to_string(),
                reason: "unknown image".to_string(),
            })
    }

    fn resolve(&self, library: &&'static str, name: &str) -> NativeResult<RawSymbol> {
        self.images[library]
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, addr)| RawSymbol(*addr))
            .ok_or_else(|| NativeError::SymbolNotFound { name: name.to_string() })
    }

    fn candidates(&self, image: &str) -> Vec<String> {
        vec![image.to_string()]
    }
}

fn math_bridge() -> NativeBridge<FakeLoader> {
    let loader = FakeLoader::default().with(
        "math",
        vec![
            ("add3", add3 as usize),
            ("hypot2", hypot2 as usize),
            ("length", length as usize),
            ("is_negative", is_negative as usize),
        ],
    );
    let bridge = NativeBridge::new(loader);
    bridge.load_library("math").unwrap();
    bridge
}

fn sig(params: &[Type], ret: Type) -> Signature {
    Signature::new(params.to_vec(), ret)
}

#[test]
fn test_calls_by_argument_class() {
    let _ = env_logger::builder().is_test(true).try_init();
    let bridge = math_bridge();

    let sum = bridge.native_call(
        "add3",
        &[Datum::I64(1), Datum::I64(2), Datum::I64(-10)],
        &sig(&[Type::I64; 3], Type::I64),
    );
    assert_eq!(sum, Ok(Datum::I64(-7)));

    let h = bridge.native_call("hypot2", &[Datum::F64(3.0), Datum::F64(4.0)], &sig(&[Type::F64; 2], Type::F64));
    assert_eq!(h, Ok(Datum::F64(5.0)));

    let len = bridge.native_call("length", &[Datum::string("scribble")], &sig(&[Type::String], Type::I32));
    assert_eq!(len, Ok(Datum::I32(8)));

    let neg = bridge.native_call("is_negative", &[Datum::I64(-3)], &sig(&[Type::I64], Type::Bool));
    assert_eq!(neg, Ok(Datum::Bool(true)));
}

#[test]
fn test_second_call_hits_the_cache() {
    let bridge = math_bridge();
    let signature = sig(&[Type::I64; 3], Type::I64);
    let args = [Datum::I64(1), Datum::I64(1), Datum::I64(1)];

    bridge.native_call("add3", &args, &signature).unwrap();
    assert_eq!(bridge.resolution_count(), 1);
    bridge.native_call("add3", &args, &signature).unwrap();
    assert_eq!(bridge.resolution_count(), 1);
}

#[test]
fn test_library_cache_and_missing_image() {
    let bridge = math_bridge();
    let again = bridge.load_library("math").unwrap();
    assert_eq!(again.index(), 0);
    assert_eq!(bridge.loaded_libraries(), vec!["math".to_string()]);

    assert!(matches!(bridge.load_library("graphics"), Err(NativeError::ImageNotFound { image, .. }) if image == "graphics"));
}

#[test]
fn test_most_recently_loaded_library_wins() {
    let loader = FakeLoader::default()
        .with("old", vec![("pick", first as usize)])
        .with("new", vec![("pick", second as usize)]);
    let bridge = NativeBridge::new(loader);
    bridge.load_library("old").unwrap();
    bridge.load_library("new").unwrap();

    let function = bridge.resolve_function("pick").unwrap();
    assert_eq!(function.library, "new");
    assert_eq!(bridge.native_call("pick", &[], &sig(&[], Type::I64)), Ok(Datum::I64(2)));
}

#[test]
fn test_library_loaded_later_shadows_a_cached_symbol() {
    let loader = FakeLoader::default()
        .with("old", vec![("pick", first as usize)])
        .with("new", vec![("pick", second as usize)])
        .with("extra", vec![]);
    let bridge = NativeBridge::new(loader);
    bridge.load_library("old").unwrap();
    assert_eq!(bridge.native_call("pick", &[], &sig(&[], Type::I64)), Ok(Datum::I64(1)));

    bridge.load_library("new").unwrap();
    assert_eq!(bridge.resolve_function("pick").unwrap().library, "new");
    assert_eq!(bridge.native_call("pick", &[], &sig(&[], Type::I64)), Ok(Datum::I64(2)));

    // A newer library without the symbol is asked once, then skipped.
    bridge.load_library("extra").unwrap();
    let count = bridge.resolution_count();
    assert_eq!(bridge.resolve_function("pick").unwrap().library, "new");
    assert_eq!(bridge.resolution_count(), count + 1);
    assert_eq!(bridge.resolve_function("pick").unwrap().library, "new");
    assert_eq!(bridge.resolution_count(), count + 1);
}

#[test]
fn test_failures_are_errors() {
    let bridge = math_bridge();
    assert!(matches!(
        bridge.native_call("missing", &[], &sig(&[], Type::Void)),
        Err(NativeError::SymbolNotFound { .. })
    ));
    assert!(matches!(
        bridge.native_call("add3", &[Datum::I64(1)], &sig(&[Type::I64; 3], Type::I64)),
        Err(NativeError::ArityMismatch { expected: 3, found: 1, .. })
    ));
    assert!(matches!(
        bridge.native_call("add3", &[Datum::I64(1), Datum::F64(1.0)], &sig(&[Type::I64, Type::F64], Type::I64)),
        Err(NativeError::UnsupportedNativeType { .. })
    ));
    assert!(matches!(
        bridge.native_call("length", &[Datum::string("a\0b")], &sig(&[Type::String], Type::I32)),
        Err(NativeError::UnsupportedNativeType { .. })
    ));
}

#[cfg(unix)]
#[test]
fn test_process_image_exposes_libc() {
    let bridge = NativeBridge::new(SystemLoader);
    bridge.load_process_image().unwrap();
    let len = bridge.native_call("strlen", &[Datum::string("hello")], &sig(&[Type::String], Type::U64));
    assert_eq!(len, Ok(Datum::U64(5)));
    let abs = bridge.native_call("labs", &[Datum::I64(-42)], &sig(&[Type::I64], Type::I64));
    assert_eq!(abs, Ok(Datum::I64(42)));
}
