//! Foreign function interface.
//!
//! A foreign call resolves its name against the builtin registry (the
//! stock `MidoriStdLib` surface implemented in-process) and falls back
//! to a C-linkage symbol in `./MidoriStdLib.{so,dylib,dll}` with the
//! signature `fn(*const ForeignValue, *mut ForeignValue)`. The library
//! is opened once, on the first call the registry cannot satisfy; a
//! symbol that resolves nowhere is a fatal runtime error.

use std::ffi::{c_char, CStr, CString};
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;

use libloading::Library;

use crate::error::RuntimeError;

use super::value::{Traceable, Value};
use super::Vm;

#[cfg(target_os = "windows")]
const LIBRARY_PATH: &str = "./MidoriStdLib.dll";
#[cfg(target_os = "macos")]
const LIBRARY_PATH: &str = "./MidoriStdLib.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIBRARY_PATH: &str = "./MidoriStdLib.so";

type BuiltinFn = fn(&mut Vm, &[Value]) -> Result<Value, String>;

static BUILTINS: Lazy<std::collections::HashMap<&'static str, BuiltinFn>> = Lazy::new(|| {
    let mut table: std::collections::HashMap<&'static str, BuiltinFn> =
        std::collections::HashMap::new();
    table.insert("Print", builtin_print);
    table.insert("GetTime", builtin_get_time);
    table.insert("OverwriteToFile", builtin_overwrite_to_file);
    table.insert("AppendToFile", builtin_append_to_file);
    table
});

/// Scalar/text view of a [`Value`] passed across the C ABI.
///
/// `tag` selects the live field: 0 unit, 1 integer, 2 fraction,
/// 3 bool, 4 text. Text is a borrowed NUL-terminated pointer valid for
/// the duration of the call; a text return must point at storage the
/// callee keeps alive until the next call into it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ForeignValue {
    pub tag: u8,
    pub integer: i64,
    pub fraction: f64,
    pub boolean: bool,
    pub text: *const c_char,
}

impl ForeignValue {
    fn unit() -> Self {
        Self {
            tag: 0,
            integer: 0,
            fraction: 0.0,
            boolean: false,
            text: std::ptr::null(),
        }
    }
}

type ForeignSymbol = unsafe extern "C" fn(*const ForeignValue, *mut ForeignValue);

/// Lazily opened handle to the shared standard library.
#[derive(Debug, Default)]
pub struct ForeignInterface {
    library: Option<Library>,
    load_attempted: bool,
}

impl ForeignInterface {
    pub fn new() -> Self {
        Self::default()
    }

    fn library(&mut self) -> Option<&Library> {
        if !self.load_attempted {
            self.load_attempted = true;
            // Missing library only matters once a non-builtin symbol is
            // actually called.
            self.library = unsafe { Library::new(LIBRARY_PATH) }.ok();
        }
        self.library.as_ref()
    }

    fn resolve(&mut self, name: &str) -> Option<ForeignSymbol> {
        let library = self.library()?;
        let symbol_name = CString::new(name).ok()?;
        unsafe {
            library
                .get::<ForeignSymbol>(symbol_name.as_bytes_with_nul())
                .ok()
                .map(|s| *s)
        }
    }
}

/// Dispatch a foreign call: builtins first, then the shared library.
pub(crate) fn call(vm: &mut Vm, name: &str, arguments: &[Value]) -> Result<Value, RuntimeError> {
    if let Some(builtin) = BUILTINS.get(name) {
        return builtin(vm, arguments).map_err(|message| vm.runtime_error(message));
    }

    let Some(symbol) = vm.foreign.resolve(name) else {
        return Err(vm.runtime_error(format!("Failed to load foreign function '{}'.", name)));
    };

    // Stage the arguments into the flat C view; CStrings own the text
    // payloads for the duration of the call.
    let mut text_storage: Vec<CString> = Vec::new();
    let mut staged: Vec<ForeignValue> = Vec::with_capacity(arguments.len());
    for argument in arguments {
        staged.push(stage_value(vm, *argument, &mut text_storage)?);
    }

    let mut ret = ForeignValue::unit();
    unsafe {
        symbol(staged.as_ptr(), &mut ret);
    }
    unstage_value(vm, &ret, name)
}

fn stage_value(
    vm: &Vm,
    value: Value,
    text_storage: &mut Vec<CString>,
) -> Result<ForeignValue, RuntimeError> {
    let mut staged = ForeignValue::unit();
    match value {
        Value::Unit => {}
        Value::Integer(i) => {
            staged.tag = 1;
            staged.integer = i;
        }
        Value::Fraction(f) => {
            staged.tag = 2;
            staged.fraction = f;
        }
        Value::Bool(b) => {
            staged.tag = 3;
            staged.boolean = b;
        }
        Value::Ref(_) => {
            let text = vm.text_of(value)?;
            let text = CString::new(text)
                .map_err(|_| vm.runtime_error("Text with interior NUL crosses the FFI boundary."))?;
            staged.tag = 4;
            staged.text = text.as_ptr();
            text_storage.push(text);
        }
    }
    Ok(staged)
}

fn unstage_value(vm: &mut Vm, ret: &ForeignValue, name: &str) -> Result<Value, RuntimeError> {
    match ret.tag {
        0 => Ok(Value::Unit),
        1 => Ok(Value::Integer(ret.integer)),
        2 => Ok(Value::Fraction(ret.fraction)),
        3 => Ok(Value::Bool(ret.boolean)),
        4 => {
            if ret.text.is_null() {
                return Err(vm.runtime_error(format!(
                    "Foreign function '{}' returned a null text.",
                    name
                )));
            }
            let text = unsafe { CStr::from_ptr(ret.text) }
                .to_string_lossy()
                .into_owned();
            Ok(vm.allocate_value(Traceable::Text(text)))
        }
        other => Err(vm.runtime_error(format!(
            "Foreign function '{}' returned an unknown tag {}.",
            name, other
        ))),
    }
}

// ==================== Builtin registry ====================

fn builtin_print(vm: &mut Vm, arguments: &[Value]) -> Result<Value, String> {
    let [argument] = arguments else {
        return Err("Print expects one Text argument.".to_string());
    };
    let text = vm
        .text_of(*argument)
        .map_err(|e| e.message)?
        .to_string();
    vm.write_output(&text);
    Ok(Value::Unit)
}

fn builtin_get_time(_vm: &mut Vm, _arguments: &[Value]) -> Result<Value, String> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("System clock error: {}.", e))?;
    Ok(Value::Fraction(elapsed.as_millis() as f64))
}

fn builtin_overwrite_to_file(vm: &mut Vm, arguments: &[Value]) -> Result<Value, String> {
    write_file(vm, arguments, false)
}

fn builtin_append_to_file(vm: &mut Vm, arguments: &[Value]) -> Result<Value, String> {
    write_file(vm, arguments, true)
}

fn write_file(vm: &mut Vm, arguments: &[Value], append: bool) -> Result<Value, String> {
    let [path, content] = arguments else {
        return Err("File writers expect a path and a content Text.".to_string());
    };
    let path = vm.text_of(*path).map_err(|e| e.message)?.to_string();
    let content = vm.text_of(*content).map_err(|e| e.message)?.to_string();

    let result = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .and_then(|mut file| std::io::Write::write_all(&mut file, content.as_bytes()));
    Ok(Value::Bool(result.is_ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_contains_stdlib_surface() {
        for name in ["Print", "GetTime", "OverwriteToFile", "AppendToFile"] {
            assert!(BUILTINS.contains_key(name), "missing builtin {}", name);
        }
    }

    #[test]
    fn test_foreign_value_defaults_to_unit() {
        let v = ForeignValue::unit();
        assert_eq!(v.tag, 0);
        assert!(v.text.is_null());
    }
}
