//! C ABI over values, contexts and templates
//!
//! Every handle crosses the boundary as an opaque pointer owned by the
//! caller and released with the matching `stencil_free_*` function. Every
//! fallible function returns a status code (see [`Status`]); on failure its
//! out-parameter is set to null and a diagnostic is stored for the calling
//! thread, retrievable once through [`stencil_last_error`].
//!
//! # Safety
//!
//! Pointers passed in must be null or come from this module and not have
//! been freed. Strings passed in must be NUL-terminated UTF-8.

use std::cell::RefCell;
use std::ffi::{c_char, c_int, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use crate::context::RenderContext;
use crate::error::{Result, Status, StencilError};
use crate::template::Template;
use crate::value::Value;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn store_error(message: String) {
    let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

/// Run `f`, turning errors and panics into a status code.
fn guard(f: impl FnOnce() -> Result<()>) -> c_int {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Status::Ok.code(),
        Ok(Err(err)) => {
            tracing::debug!(code = err.code(), error = %err, "ffi call failed");
            let code = err.code();
            store_error(err.to_string());
            code
        }
        Err(_) => {
            store_error("ERROR: panic while crossing the C boundary".to_string());
            Status::Error.code()
        }
    }
}

/// Null the out-parameter and hand it back for writing.
unsafe fn out_param<'a, T>(out: *mut *mut T, operation: &'static str) -> Result<&'a mut *mut T> {
    if out.is_null() {
        return Err(StencilError::invalid_argument(operation, "ERROR: output pointer is null"));
    }
    *out = ptr::null_mut();
    Ok(&mut *out)
}

unsafe fn handle<'a, T>(ptr: *const T, operation: &'static str, what: &str) -> Result<&'a T> {
    ptr.as_ref().ok_or_else(|| {
        StencilError::invalid_argument(operation, format!("ERROR: {} pointer is null", what))
    })
}

unsafe fn text<'a>(ptr: *const c_char, operation: &'static str, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(StencilError::invalid_argument(
            operation,
            format!("ERROR: {} pointer is null", what),
        ));
    }
    CStr::from_ptr(ptr).to_str().map_err(|err| {
        StencilError::invalid_argument(
            operation,
            format!("ERROR: {} is not valid UTF-8: {}", what, err),
        )
    })
}

fn into_c_string(output: String, operation: &'static str) -> Result<*mut c_char> {
    CString::new(output)
        .map(CString::into_raw)
        .map_err(|_| StencilError::Generic {
            operation,
            message: "ERROR: rendered output contains a NUL byte".to_string(),
        })
}

// ═══════════════════════════════════════════════════════════════════
// Templates
// ═══════════════════════════════════════════════════════════════════

/// Parse a template.
///
/// # Safety
///
/// `source` must be a valid C string, `out` a valid pointer or null.
#[no_mangle]
pub unsafe extern "C" fn stencil_parse(source: *const c_char, out: *mut *mut Template) -> c_int {
    guard(|| {
        const OP: &str = "Parsing template";
        let out = out_param(out, OP)?;
        let template = Template::parse(text(source, OP, "template source")?)?;
        *out = Box::into_raw(Box::new(template));
        Ok(())
    })
}

/// Render a template against a context. The output is freed with
/// [`stencil_free_string`].
///
/// # Safety
///
/// All pointers must be valid or null.
#[no_mangle]
pub unsafe extern "C" fn stencil_render_context(
    template: *const Template,
    context: *const RenderContext,
    out: *mut *mut c_char,
) -> c_int {
    guard(|| {
        const OP: &str = "Rendering template";
        let out = out_param(out, OP)?;
        let template = handle(template, OP, "template")?;
        let context = handle(context, OP, "context")?;
        *out = into_c_string(template.render(context)?, OP)?;
        Ok(())
    })
}

/// Render a template against JSON text. The output is freed with
/// [`stencil_free_string`].
///
/// # Safety
///
/// All pointers must be valid or null; `json` must be a valid C string.
#[no_mangle]
pub unsafe extern "C" fn stencil_render_json(
    template: *const Template,
    json: *const c_char,
    out: *mut *mut c_char,
) -> c_int {
    guard(|| {
        const OP: &str = "Rendering template with JSON";
        let out = out_param(out, OP)?;
        let template = handle(template, OP, "template")?;
        *out = into_c_string(template.render_json(text(json, OP, "JSON text")?)?, OP)?;
        Ok(())
    })
}

// ═══════════════════════════════════════════════════════════════════
// Values
// ═══════════════════════════════════════════════════════════════════

unsafe fn emit_value(out: *mut *mut Value, make: impl FnOnce() -> Result<Value>) -> c_int {
    guard(|| {
        let out = out_param(out, "Creating value")?;
        *out = Box::into_raw(Box::new(make()?));
        Ok(())
    })
}

/// Create a null value.
///
/// # Safety
///
/// `out` must be a valid pointer or null.
#[no_mangle]
pub unsafe extern "C" fn stencil_value_null(out: *mut *mut Value) -> c_int {
    emit_value(out, || Ok(Value::null()))
}

/// Create a boolean value.
///
/// # Safety
///
/// `out` must be a valid pointer or null.
#[no_mangle]
pub unsafe extern "C" fn stencil_value_bool(b: bool, out: *mut *mut Value) -> c_int {
    emit_value(out, || Ok(Value::bool(b)))
}

/// Create an integer value.
///
/// # Safety
///
/// `out` must be a valid pointer or null.
#[no_mangle]
pub unsafe extern "C" fn stencil_value_int(i: i64, out: *mut *mut Value) -> c_int {
    emit_value(out, || Ok(Value::int(i)))
}

/// Create a float value.
///
/// # Safety
///
/// `out` must be a valid pointer or null.
#[no_mangle]
pub unsafe extern "C" fn stencil_value_float(d: f64, out: *mut *mut Value) -> c_int {
    emit_value(out, || Ok(Value::float(d)))
}

/// Create a string value from a C string.
///
/// # Safety
///
/// `s` must be a valid C string or null, `out` a valid pointer or null.
#[no_mangle]
pub unsafe extern "C" fn stencil_value_string(s: *const c_char, out: *mut *mut Value) -> c_int {
    emit_value(out, || text(s, "Creating value", "string").map(Value::string))
}

/// Create an empty array.
///
/// # Safety
///
/// `out` must be a valid pointer or null.
#[no_mangle]
pub unsafe extern "C" fn stencil_value_array(out: *mut *mut Value) -> c_int {
    emit_value(out, || Ok(Value::array()))
}

/// Create an empty object.
///
/// # Safety
///
/// `out` must be a valid pointer or null.
#[no_mangle]
pub unsafe extern "C" fn stencil_value_object(out: *mut *mut Value) -> c_int {
    emit_value(out, || Ok(Value::object()))
}

/// Append `element` to `array`. `element` stays owned by the caller.
///
/// # Safety
///
/// Both pointers must be valid or null.
#[no_mangle]
pub unsafe extern "C" fn stencil_array_push(array: *const Value, element: *const Value) -> c_int {
    guard(|| {
        const OP: &str = "Adding element to array";
        handle(array, OP, "array")?.add(handle(element, OP, "element")?)
    })
}

/// Set `key` on `object`. `value` stays owned by the caller.
///
/// # Safety
///
/// All pointers must be valid or null; `key` must be a valid C string.
#[no_mangle]
pub unsafe extern "C" fn stencil_object_set(
    object: *const Value,
    key: *const c_char,
    value: *const Value,
) -> c_int {
    guard(|| {
        const OP: &str = "Setting object property";
        let object = handle(object, OP, "object")?;
        let key = text(key, OP, "key")?;
        object.set(key, handle(value, OP, "value")?)
    })
}

// ═══════════════════════════════════════════════════════════════════
// Contexts
// ═══════════════════════════════════════════════════════════════════

/// Bind `root` for rendering. `root` stays owned by the caller.
///
/// # Safety
///
/// `root` must be valid or null, `out` a valid pointer or null.
#[no_mangle]
pub unsafe extern "C" fn stencil_context_make(
    root: *const Value,
    out: *mut *mut RenderContext,
) -> c_int {
    guard(|| {
        const OP: &str = "Creating render context";
        let out = out_param(out, OP)?;
        let context = RenderContext::new(handle(root, OP, "root")?)?;
        *out = Box::into_raw(Box::new(context));
        Ok(())
    })
}

// ═══════════════════════════════════════════════════════════════════
// Release
// ═══════════════════════════════════════════════════════════════════

/// Release a value handle. Null is ignored.
///
/// # Safety
///
/// `value` must come from this module and not be freed twice.
#[no_mangle]
pub unsafe extern "C" fn stencil_free_value(value: *mut Value) {
    if !value.is_null() {
        drop(Box::from_raw(value));
    }
}

/// Release a context handle. Null is ignored.
///
/// # Safety
///
/// `context` must come from this module and not be freed twice.
#[no_mangle]
pub unsafe extern "C" fn stencil_free_context(context: *mut RenderContext) {
    if !context.is_null() {
        drop(Box::from_raw(context));
    }
}

/// Release a template handle. Null is ignored.
///
/// # Safety
///
/// `template` must come from this module and not be freed twice.
#[no_mangle]
pub unsafe extern "C" fn stencil_free_template(template: *mut Template) {
    if !template.is_null() {
        drop(Box::from_raw(template));
    }
}

/// Release a string returned by this module. Null is ignored.
///
/// # Safety
///
/// `s` must come from this module and not be freed twice.
#[no_mangle]
pub unsafe extern "C" fn stencil_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Take the diagnostic of the last failed call on this thread.
///
/// Returns null when there is none. The slot is cleared; the returned
/// string is freed with [`stencil_free_string`].
#[no_mangle]
pub extern "C" fn stencil_last_error() -> *mut c_char {
    LAST_ERROR
        .with(|slot| slot.borrow_mut().take())
        .map_or(ptr::null_mut(), CString::into_raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    unsafe fn take_string(ptr: *mut c_char) -> String {
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        stencil_free_string(ptr);
        s
    }

    #[test]
    fn test_build_and_render() {
        unsafe {
            let mut root = ptr::null_mut();
            let mut name = ptr::null_mut();
            assert_eq!(stencil_value_object(&mut root), 0);
            assert_eq!(stencil_value_string(c("World").as_ptr(), &mut name), 0);
            assert_eq!(stencil_object_set(root, c("name").as_ptr(), name), 0);
            stencil_free_value(name);

            let mut context = ptr::null_mut();
            assert_eq!(stencil_context_make(root, &mut context), 0);
            stencil_free_value(root);

            let mut template = ptr::null_mut();
            assert_eq!(stencil_parse(c("Hello, {{ name }}!").as_ptr(), &mut template), 0);

            let mut output = ptr::null_mut();
            assert_eq!(stencil_render_context(template, context, &mut output), 0);
            assert_eq!(take_string(output), "Hello, World!");

            stencil_free_context(context);
            stencil_free_template(template);
        }
    }

    #[test]
    fn test_failure_sets_last_error_once() {
        unsafe {
            let mut template = ptr::null_mut();
            assert_eq!(stencil_parse(c("{{ x }}").as_ptr(), &mut template), 0);

            let mut output = ptr::null_mut::<c_char>();
            let status = stencil_render_json(template, c("{ nope").as_ptr(), &mut output);
            assert_eq!(status, Status::JsonParse.code());
            assert!(output.is_null());

            let message = take_string(stencil_last_error());
            assert!(message.contains("JSON parse error"));
            assert!(stencil_last_error().is_null());

            stencil_free_template(template);
        }
    }

    #[test]
    fn test_null_pointers_are_invalid_arguments() {
        unsafe {
            let mut value = ptr::null_mut();
            assert_eq!(
                stencil_value_string(ptr::null(), &mut value),
                Status::InvalidArgument.code()
            );
            assert!(value.is_null());
            assert_eq!(stencil_value_null(ptr::null_mut()), Status::InvalidArgument.code());
            assert_eq!(
                stencil_array_push(ptr::null(), ptr::null()),
                Status::InvalidArgument.code()
            );
            stencil_free_string(stencil_last_error());
        }
    }

    #[test]
    fn test_push_onto_object_is_operation_error() {
        unsafe {
            let mut object = ptr::null_mut();
            let mut element = ptr::null_mut();
            stencil_value_object(&mut object);
            stencil_value_int(1, &mut element);
            assert_eq!(
                stencil_array_push(object, element),
                Status::OperationFailed.code()
            );
            stencil_free_string(stencil_last_error());
            stencil_free_value(element);
            stencil_free_value(object);
        }
    }

    #[test]
    fn test_free_functions_accept_null() {
        unsafe {
            stencil_free_value(ptr::null_mut());
            stencil_free_context(ptr::null_mut());
            stencil_free_template(ptr::null_mut());
            stencil_free_string(ptr::null_mut());
        }
    }
}
