//! C FFI bindings for rec-core
//!
//! Record sets cross the boundary as opaque handles; everything else is
//! exchanged as UTF-8 C strings holding JSON.

use rec_core::{Format, FileDescriptor};
use serde_json::Value;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

/// Opaque handle to a parsed record set
pub struct FfiRecordSet {
    inner: Vec<Value>,
}

unsafe fn read_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

fn into_c_string(s: String) -> *mut c_char {
    CString::new(s)
        .map(|s| s.into_raw())
        .unwrap_or(ptr::null_mut())
}

/// Parse content in the named format (`csv`, `json` or `jsonl`)
///
/// # Safety
/// - `content` and `format` must be valid C strings
/// - Returns null on error
#[no_mangle]
pub unsafe extern "C" fn rec_parse(content: *const c_char, format: *const c_char) -> *mut FfiRecordSet {
    let (Some(content), Some(format)) = (read_str(content), read_str(format)) else {
        return ptr::null_mut();
    };

    let Ok(format) = format.parse::<Format>() else {
        return ptr::null_mut();
    };

    match rec_core::parse(content, format) {
        Ok(records) => Box::into_raw(Box::new(FfiRecordSet { inner: records })),
        Err(_) => ptr::null_mut(),
    }
}

/// Free a record set
///
/// # Safety
/// - `set` must be a valid pointer returned by `rec_parse` or null
#[no_mangle]
pub unsafe extern "C" fn rec_free_record_set(set: *mut FfiRecordSet) {
    if !set.is_null() {
        drop(Box::from_raw(set));
    }
}

/// Get the number of records in a set
///
/// # Safety
/// - `set` must be a valid pointer returned by `rec_parse`
#[no_mangle]
pub unsafe extern "C" fn rec_record_count(set: *const FfiRecordSet) -> usize {
    if set.is_null() {
        return 0;
    }
    let set = &*set;
    set.inner.len()
}

/// Get one record as compact JSON
///
/// # Safety
/// - `set` must be a valid pointer returned by `rec_parse`
/// - Returns null if index is out of bounds
/// - Caller must free the returned string with `rec_free_string`
#[no_mangle]
pub unsafe extern "C" fn rec_record_json(set: *const FfiRecordSet, index: usize) -> *mut c_char {
    if set.is_null() {
        return ptr::null_mut();
    }

    let set = &*set;
    set.inner
        .get(index)
        .and_then(|record| serde_json::to_string(record).ok())
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

/// Serialize a record set into the named format
///
/// # Safety
/// - `set` must be a valid pointer returned by `rec_parse`
/// - `format` must be a valid C string
/// - Returns null on error
/// - Caller must free the returned string with `rec_free_string`
#[no_mangle]
pub unsafe extern "C" fn rec_serialize(set: *const FfiRecordSet, format: *const c_char) -> *mut c_char {
    if set.is_null() {
        return ptr::null_mut();
    }
    let Some(format) = read_str(format) else {
        return ptr::null_mut();
    };

    let set = &*set;
    rec_core::serialize_str(&set.inner, format)
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

/// List the field paths of one record as a JSON array
///
/// # Safety
/// - `set` must be a valid pointer returned by `rec_parse`
/// - Returns null if index is out of bounds
/// - Caller must free the returned string with `rec_free_string`
#[no_mangle]
pub unsafe extern "C" fn rec_record_paths(set: *const FfiRecordSet, index: usize) -> *mut c_char {
    if set.is_null() {
        return ptr::null_mut();
    }

    let set = &*set;
    set.inner
        .get(index)
        .map(rec_core::enumerate_paths)
        .and_then(|paths| serde_json::to_string(&paths).ok())
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

/// Analyze one field of a record set, returned as a JSON object
///
/// # Safety
/// - `set` must be a valid pointer returned by `rec_parse`
/// - `field` must be a valid C string
/// - Caller must free the returned string with `rec_free_string`
#[no_mangle]
pub unsafe extern "C" fn rec_analyze_field(set: *const FfiRecordSet, field: *const c_char) -> *mut c_char {
    if set.is_null() {
        return ptr::null_mut();
    }
    let Some(field) = read_str(field) else {
        return ptr::null_mut();
    };

    let set = &*set;
    serde_json::to_string(&rec_core::analyze_field(&set.inner, field))
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

/// Combine files described by a JSON array of file descriptors
///
/// Each element has `identity`, `records`, `id_field` and optional
/// `display_name` and `prefix`. The result is a JSON object with `combined`
/// and `warnings`.
///
/// # Safety
/// - `files_json` must be a valid C string
/// - Returns null on malformed input or an unresolvable conflict
/// - Caller must free the returned string with `rec_free_string`
#[no_mangle]
pub unsafe extern "C" fn rec_combine(files_json: *const c_char) -> *mut c_char {
    let Some(files_json) = read_str(files_json) else {
        return ptr::null_mut();
    };

    let Ok(files) = serde_json::from_str::<Vec<FileDescriptor>>(files_json) else {
        return ptr::null_mut();
    };

    rec_core::combine(&files)
        .ok()
        .and_then(|result| serde_json::to_string(&result).ok())
        .map(into_c_string)
        .unwrap_or(ptr::null_mut())
}

/// Free a string returned by other FFI functions
///
/// # Safety
/// - `s` must be a valid pointer returned by a rec_* function or null
#[no_mangle]
pub unsafe extern "C" fn rec_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(s: *mut c_char) -> String {
        assert!(!s.is_null());
        let owned = CStr::from_ptr(s).to_str().unwrap().to_string();
        rec_free_string(s);
        owned
    }

    #[test]
    fn test_parse_and_serialize() {
        let content = CString::new("name,age\nJohn,30").unwrap();
        let csv = CString::new("csv").unwrap();
        let jsonl = CString::new("jsonl").unwrap();

        unsafe {
            let set = rec_parse(content.as_ptr(), csv.as_ptr());
            assert!(!set.is_null());
            assert_eq!(rec_record_count(set), 1);

            let out = take_string(rec_serialize(set, jsonl.as_ptr()));
            assert_eq!(out, r#"{"name":"John","age":30}"#);

            assert!(rec_record_json(set, 5).is_null());
            rec_free_record_set(set);
        }
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let content = CString::new("{not json").unwrap();
        let json = CString::new("json").unwrap();
        let xml = CString::new("xml").unwrap();

        unsafe {
            assert!(rec_parse(content.as_ptr(), json.as_ptr()).is_null());
            assert!(rec_parse(content.as_ptr(), xml.as_ptr()).is_null());
            assert!(rec_parse(ptr::null(), json.as_ptr()).is_null());
        }
    }

    #[test]
    fn test_paths_and_analysis() {
        let content = CString::new(r#"[{"user":{"name":"A"}},{"user":{"name":""}}]"#).unwrap();
        let json = CString::new("json").unwrap();
        let field = CString::new("user.name").unwrap();

        unsafe {
            let set = rec_parse(content.as_ptr(), json.as_ptr());
            assert_eq!(take_string(rec_record_paths(set, 0)), r#"["user","user.name"]"#);

            let analysis: Value =
                serde_json::from_str(&take_string(rec_analyze_field(set, field.as_ptr()))).unwrap();
            assert_eq!(analysis["emptyCount"], 1);
            rec_free_record_set(set);
        }
    }

    #[test]
    fn test_null_set_handles() {
        let json = CString::new("json").unwrap();
        let field = CString::new("x").unwrap();

        unsafe {
            assert_eq!(rec_record_count(ptr::null()), 0);
            assert!(rec_record_json(ptr::null(), 0).is_null());
            assert!(rec_serialize(ptr::null(), json.as_ptr()).is_null());
            assert!(rec_record_paths(ptr::null(), 0).is_null());
            assert!(rec_analyze_field(ptr::null(), field.as_ptr()).is_null());
            rec_free_record_set(ptr::null_mut());
        }
    }

    #[test]
    fn test_record_json_by_index() {
        let content = CString::new(r#"[{"a":1},{"b":[1,2]}]"#).unwrap();
        let json = CString::new("json").unwrap();

        unsafe {
            let set = rec_parse(content.as_ptr(), json.as_ptr());
            assert_eq!(rec_record_count(set), 2);
            assert_eq!(take_string(rec_record_json(set, 1)), r#"{"b":[1,2]}"#);
            assert_eq!(take_string(rec_record_paths(set, 1)), r#"["b"]"#);
            assert!(rec_record_paths(set, 2).is_null());
            rec_free_record_set(set);
        }
    }

    #[test]
    fn test_combine() {
        let files = CString::new(
            r#"[
                {"identity": "a", "records": [{"id": 1, "x": 1}], "id_field": "id"},
                {"identity": "b", "records": [{"id": 1, "x": 2}], "id_field": "id", "prefix": "B"}
            ]"#,
        )
        .unwrap();

        unsafe {
            let result: Value = serde_json::from_str(&take_string(rec_combine(files.as_ptr()))).unwrap();
            assert_eq!(result["combined"][0]["x"], 1);
            assert_eq!(result["combined"][0]["B x"], 2);
            assert_eq!(result["warnings"], serde_json::json!([]));
        }
    }

    #[test]
    fn test_combine_conflict_returns_null() {
        let files = CString::new(
            r#"[
                {"identity": "a", "records": [{"id": 1, "x": 1}], "id_field": "id"},
                {"identity": "b", "records": [{"id": 1, "x": 2}], "id_field": "id"}
            ]"#,
        )
        .unwrap();

        unsafe {
            assert!(rec_combine(files.as_ptr()).is_null());
        }
    }
}
