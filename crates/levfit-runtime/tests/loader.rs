//! SymbolLoader integration tests against the models cdylib

mod common;

use levfit_runtime::solver::ModelFn;
use levfit_runtime::{CloseStatus, ErrorRecord, LoaderSession};
use std::os::raw::c_int;
use std::ptr;

macro_rules! require_models_cdylib {
    () => {
        match common::models_cdylib() {
            Some(path) => path,
            None => {
                eprintln!("skipping: levfit-models cdylib not built");
                return;
            }
        }
    };
}

#[test]
fn test_open_and_resolve_existing_symbol() {
    let path = require_models_cdylib!();
    let session = LoaderSession::new();
    let mut record = ErrorRecord::default();

    // SAFETY: gauss_decay is exported by levfit-models with exactly this
    // signature.
    let (handle, func) = unsafe {
        session.open_and_resolve::<ModelFn<f64>>(
            path.to_str().unwrap(),
            "gauss_decay",
            &mut record,
        )
    };

    let mut handle = handle.expect("library should open");
    let func = func.expect("symbol should resolve");
    assert!(!record.has_error());
    assert_eq!(record.message(), "");
    assert_eq!(func.symbol(), "gauss_decay");
    assert!(handle.is_open());

    // The resolved pointer and the rlib-linked function agree exactly.
    let n = 10;
    let mut p = [2.0f64, 2.5];
    let mut via_symbol = vec![0.0f64; n];
    let mut via_rlib = vec![0.0f64; n];
    unsafe {
        (func.get())(
            p.as_mut_ptr(),
            via_symbol.as_mut_ptr(),
            2,
            n as c_int,
            ptr::null_mut(),
        );
        levfit_models::gauss_decay(
            p.as_mut_ptr(),
            via_rlib.as_mut_ptr(),
            2,
            n as c_int,
            ptr::null_mut(),
        );
    }
    assert_eq!(via_symbol, via_rlib);

    assert_eq!(session.close(&mut handle, &mut record), CloseStatus::Closed);
    assert!(!record.has_error());
}

#[test]
fn test_absent_symbol_leaves_library_open() {
    let path = require_models_cdylib!();
    let session = LoaderSession::new();
    let mut record = ErrorRecord::new(128);

    let (handle, func) = unsafe {
        session.open_and_resolve::<ModelFn<f64>>(
            path.to_str().unwrap(),
            "no_such_fit_function",
            &mut record,
        )
    };

    let mut handle = handle.expect("library should still open");
    assert!(func.is_none());
    assert!(record.has_error());
    assert!(record.message().len() <= 128);
    assert!(record.message().contains("no_such_fit_function"));

    // Caller decides what to do with the open handle; here we close it.
    assert_eq!(session.close(&mut handle, &mut record), CloseStatus::Closed);
    assert!(!record.has_error());
}

#[test]
fn test_garbage_file_fails_to_open() {
    use std::io::Write;

    // A file that exists but is not a shared object: open fails with the
    // platform loader's diagnostic, not a crash.
    let mut file = tempfile::Builder::new()
        .prefix("levfit_not_a_lib")
        .suffix(std::env::consts::DLL_SUFFIX)
        .tempfile()
        .unwrap();
    file.write_all(b"this is not a shared object").unwrap();

    let session = LoaderSession::new();
    let mut record = ErrorRecord::default();
    let (handle, func) = unsafe {
        session.open_and_resolve::<ModelFn<f64>>(
            file.path().to_str().unwrap(),
            "gauss_decay",
            &mut record,
        )
    };
    assert!(handle.is_none());
    assert!(func.is_none());
    assert!(record.has_error());
    assert!(record.message().contains("Failed to load library"));
}

#[test]
fn test_invalid_path_yields_nothing() {
    let session = LoaderSession::new();
    let mut record = ErrorRecord::default();
    let (handle, func) = unsafe {
        session.open_and_resolve::<ModelFn<f64>>(
            "/nonexistent/levfit/libmissing.so",
            "gauss_decay",
            &mut record,
        )
    };
    assert!(handle.is_none());
    assert!(func.is_none());
    assert!(record.has_error());
}

#[test]
fn test_double_close_is_a_clean_noop() {
    let path = require_models_cdylib!();
    let session = LoaderSession::new();
    let mut record = ErrorRecord::default();

    let (handle, _) = unsafe {
        session.open_and_resolve::<ModelFn<f64>>(
            path.to_str().unwrap(),
            "gauss_decay",
            &mut record,
        )
    };
    let mut handle = handle.expect("library should open");

    assert_eq!(session.close(&mut handle, &mut record), CloseStatus::Closed);
    assert!(!record.has_error());
    assert!(!handle.is_open());

    // Second close: no crash, no stale diagnostic.
    record.set("stale text from an earlier failure");
    assert_eq!(
        session.close(&mut handle, &mut record),
        CloseStatus::AlreadyClosed
    );
    assert!(!record.has_error());
    assert_eq!(record.message(), "");
}

#[test]
fn test_resolve_after_close_reports_error() {
    let path = require_models_cdylib!();
    let session = LoaderSession::new();
    let mut record = ErrorRecord::default();

    let (handle, _) = unsafe {
        session.open_and_resolve::<ModelFn<f64>>(
            path.to_str().unwrap(),
            "gauss_decay",
            &mut record,
        )
    };
    let mut handle = handle.expect("library should open");
    session.close(&mut handle, &mut record);

    let resolved = unsafe { handle.resolve::<ModelFn<f64>>("jacgauss_decay", &mut record) };
    assert!(resolved.is_none());
    assert!(record.has_error());
    assert!(record.message().contains("already closed"));
}

#[test]
fn test_model_and_jacobian_pair_resolve_from_one_handle() {
    let path = require_models_cdylib!();
    let session = LoaderSession::new();
    let mut record = ErrorRecord::default();

    let (handle, model) = unsafe {
        session.open_and_resolve::<ModelFn<f64>>(
            path.to_str().unwrap(),
            "gauss_decay",
            &mut record,
        )
    };
    let mut handle = handle.expect("library should open");
    assert!(model.is_some());

    let jacobian = unsafe { handle.resolve::<ModelFn<f64>>("jacgauss_decay", &mut record) };
    let jacobian = jacobian.expect("jacobian symbol should resolve");
    assert!(!record.has_error());
    assert_eq!(jacobian.symbol(), "jacgauss_decay");
    assert_eq!(jacobian.library(), path.as_path());

    session.close(&mut handle, &mut record);
}
