//! High-level fit runner
//!
//! Orchestrates one fit run: pick the model source, set up the dispatch
//! mode, hand the solver its function pointers, and fold loader
//! diagnostics, latched callback failures, and the solver report into one
//! typed outcome. This is the only place the loader, the marshalling
//! layer, and the solver meet; each run uses exactly one dispatch mode.

use crate::ffi::context::{CallbackContext, CallbackError};
use crate::ffi::dispatch::ModelDispatch;
use crate::ffi::error_channel::ErrorRecord;
use crate::ffi::host::HostCallable;
use crate::ffi::loader::{CloseStatus, LoadError, LoaderSession};
use crate::ffi::view::ShapeError;
use levfit_solver::{
    lm_der, lm_dif, FitReport, JacobianFn, LmReal, ModelFn, SolverError, SolverOptions,
    INFO_SZ,
};
use std::os::raw::c_void;
use std::ptr;
use thiserror::Error;

/// Errors a fit run can end with.
#[derive(Debug, Error)]
pub enum FitError {
    #[error("{0}")]
    Load(#[from] LoadError),

    #[error("{0}")]
    Callback(#[from] CallbackError),

    #[error("{0}")]
    Shape(#[from] ShapeError),

    #[error("{0}")]
    Solver(#[from] SolverError),
}

/// Where the model function for a run comes from.
///
/// Exactly one source per run; the dispatch mode is fixed here, at setup,
/// and never re-decided at call time.
pub struct ModelSource<T: LmReal> {
    kind: SourceKind<T>,
}

enum SourceKind<T: LmReal> {
    NativeLibrary {
        library: String,
        model_symbol: String,
        jacobian_symbol: Option<String>,
    },
    NativeFunctions {
        model: ModelFn<T>,
        jacobian: Option<JacobianFn<T>>,
    },
    Host {
        model: Box<dyn HostCallable<T>>,
        jacobian: Option<Box<dyn HostCallable<T>>>,
    },
}

impl<T: LmReal> ModelSource<T> {
    /// Model resolved from a shared library by symbol name.
    ///
    /// The library is opened when the run starts and closed when it
    /// finishes; a close diagnostic is carried on the outcome rather
    /// than failing an otherwise successful fit.
    ///
    /// # Safety
    ///
    /// The named symbols must export the solver's five-argument contract
    /// at precision `T`; a signature mismatch is undefined behavior at
    /// call time and cannot be detected by the loader.
    pub unsafe fn native_library(
        library: impl Into<String>,
        model_symbol: impl Into<String>,
        jacobian_symbol: Option<String>,
    ) -> Self {
        Self {
            kind: SourceKind::NativeLibrary {
                library: library.into(),
                model_symbol: model_symbol.into(),
                jacobian_symbol,
            },
        }
    }

    /// Model given as already-typed native function pointers.
    pub fn native_functions(model: ModelFn<T>, jacobian: Option<JacobianFn<T>>) -> Self {
        Self {
            kind: SourceKind::NativeFunctions { model, jacobian },
        }
    }

    /// Model implemented by a host callable behind the callback bridge.
    pub fn host(
        model: Box<dyn HostCallable<T>>,
        jacobian: Option<Box<dyn HostCallable<T>>>,
    ) -> Self {
        Self {
            kind: SourceKind::Host { model, jacobian },
        }
    }
}

/// Per-run tuning.
#[derive(Debug, Clone, Copy)]
pub struct FitConfig<T> {
    /// Iteration cap handed to the solver.
    pub max_iterations: usize,
    /// Solver option array, in typed form.
    pub options: SolverOptions<T>,
}

impl<T: LmReal> Default for FitConfig<T> {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            options: SolverOptions::default(),
        }
    }
}

/// Result of one fit run.
#[derive(Debug, Clone)]
pub struct FitOutcome<T> {
    /// Fitted parameter vector.
    pub params: Vec<T>,
    /// Typed solver report (stop reason, costs, evaluation counts).
    pub report: FitReport,
    /// Close diagnostic from the native-library path, if the loader
    /// reported one. Worth logging; not fatal to the fit.
    pub close_diagnostic: Option<String>,
}

/// Run one fit.
///
/// `init` seeds the parameter vector, `data` is the measurement vector
/// the model output is fitted against, and `abscissa` is the fixed data
/// handed to the model on every call. Native models receive the abscissa
/// as their raw user-data pointer (null when absent); host callables see
/// it through the fixed-data view, with measurement indices synthesized
/// when the caller supplies none.
pub fn run_fit<T: LmReal>(
    source: ModelSource<T>,
    init: &[T],
    data: &[T],
    abscissa: Option<&[T]>,
    config: &FitConfig<T>,
) -> Result<FitOutcome<T>, FitError> {
    let m = init.len();
    let n = data.len();
    let mut params = init.to_vec();

    // Keep the fixed data alive for the whole solver run; views and raw
    // user-data pointers alias it.
    let mut fixed_store: Vec<T> = match abscissa {
        Some(t) => t.to_vec(),
        None => (0..n).map(|i| T::of(i as f64)).collect(),
    };

    let session = LoaderSession::new();
    let mut handle = None;

    let mut dispatch = match source.kind {
        SourceKind::NativeLibrary {
            library,
            model_symbol,
            jacobian_symbol,
        } => {
            if session.find_library(&library).is_none() {
                return Err(LoadError::LibraryNotFound(library).into());
            }
            let mut record = ErrorRecord::default();
            // SAFETY: delegated to ModelSource::native_library — the
            // symbols export the five-argument contract at precision T.
            let (lib, model) = unsafe {
                session.open_and_resolve::<ModelFn<T>>(&library, &model_symbol, &mut record)
            };
            let lib = match lib {
                Some(lib) => lib,
                None => {
                    return Err(LoadError::LoadFailed {
                        library,
                        detail: record.message().to_string(),
                    }
                    .into())
                }
            };
            let model = match model {
                Some(model) => model,
                None => {
                    let mut close_record = ErrorRecord::default();
                    let mut lib = lib;
                    session.close(&mut lib, &mut close_record);
                    return Err(LoadError::SymbolNotFound {
                        library,
                        symbol: model_symbol,
                    }
                    .into());
                }
            };
            let jacobian = match &jacobian_symbol {
                Some(symbol) => {
                    // SAFETY: as above.
                    match unsafe { lib.resolve::<JacobianFn<T>>(symbol, &mut record) } {
                        Some(jacf) => Some(jacf.get()),
                        None => {
                            let mut close_record = ErrorRecord::default();
                            let mut lib = lib;
                            session.close(&mut lib, &mut close_record);
                            return Err(LoadError::SymbolNotFound {
                                library,
                                symbol: symbol.clone(),
                            }
                            .into());
                        }
                    }
                }
                None => None,
            };
            handle = Some(lib);
            ModelDispatch::Native {
                model: model.get(),
                jacobian,
                data: native_user_data(abscissa, &mut fixed_store),
            }
        }
        SourceKind::NativeFunctions { model, jacobian } => ModelDispatch::Native {
            model,
            jacobian,
            data: native_user_data(abscissa, &mut fixed_store),
        },
        SourceKind::Host { model, jacobian } => {
            // SAFETY: fixed_store outlives the dispatch and the solver
            // run below; the view is torn down before it drops.
            let context = unsafe {
                CallbackContext::new(
                    m,
                    n,
                    fixed_store.len(),
                    fixed_store.as_mut_ptr(),
                    model,
                    jacobian,
                )
            }?;
            ModelDispatch::Callback(Box::new(context))
        }
    };

    let hook = dispatch.hook();
    let mut info = [T::zero(); INFO_SZ];
    // SAFETY: the hook's model/jacobian pointers honor the solver
    // contract for dimensions m and n, and hook.data is what those
    // functions expect (raw abscissa in native mode, the callback
    // context in callback mode).
    let solved = unsafe {
        match hook.jacobian {
            Some(jacf) => lm_der(
                hook.model,
                jacf,
                &mut params,
                data,
                config.max_iterations,
                &config.options,
                &mut info,
                hook.data,
            ),
            None => lm_dif(
                hook.model,
                &mut params,
                data,
                config.max_iterations,
                &config.options,
                &mut info,
                hook.data,
            ),
        }
    };

    // A latched callback failure explains the solver's NaN stop better
    // than the report does; surface it first.
    if let Some(err) = dispatch.take_failure() {
        close_quietly(&session, &mut handle);
        return Err(err.into());
    }
    let report = match solved {
        Ok(report) => report,
        Err(err) => {
            close_quietly(&session, &mut handle);
            return Err(err.into());
        }
    };

    let close_diagnostic = match handle.as_mut() {
        Some(lib) => {
            let mut record = ErrorRecord::default();
            match session.close(lib, &mut record) {
                CloseStatus::Failed => Some(record.message().to_string()),
                _ => None,
            }
        }
        None => None,
    };

    Ok(FitOutcome {
        params,
        report,
        close_diagnostic,
    })
}

fn native_user_data<T>(abscissa: Option<&[T]>, fixed_store: &mut [T]) -> *mut c_void {
    match abscissa {
        Some(_) => fixed_store.as_mut_ptr() as *mut c_void,
        None => ptr::null_mut(),
    }
}

fn close_quietly(session: &LoaderSession, handle: &mut Option<crate::ffi::loader::LibraryHandle>) {
    if let Some(lib) = handle.as_mut() {
        let mut record = ErrorRecord::default();
        session.close(lib, &mut record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::host::FnCallable;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = FitConfig::<f64>::default();
        assert_eq!(config.max_iterations, 200);
        assert_eq!(config.options, SolverOptions::default());
    }

    #[test]
    fn test_host_fit_of_linear_model() {
        // out[i] = p0 * t[i] + p1, data from p = (2, -1).
        let t: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let data: Vec<f64> = t.iter().map(|ti| 2.0 * ti - 1.0).collect();

        let model = Box::new(FnCallable::new(|p: &[f64], out: &mut [f64], t: &[f64]| {
            for (o, ti) in out.iter_mut().zip(t.iter()) {
                *o = p[0] * ti + p[1];
            }
        }));

        let outcome = run_fit(
            ModelSource::host(model, None),
            &[0.5, 0.5],
            &data,
            Some(&t),
            &FitConfig::default(),
        )
        .unwrap();

        assert!(outcome.report.stop.is_converged());
        assert!((outcome.params[0] - 2.0).abs() < 1e-6);
        assert!((outcome.params[1] + 1.0).abs() < 1e-6);
        assert_eq!(outcome.close_diagnostic, None);
    }

    #[test]
    fn test_missing_library_is_a_load_error() {
        // SAFETY: the library does not exist; no symbol is ever called.
        let source =
            unsafe { ModelSource::<f64>::native_library("levfit_missing_lib", "f", None) };
        let err = run_fit(source, &[1.0], &[1.0, 2.0], None, &FitConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            FitError::Load(LoadError::LibraryNotFound(_))
        ));
    }
}
