//! Native-vs-callback dispatch behind the solver's fixed signature
//!
//! The solver sees one shape of model function: five arguments, the last
//! an opaque pointer. Which world that call lands in is decided once, at
//! fit setup, by constructing the right [`ModelDispatch`] variant —
//! never by inspecting the opaque pointer at call time.
//!
//! Native mode passes the loaded function pointers and the caller's raw
//! user data straight through; the marshalling layer is not involved at
//! all. Callback mode installs a monomorphized `extern "C"` trampoline
//! whose user data is the [`CallbackContext`], and the trampoline
//! delegates to the context's invocation protocol.
//!
//! Unwinding across the solver's C-ABI frames is not an option, so a
//! trampoline that observes a failure latches it on the context and
//! poisons the output buffer with NaN; the solver then stops with an
//! invalid-values reason and the fit runner reports the latched error.

use crate::ffi::context::{CallbackContext, CallbackError};
use levfit_solver::{JacobianFn, LmReal, ModelFn};
use num_traits::Float;
use std::os::raw::{c_int, c_void};
use std::slice;

/// What the solver gets handed for one run: a model entry point, an
/// optional Jacobian entry point, and the opaque user data both receive.
pub struct SolverHook<T> {
    pub model: ModelFn<T>,
    pub jacobian: Option<JacobianFn<T>>,
    pub data: *mut c_void,
}

/// The two dispatch modes, resolved at fit-setup time.
pub enum ModelDispatch<T: LmReal> {
    /// Natively compiled functions; `data` flows through untouched.
    Native {
        model: ModelFn<T>,
        jacobian: Option<JacobianFn<T>>,
        data: *mut c_void,
    },
    /// Host callables behind the marshalling bridge.
    Callback(Box<CallbackContext<T>>),
}

impl<T: LmReal> ModelDispatch<T> {
    /// Produce the function pointers and user data for the solver.
    ///
    /// The context box stays owned by `self`; the returned hook borrows
    /// it conceptually, so the dispatch value must outlive the solver
    /// run it is hooked into.
    pub fn hook(&mut self) -> SolverHook<T> {
        match self {
            ModelDispatch::Native {
                model,
                jacobian,
                data,
            } => SolverHook {
                model: *model,
                jacobian: *jacobian,
                data: *data,
            },
            ModelDispatch::Callback(ctx) => SolverHook {
                model: model_trampoline::<T>,
                jacobian: ctx
                    .has_jacobian()
                    .then_some(jacobian_trampoline::<T> as JacobianFn<T>),
                data: ctx.as_mut() as *mut CallbackContext<T> as *mut c_void,
            },
        }
    }

    /// Take the failure latched during a callback run, if any.
    ///
    /// Always `None` in native mode.
    pub fn take_failure(&mut self) -> Option<CallbackError> {
        match self {
            ModelDispatch::Native { .. } => None,
            ModelDispatch::Callback(ctx) => ctx.take_failure(),
        }
    }
}

/// Fill the solver's buffer with NaN so iteration halts promptly.
unsafe fn poison<T: LmReal>(buf: *mut T, count: usize) {
    if buf.is_null() {
        return;
    }
    for v in slice::from_raw_parts_mut(buf, count).iter_mut() {
        *v = Float::nan();
    }
}

unsafe extern "C" fn model_trampoline<T: LmReal>(
    p: *mut T,
    x: *mut T,
    m: c_int,
    n: c_int,
    data: *mut c_void,
) {
    let ctx = &mut *(data as *mut CallbackContext<T>);
    if ctx.failed() {
        // A previous call already failed; keep the solver on poisoned
        // output until it gives up.
        poison(x, n.max(0) as usize);
        return;
    }
    if let Err(err) = ctx.invoke_model(p, x, m.max(0) as usize, n.max(0) as usize) {
        ctx.latch_failure(err);
        poison(x, n.max(0) as usize);
    }
}

unsafe extern "C" fn jacobian_trampoline<T: LmReal>(
    p: *mut T,
    jac: *mut T,
    m: c_int,
    n: c_int,
    data: *mut c_void,
) {
    let ctx = &mut *(data as *mut CallbackContext<T>);
    let (m, n) = (m.max(0) as usize, n.max(0) as usize);
    if ctx.failed() {
        poison(jac, n * m);
        return;
    }
    if let Err(err) = ctx.invoke_jacobian(p, jac, m, n) {
        ctx.latch_failure(err);
        poison(jac, n * m);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::host::{CallArgs, FnCallable, HostCallable, HostCallError};
    use pretty_assertions::assert_eq;

    unsafe extern "C" fn native_double(
        p: *mut f64,
        x: *mut f64,
        _m: c_int,
        n: c_int,
        _data: *mut c_void,
    ) {
        let p = slice::from_raw_parts(p, 1);
        let x = slice::from_raw_parts_mut(x, n as usize);
        for xi in x.iter_mut() {
            *xi = 2.0 * p[0];
        }
    }

    fn callback_context(m: usize, n: usize, t: &mut [f64]) -> Box<CallbackContext<f64>> {
        let model: Box<dyn HostCallable<f64>> =
            Box::new(FnCallable::new(|p: &[f64], out: &mut [f64], _t: &[f64]| {
                for o in out.iter_mut() {
                    *o = 3.0 * p[0];
                }
            }));
        Box::new(unsafe {
            CallbackContext::new(m, n, t.len(), t.as_mut_ptr(), model, None).unwrap()
        })
    }

    #[test]
    fn test_native_hook_passes_data_through() {
        let mut user_data = 42.0f64;
        let mut dispatch = ModelDispatch::<f64>::Native {
            model: native_double,
            jacobian: None,
            data: &mut user_data as *mut f64 as *mut c_void,
        };
        let hook = dispatch.hook();
        assert!(hook.jacobian.is_none());
        assert_eq!(hook.data as *const f64, &user_data as *const f64);

        let mut p = [5.0f64];
        let mut x = [0.0f64; 3];
        unsafe { (hook.model)(p.as_mut_ptr(), x.as_mut_ptr(), 1, 3, hook.data) };
        assert_eq!(x, [10.0, 10.0, 10.0]);
        assert_eq!(dispatch.take_failure(), None);
    }

    #[test]
    fn test_callback_hook_routes_through_context() {
        let mut t = [0.0f64; 2];
        let mut dispatch = ModelDispatch::Callback(callback_context(1, 2, &mut t));
        let hook = dispatch.hook();
        assert!(hook.jacobian.is_none());

        let mut p = [4.0f64];
        let mut x = [0.0f64; 2];
        unsafe { (hook.model)(p.as_mut_ptr(), x.as_mut_ptr(), 1, 2, hook.data) };
        assert_eq!(x, [12.0, 12.0]);
        assert_eq!(dispatch.take_failure(), None);
    }

    struct TwoValues;

    impl HostCallable<f64> for TwoValues {
        fn invoke(&mut self, args: CallArgs<'_, f64>) -> Result<usize, HostCallError> {
            if let Some(out) = args.output.as_mut_slice() {
                for o in out.iter_mut() {
                    *o = 1.0;
                }
            }
            Ok(2)
        }
    }

    #[test]
    fn test_arity_violation_latches_and_poisons() {
        let mut t = [0.0f64];
        let ctx = Box::new(unsafe {
            CallbackContext::new(1, 2, 1, t.as_mut_ptr(), Box::new(TwoValues), None).unwrap()
        });
        let mut dispatch = ModelDispatch::Callback(ctx);
        let hook = dispatch.hook();

        let mut p = [1.0f64];
        let mut x = [0.0f64; 2];
        unsafe { (hook.model)(p.as_mut_ptr(), x.as_mut_ptr(), 1, 2, hook.data) };

        assert!(x[0].is_nan() && x[1].is_nan());
        assert_eq!(
            dispatch.take_failure(),
            Some(CallbackError::ArityViolation { returned: 2 })
        );
    }

    #[test]
    fn test_failed_context_keeps_poisoning_without_reinvoking() {
        let mut t = [0.0f64];
        let ctx = Box::new(unsafe {
            CallbackContext::new(1, 2, 1, t.as_mut_ptr(), Box::new(TwoValues), None).unwrap()
        });
        let mut dispatch = ModelDispatch::Callback(ctx);
        let hook = dispatch.hook();

        let mut p = [1.0f64];
        let mut x = [0.0f64; 2];
        unsafe { (hook.model)(p.as_mut_ptr(), x.as_mut_ptr(), 1, 2, hook.data) };
        // Second call after the latch: output must stay poisoned.
        x = [0.0, 0.0];
        unsafe { (hook.model)(p.as_mut_ptr(), x.as_mut_ptr(), 1, 2, hook.data) };
        assert!(x[0].is_nan() && x[1].is_nan());
    }
}
