//! Per-run callback context
//!
//! One `CallbackContext` exists per fit run — never per iteration. It
//! aggregates the four zero-copy views the solver-visible buffers are
//! exposed through (parameters, Jacobian, model output, fixed abscissa),
//! the host model callable, and the optional host Jacobian callable.
//!
//! The solver may use different working storage on different calls, so
//! the parameter and output views are rebound from the incoming raw
//! pointers on every invocation. The fixed-data view is the exception: it
//! is bound exactly once, at creation, to the caller's abscissa buffer.

use crate::ffi::host::{CallArgs, HostCallable, HostCallError};
use crate::ffi::view::{ArrayView, ShapeError, Teardown};

/// Callback invocation errors
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackError {
    /// The host callable returned a number of values other than one.
    /// Fatal to the run: the output buffer contents are undefined.
    ArityViolation { returned: usize },
    /// The solver's dimensions disagree with the context's views.
    ShapeMismatch { buffer: &'static str, detail: ShapeError },
    /// A Jacobian invocation was requested but no Jacobian callable exists.
    MissingJacobian,
    /// The host reported an execution failure.
    Host(HostCallError),
}

impl std::fmt::Display for CallbackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackError::ArityViolation { returned } => {
                write!(
                    f,
                    "Host callable returned {} values, contract requires exactly 1",
                    returned
                )
            }
            CallbackError::ShapeMismatch { buffer, detail } => {
                write!(f, "Shape mismatch on '{}' buffer: {}", buffer, detail)
            }
            CallbackError::MissingJacobian => {
                write!(f, "No Jacobian callable registered for this run")
            }
            CallbackError::Host(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CallbackError {}

impl From<HostCallError> for CallbackError {
    fn from(e: HostCallError) -> Self {
        CallbackError::Host(e)
    }
}

/// Aggregates views and host callables for one fit run.
///
/// Precision is the type parameter, chosen at creation and fixed for the
/// whole run; the two instantiations never mix.
pub struct CallbackContext<T> {
    params: ArrayView<T>,
    jacobian_buf: ArrayView<T>,
    output: ArrayView<T>,
    fixed: ArrayView<T>,
    model: Box<dyn HostCallable<T>>,
    jacobian: Option<Box<dyn HostCallable<T>>>,
    m: usize,
    n: usize,
    failure: Option<CallbackError>,
}

impl<T> CallbackContext<T> {
    /// Create the per-run context.
    ///
    /// Views are shaped `m` (parameters), `n × m` (Jacobian, row-major),
    /// `n` (model output), `nt` (fixed data); only the fixed view is
    /// bound here, to `fixed_ptr`, and it is never rebound afterwards.
    ///
    /// # Safety
    ///
    /// `fixed_ptr` must point to `nt` elements that stay valid and
    /// unmoved for the context's entire lifetime.
    pub unsafe fn new(
        m: usize,
        n: usize,
        nt: usize,
        fixed_ptr: *mut T,
        model: Box<dyn HostCallable<T>>,
        jacobian: Option<Box<dyn HostCallable<T>>>,
    ) -> Result<Self, ShapeError> {
        let params = ArrayView::new(&[m], Teardown::ClearAlias)?;
        let jacobian_buf = ArrayView::new(&[n, m], Teardown::ClearAlias)?;
        let output = ArrayView::new(&[n], Teardown::ClearAlias)?;
        let mut fixed = ArrayView::new(&[nt], Teardown::ClearAlias)?;
        fixed.bind(fixed_ptr);

        Ok(Self {
            params,
            jacobian_buf,
            output,
            fixed,
            model,
            jacobian,
            m,
            n,
            failure: None,
        })
    }

    /// Whether a Jacobian callable was registered.
    pub fn has_jacobian(&self) -> bool {
        self.jacobian.is_some()
    }

    /// Whether a failure has been latched.
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Latch the first failure; later ones are dropped.
    pub fn latch_failure(&mut self, err: CallbackError) {
        self.failure.get_or_insert(err);
    }

    /// Take the latched failure, if any.
    pub fn take_failure(&mut self) -> Option<CallbackError> {
        self.failure.take()
    }

    fn check_dims(&self, m: usize, n: usize) -> Result<(), CallbackError> {
        if m != self.m {
            return Err(CallbackError::ShapeMismatch {
                buffer: "params",
                detail: ShapeError::LengthMismatch {
                    expected: self.m,
                    got: m,
                },
            });
        }
        if n != self.n {
            return Err(CallbackError::ShapeMismatch {
                buffer: "output",
                detail: ShapeError::LengthMismatch {
                    expected: self.n,
                    got: n,
                },
            });
        }
        Ok(())
    }

    /// Invoke the host model callable against fresh solver buffers.
    ///
    /// Rebinds the parameter and output views, then calls the host with
    /// the three views in wire order inside a scope that drops any
    /// transients before the solver resumes. A host return of anything
    /// but exactly one value is an arity violation.
    ///
    /// # Safety
    ///
    /// `p_ptr` must hold `m` elements and `x_ptr` must hold `n` writable
    /// elements, both valid for the duration of this call.
    pub unsafe fn invoke_model(
        &mut self,
        p_ptr: *mut T,
        x_ptr: *mut T,
        m: usize,
        n: usize,
    ) -> Result<(), CallbackError> {
        self.check_dims(m, n)?;
        self.params.bind(p_ptr);
        self.output.bind(x_ptr);

        let yielded = {
            let args = CallArgs {
                params: &self.params,
                output: &mut self.output,
                fixed: &self.fixed,
            };
            self.model.invoke(args)?
        };
        if yielded != 1 {
            return Err(CallbackError::ArityViolation { returned: yielded });
        }
        Ok(())
    }

    /// Invoke the host Jacobian callable; identical protocol against the
    /// Jacobian view.
    ///
    /// # Safety
    ///
    /// `p_ptr` must hold `m` elements and `jac_ptr` must hold `n * m`
    /// writable elements, both valid for the duration of this call.
    pub unsafe fn invoke_jacobian(
        &mut self,
        p_ptr: *mut T,
        jac_ptr: *mut T,
        m: usize,
        n: usize,
    ) -> Result<(), CallbackError> {
        self.check_dims(m, n)?;
        let jacobian = self.jacobian.as_mut().ok_or(CallbackError::MissingJacobian)?;
        self.params.bind(p_ptr);
        self.jacobian_buf.bind(jac_ptr);

        let yielded = {
            let args = CallArgs {
                params: &self.params,
                output: &mut self.jacobian_buf,
                fixed: &self.fixed,
            };
            jacobian.invoke(args)?
        };
        if yielded != 1 {
            return Err(CallbackError::ArityViolation { returned: yielded });
        }
        Ok(())
    }

    /// Tear down all views.
    ///
    /// Clears aliases only; the solver's buffers and the caller's fixed
    /// data are untouched. Idempotent, and also run on drop.
    pub fn release(&mut self) {
        self.params.release();
        self.jacobian_buf.release();
        self.output.release();
        self.fixed.release();
    }
}

impl<T> Drop for CallbackContext<T> {
    fn drop(&mut self) {
        self.release();
    }
}
