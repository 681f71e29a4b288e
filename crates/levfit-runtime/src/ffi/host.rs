//! Host-callable capability interface
//!
//! A model written in a host environment — an embedded interpreter, a
//! scripting bridge, or plain Rust closures — is exposed to the dispatch
//! layer as a single capability: invoke with three zero-copy views and
//! report how many values came back. Argument order is part of the wire
//! contract: parameters, then the output (or Jacobian) buffer, then the
//! fixed data. Adapters stay dumb; arity enforcement belongs to the
//! callback context.

use crate::ffi::view::ArrayView;

/// Host-side invocation errors
#[derive(Debug, Clone, PartialEq)]
pub enum HostCallError {
    /// The host failed to execute the callable.
    ExecutionFailed(String),
    /// A view the callable needs was not bound.
    UnboundView { which: &'static str },
}

impl std::fmt::Display for HostCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostCallError::ExecutionFailed(msg) => write!(f, "Host call failed: {}", msg),
            HostCallError::UnboundView { which } => {
                write!(f, "View '{}' is not bound to a buffer", which)
            }
        }
    }
}

impl std::error::Error for HostCallError {}

/// The three views handed to a host callable, in wire order.
pub struct CallArgs<'a, T> {
    /// Current parameter vector (read).
    pub params: &'a ArrayView<T>,
    /// Model output or Jacobian buffer (written).
    pub output: &'a mut ArrayView<T>,
    /// Fixed abscissa data, bound once per run (read).
    pub fixed: &'a ArrayView<T>,
}

/// A callable living in a host environment.
///
/// `invoke` runs the host function synchronously and returns the number
/// of values the host produced. The contract requires exactly one; the
/// context enforces that so every adapter reports honestly rather than
/// papering over host quirks.
pub trait HostCallable<T> {
    fn invoke(&mut self, args: CallArgs<'_, T>) -> Result<usize, HostCallError>;
}

/// Adapter for Rust-closure hosts.
///
/// The closure sees the three buffers as slices in wire order and its
/// single return value is the unit the closure itself yields, so the
/// adapter always reports one value.
pub struct FnCallable<F> {
    f: F,
}

impl<F> FnCallable<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<T, F> HostCallable<T> for FnCallable<F>
where
    F: FnMut(&[T], &mut [T], &[T]),
{
    fn invoke(&mut self, args: CallArgs<'_, T>) -> Result<usize, HostCallError> {
        let params = args
            .params
            .as_slice()
            .ok_or(HostCallError::UnboundView { which: "params" })?;
        let fixed = args
            .fixed
            .as_slice()
            .ok_or(HostCallError::UnboundView { which: "fixed" })?;
        let output = args
            .output
            .as_mut_slice()
            .ok_or(HostCallError::UnboundView { which: "output" })?;
        (self.f)(params, output, fixed);
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::view::Teardown;
    use pretty_assertions::assert_eq;

    fn bound_view(buf: &mut [f64]) -> ArrayView<f64> {
        let mut view = ArrayView::new(&[buf.len()], Teardown::ClearAlias).unwrap();
        unsafe { view.bind(buf.as_mut_ptr()) };
        view
    }

    #[test]
    fn test_closure_adapter_reports_one_value() {
        let mut p = [2.0f64, 3.0];
        let mut out = [0.0f64; 4];
        let mut t = [0.0f64, 1.0, 2.0, 3.0];

        let params = bound_view(&mut p);
        let mut output = bound_view(&mut out);
        let fixed = bound_view(&mut t);

        let mut callable = FnCallable::new(|p: &[f64], out: &mut [f64], t: &[f64]| {
            for (o, ti) in out.iter_mut().zip(t.iter()) {
                *o = p[0] * ti + p[1];
            }
        });

        let yielded = callable
            .invoke(CallArgs {
                params: &params,
                output: &mut output,
                fixed: &fixed,
            })
            .unwrap();

        assert_eq!(yielded, 1);
        assert_eq!(out, [3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_unbound_output_is_reported() {
        let mut p = [1.0f64];
        let mut t = [1.0f64];
        let params = bound_view(&mut p);
        let fixed = bound_view(&mut t);
        let mut output = ArrayView::new(&[1], Teardown::ClearAlias).unwrap();

        let mut callable = FnCallable::new(|_: &[f64], _: &mut [f64], _: &[f64]| {});
        let err = callable
            .invoke(CallArgs {
                params: &params,
                output: &mut output,
                fixed: &fixed,
            })
            .unwrap_err();
        assert_eq!(err, HostCallError::UnboundView { which: "output" });
    }
}
