//! Levfit runtime — model dispatch for Levenberg–Marquardt fitting
//!
//! A fit function can reach the solver two ways:
//! - **Native mode**: a compiled function resolved at runtime from a
//!   shared library by name, called directly through the solver's fixed
//!   five-argument contract.
//! - **Callback mode**: a host-side callable invoked once per solver
//!   iteration through a marshalling bridge that exposes the solver's raw
//!   buffers as zero-copy, non-owning array views.
//!
//! This crate provides both paths: the dynamic symbol loader, the bounded
//! error transport, the zero-copy views, the per-run callback context,
//! the setup-time dispatch between the two modes, and a high-level fit
//! runner tying them to the solver crate.

/// Runtime crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod ffi;
pub mod fit;

// Re-export commonly used types
pub use ffi::{
    ArrayView, CallArgs, CallbackContext, CallbackError, CloseStatus, ErrorRecord, FnCallable,
    HostCallError, HostCallable, LibraryHandle, LoadError, LoaderSession, ModelDispatch,
    ResolvedFunction, ShapeError, SolverHook, Teardown,
};
pub use fit::{run_fit, FitConfig, FitError, FitOutcome, ModelSource};

// The solver collaborator, re-exported for callers that tune options or
// decode reports.
pub use levfit_solver as solver;
