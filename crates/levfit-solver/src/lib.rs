//! Levenberg–Marquardt engine behind a fixed C-ABI contract
//!
//! This crate is the solver collaborator of the levfit workspace. It is
//! consumed exclusively through function-pointer signatures that match what
//! a natively compiled fit function exports:
//!
//! ```c
//! void model(double *p, double *x, int m, int n, void *adata);
//! void jacobian(double *p, double *jac, int m, int n, void *adata);
//! ```
//!
//! The caller owns every buffer; the engine only reads `x` and rewrites `p`
//! in place. Both precisions are complete parallel instantiations selected
//! by the type parameter (`f64` or `f32`).
//!
//! Option and info arrays are fixed-size with slot meanings defined here
//! (see [`OPTS_SZ`] and [`INFO_SZ`]); [`FitReport`] decodes the info array
//! for Rust callers that prefer a typed view.

/// Solver crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod contract;
pub mod engine;
pub mod real;
pub mod report;

pub use contract::{JacobianFn, ModelFn, SolverOptions, INFO_SZ, OPTS_SZ};
pub use engine::{lm_der, lm_dif};
pub use real::LmReal;
pub use report::{FitReport, SolverError, StopReason};
