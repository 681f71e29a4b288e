//! Unified numeric bounds for the solver scalar type
//!
//! The engine is generic over the measurement precision. `LmReal` collects
//! the bounds it needs into a single trait: nalgebra's `RealField` for the
//! linear algebra, `num_traits::Float` for NaN/infinity handling, and
//! per-precision tuning constants that differ between `f64` and `f32`.
//!
//! `RealField` and `Float` overlap on scalar math, so generic code in this
//! workspace calls those methods through the `Float::` path to keep the
//! resolution unambiguous.

use nalgebra::RealField;
use num_traits::Float;

/// Scalar type usable by the Levenberg–Marquardt engine.
///
/// Implemented for `f64` and `f32`; the two instantiations are complete
/// parallels of every engine entry point.
pub trait LmReal: RealField + Float + Copy + Default + 'static {
    /// Initial damping scale μ₀ (applied to the largest diagonal of JᵀJ).
    const INIT_MU: Self;
    /// Default stopping threshold for gradient / step / residual tests.
    const STOP_THRESH: Self;
    /// Default forward-difference step for approximated Jacobians.
    const DIFF_DELTA: Self;

    /// Narrowing conversion from a literal; infallible for both precisions.
    fn of(v: f64) -> Self;

    /// Lossless widening for diagnostics.
    fn into_f64(self) -> f64;
}

impl LmReal for f64 {
    const INIT_MU: Self = 1e-3;
    const STOP_THRESH: Self = 1e-12;
    const DIFF_DELTA: Self = 1e-6;

    fn of(v: f64) -> Self {
        v
    }

    fn into_f64(self) -> f64 {
        self
    }
}

impl LmReal for f32 {
    const INIT_MU: Self = 1e-3;
    const STOP_THRESH: Self = 1e-5;
    const DIFF_DELTA: Self = 1e-4;

    fn of(v: f64) -> Self {
        v as f32
    }

    fn into_f64(self) -> f64 {
        self as f64
    }
}
