//! Example fit functions with C-ABI exports
//!
//! Each model is exported under the five-argument contract the solver
//! expects (`p, out, m, n, adata`), in both precisions: the double variant
//! under the plain name, the single variant under the `s`-prefixed name.
//! Built as a `cdylib` so the loader can open this crate's artifact by
//! path, and as an `rlib` so tests can take the function pointers directly.
//!
//! The bodies are deliberately trivial formulas; they exist as fixtures
//! for the dispatch paths, not as a model library.

use std::os::raw::{c_int, c_void};
use std::slice;

macro_rules! decay_model {
    ($name:ident, $jac:ident, $t:ty) => {
        /// Exponential decay `out[i] = p[1]·exp(−u²·p[0]²)`, `u = i·10/n − 5`.
        ///
        /// The abscissa is computed internally; `adata` is ignored.
        ///
        /// # Safety
        ///
        /// `p` must hold 2 readable elements and `out` must hold `n`
        /// writable elements.
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            p: *mut $t,
            out: *mut $t,
            _m: c_int,
            n: c_int,
            _adata: *mut c_void,
        ) {
            let n = n as usize;
            let p = slice::from_raw_parts(p, 2);
            let out = slice::from_raw_parts_mut(out, n);
            for (i, oi) in out.iter_mut().enumerate() {
                let u = (i as $t) * 10.0 / (n as $t) - 5.0;
                *oi = p[1] * (-u * u * p[0] * p[0]).exp();
            }
        }

        /// Analytic Jacobian of the decay model, row-major `n × 2`.
        ///
        /// # Safety
        ///
        /// `p` must hold 2 readable elements and `out` must hold `n * 2`
        /// writable elements.
        #[no_mangle]
        pub unsafe extern "C" fn $jac(
            p: *mut $t,
            out: *mut $t,
            m: c_int,
            n: c_int,
            _adata: *mut c_void,
        ) {
            let (m, n) = (m as usize, n as usize);
            let p = slice::from_raw_parts(p, m);
            let out = slice::from_raw_parts_mut(out, n * m);
            for i in 0..n {
                let u = (i as $t) * 10.0 / (n as $t) - 5.0;
                let ex = (-u * u * p[0] * p[0]).exp();
                out[i * m] = -p[1] * u * u * 2.0 * p[0] * ex;
                out[i * m + 1] = ex;
            }
        }
    };
}

macro_rules! peak_model {
    ($name:ident, $jac:ident, $t:ty) => {
        /// Three-parameter gaussian `out[i] = p[0]·exp(−(t[i]−p[1])²·p[2])`.
        ///
        /// `adata` is the abscissa: a pointer to `n` values of the same
        /// precision, exactly as a native caller passes its `t` array.
        ///
        /// # Safety
        ///
        /// `p` must hold 3 readable elements, `out` must hold `n` writable
        /// elements, and `adata` must point to `n` readable elements.
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            p: *mut $t,
            out: *mut $t,
            _m: c_int,
            n: c_int,
            adata: *mut c_void,
        ) {
            let n = n as usize;
            let p = slice::from_raw_parts(p, 3);
            let t = slice::from_raw_parts(adata as *const $t, n);
            let out = slice::from_raw_parts_mut(out, n);
            for i in 0..n {
                let arg = t[i] - p[1];
                out[i] = p[0] * (-arg * arg * p[2]).exp();
            }
        }

        /// Analytic Jacobian of the peak model, row-major `n × 3`.
        ///
        /// # Safety
        ///
        /// Same as the model, with `out` holding `n * 3` writable elements.
        #[no_mangle]
        pub unsafe extern "C" fn $jac(
            p: *mut $t,
            out: *mut $t,
            m: c_int,
            n: c_int,
            adata: *mut c_void,
        ) {
            let (m, n) = (m as usize, n as usize);
            let p = slice::from_raw_parts(p, m);
            let t = slice::from_raw_parts(adata as *const $t, n);
            let out = slice::from_raw_parts_mut(out, n * m);
            for i in 0..n {
                let arg = t[i] - p[1];
                let ex = (-arg * arg * p[2]).exp();
                out[i * m] = ex;
                out[i * m + 1] = p[0] * 2.0 * arg * p[2] * ex;
                out[i * m + 2] = -p[0] * arg * arg * ex;
            }
        }
    };
}

macro_rules! modros_model {
    ($name:ident, $jac:ident, $t:ty) => {
        /// Modified Rosenbrock problem, global minimum at `(1, 1)`.
        ///
        /// `n` must be a multiple of 3; `adata` is ignored.
        ///
        /// # Safety
        ///
        /// `p` must hold 2 readable elements and `out` must hold `n`
        /// writable elements.
        #[no_mangle]
        pub unsafe extern "C" fn $name(
            p: *mut $t,
            out: *mut $t,
            _m: c_int,
            n: c_int,
            _adata: *mut c_void,
        ) {
            const LAM: f64 = 1e2;
            let n = n as usize;
            let p = slice::from_raw_parts(p, 2);
            let out = slice::from_raw_parts_mut(out, n);
            let mut i = 0;
            while i < n {
                out[i] = 10.0 * (p[1] - p[0] * p[0]);
                out[i + 1] = 1.0 - p[0];
                out[i + 2] = LAM as $t;
                i += 3;
            }
        }

        /// Analytic Jacobian of the modified Rosenbrock problem.
        ///
        /// # Safety
        ///
        /// `p` must hold 2 readable elements and `out` must hold `n * 2`
        /// writable elements.
        #[no_mangle]
        pub unsafe extern "C" fn $jac(
            p: *mut $t,
            out: *mut $t,
            m: c_int,
            n: c_int,
            _adata: *mut c_void,
        ) {
            let (m, n) = (m as usize, n as usize);
            let p = slice::from_raw_parts(p, m);
            let out = slice::from_raw_parts_mut(out, n * m);
            let mut i = 0;
            while i < n {
                out[i * m] = -20.0 * p[0];
                out[i * m + 1] = 10.0;
                out[(i + 1) * m] = -1.0;
                out[(i + 1) * m + 1] = 0.0;
                out[(i + 2) * m] = 0.0;
                out[(i + 2) * m + 1] = 0.0;
                i += 3;
            }
        }
    };
}

decay_model!(gauss_decay, jacgauss_decay, f64);
decay_model!(sgauss_decay, sjacgauss_decay, f32);
peak_model!(gauss_peak, jacgauss_peak, f64);
peak_model!(sgauss_peak, sjacgauss_peak, f32);
modros_model!(modros, jacmodros, f64);
modros_model!(smodros, sjacmodros, f32);
