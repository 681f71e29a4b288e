//! Damped least-squares iteration
//!
//! Classic Levenberg–Marquardt on the normal equations with Nielsen's
//! damping update: solve `(JᵀJ + μ·I)·δp = Jᵀe`, accept the step when the
//! gain ratio is positive, otherwise grow μ and retry. Cholesky is the
//! primary factorization with an LU fallback for marginally conditioned
//! systems.
//!
//! Both entry points drive the caller's model through the raw
//! function-pointer contract, once per evaluation, passing the opaque
//! `adata` pointer through untouched. [`lm_der`] consumes an analytic
//! Jacobian; [`lm_dif`] approximates it with forward differences.

use crate::contract::{JacobianFn, ModelFn, SolverOptions, INFO_SZ};
use crate::real::LmReal;
use crate::report::{FitReport, SolverError, StopReason};
use nalgebra::{DMatrix, DVector};
use num_traits::Float;
use std::os::raw::{c_int, c_void};

enum JacMode<T> {
    Analytic(JacobianFn<T>),
    ForwardDiff { delta: T },
}

/// Fit `p` so the model output approaches `x`, using an analytic Jacobian.
///
/// `p` is updated in place; `info` receives the raw slot values described
/// on [`INFO_SZ`], and the returned [`FitReport`] is the typed decoding of
/// the same data. A run that stops without converging (singular system,
/// NaN model output, iteration cap) still returns `Ok` — the stop reason
/// tells the caller what happened, mirroring how the info array works.
///
/// # Safety
///
/// `model` and `jacobian` must honor the pointer obligations of
/// [`ModelFn`]/[`JacobianFn`] for the dimensions implied by `p` and `x`,
/// and `adata` must be whatever those functions expect to receive.
pub unsafe fn lm_der<T: LmReal>(
    model: ModelFn<T>,
    jacobian: JacobianFn<T>,
    p: &mut [T],
    x: &[T],
    itmax: usize,
    opts: &SolverOptions<T>,
    info: &mut [T; INFO_SZ],
    adata: *mut c_void,
) -> Result<FitReport, SolverError> {
    lm_core(model, JacMode::Analytic(jacobian), p, x, itmax, opts, info, adata)
}

/// Fit `p` without an analytic Jacobian.
///
/// The Jacobian is approximated by forward differences with step
/// `opts.fdiff_delta`, costing `m` extra model evaluations per iteration.
///
/// # Safety
///
/// Same obligations as [`lm_der`], minus the Jacobian function.
pub unsafe fn lm_dif<T: LmReal>(
    model: ModelFn<T>,
    p: &mut [T],
    x: &[T],
    itmax: usize,
    opts: &SolverOptions<T>,
    info: &mut [T; INFO_SZ],
    adata: *mut c_void,
) -> Result<FitReport, SolverError> {
    let mode = JacMode::ForwardDiff {
        delta: opts.fdiff_delta,
    };
    lm_core(model, mode, p, x, itmax, opts, info, adata)
}

#[allow(clippy::too_many_arguments)]
unsafe fn lm_core<T: LmReal>(
    model: ModelFn<T>,
    jac_mode: JacMode<T>,
    p: &mut [T],
    x: &[T],
    itmax: usize,
    opts: &SolverOptions<T>,
    info: &mut [T; INFO_SZ],
    adata: *mut c_void,
) -> Result<FitReport, SolverError> {
    let m = p.len();
    let n = x.len();
    if m == 0 {
        return Err(SolverError::EmptyParameters);
    }
    if n == 0 {
        return Err(SolverError::EmptyMeasurements);
    }
    if n < m {
        return Err(SolverError::Underdetermined { m, n });
    }

    let mut nfev = 0usize;
    let mut njev = 0usize;
    let mut nsolve = 0usize;

    // Residual at the starting point.
    let mut hx = vec![T::zero(); n];
    model(p.as_mut_ptr(), hx.as_mut_ptr(), m as c_int, n as c_int, adata);
    nfev += 1;
    let mut e = residual(x, &hx);
    let mut cost = e.norm_squared();
    let initial_cost = cost;

    let mut jbuf = vec![T::zero(); n * m];
    let mut hx_try = vec![T::zero(); n];
    let mut p_try = vec![T::zero(); m];

    let mut mu = T::zero();
    let mut nu = T::of(2.0);
    let mut max_diag = T::one();
    let mut grad_inf = T::zero();
    let mut last_step = T::zero();
    let mut iters = 0usize;

    // μ beyond this cannot produce a useful step at either precision.
    let mu_cap = Float::sqrt(Float::max_value());

    let stop = 'outer: loop {
        if !Float::is_finite(cost) {
            break StopReason::InvalidModelValues;
        }
        if iters >= itmax {
            break StopReason::MaxIterations;
        }

        match &jac_mode {
            JacMode::Analytic(jacf) => {
                (*jacf)(p.as_mut_ptr(), jbuf.as_mut_ptr(), m as c_int, n as c_int, adata);
            }
            JacMode::ForwardDiff { delta } => {
                forward_diff(model, p, &hx, *delta, &mut jbuf, &mut hx_try, adata);
                nfev += m;
            }
        }
        njev += 1;

        let j = DMatrix::from_row_slice(n, m, &jbuf);
        let jt = j.transpose();
        let jtj = &jt * &j;
        let jte = &jt * &e;

        grad_inf = jte
            .iter()
            .fold(T::zero(), |acc, v| Float::max(acc, Float::abs(*v)));
        if grad_inf <= opts.eps_gradient {
            break StopReason::SmallGradient;
        }

        max_diag = jtj
            .diagonal()
            .iter()
            .fold(T::zero(), |acc, v| Float::max(acc, *v));
        if iters == 0 {
            mu = opts.init_mu * max_diag;
        }

        iters += 1;

        // Inner loop: retry with larger damping until a step is accepted.
        loop {
            let mut a = jtj.clone();
            for i in 0..m {
                a[(i, i)] += mu;
            }
            nsolve += 1;
            let dp = match a.clone().cholesky() {
                Some(ch) => Some(ch.solve(&jte)),
                None => a.lu().solve(&jte),
            };
            let dp = match dp {
                Some(dp) => dp,
                None => {
                    mu *= nu;
                    nu += nu;
                    if mu > mu_cap {
                        break 'outer StopReason::SingularMatrix;
                    }
                    continue;
                }
            };

            let dp_norm = Float::sqrt(dp.norm_squared());
            let p_norm = Float::sqrt(p.iter().fold(T::zero(), |acc, v| acc + *v * *v));
            if dp_norm <= opts.eps_step * (p_norm + opts.eps_step) {
                break 'outer StopReason::SmallStep;
            }

            for jx in 0..m {
                p_try[jx] = p[jx] + dp[jx];
            }
            model(
                p_try.as_mut_ptr(),
                hx_try.as_mut_ptr(),
                m as c_int,
                n as c_int,
                adata,
            );
            nfev += 1;
            let e_try = residual(x, &hx_try);
            let cost_try = e_try.norm_squared();
            if !Float::is_finite(cost_try) {
                break 'outer StopReason::InvalidModelValues;
            }

            // Predicted reduction of the damped model.
            let predicted = mu * dp.norm_squared() + dp.dot(&jte);
            let actual = cost - cost_try;

            if actual > T::zero() && predicted > T::zero() {
                // Nielsen update: shrink μ according to the gain ratio.
                let rho = actual / predicted;
                let shrink = T::one() - T::of(2.0) * rho;
                let factor = Float::max(T::of(1.0 / 3.0), T::one() + shrink * shrink * shrink);
                mu *= factor;
                nu = T::of(2.0);

                p.copy_from_slice(&p_try);
                hx.copy_from_slice(&hx_try);
                e = e_try;
                cost = cost_try;
                last_step = dp.norm_squared();

                if cost <= opts.eps_residual {
                    break 'outer StopReason::SmallResidual;
                }
                break;
            }

            mu *= nu;
            nu += nu;
            if !Float::is_finite(mu) || mu > mu_cap {
                break 'outer StopReason::NoFurtherReduction;
            }
        }
    };

    info[0] = initial_cost;
    info[1] = cost;
    info[2] = grad_inf;
    info[3] = last_step;
    info[4] = if max_diag > T::zero() { mu / max_diag } else { mu };
    info[5] = T::of(iters as f64);
    info[6] = T::of(stop.code() as f64);
    info[7] = T::of(nfev as f64);
    info[8] = T::of(njev as f64);
    info[9] = T::of(nsolve as f64);

    FitReport::from_info(info)
}

fn residual<T: LmReal>(x: &[T], hx: &[T]) -> DVector<T> {
    DVector::from_iterator(x.len(), x.iter().zip(hx.iter()).map(|(xi, hi)| *xi - *hi))
}

/// Forward-difference Jacobian: column `j` is `(f(p + δeⱼ) − f(p)) / δ`.
unsafe fn forward_diff<T: LmReal>(
    model: ModelFn<T>,
    p: &mut [T],
    hx: &[T],
    delta: T,
    jbuf: &mut [T],
    scratch: &mut [T],
    adata: *mut c_void,
) {
    let m = p.len();
    let n = hx.len();
    for j in 0..m {
        let step = Float::max(delta, delta * Float::abs(p[j]));
        let saved = p[j];
        p[j] = saved + step;
        model(
            p.as_mut_ptr(),
            scratch.as_mut_ptr(),
            m as c_int,
            n as c_int,
            adata,
        );
        p[j] = saved;
        for i in 0..n {
            jbuf[i * m + j] = (scratch[i] - hx[i]) / step;
        }
    }
}
