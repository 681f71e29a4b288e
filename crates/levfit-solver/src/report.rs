//! Typed decoding of the engine's info array

use crate::contract::INFO_SZ;
use crate::real::LmReal;
use thiserror::Error;

/// Why the engine stopped iterating.
///
/// The numeric codes are the values stored in info slot 6, so a report
/// decoded from an info array and the raw array always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// ‖Jᵀe‖∞ dropped below the gradient threshold.
    SmallGradient,
    /// Relative step length dropped below the step threshold.
    SmallStep,
    /// Iteration limit reached.
    MaxIterations,
    /// The damped normal equations became unsolvable.
    SingularMatrix,
    /// Damping grew without producing any error reduction.
    NoFurtherReduction,
    /// Squared residual norm dropped below the residual threshold.
    SmallResidual,
    /// The model produced NaN or infinite values.
    InvalidModelValues,
}

impl StopReason {
    /// Numeric code stored in the info array.
    pub fn code(self) -> u32 {
        match self {
            StopReason::SmallGradient => 1,
            StopReason::SmallStep => 2,
            StopReason::MaxIterations => 3,
            StopReason::SingularMatrix => 4,
            StopReason::NoFurtherReduction => 5,
            StopReason::SmallResidual => 6,
            StopReason::InvalidModelValues => 7,
        }
    }

    /// Decode from an info-array code.
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => StopReason::SmallGradient,
            2 => StopReason::SmallStep,
            3 => StopReason::MaxIterations,
            4 => StopReason::SingularMatrix,
            5 => StopReason::NoFurtherReduction,
            6 => StopReason::SmallResidual,
            7 => StopReason::InvalidModelValues,
            _ => return None,
        })
    }

    /// Whether the run ended at a point the caller can trust.
    ///
    /// Convergence by gradient, step, or residual counts; hitting the
    /// iteration cap leaves the best point found so far, which callers
    /// usually still want. The remaining reasons indicate a failed run.
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            StopReason::SmallGradient | StopReason::SmallStep | StopReason::SmallResidual
        )
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            StopReason::SmallGradient => "gradient below threshold",
            StopReason::SmallStep => "step size below threshold",
            StopReason::MaxIterations => "iteration limit reached",
            StopReason::SingularMatrix => "normal equations singular",
            StopReason::NoFurtherReduction => "no further error reduction possible",
            StopReason::SmallResidual => "residual below threshold",
            StopReason::InvalidModelValues => "model produced NaN or infinite values",
        };
        f.write_str(msg)
    }
}

/// Precondition violations the engine refuses to run with.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("system is underdetermined: {n} measurements for {m} parameters")]
    Underdetermined { m: usize, n: usize },

    #[error("parameter vector is empty")]
    EmptyParameters,

    #[error("measurement vector is empty")]
    EmptyMeasurements,

    #[error("info array carried an unknown stop code {0}")]
    UnknownStopCode(u32),
}

/// Typed summary of one engine run, decoded from the info array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    /// ‖e‖² at the starting parameters.
    pub initial_cost: f64,
    /// ‖e‖² at the final parameters.
    pub final_cost: f64,
    /// ‖Jᵀe‖∞ at the final parameters.
    pub gradient_norm: f64,
    /// ‖δp‖² of the last accepted step.
    pub last_step: f64,
    /// Final damping, scaled by the largest JᵀJ diagonal entry.
    pub scaled_mu: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Why iteration stopped.
    pub stop: StopReason,
    /// Model function evaluations.
    pub model_evals: usize,
    /// Jacobian evaluations (analytic or finite-difference sweeps).
    pub jacobian_evals: usize,
    /// Linear systems solved.
    pub linear_solves: usize,
}

impl FitReport {
    /// Decode an info array the engine filled.
    pub fn from_info<T: LmReal>(info: &[T; INFO_SZ]) -> Result<Self, SolverError> {
        let code = info[6].into_f64() as u32;
        let stop = StopReason::from_code(code).ok_or(SolverError::UnknownStopCode(code))?;
        Ok(Self {
            initial_cost: info[0].into_f64(),
            final_cost: info[1].into_f64(),
            gradient_norm: info[2].into_f64(),
            last_step: info[3].into_f64(),
            scaled_mu: info[4].into_f64(),
            iterations: info[5].into_f64() as usize,
            stop,
            model_evals: info[7].into_f64() as usize,
            jacobian_evals: info[8].into_f64() as usize,
            linear_solves: info[9].into_f64() as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(StopReason::SmallGradient)]
    #[case(StopReason::SmallStep)]
    #[case(StopReason::MaxIterations)]
    #[case(StopReason::SingularMatrix)]
    #[case(StopReason::NoFurtherReduction)]
    #[case(StopReason::SmallResidual)]
    #[case(StopReason::InvalidModelValues)]
    fn test_stop_codes_round_trip(#[case] reason: StopReason) {
        assert_eq!(StopReason::from_code(reason.code()), Some(reason));
    }

    #[test]
    fn test_unknown_stop_code_is_rejected() {
        assert_eq!(StopReason::from_code(0), None);
        assert_eq!(StopReason::from_code(42), None);
    }

    #[test]
    fn test_report_decodes_info_array() {
        let info: [f64; INFO_SZ] = [9.0, 1e-20, 1e-18, 1e-16, 1e-6, 12.0, 6.0, 14.0, 12.0, 12.0];
        let report = FitReport::from_info(&info).unwrap();
        assert_eq!(report.iterations, 12);
        assert_eq!(report.stop, StopReason::SmallResidual);
        assert!(report.stop.is_converged());
        assert_eq!(report.model_evals, 14);
    }
}
