//! Fit problem description files
//!
//! A problem file is JSON: measurement data, starting parameters, and
//! optionally the abscissa and solver tuning. Values are written in
//! double precision; single-precision runs narrow them at load time.

use anyhow::{bail, Context, Result};
use levfit_runtime::solver::{LmReal, SolverOptions};
use levfit_runtime::FitConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// On-disk problem description.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Problem {
    /// Measurement vector the model output is fitted against.
    pub data: Vec<f64>,
    /// Starting parameter vector.
    pub init: Vec<f64>,
    /// Fixed abscissa handed to the model; defaults to measurement indices.
    #[serde(default)]
    pub abscissa: Option<Vec<f64>>,
    /// Iteration cap; defaults to the runtime default.
    #[serde(default)]
    pub max_iterations: Option<usize>,
    /// Solver tuning overrides.
    #[serde(default)]
    pub options: Options,
}

/// Optional solver tuning; unset fields keep the precision defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Options {
    pub init_mu: Option<f64>,
    pub eps_gradient: Option<f64>,
    pub eps_step: Option<f64>,
    pub eps_residual: Option<f64>,
    pub fdiff_delta: Option<f64>,
}

impl Problem {
    /// Load and validate a problem file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read problem file '{}'", path.display()))?;
        let problem: Problem = serde_json::from_str(&text)
            .with_context(|| format!("invalid problem file '{}'", path.display()))?;

        if problem.data.is_empty() {
            bail!("problem file has no measurement data");
        }
        if problem.init.is_empty() {
            bail!("problem file has no starting parameters");
        }
        if problem.data.len() < problem.init.len() {
            bail!(
                "underdetermined problem: {} measurements for {} parameters",
                problem.data.len(),
                problem.init.len()
            );
        }
        if let Some(t) = &problem.abscissa {
            if t.len() != problem.data.len() {
                bail!(
                    "abscissa length {} does not match data length {}",
                    t.len(),
                    problem.data.len()
                );
            }
        }
        Ok(problem)
    }

    /// Build the runtime fit configuration at the requested precision.
    pub fn fit_config<T: LmReal>(&self) -> FitConfig<T> {
        let mut config = FitConfig::<T>::default();
        if let Some(itmax) = self.max_iterations {
            config.max_iterations = itmax;
        }
        let defaults = SolverOptions::<T>::default();
        config.options = SolverOptions {
            init_mu: narrow(self.options.init_mu, defaults.init_mu),
            eps_gradient: narrow(self.options.eps_gradient, defaults.eps_gradient),
            eps_step: narrow(self.options.eps_step, defaults.eps_step),
            eps_residual: narrow(self.options.eps_residual, defaults.eps_residual),
            fdiff_delta: narrow(self.options.fdiff_delta, defaults.fdiff_delta),
        };
        config
    }
}

fn narrow<T: LmReal>(value: Option<f64>, default: T) -> T {
    value.map(T::of).unwrap_or(default)
}
