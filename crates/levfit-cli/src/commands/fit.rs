//! `levfit fit` — run one fit from a problem file

use crate::builtin;
use crate::problem::Problem;
use anyhow::{anyhow, bail, Result};
use colored::Colorize;
use levfit_runtime::solver::LmReal;
use levfit_runtime::{run_fit, FitOutcome, ModelSource};
use serde_json::json;
use std::path::Path;

/// Model selection from the command line.
pub struct ModelArgs {
    /// Shared library for native mode.
    pub library: Option<String>,
    /// Model symbol name (native mode).
    pub symbol: Option<String>,
    /// Optional Jacobian symbol name (native mode).
    pub jacobian: Option<String>,
    /// Built-in model name (callback mode).
    pub model: Option<String>,
}

pub fn run(problem_path: &Path, args: &ModelArgs, single: bool, json_output: bool) -> Result<()> {
    let problem = Problem::load(problem_path)?;

    if single {
        let init: Vec<f32> = problem.init.iter().map(|&v| v as f32).collect();
        let data: Vec<f32> = problem.data.iter().map(|&v| v as f32).collect();
        let abscissa: Option<Vec<f32>> = problem
            .abscissa
            .as_ref()
            .map(|t| t.iter().map(|&v| v as f32).collect());
        let outcome = execute::<f32>(&problem, args, &init, &data, abscissa.as_deref())?;
        render(&outcome, json_output);
    } else {
        let outcome = execute::<f64>(
            &problem,
            args,
            &problem.init,
            &problem.data,
            problem.abscissa.as_deref(),
        )?;
        render(&outcome, json_output);
    }
    Ok(())
}

fn execute<T: LmReal>(
    problem: &Problem,
    args: &ModelArgs,
    init: &[T],
    data: &[T],
    abscissa: Option<&[T]>,
) -> Result<FitOutcome<T>> {
    let source = select_source::<T>(args, init.len())?;
    let config = problem.fit_config::<T>();
    let outcome = run_fit(source, init, data, abscissa, &config)?;
    if let Some(diag) = &outcome.close_diagnostic {
        eprintln!("{} {}", "warning:".yellow().bold(), diag);
    }
    Ok(outcome)
}

fn select_source<T: LmReal>(args: &ModelArgs, param_count: usize) -> Result<ModelSource<T>> {
    match (&args.library, &args.model) {
        (Some(library), None) => {
            let symbol = args
                .symbol
                .as_ref()
                .ok_or_else(|| anyhow!("--library requires --symbol"))?;
            // SAFETY: native mode trusts the named library to export the
            // documented five-argument fit-function contract; that trust
            // is the user's, stated by passing --library.
            Ok(unsafe {
                ModelSource::native_library(library.clone(), symbol.clone(), args.jacobian.clone())
            })
        }
        (None, Some(model)) => {
            if let Some(expected) = builtin::param_count(model) {
                if expected != param_count {
                    bail!(
                        "model '{}' expects {} parameters, problem file has {}",
                        model,
                        expected,
                        param_count
                    );
                }
            }
            let (callable, jacobian) = builtin::instantiate::<T>(model)
                .ok_or_else(|| anyhow!("unknown model '{}'; see `levfit models`", model))?;
            Ok(ModelSource::host(callable, jacobian))
        }
        (Some(_), Some(_)) => bail!("--library and --model are mutually exclusive"),
        (None, None) => bail!("select a model with --library/--symbol or --model"),
    }
}

fn render<T: LmReal>(outcome: &FitOutcome<T>, json_output: bool) {
    let params: Vec<f64> = outcome.params.iter().map(|p| p.into_f64()).collect();
    let report = &outcome.report;

    if json_output {
        let value = json!({
            "params": params,
            "converged": report.stop.is_converged(),
            "stop_reason": report.stop.to_string(),
            "iterations": report.iterations,
            "initial_cost": report.initial_cost,
            "final_cost": report.final_cost,
            "model_evals": report.model_evals,
            "jacobian_evals": report.jacobian_evals,
        });
        println!("{}", value);
        return;
    }

    let status = if report.stop.is_converged() {
        "converged".green().bold()
    } else {
        "stopped".yellow().bold()
    };
    println!("{} after {} iterations ({})", status, report.iterations, report.stop);
    let rendered: Vec<String> = params.iter().map(|p| format!("{:.6}", p)).collect();
    println!("  parameters: [{}]", rendered.join(", ").cyan());
    println!(
        "  cost: {:.6e} -> {:.6e}",
        report.initial_cost, report.final_cost
    );
    println!(
        "  evaluations: {} model, {} jacobian",
        report.model_evals, report.jacobian_evals
    );
}
