use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod builtin;
mod commands;
mod config;
mod problem;

/// Levenberg–Marquardt curve fitting with loadable model functions.
///
/// Models come from one of two places: a natively compiled function
/// resolved from a shared library by symbol name, or a built-in model run
/// through the callback bridge.
///
/// EXAMPLES:
///     levfit fit problem.json --model gauss-peak
///     levfit fit problem.json --library ./libmodels.so --symbol gauss_decay
///     levfit models
///
/// ENVIRONMENT VARIABLES:
///     LEVFIT_JSON   Set to '1' for JSON output by default
///     NO_COLOR      Set to disable colored output
#[derive(Parser)]
#[command(name = "levfit")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a fit described by a JSON problem file
    ///
    /// Native mode (--library/--symbol) resolves the model from a shared
    /// library and calls it directly; callback mode (--model) runs a
    /// built-in model through the zero-copy callback bridge. Exactly one
    /// of the two must be selected.
    #[command(visible_alias = "f")]
    Fit {
        /// Path to the JSON problem file
        problem: PathBuf,
        /// Shared library to load the model from (native mode)
        #[arg(long)]
        library: Option<String>,
        /// Model symbol name inside the library
        #[arg(long, requires = "library")]
        symbol: Option<String>,
        /// Jacobian symbol name; forward differences when omitted
        #[arg(long, requires = "symbol")]
        jacobian: Option<String>,
        /// Built-in model to run through the callback bridge
        #[arg(long, conflicts_with = "library")]
        model: Option<String>,
        /// Fit in single precision
        #[arg(long)]
        single: bool,
        /// Output the report as JSON
        #[arg(long, env = "LEVFIT_JSON")]
        json: bool,
    },

    /// List the built-in models
    #[command(visible_alias = "m")]
    Models,
}

fn main() -> Result<()> {
    let cfg = config::Config::from_env();
    cfg.apply();

    let cli = Cli::parse();
    match cli.command {
        Commands::Fit {
            problem,
            library,
            symbol,
            jacobian,
            model,
            single,
            json,
        } => {
            let args = commands::fit::ModelArgs {
                library,
                symbol,
                jacobian,
                model,
            };
            commands::fit::run(&problem, &args, single, json || cfg.default_json)
        }
        Commands::Models => {
            commands::models::run();
            Ok(())
        }
    }
}
