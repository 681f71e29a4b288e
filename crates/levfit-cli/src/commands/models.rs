//! `levfit models` — list the built-in host models

use crate::builtin::BUILTINS;
use colored::Colorize;

pub fn run() {
    println!("{}", "Built-in models (callback mode):".bold());
    for model in BUILTINS {
        println!(
            "  {:<12} {} parameters   {}",
            model.name.green(),
            model.params,
            model.formula.dimmed()
        );
    }
    println!();
    println!("Use with: levfit fit <problem.json> --model <name>");
}
