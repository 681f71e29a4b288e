//! Built-in host models
//!
//! These run through the callback bridge exactly like an embedder's own
//! callables would: the registry hands back boxed [`HostCallable`]s and
//! the fit command feeds them to the runtime's callback dispatch path.
//! Each model reads its abscissa from the fixed-data view.

use levfit_runtime::solver::LmReal;
use levfit_runtime::{FnCallable, HostCallable};
use num_traits::Float;

/// A registered model: name, formula summary, callable factories.
pub struct BuiltinModel {
    pub name: &'static str,
    pub formula: &'static str,
    pub params: usize,
}

/// The registry, in display order.
pub const BUILTINS: &[BuiltinModel] = &[
    BuiltinModel {
        name: "gauss-decay",
        formula: "out[i] = p1 * exp(-t[i]^2 * p0^2)",
        params: 2,
    },
    BuiltinModel {
        name: "gauss-peak",
        formula: "out[i] = p0 * exp(-(t[i] - p1)^2 * p2)",
        params: 3,
    },
    BuiltinModel {
        name: "linear",
        formula: "out[i] = p0 * t[i] + p1",
        params: 2,
    },
];

/// Look up a builtin and instantiate its callables at precision `T`.
///
/// Returns the model callable and its analytic Jacobian.
pub fn instantiate<T: LmReal>(
    name: &str,
) -> Option<(Box<dyn HostCallable<T>>, Option<Box<dyn HostCallable<T>>>)> {
    match name {
        "gauss-decay" => {
            let model = FnCallable::new(|p: &[T], out: &mut [T], t: &[T]| {
                for (o, ti) in out.iter_mut().zip(t.iter()) {
                    *o = p[1] * Float::exp(-*ti * *ti * p[0] * p[0]);
                }
            });
            let jac = FnCallable::new(|p: &[T], jac: &mut [T], t: &[T]| {
                let two = T::of(2.0);
                for (i, ti) in t.iter().enumerate() {
                    let ex = Float::exp(-*ti * *ti * p[0] * p[0]);
                    jac[i * 2] = -p[1] * *ti * *ti * two * p[0] * ex;
                    jac[i * 2 + 1] = ex;
                }
            });
            Some((Box::new(model), Some(Box::new(jac))))
        }
        "gauss-peak" => {
            let model = FnCallable::new(|p: &[T], out: &mut [T], t: &[T]| {
                for (o, ti) in out.iter_mut().zip(t.iter()) {
                    let arg = *ti - p[1];
                    *o = p[0] * Float::exp(-arg * arg * p[2]);
                }
            });
            let jac = FnCallable::new(|p: &[T], jac: &mut [T], t: &[T]| {
                let two = T::of(2.0);
                for (i, ti) in t.iter().enumerate() {
                    let arg = *ti - p[1];
                    let ex = Float::exp(-arg * arg * p[2]);
                    jac[i * 3] = ex;
                    jac[i * 3 + 1] = p[0] * two * arg * p[2] * ex;
                    jac[i * 3 + 2] = -p[0] * arg * arg * ex;
                }
            });
            Some((Box::new(model), Some(Box::new(jac))))
        }
        "linear" => {
            let model = FnCallable::new(|p: &[T], out: &mut [T], t: &[T]| {
                for (o, ti) in out.iter_mut().zip(t.iter()) {
                    *o = p[0] * *ti + p[1];
                }
            });
            let jac = FnCallable::new(|_p: &[T], jac: &mut [T], t: &[T]| {
                for (i, ti) in t.iter().enumerate() {
                    jac[i * 2] = *ti;
                    jac[i * 2 + 1] = T::one();
                }
            });
            Some((Box::new(model), Some(Box::new(jac))))
        }
        _ => None,
    }
}

/// Parameter count a builtin expects, for validation before the run.
pub fn param_count(name: &str) -> Option<usize> {
    BUILTINS.iter().find(|b| b.name == name).map(|b| b.params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_instantiates_at_both_precisions() {
        for builtin in BUILTINS {
            assert!(instantiate::<f64>(builtin.name).is_some(), "{}", builtin.name);
            assert!(instantiate::<f32>(builtin.name).is_some(), "{}", builtin.name);
        }
    }

    #[test]
    fn test_unknown_model_is_none() {
        assert!(instantiate::<f64>("quartic-surprise").is_none());
        assert!(param_count("quartic-surprise").is_none());
    }

    #[test]
    fn test_param_counts() {
        assert_eq!(param_count("gauss-decay"), Some(2));
        assert_eq!(param_count("gauss-peak"), Some(3));
        assert_eq!(param_count("linear"), Some(2));
    }
}
