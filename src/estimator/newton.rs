//! Globally convergent Newton root finder: damped Newton steps with a
//! quadratic/cubic backtracking line search (Numerical Recipes style), used
//! to solve the GMH equations (`spec.md` §4.4).
use nalgebra::{DMatrix, DVector};

/// A system of `n` nonlinear equations in `n` unknowns, `F(x) = 0`.
pub trait NonlinearSystem {
    /// Number of equations / unknowns.
    fn dims(&self) -> usize;
    /// Evaluate `F(x)` into `f`.
    fn function(&self, x: &DVector<f64>, f: &mut DVector<f64>);
    /// Evaluate the Jacobian of `F` at `x` into `j`; `f` is `F(x)`, passed
    /// along in case the implementation can reuse it.
    fn jacobian(&self, x: &DVector<f64>, f: &DVector<f64>, j: &mut DMatrix<f64>);
}

/// Why a Newton solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonOutcome {
    /// Converged to a root.
    Successful,
    /// Ran out of iterations without converging.
    MaxIterationsExceeded,
    /// Converged to a local minimum of `0.5*F.F` where the gradient
    /// vanishes but `F` is not zero.
    SpuriousConvergence,
    /// The line search could not find a decreasing step, or the Jacobian
    /// was singular.
    LineSearchError,
}

const TOLERANCE_X: f64 = 1e-9;
const TOLERANCE_FUNCTION: f64 = 1e-6;
const TOLERANCE_GRADIENT: f64 = 1e-8;
const MAX_STEP_FACTOR: f64 = 100.0;
pub(crate) const MAX_ITERATIONS: usize = 75;
const ALPHA: f64 = 1e-4;

fn error_of(f: &DVector<f64>) -> f64 {
    0.5 * f.dot(f)
}

fn max_abs(v: &DVector<f64>) -> f64 {
    (0..v.len()).map(|i| v[i].abs()).fold(0.0, f64::max)
}

fn neg(v: &DVector<f64>) -> DVector<f64> {
    DVector::from_fn(v.len(), |i, _| -v[i])
}

fn sub(a: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
    DVector::from_fn(a.len(), |i, _| a[i] - b[i])
}

fn add_scaled(a: &DVector<f64>, scale: f64, b: &DVector<f64>) -> DVector<f64> {
    DVector::from_fn(a.len(), |i, _| a[i] + scale * b[i])
}

/// `max_i |num_i| / max(|denom_i|, 1)`, the scale-aware convergence test
/// used throughout the algorithm.
fn scaled_max(num: &DVector<f64>, denom_ref: &DVector<f64>) -> f64 {
    (0..num.len())
        .map(|i| num[i].abs() / denom_ref[i].abs().max(1.0))
        .fold(0.0, f64::max)
}

enum LineSearchOutcome {
    Stepped,
    LambdaTooSmall,
    Increasing,
}

#[allow(clippy::too_many_arguments)]
fn line_search(
    x_old: &DVector<f64>,
    g_0: f64,
    gradient: &DVector<f64>,
    delta_raw: DVector<f64>,
    eqn: &dyn NonlinearSystem,
    max_step_size: f64,
    f_scratch: &mut DVector<f64>,
) -> (DVector<f64>, f64, LineSearchOutcome) {
    let delta_norm = delta_raw.norm();
    let delta = if delta_norm > max_step_size {
        add_scaled(&DVector::zeros(x_old.len()), max_step_size / delta_norm, &delta_raw)
    } else {
        delta_raw
    };

    let g_prime_0 = gradient.dot(&delta);
    if !(g_prime_0 < 0.0) {
        return (x_old.clone(), g_0, LineSearchOutcome::Increasing);
    }

    let lambda_min = TOLERANCE_X / scaled_max(&delta, x_old);
    let mut lambda = 1.0_f64;
    let mut lambda1 = 0.0_f64;
    let mut lambda2 = 0.0_f64;
    let mut g_lambda1 = 0.0_f64;
    let mut g_lambda2 = 0.0_f64;

    loop {
        if lambda < lambda_min {
            return (x_old.clone(), g_0, LineSearchOutcome::LambdaTooSmall);
        }

        let x_new = add_scaled(x_old, lambda, &delta);
        eqn.function(&x_new, f_scratch);
        let g_new = error_of(f_scratch);

        if g_new <= g_0 + ALPHA * lambda * g_prime_0 {
            return (x_new, g_new, LineSearchOutcome::Stepped);
        }

        lambda2 = lambda1;
        lambda1 = lambda;
        g_lambda2 = g_lambda1;
        g_lambda1 = g_new;

        let lambda_new = if lambda1 > 1.0 - f64::EPSILON {
            -g_prime_0 / (2.0 * (g_new - g_0 - g_prime_0))
        } else {
            let factor1 = (g_lambda1 - g_prime_0 * lambda1 - g_0) / (lambda1 * lambda1);
            let factor2 = (g_lambda2 - g_prime_0 * lambda2 - g_0) / (lambda2 * lambda2);
            let a = (factor1 - factor2) / (lambda1 - lambda2);
            let b = (-lambda2 * factor1 + lambda1 * factor2) / (lambda1 - lambda2);
            let v = if a == 0.0 {
                -g_prime_0 / (2.0 * b)
            } else {
                let discriminant = b * b - 3.0 * a * g_prime_0;
                if discriminant >= 0.0 {
                    (-b + discriminant.sqrt()) / (3.0 * a)
                } else {
                    0.5 * lambda1
                }
            };
            v.min(0.5 * lambda1)
        };

        lambda = lambda_new.max(0.1 * lambda1);
    }
}

/// Find a root of `eqn` starting from `x_start`, returning the final
/// iterate and why the iteration stopped. The caller decides whether a
/// non-`Successful` outcome should surface as [`crate::error::MuninnError::NoSolution`].
pub fn newton(x_start: DVector<f64>, eqn: &dyn NonlinearSystem) -> (DVector<f64>, NewtonOutcome) {
    let n = eqn.dims();
    let mut f = DVector::zeros(n);
    eqn.function(&x_start, &mut f);

    if max_abs(&f) < 0.01 * TOLERANCE_FUNCTION {
        return (x_start, NewtonOutcome::Successful);
    }

    let max_step_size = MAX_STEP_FACTOR * x_start.norm().max(n as f64);
    let mut x = x_start;
    let mut outcome = NewtonOutcome::MaxIterationsExceeded;
    let mut f_scratch = DVector::zeros(n);

    for _ in 0..MAX_ITERATIONS {
        eqn.function(&x, &mut f);
        let mut jacobian = DMatrix::zeros(n, n);
        eqn.jacobian(&x, &f, &mut jacobian);

        let gradient = jacobian.transpose() * &f;
        let x_old = x.clone();
        let error_old = error_of(&f);

        let rhs = neg(&f);
        let delta = match jacobian.lu().solve(&rhs) {
            Some(d) => d,
            None => {
                outcome = NewtonOutcome::LineSearchError;
                break;
            }
        };

        let (x_new, _, ls_outcome) =
            line_search(&x_old, error_old, &gradient, delta, eqn, max_step_size, &mut f_scratch);

        match ls_outcome {
            LineSearchOutcome::Increasing => {
                outcome = NewtonOutcome::LineSearchError;
                break;
            }
            LineSearchOutcome::LambdaTooSmall => {
                x = x_new;
                eqn.function(&x, &mut f);
                let test = (0..n)
                    .map(|i| gradient[i].abs() * x[i].abs().max(1.0))
                    .fold(0.0, f64::max)
                    / error_old.max(0.5 * n as f64);
                outcome = if test < TOLERANCE_GRADIENT {
                    NewtonOutcome::SpuriousConvergence
                } else {
                    NewtonOutcome::Successful
                };
                break;
            }
            LineSearchOutcome::Stepped => {
                x = x_new;
                eqn.function(&x, &mut f);
                if max_abs(&f) < TOLERANCE_FUNCTION {
                    outcome = NewtonOutcome::Successful;
                    break;
                }
                if scaled_max(&sub(&x_old, &x), &x) < TOLERANCE_X {
                    outcome = NewtonOutcome::Successful;
                    break;
                }
            }
        }
    }

    (x, outcome)
}
