//! Backward pass: regularized Riccati recursion over the nominal trajectory.
//!
//! Starting from the terminal cost's quadratic model, each step expands the
//! Q-function around `(x_t, u_t)`, solves for the locally optimal control
//! correction and propagates the value model one step back in time.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use tracing::warn;

use trajopt_core::config::RegularizationConfig;
use trajopt_core::error::SolveError;
use trajopt_core::traits::Dynamics;
use trajopt_core::types::{Control, State, Trajectory};

use crate::cost::CostModel;
use crate::jacobian::jacobian_with_diff;
use crate::types::GainEntry;

/// Gains for every timestep, ordered first to last.
#[derive(Clone, Debug)]
pub struct BackwardResult {
    pub gains: Vec<GainEntry>,
    /// Regularization in effect when the pass finished.
    pub regularization: f64,
}

impl BackwardResult {
    /// Σ of the per-step value improvement estimates.
    pub fn expected_improvement(&self) -> f64 {
        self.gains.iter().map(|g| g.expected_improvement).sum()
    }
}

/// `(∂f/∂x, ∂f/∂u)` at `(x, u)`.
///
/// Uses the model's exact Jacobians when it provides them, otherwise central
/// differences with state outputs compared through `cost.diff`.
pub fn linearize<D: Dynamics + ?Sized>(
    dynamics: &D,
    cost: &CostModel,
    x: &State,
    u: &Control,
    eps: f64,
) -> (DMatrix<f64>, DMatrix<f64>) {
    if let Some(exact) = dynamics.jacobians(x, u) {
        return exact;
    }
    let diff = |a: &DVector<f64>, b: &DVector<f64>| cost.diff(a, b);
    let a = jacobian_with_diff(|x| dynamics.step(x, u), x, eps, diff);
    let b = jacobian_with_diff(|u| dynamics.step(x, u), u, eps, diff);
    (a, b)
}

/// Run the backward recursion over `nominal`.
///
/// `ρ` starts at `config.initial` and only grows within the pass: once a step
/// needed more damping, every earlier step is solved with at least that much.
pub fn backward_pass<D: Dynamics + ?Sized>(
    dynamics: &D,
    cost: &CostModel,
    nominal: &Trajectory,
    eps: f64,
    config: &RegularizationConfig,
) -> Result<BackwardResult, SolveError> {
    let horizon = nominal.horizon();
    let states = nominal.states();
    let controls = nominal.controls();

    let final_state = nominal.final_state();
    let mut p = cost.terminal_gradient(final_state);
    let mut pp = cost.terminal_hessian().clone();
    let mut rho = config.initial;
    let mut gains = Vec::with_capacity(horizon);

    for t in (0..horizon).rev() {
        let (x, u) = (&states[t], &controls[t]);
        let (a, b) = linearize(dynamics, cost, x, u, eps);

        let at = a.transpose();
        let bt = b.transpose();
        let pa = &pp * &a;

        let qx = cost.state_gradient(x) + &at * &p;
        let qu = cost.control_gradient(u) + &bt * &p;
        let qxx = cost.state_hessian() + &at * &pa;
        let quu = cost.control_hessian() + &bt * &pp * &b;
        let qux = &bt * &pa;

        let mut attempts = 0;
        let quu_inv = loop {
            attempts += 1;
            if let Some(inv) = regularized_inverse(&quu, rho, config.max_condition) {
                break inv;
            }
            if attempts >= config.max_attempts {
                return Err(SolveError::IllConditioned {
                    step: t,
                    attempts,
                    regularization: rho,
                });
            }
            rho *= config.growth;
            warn!(
                step = t,
                attempt = attempts,
                regularization = rho,
                "Quu ill-conditioned, increasing regularization"
            );
        };

        let k = -(&quu_inv * &qux);
        let d = -(&quu_inv * &qu);
        let expected_improvement = d.dot(&qu) + 0.5 * d.dot(&(&quu * &d));

        // Value update uses the unregularized Quu.
        let kt = k.transpose();
        let kt_quu = &kt * &quu;
        let quxt = qux.transpose();
        let next_pp = &qxx + &kt_quu * &k + &kt * &qux + &quxt * &k;
        pp = (&next_pp + next_pp.transpose()) * 0.5;
        p = &qx + &kt_quu * &d + &kt * &qu + &quxt * &d;

        gains.push(GainEntry {
            k,
            d,
            expected_improvement,
        });
    }

    gains.reverse();
    Ok(BackwardResult {
        gains,
        regularization: rho,
    })
}

/// `(Quu + ρI)⁻¹`, or `None` when the damped matrix is not positive definite
/// or its condition number exceeds `max_condition`.
fn regularized_inverse(quu: &DMatrix<f64>, rho: f64, max_condition: f64) -> Option<DMatrix<f64>> {
    let m = quu.nrows();
    if m == 0 {
        return Some(DMatrix::zeros(0, 0));
    }
    let damped = quu + DMatrix::identity(m, m) * rho;
    let damped = (&damped + damped.transpose()) * 0.5;
    let eigen = SymmetricEigen::new(damped);

    let min = eigen.eigenvalues.min();
    let max = eigen.eigenvalues.max();
    // NaN fails both comparisons.
    let well_conditioned = min > 0.0 && max / min <= max_condition;
    if !well_conditioned {
        return None;
    }

    let inv_values = eigen.eigenvalues.map(|l| 1.0 / l);
    Some(&eigen.eigenvectors * DMatrix::from_diagonal(&inv_values) * eigen.eigenvectors.transpose())
}
