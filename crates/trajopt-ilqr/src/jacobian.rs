//! Central finite-difference Jacobians.
//!
//! Column `i` of the Jacobian of `f` at `x0` is
//! `(f(x0 + eps·e_i) - f(x0 - eps·e_i)) / (2·eps)`, which is exact for
//! linear maps and carries `O(eps²)` truncation error otherwise.

use std::convert::Infallible;

use nalgebra::{DMatrix, DVector};

/// Default probe step.
pub const DEFAULT_EPS: f64 = 1e-4;

/// Jacobian of `f` at `x0` using plain subtraction between probe outputs.
pub fn jacobian<F>(mut f: F, x0: &DVector<f64>, eps: f64) -> DMatrix<f64>
where
    F: FnMut(&DVector<f64>) -> DVector<f64>,
{
    jacobian_with_diff(|x| f(x), x0, eps, |a, b| a - b)
}

/// Jacobian of `f` at `x0` where probe outputs are compared with `diff`.
///
/// Used when the outputs are states with angular components, so that a
/// probe straddling the ±π seam does not produce a spurious 2π jump.
pub fn jacobian_with_diff<F, D>(mut f: F, x0: &DVector<f64>, eps: f64, diff: D) -> DMatrix<f64>
where
    F: FnMut(&DVector<f64>) -> DVector<f64>,
    D: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
{
    match try_jacobian_with_diff(|x| Ok::<_, Infallible>(f(x)), x0, eps, diff) {
        Ok(jac) => jac,
        Err(never) => match never {},
    }
}

/// Fallible variant of [`jacobian`]: the first error returned by `f` is
/// propagated unchanged.
pub fn try_jacobian<F, E>(f: F, x0: &DVector<f64>, eps: f64) -> Result<DMatrix<f64>, E>
where
    F: FnMut(&DVector<f64>) -> Result<DVector<f64>, E>,
{
    try_jacobian_with_diff(f, x0, eps, |a, b| a - b)
}

fn try_jacobian_with_diff<F, D, E>(
    mut f: F,
    x0: &DVector<f64>,
    eps: f64,
    diff: D,
) -> Result<DMatrix<f64>, E>
where
    F: FnMut(&DVector<f64>) -> Result<DVector<f64>, E>,
    D: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
{
    let n = x0.len();
    let mut probe = x0.clone();
    let mut jac: Option<DMatrix<f64>> = None;

    for i in 0..n {
        probe[i] = x0[i] + eps;
        let plus = f(&probe)?;
        probe[i] = x0[i] - eps;
        let minus = f(&probe)?;
        probe[i] = x0[i];

        let column = diff(&plus, &minus) / (2.0 * eps);
        jac.get_or_insert_with(|| DMatrix::zeros(column.len(), n))
            .set_column(i, &column);
    }

    match jac {
        Some(jac) => Ok(jac),
        // No inputs: still report the output dimension.
        None => Ok(DMatrix::zeros(f(x0)?.len(), 0)),
    }
}
