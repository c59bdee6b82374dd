//! Integration test: on a linear system with quadratic cost the solver must
//! reproduce the closed-form finite-horizon discrete LQR controls.
//!
//! The reference is the textbook recursion
//!   V_T = Qf
//!   K_t = -(R + BᵀV B)⁻¹ BᵀV A
//!   V_t = Q + KᵀRK + (A + BK)ᵀ V (A + BK)
//! rolled out as u_t = K_t x_t from the same initial state.

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};

use trajopt_core::models::LinearSystem;
use trajopt_core::prelude::*;
use trajopt_ilqr::IlqrSolver;

const STEPS: usize = 20;

struct Lqr {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    q: DMatrix<f64>,
    r: DMatrix<f64>,
    qf: DMatrix<f64>,
}

impl Lqr {
    fn controls(&self, x0: &DVector<f64>, steps: usize) -> Vec<DVector<f64>> {
        let mut v = self.qf.clone();
        let mut gains = Vec::with_capacity(steps);
        for _ in 0..steps {
            let btv = self.b.transpose() * &v;
            let k = -(&self.r + &btv * &self.b).try_inverse().unwrap() * &btv * &self.a;
            let closed = &self.a + &self.b * &k;
            v = &self.q + k.transpose() * &self.r * &k + closed.transpose() * &v * &closed;
            gains.push(k);
        }
        gains.reverse();

        let mut x = x0.clone();
        gains
            .iter()
            .map(|k| {
                let u = k * &x;
                x = &self.a * &x + &self.b * &u;
                u
            })
            .collect()
    }
}

fn cart() -> Lqr {
    // 1-D double integrator, dt = 0.1.
    Lqr {
        a: DMatrix::from_row_slice(2, 2, &[1.0, 0.1, 0.0, 1.0]),
        b: DMatrix::from_row_slice(2, 1, &[0.005, 0.1]),
        q: DMatrix::identity(2, 2),
        r: DMatrix::identity(1, 1) * 0.1,
        qf: DMatrix::identity(2, 2) * 10.0,
    }
}

fn assert_matches_lqr(lqr: &Lqr, system: LinearSystem, x0: &DVector<f64>) {
    let weights = CostWeights::new(lqr.q.clone(), lqr.qf.clone(), lqr.r.clone()).unwrap();
    let n = lqr.a.nrows();
    let config = SolverConfig {
        steps: STEPS,
        ..SolverConfig::default()
    };
    let solver = IlqrSolver::new(system, weights, &[], config).unwrap();
    let solution = solver.solve(x0, &DVector::zeros(n)).unwrap();

    let expected = lqr.controls(x0, STEPS);
    for (t, (got, want)) in solution
        .trajectory
        .controls()
        .iter()
        .zip(&expected)
        .enumerate()
    {
        for i in 0..want.len() {
            assert!(
                (got[i] - want[i]).abs() < 1e-4 * want[i].abs().max(1.0),
                "step {t}, input {i}: got {}, want {}",
                got[i],
                want[i]
            );
        }
    }
}

#[test]
fn matches_lqr_with_exact_jacobians() {
    let lqr = cart();
    let system = LinearSystem::new(lqr.a.clone(), lqr.b.clone()).unwrap();
    assert_matches_lqr(&lqr, system, &DVector::from_column_slice(&[1.0, 0.0]));
}

#[test]
fn matches_lqr_with_cross_coupled_weights() {
    let mut lqr = cart();
    lqr.q = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
    lqr.qf = DMatrix::from_row_slice(2, 2, &[20.0, 3.0, 3.0, 5.0]);
    let system = LinearSystem::new(lqr.a.clone(), lqr.b.clone()).unwrap();
    assert_matches_lqr(&lqr, system, &DVector::from_column_slice(&[-2.0, 0.7]));
}

#[test]
fn matches_lqr_with_finite_differences() {
    // Same system behind a closure, so the solver has to difference it.
    let lqr = cart();
    let (a, b) = (lqr.a.clone(), lqr.b.clone());
    let system = FnDynamics::new(2, 1, move |x: &State, u: &Control| &a * x + &b * u);

    let weights = CostWeights::new(lqr.q.clone(), lqr.qf.clone(), lqr.r.clone()).unwrap();
    let config = SolverConfig {
        steps: STEPS,
        ..SolverConfig::default()
    };
    let solver = IlqrSolver::new(system, weights, &[], config).unwrap();
    let x0 = DVector::from_column_slice(&[1.0, 0.0]);
    let solution = solver.solve(&x0, &DVector::zeros(2)).unwrap();

    let expected = lqr.controls(&x0, STEPS);
    for (got, want) in solution.trajectory.controls().iter().zip(&expected) {
        assert_relative_eq!(got[0], want[0], epsilon = 1e-4, max_relative = 1e-4);
    }
}

#[test]
fn multi_input_system_matches_lqr() {
    // Two coupled masses, each with its own force input.
    let a = DMatrix::from_row_slice(
        4,
        4,
        &[
            1.0, 0.0, 0.1, 0.0, //
            0.0, 1.0, 0.0, 0.1, //
            -0.02, 0.02, 0.99, 0.0, //
            0.02, -0.02, 0.0, 0.99,
        ],
    );
    let b = DMatrix::from_row_slice(4, 2, &[0.005, 0.0, 0.0, 0.005, 0.1, 0.0, 0.0, 0.1]);
    let lqr = Lqr {
        a: a.clone(),
        b: b.clone(),
        q: DMatrix::from_diagonal(&DVector::from_column_slice(&[1.0, 2.0, 0.1, 0.1])),
        r: DMatrix::identity(2, 2) * 0.05,
        qf: DMatrix::identity(4, 4) * 25.0,
    };
    let system = LinearSystem::new(a, b).unwrap();
    assert_matches_lqr(&lqr, system, &DVector::from_column_slice(&[1.0, -1.0, 0.0, 0.5]));
}
