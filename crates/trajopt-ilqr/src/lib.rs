//! Iterative LQR / DDP trajectory optimization.
//!
//! Given discrete-time dynamics `x' = f(x, u)` and a quadratic cost toward a
//! goal state, the solver repeatedly:
//!
//! 1. **Linearizes** the dynamics along the nominal trajectory (central finite
//!    differences unless the model provides exact Jacobians)
//! 2. **Backward pass** computes per-step feedback gains `K` and feedforward
//!    corrections `d` with a regularized Riccati recursion
//! 3. **Forward pass** line-searches the step size `α`, rolling out
//!    `u + K·δx + α·d` and keeping the cheapest trajectory
//!
//! until the total cost stops changing or the iteration limit is hit.
//!
//! ```no_run
//! use trajopt_core::models::DoubleIntegrator;
//! use trajopt_core::prelude::*;
//! use trajopt_ilqr::IlqrSolver;
//!
//! let weights = CostWeights::diagonal(&[1.0, 1.0, 0.1, 0.1], &[1e-3, 1e-3])?;
//! let solver = IlqrSolver::new(DoubleIntegrator::default(), weights, &[], SolverConfig::default())?;
//! let goal = State::from_column_slice(&[10.0, 13.0, 0.0, 0.0]);
//! let solution = solver.solve(&State::zeros(4), &goal)?;
//! println!("cost {:.3} after {} iterations", solution.total_cost(), solution.iterations);
//! # Ok::<(), TrajoptError>(())
//! ```

pub mod backward;
pub mod cost;
pub mod forward;
pub mod jacobian;
pub mod solver;
pub mod types;

/// Crate version, as reported by `trajopt info`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use backward::{backward_pass, linearize, BackwardResult};
pub use cost::{wrap_angle, CostBreakdown, CostModel};
pub use forward::{forward_pass, ForwardResult};
pub use jacobian::{jacobian, jacobian_with_diff, try_jacobian, DEFAULT_EPS};
pub use solver::IlqrSolver;
pub use types::{GainEntry, IterationRecord, Solution, Termination};
