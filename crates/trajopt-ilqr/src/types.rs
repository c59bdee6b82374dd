//! Solver outputs and per-step intermediate results.

use std::fmt;

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use trajopt_core::types::Trajectory;

use crate::cost::CostBreakdown;

/// Local feedback law for one timestep: `Δu = K·δx + α·d`.
#[derive(Clone, Debug)]
pub struct GainEntry {
    /// Feedback gain (m×n).
    pub k: DMatrix<f64>,
    /// Feedforward correction (m).
    pub d: DVector<f64>,
    /// Predicted value change `dᵀQu + ½dᵀQuu·d`, non-positive at a descent step.
    pub expected_improvement: f64,
}

/// Why the outer loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Total cost changed by less than the tolerance between iterations.
    Converged,
    /// Iteration limit reached first.
    MaxIterations,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Converged => f.write_str("converged"),
            Self::MaxIterations => f.write_str("max iterations"),
        }
    }
}

/// Summary of one outer iteration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct IterationRecord {
    /// 1-based iteration number.
    pub iteration: usize,
    /// Total cost after the forward pass.
    pub cost: f64,
    /// Accepted step size; `None` when the nominal trajectory was kept.
    pub alpha: Option<f64>,
    /// Regularization in effect at the end of the backward pass.
    pub regularization: f64,
    /// Sum of the per-step expected improvements.
    pub expected_improvement: f64,
}

/// Result of a solve.
#[derive(Clone, Debug)]
pub struct Solution {
    pub trajectory: Trajectory,
    pub cost: CostBreakdown,
    pub iterations: usize,
    pub termination: Termination,
    pub history: Vec<IterationRecord>,
}

impl Solution {
    pub fn total_cost(&self) -> f64 {
        self.cost.total()
    }

    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}
