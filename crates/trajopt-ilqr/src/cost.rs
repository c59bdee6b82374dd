//! Quadratic tracking cost with angle-aware state differences.

use std::f64::consts::{PI, TAU};

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use trajopt_core::error::ValidationError;
use trajopt_core::types::{Control, CostWeights, State, Trajectory};

/// Wrap an angle into `(-π, π]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Total cost of a trajectory split by term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    /// Σ dxᵀ Q dx over the first `T` states.
    pub state: f64,
    /// Σ uᵀ R u over all `T` controls.
    pub control: f64,
    /// dxᵀ Qf dx on the final state.
    pub terminal: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.state + self.control + self.terminal
    }
}

/// Quadratic cost toward a fixed goal state.
///
/// Derivatives are closed form: the running and terminal costs are quadratic
/// by construction, so nothing here is finite-differenced.
#[derive(Debug, Clone)]
pub struct CostModel {
    weights: CostWeights,
    goal: State,
    angular: Vec<usize>,
    q_hessian: DMatrix<f64>,
    r_hessian: DMatrix<f64>,
    qf_hessian: DMatrix<f64>,
}

impl CostModel {
    pub fn new(
        weights: CostWeights,
        goal: State,
        angular: &[usize],
    ) -> Result<Self, ValidationError> {
        let n = weights.state_dim();
        if goal.len() != n {
            return Err(ValidationError::DimensionMismatch {
                name: "goal",
                expected: n,
                got: goal.len(),
            });
        }
        if !goal.iter().all(|v| v.is_finite()) {
            return Err(ValidationError::NonFinite { name: "goal" });
        }
        if let Some(&index) = angular.iter().find(|&&i| i >= n) {
            return Err(ValidationError::AngularIndexOutOfRange { index, dim: n });
        }

        let mut angular = angular.to_vec();
        angular.sort_unstable();
        angular.dedup();

        Ok(Self {
            q_hessian: weights.q() + weights.q().transpose(),
            r_hessian: weights.r() + weights.r().transpose(),
            qf_hessian: weights.qf() + weights.qf().transpose(),
            weights,
            goal,
            angular,
        })
    }

    pub const fn weights(&self) -> &CostWeights {
        &self.weights
    }

    pub const fn goal(&self) -> &State {
        &self.goal
    }

    pub fn angular_indices(&self) -> &[usize] {
        &self.angular
    }

    pub fn state_dim(&self) -> usize {
        self.weights.state_dim()
    }

    pub fn control_dim(&self) -> usize {
        self.weights.control_dim()
    }

    /// `a - b`, with angular components wrapped into `(-π, π]`.
    pub fn diff(&self, a: &DVector<f64>, b: &DVector<f64>) -> DVector<f64> {
        let mut d = a - b;
        for &i in &self.angular {
            d[i] = wrap_angle(d[i]);
        }
        d
    }

    /// `dxᵀ Q dx` with `dx = diff(x, goal)`.
    pub fn state_cost(&self, x: &State) -> f64 {
        let dx = self.diff(x, &self.goal);
        dx.dot(&(self.weights.q() * &dx))
    }

    /// `uᵀ R u`.
    pub fn control_cost(&self, u: &Control) -> f64 {
        u.dot(&(self.weights.r() * u))
    }

    pub fn running_cost(&self, x: &State, u: &Control) -> f64 {
        self.state_cost(x) + self.control_cost(u)
    }

    pub fn terminal_cost(&self, x: &State) -> f64 {
        let dx = self.diff(x, &self.goal);
        dx.dot(&(self.weights.qf() * &dx))
    }

    /// `lx = 2·Q·dx`.
    pub fn state_gradient(&self, x: &State) -> DVector<f64> {
        self.weights.q() * self.diff(x, &self.goal) * 2.0
    }

    /// `lu = 2·R·u`.
    pub fn control_gradient(&self, u: &Control) -> DVector<f64> {
        self.weights.r() * u * 2.0
    }

    /// Terminal gradient `2·Qf·dx`.
    pub fn terminal_gradient(&self, x: &State) -> DVector<f64> {
        self.weights.qf() * self.diff(x, &self.goal) * 2.0
    }

    /// `lxx = Q + Qᵀ`.
    pub const fn state_hessian(&self) -> &DMatrix<f64> {
        &self.q_hessian
    }

    /// `luu = R + Rᵀ`.
    pub const fn control_hessian(&self) -> &DMatrix<f64> {
        &self.r_hessian
    }

    /// `Qf + Qfᵀ`.
    pub const fn terminal_hessian(&self) -> &DMatrix<f64> {
        &self.qf_hessian
    }

    /// Running cost over every state/control pair plus the terminal cost on
    /// the final state.
    pub fn trajectory_cost(&self, trajectory: &Trajectory) -> CostBreakdown {
        let mut breakdown = CostBreakdown::default();
        for (x, u) in trajectory.states().iter().zip(trajectory.controls()) {
            breakdown.state += self.state_cost(x);
            breakdown.control += self.control_cost(u);
        }
        breakdown.terminal = self.terminal_cost(trajectory.final_state());
        breakdown
    }
}
