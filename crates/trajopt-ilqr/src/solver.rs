//! Outer iLQR loop.

use tracing::{debug, info};

use trajopt_core::config::{ProblemConfig, SolverConfig};
use trajopt_core::error::{TrajoptError, ValidationError};
use trajopt_core::traits::Dynamics;
use trajopt_core::types::{Control, CostWeights, State, Trajectory};

use crate::backward::backward_pass;
use crate::cost::CostModel;
use crate::forward::forward_pass;
use crate::types::{IterationRecord, Solution, Termination};

/// Finite-horizon iLQR solver for a fixed system and cost weighting.
///
/// Holds no per-solve state: one solver can be reused for any number of
/// `(initial_state, goal)` pairs.
pub struct IlqrSolver<D: Dynamics> {
    dynamics: D,
    weights: CostWeights,
    angular: Vec<usize>,
    config: SolverConfig,
}

impl IlqrSolver<Box<dyn Dynamics>> {
    /// Build the model, weights and solver described by a problem file.
    pub fn from_problem(problem: &ProblemConfig) -> Result<Self, TrajoptError> {
        problem.validate()?;
        Self::new(
            problem.model.build()?,
            problem.cost.weights()?,
            &problem.angular_indices(),
            problem.solver.clone(),
        )
    }
}

impl<D: Dynamics> IlqrSolver<D> {
    pub fn new(
        dynamics: D,
        weights: CostWeights,
        angular: &[usize],
        config: SolverConfig,
    ) -> Result<Self, TrajoptError> {
        config.validate()?;
        let n = dynamics.state_dim();
        check_dim("Q", n, weights.state_dim())?;
        check_dim("R", dynamics.control_dim(), weights.control_dim())?;
        if let Some(&index) = angular.iter().find(|&&i| i >= n) {
            return Err(ValidationError::AngularIndexOutOfRange { index, dim: n }.into());
        }
        Ok(Self {
            dynamics,
            weights,
            angular: angular.to_vec(),
            config,
        })
    }

    pub fn dynamics(&self) -> &D {
        &self.dynamics
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    pub fn angular_indices(&self) -> &[usize] {
        &self.angular
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Optimize from a zero-control initial guess.
    pub fn solve(&self, initial_state: &State, goal: &State) -> Result<Solution, TrajoptError> {
        let controls = vec![Control::zeros(self.dynamics.control_dim()); self.config.steps];
        self.solve_with_controls(initial_state, goal, controls)
    }

    /// Optimize starting from `controls` as the initial nominal sequence.
    pub fn solve_with_controls(
        &self,
        initial_state: &State,
        goal: &State,
        controls: Vec<Control>,
    ) -> Result<Solution, TrajoptError> {
        check_dim("initial_state", self.dynamics.state_dim(), initial_state.len())?;
        if !initial_state.iter().all(|v| v.is_finite()) {
            return Err(ValidationError::NonFinite {
                name: "initial_state",
            }
            .into());
        }
        check_dim("controls", self.config.steps, controls.len())?;
        for u in &controls {
            check_dim("control", self.dynamics.control_dim(), u.len())?;
        }
        let cost = CostModel::new(self.weights.clone(), goal.clone(), &self.angular)?;

        let mut nominal = Trajectory::rollout(&self.dynamics, initial_state.clone(), controls)?;
        let mut current = cost.trajectory_cost(&nominal);
        let mut history = Vec::new();
        let mut termination = Termination::MaxIterations;

        debug!(
            model = self.dynamics.name(),
            steps = self.config.steps,
            cost = current.total(),
            "Starting iLQR"
        );

        for iteration in 1..=self.config.max_iters {
            let backward = backward_pass(
                &self.dynamics,
                &cost,
                &nominal,
                self.config.eps,
                &self.config.regularization,
            )?;
            let forward = forward_pass(
                &self.dynamics,
                &cost,
                &nominal,
                current,
                &backward.gains,
                &self.config.line_search,
            );

            let previous = current.total();
            let record = IterationRecord {
                iteration,
                cost: forward.cost.total(),
                alpha: forward.alpha,
                regularization: backward.regularization,
                expected_improvement: backward.expected_improvement(),
            };
            debug!(
                iteration,
                cost = record.cost,
                alpha = ?record.alpha,
                regularization = record.regularization,
                expected_improvement = record.expected_improvement,
                "iLQR iteration"
            );
            history.push(record);

            nominal = forward.trajectory;
            current = forward.cost;

            if (previous - current.total()).abs() < self.config.tolerance {
                termination = Termination::Converged;
                break;
            }
        }

        info!(
            iterations = history.len(),
            cost = current.total(),
            termination = %termination,
            "iLQR finished"
        );

        Ok(Solution {
            trajectory: nominal,
            cost: current,
            iterations: history.len(),
            termination,
            history,
        })
    }
}

fn check_dim(name: &'static str, expected: usize, got: usize) -> Result<(), ValidationError> {
    if expected == got {
        Ok(())
    } else {
        Err(ValidationError::DimensionMismatch {
            name,
            expected,
            got,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use trajopt_core::error::SolveError;
    use trajopt_core::traits::FnDynamics;

    fn integrator() -> FnDynamics<impl Fn(&State, &Control) -> State + Sync> {
        FnDynamics::new(1, 1, |x: &State, u: &Control| x + u)
    }

    fn scalar_solver(steps: usize) -> IlqrSolver<FnDynamics<impl Fn(&State, &Control) -> State + Sync>> {
        let config = SolverConfig {
            steps,
            ..SolverConfig::default()
        };
        let weights = CostWeights::diagonal(&[1.0], &[1.0]).unwrap();
        IlqrSolver::new(integrator(), weights, &[], config).unwrap()
    }

    #[test]
    fn one_step_problem_converges_to_half_step() {
        let solver = scalar_solver(1);
        let solution = solver
            .solve(&State::from_element(1, 1.0), &State::zeros(1))
            .unwrap();
        assert!(solution.converged());
        assert!(solution.iterations <= 3);
        assert_relative_eq!(solution.trajectory.controls()[0][0], -0.5, epsilon = 1e-5);
        assert_relative_eq!(solution.total_cost(), 1.5, epsilon = 1e-8);
        assert_eq!(solution.history[0].alpha, Some(1.0));
        assert_eq!(solution.history.len(), solution.iterations);
    }

    #[test]
    fn unbounded_iteration_limit_still_stops_on_tolerance() {
        let config = SolverConfig {
            steps: 1,
            max_iters: usize::MAX,
            ..SolverConfig::default()
        };
        let weights = CostWeights::diagonal(&[1.0], &[1.0]).unwrap();
        let solver = IlqrSolver::new(integrator(), weights, &[], config).unwrap();
        let solution = solver
            .solve(&State::from_element(1, 1.0), &State::zeros(1))
            .unwrap();
        assert!(solution.converged());
        assert!(solution.iterations <= 3);
        assert_eq!(solution.history.len(), solution.iterations);
    }

    #[test]
    fn rejects_weight_dimension_mismatch() {
        let weights = CostWeights::diagonal(&[1.0, 1.0], &[1.0]).unwrap();
        let err = IlqrSolver::new(integrator(), weights, &[], SolverConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            TrajoptError::Validation(ValidationError::DimensionMismatch {
                name: "Q",
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn rejects_invalid_config() {
        let weights = CostWeights::diagonal(&[1.0], &[1.0]).unwrap();
        let config = SolverConfig {
            max_iters: 0,
            ..SolverConfig::default()
        };
        let err = IlqrSolver::new(integrator(), weights, &[], config).err().unwrap();
        assert!(matches!(err, TrajoptError::Config(_)));
    }

    #[test]
    fn rejects_bad_angular_index() {
        let weights = CostWeights::diagonal(&[1.0], &[1.0]).unwrap();
        let err = IlqrSolver::new(integrator(), weights, &[1], SolverConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            TrajoptError::Validation(ValidationError::AngularIndexOutOfRange { index: 1, dim: 1 })
        ));
    }

    #[test]
    fn rejects_warm_start_of_wrong_length() {
        let solver = scalar_solver(4);
        let err = solver
            .solve_with_controls(
                &State::zeros(1),
                &State::zeros(1),
                vec![Control::zeros(1); 3],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            TrajoptError::Validation(ValidationError::DimensionMismatch {
                name: "controls",
                expected: 4,
                got: 3
            })
        ));
    }

    #[test]
    fn rejects_goal_of_wrong_dimension() {
        let solver = scalar_solver(2);
        let err = solver
            .solve(&State::zeros(1), &State::zeros(2))
            .unwrap_err();
        assert!(matches!(
            err,
            TrajoptError::Validation(ValidationError::DimensionMismatch { name: "goal", .. })
        ));
    }

    #[test]
    fn diverging_nominal_rollout_is_an_error() {
        let dynamics = FnDynamics::new(1, 1, |x: &State, _u: &Control| x * 1e200);
        let weights = CostWeights::diagonal(&[1.0], &[1.0]).unwrap();
        let solver = IlqrSolver::new(dynamics, weights, &[], SolverConfig::default()).unwrap();
        let err = solver
            .solve(&State::from_element(1, 1e200), &State::zeros(1))
            .unwrap_err();
        assert!(matches!(
            err,
            TrajoptError::Solve(SolveError::NonFiniteState { step: 1 })
        ));
    }

    #[test]
    fn from_problem_builds_default_demo() {
        let solver = IlqrSolver::from_problem(&ProblemConfig::default()).unwrap();
        assert_eq!(solver.dynamics().name(), "double_integrator");
        assert_eq!(solver.config().steps, 10);
        assert!(solver.angular_indices().is_empty());
    }
}
