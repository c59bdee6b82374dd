use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::error::{SolveError, ValidationError};
use crate::traits::Dynamics;

/// Absolute tolerance used when checking weight matrices for symmetry.
const SYMMETRY_TOL: f64 = 1e-9;

/// Eigenvalues above `-PSD_TOL * max(1, |λ|max)` are treated as non-negative.
const PSD_TOL: f64 = 1e-10;

/// System state vector (dimension `n`).
pub type State = DVector<f64>;

/// Control input vector (dimension `m`).
pub type Control = DVector<f64>;

// ---------------------------------------------------------------------------
// Trajectory
// ---------------------------------------------------------------------------

/// A state/control sequence over a finite horizon.
///
/// Always holds exactly one more state than controls: `states[t + 1]` is the
/// result of applying `controls[t]` at `states[t]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    states: Vec<State>,
    controls: Vec<Control>,
}

impl Trajectory {
    /// Build a trajectory from explicit sequences.
    pub fn new(states: Vec<State>, controls: Vec<Control>) -> Result<Self, ValidationError> {
        if states.len() != controls.len() + 1 {
            return Err(ValidationError::TrajectoryLength {
                controls: controls.len(),
                expected: controls.len() + 1,
                got: states.len(),
            });
        }
        Ok(Self { states, controls })
    }

    /// Roll out `controls` through `dynamics` starting at `initial_state`.
    ///
    /// Fails with [`SolveError::NonFiniteState`] as soon as a produced state
    /// contains NaN or infinity.
    pub fn rollout<D: Dynamics + ?Sized>(
        dynamics: &D,
        initial_state: State,
        controls: Vec<Control>,
    ) -> Result<Self, SolveError> {
        let mut states = Vec::with_capacity(controls.len() + 1);
        states.push(initial_state);
        for (t, u) in controls.iter().enumerate() {
            let next = dynamics.step(&states[t], u);
            if !next.iter().all(|v| v.is_finite()) {
                return Err(SolveError::NonFiniteState { step: t + 1 });
            }
            states.push(next);
        }
        Ok(Self { states, controls })
    }

    /// Roll out `steps` zero controls from `initial_state`.
    pub fn zero_control_rollout<D: Dynamics + ?Sized>(
        dynamics: &D,
        initial_state: State,
        steps: usize,
    ) -> Result<Self, SolveError> {
        let controls = vec![Control::zeros(dynamics.control_dim()); steps];
        Self::rollout(dynamics, initial_state, controls)
    }

    /// Number of control steps `T`.
    pub fn horizon(&self) -> usize {
        self.controls.len()
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn controls(&self) -> &[Control] {
        &self.controls
    }

    pub fn initial_state(&self) -> &State {
        &self.states[0]
    }

    pub fn final_state(&self) -> &State {
        &self.states[self.states.len() - 1]
    }

    pub fn into_parts(self) -> (Vec<State>, Vec<Control>) {
        (self.states, self.controls)
    }
}

// ---------------------------------------------------------------------------
// CostWeights
// ---------------------------------------------------------------------------

/// Quadratic cost weights: running state `Q`, terminal `Qf`, control `R`.
///
/// Validated once at construction (square, finite, symmetric, PSD) and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CostWeights {
    q: DMatrix<f64>,
    qf: DMatrix<f64>,
    r: DMatrix<f64>,
}

impl CostWeights {
    pub fn new(
        q: DMatrix<f64>,
        qf: DMatrix<f64>,
        r: DMatrix<f64>,
    ) -> Result<Self, ValidationError> {
        validate_weight("Q", &q)?;
        validate_weight("Qf", &qf)?;
        validate_weight("R", &r)?;
        if qf.nrows() != q.nrows() {
            return Err(ValidationError::DimensionMismatch {
                name: "Qf",
                expected: q.nrows(),
                got: qf.nrows(),
            });
        }
        Ok(Self { q, qf, r })
    }

    /// Diagonal weights, with the terminal weight equal to the running one.
    pub fn diagonal(q: &[f64], r: &[f64]) -> Result<Self, ValidationError> {
        let q = DMatrix::from_diagonal(&DVector::from_column_slice(q));
        let r = DMatrix::from_diagonal(&DVector::from_column_slice(r));
        Self::new(q.clone(), q, r)
    }

    /// Replace the terminal weight, re-validating it.
    pub fn with_terminal(self, qf: DMatrix<f64>) -> Result<Self, ValidationError> {
        Self::new(self.q, qf, self.r)
    }

    pub const fn q(&self) -> &DMatrix<f64> {
        &self.q
    }

    pub const fn qf(&self) -> &DMatrix<f64> {
        &self.qf
    }

    pub const fn r(&self) -> &DMatrix<f64> {
        &self.r
    }

    pub fn state_dim(&self) -> usize {
        self.q.nrows()
    }

    pub fn control_dim(&self) -> usize {
        self.r.nrows()
    }
}

fn validate_weight(name: &'static str, m: &DMatrix<f64>) -> Result<(), ValidationError> {
    let (rows, cols) = m.shape();
    if rows != cols {
        return Err(ValidationError::NotSquare { name, rows, cols });
    }
    if !m.iter().all(|v| v.is_finite()) {
        return Err(ValidationError::NonFinite { name });
    }
    for row in 0..rows {
        for col in (row + 1)..cols {
            let (a, b) = (m[(row, col)], m[(col, row)]);
            if (a - b).abs() > SYMMETRY_TOL * a.abs().max(b.abs()).max(1.0) {
                return Err(ValidationError::Asymmetric { name, row, col });
            }
        }
    }
    if rows > 0 {
        let eigenvalues = SymmetricEigen::new(m.clone()).eigenvalues;
        let min = eigenvalues.min();
        let scale = eigenvalues.amax().max(1.0);
        if min < -PSD_TOL * scale {
            return Err(ValidationError::NotPositiveSemidefinite {
                name,
                min_eigenvalue: min,
            });
        }
    }
    Ok(())
}
