use nalgebra::DMatrix;

use crate::types::{Control, State};

// ---------------------------------------------------------------------------
// Dynamics
// ---------------------------------------------------------------------------

/// Discrete-time dynamics `x' = f(x, u)`.
///
/// Implementations must be pure and deterministic, and smooth enough around
/// the probed points for a central-difference Jacobian to be meaningful.
/// `Sync` lets line-search candidates be rolled out in parallel.
pub trait Dynamics: Sync {
    /// Dimension `n` of the state vector.
    fn state_dim(&self) -> usize;

    /// Dimension `m` of the control vector.
    fn control_dim(&self) -> usize;

    /// Advance one step.
    fn step(&self, state: &State, control: &Control) -> State;

    /// Exact Jacobians `(∂f/∂x, ∂f/∂u)` at `(state, control)`, if known in
    /// closed form. Returning `None` makes the solver fall back to finite
    /// differences.
    fn jacobians(&self, state: &State, control: &Control) -> Option<(DMatrix<f64>, DMatrix<f64>)> {
        let _ = (state, control);
        None
    }

    /// Human-readable name for this system.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<D: Dynamics + ?Sized> Dynamics for Box<D> {
    fn state_dim(&self) -> usize {
        (**self).state_dim()
    }

    fn control_dim(&self) -> usize {
        (**self).control_dim()
    }

    fn step(&self, state: &State, control: &Control) -> State {
        (**self).step(state, control)
    }

    fn jacobians(&self, state: &State, control: &Control) -> Option<(DMatrix<f64>, DMatrix<f64>)> {
        (**self).jacobians(state, control)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// ---------------------------------------------------------------------------
// FnDynamics
// ---------------------------------------------------------------------------

/// Adapts a plain closure into [`Dynamics`].
pub struct FnDynamics<F> {
    state_dim: usize,
    control_dim: usize,
    f: F,
}

impl<F> FnDynamics<F>
where
    F: Fn(&State, &Control) -> State + Sync,
{
    pub const fn new(state_dim: usize, control_dim: usize, f: F) -> Self {
        Self {
            state_dim,
            control_dim,
            f,
        }
    }
}

impl<F> Dynamics for FnDynamics<F>
where
    F: Fn(&State, &Control) -> State + Sync,
{
    fn state_dim(&self) -> usize {
        self.state_dim
    }

    fn control_dim(&self) -> usize {
        self.control_dim
    }

    fn step(&self, state: &State, control: &Control) -> State {
        (self.f)(state, control)
    }

    fn name(&self) -> &str {
        "closure"
    }
}
