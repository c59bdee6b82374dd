//! Reference dynamics models.
//!
//! Small systems used by the demo app, tests and benchmarks. Real vehicle
//! models live with the caller and implement [`Dynamics`] directly.

use nalgebra::DMatrix;

use crate::error::ValidationError;
use crate::traits::Dynamics;
use crate::types::{Control, State};

// ---------------------------------------------------------------------------
// DoubleIntegrator
// ---------------------------------------------------------------------------

/// Planar point mass driven by a force.
///
/// State `[x, y, vx, vy]`, control `[fx, fy]`. Exact zero-order-hold update:
/// positions advance by `dt·v + ½·dt²·a`, velocities by `dt·a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleIntegrator {
    pub dt: f64,
    pub mass: f64,
}

impl Default for DoubleIntegrator {
    fn default() -> Self {
        Self { dt: 0.1, mass: 1.0 }
    }
}

impl Dynamics for DoubleIntegrator {
    fn state_dim(&self) -> usize {
        4
    }

    fn control_dim(&self) -> usize {
        2
    }

    fn step(&self, state: &State, control: &Control) -> State {
        let dt = self.dt;
        let ax = control[0] / self.mass;
        let ay = control[1] / self.mass;
        State::from_column_slice(&[
            state[0] + dt * state[2] + 0.5 * dt * dt * ax,
            state[1] + dt * state[3] + 0.5 * dt * dt * ay,
            state[2] + dt * ax,
            state[3] + dt * ay,
        ])
    }

    fn name(&self) -> &str {
        "double_integrator"
    }
}

// ---------------------------------------------------------------------------
// LinearSystem
// ---------------------------------------------------------------------------

/// Linear time-invariant system `x' = A x + B u` with exact Jacobians.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
}

impl LinearSystem {
    pub fn new(a: DMatrix<f64>, b: DMatrix<f64>) -> Result<Self, ValidationError> {
        let (rows, cols) = a.shape();
        if rows != cols {
            return Err(ValidationError::NotSquare {
                name: "A",
                rows,
                cols,
            });
        }
        if b.nrows() != rows {
            return Err(ValidationError::DimensionMismatch {
                name: "B rows",
                expected: rows,
                got: b.nrows(),
            });
        }
        if !a.iter().chain(b.iter()).all(|v| v.is_finite()) {
            return Err(ValidationError::NonFinite { name: "A/B" });
        }
        Ok(Self { a, b })
    }

    pub const fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub const fn b(&self) -> &DMatrix<f64> {
        &self.b
    }
}

impl Dynamics for LinearSystem {
    fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    fn control_dim(&self) -> usize {
        self.b.ncols()
    }

    fn step(&self, state: &State, control: &Control) -> State {
        &self.a * state + &self.b * control
    }

    fn jacobians(&self, _state: &State, _control: &Control) -> Option<(DMatrix<f64>, DMatrix<f64>)> {
        Some((self.a.clone(), self.b.clone()))
    }

    fn name(&self) -> &str {
        "linear"
    }
}

// ---------------------------------------------------------------------------
// Pendulum
// ---------------------------------------------------------------------------

/// Damped torque-driven pendulum, semi-implicit Euler.
///
/// State `[θ, ω]` with `θ = 0` hanging down; control `[τ]`. Index 0 is
/// angular (see [`Pendulum::ANGULAR`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pendulum {
    pub dt: f64,
    pub mass: f64,
    pub length: f64,
    pub damping: f64,
    pub gravity: f64,
}

impl Pendulum {
    pub const ANGULAR: &'static [usize] = &[0];
}

impl Default for Pendulum {
    fn default() -> Self {
        Self {
            dt: 0.05,
            mass: 1.0,
            length: 1.0,
            damping: 0.1,
            gravity: 9.81,
        }
    }
}

impl Dynamics for Pendulum {
    fn state_dim(&self) -> usize {
        2
    }

    fn control_dim(&self) -> usize {
        1
    }

    fn step(&self, state: &State, control: &Control) -> State {
        let (theta, omega) = (state[0], state[1]);
        let inertia = self.mass * self.length * self.length;
        let alpha = -self.gravity / self.length * theta.sin() - self.damping * omega
            + control[0] / inertia;
        let omega_next = omega + self.dt * alpha;
        State::from_column_slice(&[theta + self.dt * omega_next, omega_next])
    }

    fn name(&self) -> &str {
        "pendulum"
    }
}

// ---------------------------------------------------------------------------
// Unicycle
// ---------------------------------------------------------------------------

/// Kinematic unicycle with acceleration and yaw-rate inputs.
///
/// State `[x, y, heading, speed]`, control `[accel, yaw_rate]`. Index 2 is
/// angular (see [`Unicycle::ANGULAR`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unicycle {
    pub dt: f64,
}

impl Unicycle {
    pub const ANGULAR: &'static [usize] = &[2];
}

impl Default for Unicycle {
    fn default() -> Self {
        Self { dt: 0.1 }
    }
}

impl Dynamics for Unicycle {
    fn state_dim(&self) -> usize {
        4
    }

    fn control_dim(&self) -> usize {
        2
    }

    fn step(&self, state: &State, control: &Control) -> State {
        let dt = self.dt;
        let (heading, speed) = (state[2], state[3]);
        State::from_column_slice(&[
            state[0] + dt * speed * heading.cos(),
            state[1] + dt * speed * heading.sin(),
            heading + dt * control[1],
            speed + dt * control[0],
        ])
    }

    fn name(&self) -> &str {
        "unicycle"
    }
}
