use thiserror::Error;

/// Top-level error type for trajopt.
#[derive(Debug, Error)]
pub enum TrajoptError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Solve error: {0}")]
    Solve(#[from] SolveError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Problem validation errors, raised before any iteration runs.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ValidationError {
    #[error("Matrix {name} is not square: {rows}x{cols}")]
    NotSquare {
        name: &'static str,
        rows: usize,
        cols: usize,
    },

    #[error("Matrix {name} is not symmetric at ({row}, {col})")]
    Asymmetric {
        name: &'static str,
        row: usize,
        col: usize,
    },

    #[error("{name} dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Matrix {name} is not positive semidefinite (min eigenvalue {min_eigenvalue:e})")]
    NotPositiveSemidefinite {
        name: &'static str,
        min_eigenvalue: f64,
    },

    #[error("{name} contains a non-finite value")]
    NonFinite { name: &'static str },

    #[error("Angular index {index} out of range for state dimension {dim}")]
    AngularIndexOutOfRange { index: usize, dim: usize },

    #[error("Trajectory needs {expected} states for {controls} controls, got {got}")]
    TrajectoryLength {
        controls: usize,
        expected: usize,
        got: usize,
    },
}

/// Failures surfaced by a solve after local recovery has been exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SolveError {
    #[error(
        "Control Hessian ill-conditioned at step {step} after {attempts} attempts (rho = {regularization:e})"
    )]
    IllConditioned {
        step: usize,
        attempts: u32,
        regularization: f64,
    },

    #[error("Rollout diverged: non-finite state at step {step}")]
    NonFiniteState { step: usize },
}
