use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, TrajoptError, ValidationError};
use crate::models::{DoubleIntegrator, LinearSystem, Pendulum, Unicycle};
use crate::traits::Dynamics;
use crate::types::{CostWeights, State};

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_steps() -> usize {
    10
}
const fn default_max_iters() -> usize {
    10
}
const fn default_eps() -> f64 {
    1e-4
}
const fn default_tolerance() -> f64 {
    1e-3
}
const fn default_initial_regularization() -> f64 {
    1e-6
}
const fn default_growth() -> f64 {
    2.0
}
const fn default_max_attempts() -> u32 {
    5
}
const fn default_max_condition() -> f64 {
    1e12
}
const fn default_grid_samples() -> usize {
    20
}
const fn default_golden_iterations() -> u32 {
    30
}
const fn default_alpha_min() -> f64 {
    -1.0
}
const fn default_alpha_max() -> f64 {
    1.0
}
const fn default_dt() -> f64 {
    0.1
}
const fn default_mass() -> f64 {
    1.0
}
const fn default_length() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// RegularizationConfig
// ---------------------------------------------------------------------------

/// Damping applied to the control Hessian during the backward pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularizationConfig {
    /// Starting value of ρ, restored at the beginning of every outer iteration
    /// (default: 1e-6).
    #[serde(default = "default_initial_regularization")]
    pub initial: f64,

    /// Multiplier applied to ρ after a failed factorization (default: 2.0).
    #[serde(default = "default_growth")]
    pub growth: f64,

    /// Factorization attempts per timestep before the solve fails (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Largest accepted condition number of `Quu + ρI` (default: 1e12).
    #[serde(default = "default_max_condition")]
    pub max_condition: f64,
}

impl Default for RegularizationConfig {
    fn default() -> Self {
        Self {
            initial: default_initial_regularization(),
            growth: default_growth(),
            max_attempts: default_max_attempts(),
            max_condition: default_max_condition(),
        }
    }
}

impl RegularizationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial.is_finite() && self.initial > 0.0) {
            return Err(ConfigError::invalid(
                "regularization.initial",
                format!("{} (must be finite and > 0)", self.initial),
            ));
        }
        if !(self.growth.is_finite() && self.growth > 1.0) {
            return Err(ConfigError::invalid(
                "regularization.growth",
                format!("{} (must be > 1)", self.growth),
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "regularization.max_attempts",
                "must be > 0",
            ));
        }
        if self.max_condition.is_nan() || self.max_condition <= 1.0 {
            return Err(ConfigError::invalid(
                "regularization.max_condition",
                format!("{} (must be > 1)", self.max_condition),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LineSearchConfig
// ---------------------------------------------------------------------------

/// Step-size search used by the forward pass.
///
/// Both strategies only ever accept a candidate that beats the best cost seen
/// so far, starting from the nominal trajectory's cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum LineSearchConfig {
    /// Evenly spaced samples over `[min, max]`, both ends included.
    Grid {
        #[serde(default = "default_grid_samples")]
        samples: usize,
        #[serde(default = "default_alpha_min")]
        min: f64,
        #[serde(default = "default_alpha_max")]
        max: f64,
    },
    /// Golden-section minimization over `[min, max]`.
    GoldenSection {
        #[serde(default = "default_golden_iterations")]
        iterations: u32,
        #[serde(default = "default_alpha_min")]
        min: f64,
        #[serde(default = "default_alpha_max")]
        max: f64,
    },
}

impl Default for LineSearchConfig {
    fn default() -> Self {
        Self::Grid {
            samples: default_grid_samples(),
            min: default_alpha_min(),
            max: default_alpha_max(),
        }
    }
}

impl LineSearchConfig {
    /// Search interval `(min, max)`.
    pub const fn bounds(&self) -> (f64, f64) {
        match *self {
            Self::Grid { min, max, .. } | Self::GoldenSection { min, max, .. } => (min, max),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = self.bounds();
        if !(min.is_finite() && max.is_finite() && min <= max) {
            return Err(ConfigError::invalid(
                "line_search",
                format!("bounds [{min}, {max}] must be finite and ordered"),
            ));
        }
        match *self {
            Self::Grid { samples: 0, .. } => {
                Err(ConfigError::invalid("line_search.samples", "must be > 0"))
            }
            Self::GoldenSection { iterations: 0, .. } => {
                Err(ConfigError::invalid("line_search.iterations", "must be > 0"))
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// SolverConfig
// ---------------------------------------------------------------------------

/// iLQR solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Horizon length `T` in control steps (default: 10).
    #[serde(default = "default_steps")]
    pub steps: usize,

    /// Maximum outer iterations (default: 10).
    #[serde(default = "default_max_iters")]
    pub max_iters: usize,

    /// Central finite-difference step (default: 1e-4).
    #[serde(default = "default_eps")]
    pub eps: f64,

    /// Stop when the total cost changes by less than this between
    /// iterations (default: 1e-3).
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    #[serde(default)]
    pub regularization: RegularizationConfig,

    #[serde(default)]
    pub line_search: LineSearchConfig,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            max_iters: default_max_iters(),
            eps: default_eps(),
            tolerance: default_tolerance(),
            regularization: RegularizationConfig::default(),
            line_search: LineSearchConfig::default(),
        }
    }
}

impl SolverConfig {
    /// Validate configuration. Returns Err on invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps == 0 {
            return Err(ConfigError::invalid("steps", "must be > 0"));
        }
        if self.max_iters == 0 {
            return Err(ConfigError::invalid("max_iters", "must be > 0"));
        }
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(ConfigError::invalid(
                "eps",
                format!("{} (must be finite and > 0)", self.eps),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(ConfigError::invalid(
                "tolerance",
                format!("{} (must be finite and >= 0)", self.tolerance),
            ));
        }
        self.regularization.validate()?;
        self.line_search.validate()
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// Selects one of the reference dynamics models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelConfig {
    DoubleIntegrator {
        #[serde(default = "default_dt")]
        dt: f64,
        #[serde(default = "default_mass")]
        mass: f64,
    },
    Pendulum {
        #[serde(default = "default_dt")]
        dt: f64,
        #[serde(default = "default_mass")]
        mass: f64,
        #[serde(default = "default_length")]
        length: f64,
        #[serde(default)]
        damping: f64,
    },
    Unicycle {
        #[serde(default = "default_dt")]
        dt: f64,
    },
    Linear {
        a: Vec<Vec<f64>>,
        b: Vec<Vec<f64>>,
    },
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::DoubleIntegrator {
            dt: default_dt(),
            mass: default_mass(),
        }
    }
}

impl ModelConfig {
    /// Instantiate the selected model.
    pub fn build(&self) -> Result<Box<dyn Dynamics>, TrajoptError> {
        let positive = |field: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(v)
            } else {
                Err(ConfigError::invalid(field, format!("{v} (must be > 0)")))
            }
        };
        let non_negative = |field: &str, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(v)
            } else {
                Err(ConfigError::invalid(field, format!("{v} (must be finite and >= 0)")))
            }
        };
        let model: Box<dyn Dynamics> = match self {
            Self::DoubleIntegrator { dt, mass } => Box::new(DoubleIntegrator {
                dt: positive("model.dt", *dt)?,
                mass: positive("model.mass", *mass)?,
            }),
            Self::Pendulum {
                dt,
                mass,
                length,
                damping,
            } => Box::new(Pendulum {
                dt: positive("model.dt", *dt)?,
                mass: positive("model.mass", *mass)?,
                length: positive("model.length", *length)?,
                damping: non_negative("model.damping", *damping)?,
                ..Pendulum::default()
            }),
            Self::Unicycle { dt } => Box::new(Unicycle {
                dt: positive("model.dt", *dt)?,
            }),
            Self::Linear { a, b } => Box::new(LinearSystem::new(
                matrix_from_rows("model.a", a)?,
                matrix_from_rows("model.b", b)?,
            )?),
        };
        Ok(model)
    }

    /// Angular state indices implied by the model.
    pub fn angular_indices(&self) -> Vec<usize> {
        match self {
            Self::Pendulum { .. } => Pendulum::ANGULAR.to_vec(),
            Self::Unicycle { .. } => Unicycle::ANGULAR.to_vec(),
            Self::DoubleIntegrator { .. } | Self::Linear { .. } => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// CostConfig
// ---------------------------------------------------------------------------

/// Cost weights as row lists, as written in TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    pub q: Vec<Vec<f64>>,
    /// Terminal weight; defaults to `q`.
    #[serde(default)]
    pub qf: Option<Vec<Vec<f64>>>,
    pub r: Vec<Vec<f64>>,
    /// Angular state indices; defaults to the model's.
    #[serde(default)]
    pub angular: Option<Vec<usize>>,
}

impl CostConfig {
    pub fn weights(&self) -> Result<CostWeights, TrajoptError> {
        let q = matrix_from_rows("cost.q", &self.q)?;
        let qf = match &self.qf {
            Some(rows) => matrix_from_rows("cost.qf", rows)?,
            None => q.clone(),
        };
        let r = matrix_from_rows("cost.r", &self.r)?;
        Ok(CostWeights::new(q, qf, r)?)
    }
}

/// Build a dense matrix from row lists, rejecting ragged input.
pub fn matrix_from_rows(field: &str, rows: &[Vec<f64>]) -> Result<DMatrix<f64>, ConfigError> {
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != ncols) {
        return Err(ConfigError::invalid(field, "rows must all have the same length"));
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}

// ---------------------------------------------------------------------------
// ProblemConfig
// ---------------------------------------------------------------------------

/// A complete problem description: model, boundary states, cost and solver.
///
/// The default is the planar double-integrator demo: start at rest at the
/// origin and reach `[10, 13]` in ten steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemConfig {
    #[serde(default)]
    pub model: ModelConfig,
    pub initial_state: Vec<f64>,
    pub goal: Vec<f64>,
    pub cost: CostConfig,
    #[serde(default)]
    pub solver: SolverConfig,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        let q = vec![
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.1, 0.0],
            vec![0.0, 0.0, 0.0, 0.1],
        ];
        Self {
            model: ModelConfig::default(),
            initial_state: vec![0.0; 4],
            goal: vec![10.0, 13.0, 0.0, 0.0],
            cost: CostConfig {
                q,
                qf: None,
                r: vec![vec![1e-3, 0.0], vec![0.0, 1e-3]],
                angular: None,
            },
            solver: SolverConfig::default(),
        }
    }
}

impl ProblemConfig {
    /// Check solver settings and that every dimension agrees with the model.
    pub fn validate(&self) -> Result<(), TrajoptError> {
        self.solver.validate()?;
        let model = self.model.build()?;
        let weights = self.cost.weights()?;
        let n = model.state_dim();
        let checks = [
            ("initial_state", n, self.initial_state.len()),
            ("goal", n, self.goal.len()),
            ("Q", n, weights.state_dim()),
            ("R", model.control_dim(), weights.control_dim()),
        ];
        for (name, expected, got) in checks {
            if expected != got {
                return Err(ValidationError::DimensionMismatch {
                    name,
                    expected,
                    got,
                }
                .into());
            }
        }
        if let Some(&index) = self.angular_indices().iter().find(|&&i| i >= n) {
            return Err(ValidationError::AngularIndexOutOfRange { index, dim: n }.into());
        }
        Ok(())
    }

    pub fn angular_indices(&self) -> Vec<usize> {
        self.cost
            .angular
            .clone()
            .unwrap_or_else(|| self.model.angular_indices())
    }

    pub fn initial_state(&self) -> State {
        State::from_column_slice(&self.initial_state)
    }

    pub fn goal(&self) -> State {
        State::from_column_slice(&self.goal)
    }

    /// Load from TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, TrajoptError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::from)?;
        let config: Self = toml::from_str(&content).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }
}
