// trajopt-core: Types, dynamics trait, config, errors and reference models for trajopt.

pub mod config;
pub mod error;
pub mod models;
pub mod traits;
pub mod types;

/// Crate version, as reported by `trajopt info`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use crate::config::{
        CostConfig, LineSearchConfig, ModelConfig, ProblemConfig, RegularizationConfig,
        SolverConfig,
    };
    pub use crate::error::{ConfigError, SolveError, TrajoptError, ValidationError};
    pub use crate::traits::{Dynamics, FnDynamics};
    pub use crate::types::{Control, CostWeights, State, Trajectory};
}
