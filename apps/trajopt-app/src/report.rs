//! Solve reports: JSON via serde, or a plain-text table for the terminal.

use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

use trajopt_core::config::ProblemConfig;
use trajopt_ilqr::{CostBreakdown, IterationRecord, Solution, Termination};

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub model: String,
    pub steps: usize,
    pub termination: Termination,
    pub iterations: usize,
    pub wall_time_ms: f64,
    pub goal: Vec<f64>,
    pub cost: CostBreakdown,
    pub total_cost: f64,
    pub history: Vec<IterationRecord>,
    pub states: Vec<Vec<f64>>,
    pub controls: Vec<Vec<f64>>,
}

impl Report {
    pub fn new(model: &str, problem: &ProblemConfig, solution: &Solution, elapsed: Duration) -> Self {
        let traj = &solution.trajectory;
        Self {
            model: model.to_owned(),
            steps: traj.horizon(),
            termination: solution.termination,
            iterations: solution.iterations,
            wall_time_ms: elapsed.as_secs_f64() * 1e3,
            goal: problem.goal.clone(),
            cost: solution.cost,
            total_cost: solution.total_cost(),
            history: solution.history.clone(),
            states: traj.states().iter().map(|x| x.as_slice().to_vec()).collect(),
            controls: traj.controls().iter().map(|u| u.as_slice().to_vec()).collect(),
        }
    }

    /// Human-readable summary followed by one row per timestep.
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "model: {}  steps: {}", self.model, self.steps);
        let _ = writeln!(
            out,
            "{} after {} iterations ({:.3} ms)",
            self.termination, self.iterations, self.wall_time_ms
        );
        let _ = writeln!(
            out,
            "cost: {:.6} (state {:.6}, control {:.6}, terminal {:.6})",
            self.total_cost, self.cost.state, self.cost.control, self.cost.terminal
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "{:>4}  {:<40}  control", "t", "state");
        for (t, state) in self.states.iter().enumerate() {
            let control = self
                .controls
                .get(t)
                .map_or_else(|| "-".to_owned(), |u| format_vector(u));
            let _ = writeln!(out, "{t:>4}  {:<40}  {control}", format_vector(state));
        }
        out
    }
}

fn format_vector(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:9.4}")).collect();
    format!("[{}]", parts.join(","))
}
