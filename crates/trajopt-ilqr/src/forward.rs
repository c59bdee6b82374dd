//! Forward pass: line search over the feedforward step size.

use rayon::prelude::*;

use trajopt_core::config::LineSearchConfig;
use trajopt_core::traits::Dynamics;
use trajopt_core::types::Trajectory;

use crate::cost::{CostBreakdown, CostModel};
use crate::types::GainEntry;

/// Outcome of a line search.
#[derive(Clone, Debug)]
pub struct ForwardResult {
    pub trajectory: Trajectory,
    pub cost: CostBreakdown,
    /// Accepted step size, `None` if no candidate beat the nominal.
    pub alpha: Option<f64>,
}

/// Best trajectory seen so far; starts as the nominal.
struct Incumbent {
    trajectory: Trajectory,
    cost: CostBreakdown,
    alpha: Option<f64>,
}

impl Incumbent {
    /// Keep `candidate` if it is strictly cheaper. Returns the candidate's
    /// total cost, infinite when the rollout was rejected.
    fn offer(&mut self, alpha: f64, candidate: Option<(Trajectory, CostBreakdown)>) -> f64 {
        let Some((trajectory, cost)) = candidate else {
            return f64::INFINITY;
        };
        let total = cost.total();
        if total < self.cost.total() {
            *self = Self {
                trajectory,
                cost,
                alpha: Some(alpha),
            };
        }
        total
    }
}

/// Roll out `û_t = u_t + K_t·diff(x̂_t, x_t) + α·d_t` from the nominal
/// initial state. Diverging or non-finite candidates yield `None`.
pub fn rollout_candidate<D: Dynamics + ?Sized>(
    dynamics: &D,
    cost: &CostModel,
    nominal: &Trajectory,
    gains: &[GainEntry],
    alpha: f64,
) -> Option<(Trajectory, CostBreakdown)> {
    let mut states = Vec::with_capacity(gains.len() + 1);
    let mut controls = Vec::with_capacity(gains.len());
    states.push(nominal.initial_state().clone());

    for (t, gain) in gains.iter().enumerate() {
        let dx = cost.diff(&states[t], &nominal.states()[t]);
        let u = &nominal.controls()[t] + &gain.k * dx + &gain.d * alpha;
        let next = dynamics.step(&states[t], &u);
        if !next.iter().all(|v| v.is_finite()) {
            return None;
        }
        controls.push(u);
        states.push(next);
    }

    let trajectory = Trajectory::new(states, controls).ok()?;
    let breakdown = cost.trajectory_cost(&trajectory);
    breakdown.total().is_finite().then_some((trajectory, breakdown))
}

/// Search step sizes and return the cheapest trajectory found.
///
/// The result never costs more than `nominal_cost`: the nominal is returned
/// unchanged when no candidate is strictly cheaper.
pub fn forward_pass<D: Dynamics + ?Sized>(
    dynamics: &D,
    cost: &CostModel,
    nominal: &Trajectory,
    nominal_cost: CostBreakdown,
    gains: &[GainEntry],
    config: &LineSearchConfig,
) -> ForwardResult {
    let mut best = Incumbent {
        trajectory: nominal.clone(),
        cost: nominal_cost,
        alpha: None,
    };

    match *config {
        LineSearchConfig::Grid { samples, min, max } => {
            let alphas = grid(samples, min, max);
            let candidates: Vec<_> = alphas
                .par_iter()
                .map(|&alpha| rollout_candidate(dynamics, cost, nominal, gains, alpha))
                .collect();
            // Sequential reduction in grid order: ties keep the earlier sample.
            for (alpha, candidate) in alphas.into_iter().zip(candidates) {
                best.offer(alpha, candidate);
            }
        }
        LineSearchConfig::GoldenSection {
            iterations,
            min,
            max,
        } => {
            let mut probe = |alpha: f64| {
                best.offer(
                    alpha,
                    rollout_candidate(dynamics, cost, nominal, gains, alpha),
                )
            };
            golden_section(&mut probe, min, max, iterations);
        }
    }

    ForwardResult {
        trajectory: best.trajectory,
        cost: best.cost,
        alpha: best.alpha,
    }
}

/// `samples` evenly spaced values over `[min, max]`, both ends included.
#[allow(clippy::cast_precision_loss)]
pub fn grid(samples: usize, min: f64, max: f64) -> Vec<f64> {
    match samples {
        0 => Vec::new(),
        1 => vec![min],
        n => {
            let last = (n - 1) as f64;
            (0..n)
                .map(|i| min + (max - min) * (i as f64 / last))
                .collect()
        }
    }
}

/// Golden-section minimization of `f` over `[min, max]`.
///
/// Both ends are probed first so a minimum on the boundary is hit exactly.
fn golden_section<F: FnMut(f64) -> f64>(f: &mut F, min: f64, max: f64, iterations: u32) {
    let inv_phi = (5.0_f64.sqrt() - 1.0) / 2.0;
    f(min);
    f(max);

    let (mut a, mut b) = (min, max);
    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);

    for _ in 0..iterations {
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = f(d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{DMatrix, DVector};
    use trajopt_core::traits::FnDynamics;
    use trajopt_core::types::{Control, CostWeights, State};

    fn integrator() -> FnDynamics<impl Fn(&State, &Control) -> State + Sync> {
        FnDynamics::new(1, 1, |x: &State, u: &Control| x + u)
    }

    fn scalar_cost() -> CostModel {
        let weights = CostWeights::diagonal(&[1.0], &[1.0]).unwrap();
        CostModel::new(weights, State::zeros(1), &[]).unwrap()
    }

    fn feedforward(d: f64) -> Vec<GainEntry> {
        vec![GainEntry {
            k: DMatrix::zeros(1, 1),
            d: DVector::from_element(1, d),
            expected_improvement: 0.0,
        }]
    }

    fn nominal_with(u: f64) -> Trajectory {
        Trajectory::rollout(
            &integrator(),
            State::from_element(1, 1.0),
            vec![Control::from_element(1, u)],
        )
        .unwrap()
    }

    #[test]
    fn grid_includes_both_ends() {
        let alphas = grid(20, -1.0, 1.0);
        assert_eq!(alphas.len(), 20);
        assert_relative_eq!(alphas[0], -1.0);
        assert_relative_eq!(alphas[19], 1.0);
        assert!(alphas.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(grid(1, 0.5, 2.0), vec![0.5]);
    }

    #[test]
    fn grid_finds_full_step() {
        // cost(u) = 1 + u² + (1 + u)², optimum u = -0.5 reached at α = 1.
        let cost = scalar_cost();
        let nominal = nominal_with(0.0);
        let nominal_cost = cost.trajectory_cost(&nominal);
        let result = forward_pass(
            &integrator(),
            &cost,
            &nominal,
            nominal_cost,
            &feedforward(-0.5),
            &LineSearchConfig::default(),
        );
        assert_eq!(result.alpha, Some(1.0));
        assert_relative_eq!(result.cost.total(), 1.5, epsilon = 1e-12);
        assert_relative_eq!(result.trajectory.controls()[0][0], -0.5, epsilon = 1e-12);
    }

    #[test]
    fn zero_gains_keep_nominal() {
        let cost = scalar_cost();
        let nominal = nominal_with(0.3);
        let nominal_cost = cost.trajectory_cost(&nominal);
        let result = forward_pass(
            &integrator(),
            &cost,
            &nominal,
            nominal_cost,
            &feedforward(0.0),
            &LineSearchConfig::default(),
        );
        assert_eq!(result.alpha, None);
        assert_eq!(result.trajectory, nominal);
        assert_eq!(result.cost, nominal_cost);
    }

    #[test]
    fn never_worse_than_nominal() {
        // Nominal already optimal; every nonzero step is uphill.
        let cost = scalar_cost();
        let nominal = nominal_with(-0.5);
        let nominal_cost = cost.trajectory_cost(&nominal);
        for config in [
            LineSearchConfig::default(),
            LineSearchConfig::GoldenSection {
                iterations: 30,
                min: -1.0,
                max: 1.0,
            },
        ] {
            let result = forward_pass(
                &integrator(),
                &cost,
                &nominal,
                nominal_cost,
                &feedforward(1.0),
                &config,
            );
            assert!(result.cost.total() <= nominal_cost.total());
            assert_eq!(result.alpha, None, "{config:?}");
            assert_eq!(result.trajectory, nominal);
        }
    }

    #[test]
    fn non_finite_candidates_are_rejected() {
        // The full step lands where the dynamics blow up.
        let dynamics = FnDynamics::new(1, 1, |x: &State, u: &Control| {
            if u[0] < -0.45 {
                State::from_element(1, f64::NAN)
            } else {
                x + u
            }
        });
        let cost = scalar_cost();
        let nominal = Trajectory::rollout(
            &dynamics,
            State::from_element(1, 1.0),
            vec![Control::zeros(1)],
        )
        .unwrap();
        let nominal_cost = cost.trajectory_cost(&nominal);
        let result = forward_pass(
            &dynamics,
            &cost,
            &nominal,
            nominal_cost,
            &feedforward(-0.5),
            &LineSearchConfig::default(),
        );
        let alpha = result.alpha.unwrap();
        assert!(alpha < 0.9, "accepted alpha {alpha}");
        assert!(result.cost.total().is_finite());
        assert!(result.cost.total() < nominal_cost.total());
    }

    #[test]
    fn golden_section_hits_boundary_optimum() {
        let cost = scalar_cost();
        let nominal = nominal_with(0.0);
        let nominal_cost = cost.trajectory_cost(&nominal);
        let result = forward_pass(
            &integrator(),
            &cost,
            &nominal,
            nominal_cost,
            &feedforward(-0.5),
            &LineSearchConfig::GoldenSection {
                iterations: 30,
                min: -1.0,
                max: 1.0,
            },
        );
        assert_eq!(result.alpha, Some(1.0));
        assert_relative_eq!(result.cost.total(), 1.5, epsilon = 1e-12);
    }

    #[test]
    fn golden_section_finds_interior_minimum() {
        let mut calls = 0;
        let mut best = (f64::INFINITY, 0.0);
        let mut f = |x: f64| {
            calls += 1;
            let value = (x - 0.3).powi(2);
            if value < best.0 {
                best = (value, x);
            }
            value
        };
        golden_section(&mut f, -1.0, 1.0, 40);
        assert_eq!(calls, 44);
        assert_relative_eq!(best.1, 0.3, epsilon = 1e-6);
    }
}
