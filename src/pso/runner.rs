//! Synchronous PSO loop.

use std::ops::ControlFlow;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::particle::{Coefficients, Particle};
use super::problem::SwarmProblem;
use crate::config::PsoConfig;
use crate::convergence::has_converged;
use crate::error::{Result, SchedulerError};
use crate::models::Session;
use crate::parallel::par_map;

/// Initial positions are jittered by up to this many slots.
const INIT_SPREAD: i64 = 2;

/// Per-iteration snapshot passed to the progress callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationStats {
    /// 1-based.
    pub iteration: usize,
    pub total_iterations: usize,
    pub global_best_fitness: f64,
    pub avg_fitness: f64,
    /// Inertia weight used for this iteration.
    pub inertia: f64,
}

/// Result of a swarm run.
#[derive(Debug, Clone)]
pub struct SwarmOutcome {
    pub best_position: Vec<usize>,
    pub best_fitness: f64,
    /// Best fitness of the initial swarm.
    pub initial_fitness: f64,
    pub iterations_run: usize,
    pub converged: bool,
    pub cancelled: bool,
    pub history: Vec<IterationStats>,
}

impl SwarmOutcome {
    /// Sessions rewritten onto the best position's slots.
    pub fn apply(&self, problem: &SwarmProblem<'_>) -> Vec<Session> {
        problem.apply(&self.best_position)
    }
}

/// Refines slot assignments with particle swarm search.
///
/// Every particle moves against the previous iteration's global best, so
/// a whole iteration can be evaluated in parallel and results do not
/// depend on the worker count.
#[derive(Debug, Clone)]
pub struct SwarmRefiner {
    config: PsoConfig,
    workers: usize,
}

impl SwarmRefiner {
    pub fn new(config: PsoConfig) -> Self {
        Self { config, workers: 1 }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn config(&self) -> &PsoConfig {
        &self.config
    }

    /// Runs the swarm seeded around the problem's current slots.
    ///
    /// `on_iteration` is called after every iteration; returning
    /// [`ControlFlow::Break`] stops the run with `cancelled` set.
    ///
    /// # Errors
    /// [`SchedulerError::Configuration`] when `swarm_size` is zero.
    pub fn run<R, F>(
        &self,
        problem: &SwarmProblem<'_>,
        rng: &mut R,
        mut on_iteration: F,
    ) -> Result<SwarmOutcome>
    where
        R: Rng,
        F: FnMut(&IterationStats) -> ControlFlow<()>,
    {
        let config = &self.config;
        if config.swarm_size == 0 {
            return Err(SchedulerError::Configuration(
                "PSO swarm size must be at least 1".into(),
            ));
        }

        let base = problem.base_position();
        let max_slot = problem.max_slot();
        let vmax = config.max_velocity.abs();

        let mut swarm: Vec<Particle> = (0..config.swarm_size)
            .map(|_| {
                let position = base
                    .iter()
                    .map(|&b| {
                        let jitter = rng.random_range(-INIT_SPREAD..=INIT_SPREAD);
                        (b as i64 + jitter).clamp(0, max_slot as i64) as usize
                    })
                    .collect();
                let velocity = base
                    .iter()
                    .map(|_| (rng.random::<f64>() - 0.5) * 2.0 * vmax)
                    .collect();
                Particle::new(position, velocity)
            })
            .collect();
        self.evaluate(problem, &mut swarm);

        let (mut best_position, mut best_fitness) = global_best(&swarm, (base.clone(), f64::MIN));
        let initial_fitness = best_fitness;

        let mut inertia = config.inertia_weight;
        let mut history: Vec<IterationStats> = Vec::new();
        let mut converged = false;
        let mut cancelled = false;

        for iteration in 1..=config.iterations {
            let coeffs = Coefficients {
                inertia,
                cognitive: config.cognitive_coef,
                social: config.social_coef,
                max_velocity: vmax,
            };
            for particle in &mut swarm {
                let r1: f64 = rng.random();
                let r2: f64 = rng.random();
                particle.advance(&best_position, coeffs, r1, r2, max_slot);
            }
            self.evaluate(problem, &mut swarm);
            (best_position, best_fitness) = global_best(&swarm, (best_position, best_fitness));

            let avg = swarm.iter().map(|p| p.fitness).sum::<f64>() / swarm.len() as f64;
            let stats = IterationStats {
                iteration,
                total_iterations: config.iterations,
                global_best_fitness: best_fitness,
                avg_fitness: avg,
                inertia,
            };
            debug!(
                iteration,
                best_fitness,
                avg_fitness = avg,
                "PSO iteration"
            );
            inertia *= config.inertia_decay;

            cancelled = on_iteration(&stats).is_break();
            history.push(stats);
            if cancelled {
                break;
            }
            if has_converged(
                &history,
                config.convergence_iterations,
                config.convergence_threshold,
                |s| s.global_best_fitness,
            ) {
                info!(iteration, best_fitness, "PSO converged");
                converged = true;
                break;
            }
        }

        Ok(SwarmOutcome {
            best_position,
            best_fitness,
            initial_fitness,
            iterations_run: history.len(),
            converged,
            cancelled,
            history,
        })
    }

    /// Scores every particle and refreshes personal bests.
    fn evaluate(&self, problem: &SwarmProblem<'_>, swarm: &mut [Particle]) {
        let scores = par_map(swarm, self.workers, |p| problem.evaluate(&p.position));
        for (particle, score) in swarm.iter_mut().zip(scores) {
            particle.fitness = score;
            particle.update_personal_best();
        }
    }
}

/// Best of `current` and every particle's personal best.
fn global_best(swarm: &[Particle], current: (Vec<usize>, f64)) -> (Vec<usize>, f64) {
    swarm.iter().fold(current, |(pos, fit), p| {
        if p.best_fitness > fit {
            (p.best_position.clone(), p.best_fitness)
        } else {
            (pos, fit)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::context;
    use crate::models::calendar::test_support::at;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn sessions(slots: &[usize]) -> Vec<Session> {
        slots
            .iter()
            .enumerate()
            .map(|(i, &slot)| {
                Session::new(format!("s{i}"), "Vamana", "t1", "r1", "p1", at(0, 9), at(0, 11))
                    .with_slot_index(slot)
            })
            .collect()
    }

    #[test]
    fn test_refines_overlapping_sessions() {
        let ctx = context(3);
        let problem = SwarmProblem::new(&ctx, sessions(&[0, 0, 0]));
        let mut rng = SmallRng::seed_from_u64(42);

        let outcome = SwarmRefiner::new(PsoConfig::default())
            .run(&problem, &mut rng, |_| ControlFlow::Continue(()))
            .unwrap();

        assert!(outcome.best_fitness > problem.evaluate(&[0, 0, 0]));
        assert!(outcome.best_fitness >= outcome.initial_fitness);
        for w in outcome.history.windows(2) {
            assert!(w[1].global_best_fitness >= w[0].global_best_fitness);
            assert!(w[1].inertia < w[0].inertia);
        }
        let refined = outcome.apply(&problem);
        assert_eq!(refined.len(), 3);
        assert!(refined.iter().all(|s| s.slot_index.is_some_and(|i| i < 48)));
    }

    #[test]
    fn test_parallel_matches_serial() {
        let ctx = context(3);
        let problem = SwarmProblem::new(&ctx, sessions(&[0, 1, 1]));
        let config = PsoConfig::default().with_iterations(10);

        let serial = SwarmRefiner::new(config.clone())
            .run(&problem, &mut SmallRng::seed_from_u64(42), |_| {
                ControlFlow::Continue(())
            })
            .unwrap();
        let parallel = SwarmRefiner::new(config)
            .with_workers(3)
            .run(&problem, &mut SmallRng::seed_from_u64(42), |_| {
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(serial.best_position, parallel.best_position);
        assert_eq!(serial.history, parallel.history);
    }

    #[test]
    fn test_cancel_after_first_iteration() {
        let ctx = context(2);
        let problem = SwarmProblem::new(&ctx, sessions(&[0, 1]));
        let mut rng = SmallRng::seed_from_u64(42);
        let outcome = SwarmRefiner::new(PsoConfig::default())
            .run(&problem, &mut rng, |_| ControlFlow::Break(()))
            .unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.iterations_run, 1);
    }

    #[test]
    fn test_converges_on_flat_fitness() {
        // Two in-order sessions in separate slots already score 100.
        let ctx = context(2);
        let problem = SwarmProblem::new(&ctx, sessions(&[0, 1]));
        let mut rng = SmallRng::seed_from_u64(42);
        let outcome = SwarmRefiner::new(PsoConfig::default())
            .run(&problem, &mut rng, |_| ControlFlow::Continue(()))
            .unwrap();
        assert!(outcome.converged);
        assert_eq!(outcome.iterations_run, 5);
        assert_eq!(outcome.best_fitness, 100.0);
    }

    #[test]
    fn test_zero_swarm_rejected() {
        let ctx = context(1);
        let problem = SwarmProblem::new(&ctx, sessions(&[0]));
        let mut rng = SmallRng::seed_from_u64(42);
        let err = SwarmRefiner::new(PsoConfig::default().with_swarm_size(0))
            .run(&problem, &mut rng, |_| ControlFlow::Continue(()))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(_)));
    }

    proptest! {
        #[test]
        fn prop_positions_stay_on_grid(
            seed in any::<u64>(),
            base in proptest::collection::vec(0usize..48, 1..5),
        ) {
            let ctx = context(1);
            let problem = SwarmProblem::new(&ctx, sessions(&base));
            let mut rng = SmallRng::seed_from_u64(seed);
            let config = PsoConfig::default().with_iterations(5).with_swarm_size(8);
            let outcome = SwarmRefiner::new(config)
                .run(&problem, &mut rng, |_| ControlFlow::Continue(()))
                .unwrap();
            prop_assert_eq!(outcome.best_position.len(), base.len());
            prop_assert!(outcome.best_position.iter().all(|&i| i < 48));
            prop_assert!((0.0..=100.0).contains(&outcome.best_fitness));
        }
    }
}
