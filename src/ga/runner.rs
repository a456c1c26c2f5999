//! Generational GA loop.
//!
//! Each generation copies the elites, fills the rest of the population by
//! tournament selection, crossover and mutation, evaluates the children
//! (in parallel when configured), and re-sorts by fitness. The running
//! best never gets worse.

use std::ops::ControlFlow;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::operators::GeneticOperators;
use super::{Chromosome, GaProblem};
use crate::config::GaConfig;
use crate::convergence::has_converged;
use crate::error::{Result, SchedulerError};
use crate::parallel::par_map;

/// Per-generation snapshot passed to the progress callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// 1-based; 0 is the initial population.
    pub generation: usize,
    pub total_generations: usize,
    /// Best fitness seen so far.
    pub best_fitness: f64,
    /// Mean fitness of this generation's population.
    pub avg_fitness: f64,
}

/// Result of a GA run.
#[derive(Debug, Clone)]
pub struct GaOutcome {
    pub best: Chromosome,
    pub best_fitness: f64,
    pub generations_run: usize,
    pub converged: bool,
    /// The callback asked to stop before the run finished.
    pub cancelled: bool,
    /// One entry per generation, starting with the initial population.
    pub history: Vec<GenerationStats>,
}

impl GaOutcome {
    /// Best fitness of the initial population.
    pub fn initial_fitness(&self) -> f64 {
        self.history.first().map_or(0.0, |s| s.best_fitness)
    }
}

/// Runs a [`GaProblem`] under a [`GaConfig`].
#[derive(Debug, Clone)]
pub struct GeneticOptimizer {
    config: GaConfig,
    workers: usize,
}

impl GeneticOptimizer {
    pub fn new(config: GaConfig) -> Self {
        Self { config, workers: 1 }
    }

    /// Number of threads used to evaluate a generation.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    /// Evolves a population and returns the best chromosome found.
    ///
    /// `on_generation` is called after the initial population and after
    /// every generation. Returning [`ControlFlow::Break`] stops the run and
    /// flags the outcome as cancelled; the best so far is still returned.
    ///
    /// # Errors
    /// [`SchedulerError::Configuration`] when `population_size` is zero.
    pub fn run<P, R, F>(&self, problem: &P, rng: &mut R, mut on_generation: F) -> Result<GaOutcome>
    where
        P: GaProblem,
        R: Rng,
        F: FnMut(&GenerationStats) -> ControlFlow<()>,
    {
        let config = &self.config;
        if config.population_size == 0 {
            return Err(SchedulerError::Configuration(
                "GA population size must be at least 1".into(),
            ));
        }
        let operators = GeneticOperators::from_config(config);

        let initial: Vec<Chromosome> = (0..config.population_size)
            .map(|_| problem.create_individual(rng))
            .collect();
        let mut population = self.evaluate(problem, initial);
        sort_descending(&mut population);

        let mut best = population[0].clone();
        let mut history = vec![self.stats(0, best.fitness, &population)];
        let mut converged = false;
        let mut cancelled = on_generation(&history[0]).is_break();
        let mut generations_run = 0;

        while !cancelled && generations_run < config.generations {
            let generation = generations_run + 1;
            let elite_count = config.elitism_count.min(population.len());
            let mut next: Vec<Chromosome> = population[..elite_count].to_vec();

            let mut children = Vec::with_capacity(config.population_size - elite_count);
            while next.len() + children.len() < config.population_size {
                let (Some(p1), Some(p2)) = (
                    operators.select(&population, rng),
                    operators.select(&population, rng),
                ) else {
                    break;
                };
                let (mut c1, mut c2) = problem.crossover(p1, p2, rng);
                problem.mutate(&mut c1, rng);
                problem.mutate(&mut c2, rng);
                children.push(c1);
                if next.len() + children.len() < config.population_size {
                    children.push(c2);
                }
            }

            next.extend(self.evaluate(problem, children));
            sort_descending(&mut next);
            population = next;
            generations_run = generation;

            if population[0].fitness > best.fitness {
                best = population[0].clone();
            }

            let stats = self.stats(generation, best.fitness, &population);
            debug!(
                generation,
                best_fitness = stats.best_fitness,
                avg_fitness = stats.avg_fitness,
                "GA generation"
            );
            cancelled = on_generation(&stats).is_break();
            history.push(stats);

            if has_converged(
                &history,
                config.convergence_generations,
                config.convergence_threshold,
                |s| s.best_fitness,
            ) {
                info!(generation, best_fitness = best.fitness, "GA converged");
                converged = true;
                break;
            }
        }

        Ok(GaOutcome {
            best_fitness: best.fitness,
            best,
            generations_run,
            converged,
            cancelled,
            history,
        })
    }

    fn evaluate<P: GaProblem>(&self, problem: &P, mut batch: Vec<Chromosome>) -> Vec<Chromosome> {
        let scores = par_map(&batch, self.workers, |c| problem.evaluate(c));
        for (c, score) in batch.iter_mut().zip(scores) {
            c.fitness = score;
        }
        batch
    }

    fn stats(&self, generation: usize, best: f64, population: &[Chromosome]) -> GenerationStats {
        let avg = population.iter().map(|c| c.fitness).sum::<f64>() / population.len() as f64;
        GenerationStats {
            generation,
            total_generations: self.config.generations,
            best_fitness: best,
            avg_fitness: avg,
        }
    }
}

fn sort_descending(population: &mut [Chromosome]) {
    population.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
}

/// True when the best fitness spread over the last `window` entries is
/// below `threshold`. A zero window never converges.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::context;
    use crate::ga::TherapyGaProblem;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn test_best_fitness_non_decreasing() {
        let ctx = context(3);
        let config = GaConfig::default()
            .with_population_size(20)
            .with_generations(30)
            .with_convergence(0.001, 0);
        let problem = TherapyGaProblem::new(&ctx, &config);
        let mut rng = SmallRng::seed_from_u64(42);

        let outcome = GeneticOptimizer::new(config)
            .run(&problem, &mut rng, |_| ControlFlow::Continue(()))
            .unwrap();

        assert_eq!(outcome.generations_run, 30);
        assert_eq!(outcome.history.len(), 31);
        assert!(!outcome.converged);
        for w in outcome.history.windows(2) {
            assert!(w[1].best_fitness >= w[0].best_fitness);
        }
        assert_eq!(outcome.best_fitness, outcome.history[30].best_fitness);
        assert_eq!(outcome.best.len(), 3);
        assert!(outcome.best_fitness >= outcome.initial_fitness());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let ctx = context(2);
        let config = GaConfig::default()
            .with_population_size(16)
            .with_generations(10);
        let problem = TherapyGaProblem::new(&ctx, &config);

        let serial = GeneticOptimizer::new(config.clone())
            .run(&problem, &mut SmallRng::seed_from_u64(42), |_| {
                ControlFlow::Continue(())
            })
            .unwrap();
        let parallel = GeneticOptimizer::new(config)
            .with_workers(4)
            .run(&problem, &mut SmallRng::seed_from_u64(42), |_| {
                ControlFlow::Continue(())
            })
            .unwrap();

        assert_eq!(serial.best, parallel.best);
        assert_eq!(serial.history, parallel.history);
    }

    #[test]
    fn test_callback_break_cancels() {
        let ctx = context(2);
        let config = GaConfig::default().with_population_size(10);
        let problem = TherapyGaProblem::new(&ctx, &config);
        let mut rng = SmallRng::seed_from_u64(42);
        let mut seen = 0;

        let outcome = GeneticOptimizer::new(config)
            .run(&problem, &mut rng, |stats| {
                seen += 1;
                if stats.generation == 3 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.generations_run, 3);
        assert_eq!(seen, 4);
    }

    #[test]
    fn test_zero_population_rejected() {
        let ctx = context(2);
        let config = GaConfig::default().with_population_size(0);
        let problem = TherapyGaProblem::new(&ctx, &config);
        let mut rng = SmallRng::seed_from_u64(42);
        let err = GeneticOptimizer::new(config)
            .run(&problem, &mut rng, |_| ControlFlow::Continue(()))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Configuration(_)));
    }
}
