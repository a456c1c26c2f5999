//! GA-based schedule optimization.
//!
//! Evolves allocations of therapist, room and time slot for each workflow
//! step. The problem-specific parts (initialization, fitness, operators)
//! sit behind [`GaProblem`]; [`GeneticOptimizer`] owns the generational
//! loop, elitism and convergence.
//!
//! # Encoding
//!
//! One [`Gene`] per workflow step: `{therapist_id, room_id, slot_index}`.
//! See [`Chromosome`] for the invariants.
//!
//! # Submodules
//!
//! - [`operators`]: tournament selection, single-point crossover and
//!   per-gene mutation

mod chromosome;
pub mod operators;
mod problem;
mod runner;

use rand::Rng;

pub use chromosome::{Chromosome, Gene};
pub use problem::TherapyGaProblem;
pub use runner::{GaOutcome, GenerationStats, GeneticOptimizer};

/// Problem-specific half of a GA run.
///
/// `evaluate` must be a pure function of the chromosome; the runner calls
/// it from several threads at once.
pub trait GaProblem: Sync {
    /// Builds one random individual for the initial population.
    fn create_individual<R: Rng>(&self, rng: &mut R) -> Chromosome;

    /// Fitness in `[0, 100]`, higher is better.
    fn evaluate(&self, chromosome: &Chromosome) -> f64;

    fn crossover<R: Rng>(
        &self,
        p1: &Chromosome,
        p2: &Chromosome,
        rng: &mut R,
    ) -> (Chromosome, Chromosome);

    fn mutate<R: Rng>(&self, chromosome: &mut Chromosome, rng: &mut R);
}
