//! Genetic operators for the gene-per-step encoding.
//!
//! - Selection: tournament of size K
//! - Crossover: single point, applied with probability `crossover_rate`
//! - Mutation: per gene with probability `mutation_rate`, one of
//!   re-roll therapist, re-roll room, or shift the slot by ±1 (clamped)
//!
//! # Usage
//!
//! ```
//! use hybrid_schedule::ga::operators::GeneticOperators;
//!
//! let ops = GeneticOperators::default();
//! assert_eq!(ops.tournament_size, 3);
//! ```

use rand::Rng;
use rand::prelude::IndexedRandom;

use super::Chromosome;
use crate::config::GaConfig;

/// Rates and sizes used by the operators.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneticOperators {
    pub crossover_rate: f64,
    /// Per-gene mutation probability.
    pub mutation_rate: f64,
    pub tournament_size: usize,
}

impl Default for GeneticOperators {
    fn default() -> Self {
        Self::from_config(&GaConfig::default())
    }
}

impl GeneticOperators {
    /// Takes rates and tournament size from a GA config.
    pub fn from_config(config: &GaConfig) -> Self {
        Self {
            crossover_rate: config.crossover_rate,
            mutation_rate: config.mutation_rate,
            tournament_size: config.tournament_size,
        }
    }

    /// Tournament selection: the fittest of `tournament_size` uniform draws.
    /// `None` only for an empty population.
    pub fn select<'a, R: Rng>(
        &self,
        population: &'a [Chromosome],
        rng: &mut R,
    ) -> Option<&'a Chromosome> {
        (0..self.tournament_size.max(1))
            .filter_map(|_| population.choose(rng))
            .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }

    /// Single-point crossover.
    ///
    /// With probability `1 - crossover_rate` the parents are cloned
    /// unchanged. Children swap tails at a uniformly chosen gene index.
    pub fn crossover<R: Rng>(
        &self,
        p1: &Chromosome,
        p2: &Chromosome,
        rng: &mut R,
    ) -> (Chromosome, Chromosome) {
        let len = p1.len().min(p2.len());
        if len == 0 || !rng.random_bool(self.crossover_rate.clamp(0.0, 1.0)) {
            return (p1.clone(), p2.clone());
        }

        let point = rng.random_range(0..len);
        let (a, b) = (p1.genes(), p2.genes());
        let c1 = a[..point].iter().chain(&b[point..]).cloned().collect();
        let c2 = b[..point].iter().chain(&a[point..]).cloned().collect();
        (Chromosome::from_genes(c1), Chromosome::from_genes(c2))
    }

    /// Mutates genes in place.
    ///
    /// Empty `therapists`/`rooms` leave the corresponding field unchanged;
    /// slot shifts stay within `[0, num_slots)`.
    pub fn mutate<R: Rng>(
        &self,
        chromosome: &mut Chromosome,
        therapists: &[String],
        rooms: &[String],
        num_slots: usize,
        rng: &mut R,
    ) {
        let rate = self.mutation_rate.clamp(0.0, 1.0);
        for gene in chromosome.genes_mut() {
            if !rng.random_bool(rate) {
                continue;
            }
            match rng.random_range(0..3) {
                0 => {
                    if let Some(t) = therapists.choose(rng) {
                        gene.therapist_id = t.clone();
                    }
                }
                1 => {
                    if let Some(r) = rooms.choose(rng) {
                        gene.room_id = r.clone();
                    }
                }
                _ => {
                    let shift: i64 = rng.random_range(-1..=1);
                    gene.slot_index = shift_index(gene.slot_index, shift, num_slots);
                }
            }
        }
    }
}

/// Moves `index` by `shift`, clamped to `[0, len)`.
pub(crate) fn shift_index(index: usize, shift: i64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let max = (len - 1) as i64;
    (index as i64 + shift).clamp(0, max) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::Gene;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn chromosome(tag: &str, slots: &[usize], fitness: f64) -> Chromosome {
        let mut c = Chromosome::from_genes(
            slots
                .iter()
                .map(|&s| Gene::new(format!("{tag}-t"), format!("{tag}-r"), s))
                .collect(),
        );
        c.fitness = fitness;
        c
    }

    #[test]
    fn test_select_prefers_fitter() {
        let ops = GeneticOperators {
            tournament_size: 8,
            ..GeneticOperators::default()
        };
        let pop = vec![chromosome("a", &[0], 10.0), chromosome("b", &[0], 90.0)];
        let mut rng = SmallRng::seed_from_u64(42);
        let wins = (0..50)
            .filter(|_| ops.select(&pop, &mut rng).map(|c| c.fitness) == Some(90.0))
            .count();
        assert!(wins > 45);
        assert!(ops.select(&[], &mut rng).is_none());
    }

    #[test]
    fn test_crossover_swaps_tails() {
        let ops = GeneticOperators {
            crossover_rate: 1.0,
            ..GeneticOperators::default()
        };
        let p1 = chromosome("a", &[0, 1, 2, 3], 0.0);
        let p2 = chromosome("b", &[4, 5, 6, 7], 0.0);
        let mut rng = SmallRng::seed_from_u64(42);
        let (c1, c2) = ops.crossover(&p1, &p2, &mut rng);

        assert_eq!(c1.len(), 4);
        assert_eq!(c2.len(), 4);
        let point = c1.genes().iter().take_while(|g| g.room_id == "a-r").count();
        assert!(c1.genes()[point..].iter().all(|g| g.room_id == "b-r"));
        assert!(c2.genes()[..point].iter().all(|g| g.room_id == "b-r"));
        assert!(c2.genes()[point..].iter().all(|g| g.room_id == "a-r"));
    }

    #[test]
    fn test_crossover_rate_zero_clones() {
        let ops = GeneticOperators {
            crossover_rate: 0.0,
            ..GeneticOperators::default()
        };
        let p1 = chromosome("a", &[0, 1], 0.0);
        let p2 = chromosome("b", &[2, 3], 0.0);
        let mut rng = SmallRng::seed_from_u64(42);
        let (c1, c2) = ops.crossover(&p1, &p2, &mut rng);
        assert_eq!(c1, p1);
        assert_eq!(c2, p2);
    }

    #[test]
    fn test_mutation_respects_bounds() {
        let ops = GeneticOperators {
            mutation_rate: 1.0,
            ..GeneticOperators::default()
        };
        let therapists = vec!["t1".to_string(), "t2".to_string()];
        let rooms = vec!["r1".to_string()];
        let mut rng = SmallRng::seed_from_u64(42);
        let mut c = chromosome("a", &[0, 4, 4, 0], 0.0);

        for _ in 0..200 {
            ops.mutate(&mut c, &therapists, &rooms, 5, &mut rng);
            assert_eq!(c.len(), 4);
            assert!(c.genes().iter().all(|g| g.slot_index < 5));
        }
        assert!(c.genes().iter().all(|g| g.room_id == "r1"));
        assert!(c.genes().iter().all(|g| g.therapist_id == "t1" || g.therapist_id == "t2"));
    }

    #[test]
    fn test_shift_index_clamps() {
        assert_eq!(shift_index(0, -1, 10), 0);
        assert_eq!(shift_index(9, 1, 10), 9);
        assert_eq!(shift_index(4, 1, 10), 5);
        assert_eq!(shift_index(3, 2, 0), 0);
    }
}
