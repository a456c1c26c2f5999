//! Therapy scheduling GA problem definition.
//!
//! Bridges the per-run [`SchedulingContext`] to the genetic optimizer:
//! builds initial individuals, scores them, and decodes the winner into
//! sessions.
//!
//! # Fitness
//!
//! Starting from 100:
//! - −25 per critical and −5 per warning from the constraint engine
//! - +5 per gene whose therapist is skilled for the therapy (at most +15)
//! - +10 when every gene uses the same room
//! - −3 per gap of more than 4 slots between consecutive slot indices
//!
//! The result is clamped to `[0, 100]`.

use rand::Rng;
use rand::prelude::IndexedRandom;

use super::operators::{GeneticOperators, shift_index};
use super::{Chromosome, GaProblem, Gene};
use crate::config::GaConfig;
use crate::constraints::validate_all;
use crate::context::SchedulingContext;
use crate::models::Session;

const CRITICAL_PENALTY: f64 = 25.0;
const WARNING_PENALTY: f64 = 5.0;
const SKILL_BONUS: f64 = 5.0;
const SKILL_BONUS_CAP: f64 = 15.0;
const SINGLE_ROOM_BONUS: f64 = 10.0;
const LARGE_GAP_SLOTS: usize = 4;
const LARGE_GAP_PENALTY: f64 = 3.0;
/// Slots between the base positions of consecutive steps.
const STEP_SPACING: usize = 2;

/// GA problem for one scheduling run.
///
/// # Example
/// ```no_run
/// use hybrid_schedule::context::SchedulingContext;
/// use hybrid_schedule::ga::{GeneticOptimizer, TherapyGaProblem};
/// use hybrid_schedule::config::GaConfig;
/// # fn ctx() -> SchedulingContext { unimplemented!() }
///
/// let ctx = ctx();
/// let problem = TherapyGaProblem::new(&ctx, &GaConfig::default());
/// let mut rng = rand::rng();
/// let outcome = GeneticOptimizer::new(GaConfig::default())
///     .run(&problem, &mut rng, |_| std::ops::ControlFlow::Continue(()));
/// ```
pub struct TherapyGaProblem<'a> {
    ctx: &'a SchedulingContext,
    operators: GeneticOperators,
    therapist_ids: Vec<String>,
    room_ids: Vec<String>,
    /// Skilled therapists, or every therapist when none is skilled.
    preferred_therapists: Vec<String>,
}

impl<'a> TherapyGaProblem<'a> {
    /// Creates a problem over a context, with operator rates from `config`.
    pub fn new(ctx: &'a SchedulingContext, config: &GaConfig) -> Self {
        let therapist_ids: Vec<String> = ctx.therapists.iter().map(|t| t.id.clone()).collect();
        let skilled: Vec<String> = ctx
            .skilled_therapists()
            .into_iter()
            .map(|t| t.id.clone())
            .collect();
        let preferred_therapists = if skilled.is_empty() {
            therapist_ids.clone()
        } else {
            skilled
        };

        Self {
            ctx,
            operators: GeneticOperators::from_config(config),
            therapist_ids,
            room_ids: ctx.rooms.iter().map(|r| r.id.clone()).collect(),
            preferred_therapists,
        }
    }

    /// The context this problem reads.
    pub fn context(&self) -> &SchedulingContext {
        self.ctx
    }

    /// Decodes a chromosome into sessions, one per gene, in workflow order.
    ///
    /// Sessions carry placeholder ids `pending_{n}`; the orchestrator
    /// assigns final ids.
    pub fn decode(&self, chromosome: &Chromosome) -> Vec<Session> {
        let ctx = self.ctx;
        ctx.therapy
            .workflow
            .iter()
            .zip(chromosome.genes())
            .enumerate()
            .filter_map(|(i, (step, gene))| {
                let slot = ctx.time_slots.get(gene.slot_index)?;
                Some(
                    Session::new(
                        format!("pending_{}", i + 1),
                        &ctx.therapy.name,
                        &gene.therapist_id,
                        &gene.room_id,
                        &ctx.patient.id,
                        slot.start,
                        slot.end,
                    )
                    .with_action(&step.action)
                    .with_step(step.step)
                    .with_slot_index(gene.slot_index),
                )
            })
            .collect()
    }

    /// Encodes sessions (e.g. an initial placement) as a chromosome.
    ///
    /// Returns `None` when the sessions do not cover the workflow or a
    /// session has no slot index.
    pub fn encode(&self, sessions: &[Session]) -> Option<Chromosome> {
        let genes = sessions
            .iter()
            .map(|s| {
                s.slot_index
                    .map(|idx| Gene::new(&s.therapist_id, &s.room_id, idx))
            })
            .collect::<Option<Vec<_>>>()?;
        Chromosome::new(genes, self.ctx.therapy.workflow.len(), self.ctx.num_slots()).ok()
    }

    fn heuristic_adjustment(&self, chromosome: &Chromosome) -> f64 {
        let genes = chromosome.genes();
        let therapy = &self.ctx.therapy.name;

        let skilled = genes
            .iter()
            .filter(|g| {
                self.ctx
                    .therapist(&g.therapist_id)
                    .is_some_and(|t| t.is_skilled_for(therapy))
            })
            .count();
        let mut adjustment = (skilled as f64 * SKILL_BONUS).min(SKILL_BONUS_CAP);

        if let Some(first) = genes.first() {
            if genes.iter().all(|g| g.room_id == first.room_id) {
                adjustment += SINGLE_ROOM_BONUS;
            }
        }

        let mut slots = chromosome.slot_indices();
        slots.sort_unstable();
        let large_gaps = slots
            .windows(2)
            .filter(|w| w[1] - w[0] > LARGE_GAP_SLOTS)
            .count();
        adjustment - large_gaps as f64 * LARGE_GAP_PENALTY
    }
}

impl GaProblem for TherapyGaProblem<'_> {
    /// Skilled therapist (any when none is skilled), uniform room, and a
    /// slot near `step * 2`, jittered by ±1.
    fn create_individual<R: Rng>(&self, rng: &mut R) -> Chromosome {
        let num_slots = self.ctx.num_slots();
        let genes = (0..self.ctx.therapy.workflow.len())
            .map(|i| {
                let therapist = self
                    .preferred_therapists
                    .choose(rng)
                    .cloned()
                    .unwrap_or_default();
                let room = self.room_ids.choose(rng).cloned().unwrap_or_default();
                let jitter: i64 = rng.random_range(-1..=1);
                Gene::new(therapist, room, shift_index(i * STEP_SPACING, jitter, num_slots))
            })
            .collect();
        Chromosome::from_genes(genes)
    }

    fn evaluate(&self, chromosome: &Chromosome) -> f64 {
        let sessions = self.decode(chromosome);
        let report = validate_all(&sessions, self.ctx);

        let fitness = 100.0
            - report.summary.critical as f64 * CRITICAL_PENALTY
            - report.summary.warnings as f64 * WARNING_PENALTY
            + self.heuristic_adjustment(chromosome);
        fitness.clamp(0.0, 100.0)
    }

    fn crossover<R: Rng>(
        &self,
        p1: &Chromosome,
        p2: &Chromosome,
        rng: &mut R,
    ) -> (Chromosome, Chromosome) {
        self.operators.crossover(p1, p2, rng)
    }

    fn mutate<R: Rng>(&self, chromosome: &mut Chromosome, rng: &mut R) {
        self.operators.mutate(
            chromosome,
            &self.therapist_ids,
            &self.room_ids,
            self.ctx.num_slots(),
            rng,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::context;
    use crate::models::{Room, Therapist};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn test_create_individual_shape() {
        let ctx = context(3);
        let problem = TherapyGaProblem::new(&ctx, &GaConfig::default());
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..20 {
            let c = problem.create_individual(&mut rng);
            assert_eq!(c.len(), 3);
            for (i, g) in c.genes().iter().enumerate() {
                assert_eq!(g.therapist_id, "t1");
                assert_eq!(g.room_id, "r1");
                let base = i * 2;
                assert!(g.slot_index + 1 >= base && g.slot_index <= base + 1);
            }
        }
    }

    #[test]
    fn test_prefers_skilled_therapists() {
        let mut ctx = context(4);
        ctx.therapists.push(Therapist::new("t2").with_skill("Nasya").full_week());
        let problem = TherapyGaProblem::new(&ctx, &GaConfig::default());
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..20 {
            let c = problem.create_individual(&mut rng);
            assert!(c.genes().iter().all(|g| g.therapist_id == "t1"));
        }
    }

    #[test]
    fn test_decode_uses_slot_times() {
        let ctx = context(2);
        let problem = TherapyGaProblem::new(&ctx, &GaConfig::default());
        let c = Chromosome::new(
            vec![Gene::new("t1", "r1", 0), Gene::new("t1", "r1", 5)],
            2,
            ctx.num_slots(),
        )
        .unwrap();
        let sessions = problem.decode(&c);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].title, "Vamana - step1");
        assert_eq!(sessions[1].start, ctx.time_slots[5].start);
        assert_eq!(sessions[1].step_number, 2);
        assert_eq!(sessions[1].slot_index, Some(5));
        assert_eq!(problem.encode(&sessions), Some(c));
    }

    #[test]
    fn test_fitness_of_clean_schedule() {
        let mut ctx = context(2);
        ctx.material_requirements.clear();
        let problem = TherapyGaProblem::new(&ctx, &GaConfig::default());
        // Same day, 9-11 and 13-15: no violations; +10 skill (2 genes), +10 single room
        let c = Chromosome::new(
            vec![Gene::new("t1", "r1", 0), Gene::new("t1", "r1", 2)],
            2,
            ctx.num_slots(),
        )
        .unwrap();
        assert_eq!(problem.evaluate(&c), 100.0);
    }

    #[test]
    fn test_fitness_penalizes_conflicts() {
        let mut ctx = context(2);
        ctx.material_requirements.clear();
        let problem = TherapyGaProblem::new(&ctx, &GaConfig::default());

        // Same slot and room: two room overlaps plus a negative gap
        let clash = Chromosome::new(
            vec![Gene::new("t1", "r1", 0), Gene::new("t1", "r1", 0)],
            2,
            ctx.num_slots(),
        )
        .unwrap();
        // 100 - 3 * 25 + 10 skill + 10 single room
        assert_eq!(problem.evaluate(&clash), 45.0);
    }

    #[test]
    fn test_fitness_penalizes_warnings_and_large_gaps() {
        let mut ctx = context(2);
        ctx.material_requirements.clear();
        ctx.therapists = vec![Therapist::new("t1").with_skill("Nasya").full_week()];
        ctx.rooms.push(Room::new("r2"));
        let problem = TherapyGaProblem::new(&ctx, &GaConfig::default());

        // Mon 09:00 and Tue 11:00 in different rooms, five slots apart
        let spread = Chromosome::new(
            vec![Gene::new("t1", "r1", 0), Gene::new("t1", "r2", 5)],
            2,
            ctx.num_slots(),
        )
        .unwrap();
        // 100 - 2 * 5 skill warnings - 3 large gap
        assert_eq!(problem.evaluate(&spread), 87.0);
    }

    proptest! {
        #[test]
        fn prop_fitness_in_bounds(
            seed in any::<u64>(),
            slots in proptest::collection::vec(0usize..48, 3),
            rooms in proptest::collection::vec(0usize..2, 3),
        ) {
            let mut ctx = context(3);
            ctx.rooms.push(Room::new("r2"));
            let problem = TherapyGaProblem::new(&ctx, &GaConfig::default());
            let genes = slots
                .iter()
                .zip(&rooms)
                .map(|(&s, &r)| Gene::new("t1", format!("r{}", r + 1), s))
                .collect();
            let c = Chromosome::new(genes, 3, ctx.num_slots()).unwrap();
            let f = problem.evaluate(&c);
            prop_assert!((0.0..=100.0).contains(&f));

            let mut rng = SmallRng::seed_from_u64(seed);
            let random = problem.create_individual(&mut rng);
            let f = problem.evaluate(&random);
            prop_assert!((0.0..=100.0).contains(&f));
        }
    }
}
