//! Eight-phase scheduling pipeline.
//!
//! # Phases
//!
//! | Phase | Progress | Optional |
//! |-------|----------|----------|
//! | Protocol Retrieval | 10 | |
//! | Eligibility Check | 15 | |
//! | Initial Placement | 25 | |
//! | Genetic Algorithm | 50 | yes |
//! | Particle Swarm Optimization | 70 | yes |
//! | Priority Handling | 80 | |
//! | Conflict Resolution | 90 | |
//! | Finalization | 100 | |
//!
//! Phases run strictly in order. A critical contraindication stops the run
//! after the eligibility check; any other failure is recorded against the
//! phase it happened in. Either way the caller gets a [`ScheduleResult`]
//! carrying every completed phase's explanations.

mod conflict;
mod hybrid;
mod kpi;
mod placement;
mod progress;
mod result;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use conflict::{
    ConflictKind, ConflictOutcome, ConflictResolution, PendingPreemption, resolve_conflicts,
};
pub use hybrid::HybridScheduler;
pub use kpi::ScheduleKpi;
pub use placement::{InitialPlacement, create_initial_schedule};
pub use progress::{CancellationToken, ProgressEvent};
pub use result::{PhaseError, ScheduleMetrics, ScheduleResult};

/// A pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    ProtocolRetrieval,
    EligibilityCheck,
    InitialPlacement,
    GeneticAlgorithm,
    ParticleSwarm,
    PriorityHandling,
    ConflictResolution,
    Finalization,
}

impl Phase {
    /// Every phase in execution order.
    pub const ALL: [Phase; 8] = [
        Phase::ProtocolRetrieval,
        Phase::EligibilityCheck,
        Phase::InitialPlacement,
        Phase::GeneticAlgorithm,
        Phase::ParticleSwarm,
        Phase::PriorityHandling,
        Phase::ConflictResolution,
        Phase::Finalization,
    ];

    /// Human-readable name, used for explanation phases.
    pub const fn name(self) -> &'static str {
        match self {
            Phase::ProtocolRetrieval => "Protocol Retrieval",
            Phase::EligibilityCheck => "Eligibility Check",
            Phase::InitialPlacement => "Initial Placement",
            Phase::GeneticAlgorithm => "Genetic Algorithm",
            Phase::ParticleSwarm => "Particle Swarm Optimization",
            Phase::PriorityHandling => "Priority Handling",
            Phase::ConflictResolution => "Conflict Resolution",
            Phase::Finalization => "Finalization",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Phase::ProtocolRetrieval => "Loading therapy protocol and validating structure",
            Phase::EligibilityCheck => "Validating patient eligibility against contraindications",
            Phase::InitialPlacement => "Creating initial schedule using rule-based logic",
            Phase::GeneticAlgorithm => "Optimizing therapist, room, and material allocation",
            Phase::ParticleSwarm => "Refining session ordering and reducing conflicts",
            Phase::PriorityHandling => "Applying priority token for scheduling precedence",
            Phase::ConflictResolution => "Detecting and resolving scheduling conflicts",
            Phase::Finalization => "Preparing final schedule output",
        }
    }

    /// Overall progress, in percent, once this phase completes.
    pub const fn progress(self) -> f64 {
        match self {
            Phase::ProtocolRetrieval => 10.0,
            Phase::EligibilityCheck => 15.0,
            Phase::InitialPlacement => 25.0,
            Phase::GeneticAlgorithm => 50.0,
            Phase::ParticleSwarm => 70.0,
            Phase::PriorityHandling => 80.0,
            Phase::ConflictResolution => 90.0,
            Phase::Finalization => 100.0,
        }
    }

    /// The phase that follows, `None` after finalization.
    pub fn next(self) -> Option<Phase> {
        let i = Phase::ALL.iter().position(|&p| p == self)?;
        Phase::ALL.get(i + 1).copied()
    }

    /// The phase that precedes, `None` for protocol retrieval.
    pub fn previous(self) -> Option<Phase> {
        let i = Phase::ALL.iter().position(|&p| p == self)?;
        i.checked_sub(1).map(|j| Phase::ALL[j])
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
