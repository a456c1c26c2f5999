//! Priority model: tokens, the request queue, and preemption.
//!
//! # Levels
//!
//! | Level | Value |
//! |-------|-------|
//! | EMERGENCY | 100 |
//! | URGENT | 80 |
//! | HIGH | 60 |
//! | NORMAL | 40 |
//! | LOW | 20 |
//!
//! Sessions without a token rank as NORMAL everywhere.

mod preemption;
mod queue;
mod token;

pub use preemption::{
    FailedRelocation, HeuristicOutcome, HeuristicStep, PREEMPTION_BUFFER, PreemptionCandidate,
    PreemptionDecision, PreemptionManager, PreemptionOutcome, PreemptionRecord, Rescheduled,
    apply_priority_heuristics,
};
pub use queue::{PriorityQueueManager, QueueEntry, RequestStatus};
pub use token::{PriorityLevel, PriorityToken};
