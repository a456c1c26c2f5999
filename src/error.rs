//! Error types for the scheduling core.
//!
//! Only failures that halt a run are errors. Conflicts the resolver cannot
//! fix are reported as [`ConflictOutcome`](crate::orchestrator::ConflictOutcome)
//! values and never abort the pipeline.

use thiserror::Error;

use crate::orchestrator::Phase;

/// Result alias used throughout the crate.
pub type Result<T, E = SchedulerError> = std::result::Result<T, E>;

/// Errors raised by the scheduling core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// The patient has a critical contraindication for the therapy.
    #[error("patient {patient_id} is not eligible: {}", .conditions.join(", "))]
    Eligibility {
        patient_id: String,
        conditions: Vec<String>,
    },

    /// Inputs or configuration cannot produce a schedule (e.g. empty workflow).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A constructor invariant was broken (gene count, slot bounds).
    #[error("invalid {entity}: {message}")]
    Invariant {
        entity: &'static str,
        message: String,
    },

    /// The caller cancelled the run.
    #[error("scheduling run cancelled during {phase}")]
    Cancelled { phase: Phase },

    /// A lookup or commit against an external collaborator failed.
    #[error("collaborator failure: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// Anything unexpected, including panics caught at the orchestrator boundary.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SchedulerError {
    pub(crate) fn invariant(entity: &'static str, message: impl Into<String>) -> Self {
        Self::Invariant {
            entity,
            message: message.into(),
        }
    }
}

/// Failures reported by external data sources and sinks.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}
