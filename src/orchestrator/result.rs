//! Output of a scheduling run.

use serde::{Deserialize, Serialize};

use super::conflict::{ConflictResolution, PendingPreemption};
use super::kpi::ScheduleKpi;
use super::Phase;
use crate::constraints::Violation;
use crate::explain::ExplanationReport;
use crate::models::Session;
use crate::priority::PriorityLevel;

/// A failure recorded against the phase it happened in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseError {
    pub phase: Phase,
    pub message: String,
    /// Violations behind the failure, e.g. contraindications.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

/// Run statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleMetrics {
    pub total_sessions: usize,
    pub ga_generations: usize,
    pub ga_fitness: f64,
    pub pso_iterations: usize,
    pub pso_fitness: f64,
    /// Conflicts fixed by relocation.
    pub conflicts_resolved: usize,
    pub conflicts_unresolved: usize,
    pub priority: PriorityLevel,
    pub kpi: ScheduleKpi,
}

/// Everything a run produces.
///
/// `success` is true only when every phase completed. A cancelled run
/// has `cancelled` set and carries whatever was produced up to that
/// point in `schedule`, uncommitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub success: bool,
    pub cancelled: bool,
    pub schedule: Vec<Session>,
    pub metrics: ScheduleMetrics,
    pub explanations: ExplanationReport,
    /// Markdown narrative; `None` when explainability is disabled.
    pub explanation_summary: Option<String>,
    pub errors: Vec<PhaseError>,
    /// Critical findings (eligibility).
    pub violations: Vec<Violation>,
    /// Non-blocking findings, including unplaced workflow steps.
    pub warnings: Vec<Violation>,
    pub resolutions: Vec<ConflictResolution>,
    /// Preemptions proposed but not applied.
    pub pending_preemptions: Vec<PendingPreemption>,
}

impl ScheduleResult {
    /// First recorded failure, if any.
    pub fn failure(&self) -> Option<&PhaseError> {
        self.errors.first()
    }

    /// Whether the run halted in `phase`.
    pub fn failed_in(&self, phase: Phase) -> bool {
        self.errors.iter().any(|e| e.phase == phase)
    }
}
