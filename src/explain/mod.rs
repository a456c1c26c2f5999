//! Explainability: a per-run decision ledger.
//!
//! The orchestrator brackets each pipeline phase with
//! [`ExplainabilityLog::start_phase`]/[`ExplainabilityLog::end_phase`] and
//! records every placement, optimization, constraint action, preemption
//! and conflict resolution. Reports and the markdown narrative are pure
//! functions of the log contents.
//!
//! One log belongs to one scheduler and is cleared at the start of every
//! run; there is no global instance.

mod entry;
mod log;
mod report;

pub use entry::{EntryType, ExplanationEntry, PhaseId, PhaseRecord};
pub use log::{ExplainabilityLog, LogMetrics};
pub use report::{AuditEntry, ExplanationReport, PhaseSummary, ReportSummary};

pub(crate) use log::format_interval;
