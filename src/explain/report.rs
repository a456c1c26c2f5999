//! Reports rendered from an [`ExplainabilityLog`](super::ExplainabilityLog).

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entry::ExplanationEntry;
use super::log::LogMetrics;

/// Headline counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_phases: usize,
    pub total_decisions: usize,
    pub constraints_resolved: usize,
    pub conflicts_handled: usize,
    pub preemptions: usize,
    pub optimizations: usize,
}

/// One phase in the breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub name: String,
    pub description: String,
    /// `None` while the phase is still open.
    pub duration_ms: Option<i64>,
    pub summary: Option<String>,
    pub decision_count: usize,
}

/// Summary, per-phase breakdown and full timeline of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplanationReport {
    pub summary: ReportSummary,
    pub phases: Vec<PhaseSummary>,
    pub timeline: Vec<ExplanationEntry>,
    pub metrics: LogMetrics,
}

/// Compact record handed to an audit sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// `audit_{uuid}`.
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    /// What the run was about, typically the patient id.
    pub subject: String,
    pub summary: ReportSummary,
    /// Phase names in execution order.
    pub phases: Vec<String>,
    pub narrative: String,
}

impl ExplanationReport {
    /// Renders the deterministic markdown narrative.
    pub fn to_markdown(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();

        let _ = writeln!(out, "## Scheduling Decision Summary\n");
        let _ = writeln!(
            out,
            "The scheduling process completed in **{} phases** with **{} decisions**.\n",
            self.phases.len(),
            s.total_decisions
        );

        let highlights = [
            (s.constraints_resolved, "Resolved", "constraint violations"),
            (s.conflicts_handled, "Handled", "scheduling conflicts"),
            (s.preemptions, "Performed", "priority preemptions"),
            (s.optimizations, "Made", "optimization improvements"),
        ];
        for (count, verb, what) in highlights {
            if count > 0 {
                let _ = writeln!(out, "- {verb} **{count}** {what}");
            }
        }

        let _ = writeln!(out, "\n### Phase Breakdown\n");
        for phase in &self.phases {
            let _ = writeln!(out, "#### {}", phase.name);
            let _ = writeln!(out, "{}", phase.description);
            if let Some(summary) = &phase.summary {
                let _ = writeln!(out, "> {summary}");
            }
            let duration = phase
                .duration_ms
                .map_or_else(|| "In progress".to_string(), |ms| format!("{ms}ms"));
            let _ = writeln!(
                out,
                "Duration: {duration} | Decisions: {}\n",
                phase.decision_count
            );
        }

        out.trim_end().to_string()
    }

    /// Derives an audit record for `subject`.
    pub fn to_audit_entry(&self, subject: impl Into<String>) -> AuditEntry {
        AuditEntry {
            id: format!("audit_{}", Uuid::new_v4()),
            recorded_at: Utc::now(),
            subject: subject.into(),
            summary: self.summary,
            phases: self.phases.iter().map(|p| p.name.clone()).collect(),
            narrative: self.to_markdown(),
        }
    }
}
