//! The decision log itself.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::entry::{EntryType, ExplanationEntry, PhaseId, PhaseRecord};
use super::report::{ExplanationReport, PhaseSummary, ReportSummary};
use crate::constraints::Violation;
use crate::models::{Interval, Session};

/// Counters updated by the logging methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMetrics {
    pub total_decisions: usize,
    pub constraint_violations_resolved: usize,
    pub conflicts_handled: usize,
    pub preemptions: usize,
    pub optimization_improvements: usize,
}

/// Phase-scoped, append-only decision ledger for one scheduling run.
///
/// Entries logged while a phase is open are attributed to the most
/// recently started phase.
///
/// # Example
/// ```
/// use hybrid_schedule::explain::ExplainabilityLog;
///
/// let mut log = ExplainabilityLog::new();
/// let phase = log.start_phase("Genetic Algorithm", "Optimizing allocation");
/// log.log_optimization("Genetic Algorithm", 60.0, 85.0);
/// log.end_phase(phase, Some("fitness 85.0".into()));
///
/// let report = log.generate_report();
/// assert_eq!(report.summary.total_decisions, 1);
/// assert_eq!(report.phases[0].decision_count, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExplainabilityLog {
    entries: Vec<ExplanationEntry>,
    phases: Vec<PhaseRecord>,
    metrics: LogMetrics,
    next_id: usize,
}

impl ExplainabilityLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a phase and returns its handle.
    pub fn start_phase(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> PhaseId {
        self.phases.push(PhaseRecord::open(name, description));
        PhaseId(self.phases.len() - 1)
    }

    /// Closes a phase, recording its duration and an optional summary.
    /// Unknown or already closed phases are ignored.
    pub fn end_phase(&mut self, phase: PhaseId, summary: Option<String>) {
        if let Some(record) = self.phases.get_mut(phase.0).filter(|p| p.is_open()) {
            record.close(summary);
        }
    }

    /// Records where a session was placed and why.
    pub fn log_placement(&mut self, session: &Session, reason: &str) -> &ExplanationEntry {
        let slot = format_interval(&session.interval());
        let label = if session.action.is_empty() {
            &session.title
        } else {
            &session.action
        };
        let priority = session
            .priority
            .as_ref()
            .map_or_else(|| "NORMAL".to_string(), |t| t.level.to_string());

        let details = BTreeMap::from([
            ("session".to_string(), summarize_session(session)),
            ("slot".to_string(), json!(slot)),
            ("reason".to_string(), json!(reason)),
            (
                "factors".to_string(),
                json!([
                    {
                        "factor": "Therapist Match",
                        "value": assigned(&session.therapist_id, "Assigned")
                    },
                    {
                        "factor": "Room Availability",
                        "value": assigned(&session.room_id, "Reserved")
                    },
                    {"factor": "Time Slot", "value": slot},
                    {"factor": "Priority", "value": priority},
                ]),
            ),
        ]);

        self.metrics.total_decisions += 1;
        self.push(EntryType::Placement, format!("Placed \"{label}\" at {slot}"), details)
    }

    /// Records a fitness change made by an optimizer phase.
    pub fn log_optimization(&mut self, phase: &str, before: f64, after: f64) -> &ExplanationEntry {
        let improvement = after - before;
        let percent = improvement / before.max(1.0) * 100.0;
        let details = BTreeMap::from([
            ("phase".to_string(), json!(phase)),
            ("before_fitness".to_string(), json!(before)),
            ("after_fitness".to_string(), json!(after)),
            ("improvement".to_string(), json!(format!("{improvement:.2}"))),
            ("improvement_percent".to_string(), json!(format!("{percent:.1}%"))),
        ]);

        self.metrics.total_decisions += 1;
        self.metrics.optimization_improvements += 1;
        self.push(
            EntryType::Optimization,
            format!("{phase} improved fitness from {before:.1} to {after:.1}"),
            details,
        )
    }

    /// Records the action taken on a constraint violation.
    pub fn log_constraint(
        &mut self,
        violation: &Violation,
        action: &str,
        outcome: &str,
    ) -> &ExplanationEntry {
        let kind = violation.kind.as_str();
        let details = BTreeMap::from([
            ("constraint_type".to_string(), json!(kind)),
            ("severity".to_string(), json!(violation.severity.as_str())),
            ("original_issue".to_string(), json!(violation.message)),
            ("action_taken".to_string(), json!(action)),
            ("outcome".to_string(), json!(outcome)),
        ]);

        self.metrics.total_decisions += 1;
        self.metrics.constraint_violations_resolved += 1;
        self.push(
            EntryType::Constraint,
            format!("{action} for {kind}: {outcome}"),
            details,
        )
    }

    /// Records one session displacing another.
    ///
    /// `result` describes what happened to the displaced session;
    /// `new_slot` is where it went, if anywhere.
    pub fn log_preemption(
        &mut self,
        preempting: &Session,
        preempted: &Session,
        reason: &str,
        result: &str,
        new_slot: Option<&Interval>,
    ) -> &ExplanationEntry {
        let details = BTreeMap::from([
            ("preempting_session".to_string(), summarize_session(preempting)),
            ("preempted_session".to_string(), summarize_session(preempted)),
            ("reason".to_string(), json!(reason)),
            ("result".to_string(), json!(result)),
            (
                "new_slot".to_string(),
                json!(new_slot.map_or_else(|| "N/A".to_string(), format_interval)),
            ),
        ]);

        self.metrics.total_decisions += 1;
        self.metrics.preemptions += 1;
        self.push(
            EntryType::Preemption,
            format!("\"{}\" preempted \"{}\"", preempting.title, preempted.title),
            details,
        )
    }

    /// Records how a conflict was handled.
    pub fn log_conflict_resolution(
        &mut self,
        conflict_type: &str,
        conflict_details: &str,
        resolution: &str,
        alternatives: &[Interval],
    ) -> &ExplanationEntry {
        let details = BTreeMap::from([
            ("conflict_type".to_string(), json!(conflict_type)),
            ("conflict_details".to_string(), json!(conflict_details)),
            ("resolution".to_string(), json!(resolution)),
            ("alternatives_considered".to_string(), json!(alternatives.len())),
            (
                "chosen_alternative".to_string(),
                alternatives
                    .first()
                    .map_or(Value::Null, |iv| json!(format_interval(iv))),
            ),
        ]);

        self.metrics.total_decisions += 1;
        self.metrics.conflicts_handled += 1;
        self.push(
            EntryType::Conflict,
            format!("{conflict_type} conflict: {resolution}"),
            details,
        )
    }

    /// Records a caller-supplied decision, e.g. a manual override.
    pub fn log_manual(
        &mut self,
        summary: impl Into<String>,
        details: BTreeMap<String, Value>,
    ) -> &ExplanationEntry {
        self.metrics.total_decisions += 1;
        self.push(EntryType::Manual, summary.into(), details)
    }

    fn push(
        &mut self,
        entry_type: EntryType,
        summary: String,
        details: BTreeMap<String, Value>,
    ) -> &ExplanationEntry {
        self.next_id += 1;
        let entry = ExplanationEntry {
            id: format!("exp_{}", self.next_id),
            entry_type,
            summary,
            details,
            timestamp: Utc::now(),
        };
        if let Some(phase) = self.phases.last_mut().filter(|p| p.is_open()) {
            phase.entry_ids.push(entry.id.clone());
        }
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[ExplanationEntry] {
        &self.entries
    }

    pub fn phases(&self) -> &[PhaseRecord] {
        &self.phases
    }

    pub fn metrics(&self) -> LogMetrics {
        self.metrics
    }

    /// Entries of one type, in log order.
    pub fn entries_by_type(&self, entry_type: EntryType) -> Vec<&ExplanationEntry> {
        self.entries
            .iter()
            .filter(|e| e.entry_type == entry_type)
            .collect()
    }

    /// The last `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> &[ExplanationEntry] {
        &self.entries[self.entries.len().saturating_sub(count)..]
    }

    /// Summary, per-phase breakdown and full timeline.
    pub fn generate_report(&self) -> ExplanationReport {
        let m = self.metrics;
        ExplanationReport {
            summary: ReportSummary {
                total_phases: self.phases.len(),
                total_decisions: m.total_decisions,
                constraints_resolved: m.constraint_violations_resolved,
                conflicts_handled: m.conflicts_handled,
                preemptions: m.preemptions,
                optimizations: m.optimization_improvements,
            },
            phases: self
                .phases
                .iter()
                .map(|p| PhaseSummary {
                    name: p.name.clone(),
                    description: p.description.clone(),
                    duration_ms: p.duration_ms,
                    summary: p.summary.clone(),
                    decision_count: p.entry_ids.len(),
                })
                .collect(),
            timeline: self.entries.clone(),
            metrics: m,
        }
    }

    /// Markdown narrative of the report.
    pub fn generate_nl_summary(&self) -> String {
        self.generate_report().to_markdown()
    }

    /// Drops every entry and phase and zeroes the counters.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn assigned(id: &str, label: &'static str) -> &'static str {
    if id.is_empty() { "TBD" } else { label }
}

/// `2026-01-05 09:00 - 11:00`, in the interval's own offset.
pub(crate) fn format_interval(interval: &Interval) -> String {
    format!(
        "{} - {}",
        interval.start.format("%Y-%m-%d %H:%M"),
        interval.end.format("%H:%M")
    )
}

fn summarize_session(session: &Session) -> Value {
    json!({
        "id": session.id,
        "title": session.title,
        "type": session.session_type,
        "therapist": session.therapist_id,
        "room": session.room_id,
        "priority": session
            .priority
            .as_ref()
            .map_or_else(|| "NORMAL".to_string(), |t| t.level.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::ConstraintKind;
    use crate::models::calendar::test_support::at;
    use crate::priority::{PriorityLevel, PriorityToken};

    fn session(id: &str) -> Session {
        Session::new(id, "Vamana", "t1", "r1", "p1", at(0, 9), at(0, 11)).with_action("oleation")
    }

    fn populated() -> ExplainabilityLog {
        let mut log = ExplainabilityLog::new();
        let p1 = log.start_phase("Initial Placement", "Rule-based placement");
        log.log_placement(&session("a"), "Initial rule-based placement");
        log.log_placement(&session("b"), "Initial rule-based placement");
        log.end_phase(p1, Some("Created 2 initial sessions".into()));

        let p2 = log.start_phase("Conflict Resolution", "Resolving conflicts");
        log.log_constraint(
            &Violation::warning(ConstraintKind::UnplacedStep, "no slot"),
            "Skipped step",
            "left unscheduled",
        );
        log.log_conflict_resolution("Room", "overlap", "Moved to alternative slot", &[]);
        log.log_preemption(
            &session("c").with_priority(PriorityToken::new(PriorityLevel::Emergency, "")),
            &session("d"),
            "Priority EMERGENCY",
            "awaiting confirmation",
            None,
        );
        log.log_optimization("Genetic Algorithm", 50.0, 75.0);
        log.log_manual("Operator override", BTreeMap::new());
        log.end_phase(p2, None);
        log
    }

    #[test]
    fn test_report_counts_match_calls() {
        let log = populated();
        let report = log.generate_report();
        assert_eq!(report.summary.total_phases, 2);
        assert_eq!(report.summary.total_decisions, 7);
        assert_eq!(report.summary.constraints_resolved, 1);
        assert_eq!(report.summary.conflicts_handled, 1);
        assert_eq!(report.summary.preemptions, 1);
        assert_eq!(report.summary.optimizations, 1);
        assert_eq!(report.timeline.len(), 7);
        assert_eq!(report.phases[0].decision_count, 2);
        assert_eq!(report.phases[1].decision_count, 5);
        assert_eq!(
            report.phases[0].summary.as_deref(),
            Some("Created 2 initial sessions")
        );
        assert!(report.phases.iter().all(|p| p.duration_ms.is_some()));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut log = populated();
        log.clear();
        let report = log.generate_report();
        assert_eq!(report.summary.total_decisions, 0);
        assert_eq!(report.summary.total_phases, 0);
        assert!(report.timeline.is_empty());
        assert_eq!(log.metrics(), LogMetrics::default());

        log.log_manual("again", BTreeMap::new());
        assert_eq!(log.entries()[0].id, "exp_1");
    }

    #[test]
    fn test_entry_details() {
        let mut log = ExplainabilityLog::new();
        let entry = log.log_placement(&session("a"), "first fit");
        assert_eq!(entry.summary, "Placed \"oleation\" at 2026-01-05 09:00 - 11:00");
        assert_eq!(entry.detail_str("reason"), Some("first fit"));
        assert_eq!(entry.details["factors"][3]["value"], "NORMAL");

        let entry = log.log_optimization("PSO", 80.0, 90.0);
        assert_eq!(entry.detail_str("improvement"), Some("10.00"));
        assert_eq!(entry.detail_str("improvement_percent"), Some("12.5%"));
        assert_eq!(entry.summary, "PSO improved fitness from 80.0 to 90.0");
    }

    #[test]
    fn test_conflict_summary_follows_outcome() {
        let mut log = ExplainabilityLog::new();
        log.log_conflict_resolution("Therapist", "overlap", "Left unresolved", &[]);
        log.log_conflict_resolution(
            "Room",
            "overlap",
            "Preemption requested (requires confirmation)",
            &[],
        );
        let summaries: Vec<&str> = log.entries().iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec![
                "Therapist conflict: Left unresolved",
                "Room conflict: Preemption requested (requires confirmation)",
            ]
        );
        assert!(summaries.iter().all(|s| !s.contains("Resolved")));
    }

    #[test]
    fn test_queries() {
        let log = populated();
        assert_eq!(log.entries_by_type(EntryType::Placement).len(), 2);
        assert_eq!(log.entries_by_type(EntryType::Manual).len(), 1);
        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].entry_type, EntryType::Manual);
        assert_eq!(log.recent(100).len(), 7);
    }

    #[test]
    fn test_entries_outside_phases_are_unattributed() {
        let mut log = ExplainabilityLog::new();
        let p = log.start_phase("A", "");
        log.end_phase(p, None);
        log.log_manual("late", BTreeMap::new());
        assert!(log.phases()[0].entry_ids.is_empty());
        // closing twice keeps the first duration
        let first = log.phases()[0].ended_at;
        log.end_phase(p, Some("again".into()));
        assert_eq!(log.phases()[0].ended_at, first);
        assert_eq!(log.phases()[0].summary, None);
    }
}
