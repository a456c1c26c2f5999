//! Preemption evaluation and relocation of displaced sessions.
//!
//! # Rules
//! - An EMERGENCY request always preempts a non-EMERGENCY session.
//! - Otherwise the new value must exceed the existing value by more than
//!   [`PREEMPTION_BUFFER`].
//! - An expired token preempts nothing.
//!
//! Displaced sessions are relocated into the earliest candidate slot that
//! is long enough and does not overlap any preempting session. Failed
//! relocations are reported, never retried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{PriorityLevel, PriorityToken};
use crate::models::{Interval, Session, TimeSlot};

/// Margin a non-emergency request must clear to displace a session.
pub const PREEMPTION_BUFFER: u32 = 10;

/// Verdict of a single preemption check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreemptionDecision {
    pub can_preempt: bool,
    pub reason: String,
}

/// An existing session that may be displaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreemptionCandidate {
    pub session: Session,
    pub reason: String,
    /// New priority value minus the session's.
    pub priority_diff: i64,
}

/// A displaced session and where it moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rescheduled {
    pub session: Session,
    pub original: Interval,
    pub new_slot: Interval,
    pub reason: String,
}

/// A displaced session with nowhere to go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRelocation {
    pub session: Session,
    pub reason: String,
}

/// Result of [`PreemptionManager::execute_preemption`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreemptionOutcome {
    /// Every displaced session, relocated or not.
    pub preempted: Vec<Session>,
    pub rescheduled: Vec<Rescheduled>,
    pub failed: Vec<FailedRelocation>,
}

/// Audit record of one successful relocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreemptionRecord {
    /// `preempt_{n}`, sequential per manager.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub preempted_session_id: String,
    pub preempting_session_id: Option<String>,
    pub reason: String,
    pub new_slot: Interval,
}

/// Decides and executes preemptions, keeping a history.
#[derive(Debug, Clone, Default)]
pub struct PreemptionManager {
    history: Vec<PreemptionRecord>,
}

fn token_of(session: &Session) -> PriorityToken {
    session.priority.clone().unwrap_or_default()
}

impl PreemptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `incoming` may displace `existing`, as of `now`.
    pub fn evaluate(
        incoming: &PriorityToken,
        existing: &PriorityToken,
        now: DateTime<Utc>,
    ) -> PreemptionDecision {
        if incoming.is_expired_at(now) {
            return PreemptionDecision {
                can_preempt: false,
                reason: "Cannot preempt: priority token expired".into(),
            };
        }
        if incoming.level == PriorityLevel::Emergency && existing.level != PriorityLevel::Emergency
        {
            return PreemptionDecision {
                can_preempt: true,
                reason: "Emergency session takes precedence".into(),
            };
        }
        if incoming.value() > existing.value() + PREEMPTION_BUFFER {
            return PreemptionDecision {
                can_preempt: true,
                reason: format!(
                    "{} priority ({}) exceeds {} ({})",
                    incoming.level,
                    incoming.value(),
                    existing.level,
                    existing.value()
                ),
            };
        }
        PreemptionDecision {
            can_preempt: false,
            reason: "Cannot preempt: insufficient priority difference".into(),
        }
    }

    /// Whether `new_session` may displace `existing`. Sessions without a
    /// token rank as NORMAL.
    pub fn can_preempt(&self, new_session: &Session, existing: &Session) -> PreemptionDecision {
        Self::evaluate(&token_of(new_session), &token_of(existing), Utc::now())
    }

    /// Up to `required` displaceable sessions, largest priority gap first.
    pub fn find_preemptable_sessions(
        &self,
        new_session: &Session,
        existing: &[Session],
        required: usize,
    ) -> Vec<PreemptionCandidate> {
        let incoming = i64::from(new_session.priority_value());
        let mut candidates: Vec<PreemptionCandidate> = existing
            .iter()
            .filter_map(|s| {
                let decision = self.can_preempt(new_session, s);
                decision.can_preempt.then(|| PreemptionCandidate {
                    session: s.clone(),
                    reason: decision.reason,
                    priority_diff: incoming - i64::from(s.priority_value()),
                })
            })
            .collect();

        // Stable: equal gaps keep input order.
        candidates.sort_by(|a, b| b.priority_diff.cmp(&a.priority_diff));
        candidates.truncate(required);
        candidates
    }

    /// Relocates each candidate into the earliest usable slot.
    ///
    /// Successful relocations are appended to the history.
    pub fn execute_preemption(
        &mut self,
        preempting: &[Session],
        candidates: Vec<PreemptionCandidate>,
        slots: &[TimeSlot],
    ) -> PreemptionOutcome {
        let mut outcome = PreemptionOutcome::default();

        for candidate in candidates {
            match Self::find_alternative_slot(&candidate.session, slots, preempting) {
                Some(new_slot) => {
                    let record = PreemptionRecord {
                        id: format!("preempt_{}", self.history.len() + 1),
                        timestamp: Utc::now(),
                        preempted_session_id: candidate.session.id.clone(),
                        preempting_session_id: preempting.first().map(|s| s.id.clone()),
                        reason: candidate.reason.clone(),
                        new_slot,
                    };
                    debug!(
                        preempted = %record.preempted_session_id,
                        start = %new_slot.start,
                        "relocated preempted session"
                    );
                    self.history.push(record);
                    outcome.rescheduled.push(Rescheduled {
                        session: candidate.session.clone(),
                        original: candidate.session.interval(),
                        new_slot,
                        reason: candidate.reason,
                    });
                }
                None => outcome.failed.push(FailedRelocation {
                    session: candidate.session.clone(),
                    reason: "No alternative slot available".into(),
                }),
            }
            outcome.preempted.push(candidate.session);
        }

        outcome
    }

    /// Earliest slot at least as long as `session` that overlaps none of
    /// `exclude`. The returned interval keeps the session's own duration.
    pub fn find_alternative_slot(
        session: &Session,
        slots: &[TimeSlot],
        exclude: &[Session],
    ) -> Option<Interval> {
        let duration = session.interval().duration();
        slots
            .iter()
            .filter(|slot| slot.interval().duration() >= duration)
            .find(|slot| {
                let interval = slot.interval();
                !exclude.iter().any(|e| e.interval().overlaps(&interval))
            })
            .map(|slot| Interval::new(slot.start, slot.start + duration))
    }

    /// Successful relocations, oldest first.
    pub fn history(&self) -> &[PreemptionRecord] {
        &self.history
    }
}

/// One narrated step of [`apply_priority_heuristics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicStep {
    pub step: String,
    pub detail: String,
}

impl HeuristicStep {
    fn new(step: &str, detail: impl Into<String>) -> Self {
        Self {
            step: step.to_string(),
            detail: detail.into(),
        }
    }
}

/// Result of inserting a prioritized request into a schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeuristicOutcome {
    pub success: bool,
    /// The updated schedule (unchanged on rejection).
    pub schedule: Vec<Session>,
    pub preempted: Vec<Session>,
    pub rescheduled: Vec<Rescheduled>,
    pub failed: Vec<FailedRelocation>,
    pub explanations: Vec<HeuristicStep>,
    pub error: Option<String>,
}

/// Inserts `request` into `sessions`, preempting if it must.
///
/// - No session shares a therapist or room with the request in an
///   overlapping interval: the request is appended.
/// - Every such session is displaceable: they are preempted and relocated
///   via [`PreemptionManager::execute_preemption`]; relocation failures are
///   reported and the displaced session is dropped from the schedule.
/// - Otherwise the request is rejected and `sessions` is returned as is.
pub fn apply_priority_heuristics(
    sessions: &[Session],
    mut request: Session,
    slots: &[TimeSlot],
) -> HeuristicOutcome {
    let mut manager = PreemptionManager::new();
    let token = token_of(&request);
    let mut explanations = vec![HeuristicStep::new(
        "Priority Assessment",
        format!(
            "New request has {} priority (value: {})",
            token.level,
            token.value()
        ),
    )];

    request.id = format!("session_{}", Uuid::new_v4());

    let overlapping: Vec<Session> = sessions
        .iter()
        .filter(|s| s.conflicts_with(&request))
        .cloned()
        .collect();

    if overlapping.is_empty() {
        explanations.push(HeuristicStep::new(
            "Slot Availability",
            "Requested time slot is available, no preemption needed",
        ));
        let mut schedule = sessions.to_vec();
        schedule.push(request);
        return HeuristicOutcome {
            success: true,
            schedule,
            explanations,
            ..HeuristicOutcome::default()
        };
    }

    let candidates = manager.find_preemptable_sessions(&request, &overlapping, overlapping.len());
    if candidates.len() < overlapping.len() {
        explanations.push(HeuristicStep::new(
            "Preemption Check",
            "Cannot preempt existing sessions - insufficient priority",
        ));
        return HeuristicOutcome {
            success: false,
            schedule: sessions.to_vec(),
            explanations,
            error: Some(
                "Cannot schedule: existing sessions have equal or higher priority".into(),
            ),
            ..HeuristicOutcome::default()
        };
    }

    explanations.push(HeuristicStep::new(
        "Preemption Execution",
        format!(
            "Preempting {} session(s) with lower priority",
            candidates.len()
        ),
    ));

    let outcome = manager.execute_preemption(std::slice::from_ref(&request), candidates, slots);

    let mut schedule: Vec<Session> = sessions
        .iter()
        .filter(|s| !outcome.preempted.iter().any(|p| p.id == s.id))
        .cloned()
        .collect();
    schedule.push(request);

    for moved in &outcome.rescheduled {
        let mut session = moved.session.clone();
        session.start = moved.new_slot.start;
        session.end = moved.new_slot.end;
        session.slot_index = None;
        explanations.push(HeuristicStep::new(
            "Rescheduling",
            format!(
                "Session \"{}\" moved to {}",
                session.title,
                session.start.format("%a, %b %-d %-I:%M %p")
            ),
        ));
        schedule.push(session);
    }
    for failed in &outcome.failed {
        explanations.push(HeuristicStep::new(
            "Rescheduling Failed",
            format!(
                "Could not reschedule \"{}\": {}",
                failed.session.title, failed.reason
            ),
        ));
    }

    HeuristicOutcome {
        success: true,
        schedule,
        preempted: outcome.preempted,
        rescheduled: outcome.rescheduled,
        failed: outcome.failed,
        explanations,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::calendar::test_support::{at, grid};
    use crate::models::generate_time_slots;
    use chrono::Duration;

    fn session(id: &str, room: &str, day: u64, hour: u32, level: PriorityLevel) -> Session {
        Session::new(id, "Vamana", format!("t-{id}"), room, "p1", at(day, hour), at(day, hour + 2))
            .with_action("Snehapana")
            .with_priority(PriorityToken::new(level, ""))
    }

    #[test]
    fn test_can_preempt_rules() {
        let m = PreemptionManager::new();
        let emergency = session("e", "r1", 0, 9, PriorityLevel::Emergency);
        let normal = session("n", "r1", 0, 9, PriorityLevel::Normal);
        let high = session("h", "r1", 0, 9, PriorityLevel::High);
        let urgent = session("u", "r1", 0, 9, PriorityLevel::Urgent);

        let d = m.can_preempt(&emergency, &normal);
        assert!(d.can_preempt);
        assert_eq!(d.reason, "Emergency session takes precedence");
        assert!(!m.can_preempt(&emergency, &emergency.clone()).can_preempt);

        // 60 vs 40 clears the buffer, 80 vs 60 clears it, 60 vs 60 does not
        assert!(m.can_preempt(&high, &normal).can_preempt);
        assert!(m.can_preempt(&urgent, &high).can_preempt);
        assert!(!m.can_preempt(&high, &high.clone()).can_preempt);

        // 50 would be needed to beat 40 + 10; a bare session ranks NORMAL
        let mut bare = normal.clone();
        bare.priority = None;
        assert!(!m.can_preempt(&bare, &normal).can_preempt);
    }

    #[test]
    fn test_expired_incoming_never_preempts() {
        let now = Utc::now();
        let stale = PriorityToken::new(PriorityLevel::Emergency, "")
            .with_expiry(now - Duration::seconds(1));
        let d = PreemptionManager::evaluate(&stale, &PriorityToken::default(), now);
        assert!(!d.can_preempt);
    }

    #[test]
    fn test_find_preemptable_orders_by_gap() {
        let m = PreemptionManager::new();
        let incoming = session("e", "r1", 0, 9, PriorityLevel::Emergency);
        let existing = vec![
            session("h", "r1", 0, 9, PriorityLevel::High),
            session("l", "r1", 0, 9, PriorityLevel::Low),
            session("e2", "r1", 0, 9, PriorityLevel::Emergency),
            session("n", "r1", 0, 9, PriorityLevel::Normal),
        ];
        let found = m.find_preemptable_sessions(&incoming, &existing, 2);
        let ids: Vec<&str> = found.iter().map(|c| c.session.id.as_str()).collect();
        assert_eq!(ids, vec!["l", "n"]);
        assert_eq!(found[0].priority_diff, 80);
    }

    #[test]
    fn test_alternative_slot_skips_excluded() {
        let slots = generate_time_slots(&grid(1));
        let displaced = session("n", "r1", 0, 9, PriorityLevel::Normal);
        let blocker = session("e", "r1", 0, 9, PriorityLevel::Emergency);
        let slot = PreemptionManager::find_alternative_slot(&displaced, &slots, &[blocker]);
        assert_eq!(slot, Some(Interval::new(at(0, 11), at(0, 13))));

        // Three-hour session fits no two-hour slot
        let mut long = displaced.clone();
        long.end = at(0, 12);
        assert!(PreemptionManager::find_alternative_slot(&long, &slots, &[]).is_none());
    }

    #[test]
    fn test_execute_preemption_records_history() {
        let mut m = PreemptionManager::new();
        let slots = generate_time_slots(&grid(1));
        let incoming = session("e", "r1", 0, 9, PriorityLevel::Emergency);
        let victims = m.find_preemptable_sessions(
            &incoming,
            &[session("n", "r1", 0, 9, PriorityLevel::Normal)],
            1,
        );
        let outcome = m.execute_preemption(&[incoming], victims, &slots);
        assert_eq!(outcome.preempted.len(), 1);
        assert_eq!(outcome.rescheduled.len(), 1);
        assert!(outcome.failed.is_empty());
        assert_eq!(m.history().len(), 1);
        assert_eq!(m.history()[0].id, "preempt_1");
        assert_eq!(m.history()[0].preempting_session_id.as_deref(), Some("e"));

        let outcome = m.execute_preemption(
            &[],
            vec![PreemptionCandidate {
                session: session("x", "r1", 0, 9, PriorityLevel::Low),
                reason: "test".into(),
                priority_diff: 0,
            }],
            &[],
        );
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(m.history().len(), 1);
    }

    #[test]
    fn test_heuristics_append_when_free() {
        let slots = generate_time_slots(&grid(1));
        let existing = vec![session("n", "r1", 0, 9, PriorityLevel::Normal)];
        let out = apply_priority_heuristics(
            &existing,
            session("new", "r2", 0, 9, PriorityLevel::Normal),
            &slots,
        );
        assert!(out.success);
        assert_eq!(out.schedule.len(), 2);
        assert!(out.schedule[1].id.starts_with("session_"));
        assert!(out.preempted.is_empty());
    }

    #[test]
    fn test_heuristics_preempt_and_relocate() {
        let slots = generate_time_slots(&grid(1));
        let existing = vec![session("n", "r1", 0, 9, PriorityLevel::Normal)];
        let out = apply_priority_heuristics(
            &existing,
            session("new", "r1", 0, 9, PriorityLevel::Emergency),
            &slots,
        );
        assert!(out.success);
        assert_eq!(out.preempted.len(), 1);
        assert_eq!(out.rescheduled.len(), 1);
        let moved = out.schedule.iter().find(|s| s.id == "n").unwrap();
        assert_eq!(moved.start, at(0, 11));
        assert!(out.explanations.iter().any(|e| e.step == "Rescheduling"));
    }

    #[test]
    fn test_heuristics_reject_equal_priority() {
        let existing = vec![session("n", "r1", 0, 9, PriorityLevel::Urgent)];
        let out = apply_priority_heuristics(
            &existing,
            session("new", "r1", 0, 9, PriorityLevel::Urgent),
            &[],
        );
        assert!(!out.success);
        assert_eq!(out.schedule, existing);
        assert!(out.error.is_some());
    }
}
