//! Conflict resolution against already-booked sessions.
//!
//! For every new session that shares a therapist or room with an existing
//! session at an overlapping time:
//!
//! 1. Scan the slot grid from the start for a slot where the session
//!    clashes with neither existing sessions nor the other new sessions
//!    on its therapist or room; move it there.
//! 2. Failing that, when the request is URGENT or higher and may preempt
//!    the existing session, propose a preemption. The proposal is never
//!    applied here; it waits for external confirmation.
//! 3. Otherwise the overlap stays in the schedule, flagged as unresolved.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{Interval, Session, TimeSlot};
use crate::priority::{PreemptionCandidate, PreemptionManager, PriorityLevel, PriorityToken};

/// Which shared resource caused the clash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Room,
    Therapist,
}

impl ConflictKind {
    pub fn label(self) -> &'static str {
        match self {
            ConflictKind::Room => "Room",
            ConflictKind::Therapist => "Therapist",
        }
    }
}

/// A preemption that needs confirmation before anything moves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPreemption {
    /// The new session that wants the slot.
    pub session: Session,
    /// The booked session it would displace.
    pub target: Session,
    pub reason: String,
    /// Where the displaced session could go, if anywhere.
    pub proposed_relocation: Option<Interval>,
}

/// What happened to one conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConflictOutcome {
    /// The new session moved to a free slot.
    Relocated {
        from: Interval,
        to: Interval,
        slot_index: usize,
    },
    /// Preemption proposed, awaiting confirmation.
    PreemptionRequested(PendingPreemption),
    /// Left in place; the overlap remains.
    Unresolved { reason: String },
}

impl ConflictOutcome {
    /// Action label recorded in the explanation log.
    pub fn action(&self) -> &'static str {
        match self {
            ConflictOutcome::Relocated { .. } => "Moved to alternative slot",
            ConflictOutcome::PreemptionRequested(_) => {
                "Preemption requested (requires confirmation)"
            }
            ConflictOutcome::Unresolved { .. } => "Left unresolved",
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ConflictOutcome::Relocated { .. })
    }
}

/// One detected conflict and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub kind: ConflictKind,
    pub session_id: String,
    pub existing_session_id: String,
    pub message: String,
    pub outcome: ConflictOutcome,
}

/// Detects and resolves conflicts between `sessions` and `existing`.
///
/// Returns the adjusted sessions (same order) and one record per conflict
/// handled. A session that gets relocated is not checked again against
/// the remaining existing sessions, since its new slot is clear of all
/// of them.
pub fn resolve_conflicts(
    sessions: Vec<Session>,
    existing: &[Session],
    slots: &[TimeSlot],
    priority: &PriorityToken,
) -> (Vec<Session>, Vec<ConflictResolution>) {
    let mut schedule = sessions;
    let mut resolutions = Vec::new();
    let manager = PreemptionManager::new();

    for i in 0..schedule.len() {
        let clashes: Vec<&Session> = existing
            .iter()
            .filter(|e| e.conflicts_with(&schedule[i]))
            .collect();

        for booked in clashes {
            let session = &schedule[i];
            let kind = if session.room_id == booked.room_id {
                ConflictKind::Room
            } else {
                ConflictKind::Therapist
            };
            let message = format!(
                "Conflict with existing session at {}",
                booked.start.format("%Y-%m-%d %H:%M")
            );
            debug!(session = %session.id, existing = %booked.id, ?kind, "conflict detected");

            let outcome = match find_free_slot(i, &schedule, existing, slots) {
                Some((slot_index, to)) => {
                    let from = schedule[i].interval();
                    let moved = &mut schedule[i];
                    moved.start = to.start;
                    moved.end = to.end;
                    moved.slot_index = Some(slot_index);
                    ConflictOutcome::Relocated {
                        from,
                        to,
                        slot_index,
                    }
                }
                None => {
                    propose_preemption(&manager, &schedule[i], booked, existing, slots, priority)
                }
            };

            if let ConflictOutcome::Unresolved { reason } = &outcome {
                warn!(
                    session = %schedule[i].id,
                    existing = %booked.id,
                    %reason,
                    "conflict left unresolved"
                );
            }
            let relocated = outcome.is_resolved();
            resolutions.push(ConflictResolution {
                kind,
                session_id: schedule[i].id.clone(),
                existing_session_id: booked.id.clone(),
                message,
                outcome,
            });
            if relocated {
                break;
            }
        }
    }

    (schedule, resolutions)
}

/// First slot where session `i` clashes with nothing on its therapist or
/// room.
fn find_free_slot(
    i: usize,
    schedule: &[Session],
    existing: &[Session],
    slots: &[TimeSlot],
) -> Option<(usize, Interval)> {
    let session = &schedule[i];
    let others = schedule
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(_, s)| s);

    let blocking: Vec<&Session> = existing
        .iter()
        .chain(others)
        .filter(|s| s.shares_resource(session))
        .collect();

    slots.iter().enumerate().find_map(|(index, slot)| {
        let interval = slot.interval();
        (!blocking.iter().any(|b| b.interval().overlaps(&interval))).then_some((index, interval))
    })
}

fn propose_preemption(
    manager: &PreemptionManager,
    session: &Session,
    booked: &Session,
    existing: &[Session],
    slots: &[TimeSlot],
    priority: &PriorityToken,
) -> ConflictOutcome {
    if priority.value() < PriorityLevel::Urgent.value() {
        return ConflictOutcome::Unresolved {
            reason: format!(
                "No alternative slot and {} priority cannot preempt",
                priority.level
            ),
        };
    }

    let incoming = match &session.priority {
        Some(_) => session.clone(),
        None => session.clone().with_priority(priority.clone()),
    };
    let decision = manager.can_preempt(&incoming, booked);
    if !decision.can_preempt {
        return ConflictOutcome::Unresolved {
            reason: decision.reason,
        };
    }

    // Dry run on a scratch manager: the displaced session must avoid the
    // incoming session and everything else booked on its resources.
    let mut blocked = vec![incoming.clone()];
    blocked.extend(
        existing
            .iter()
            .filter(|e| e.id != booked.id && e.shares_resource(booked))
            .cloned(),
    );
    let candidate = PreemptionCandidate {
        session: booked.clone(),
        reason: decision.reason.clone(),
        priority_diff: i64::from(incoming.priority_value()) - i64::from(booked.priority_value()),
    };
    let trial = PreemptionManager::new().execute_preemption(&blocked, vec![candidate], slots);

    ConflictOutcome::PreemptionRequested(PendingPreemption {
        session: incoming,
        target: booked.clone(),
        reason: decision.reason,
        proposed_relocation: trial.rescheduled.first().map(|r| r.new_slot),
    })
}
