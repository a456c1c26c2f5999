//! Rule-based initial placement.
//!
//! # Algorithm
//!
//! 1. Pick the first therapist skilled for the therapy (any therapist if
//!    none is) and the first room.
//! 2. Walk the slot grid once, in order. Each workflow step takes the
//!    next slot in which neither pick overlaps an existing session.
//! 3. Steps left over when the grid runs out become `UNPLACED_STEP`
//!    warnings.
//!
//! # Complexity
//! O(s × e) where s = slots, e = existing sessions.

use tracing::warn;

use crate::constraints::{ConstraintKind, Violation};
use crate::context::SchedulingContext;
use crate::models::{Session, TimeSlot};

/// Sessions placed by the greedy sweep plus the steps it could not fit.
#[derive(Debug, Clone, Default)]
pub struct InitialPlacement {
    pub sessions: Vec<Session>,
    /// One warning per skipped workflow step.
    pub unplaced: Vec<Violation>,
}

impl InitialPlacement {
    /// Whether every workflow step got a slot.
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }
}

/// Places each workflow step greedily on the slot grid.
///
/// [`HybridScheduler`](super::HybridScheduler) rejects empty pools before
/// this runs. A context built directly with no therapist or no room gets
/// every step back as unplaced.
pub fn create_initial_schedule(ctx: &SchedulingContext) -> InitialPlacement {
    let therapy = &ctx.therapy;
    let therapist = ctx
        .skilled_therapists()
        .first()
        .copied()
        .or_else(|| ctx.therapists.first());
    let room = ctx.rooms.first();

    let (Some(therapist), Some(room)) = (therapist, room) else {
        let unplaced = therapy
            .workflow
            .iter()
            .map(|step| unplaced_step(&step.id, &step.action, "no therapist or room available"))
            .collect();
        return InitialPlacement {
            sessions: Vec::new(),
            unplaced,
        };
    };

    let is_free = |slot: &TimeSlot| {
        let interval = slot.interval();
        !ctx.existing_sessions.iter().any(|e| {
            (e.therapist_id == therapist.id || e.room_id == room.id)
                && e.interval().overlaps(&interval)
        })
    };

    let mut placement = InitialPlacement::default();
    let mut free_slots = ctx
        .time_slots
        .iter()
        .enumerate()
        .filter(|&(_, slot)| is_free(slot));

    for step in &therapy.workflow {
        match free_slots.next() {
            Some((index, slot)) => placement.sessions.push(
                Session::new(
                    format!("init_{}", step.id),
                    &therapy.name,
                    &therapist.id,
                    &room.id,
                    &ctx.patient.id,
                    slot.start,
                    slot.end,
                )
                .with_action(&step.action)
                .with_step(step.step)
                .with_slot_index(index),
            ),
            None => {
                warn!(step = %step.id, action = %step.action, "no free slot for workflow step");
                placement.unplaced.push(unplaced_step(
                    &step.id,
                    &step.action,
                    "no free slot within the scheduling horizon",
                ));
            }
        }
    }

    placement
}

fn unplaced_step(step_id: &str, action: &str, why: &str) -> Violation {
    Violation::warning(
        ConstraintKind::UnplacedStep,
        format!("Step \"{action}\" was not scheduled: {why}"),
    )
    .with_subject(step_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::context;
    use crate::models::calendar::test_support::at;
    use crate::models::{Room, Therapist};

    #[test]
    fn test_places_steps_on_first_slots() {
        let ctx = context(2);
        let placement = create_initial_schedule(&ctx);
        assert!(placement.is_complete());
        assert_eq!(placement.sessions.len(), 2);
        assert_eq!(placement.sessions[0].slot_index, Some(0));
        assert_eq!(placement.sessions[1].slot_index, Some(1));
        assert_eq!(placement.sessions[1].start, ctx.time_slots[1].start);
        assert_eq!(placement.sessions[0].title, "Vamana - step1");
        assert_eq!(placement.sessions[0].id, "init_w1");
    }

    #[test]
    fn test_skips_slots_taken_by_existing_sessions() {
        let mut ctx = context(2);
        ctx.existing_sessions = vec![
            Session::new("x", "Nasya", "t9", "r1", "p2", at(0, 9), at(0, 11)),
            Session::new("y", "Nasya", "t1", "r9", "p3", at(0, 11), at(0, 13)),
            // different therapist and room: does not block
            Session::new("z", "Nasya", "t9", "r9", "p4", at(0, 13), at(0, 15)),
        ];
        let placement = create_initial_schedule(&ctx);
        assert_eq!(placement.sessions[0].slot_index, Some(2));
        assert_eq!(placement.sessions[1].slot_index, Some(3));
    }

    #[test]
    fn test_prefers_skilled_therapist() {
        let mut ctx = context(1);
        ctx.therapists.insert(0, Therapist::new("t0").with_skill("Nasya").full_week());
        ctx.rooms.push(Room::new("r2"));
        let placement = create_initial_schedule(&ctx);
        assert_eq!(placement.sessions[0].therapist_id, "t1");
        assert_eq!(placement.sessions[0].room_id, "r1");
    }

    #[test]
    fn test_reports_unplaced_steps() {
        let mut ctx = context(3);
        ctx.time_slots.truncate(2);
        let placement = create_initial_schedule(&ctx);
        assert_eq!(placement.sessions.len(), 2);
        assert_eq!(placement.unplaced.len(), 1);
        let v = &placement.unplaced[0];
        assert_eq!(v.kind, ConstraintKind::UnplacedStep);
        assert!(!v.is_critical());
        assert_eq!(v.subject.as_deref(), Some("w3"));
    }

    #[test]
    fn test_no_rooms_places_nothing() {
        let mut ctx = context(2);
        ctx.rooms.clear();
        let placement = create_initial_schedule(&ctx);
        assert!(placement.sessions.is_empty());
        assert_eq!(placement.unplaced.len(), 2);
    }
}
