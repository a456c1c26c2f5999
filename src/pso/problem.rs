//! Swarm objective over per-session slot indices.
//!
//! # Fitness
//!
//! Starting from 100:
//! - −20 per pair of sessions sharing a room at overlapping times
//! - −15 per pair sharing a therapist at overlapping times
//! - −25 per (session, existing session) pair sharing a room or therapist
//!   at overlapping times
//! - +10 × fraction of consecutive dimensions that are non-decreasing
//! - +5 × compactness, `1 − (span − ideal)/span` with `ideal = n − 1`
//! - +3 × utilization, `sessions / (distinct rooms × 2)`
//!
//! Clamped to `[0, 100]`.

use std::collections::BTreeSet;

use crate::context::SchedulingContext;
use crate::models::{Interval, Session, slot_index_at};

const ROOM_OVERLAP_PENALTY: f64 = 20.0;
const THERAPIST_OVERLAP_PENALTY: f64 = 15.0;
const EXISTING_OVERLAP_PENALTY: f64 = 25.0;
const SEQUENCE_WEIGHT: f64 = 10.0;
const COMPACTNESS_WEIGHT: f64 = 5.0;
const UTILIZATION_WEIGHT: f64 = 3.0;

/// Sessions to refine, plus the context they are scored against.
#[derive(Debug, Clone)]
pub struct SwarmProblem<'a> {
    ctx: &'a SchedulingContext,
    sessions: Vec<Session>,
}

impl<'a> SwarmProblem<'a> {
    pub fn new(ctx: &'a SchedulingContext, sessions: Vec<Session>) -> Self {
        Self { ctx, sessions }
    }

    /// One dimension per session.
    pub fn dimensions(&self) -> usize {
        self.sessions.len()
    }

    /// Largest valid slot index; 0 on an empty grid.
    pub fn max_slot(&self) -> usize {
        self.ctx.num_slots().saturating_sub(1)
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Current slot of every session.
    ///
    /// Uses the recorded slot index, falling back to a lookup by start
    /// time, then to slot 0.
    pub fn base_position(&self) -> Vec<usize> {
        self.sessions
            .iter()
            .map(|s| {
                s.slot_index
                    .or_else(|| slot_index_at(&self.ctx.time_slots, s.start))
                    .unwrap_or(0)
                    .min(self.max_slot())
            })
            .collect()
    }

    fn interval_at(&self, index: usize, position: &[usize]) -> Option<Interval> {
        let slot = position.get(index)?;
        self.ctx.time_slots.get(*slot).map(|s| s.interval())
    }

    /// Scores a position vector.
    pub fn evaluate(&self, position: &[usize]) -> f64 {
        let intervals: Vec<Option<Interval>> = (0..self.sessions.len())
            .map(|i| self.interval_at(i, position))
            .collect();

        let mut room_pairs = 0usize;
        let mut therapist_pairs = 0usize;
        for i in 0..self.sessions.len() {
            for j in (i + 1)..self.sessions.len() {
                let (Some(a), Some(b)) = (&intervals[i], &intervals[j]) else {
                    continue;
                };
                if !a.overlaps(b) {
                    continue;
                }
                if self.sessions[i].room_id == self.sessions[j].room_id {
                    room_pairs += 1;
                }
                if self.sessions[i].therapist_id == self.sessions[j].therapist_id {
                    therapist_pairs += 1;
                }
            }
        }

        let existing_pairs = self
            .sessions
            .iter()
            .zip(&intervals)
            .filter_map(|(s, iv)| iv.as_ref().map(|iv| (s, iv)))
            .map(|(s, iv)| {
                self.ctx
                    .existing_sessions
                    .iter()
                    .filter(|e| e.shares_resource(s) && e.interval().overlaps(iv))
                    .count()
            })
            .sum::<usize>();

        let fitness = 100.0
            - room_pairs as f64 * ROOM_OVERLAP_PENALTY
            - therapist_pairs as f64 * THERAPIST_OVERLAP_PENALTY
            - existing_pairs as f64 * EXISTING_OVERLAP_PENALTY
            + sequence_score(position) * SEQUENCE_WEIGHT
            + compactness(position) * COMPACTNESS_WEIGHT
            + self.utilization() * UTILIZATION_WEIGHT;
        fitness.clamp(0.0, 100.0)
    }

    fn utilization(&self) -> f64 {
        let rooms: BTreeSet<&str> = self.sessions.iter().map(|s| s.room_id.as_str()).collect();
        if rooms.is_empty() {
            return 0.0;
        }
        self.sessions.len() as f64 / (rooms.len() * 2) as f64
    }

    /// Sessions moved to the slots of `position`.
    pub fn apply(&self, position: &[usize]) -> Vec<Session> {
        self.sessions
            .iter()
            .zip(position)
            .map(|(session, &index)| match self.ctx.time_slots.get(index) {
                Some(slot) => {
                    let mut moved = session.clone();
                    moved.start = slot.start;
                    moved.end = slot.end;
                    moved.slot_index = Some(index);
                    moved
                }
                None => session.clone(),
            })
            .collect()
    }
}

/// Fraction of consecutive pairs in non-decreasing order.
fn sequence_score(position: &[usize]) -> f64 {
    if position.len() < 2 {
        return 0.0;
    }
    let ordered = position.windows(2).filter(|w| w[1] >= w[0]).count();
    ordered as f64 / (position.len() - 1) as f64
}

/// 1 when the sessions sit in consecutive slots, falling toward 0 as the
/// span grows.
fn compactness(position: &[usize]) -> f64 {
    let (Some(lo), Some(hi)) = (position.iter().min(), position.iter().max()) else {
        return 1.0;
    };
    let span = (hi - lo) as f64;
    if position.len() < 2 || span == 0.0 {
        return 1.0;
    }
    let ideal = (position.len() - 1) as f64;
    (1.0 - (span - ideal) / span).max(0.0)
}
