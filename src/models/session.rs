//! Session model.
//!
//! A session is one booked workflow step: a therapist and a room held
//! over a half-open interval for one patient.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Interval, Timestamp};
use crate::priority::PriorityToken;

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
}

/// A scheduled therapy session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier. Placeholder ids are replaced at finalization.
    pub id: String,
    /// Display title, `"{therapy} - {action}"`.
    #[serde(default)]
    pub title: String,
    /// Therapy name; matched against therapist skills.
    pub session_type: String,
    /// Workflow action this session delivers.
    #[serde(default)]
    pub action: String,
    pub therapist_id: String,
    pub room_id: String,
    pub patient_id: String,
    pub start: Timestamp,
    pub end: Timestamp,
    #[serde(default)]
    pub status: SessionStatus,
    /// Priority of the request that produced this session.
    #[serde(default)]
    pub priority: Option<PriorityToken>,
    /// 1-based workflow step number.
    #[serde(default)]
    pub step_number: u32,
    /// Index into the run's slot grid; `None` for sessions not on the grid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_index: Option<usize>,
    /// Set when the schedule is finalized.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a scheduled session with no priority and no slot index.
    pub fn new(
        id: impl Into<String>,
        session_type: impl Into<String>,
        therapist_id: impl Into<String>,
        room_id: impl Into<String>,
        patient_id: impl Into<String>,
        start: Timestamp,
        end: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            session_type: session_type.into(),
            action: String::new(),
            therapist_id: therapist_id.into(),
            room_id: room_id.into(),
            patient_id: patient_id.into(),
            start,
            end,
            status: SessionStatus::Scheduled,
            priority: None,
            step_number: 0,
            slot_index: None,
            created_at: None,
        }
    }

    /// Sets the workflow action and derives the title.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self.title = format!("{} - {}", self.session_type, self.action);
        self
    }

    /// Sets the workflow step number.
    pub fn with_step(mut self, step_number: u32) -> Self {
        self.step_number = step_number;
        self
    }

    /// Attaches a priority token.
    pub fn with_priority(mut self, token: PriorityToken) -> Self {
        self.priority = Some(token);
        self
    }

    /// Records the grid slot index.
    pub fn with_slot_index(mut self, index: usize) -> Self {
        self.slot_index = Some(index);
        self
    }

    /// The session's occupied interval.
    #[inline]
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }

    /// Whether both sessions hold the same therapist or room.
    pub fn shares_resource(&self, other: &Session) -> bool {
        self.therapist_id == other.therapist_id || self.room_id == other.room_id
    }

    /// Whether the two sessions double-book a therapist or a room.
    pub fn conflicts_with(&self, other: &Session) -> bool {
        self.shares_resource(other) && self.interval().overlaps(&other.interval())
    }

    /// Numeric priority; sessions without a token rank as NORMAL.
    pub fn priority_value(&self) -> u32 {
        self.priority
            .as_ref()
            .map(PriorityToken::value)
            .unwrap_or(crate::priority::PriorityLevel::Normal.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::calendar::test_support::at;
    use crate::priority::{PriorityLevel, PriorityToken};

    fn session(id: &str, therapist: &str, room: &str, day: u64, hour: u32) -> Session {
        Session::new(id, "Vamana", therapist, room, "p1", at(day, hour), at(day, hour + 2))
    }

    #[test]
    fn test_title_from_action() {
        let s = session("s1", "t1", "r1", 0, 9).with_action("Snehapana").with_step(1);
        assert_eq!(s.title, "Vamana - Snehapana");
        assert_eq!(s.step_number, 1);
        assert_eq!(s.status, SessionStatus::Scheduled);
    }

    #[test]
    fn test_conflicts_need_shared_resource_and_overlap() {
        let a = session("a", "t1", "r1", 0, 9);
        let same_room = session("b", "t2", "r1", 0, 10);
        let other_resources = session("c", "t2", "r2", 0, 9);
        let same_therapist_later = session("d", "t1", "r2", 0, 11);

        assert!(a.conflicts_with(&same_room));
        assert!(!a.conflicts_with(&other_resources));
        assert!(!a.conflicts_with(&same_therapist_later));
    }

    #[test]
    fn test_priority_value_defaults_to_normal() {
        let s = session("a", "t1", "r1", 0, 9);
        assert_eq!(s.priority_value(), 40);
        let s = s.with_priority(PriorityToken::new(PriorityLevel::Emergency, "acute"));
        assert_eq!(s.priority_value(), 100);
    }

    #[test]
    fn test_status_serde_kebab_case() {
        let json = serde_json::to_string(&SessionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
    }
}
