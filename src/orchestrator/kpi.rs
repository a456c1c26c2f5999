//! Schedule quality metrics (KPIs).
//!
//! Computed over the finalized session list.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Span | Earliest start to latest end, in hours |
//! | Booked hours | Sum of session durations |
//! | Rooms / therapists used | Distinct ids |
//! | Room utilization | Booked hours in the room / span |
//! | Avg utilization | Mean of the room utilizations |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::Session;

/// Schedule performance indicators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleKpi {
    pub span_hours: f64,
    pub booked_hours: f64,
    pub rooms_used: usize,
    pub therapists_used: usize,
    /// Fraction of the span each room is booked (0.0..=1.0 without overlaps).
    pub utilization_by_room: BTreeMap<String, f64>,
    pub avg_utilization: f64,
}

impl ScheduleKpi {
    /// Computes KPIs from a session list. An empty list yields zeros.
    pub fn calculate(sessions: &[Session]) -> Self {
        let (Some(first), Some(last)) = (
            sessions.iter().map(|s| s.start).min(),
            sessions.iter().map(|s| s.end).max(),
        ) else {
            return Self::default();
        };

        let span_hours = hours(last - first);
        let mut booked_by_room: BTreeMap<String, f64> = BTreeMap::new();
        for s in sessions {
            *booked_by_room.entry(s.room_id.clone()).or_default() += hours(s.end - s.start);
        }
        let booked_hours: f64 = booked_by_room.values().sum();

        let utilization_by_room: BTreeMap<String, f64> = booked_by_room
            .into_iter()
            .map(|(room, booked)| {
                let u = if span_hours > 0.0 { booked / span_hours } else { 0.0 };
                (room, u)
            })
            .collect();
        let avg_utilization = if utilization_by_room.is_empty() {
            0.0
        } else {
            utilization_by_room.values().sum::<f64>() / utilization_by_room.len() as f64
        };

        let therapists: BTreeSet<&str> = sessions.iter().map(|s| s.therapist_id.as_str()).collect();

        Self {
            span_hours,
            booked_hours,
            rooms_used: utilization_by_room.len(),
            therapists_used: therapists.len(),
            utilization_by_room,
            avg_utilization,
        }
    }
}

fn hours(d: chrono::Duration) -> f64 {
    d.num_minutes() as f64 / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::calendar::test_support::at;

    fn session(therapist: &str, room: &str, day: u64, hour: u32) -> Session {
        Session::new("s", "Vamana", therapist, room, "p1", at(day, hour), at(day, hour + 2))
    }

    #[test]
    fn test_kpi_basic() {
        let sessions = vec![
            session("t1", "r1", 0, 9),
            session("t1", "r1", 0, 11),
            session("t2", "r2", 0, 13),
        ];
        let kpi = ScheduleKpi::calculate(&sessions);
        assert!((kpi.span_hours - 6.0).abs() < 1e-10);
        assert!((kpi.booked_hours - 6.0).abs() < 1e-10);
        assert_eq!(kpi.rooms_used, 2);
        assert_eq!(kpi.therapists_used, 2);
        // r1: 4/6, r2: 2/6
        assert!((kpi.utilization_by_room["r1"] - 4.0 / 6.0).abs() < 1e-10);
        assert!((kpi.avg_utilization - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_kpi_across_days() {
        let sessions = vec![session("t1", "r1", 0, 9), session("t1", "r1", 1, 9)];
        let kpi = ScheduleKpi::calculate(&sessions);
        assert!((kpi.span_hours - 26.0).abs() < 1e-10);
        assert!((kpi.utilization_by_room["r1"] - 4.0 / 26.0).abs() < 1e-10);
    }

    #[test]
    fn test_kpi_empty() {
        let kpi = ScheduleKpi::calculate(&[]);
        assert_eq!(kpi, ScheduleKpi::default());
    }
}
