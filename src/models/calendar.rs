//! Time intervals and the bookable slot grid.
//!
//! # Time Model
//! All instants are [`Timestamp`]s: `chrono::DateTime<FixedOffset>` in the
//! clinic's offset, so weekday checks see the clinic's local calendar day.
//! Intervals are half-open: `[start, end)`.
//!
//! # Slot Grid
//! Slots are generated fresh for every run over a horizon of days:
//! - Sundays are skipped.
//! - Slots start at `working_hours_start` and step by the slot duration.
//! - A slot is emitted only if it ends at or before `working_hours_end`.

use chrono::{DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

/// Timezone-aware instant used for every session and slot boundary.
pub type Timestamp = DateTime<FixedOffset>;

/// A time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    /// Interval start (inclusive).
    pub start: Timestamp,
    /// Interval end (exclusive).
    pub end: Timestamp,
}

impl Interval {
    /// Creates a new interval.
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Length of the interval.
    #[inline]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether an instant falls within this interval.
    #[inline]
    pub fn contains(&self, at: Timestamp) -> bool {
        at >= self.start && at < self.end
    }

    /// Whether two intervals overlap. Touching intervals do not.
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A discrete bookable interval on the slot grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// `slot_{day}_{hour}`.
    pub id: String,
    /// Slot start.
    pub start: Timestamp,
    /// Slot end.
    pub end: Timestamp,
    /// Day offset from the grid's start date.
    pub day_index: u32,
    /// Local hour the slot starts at.
    pub hour_index: u32,
}

impl TimeSlot {
    /// The slot as an interval.
    #[inline]
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }
}

/// Parameters of the slot grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotGridConfig {
    /// First day of the horizon.
    pub start_date: NaiveDate,
    /// Clinic offset used to build local slot times.
    pub offset: FixedOffset,
    /// Number of calendar days covered (Sundays included in the count).
    pub horizon_days: u32,
    /// First working hour (local).
    pub working_hours_start: u32,
    /// Working hours end (local, exclusive).
    pub working_hours_end: u32,
    /// Slot length in hours.
    pub slot_duration_hours: u32,
}

/// Generates the slot grid for a run.
///
/// Pure function of its input; returns slots in chronological order.
pub fn generate_time_slots(grid: &SlotGridConfig) -> Vec<TimeSlot> {
    let mut slots = Vec::new();
    if grid.slot_duration_hours == 0 {
        return slots;
    }

    for day in 0..grid.horizon_days {
        let Some(date) = grid.start_date.checked_add_days(Days::new(u64::from(day))) else {
            break;
        };
        if date.weekday() == Weekday::Sun {
            continue;
        }

        let mut hour = grid.working_hours_start;
        while hour + grid.slot_duration_hours <= grid.working_hours_end {
            let local = date.and_hms_opt(hour, 0, 0);
            let start = local.and_then(|naive| grid.offset.from_local_datetime(&naive).single());
            if let Some(start) = start {
                slots.push(TimeSlot {
                    id: format!("slot_{day}_{hour}"),
                    start,
                    end: start + Duration::hours(i64::from(grid.slot_duration_hours)),
                    day_index: day,
                    hour_index: hour,
                });
            }
            hour += grid.slot_duration_hours;
        }
    }

    slots
}

/// Index of the slot starting exactly at `start`, if any.
pub fn slot_index_at(slots: &[TimeSlot], start: Timestamp) -> Option<usize> {
    slots.iter().position(|s| s.start == start)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_interval_overlap() {
        let a = Interval::new(at(0, 9), at(0, 11));
        let b = Interval::new(at(0, 10), at(0, 12));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));

        let c = Interval::new(at(0, 11), at(0, 13)); // touching
        assert!(!a.overlaps(&c));
        assert!(a.contains(at(0, 9)));
        assert!(!a.contains(at(0, 11)));
        assert_eq!(a.duration(), Duration::hours(2));
    }

    #[test]
    fn test_slots_per_day_bounded_by_working_hours() {
        let slots = generate_time_slots(&grid(1));
        // 9-11, 11-13, 13-15, 15-17; 17-19 would exceed 18:00
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0].id, "slot_0_9");
        assert_eq!(slots[0].start, at(0, 9));
        assert_eq!(slots[3].end, at(0, 17));
    }

    #[test]
    fn test_sundays_skipped() {
        // Mon..Sun covers 7 days, Sunday is day 6
        let slots = generate_time_slots(&grid(7));
        assert_eq!(slots.len(), 6 * 4);
        assert!(slots.iter().all(|s| s.day_index != 6));
        assert!(slots.iter().all(|s| s.start.weekday() != Weekday::Sun));
    }

    #[test]
    fn test_slots_chronological() {
        let slots = generate_time_slots(&grid(14));
        assert!(slots.windows(2).all(|w| w[0].start < w[1].start));
    }

    #[test]
    fn test_offset_applies_to_local_hours() {
        let mut g = grid(1);
        g.offset = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let slots = generate_time_slots(&g);
        assert_eq!(slots[0].start.format("%H:%M").to_string(), "09:00");
        assert_eq!(slots[0].start.offset().local_minus_utc(), 5 * 3600 + 1800);
    }

    #[test]
    fn test_zero_duration_yields_nothing() {
        let mut g = grid(3);
        g.slot_duration_hours = 0;
        assert!(generate_time_slots(&g).is_empty());
    }

    #[test]
    fn test_slot_index_at() {
        let slots = generate_time_slots(&grid(2));
        assert_eq!(slot_index_at(&slots, at(0, 11)), Some(1));
        assert_eq!(slot_index_at(&slots, at(0, 10)), None);
    }
}
