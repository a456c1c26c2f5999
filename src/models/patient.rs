//! Patient model.

use serde::{Deserialize, Serialize};

use super::Timestamp;

/// A patient to be scheduled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Unique patient identifier.
    pub id: String,
    /// Age in years, when known.
    #[serde(default)]
    pub age: Option<u32>,
    /// Medical conditions (free text).
    #[serde(default)]
    pub conditions: Vec<String>,
    /// Windows the patient can attend. Empty = always available.
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
}

/// A closed availability window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl AvailabilityWindow {
    /// Creates a window.
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Whether `at` falls inside the window (both ends inclusive).
    #[inline]
    pub fn contains(&self, at: Timestamp) -> bool {
        at >= self.start && at <= self.end
    }
}

impl Patient {
    /// Creates a patient with no conditions and open availability.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the age.
    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    /// Adds a medical condition.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Adds an availability window.
    pub fn with_availability(mut self, start: Timestamp, end: Timestamp) -> Self {
        self.availability.push(AvailabilityWindow::new(start, end));
        self
    }

    /// Whether the patient can attend at `at`.
    pub fn is_available_at(&self, at: Timestamp) -> bool {
        self.availability.is_empty() || self.availability.iter().any(|w| w.contains(at))
    }
}
