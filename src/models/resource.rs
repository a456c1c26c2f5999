//! Resource models: therapists, rooms, and consumable inventory.
//!
//! Therapists and rooms are the disjunctive resources a session occupies.
//! Inventory items are consumables checked for sufficiency, not booked.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

/// A therapist who can deliver sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Therapist {
    /// Unique therapist identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Trained therapies (free text, matched case-insensitively).
    #[serde(default)]
    pub skills: Vec<String>,
    /// Weekdays the therapist works.
    #[serde(default)]
    pub shifts: Vec<Weekday>,
}

/// A treatment room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Stock status reported by the inventory system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryStatus {
    #[default]
    Optimal,
    Low,
}

/// A consumable material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Material name.
    pub name: String,
    /// Units in stock.
    pub stock: f64,
    #[serde(default)]
    pub status: InventoryStatus,
}

/// Everything a run may allocate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    #[serde(default)]
    pub therapists: Vec<Therapist>,
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub inventory: Vec<InventoryItem>,
}

/// Case-insensitive, bidirectional substring match between a skill and a
/// therapy/session type. Empty strings never match.
pub fn skill_matches(skill: &str, subject: &str) -> bool {
    if skill.is_empty() || subject.is_empty() {
        return false;
    }
    let skill = skill.to_lowercase();
    let subject = subject.to_lowercase();
    skill.contains(&subject) || subject.contains(&skill)
}

impl Therapist {
    /// Creates a therapist with no skills and no shifts.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a skill.
    pub fn with_skill(mut self, skill: impl Into<String>) -> Self {
        self.skills.push(skill.into());
        self
    }

    /// Sets the working weekdays.
    pub fn with_shifts(mut self, shifts: impl IntoIterator<Item = Weekday>) -> Self {
        self.shifts = shifts.into_iter().collect();
        self
    }

    /// Works Monday through Saturday.
    pub fn full_week(self) -> Self {
        self.with_shifts([
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
        ])
    }

    /// Whether the therapist holds a skill matching `subject`.
    pub fn is_skilled_for(&self, subject: &str) -> bool {
        self.skills.iter().any(|s| skill_matches(s, subject))
    }

    /// Whether the therapist works on `day`.
    pub fn works_on(&self, day: Weekday) -> bool {
        self.shifts.contains(&day)
    }

    /// Name for messages; falls back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

impl Room {
    /// Creates a room.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
        }
    }

    /// Sets the room name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl InventoryItem {
    /// Creates an item in `Optimal` status.
    pub fn new(name: impl Into<String>, stock: f64) -> Self {
        Self {
            name: name.into(),
            stock,
            status: InventoryStatus::Optimal,
        }
    }

    /// Marks the item as running low.
    pub fn low(mut self) -> Self {
        self.status = InventoryStatus::Low;
        self
    }
}

impl ResourcePool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a therapist.
    pub fn with_therapist(mut self, therapist: Therapist) -> Self {
        self.therapists.push(therapist);
        self
    }

    /// Adds a room.
    pub fn with_room(mut self, room: Room) -> Self {
        self.rooms.push(room);
        self
    }

    /// Adds an inventory item.
    pub fn with_item(mut self, item: InventoryItem) -> Self {
        self.inventory.push(item);
        self
    }

    /// Looks up a therapist by id.
    pub fn therapist(&self, id: &str) -> Option<&Therapist> {
        self.therapists.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_matching_is_bidirectional() {
        assert!(skill_matches("Vamana", "vamana"));
        assert!(skill_matches("Vamana therapy", "Vamana"));
        assert!(skill_matches("Abhyanga", "Abhyanga & Swedana"));
        assert!(!skill_matches("Nasya", "Vamana"));
        assert!(!skill_matches("", "Vamana"));
        assert!(!skill_matches("Vamana", ""));
    }

    #[test]
    fn test_therapist_builder() {
        let t = Therapist::new("emp1")
            .with_name("Dr. Rao")
            .with_skill("Vamana")
            .full_week();
        assert!(t.is_skilled_for("vamana"));
        assert!(t.works_on(Weekday::Sat));
        assert!(!t.works_on(Weekday::Sun));
        assert_eq!(t.display_name(), "Dr. Rao");
        assert_eq!(Therapist::new("emp2").display_name(), "emp2");
    }

    #[test]
    fn test_pool_lookup() {
        let pool = ResourcePool::new()
            .with_therapist(Therapist::new("emp1"))
            .with_room(Room::new("room1").with_name("Steam Room"))
            .with_item(InventoryItem::new("Sesame Oil", 2.0).low());
        assert!(pool.therapist("emp1").is_some());
        assert!(pool.therapist("emp9").is_none());
        assert_eq!(pool.inventory[0].status, InventoryStatus::Low);
    }

    #[test]
    fn test_shift_and_status_serde() {
        let t: Therapist =
            serde_json::from_str(r#"{"id":"e1","skills":["Nasya"],"shifts":["Mon","Tue"]}"#)
                .unwrap();
        assert!(t.works_on(Weekday::Tue));

        let item: InventoryItem =
            serde_json::from_str(r#"{"name":"Steam Towels","stock":4,"status":"low"}"#).unwrap();
        assert_eq!(item.status, InventoryStatus::Low);
    }
}
