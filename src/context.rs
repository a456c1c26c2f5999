//! Per-run scheduling context.

use std::collections::BTreeMap;

use crate::config::GapConstraints;
use crate::constraints::{MaterialRequirement, default_material_requirements};
use crate::models::{
    InventoryItem, Patient, ResourcePool, Room, Session, Therapist, TherapyProtocol, TimeSlot,
};

/// Immutable inputs shared by every fitness evaluation of a run.
///
/// Built once after eligibility passes and only ever read afterwards, so
/// worker threads borrow it without synchronization.
#[derive(Debug, Clone)]
pub struct SchedulingContext {
    /// The protocol being scheduled.
    pub therapy: TherapyProtocol,
    /// The patient being scheduled.
    pub patient: Patient,
    pub therapists: Vec<Therapist>,
    pub rooms: Vec<Room>,
    /// Slot grid, chronological.
    pub time_slots: Vec<TimeSlot>,
    /// Sessions already booked in the store.
    pub existing_sessions: Vec<Session>,
    pub inventory: Vec<InventoryItem>,
    /// Consumables per session type.
    pub material_requirements: BTreeMap<String, Vec<MaterialRequirement>>,
    /// Allowed spacing between consecutive sessions.
    pub gap: GapConstraints,
}

impl SchedulingContext {
    /// Creates a context with no existing sessions and default tables.
    pub fn new(
        therapy: TherapyProtocol,
        patient: Patient,
        pool: ResourcePool,
        time_slots: Vec<TimeSlot>,
    ) -> Self {
        Self {
            therapy,
            patient,
            therapists: pool.therapists,
            rooms: pool.rooms,
            time_slots,
            existing_sessions: Vec::new(),
            inventory: pool.inventory,
            material_requirements: default_material_requirements(),
            gap: GapConstraints::default(),
        }
    }

    /// Sets the already-booked sessions.
    pub fn with_existing_sessions(mut self, sessions: Vec<Session>) -> Self {
        self.existing_sessions = sessions;
        self
    }

    /// Replaces the material requirement table.
    pub fn with_material_requirements(
        mut self,
        requirements: BTreeMap<String, Vec<MaterialRequirement>>,
    ) -> Self {
        self.material_requirements = requirements;
        self
    }

    /// Sets the gap constraints.
    pub fn with_gap(mut self, gap: GapConstraints) -> Self {
        self.gap = gap;
        self
    }

    /// Number of slots on the grid.
    #[inline]
    pub fn num_slots(&self) -> usize {
        self.time_slots.len()
    }

    /// Therapists skilled for this run's therapy.
    pub fn skilled_therapists(&self) -> Vec<&Therapist> {
        self.therapists
            .iter()
            .filter(|t| t.is_skilled_for(&self.therapy.name))
            .collect()
    }

    /// Looks up a therapist by id.
    pub fn therapist(&self, id: &str) -> Option<&Therapist> {
        self.therapists.iter().find(|t| t.id == id)
    }

    /// Resources as a pool, for validators that take one.
    pub fn resource_pool(&self) -> ResourcePool {
        ResourcePool {
            therapists: self.therapists.clone(),
            rooms: self.rooms.clone(),
            inventory: self.inventory.clone(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use crate::models::Therapist;

    #[test]
    fn test_context_from_pool() {
        let mut ctx = context(2);
        assert_eq!(ctx.num_slots(), 12 * 4);
        assert_eq!(ctx.skilled_therapists().len(), 1);

        ctx.therapists.push(Therapist::new("t2").with_skill("Nasya"));
        assert_eq!(ctx.skilled_therapists().len(), 1);
        assert!(ctx.therapist("t2").is_some());
        assert_eq!(ctx.resource_pool().therapists.len(), 2);
    }
}
