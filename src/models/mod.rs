//! Scheduling domain models.
//!
//! Provides the data types a therapy scheduling run consumes and produces.
//! Everything here is plain data with builders; behaviour lives in the
//! algorithm modules.
//!
//! # Domain Mappings
//!
//! | hybrid-schedule | Clinic | Classic scheduling |
//! |-----------------|--------|--------------------|
//! | TherapyProtocol | Treatment plan | Job |
//! | WorkflowStep | Procedure | Operation |
//! | Therapist / Room | Staff / Treatment room | Machine |
//! | Session | Appointment | Assignment |
//! | TimeSlot | Bookable period | Time bucket |

pub(crate) mod calendar;
mod patient;
mod protocol;
mod resource;
mod session;

pub use calendar::{
    Interval, SlotGridConfig, TimeSlot, Timestamp, generate_time_slots, slot_index_at,
};
pub use patient::{AvailabilityWindow, Patient};
pub use protocol::{TherapyProtocol, WorkflowStep};
pub use resource::{InventoryItem, InventoryStatus, ResourcePool, Room, Therapist, skill_matches};
pub use session::{Session, SessionStatus};
