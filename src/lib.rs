//! Hybrid therapy-session scheduler.
//!
//! Turns a therapy protocol, a patient and a pool of therapists and rooms
//! into a conflict-aware session schedule, and explains every decision it
//! made along the way.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `TherapyProtocol`, `Patient`, `Therapist`,
//!   `Room`, `Session`, `TimeSlot`, slot grid generation
//! - **`constraints`**: Rule-based validators and the violation model
//! - **`priority`**: Priority tokens, the request queue, preemption
//! - **`ga`**: Genetic optimizer for therapist/room/slot allocation
//! - **`pso`**: Particle swarm refinement of slot timing
//! - **`explain`**: Decision log, reports and audit entries
//! - **`orchestrator`**: The eight-phase `HybridScheduler` pipeline
//! - **`collaborators`**: Source/sink traits and `SchedulingService`
//! - **`config`**, **`error`**, **`validation`**: Run configuration, the
//!   crate error type and input integrity checks
//!
//! # Pipeline
//!
//! ```text
//! protocol ─► eligibility ─► greedy placement ─► GA ─► PSO
//!          ─► priority ─► conflict resolution ─► finalization
//! ```
//!
//! GA and PSO are optional. Population and swarm evaluation run on
//! scoped worker threads over an immutable [`SchedulingContext`]; with a
//! fixed seed the result does not depend on the worker count.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Holland (1975), "Adaptation in Natural and Artificial Systems"
//! - Kennedy & Eberhart (1995), "Particle Swarm Optimization"

pub mod collaborators;
pub mod config;
pub mod constraints;
pub mod context;
mod convergence;
pub mod error;
pub mod explain;
pub mod ga;
pub mod models;
pub mod orchestrator;
mod parallel;
pub mod priority;
pub mod pso;
pub mod validation;

pub use config::SchedulerConfig;
pub use context::SchedulingContext;
pub use error::{CollaboratorError, Result, SchedulerError};
pub use orchestrator::{HybridScheduler, Phase, ProgressEvent, ScheduleResult};
