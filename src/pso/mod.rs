//! Particle swarm refinement of session time slots.
//!
//! Takes the GA's sessions and searches over their slot indices only;
//! therapist and room assignments stay fixed. Each dimension of a
//! particle is one session's slot index.
//!
//! # Update rule
//!
//! ```text
//! v[d] = w·v[d] + c1·r1·(pbest[d] − x[d]) + c2·r2·(gbest[d] − x[d])
//! x[d] = round(x[d] + v[d])
//! ```
//!
//! with `v` clamped to `±max_velocity`, `x` clamped to the grid, and `w`
//! multiplied by `inertia_decay` after every iteration.

mod particle;
mod problem;
mod runner;

pub use particle::{Coefficients, Particle};
pub use problem::SwarmProblem;
pub use runner::{IterationStats, SwarmOutcome, SwarmRefiner};
